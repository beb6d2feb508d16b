use criterion::{criterion_group, criterion_main, Criterion, black_box};

use glam::{Mat4, Quat, Vec3};

use kagami::animation::{AnimationClip, Animator, Bone, BoneTrack, Skeleton, TransformKeyframe};
use kagami::cache::store::BinaryStore;

fn bench_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime")
}

/// 256 KiB of mildly compressible payload, shaped like a real model blob
fn test_payload() -> Vec<u8> {
    (0..256 * 1024).map(|i| (i % 251) as u8).collect()
}

fn bench_store_put(c: &mut Criterion) {
    let rt = bench_runtime();
    let dir = tempfile::tempdir().expect("tempdir");
    let store = BinaryStore::open(dir.path(), "avatar-models");
    let payload = test_payload();

    c.bench_function("store_put_256k", |b| {
        b.iter(|| {
            rt.block_on(store.put(
                black_box("https://assets.example/model.vrm"),
                black_box(&payload),
            ))
            .expect("put failed");
        });
    });
}

fn bench_store_get_hit(c: &mut Criterion) {
    let rt = bench_runtime();
    let dir = tempfile::tempdir().expect("tempdir");
    let store = BinaryStore::open(dir.path(), "avatar-models");
    let payload = test_payload();
    rt.block_on(store.put("https://assets.example/model.vrm", &payload))
        .expect("put failed");

    c.bench_function("store_get_hit_256k", |b| {
        b.iter(|| {
            let bytes = rt
                .block_on(store.get(black_box("https://assets.example/model.vrm")))
                .expect("entry missing");
            black_box(bytes);
        });
    });
}

/// Chain skeleton of `count` bones, one meter apart
fn chain_skeleton(count: usize) -> Skeleton {
    let mut skeleton = Skeleton::new();
    for i in 0..count {
        let parent = if i == 0 { None } else { Some(i - 1) };
        skeleton
            .add_bone(Bone::new(
                format!("bone_{}", i),
                parent,
                Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
            ))
            .expect("add bone");
    }
    skeleton
}

/// One track per bone, 16 keyframes over one second, looping
fn dense_clip(name: &str, bone_count: usize) -> AnimationClip {
    let mut clip = AnimationClip::new(name);
    clip.looping = true;
    for bone in 0..bone_count {
        let mut track = BoneTrack::new(format!("bone_{}", bone));
        for key in 0..16 {
            let t = key as f32 / 15.0;
            track.add_keyframe(TransformKeyframe::new(
                t,
                Vec3::new(0.0, 1.0 + (t * 6.28).sin() * 0.1, 0.0),
                Quat::from_rotation_y(t * 0.5),
                Vec3::ONE,
            ));
        }
        clip.add_track(track);
    }
    clip.calculate_duration();
    clip
}

fn bench_clip_sample(c: &mut Criterion) {
    let skeleton = chain_skeleton(32);
    let clip = dense_clip("walk", 32);

    c.bench_function("clip_sample_32_bones", |b| {
        let mut frame = 0u32;
        b.iter(|| {
            frame += 1;
            let t = (frame % 60) as f32 / 60.0;
            let transforms = clip.sample(black_box(t), &skeleton);
            black_box(transforms);
        });
    });
}

fn bench_animator_blend(c: &mut Criterion) {
    let skeleton = chain_skeleton(32);
    let mut animator = Animator::new(skeleton);
    let walk = animator.add_clip(dense_clip("walk", 32));
    let wave = animator.add_clip(dense_clip("wave", 32));
    animator.play_with_weight(walk, 0.7);
    animator.play_with_weight(wave, 0.3);

    c.bench_function("animator_update_two_clip_blend", |b| {
        b.iter(|| {
            animator.update(black_box(1.0 / 60.0));
            black_box(animator.skinning_matrices());
        });
    });
}

criterion_group!(
    benches,
    bench_store_put,
    bench_store_get_hit,
    bench_clip_sample,
    bench_animator_blend,
);
criterion_main!(benches);
