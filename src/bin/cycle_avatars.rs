//! Avatar swap demo — loads two avatar documents and cycles between them,
//! printing disposal telemetry after every swap.
//!
//! Usage: cargo run --release --bin cycle_avatars -- [OPTIONS]
//!
//! Options:
//!   --a <PATH|URL>      First avatar document (default: built-in sample)
//!   --b <PATH|URL>      Second avatar document (default: built-in sample)
//!   --cycles <N>        Number of swaps to run (default: 4)
//!   --frames <N>        Animation frames ticked per mount (default: 120)
//!   --cache-root <DIR>  Cache root for URL fetches (default: "kagami-cache")
//!   --gpu               Upload to a real device instead of running headless

use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use glam::{Quat, Vec3};
use serde_json::json;

use kagami::animation::{AnimationClip, BoneTrack, TransformKeyframe};
use kagami::asset::facade;
use kagami::cache::loader::AssetLoader;
use kagami::cache::registry::{CacheConfig, CacheStores};
use kagami::cache::telemetry::human_size;
use kagami::render::RenderContext;
use kagami::scene::SceneResourceManager;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let args: Vec<String> = std::env::args().collect();
    let source_a = parse_str_arg(&args, "--a");
    let source_b = parse_str_arg(&args, "--b");
    let cycles = parse_usize_arg(&args, "--cycles").unwrap_or(4);
    let frames = parse_usize_arg(&args, "--frames").unwrap_or(120);
    let cache_root = parse_str_arg(&args, "--cache-root").unwrap_or_else(|| "kagami-cache".to_string());
    let use_gpu = args.iter().any(|a| a == "--gpu");

    let context = if use_gpu {
        match RenderContext::new().await {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                log::warn!("No usable GPU ({}), running headless", e);
                None
            }
        }
    } else {
        None
    };

    let config = CacheConfig {
        root: PathBuf::from(&cache_root),
    };
    let loader = AssetLoader::new(Arc::new(CacheStores::open(&config)));

    let doc_a = match &source_a {
        Some(source) => fetch_doc(&loader, source).await,
        None => sample_doc("aoi", [0.35, 0.55, 0.9, 1.0]),
    };
    let doc_b = match &source_b {
        Some(source) => fetch_doc(&loader, source).await,
        None => sample_doc("hina", [0.9, 0.45, 0.5, 1.0]),
    };

    println!("=== Kagami Avatar Cycler ===");
    println!("Cycles: {}, frames per mount: {}", cycles, frames);
    println!("Mode:   {}", if context.is_some() { "GPU" } else { "headless" });
    println!();

    let mut manager = SceneResourceManager::new();

    for cycle in 0..cycles {
        let (tag, bytes) = if cycle % 2 == 0 {
            ("A", &doc_a)
        } else {
            ("B", &doc_b)
        };

        manager
            .swap_to(bytes, context.as_ref())
            .await
            .expect("Avatar swap failed");

        let animator = manager.animator_mut().expect("No animator after swap");
        let clip = animator.add_clip(bob_clip());
        animator.play(clip);

        for _ in 0..frames {
            manager.update(1.0 / 60.0, context.as_ref());
        }

        let draw_count = manager.draw_list().len();
        println!(
            "[{}] {} ({}) mounted: {} draw entries, {} GPU",
            cycle + 1,
            manager.avatar_name().unwrap_or("?"),
            tag,
            draw_count,
            human_size(manager.gpu_bytes())
        );
        if let Some(report) = manager.last_disposal() {
            println!(
                "    previous: {} objects released, {} freed, {} failures",
                report.total_released(),
                human_size(report.freed_bytes),
                report.failures
            );
        }
    }

    manager.unmount();
    if let Some(report) = manager.last_disposal() {
        println!();
        println!(
            "Final unmount: {} objects released, {} freed, {} failures",
            report.total_released(),
            human_size(report.freed_bytes),
            report.failures
        );
    }

    let stats = loader.stats();
    if stats.requests() > 0 {
        println!();
        println!(
            "Loader: {} hits / {} requests ({:.0}% hit rate), {} fetched, {} from cache",
            stats.hits,
            stats.requests(),
            stats.hit_rate() * 100.0,
            human_size(stats.bytes_fetched),
            human_size(stats.bytes_served_from_cache)
        );
    }
}

async fn fetch_doc(loader: &AssetLoader, source: &str) -> Vec<u8> {
    if source.starts_with("http://") || source.starts_with("https://") {
        facade::load_avatar_model(loader, source)
            .await
            .expect("Failed to fetch avatar document")
    } else {
        tokio::fs::read(source)
            .await
            .expect("Failed to read avatar document")
    }
}

/// A small two-bone, two-mesh avatar document with one shared texture
fn sample_doc(name: &str, tint: [f32; 4]) -> Vec<u8> {
    let quad = |mesh: &str, material: usize, y0: f32| {
        json!({
            "name": mesh,
            "material": material,
            "positions": [
                [-0.5, y0, 0.0], [0.5, y0, 0.0],
                [0.5, y0 + 1.0, 0.0], [-0.5, y0 + 1.0, 0.0]
            ],
            "normals": [[0.0, 0.0, 1.0], [0.0, 0.0, 1.0], [0.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
            "uvs": [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            "indices": [0, 1, 2, 0, 2, 3],
            "joints": [[0, 0, 0, 0], [0, 0, 0, 0], [1, 0, 0, 0], [1, 0, 0, 0]],
            "weights": [
                [1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]
            ]
        })
    };

    // 4x4 white texture, shared by both materials
    let pixels = BASE64.encode([255u8; 64]);

    serde_json::to_vec(&json!({
        "name": name,
        "textures": [{ "name": "skin", "width": 4, "height": 4, "rgba8": pixels }],
        "materials": [
            { "name": "body", "base_color": tint, "texture": 0 },
            { "name": "head", "base_color": [1.0, 0.9, 0.85, 1.0], "texture": 0 }
        ],
        "meshes": [quad("torso", 0, 0.0), quad("head", 1, 1.0)],
        "bones": [
            { "name": "hips", "translation": [0.0, 0.0, 0.0], "rotation": [0.0, 0.0, 0.0, 1.0] },
            { "name": "spine", "parent": "hips", "translation": [0.0, 1.0, 0.0], "rotation": [0.0, 0.0, 0.0, 1.0] }
        ]
    }))
    .expect("Failed to encode sample document")
}

/// Looping one-second hip bounce
fn bob_clip() -> AnimationClip {
    let mut track = BoneTrack::new("hips");
    track.add_keyframe(TransformKeyframe::identity(0.0));
    track.add_keyframe(TransformKeyframe::new(
        0.5,
        Vec3::new(0.0, 0.15, 0.0),
        Quat::IDENTITY,
        Vec3::ONE,
    ));
    track.add_keyframe(TransformKeyframe::identity(1.0));

    let mut clip = AnimationClip::new("bob");
    clip.looping = true;
    clip.add_track(track);
    clip.calculate_duration();
    clip
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.clone())
}
