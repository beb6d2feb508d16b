//! Runtime animation playback and blending

use glam::{Mat4, Quat, Vec3};

use super::{AnimationClip, Skeleton};

/// Playback state for one active clip
#[derive(Clone, Debug)]
pub struct AnimationState {
    pub clip_index: usize,
    pub time: f32,
    pub speed: f32,
    /// Blend weight in [0, 1]
    pub weight: f32,
    pub playing: bool,
}

impl AnimationState {
    pub fn new(clip_index: usize) -> Self {
        Self {
            clip_index,
            time: 0.0,
            speed: 1.0,
            weight: 1.0,
            playing: false,
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    /// Pause, keeping the current time
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Stop and rewind to the beginning
    pub fn stop(&mut self) {
        self.playing = false;
        self.time = 0.0;
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }
}

/// Drives an avatar's skeleton from its clip library.
///
/// The animator is the only thing that mutates pose data between avatar
/// swaps. Disposal calls `stop_all` followed by `detach`, after which the
/// animator never touches the skeleton again even if a stale `update`
/// arrives from the frame loop.
#[derive(Clone)]
pub struct Animator {
    skeleton: Skeleton,
    clips: Vec<AnimationClip>,
    states: Vec<AnimationState>,
    current_local_transforms: Vec<Mat4>,
    current_skinning_matrices: Vec<Mat4>,
    detached: bool,
}

impl Animator {
    /// Create an animator holding the skeleton at its bind pose
    pub fn new(skeleton: Skeleton) -> Self {
        let locals = skeleton.bind_local_transforms();
        let worlds = skeleton.calculate_world_transforms(&locals);
        let skinning = skeleton.calculate_skinning_matrices(&worlds);
        Self {
            skeleton,
            clips: Vec::new(),
            states: Vec::new(),
            current_local_transforms: locals,
            current_skinning_matrices: skinning,
            detached: false,
        }
    }

    /// Add a clip to the library, returning its index
    pub fn add_clip(&mut self, clip: AnimationClip) -> usize {
        let index = self.clips.len();
        self.clips.push(clip);
        index
    }

    pub fn get_clip(&self, index: usize) -> Option<&AnimationClip> {
        self.clips.get(index)
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    /// Play a clip at full weight, stopping everything else first
    pub fn play(&mut self, clip_index: usize) {
        if self.detached {
            return;
        }
        for state in self.states.iter_mut() {
            state.stop();
        }
        self.play_with_weight(clip_index, 1.0);
    }

    /// Play a clip at the given blend weight alongside whatever is active
    pub fn play_with_weight(&mut self, clip_index: usize, weight: f32) {
        if self.detached || clip_index >= self.clips.len() {
            return;
        }

        let mut state = AnimationState::new(clip_index);
        state.weight = weight.clamp(0.0, 1.0);
        state.play();
        self.states.push(state);
    }

    /// Stop every state playing the given clip
    pub fn stop(&mut self, clip_index: usize) {
        self.states
            .retain(|state| state.clip_index != clip_index || !state.playing);
    }

    /// Stop all playback
    pub fn stop_all(&mut self) {
        self.states.clear();
    }

    /// Disconnect from the skeleton ahead of resource teardown.
    /// Afterwards `update` and the `play` family are no-ops.
    pub fn detach(&mut self) {
        self.detached = true;
        self.states.clear();
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Advance playback by `delta_time` seconds and recompute pose matrices
    pub fn update(&mut self, delta_time: f32) {
        if self.detached {
            return;
        }

        if self.states.is_empty() {
            self.current_local_transforms = self.skeleton.bind_local_transforms();
            self.refresh_skinning();
            return;
        }

        for state in &mut self.states {
            if !state.playing {
                continue;
            }
            if let Some(clip) = self.clips.get(state.clip_index) {
                state.time += delta_time * state.speed;
                if clip.looping && clip.duration > 0.0 {
                    state.time = state.time % clip.duration;
                } else if state.time >= clip.duration {
                    state.time = clip.duration;
                    state.playing = false;
                }
            }
        }

        self.current_local_transforms = self.blend_animations();
        self.refresh_skinning();

        self.states.retain(|state| state.playing);
    }

    /// Weighted blend of every active clip, sampled once per clip
    fn blend_animations(&self) -> Vec<Mat4> {
        let total_weight: f32 = self.states.iter().map(|s| s.weight).sum();
        if total_weight <= 0.0 {
            return self.skeleton.bind_local_transforms();
        }

        if self.states.len() == 1 {
            let state = &self.states[0];
            return match self.clips.get(state.clip_index) {
                Some(clip) => clip.sample(state.time, &self.skeleton),
                None => self.skeleton.bind_local_transforms(),
            };
        }

        let samples: Vec<(f32, Vec<Mat4>)> = self
            .states
            .iter()
            .filter_map(|state| {
                self.clips
                    .get(state.clip_index)
                    .map(|clip| (state.weight / total_weight, clip.sample(state.time, &self.skeleton)))
            })
            .collect();
        if samples.is_empty() {
            return self.skeleton.bind_local_transforms();
        }

        let bone_count = self.skeleton.bone_count();
        let mut blended = Vec::with_capacity(bone_count);
        for bone_idx in 0..bone_count {
            let mut translation = Vec3::ZERO;
            let mut scale = Vec3::ZERO;
            let mut rotation = Quat::IDENTITY;
            let mut accumulated = 0.0f32;

            for (weight, transforms) in &samples {
                let (s, r, t) = transforms[bone_idx].to_scale_rotation_translation();
                translation += t * *weight;
                scale += s * *weight;
                if accumulated == 0.0 {
                    rotation = r;
                } else {
                    let blend = *weight / (accumulated + *weight);
                    rotation = rotation.slerp(r, blend);
                }
                accumulated += *weight;
            }

            blended.push(Mat4::from_scale_rotation_translation(scale, rotation, translation));
        }
        blended
    }

    fn refresh_skinning(&mut self) {
        let worlds = self
            .skeleton
            .calculate_world_transforms(&self.current_local_transforms);
        self.current_skinning_matrices = self.skeleton.calculate_skinning_matrices(&worlds);
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Current per-bone local transforms
    pub fn local_transforms(&self) -> &[Mat4] {
        &self.current_local_transforms
    }

    /// Current skinning matrices, ready for the skinning uniform
    pub fn skinning_matrices(&self) -> &[Mat4] {
        &self.current_skinning_matrices
    }

    pub fn bone_count(&self) -> usize {
        self.skeleton.bone_count()
    }
}
