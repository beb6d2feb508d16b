//! Animation clips with bone-name-keyed tracks
//!
//! Tracks address bones by name, not index. A clip is fetched and cached
//! independently of any particular model, so at sample time each track is
//! resolved against whatever skeleton is currently live; tracks naming
//! bones the skeleton does not have are ignored, and bones no track names
//! hold their bind pose.

use glam::{Mat4, Quat, Vec3};

use crate::animation::skeleton::Skeleton;

/// A single transform keyframe at a specific time
#[derive(Clone, Debug)]
pub struct TransformKeyframe {
    pub time: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl TransformKeyframe {
    pub fn new(time: f32, position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            time,
            position,
            rotation,
            scale,
        }
    }

    /// Identity transform at the given time
    pub fn identity(time: f32) -> Self {
        Self {
            time,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Interpolate between two keyframes; positions and scales lerp,
    /// rotations slerp. `t` is clamped to [0, 1].
    pub fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            time: a.time + (b.time - a.time) * t,
            position: a.position.lerp(b.position, t),
            rotation: a.rotation.slerp(b.rotation, t),
            scale: a.scale.lerp(b.scale, t),
        }
    }
}

/// Keyframed motion for one named bone
#[derive(Clone, Debug)]
pub struct BoneTrack {
    pub bone: String,
    pub keyframes: Vec<TransformKeyframe>,
}

impl BoneTrack {
    pub fn new(bone: impl Into<String>) -> Self {
        Self {
            bone: bone.into(),
            keyframes: Vec::new(),
        }
    }

    /// Insert a keyframe, keeping the track sorted by time
    pub fn add_keyframe(&mut self, keyframe: TransformKeyframe) {
        let pos = self
            .keyframes
            .binary_search_by(|k| k.time.total_cmp(&keyframe.time))
            .unwrap_or_else(|e| e);
        self.keyframes.insert(pos, keyframe);
    }

    /// Sample the track at `time`, clamping outside the keyframe range
    pub fn sample(&self, time: f32) -> TransformKeyframe {
        let Some(first) = self.keyframes.first() else {
            return TransformKeyframe::identity(time);
        };
        if time <= first.time {
            return first.clone();
        }

        let last = &self.keyframes[self.keyframes.len() - 1];
        if time >= last.time {
            return last.clone();
        }

        for i in 0..self.keyframes.len() - 1 {
            let current = &self.keyframes[i];
            let next = &self.keyframes[i + 1];
            if time >= current.time && time <= next.time {
                let span = next.time - current.time;
                let t = if span > 0.0 { (time - current.time) / span } else { 0.0 };
                return TransformKeyframe::lerp(current, next, t);
            }
        }

        last.clone()
    }

    /// Time of the last keyframe
    pub fn duration(&self) -> f32 {
        self.keyframes.last().map(|k| k.time).unwrap_or(0.0)
    }
}

/// A complete animation clip: named tracks plus duration and looping
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<BoneTrack>,
    pub looping: bool,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: 0.0,
            tracks: Vec::new(),
            looping: false,
        }
    }

    pub fn add_track(&mut self, track: BoneTrack) {
        self.tracks.push(track);
    }

    /// The track animating `bone`, if the clip has one
    pub fn track_for(&self, bone: &str) -> Option<&BoneTrack> {
        self.tracks.iter().find(|t| t.bone == bone)
    }

    /// Sample every track at `time`, resolved against `skeleton`.
    ///
    /// Returns local transforms in bone-index order. Bones without a track
    /// keep their local bind pose; tracks naming unknown bones are skipped.
    pub fn sample(&self, time: f32, skeleton: &Skeleton) -> Vec<Mat4> {
        let mut transforms = skeleton.bind_local_transforms();

        let sample_time = if self.looping && self.duration > 0.0 {
            time % self.duration
        } else {
            time.min(self.duration)
        };

        for track in &self.tracks {
            if let Some(index) = skeleton.find_bone(&track.bone) {
                transforms[index] = track.sample(sample_time).to_matrix();
            }
        }

        transforms
    }

    /// Set `duration` to the longest track
    pub fn calculate_duration(&mut self) {
        self.duration = self
            .tracks
            .iter()
            .map(|t| t.duration())
            .fold(0.0f32, |a, b| a.max(b));
    }
}
