//! Skeletal animation for avatars

pub mod animator;
pub mod clip;
pub mod skeleton;

pub use animator::{AnimationState, Animator};
pub use clip::{AnimationClip, BoneTrack, TransformKeyframe};
pub use skeleton::{Bone, MAX_BONES, Skeleton, SkeletonBuilder};
