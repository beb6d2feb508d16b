//! Avatar bone hierarchy and skinning math

use glam::Mat4;
use std::collections::HashMap;

/// Maximum number of bones per skeleton (skinning uniform buffer limit)
pub const MAX_BONES: usize = 256;

/// A single bone in the avatar hierarchy
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub parent_index: Option<usize>,
    pub local_bind_pose: Mat4,
    pub inverse_bind_pose: Mat4,
}

impl Bone {
    /// Create a bone with the given local bind transform.
    /// The inverse bind pose is filled in when the bone joins a skeleton.
    pub fn new(name: impl Into<String>, parent_index: Option<usize>, local_bind_pose: Mat4) -> Self {
        Self {
            name: name.into(),
            parent_index,
            local_bind_pose,
            inverse_bind_pose: Mat4::IDENTITY,
        }
    }
}

/// A hierarchical skeleton with bones stored parents-before-children
#[derive(Clone, Debug)]
pub struct Skeleton {
    bones: Vec<Bone>,
    bone_names: HashMap<String, usize>,
}

impl Skeleton {
    /// Create an empty skeleton
    pub fn new() -> Self {
        Self {
            bones: Vec::new(),
            bone_names: HashMap::new(),
        }
    }

    /// Append a bone, computing its inverse bind pose from the chain of
    /// parents already present. Parents must be added before children.
    pub fn add_bone(&mut self, mut bone: Bone) -> Result<usize, &'static str> {
        if self.bones.len() >= MAX_BONES {
            return Err("Maximum bone count exceeded");
        }

        if let Some(parent) = bone.parent_index {
            if parent >= self.bones.len() {
                return Err("Invalid parent bone index");
            }
        }

        if self.bone_names.contains_key(&bone.name) {
            return Err("Bone name already exists");
        }

        let world_bind_pose = match bone.parent_index {
            Some(parent_idx) => self.world_bind_pose(parent_idx) * bone.local_bind_pose,
            None => bone.local_bind_pose,
        };
        bone.inverse_bind_pose = world_bind_pose.inverse();

        let index = self.bones.len();
        self.bone_names.insert(bone.name.clone(), index);
        self.bones.push(bone);
        Ok(index)
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn get_bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// Look up a bone index by name. Clips resolve their tracks through
    /// this, which is what lets one clip retarget onto different avatars.
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bone_names.get(name).copied()
    }

    pub fn parent_index(&self, bone_index: usize) -> Option<usize> {
        self.bones.get(bone_index)?.parent_index
    }

    /// The local bind transform of every bone, in index order.
    /// This is the rest pose a bone holds when nothing animates it.
    pub fn bind_local_transforms(&self) -> Vec<Mat4> {
        self.bones.iter().map(|b| b.local_bind_pose).collect()
    }

    /// Compose world transforms from per-bone locals.
    /// Relies on the parents-before-children storage order.
    pub fn calculate_world_transforms(&self, local_transforms: &[Mat4]) -> Vec<Mat4> {
        assert_eq!(
            local_transforms.len(),
            self.bones.len(),
            "Local transforms array must match bone count"
        );

        let mut world_transforms = vec![Mat4::IDENTITY; self.bones.len()];
        for (index, bone) in self.bones.iter().enumerate() {
            world_transforms[index] = match bone.parent_index {
                Some(parent_idx) => world_transforms[parent_idx] * local_transforms[index],
                None => local_transforms[index],
            };
        }
        world_transforms
    }

    /// Skinning matrices: `world_transform * inverse_bind_pose` per bone
    pub fn calculate_skinning_matrices(&self, world_transforms: &[Mat4]) -> Vec<Mat4> {
        assert_eq!(
            world_transforms.len(),
            self.bones.len(),
            "World transforms array must match bone count"
        );

        world_transforms
            .iter()
            .zip(self.bones.iter())
            .map(|(world, bone)| *world * bone.inverse_bind_pose)
            .collect()
    }

    /// World-space bind pose of one bone, walking up to the root
    fn world_bind_pose(&self, bone_index: usize) -> Mat4 {
        let mut chain = Vec::new();
        let mut current = Some(bone_index);
        while let Some(idx) = current {
            chain.push(idx);
            current = self.bones[idx].parent_index;
        }

        let mut transform = Mat4::IDENTITY;
        for &idx in chain.iter().rev() {
            transform = transform * self.bones[idx].local_bind_pose;
        }
        transform
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent construction of small skeletons, mostly for tests and tools
pub struct SkeletonBuilder {
    skeleton: Skeleton,
    last_error: Option<&'static str>,
}

impl SkeletonBuilder {
    pub fn new() -> Self {
        Self {
            skeleton: Skeleton::new(),
            last_error: None,
        }
    }

    /// Add a root bone (no parent)
    pub fn add_root(mut self, name: &str, transform: Mat4) -> Self {
        if self.last_error.is_some() {
            return self;
        }
        if let Err(e) = self.skeleton.add_bone(Bone::new(name, None, transform)) {
            self.last_error = Some(e);
        }
        self
    }

    /// Add a bone under a named parent
    pub fn add_bone(mut self, name: &str, parent: &str, transform: Mat4) -> Self {
        if self.last_error.is_some() {
            return self;
        }

        let parent_index = match self.skeleton.find_bone(parent) {
            Some(idx) => idx,
            None => {
                self.last_error = Some("Parent bone not found");
                return self;
            }
        };

        if let Err(e) = self
            .skeleton
            .add_bone(Bone::new(name, Some(parent_index), transform))
        {
            self.last_error = Some(e);
        }
        self
    }

    pub fn build(self) -> Result<Skeleton, &'static str> {
        if let Some(error) = self.last_error {
            Err(error)
        } else if self.skeleton.bones.is_empty() {
            Err("Skeleton must have at least one bone")
        } else {
            Ok(self.skeleton)
        }
    }
}

impl Default for SkeletonBuilder {
    fn default() -> Self {
        Self::new()
    }
}
