//! Bone hierarchy stored as a flat, index-linked array

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};

use crate::core::{Error, Result};

/// A single bone in a skeletal hierarchy
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone; `None` for a root
    pub parent_index: Option<usize>,
    /// Rest transform relative to the parent
    pub local_bind_pose: Mat4,
    /// Inverse of the bone's global bind transform
    pub inverse_bind_pose: Mat4,
    /// Local transform written by animation
    pub pose: Mat4,
    /// Whether `pose` currently overrides `local_bind_pose`
    pub animated: bool,
}

impl Bone {
    /// Create a new bone with the given local transform.
    /// The inverse bind pose is identity until the bone is added through
    /// [`Skeleton::add_bone`] or set explicitly.
    pub fn new(name: impl Into<String>, parent_index: Option<usize>, local_transform: Mat4) -> Self {
        Self {
            name: name.into(),
            parent_index,
            local_bind_pose: local_transform,
            inverse_bind_pose: Mat4::IDENTITY,
            pose: local_transform,
            animated: false,
        }
    }

    /// Bone with an explicit inverse bind pose, as stored in mesh files
    pub fn with_inverse_bind(
        name: impl Into<String>,
        parent_index: Option<usize>,
        local_bind_pose: Mat4,
        inverse_bind_pose: Mat4,
    ) -> Self {
        Self {
            inverse_bind_pose,
            ..Self::new(name, parent_index, local_bind_pose)
        }
    }

    /// The transform used for hierarchy composition this frame
    pub fn local_transform(&self) -> Mat4 {
        if self.animated {
            self.pose
        } else {
            self.local_bind_pose
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_index.is_none()
    }

    /// Parent index in the serialized form (-1 for roots)
    pub fn parent_index_i32(&self) -> i32 {
        self.parent_index.map_or(-1, |p| p as i32)
    }
}

/// A hierarchical skeleton composed of bones
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    bone_names: HashMap<String, usize>,
    global_matrices: Vec<Mat4>,
}

impl Skeleton {
    /// Create an empty skeleton
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a skeleton from bones whose inverse bind poses are already known.
    ///
    /// Parents may appear later in the array than their children; out of
    /// range parents and parent cycles are rejected.
    pub fn from_bones(bones: Vec<Bone>) -> Result<Self> {
        validate_hierarchy(&bones)?;

        let mut bone_names = HashMap::with_capacity(bones.len());
        for (index, bone) in bones.iter().enumerate() {
            if bone_names.contains_key(&bone.name) {
                log::warn!("Duplicate bone name '{}' at index {}; lookups resolve to the first", bone.name, index);
                continue;
            }
            bone_names.insert(bone.name.clone(), index);
        }

        let mut skeleton = Self {
            bones,
            bone_names,
            global_matrices: Vec::new(),
        };
        skeleton.update_global_matrices();
        Ok(skeleton)
    }

    /// Append a bone whose parent is already in the skeleton.
    ///
    /// The inverse bind pose is derived from the bind hierarchy.
    pub fn add_bone(&mut self, mut bone: Bone) -> Result<usize> {
        let index = self.bones.len();

        if let Some(parent) = bone.parent_index {
            if parent >= index {
                return Err(Error::InvalidParent {
                    bone: index,
                    parent: parent as i32,
                });
            }
        }

        let world_bind_pose = match bone.parent_index {
            Some(parent) => self.bind_global_transform(parent) * bone.local_bind_pose,
            None => bone.local_bind_pose,
        };
        bone.inverse_bind_pose = world_bind_pose.inverse();

        if self.bone_names.contains_key(&bone.name) {
            log::warn!("Duplicate bone name '{}' at index {}; lookups resolve to the first", bone.name, index);
        } else {
            self.bone_names.insert(bone.name.clone(), index);
        }
        self.bones.push(bone);
        self.update_global_matrices();

        Ok(index)
    }

    /// Get the number of bones in the skeleton
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Get a bone by index
    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// Mutable access to a bone. Parent edits are checked by [`Skeleton::validate`].
    pub fn bone_mut(&mut self, index: usize) -> Option<&mut Bone> {
        self.bones.get_mut(index)
    }

    /// Check that every parent index is in range and the hierarchy has no cycles
    pub fn validate(&self) -> Result<()> {
        validate_hierarchy(&self.bones)
    }

    /// Find a bone index by name
    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.bone_names.get(name).copied()
    }

    /// Get the parent index of a bone
    pub fn parent_index(&self, bone_index: usize) -> Option<usize> {
        self.bones.get(bone_index)?.parent_index
    }

    /// Get all children of a bone
    pub fn children(&self, bone_index: usize) -> Vec<usize> {
        self.bones
            .iter()
            .enumerate()
            .filter_map(|(idx, bone)| (bone.parent_index == Some(bone_index)).then_some(idx))
            .collect()
    }

    /// Indices of all bones without a parent
    pub fn roots(&self) -> Vec<usize> {
        self.bones
            .iter()
            .enumerate()
            .filter_map(|(idx, bone)| bone.is_root().then_some(idx))
            .collect()
    }

    /// Compose the bone's local transform with all of its ancestors.
    ///
    /// Walks to the root on every call; use [`Skeleton::update_global_matrices`]
    /// when every bone is needed.
    pub fn global_transform(&self, bone_index: usize) -> Mat4 {
        let mut transform = match self.bones.get(bone_index) {
            Some(bone) => bone.local_transform(),
            None => return Mat4::IDENTITY,
        };

        let mut current = self.bones[bone_index].parent_index;
        while let Some(parent) = current {
            let bone = &self.bones[parent];
            transform = bone.local_transform() * transform;
            current = bone.parent_index;
        }
        transform
    }

    /// Resolve the global matrix of every bone once, sharing ancestor results
    pub fn update_global_matrices(&mut self) {
        let count = self.bones.len();
        let mut globals = vec![Mat4::IDENTITY; count];
        let mut resolved = vec![false; count];
        let mut chain = Vec::new();

        for start in 0..count {
            let mut current = Some(start);
            while let Some(idx) = current {
                if resolved[idx] {
                    break;
                }
                chain.push(idx);
                current = self.bones[idx].parent_index;
            }

            // Chain is ordered child -> ancestor; resolve from the top down
            while let Some(idx) = chain.pop() {
                let local = self.bones[idx].local_transform();
                globals[idx] = match self.bones[idx].parent_index {
                    Some(parent) => globals[parent] * local,
                    None => local,
                };
                resolved[idx] = true;
            }
        }

        self.global_matrices = globals;
    }

    /// Global matrices from the last [`Skeleton::update_global_matrices`]
    pub fn global_matrices(&self) -> &[Mat4] {
        &self.global_matrices
    }

    /// Calculate skinning matrices (global transform * inverse bind pose)
    pub fn skin_matrices(&self) -> Vec<Mat4> {
        self.global_matrices
            .iter()
            .zip(self.bones.iter())
            .map(|(global, bone)| *global * bone.inverse_bind_pose)
            .collect()
    }

    /// Drive a bone from animation: pose = translation * rotation
    pub fn set_bone_pose(&mut self, index: usize, position: Vec3, rotation: Quat) {
        match self.bones.get_mut(index) {
            Some(bone) => {
                bone.pose = Mat4::from_rotation_translation(rotation, position);
                bone.animated = true;
            }
            None => log::warn!("set_bone_pose: bone index {} out of range", index),
        }
    }

    /// Return a bone to its bind pose
    pub fn set_bone_static(&mut self, index: usize) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.pose = bone.local_bind_pose;
            bone.animated = false;
        }
    }

    /// Return every bone to its bind pose
    pub fn reset_pose(&mut self) {
        for bone in &mut self.bones {
            bone.pose = bone.local_bind_pose;
            bone.animated = false;
        }
    }

    /// Bind-pose local translation and rotation of a bone
    pub fn bind_pose_components(&self, index: usize) -> (Vec3, Quat) {
        match self.bones.get(index) {
            Some(bone) => {
                let (_, rotation, translation) = bone.local_bind_pose.to_scale_rotation_translation();
                (translation, rotation)
            }
            None => (Vec3::ZERO, Quat::IDENTITY),
        }
    }

    /// Dump the hierarchy at debug level and warn when it does not have exactly one root
    pub fn log_hierarchy(&self) {
        let roots = self.roots();
        for &root in &roots {
            self.log_subtree(root, 0);
        }

        match roots.len() {
            1 => log::debug!("Skeleton: single root bone"),
            0 if self.bones.is_empty() => {}
            n => log::warn!("Skeleton: {} root bones detected", n),
        }
    }

    fn log_subtree(&self, index: usize, depth: usize) {
        log::debug!("{:indent$}[{}] {}", "", index, self.bones[index].name, indent = depth * 2);
        for child in self.children(index) {
            self.log_subtree(child, depth + 1);
        }
    }

    /// Global bind transform from the bind poses only (used during construction)
    fn bind_global_transform(&self, bone_index: usize) -> Mat4 {
        let mut transform = self.bones[bone_index].local_bind_pose;
        let mut current = self.bones[bone_index].parent_index;
        while let Some(idx) = current {
            transform = self.bones[idx].local_bind_pose * transform;
            current = self.bones[idx].parent_index;
        }
        transform
    }
}

/// Reject parent indices outside the array and parent cycles
fn validate_hierarchy(bones: &[Bone]) -> Result<()> {
    for (index, bone) in bones.iter().enumerate() {
        if let Some(parent) = bone.parent_index {
            if parent >= bones.len() {
                return Err(Error::InvalidParent {
                    bone: index,
                    parent: parent as i32,
                });
            }
        }
    }

    // 0 = unvisited, 1 = on the walk in progress, 2 = known to reach a root
    let mut state = vec![0u8; bones.len()];
    let mut path = Vec::new();
    for start in 0..bones.len() {
        let mut current = Some(start);
        while let Some(idx) = current {
            match state[idx] {
                2 => break,
                1 => return Err(Error::CyclicHierarchy { bone: idx }),
                _ => {
                    state[idx] = 1;
                    path.push(idx);
                    current = bones[idx].parent_index;
                }
            }
        }
        for idx in path.drain(..) {
            state[idx] = 2;
        }
    }
    Ok(())
}

/// Builder for easier skeleton construction
pub struct SkeletonBuilder {
    skeleton: Skeleton,
    last_error: Option<Error>,
}

impl SkeletonBuilder {
    /// Create a new skeleton builder
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

    /// Add a bone with a parent
    pub fn add_bone(mut self, name: &str, parent: &str, transform: Mat4) -> Self {
        if self.last_error.is_some() {
            return self;
        }

        let Some(parent_index) = self.skeleton.find_bone_index(parent) else {
            self.last_error = Some(Error::Format(format!("parent bone '{}' not found", parent)));
            return self;
        };

        if let Err(e) = self.skeleton.add_bone(Bone::new(name, Some(parent_index), transform)) {
            self.last_error = Some(e);
        }
        self
    }

    /// Build the final skeleton
    pub fn build(self) -> Result<Skeleton> {
        match self.last_error {
            Some(error) => Err(error),
            None => Ok(self.skeleton),
        }
    }
}

impl Default for SkeletonBuilder {
    fn default() -> Self {
        Self::new()
    }
}
