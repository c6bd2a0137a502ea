//! Mesh: materials, an optional skeleton and geometry buffers

use std::path::Path;

use glam::Mat4;

use crate::animation::skeleton::{Bone, Skeleton};
use crate::animation::skinning;
use crate::core::Result;
use crate::math::Aabb;

use super::buffer::MeshBuffer;
use super::context::AssetContext;
use super::format;
use super::material::Material;

/// A renderable model.
///
/// Buffers reference materials by index. Skinned buffers reference bones of
/// `skeleton` by index; an empty skeleton means the mesh is static.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub materials: Vec<Material>,
    pub skeleton: Skeleton,
    pub buffers: Vec<MeshBuffer>,
}

impl Mesh {
    /// Create an empty mesh with no skeleton
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a mesh container file
    pub fn load(path: impl AsRef<Path>, ctx: &AssetContext) -> Result<Self> {
        format::load_mesh(path, ctx)
    }

    /// Save as a mesh container file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        format::save_mesh(self, path)
    }

    /// Append a material and return its index
    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    /// Get a material by index
    pub fn material(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Append a geometry buffer and return its index
    pub fn add_buffer(&mut self, buffer: MeshBuffer) -> usize {
        self.buffers.push(buffer);
        self.buffers.len() - 1
    }

    /// Get a buffer by index
    pub fn buffer(&self, index: usize) -> Option<&MeshBuffer> {
        self.buffers.get(index)
    }

    /// Mutable access to a buffer, e.g. to read back its dirty flag
    pub fn buffer_mut(&mut self, index: usize) -> Option<&mut MeshBuffer> {
        self.buffers.get_mut(index)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the mesh carries at least one bone
    pub fn has_skeleton(&self) -> bool {
        !self.skeleton.is_empty()
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    /// Replace the skeleton. Skin data is not re-checked until [`Mesh::validate`].
    pub fn set_skeleton(&mut self, skeleton: Skeleton) {
        self.skeleton = skeleton;
    }

    /// Find a bone index by name
    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.skeleton.find_bone_index(name)
    }

    /// Get a bone by index
    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.skeleton.bone(index)
    }

    /// Number of bones in the skeleton (0 for a static mesh)
    pub fn bone_count(&self) -> usize {
        self.skeleton.bone_count()
    }

    /// Whether any buffer carries skin data
    pub fn is_skinned(&self) -> bool {
        self.buffers.iter().any(MeshBuffer::is_skinned)
    }

    /// Bind-pose bounds over all buffers
    pub fn bounds(&self) -> Aabb {
        self.buffers
            .iter()
            .fold(Aabb::EMPTY, |acc, buffer| acc.merged(&buffer.bounds()))
    }

    /// Check the skeleton hierarchy, then every skin influence against it.
    ///
    /// A skinned buffer on a mesh without a skeleton fails on its first
    /// weighted influence.
    pub fn validate(&self) -> Result<()> {
        self.skeleton.validate()?;
        let bone_count = self.skeleton.bone_count();
        self.buffers.iter().try_for_each(|buffer| buffer.validate_skin(bone_count))
    }

    /// Resolve bone matrices and re-skin every skinned buffer
    pub fn update_skinning(&mut self) {
        self.skeleton.update_global_matrices();
        let matrices: Vec<Mat4> = self.skeleton.skin_matrices();
        for buffer in self.buffers.iter_mut().filter(|b| b.is_skinned()) {
            skinning::skin_buffer(&matrices, buffer);
        }
    }
}
