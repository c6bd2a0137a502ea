//! Geometry buffer: bind-pose vertices, triangles and optional skin data

use crate::core::{Error, Result};
use crate::math::Aabb;

use super::vertex::{Vertex, VertexSkin};

/// A draw batch sharing one material.
///
/// `vertices` always hold the bind pose. Skinning writes into
/// `skinned_vertices` and raises the dirty flag for the renderer.
#[derive(Clone, Debug, Default)]
pub struct MeshBuffer {
    pub material: u32,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub skin: Vec<VertexSkin>,
    pub skinned_vertices: Vec<Vertex>,
    dirty: bool,
}

impl MeshBuffer {
    /// Create an empty buffer using the given material index
    pub fn new(material: u32) -> Self {
        Self {
            material,
            ..Default::default()
        }
    }

    /// Append a bind-pose vertex and return its index
    pub fn add_vertex(&mut self, vertex: Vertex) -> u32 {
        self.vertices.push(vertex);
        self.dirty = true;
        (self.vertices.len() - 1) as u32
    }

    /// Append one triangle by vertex index
    pub fn add_face(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
        self.dirty = true;
    }

    /// Attach skin data and reset the skinned stream to the bind pose
    pub fn set_skin(&mut self, skin: Vec<VertexSkin>) {
        self.skin = skin;
        self.reset_skinned_vertices();
    }

    /// Copy the bind pose into the skinned stream (empty when unskinned)
    pub fn reset_skinned_vertices(&mut self) {
        if self.is_skinned() {
            self.skinned_vertices.clone_from(&self.vertices);
        } else {
            self.skinned_vertices.clear();
        }
        self.dirty = true;
    }

    /// Whether the buffer carries per-vertex skin data
    pub fn is_skinned(&self) -> bool {
        !self.skin.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Whole triangles; trailing indices are not counted
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertices to draw: the skinned stream when present
    pub fn render_vertices(&self) -> &[Vertex] {
        if self.is_skinned() && self.skinned_vertices.len() == self.vertices.len() {
            &self.skinned_vertices
        } else {
            &self.vertices
        }
    }

    /// Raw bytes of [`MeshBuffer::render_vertices`] for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.render_vertices())
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Flag the buffer for re-upload
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag, returning whether it was set
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Bind-pose bounds of the current vertices
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(Vertex::position))
    }

    /// Check that every weighted influence names an existing bone
    pub fn validate_skin(&self, bone_count: usize) -> Result<()> {
        for (vertex, skin) in self.skin.iter().enumerate() {
            if let Some((bone, _)) = skin.influences().find(|(id, _)| *id as usize >= bone_count) {
                return Err(Error::InvalidSkin {
                    vertex,
                    bone,
                    bone_count,
                });
            }
        }
        Ok(())
    }
}
