//! Vertex and per-vertex skin influence records

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Maximum bone influences per vertex
pub const MAX_INFLUENCES: usize = 4;

/// Interleaved vertex as stored on disk and uploaded to the GPU
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Floats per vertex in the `VRTS` chunk
    pub const FLOATS: usize = 8;

    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from(self.normal)
    }

    pub fn uv(&self) -> Vec2 {
        Vec2::from(self.uv)
    }

    /// Components in file order: position, normal, texcoord
    pub fn to_floats(&self) -> [f32; Self::FLOATS] {
        let [px, py, pz] = self.position;
        let [nx, ny, nz] = self.normal;
        let [u, v] = self.uv;
        [px, py, pz, nx, ny, nz, u, v]
    }

    pub fn from_floats(f: [f32; Self::FLOATS]) -> Self {
        Self {
            position: [f[0], f[1], f[2]],
            normal: [f[3], f[4], f[5]],
            uv: [f[6], f[7]],
        }
    }
}

/// Up to four bone influences for one vertex
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VertexSkin {
    pub bone_ids: [u8; MAX_INFLUENCES],
    pub weights: [f32; MAX_INFLUENCES],
}

impl VertexSkin {
    pub fn new(bone_ids: [u8; MAX_INFLUENCES], weights: [f32; MAX_INFLUENCES]) -> Self {
        Self { bone_ids, weights }
    }

    /// Fully bound to a single bone
    pub fn rigid(bone: u8) -> Self {
        Self {
            bone_ids: [bone, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }

    /// Influences with a non-zero weight
    pub fn influences(&self) -> impl Iterator<Item = (u8, f32)> + '_ {
        self.bone_ids
            .iter()
            .zip(self.weights.iter())
            .filter(|(_, w)| **w != 0.0)
            .map(|(&id, &w)| (id, w))
    }

    pub fn total_weight(&self) -> f32 {
        self.weights.iter().sum()
    }

    /// Rescale weights to sum to one; no-op when all weights are zero
    pub fn normalize_weights(&mut self) {
        let total = self.total_weight();
        if total > 0.0 {
            for w in &mut self.weights {
                *w /= total;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), Vertex::FLOATS * 4);
        assert_eq!(std::mem::size_of::<VertexSkin>(), 20);
    }

    #[test]
    fn test_float_order() {
        let v = Vertex::new(Vec3::new(1.0, 2.0, 3.0), Vec3::Z, Vec2::new(0.25, 0.75));
        let floats = v.to_floats();
        assert_eq!(floats, [1.0, 2.0, 3.0, 0.0, 0.0, 1.0, 0.25, 0.75]);
        assert_eq!(Vertex::from_floats(floats), v);

        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn test_influences_skip_zero_weights() {
        let skin = VertexSkin::new([3, 7, 9, 0], [0.5, 0.0, 0.5, 0.0]);
        let influences: Vec<_> = skin.influences().collect();
        assert_eq!(influences, vec![(3, 0.5), (9, 0.5)]);
    }

    #[test]
    fn test_normalize_weights() {
        let mut skin = VertexSkin::new([0, 1, 0, 0], [2.0, 2.0, 0.0, 0.0]);
        skin.normalize_weights();
        assert!((skin.total_weight() - 1.0).abs() < 0.001);

        let mut empty = VertexSkin::default();
        empty.normalize_weights();
        assert_eq!(empty.total_weight(), 0.0);
    }
}
