//! CPU linear blend skinning

use glam::{Mat4, Vec3};

use crate::mesh::buffer::MeshBuffer;
use crate::mesh::vertex::Vertex;

/// Blend up to four influences per vertex into `buffer.skinned_vertices`.
///
/// `skin_matrices[i]` must be bone `i`'s global transform times its inverse
/// bind pose. Returns `false` (after logging) when the buffer cannot be skinned.
pub fn skin_buffer(skin_matrices: &[Mat4], buffer: &mut MeshBuffer) -> bool {
    if !buffer.is_skinned() {
        log::warn!("Skinning skipped: buffer has no skin data");
        return false;
    }
    if skin_matrices.is_empty() {
        log::warn!("Skinning skipped: skeleton has no resolved bone matrices");
        return false;
    }
    if buffer.skin.len() != buffer.vertices.len() {
        log::warn!(
            "Skinning skipped: {} vertices but {} skin records",
            buffer.vertices.len(),
            buffer.skin.len()
        );
        return false;
    }

    buffer.skinned_vertices.resize(buffer.vertices.len(), Vertex::default());

    let mut bad_influences = 0usize;
    for ((source, skin), target) in buffer
        .vertices
        .iter()
        .zip(buffer.skin.iter())
        .zip(buffer.skinned_vertices.iter_mut())
    {
        let position = source.position();
        let normal = source.normal();

        let mut skinned_position = Vec3::ZERO;
        let mut skinned_normal = Vec3::ZERO;
        let mut applied = false;

        for (bone, weight) in skin.influences() {
            let Some(matrix) = skin_matrices.get(bone as usize) else {
                bad_influences += 1;
                continue;
            };
            skinned_position += matrix.transform_point3(position) * weight;
            skinned_normal += matrix.transform_vector3(normal) * weight;
            applied = true;
        }

        if !applied {
            *target = *source;
            continue;
        }

        if skinned_normal.length_squared() > 0.0 {
            skinned_normal = skinned_normal.normalize();
        }

        *target = Vertex {
            position: skinned_position.to_array(),
            normal: skinned_normal.to_array(),
            uv: source.uv,
        };
    }

    if bad_influences > 0 {
        log::warn!(
            "Skinning ignored {} influences referencing bones beyond {}",
            bad_influences,
            skin_matrices.len()
        );
    }

    buffer.mark_dirty();
    true
}
