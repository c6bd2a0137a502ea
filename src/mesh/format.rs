//! Mesh container (`MESH`): `MATS`, optional `SKEL`, then one `BUFF` per geometry buffer
//!
//! `BUFF` nests `VRTS`, `IDXS` and, for skinned buffers, `SKIN` sub-chunks.
//! Matrices are stored as 16 floats in column order (translation in 12..15).

use std::io::{Read, Seek, Write};
use std::path::Path;

use glam::{Mat4, Vec3};

use crate::animation::skeleton::{Bone, Skeleton};
use crate::core::{Error, Result};
use crate::io::ByteStream;
use crate::io::chunk::{
    CHUNK_BUFF, CHUNK_IDXS, CHUNK_MATS, CHUNK_SKEL, CHUNK_SKIN, CHUNK_VRTS, ChunkSpan, MESH_MAGIC, begin_chunk,
    end_chunk, finish_chunk, fourcc_name, next_chunk, read_file_header, skip_chunk, write_file_header,
};

use super::buffer::MeshBuffer;
use super::context::AssetContext;
use super::material::{MAX_TEXTURES, Material};
use super::mesh::Mesh;
use super::vertex::{MAX_INFLUENCES, Vertex, VertexSkin};

/// Current mesh container version
pub const MESH_VERSION: u32 = 100;

/// Buffer flag bits
pub const FLAG_SKINNED: u32 = 1;
pub const FLAG_TANGENTS: u32 = 2;
pub const FLAG_COLORS: u32 = 4;

const VERTEX_SIZE: u64 = 4 * Vertex::FLOATS as u64;
const SKIN_SIZE: u64 = (MAX_INFLUENCES + 4 * MAX_INFLUENCES) as u64;
const TRIANGLE_SIZE: u64 = 12;

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write a mesh container.
///
/// The mesh is validated first, so anything written here reads back.
pub fn write_mesh<S: Write + Seek>(stream: &mut ByteStream<S>, mesh: &Mesh) -> Result<()> {
    mesh.validate()?;

    write_file_header(stream, MESH_MAGIC, MESH_VERSION)?;

    write_materials(stream, &mesh.materials)?;

    if mesh.has_skeleton() {
        write_skeleton(stream, &mesh.skeleton)?;
    }

    for (index, buffer) in mesh.buffers.iter().enumerate() {
        if buffer.vertex_count() == 0 || buffer.triangle_count() == 0 {
            log::debug!("Skipping empty buffer {}", index);
            continue;
        }
        write_buffer(stream, buffer)?;
    }

    Ok(())
}

fn write_materials<S: Write + Seek>(stream: &mut ByteStream<S>, materials: &[Material]) -> Result<()> {
    let start = begin_chunk(stream, CHUNK_MATS)?;
    stream.write_u32(materials.len() as u32)?;

    for material in materials {
        stream.write_cstring(&material.name)?;
        write_vec3(stream, material.diffuse)?;
        write_vec3(stream, material.specular)?;
        stream.write_f32(material.shininess)?;

        let layers = material.textures.len().min(MAX_TEXTURES);
        stream.write_u8(layers as u8)?;
        for texture in &material.textures[..layers] {
            stream.write_cstring(texture.as_deref().unwrap_or(""))?;
        }
    }

    end_chunk(stream, start)
}

fn write_skeleton<S: Write + Seek>(stream: &mut ByteStream<S>, skeleton: &Skeleton) -> Result<()> {
    let start = begin_chunk(stream, CHUNK_SKEL)?;
    stream.write_u32(skeleton.bone_count() as u32)?;

    for bone in skeleton.bones() {
        stream.write_cstring(&bone.name)?;
        stream.write_i32(bone.parent_index_i32())?;
        write_mat4(stream, &bone.local_bind_pose)?;
        write_mat4(stream, &bone.inverse_bind_pose)?;
    }

    end_chunk(stream, start)
}

fn write_buffer<S: Write + Seek>(stream: &mut ByteStream<S>, buffer: &MeshBuffer) -> Result<()> {
    let start = begin_chunk(stream, CHUNK_BUFF)?;
    stream.write_u32(buffer.material)?;
    stream.write_u32(if buffer.is_skinned() { FLAG_SKINNED } else { 0 })?;

    let vrts = begin_chunk(stream, CHUNK_VRTS)?;
    stream.write_u32(buffer.vertex_count() as u32)?;
    for vertex in &buffer.vertices {
        for value in vertex.to_floats() {
            stream.write_f32(value)?;
        }
    }
    end_chunk(stream, vrts)?;

    let index_count = buffer.triangle_count() * 3;
    let idxs = begin_chunk(stream, CHUNK_IDXS)?;
    stream.write_u32(index_count as u32)?;
    for &index in &buffer.indices[..index_count] {
        stream.write_u32(index)?;
    }
    end_chunk(stream, idxs)?;

    if buffer.is_skinned() {
        let skin = begin_chunk(stream, CHUNK_SKIN)?;
        stream.write_u32(buffer.skin.len() as u32)?;
        for record in &buffer.skin {
            stream.write_bytes(&record.bone_ids)?;
            for weight in record.weights {
                stream.write_f32(weight)?;
            }
        }
        end_chunk(stream, skin)?;
    }

    end_chunk(stream, start)
}

fn write_vec3<S: Write>(stream: &mut ByteStream<S>, v: Vec3) -> Result<()> {
    for value in v.to_array() {
        stream.write_f32(value)?;
    }
    Ok(())
}

fn write_mat4<S: Write>(stream: &mut ByteStream<S>, m: &Mat4) -> Result<()> {
    for value in m.to_cols_array() {
        stream.write_f32(value)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read a mesh from a stream positioned at the container header.
///
/// The skeleton and skin data are validated once every chunk has been read;
/// any failure discards the whole mesh.
pub fn read_mesh<S: Read + Seek>(stream: &mut ByteStream<S>, ctx: &AssetContext) -> Result<Mesh> {
    let limit = stream.size()?;
    read_file_header(stream, MESH_MAGIC, MESH_VERSION)?;

    let mut mesh = Mesh::new();
    let mut bones: Option<Vec<Bone>> = None;

    while let Some(span) = next_chunk(stream, limit)? {
        log::debug!("Chunk {} ({} bytes)", fourcc_name(span.id()), span.header.length);
        match span.id() {
            CHUNK_MATS => {
                mesh.materials.extend(read_materials(stream, ctx)?);
                finish_chunk(stream, &span)?;
            }
            CHUNK_SKEL => {
                if bones.is_some() {
                    log::warn!("Multiple SKEL chunks; keeping the last");
                }
                bones = Some(read_bones(stream)?);
                finish_chunk(stream, &span)?;
            }
            CHUNK_BUFF => {
                let buffer = read_buffer(stream, &span)?;
                mesh.buffers.push(buffer);
                finish_chunk(stream, &span)?;
            }
            other => {
                log::warn!("Skipping unknown mesh chunk {} ({} bytes)", fourcc_name(other), span.header.length);
                skip_chunk(stream, &span)?;
            }
        }
    }

    if let Some(bones) = bones {
        mesh.skeleton = Skeleton::from_bones(bones)?;
        mesh.skeleton.log_hierarchy();
    }

    for (index, buffer) in mesh.buffers.iter().enumerate() {
        if buffer.material as usize >= mesh.materials.len() {
            log::warn!(
                "Buffer {} references material {} of {}",
                index,
                buffer.material,
                mesh.materials.len()
            );
        }
    }
    mesh.validate()?;

    Ok(mesh)
}

fn read_materials<S: Read + Seek>(stream: &mut ByteStream<S>, ctx: &AssetContext) -> Result<Vec<Material>> {
    let count = stream.read_u32()?;
    let mut materials = Vec::new();

    for _ in 0..count {
        let mut material = Material::new(stream.read_cstring()?);
        material.diffuse = read_vec3(stream)?;
        material.specular = read_vec3(stream)?;
        material.shininess = stream.read_f32()?;

        let layers = stream.read_u8()? as usize;
        for layer in 0..layers {
            let path = stream.read_cstring()?;
            if layer >= MAX_TEXTURES {
                log::warn!("Material '{}': dropping texture layer {}", material.name, layer);
                continue;
            }
            if path.is_empty() {
                material.textures.push(None);
            } else {
                material.textures.push(Some(ctx.resolve_texture(&path)));
            }
        }

        log::debug!("Material '{}' ({} layers)", material.name, material.layer_count());
        materials.push(material);
    }

    Ok(materials)
}

fn read_bones<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<Vec<Bone>> {
    let count = stream.read_u32()?;
    let mut bones = Vec::new();

    for _ in 0..count {
        let name = stream.read_cstring()?;
        let parent = stream.read_i32()?;
        let local_bind_pose = read_mat4(stream)?;
        let inverse_bind_pose = read_mat4(stream)?;

        let parent_index = usize::try_from(parent).ok();
        bones.push(Bone::with_inverse_bind(name, parent_index, local_bind_pose, inverse_bind_pose));
    }

    Ok(bones)
}

fn read_buffer<S: Read + Seek>(stream: &mut ByteStream<S>, span: &ChunkSpan) -> Result<MeshBuffer> {
    let mut buffer = MeshBuffer::new(stream.read_u32()?);
    let flags = stream.read_u32()?;
    let mut skin = Vec::new();

    while let Some(sub) = next_chunk(stream, span.end)? {
        match sub.id() {
            CHUNK_VRTS => {
                let count = read_count(stream, &sub, VERTEX_SIZE)?;
                buffer.vertices.reserve(count);
                for _ in 0..count {
                    let mut floats = [0f32; Vertex::FLOATS];
                    for value in &mut floats {
                        *value = stream.read_f32()?;
                    }
                    buffer.add_vertex(Vertex::from_floats(floats));
                }
            }
            CHUNK_IDXS => {
                let count = stream.read_u32()? as usize;
                if count % 3 != 0 {
                    log::warn!("Index count {} is not a multiple of 3; trailing indices dropped", count);
                }
                let triangles = count / 3;
                check_fits(stream, &sub, triangles as u64 * TRIANGLE_SIZE)?;
                buffer.indices.reserve(triangles * 3);
                for _ in 0..triangles {
                    let (a, b, c) = (stream.read_u32()?, stream.read_u32()?, stream.read_u32()?);
                    buffer.add_face(a, b, c);
                }
            }
            CHUNK_SKIN => {
                let count = read_count(stream, &sub, SKIN_SIZE)?;
                skin.reserve(count);
                for _ in 0..count {
                    let mut bone_ids = [0u8; MAX_INFLUENCES];
                    stream.read_exact(&mut bone_ids)?;
                    let mut weights = [0f32; MAX_INFLUENCES];
                    for weight in &mut weights {
                        *weight = stream.read_f32()?;
                    }
                    skin.push(VertexSkin::new(bone_ids, weights));
                }
            }
            other => {
                log::warn!("Skipping unknown buffer chunk {}", fourcc_name(other));
                skip_chunk(stream, &sub)?;
                continue;
            }
        }
        finish_chunk(stream, &sub)?;
    }

    if flags & FLAG_SKINNED != 0 && skin.is_empty() {
        log::warn!("Buffer flagged as skinned has no SKIN chunk");
    }
    if !skin.is_empty() && skin.len() != buffer.vertices.len() {
        log::warn!("Buffer has {} vertices but {} skin records", buffer.vertices.len(), skin.len());
    }
    buffer.set_skin(skin);

    Ok(buffer)
}

/// Read an element count and check the elements fit in the chunk
fn read_count<S: Read + Seek>(stream: &mut ByteStream<S>, span: &ChunkSpan, element_size: u64) -> Result<usize> {
    let count = stream.read_u32()?;
    check_fits(stream, span, u64::from(count) * element_size)?;
    Ok(count as usize)
}

fn check_fits<S: Read + Seek>(stream: &mut ByteStream<S>, span: &ChunkSpan, bytes: u64) -> Result<()> {
    let available = span.end.saturating_sub(stream.tell()?);
    if bytes > available {
        return Err(Error::Format(format!(
            "chunk {} needs {} bytes but holds {}",
            fourcc_name(span.id()),
            bytes,
            available
        )));
    }
    Ok(())
}

fn read_vec3<S: Read>(stream: &mut ByteStream<S>) -> Result<Vec3> {
    Ok(Vec3::new(stream.read_f32()?, stream.read_f32()?, stream.read_f32()?))
}

fn read_mat4<S: Read>(stream: &mut ByteStream<S>) -> Result<Mat4> {
    let mut m = [0f32; 16];
    for value in &mut m {
        *value = stream.read_f32()?;
    }
    Ok(Mat4::from_cols_array(&m))
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Load a mesh container file
pub fn load_mesh(path: impl AsRef<Path>, ctx: &AssetContext) -> Result<Mesh> {
    let path = path.as_ref();
    let mut stream = ByteStream::open_file(path)?;
    let mesh = read_mesh(&mut stream, ctx)?;
    log::info!(
        "Loaded {}: {} buffers, {} materials, {} bones",
        path.display(),
        mesh.buffer_count(),
        mesh.material_count(),
        mesh.bone_count()
    );
    Ok(mesh)
}

/// Save a mesh container file
pub fn save_mesh(mesh: &Mesh, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    // Reject before the file is created
    mesh.validate()?;
    let mut stream = ByteStream::create_file(path)?;
    write_mesh(&mut stream, mesh)?;
    stream.flush()?;
    log::info!(
        "Saved {}: {} buffers, {} materials, {} bones",
        path.display(),
        mesh.buffer_count(),
        mesh.material_count(),
        mesh.bone_count()
    );
    Ok(())
}
