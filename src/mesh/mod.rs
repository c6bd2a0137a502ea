//! Mesh data and the native mesh container format

pub mod vertex;
pub mod material;
pub mod buffer;
pub mod mesh;
pub mod format;
pub mod importer;
pub mod context;

pub use vertex::{Vertex, VertexSkin, MAX_INFLUENCES};
pub use material::{Material, MAX_TEXTURES};
pub use buffer::MeshBuffer;
pub use mesh::Mesh;
pub use format::{load_mesh, read_mesh, save_mesh, write_mesh, MESH_VERSION};
pub use importer::{ImporterRegistry, MeshImporter, NativeMeshImporter};
pub use context::AssetContext;
