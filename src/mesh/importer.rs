//! Pluggable mesh importers selected by extension or file header

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::core::{Error, Result};
use crate::io::ByteStream;
use crate::io::chunk::MESH_MAGIC;

use super::context::AssetContext;
use super::format;
use super::mesh::Mesh;

/// Bytes handed to [`MeshImporter::can_load_stream`]
pub const HEADER_PROBE_LEN: usize = 16;

/// Object-safe seekable reader
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// A loader for one mesh file format
pub trait MeshImporter {
    /// Short name for diagnostics
    fn name(&self) -> &str;

    /// Lower-case extensions without the leading dot
    fn extensions(&self) -> &[&str];

    /// Whether the file name carries one of [`MeshImporter::extensions`]
    fn can_load(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Whether the leading bytes of a file identify this format
    fn can_load_stream(&self, _header: &[u8]) -> bool {
        false
    }

    fn load(&self, reader: &mut dyn ReadSeek, ctx: &AssetContext) -> Result<Mesh>;
}

/// Importer for the native chunked container
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeMeshImporter;

impl MeshImporter for NativeMeshImporter {
    fn name(&self) -> &str {
        "native"
    }

    fn extensions(&self) -> &[&str] {
        &["mesh"]
    }

    fn can_load_stream(&self, header: &[u8]) -> bool {
        header.len() >= 4 && header[..4] == MESH_MAGIC.to_le_bytes()
    }

    fn load(&self, reader: &mut dyn ReadSeek, ctx: &AssetContext) -> Result<Mesh> {
        format::read_mesh(&mut ByteStream::new(reader), ctx)
    }
}

/// Ordered list of importers; the first that accepts a file loads it
pub struct ImporterRegistry {
    importers: Vec<Box<dyn MeshImporter>>,
}

impl Default for ImporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ImporterRegistry {
    /// Registry with the native importer installed
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(NativeMeshImporter));
        registry
    }

    pub fn empty() -> Self {
        Self { importers: Vec::new() }
    }

    pub fn register(&mut self, importer: Box<dyn MeshImporter>) {
        log::debug!("Registered mesh importer '{}'", importer.name());
        self.importers.push(importer);
    }

    pub fn len(&self) -> usize {
        self.importers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.importers.is_empty()
    }

    /// Every extension any importer accepts
    pub fn extensions(&self) -> Vec<&str> {
        self.importers.iter().flat_map(|i| i.extensions().iter().copied()).collect()
    }

    /// First importer claiming the path by extension
    pub fn find_for_path(&self, path: &Path) -> Option<&dyn MeshImporter> {
        self.importers.iter().find(|i| i.can_load(path)).map(|i| i.as_ref())
    }

    /// First importer recognising the header bytes
    pub fn find_for_header(&self, header: &[u8]) -> Option<&dyn MeshImporter> {
        self.importers.iter().find(|i| i.can_load_stream(header)).map(|i| i.as_ref())
    }

    /// Load a mesh file, choosing the importer by extension and then by header
    pub fn import(&self, path: impl AsRef<Path>, ctx: &AssetContext) -> Result<Mesh> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let name = path.display().to_string();
        let mesh = self.import_from(&mut reader, Some(path), &name, ctx)?;
        log::info!(
            "Imported {}: {} buffers, {} materials, {} bones",
            name,
            mesh.buffer_count(),
            mesh.material_count(),
            mesh.bone_count()
        );
        Ok(mesh)
    }

    /// Load from an open reader; `path` (if any) is used for extension matching
    pub fn import_from(
        &self,
        reader: &mut dyn ReadSeek,
        path: Option<&Path>,
        name: &str,
        ctx: &AssetContext,
    ) -> Result<Mesh> {
        if let Some(importer) = path.and_then(|p| self.find_for_path(p)) {
            log::debug!("{}: using '{}' importer (extension)", name, importer.name());
            return importer.load(reader, ctx);
        }

        let start = reader.stream_position()?;
        let mut header = [0u8; HEADER_PROBE_LEN];
        let mut filled = 0;
        while filled < header.len() {
            let n = reader.read(&mut header[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        reader.seek(SeekFrom::Start(start))?;

        match self.find_for_header(&header[..filled]) {
            Some(importer) => {
                log::debug!("{}: using '{}' importer (header)", name, importer.name());
                importer.load(reader, ctx)
            }
            None => Err(Error::NoImporter(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Material, MeshBuffer, Vertex};
    use glam::{Vec2, Vec3};
    use std::io::Cursor;

    fn mesh_bytes() -> Vec<u8> {
        let mut mesh = Mesh::new();
        mesh.add_material(Material::new("m"));
        let mut buffer = MeshBuffer::new(0);
        for p in [Vec3::ZERO, Vec3::X, Vec3::Y] {
            buffer.add_vertex(Vertex::new(p, Vec3::Z, Vec2::ZERO));
        }
        buffer.add_face(0, 1, 2);
        mesh.add_buffer(buffer);

        let mut stream = ByteStream::memory();
        format::write_mesh(&mut stream, &mesh).unwrap();
        stream.into_bytes()
    }

    struct TextImporter;

    impl MeshImporter for TextImporter {
        fn name(&self) -> &str {
            "text"
        }

        fn extensions(&self) -> &[&str] {
            &["txt"]
        }

        fn load(&self, _reader: &mut dyn ReadSeek, _ctx: &AssetContext) -> Result<Mesh> {
            Ok(Mesh::new())
        }
    }

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        let native = NativeMeshImporter;
        assert!(native.can_load(Path::new("models/hero.mesh")));
        assert!(native.can_load(Path::new("models/HERO.MESH")));
        assert!(!native.can_load(Path::new("models/hero.obj")));
        assert!(!native.can_load(Path::new("models/hero")));
    }

    #[test]
    fn test_header_detection() {
        let bytes = mesh_bytes();
        assert!(NativeMeshImporter.can_load_stream(&bytes[..HEADER_PROBE_LEN]));
        assert!(!NativeMeshImporter.can_load_stream(b"ANIM"));
        assert!(!NativeMeshImporter.can_load_stream(&[]));
    }

    #[test]
    fn test_registry_polls_in_order() {
        let mut registry = ImporterRegistry::new();
        registry.register(Box::new(TextImporter));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.extensions(), vec!["mesh", "txt"]);
        assert_eq!(registry.find_for_path(Path::new("a.txt")).map(|i| i.name()), Some("text"));
        assert!(registry.find_for_path(Path::new("a.fbx")).is_none());
    }

    #[test]
    fn test_import_by_header_without_extension() {
        crate::core::logging::init_for_tests();
        let registry = ImporterRegistry::new();
        let mut reader = Cursor::new(mesh_bytes());
        let mesh = registry
            .import_from(&mut reader, None, "memory", &AssetContext::default())
            .unwrap();
        assert_eq!(mesh.buffer_count(), 1);
    }

    #[test]
    fn test_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triangle.bin");
        std::fs::write(&path, mesh_bytes()).unwrap();

        let registry = ImporterRegistry::new();
        let mesh = registry.import(&path, &AssetContext::default()).unwrap();
        assert_eq!(mesh.material_count(), 1);
    }

    #[test]
    fn test_no_importer() {
        let registry = ImporterRegistry::empty();
        let mut reader = Cursor::new(mesh_bytes());
        let result = registry.import_from(&mut reader, Some(Path::new("x.mesh")), "x.mesh", &AssetContext::default());
        assert!(matches!(result, Err(Error::NoImporter(_))));
    }
}
