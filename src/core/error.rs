//! Error types for skinforge

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic: expected 0x{expected:08X}, found 0x{found:08X}")]
    InvalidMagic { expected: u32, found: u32 },

    #[error("Unsupported version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Format error: {0}")]
    Format(String),

    #[error("Bone {bone} references missing parent {parent}")]
    InvalidParent { bone: usize, parent: i32 },

    #[error("Bone {bone} is part of a parent cycle")]
    CyclicHierarchy { bone: usize },

    #[error("Vertex {vertex} references bone {bone} but the skeleton has {bone_count} bones")]
    InvalidSkin {
        vertex: usize,
        bone: u8,
        bone_count: usize,
    },

    #[error("Clip already registered: {0}")]
    DuplicateClip(String),

    #[error("Clip not found: {0}")]
    ClipNotFound(String),

    #[error("Layer index out of range: {0}")]
    LayerNotFound(usize),

    #[error("No importer accepts {0}")]
    NoImporter(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}
