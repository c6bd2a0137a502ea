//! Explicit asset context handed to mesh loads

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Texture resolution settings used while reading materials
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetContext {
    /// Directory texture paths are resolved against; `None` keeps paths as stored
    pub texture_root: Option<PathBuf>,
    /// Substituted when a texture under `texture_root` does not exist
    pub default_texture: Option<String>,
}

impl AssetContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_texture_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.texture_root = Some(root.into());
        self
    }

    pub fn with_default_texture(mut self, name: impl Into<String>) -> Self {
        self.default_texture = Some(name.into());
        self
    }

    /// Map a texture path read from a mesh file to the path the application should load
    pub fn resolve_texture(&self, path: &str) -> String {
        let Some(root) = &self.texture_root else {
            return path.to_string();
        };

        let candidate = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            root.join(path)
        };

        if candidate.exists() {
            return candidate.to_string_lossy().into_owned();
        }

        match &self.default_texture {
            Some(default) => {
                log::warn!("Texture '{}' not found under {}; using '{}'", path, root.display(), default);
                default.clone()
            }
            None => {
                log::warn!("Texture '{}' not found under {}", path, root.display());
                candidate.to_string_lossy().into_owned()
            }
        }
    }
}
