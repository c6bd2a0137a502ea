//! Surface material referenced by mesh buffers

use glam::Vec3;

/// Texture layers a material can carry
pub const MAX_TEXTURES: usize = 6;

/// Phong-style material with up to [`MAX_TEXTURES`] texture layers
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    /// Texture path per layer; `None` leaves the layer on the default texture
    pub textures: Vec<Option<String>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse: Vec3::ONE,
            specular: Vec3::ZERO,
            shininess: 0.0,
            textures: Vec::new(),
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Assign a texture to a layer, growing the layer list as needed.
    /// Layers past [`MAX_TEXTURES`] are ignored.
    pub fn set_texture(&mut self, layer: usize, path: impl Into<String>) {
        if layer >= MAX_TEXTURES {
            log::warn!("Material '{}': texture layer {} exceeds {}", self.name, layer, MAX_TEXTURES);
            return;
        }
        if self.textures.len() <= layer {
            self.textures.resize(layer + 1, None);
        }
        self.textures[layer] = Some(path.into());
    }

    pub fn texture(&self, layer: usize) -> Option<&str> {
        self.textures.get(layer)?.as_deref()
    }

    /// Number of texture layers in use
    pub fn layer_count(&self) -> usize {
        self.textures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_texture_grows_layers() {
        let mut material = Material::new("skin");
        material.set_texture(2, "detail.png");
        assert_eq!(material.layer_count(), 3);
        assert_eq!(material.texture(0), None);
        assert_eq!(material.texture(2), Some("detail.png"));
    }

    #[test]
    fn test_layer_limit() {
        let mut material = Material::new("skin");
        material.set_texture(MAX_TEXTURES, "ignored.png");
        assert_eq!(material.layer_count(), 0);
    }
}
