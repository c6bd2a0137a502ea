//! Runtime animator: ordered animation layers over one skeleton

use crate::core::{AnimationConfig, Error, Result};
use crate::mesh::Mesh;

use super::layer::AnimationLayer;
use super::playback::PlayMode;
use super::skeleton::Skeleton;

/// Runs its layers in order each frame.
///
/// Layers are expected to drive disjoint bone sets; when two layers write the
/// same bone the later layer wins.
#[derive(Clone, Debug, Default)]
pub struct Animator {
    config: AnimationConfig,
    layers: Vec<AnimationLayer>,
}

impl Animator {
    /// Create a new animator with no layers
    pub fn new() -> Self {
        Self::default()
    }

    /// Layers added later inherit `config`
    pub fn with_config(config: AnimationConfig) -> Self {
        Self {
            config,
            layers: Vec::new(),
        }
    }

    /// Settings handed to each new layer
    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    /// Append a layer and return its index
    pub fn add_layer(&mut self, name: impl Into<String>) -> usize {
        let layer = AnimationLayer::with_config(name, self.config.clone());
        log::debug!("Animator: added layer '{}' at {}", layer.name(), self.layers.len());
        self.layers.push(layer);
        self.layers.len() - 1
    }

    /// Get a layer by index
    pub fn layer(&self, index: usize) -> Option<&AnimationLayer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut AnimationLayer> {
        self.layers.get_mut(index)
    }

    /// First layer called `name`
    pub fn layer_by_name(&self, name: &str) -> Option<&AnimationLayer> {
        self.layers.iter().find(|l| l.name() == name)
    }

    pub fn layer_by_name_mut(&mut self, name: &str) -> Option<&mut AnimationLayer> {
        self.layers.iter_mut().find(|l| l.name() == name)
    }

    /// Get the number of layers
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layers in update order
    pub fn layers(&self) -> &[AnimationLayer] {
        &self.layers
    }

    /// Play a clip on the layer at `index`
    pub fn play_on_layer(&mut self, index: usize, clip: &str, mode: PlayMode, blend_time: f32) -> Result<()> {
        self.layers
            .get_mut(index)
            .ok_or(Error::LayerNotFound(index))?
            .play(clip, mode, blend_time)
    }

    /// Stop every layer
    pub fn stop_all(&mut self, blend_out: f32) {
        for layer in &mut self.layers {
            layer.stop(blend_out);
        }
    }

    /// Update all layers in order, then resolve the skeleton's global matrices
    pub fn update(&mut self, dt: f32, skeleton: &mut Skeleton) {
        self.update_layers(dt, skeleton);
        skeleton.update_global_matrices();
    }

    /// Update all layers, then re-skin the mesh from the new pose
    pub fn update_mesh(&mut self, dt: f32, mesh: &mut Mesh) {
        self.update_layers(dt, &mut mesh.skeleton);
        mesh.update_skinning();
    }

    fn update_layers(&mut self, dt: f32, skeleton: &mut Skeleton) {
        for layer in &mut self.layers {
            layer.update(dt, skeleton);
        }
    }
}
