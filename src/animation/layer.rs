//! Animation layer: clip playback state machine with cross-fades and one-shots

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::core::{AnimationConfig, Error, Result};

use super::clip::AnimationClip;
use super::clip_format;
use super::playback::{BoneTransform, ClipBinding, ClipPlayback, PlayMode};
use super::skeleton::Skeleton;

/// Observable state of a layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerState {
    Stopped,
    Playing,
    Blending,
    Paused,
    /// Returning to the bind pose after `stop` with a blend-out time
    FadingOut,
}

#[derive(Clone, Debug)]
struct LayerClip {
    clip: Arc<AnimationClip>,
    binding: Arc<ClipBinding>,
}

#[derive(Clone, Copy, Debug)]
struct Blend {
    elapsed: f32,
    duration: f32,
}

impl Blend {
    fn factor(&self) -> f32 {
        (self.elapsed / self.duration).min(1.0)
    }
}

#[derive(Clone, Debug)]
struct FadeOut {
    blend: Blend,
    from: BTreeMap<usize, BoneTransform>,
}

/// Plays clips from its own clip table into a skeleton.
///
/// At most two clips are sampled per frame: the current one and, while a
/// cross-fade is running, the one being faded out.
#[derive(Clone, Debug)]
pub struct AnimationLayer {
    name: String,
    config: AnimationConfig,
    clips: HashMap<String, LayerClip>,

    current: Option<(String, ClipPlayback)>,
    previous: Option<ClipPlayback>,
    blend: Option<Blend>,
    fade_out: Option<FadeOut>,
    return_to: Option<(String, PlayMode)>,

    speed: f32,
    paused: bool,
    release_pending: bool,
    /// Last transform this layer wrote per bone
    last_pose: BTreeMap<usize, BoneTransform>,
}

impl AnimationLayer {
    /// Create an empty layer with default timing settings
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, AnimationConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: AnimationConfig) -> Self {
        Self {
            name: name.into(),
            config,
            clips: HashMap::new(),
            current: None,
            previous: None,
            blend: None,
            fade_out: None,
            return_to: None,
            speed: 1.0,
            paused: false,
            release_pending: false,
            last_pose: BTreeMap::new(),
        }
    }

    /// Layer name, unique within an [`Animator`](super::Animator)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Timing settings this layer was created with
    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Clip table
    // -------------------------------------------------------------------------

    /// Register a clip under `name`, binding its channels to `skeleton`
    pub fn add_clip(
        &mut self,
        name: impl Into<String>,
        clip: impl Into<Arc<AnimationClip>>,
        skeleton: &Skeleton,
    ) -> Result<()> {
        let name = name.into();
        if self.clips.contains_key(&name) {
            return Err(Error::DuplicateClip(name));
        }

        let mut clip = clip.into();
        if clip.ticks_per_second <= 0.0 {
            log::warn!(
                "Clip '{}' has no playback rate; using {} ticks per second",
                name,
                self.config.default_ticks_per_second
            );
            Arc::make_mut(&mut clip).ticks_per_second = self.config.default_ticks_per_second;
        }

        let binding = Arc::new(ClipBinding::bind(&clip, skeleton));
        log::debug!(
            "Layer '{}': clip '{}' binds {}/{} channels",
            self.name,
            name,
            binding.bound_count(),
            clip.channel_count()
        );
        self.clips.insert(name, LayerClip { clip, binding });
        Ok(())
    }

    /// Load a clip file and register it under `name`
    pub fn load_clip(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        skeleton: &Skeleton,
    ) -> Result<Arc<AnimationClip>> {
        let name = name.into();
        if self.clips.contains_key(&name) {
            return Err(Error::DuplicateClip(name));
        }

        let clip = clip_format::load_clip(path)?;
        self.add_clip(name.clone(), clip, skeleton)?;
        self.clip(&name).cloned().ok_or(Error::ClipNotFound(name))
    }

    /// Shared clip data registered under `name`
    pub fn clip(&self, name: &str) -> Option<&Arc<AnimationClip>> {
        self.clips.get(name).map(|c| &c.clip)
    }

    pub fn has_clip(&self, name: &str) -> bool {
        self.clips.contains_key(name)
    }

    /// Registered clip names in no particular order
    pub fn clip_names(&self) -> impl Iterator<Item = &str> {
        self.clips.keys().map(String::as_str)
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Start `name` in `mode`.
    ///
    /// With a clip already active and `blend_time > 0` the layer cross-fades
    /// from it; otherwise it switches immediately. Replaying the clip that is
    /// already running (and not blending or finished) only changes its mode
    /// and keeps any pending one-shot return.
    pub fn play(&mut self, name: &str, mode: PlayMode, blend_time: f32) -> Result<()> {
        let entry = self
            .clips
            .get(name)
            .ok_or_else(|| Error::ClipNotFound(name.to_string()))?;

        self.paused = false;

        if let Some((current_name, playback)) = &mut self.current {
            if current_name.as_str() == name && self.blend.is_none() && !playback.is_finished() {
                playback.set_mode(mode);
                return Ok(());
            }
        }

        self.return_to = None;

        let next = ClipPlayback::new(entry.clip.clone(), entry.binding.clone(), mode);
        let active = self.current.take().map(|(_, playback)| playback);

        match active {
            Some(active) if blend_time > 0.0 => {
                self.previous = Some(active);
                self.blend = Some(Blend {
                    elapsed: 0.0,
                    duration: blend_time,
                });
            }
            _ => {
                self.previous = None;
                self.blend = None;
            }
        }

        // An interrupted fade-out still releases the stopped clip's bones.
        // Bones the new clip drives are rewritten in the same update.
        if self.fade_out.take().is_some() {
            self.release_pending = true;
        }
        self.current = Some((name.to_string(), next));
        log::debug!("Layer '{}': play '{}' ({:?}, blend {})", self.name, name, mode, blend_time);
        Ok(())
    }

    /// Play `name` once, then return to `return_to` in `return_mode`
    /// using the default blend time
    pub fn play_one_shot(
        &mut self,
        name: &str,
        return_to: &str,
        blend_time: f32,
        return_mode: PlayMode,
    ) -> Result<()> {
        if !self.has_clip(return_to) {
            return Err(Error::ClipNotFound(return_to.to_string()));
        }
        self.play(name, PlayMode::Once, blend_time)?;
        self.return_to = Some((return_to.to_string(), return_mode));
        Ok(())
    }

    /// Cross-fade to `name` keeping the current play mode
    pub fn cross_fade(&mut self, name: &str, duration: f32) -> Result<()> {
        let mode = self.current_mode().unwrap_or_default();
        self.play(name, mode, duration)
    }

    /// Stop playback. With `blend_out > 0` the last pose fades back to the
    /// bind pose over that many seconds; otherwise the touched bones return
    /// to their bind pose on the next update.
    pub fn stop(&mut self, blend_out: f32) {
        self.current = None;
        self.previous = None;
        self.blend = None;
        self.return_to = None;
        self.paused = false;

        if blend_out > 0.0 && !self.last_pose.is_empty() {
            self.fade_out = Some(FadeOut {
                blend: Blend {
                    elapsed: 0.0,
                    duration: blend_out,
                },
                from: self.last_pose.clone(),
            });
            self.release_pending = false;
        } else {
            self.fade_out = None;
            self.release_pending = true;
        }
        log::debug!("Layer '{}': stop (blend out {})", self.name, blend_out);
    }

    /// Freeze time; the held pose is still written each update.
    ///
    /// Pausing a fade-out holds the fade where it is until [`resume`](Self::resume).
    pub fn pause(&mut self) {
        if self.current.is_some() || self.fade_out.is_some() {
            self.paused = true;
        }
    }

    /// Let time run again after [`pause`](Self::pause)
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Playback rate multiplier for this layer (1.0 is normal speed)
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Blend time used when a one-shot returns to its target clip
    pub fn set_default_blend_time(&mut self, seconds: f32) {
        self.config.default_blend_time = seconds;
    }

    pub fn default_blend_time(&self) -> f32 {
        self.config.default_blend_time
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Current state of the transition machine
    pub fn state(&self) -> LayerState {
        if self.fade_out.is_some() {
            if self.paused {
                LayerState::Paused
            } else {
                LayerState::FadingOut
            }
        } else if self.current.is_none() {
            LayerState::Stopped
        } else if self.paused {
            LayerState::Paused
        } else if self.blend.is_some() {
            LayerState::Blending
        } else {
            LayerState::Playing
        }
    }

    /// Name of the active clip
    pub fn current_clip(&self) -> Option<&str> {
        self.current.as_ref().map(|(name, _)| name.as_str())
    }

    /// Time of the active clip in ticks (0 when stopped)
    pub fn current_time(&self) -> f32 {
        self.current.as_ref().map_or(0.0, |(_, p)| p.time())
    }

    pub fn current_mode(&self) -> Option<PlayMode> {
        self.current.as_ref().map(|(_, p)| p.mode())
    }

    /// `name` is the active clip and time is running
    pub fn is_playing(&self, name: &str) -> bool {
        !self.paused && self.current_clip() == Some(name)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_blending(&self) -> bool {
        self.blend.is_some()
    }

    /// A one-shot return is pending
    pub fn is_one_shot(&self) -> bool {
        self.return_to.is_some()
    }

    /// Progress of the running cross-fade in `[0, 1]`
    pub fn blend_factor(&self) -> Option<f32> {
        self.blend.map(|b| b.factor())
    }

    // -------------------------------------------------------------------------
    // Frame update
    // -------------------------------------------------------------------------

    /// Advance by `dt` seconds and write this layer's pose into `skeleton`
    pub fn update(&mut self, dt: f32, skeleton: &mut Skeleton) {
        let dt = dt * self.speed * self.config.global_speed;

        if self.release_pending {
            self.release(skeleton);
        }

        if self.fade_out.is_some() {
            let dt = if self.paused { 0.0 } else { dt };
            self.update_fade_out(dt, skeleton);
            return;
        }

        let mut completed = false;
        if !self.paused {
            if let Some((_, current)) = &mut self.current {
                completed = current.advance(dt);
            }
            if let Some(previous) = &mut self.previous {
                previous.advance(dt);
            }
            if let Some(blend) = &mut self.blend {
                blend.elapsed += dt;
            }
        }

        if self.blend.is_some_and(|b| b.factor() >= 1.0) {
            self.blend = None;
            self.previous = None;
        }

        let pose = self.sample_pose(skeleton);
        self.write_pose(skeleton, pose);

        if completed {
            self.finish_one_shot();
        }
    }

    fn sample_pose(&self, skeleton: &Skeleton) -> Vec<(usize, BoneTransform)> {
        let Some((_, current)) = &self.current else {
            return Vec::new();
        };

        let (Some(previous), Some(blend)) = (&self.previous, &self.blend) else {
            return current.sample();
        };

        let factor = blend.factor();
        let mut from: BTreeMap<usize, BoneTransform> = previous.sample().into_iter().collect();
        let to: BTreeMap<usize, BoneTransform> = current.sample().into_iter().collect();

        // Bones only the incoming clip drives start from the bind pose
        for &bone in to.keys() {
            from.entry(bone).or_insert_with(|| {
                let (position, rotation) = skeleton.bind_pose_components(bone);
                BoneTransform::new(position, rotation)
            });
        }

        from.into_iter()
            .map(|(bone, start)| {
                // Bones the incoming clip does not drive hold the outgoing pose
                let end = to.get(&bone).copied().unwrap_or(start);
                (bone, start.lerp(&end, factor))
            })
            .collect()
    }

    fn write_pose(&mut self, skeleton: &mut Skeleton, pose: Vec<(usize, BoneTransform)>) {
        for (bone, transform) in pose {
            skeleton.set_bone_pose(bone, transform.position, transform.rotation);
            self.last_pose.insert(bone, transform);
        }
    }

    fn update_fade_out(&mut self, dt: f32, skeleton: &mut Skeleton) {
        let Some(fade) = &mut self.fade_out else {
            return;
        };
        fade.blend.elapsed += dt;
        let factor = fade.blend.factor();

        if factor >= 1.0 {
            self.fade_out = None;
            self.release(skeleton);
            return;
        }

        for (&bone, from) in &fade.from {
            let (position, rotation) = skeleton.bind_pose_components(bone);
            let t = from.lerp(&BoneTransform::new(position, rotation), factor);
            skeleton.set_bone_pose(bone, t.position, t.rotation);
        }
    }

    /// Return every bone this layer has written to its bind pose
    fn release(&mut self, skeleton: &mut Skeleton) {
        for &bone in self.last_pose.keys() {
            skeleton.set_bone_static(bone);
        }
        self.last_pose.clear();
        self.release_pending = false;
    }

    fn finish_one_shot(&mut self) {
        let Some((target, mode)) = self.return_to.take() else {
            return;
        };
        let blend = self.config.default_blend_time;
        if let Err(e) = self.play(&target, mode, blend) {
            log::warn!("Layer '{}': one-shot return to '{}' failed: {}", self.name, target, e);
        }
    }
}
