//! Per-instance playback state over shared, immutable clips

use std::sync::Arc;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::clip::{AnimationClip, slerp};
use super::skeleton::Skeleton;

/// How a clip behaves when playback reaches its end
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayMode {
    /// Play to the end and hold the last frame
    Once,
    /// Wrap back to the start
    #[default]
    Loop,
    /// Reverse direction at either end
    PingPong,
}

/// Local translation and rotation of one bone
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl BoneTransform {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Interpolate toward `to`; the endpoints are returned unchanged
    pub fn lerp(&self, to: &BoneTransform, factor: f32) -> BoneTransform {
        if factor <= 0.0 {
            return *self;
        }
        if factor >= 1.0 {
            return *to;
        }
        BoneTransform {
            position: self.position.lerp(to.position, factor),
            rotation: slerp(self.rotation, to.rotation, factor),
        }
    }
}

/// Channel-to-bone mapping of a clip against one skeleton
#[derive(Clone, Debug, Default)]
pub struct ClipBinding {
    bones: Vec<Option<usize>>,
}

impl ClipBinding {
    /// Resolve every channel's bone name; unmatched channels are skipped with a warning
    pub fn bind(clip: &AnimationClip, skeleton: &Skeleton) -> Self {
        let bones = clip
            .channels
            .iter()
            .map(|channel| {
                let bone = skeleton.find_bone_index(&channel.bone_name);
                if bone.is_none() {
                    log::warn!("Clip '{}': bone not found: {}", clip.name, channel.bone_name);
                }
                bone
            })
            .collect();
        Self { bones }
    }

    /// Bone driven by a channel, if it was found
    pub fn bone_for(&self, channel: usize) -> Option<usize> {
        self.bones.get(channel).copied().flatten()
    }

    /// `(channel, bone)` pairs for every bound channel
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter_map(|(channel, bone)| bone.map(|b| (channel, b)))
    }

    pub fn bound_count(&self) -> usize {
        self.bones.iter().filter(|b| b.is_some()).count()
    }
}

/// Playback cursor for one clip: time in ticks, direction and mode
#[derive(Clone, Debug)]
pub struct ClipPlayback {
    clip: Arc<AnimationClip>,
    binding: Arc<ClipBinding>,
    time: f32,
    reversed: bool,
    mode: PlayMode,
    finished: bool,
}

impl ClipPlayback {
    /// Start at tick 0, running forwards
    pub fn new(clip: Arc<AnimationClip>, binding: Arc<ClipBinding>, mode: PlayMode) -> Self {
        Self {
            clip,
            binding,
            time: 0.0,
            reversed: false,
            mode,
            finished: false,
        }
    }

    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    pub fn binding(&self) -> &ClipBinding {
        &self.binding
    }

    /// Current position in ticks
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Jump to `ticks`, clamped to the clip. Clears the finished flag.
    pub fn set_time(&mut self, ticks: f32) {
        self.time = ticks.clamp(0.0, self.clip.duration.max(0.0));
        self.finished = false;
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    /// Change mode in place, keeping the current time
    pub fn set_mode(&mut self, mode: PlayMode) {
        if mode != PlayMode::PingPong {
            self.reversed = false;
        }
        if mode != PlayMode::Once {
            self.finished = false;
        }
        self.mode = mode;
    }

    /// Whether a ping-pong cursor is currently running backwards
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Once-mode playback that has reached the end
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advance by wall-clock seconds (already scaled by speed).
    ///
    /// Returns `true` when a single pass completes during this call: a Once
    /// clip reaching its end or a ping-pong cursor arriving back at the start.
    pub fn advance(&mut self, seconds: f32) -> bool {
        let duration = self.clip.duration;
        let delta = seconds * self.clip.ticks_per_second();

        if duration <= 0.0 {
            self.time = 0.0;
            if self.mode == PlayMode::Once && !self.finished {
                self.finished = true;
                return true;
            }
            return false;
        }

        match self.mode {
            PlayMode::Loop => {
                self.time = (self.time + delta).rem_euclid(duration);
                false
            }
            PlayMode::Once => {
                if self.finished {
                    return false;
                }
                self.time = (self.time + delta).max(0.0);
                if self.time >= duration {
                    self.time = duration;
                    self.finished = true;
                    return true;
                }
                false
            }
            PlayMode::PingPong => {
                // Unfold the bounce into a forward walk over [0, 2 * duration)
                let period = 2.0 * duration;
                let unfolded = if self.reversed { period - self.time } else { self.time };
                let walked = unfolded + delta;
                let phase = walked.rem_euclid(period);

                if phase <= duration {
                    self.time = phase;
                    self.reversed = false;
                } else {
                    self.time = period - phase;
                    self.reversed = true;
                }
                walked >= period
            }
        }
    }

    /// Sample one channel at the current time
    pub fn sample_channel(&self, channel: usize) -> Option<BoneTransform> {
        let channel = self.clip.channels.get(channel)?;
        let (position, rotation) = channel.sample(self.time);
        Some(BoneTransform::new(position, rotation))
    }

    /// Sample every bound channel as `(bone, transform)`
    pub fn sample(&self) -> Vec<(usize, BoneTransform)> {
        self.binding
            .iter()
            .filter_map(|(channel, bone)| self.sample_channel(channel).map(|t| (bone, t)))
            .collect()
    }

    /// Write the sampled pose into the skeleton
    pub fn apply(&self, skeleton: &mut Skeleton) {
        for (bone, transform) in self.sample() {
            skeleton.set_bone_pose(bone, transform.position, transform.rotation);
        }
    }
}
