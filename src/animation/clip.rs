//! Animation clip and keyframe system
//!
//! Clips are immutable once built: playback position lives in
//! [`ClipPlayback`](super::playback::ClipPlayback), so one clip can be shared
//! by any number of layers and skeletons.

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::core::config::DEFAULT_TICKS_PER_SECOND;

/// A single keyframe: translation and rotation at a point in clip ticks
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationKeyframe {
    pub time: f32,
    pub position: Vec3,
    pub rotation: Quat,
}

impl AnimationKeyframe {
    /// Create a new keyframe with the given transform
    pub fn new(time: f32, position: Vec3, rotation: Quat) -> Self {
        Self {
            time,
            position,
            rotation,
        }
    }

    /// Create an identity transform keyframe at the given time
    pub fn identity(time: f32) -> Self {
        Self::new(time, Vec3::ZERO, Quat::IDENTITY)
    }

    /// Local bone matrix: translation * rotation
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }
}

/// Spherical interpolation along the shorter arc.
///
/// Exactly opposite-signed inputs (dot product within epsilon of zero) are
/// not flipped, so a half turn is split about its own axis.
pub fn slerp(from: Quat, to: Quat, t: f32) -> Quat {
    let a = Vec4::from(from);
    let mut b = Vec4::from(to);
    let mut dot = a.dot(b);

    if dot < -f32::EPSILON {
        b = -b;
        dot = -dot;
    }

    // Nearly parallel: fall back to a normalized lerp
    if dot > 0.9995 {
        return Quat::from_vec4(a.lerp(b, t)).normalize();
    }

    let theta = dot.clamp(-1.0, 1.0).acos();
    let sin_theta = theta.sin();
    let wa = ((1.0 - t) * theta).sin() / sin_theta;
    let wb = (t * theta).sin() / sin_theta;

    Quat::from_vec4(a * wa + b * wb).normalize()
}

/// Keyframe timeline for one named bone
#[derive(Clone, Debug, Default)]
pub struct AnimationChannel {
    pub bone_name: String,
    pub keyframes: Vec<AnimationKeyframe>,
}

impl AnimationChannel {
    /// Create a new empty channel
    pub fn new(bone_name: impl Into<String>) -> Self {
        Self {
            bone_name: bone_name.into(),
            keyframes: Vec::new(),
        }
    }

    /// Add a keyframe (maintains sorted order by time; equal times keep insertion order)
    pub fn add_keyframe(&mut self, keyframe: AnimationKeyframe) {
        let pos = self.keyframes.partition_point(|k| k.time <= keyframe.time);
        self.keyframes.insert(pos, keyframe);
    }

    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Index of the first keyframe of the pair bracketing `time`, with the
    /// blend factor between it and the next.
    ///
    /// `None` means `time` is outside the keyframe range (or there is at most
    /// one keyframe) and the caller should clamp.
    fn bracket(&self, time: f32) -> Option<(usize, f32)> {
        if self.keyframes.len() < 2 {
            return None;
        }
        if time <= self.keyframes[0].time || time >= self.keyframes[self.keyframes.len() - 1].time {
            return None;
        }

        self.keyframes.windows(2).position(|pair| time >= pair[0].time && time <= pair[1].time).map(|i| {
            let t0 = self.keyframes[i].time;
            let t1 = self.keyframes[i + 1].time;
            let span = t1 - t0;
            let factor = if span > 0.0 { (time - t0) / span } else { 0.0 };
            (i, factor)
        })
    }

    /// Keyframe used when `time` does not fall strictly inside the range
    fn clamped(&self, time: f32) -> Option<&AnimationKeyframe> {
        let first = self.keyframes.first()?;
        if time <= first.time {
            Some(first)
        } else {
            self.keyframes.last()
        }
    }

    /// Linearly interpolated position at `time` (ticks)
    pub fn interpolate_position(&self, time: f32) -> Vec3 {
        match self.bracket(time) {
            Some((i, factor)) => self.keyframes[i].position.lerp(self.keyframes[i + 1].position, factor),
            None => self.clamped(time).map_or(Vec3::ZERO, |k| k.position),
        }
    }

    /// Spherically interpolated rotation at `time` (ticks)
    pub fn interpolate_rotation(&self, time: f32) -> Quat {
        match self.bracket(time) {
            Some((i, factor)) => slerp(self.keyframes[i].rotation, self.keyframes[i + 1].rotation, factor),
            None => self.clamped(time).map_or(Quat::IDENTITY, |k| k.rotation),
        }
    }

    /// Position and rotation at `time`
    pub fn sample(&self, time: f32) -> (Vec3, Quat) {
        (self.interpolate_position(time), self.interpolate_rotation(time))
    }

    /// Get the duration of this channel (time of last keyframe)
    pub fn duration(&self) -> f32 {
        self.keyframes.last().map(|k| k.time).unwrap_or(0.0)
    }
}

/// A complete animation clip containing channels for multiple bones
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    /// Length in ticks
    pub duration: f32,
    pub ticks_per_second: f32,
    pub channels: Vec<AnimationChannel>,
}

impl AnimationClip {
    /// Create a new empty animation clip
    pub fn new(name: impl Into<String>, duration: f32, ticks_per_second: f32) -> Self {
        Self {
            name: name.into(),
            duration,
            ticks_per_second,
            channels: Vec::new(),
        }
    }

    /// Add a channel to this clip
    pub fn add_channel(&mut self, channel: AnimationChannel) {
        self.channels.push(channel);
    }

    /// Find the channel driving a bone by name
    pub fn find_channel(&self, bone_name: &str) -> Option<&AnimationChannel> {
        self.channels.iter().find(|c| c.bone_name == bone_name)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Playback rate, falling back to the default for a non-positive value
    pub fn ticks_per_second(&self) -> f32 {
        if self.ticks_per_second > 0.0 {
            self.ticks_per_second
        } else {
            DEFAULT_TICKS_PER_SECOND
        }
    }

    /// Length in seconds at the clip's own rate
    pub fn duration_seconds(&self) -> f32 {
        self.duration / self.ticks_per_second()
    }

    /// Wrap a tick time into `[0, duration)`
    pub fn wrap_time(&self, time: f32) -> f32 {
        if self.duration > 0.0 {
            time.rem_euclid(self.duration)
        } else {
            0.0
        }
    }

    /// Set the duration from the latest keyframe across all channels
    pub fn calculate_duration(&mut self) {
        self.duration = self
            .channels
            .iter()
            .map(|c| c.duration())
            .fold(0.0f32, |a, b| a.max(b));
    }
}
