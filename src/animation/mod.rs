//! Skeletal animation system

pub mod skeleton;
pub mod clip;
pub mod clip_format;
pub mod playback;
pub mod layer;
pub mod animator;
pub mod skinning;

pub use skeleton::{Bone, Skeleton, SkeletonBuilder};
pub use clip::{AnimationChannel, AnimationClip, AnimationKeyframe};
pub use clip_format::{load_clip, read_clip, save_clip, write_clip, CLIP_VERSION};
pub use playback::{BoneTransform, ClipBinding, ClipPlayback, PlayMode};
pub use layer::{AnimationLayer, LayerState};
pub use animator::Animator;
pub use skinning::skin_buffer;
