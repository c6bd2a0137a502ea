//! Animation clip container (`ANIM`): one `INFO` chunk then a `CHAN` chunk per bone

use std::io::{Read, Seek, Write};
use std::path::Path;

use glam::{Quat, Vec3};

use crate::core::{Error, Result};
use crate::io::ByteStream;
use crate::io::chunk::{
    ANIM_MAGIC, CHUNK_CHAN, CHUNK_INFO, ChunkSpan, begin_chunk, end_chunk, finish_chunk, fourcc_name, next_chunk,
    read_file_header, skip_chunk, write_file_header,
};

use super::clip::{AnimationChannel, AnimationClip, AnimationKeyframe};

/// Current clip container version
pub const CLIP_VERSION: u32 = 100;

/// Width of the NUL-padded name field in `INFO`
pub const CLIP_NAME_LEN: usize = 64;

/// Bytes per stored keyframe: time, position, rotation, scale
const KEYFRAME_SIZE: u64 = 4 * (1 + 3 + 4 + 3);

/// Read a clip from a stream positioned at the container header
pub fn read_clip<S: Read + Seek>(stream: &mut ByteStream<S>) -> Result<AnimationClip> {
    let limit = stream.size()?;
    read_file_header(stream, ANIM_MAGIC, CLIP_VERSION)?;

    let mut clip = AnimationClip::new(String::new(), 0.0, 0.0);
    let mut declared_channels = None;

    while let Some(span) = next_chunk(stream, limit)? {
        match span.id() {
            CHUNK_INFO => {
                declared_channels = Some(read_info(stream, &mut clip)?);
                finish_chunk(stream, &span)?;
            }
            CHUNK_CHAN => {
                let channel = read_channel(stream, &span)?;
                clip.add_channel(channel);
                finish_chunk(stream, &span)?;
            }
            other => {
                log::warn!("Skipping unknown clip chunk {} ({} bytes)", fourcc_name(other), span.header.length);
                skip_chunk(stream, &span)?;
            }
        }
    }

    match declared_channels {
        None => {
            log::warn!("Clip has no INFO chunk; duration taken from keyframes");
            clip.calculate_duration();
        }
        Some(count) if count as usize != clip.channel_count() => {
            log::debug!("Clip '{}' declares {} channels, found {}", clip.name, count, clip.channel_count());
        }
        Some(_) => {}
    }

    if clip.ticks_per_second <= 0.0 {
        log::warn!("Clip '{}' has non-positive ticks per second ({})", clip.name, clip.ticks_per_second);
    }

    Ok(clip)
}

fn read_info<S: Read + Seek>(stream: &mut ByteStream<S>, clip: &mut AnimationClip) -> Result<u32> {
    clip.name = stream.read_fixed_string(CLIP_NAME_LEN)?;
    clip.duration = stream.read_f32()?;
    clip.ticks_per_second = stream.read_f32()?;
    Ok(stream.read_u32()?)
}

fn read_channel<S: Read + Seek>(stream: &mut ByteStream<S>, span: &ChunkSpan) -> Result<AnimationChannel> {
    let mut channel = AnimationChannel::new(stream.read_cstring()?);
    let count = stream.read_u32()?;

    let available = span.end.saturating_sub(stream.tell()?);
    if u64::from(count) * KEYFRAME_SIZE > available {
        return Err(Error::Format(format!(
            "channel '{}' declares {} keyframes but its chunk holds {} bytes",
            channel.bone_name, count, available
        )));
    }

    channel.keyframes.reserve(count as usize);
    for _ in 0..count {
        let time = stream.read_f32()?;
        let position = Vec3::new(stream.read_f32()?, stream.read_f32()?, stream.read_f32()?);
        let rotation = Quat::from_xyzw(
            stream.read_f32()?,
            stream.read_f32()?,
            stream.read_f32()?,
            stream.read_f32()?,
        );
        // Scale is reserved by the format and not animated
        for _ in 0..3 {
            stream.read_f32()?;
        }
        channel.add_keyframe(AnimationKeyframe::new(time, position, rotation));
    }

    Ok(channel)
}

/// Write a clip container
pub fn write_clip<S: Write + Seek>(stream: &mut ByteStream<S>, clip: &AnimationClip) -> Result<()> {
    write_file_header(stream, ANIM_MAGIC, CLIP_VERSION)?;

    let info = begin_chunk(stream, CHUNK_INFO)?;
    stream.write_fixed_string(&clip.name, CLIP_NAME_LEN)?;
    stream.write_f32(clip.duration)?;
    stream.write_f32(clip.ticks_per_second)?;
    stream.write_u32(clip.channel_count() as u32)?;
    end_chunk(stream, info)?;

    for channel in &clip.channels {
        let chan = begin_chunk(stream, CHUNK_CHAN)?;
        stream.write_cstring(&channel.bone_name)?;
        stream.write_u32(channel.keyframes.len() as u32)?;
        for key in &channel.keyframes {
            stream.write_f32(key.time)?;
            for v in key.position.to_array() {
                stream.write_f32(v)?;
            }
            for v in key.rotation.to_array() {
                stream.write_f32(v)?;
            }
            for v in Vec3::ONE.to_array() {
                stream.write_f32(v)?;
            }
        }
        end_chunk(stream, chan)?;
    }

    Ok(())
}

/// Load a clip file
pub fn load_clip(path: impl AsRef<Path>) -> Result<AnimationClip> {
    let path = path.as_ref();
    let mut stream = ByteStream::open_file(path)?;
    let clip = read_clip(&mut stream)?;
    log::info!(
        "Loaded clip '{}' from {}: {} channels, {} ticks at {} tps",
        clip.name,
        path.display(),
        clip.channel_count(),
        clip.duration,
        clip.ticks_per_second
    );
    Ok(clip)
}

/// Save a clip file
pub fn save_clip(clip: &AnimationClip, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut stream = ByteStream::create_file(path)?;
    write_clip(&mut stream, clip)?;
    stream.flush()?;
    log::info!("Saved clip '{}' to {}", clip.name, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_clip() -> AnimationClip {
        let mut clip = AnimationClip::new("run", 24.0, 30.0);

        let mut hips = AnimationChannel::new("hips");
        hips.add_keyframe(AnimationKeyframe::new(0.0, Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY));
        hips.add_keyframe(AnimationKeyframe::new(12.0, Vec3::new(0.0, 1.2, 0.5), Quat::from_rotation_y(0.25)));
        hips.add_keyframe(AnimationKeyframe::new(24.0, Vec3::new(0.0, 1.0, 1.0), Quat::IDENTITY));
        clip.add_channel(hips);

        let mut spine = AnimationChannel::new("spine");
        spine.add_keyframe(AnimationKeyframe::new(0.0, Vec3::ZERO, Quat::from_rotation_x(0.1)));
        clip.add_channel(spine);

        clip
    }

    fn to_bytes(clip: &AnimationClip) -> Vec<u8> {
        let mut stream = ByteStream::memory();
        write_clip(&mut stream, clip).unwrap();
        stream.into_bytes()
    }

    #[test]
    fn test_round_trip() {
        let clip = sample_clip();
        let mut stream = ByteStream::from_bytes(to_bytes(&clip));
        let loaded = read_clip(&mut stream).unwrap();

        assert_eq!(loaded.name, "run");
        assert_eq!(loaded.duration, 24.0);
        assert_eq!(loaded.ticks_per_second, 30.0);
        assert_eq!(loaded.channel_count(), 2);

        for (a, b) in clip.channels.iter().zip(loaded.channels.iter()) {
            assert_eq!(a.bone_name, b.bone_name);
            assert_eq!(a.keyframes, b.keyframes);
        }
    }

    #[test]
    fn test_info_layout() {
        let bytes = to_bytes(&sample_clip());
        // magic, version, INFO id, INFO length
        assert_eq!(&bytes[0..4], &ANIM_MAGIC.to_le_bytes());
        assert_eq!(&bytes[4..8], &CLIP_VERSION.to_le_bytes());
        assert_eq!(&bytes[8..12], &CHUNK_INFO.to_le_bytes());
        assert_eq!(&bytes[12..16], &((CLIP_NAME_LEN + 12) as u32).to_le_bytes());
        assert_eq!(&bytes[16..19], b"run");
        assert!(bytes[19..16 + CLIP_NAME_LEN].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_long_name_truncated() {
        let mut clip = sample_clip();
        clip.name = "x".repeat(100);
        let mut stream = ByteStream::from_bytes(to_bytes(&clip));
        let loaded = read_clip(&mut stream).unwrap();
        assert_eq!(loaded.name.len(), CLIP_NAME_LEN - 1);
    }

    #[test]
    fn test_unknown_chunk_skipped() {
        crate::core::logging::init_for_tests();
        let clip = sample_clip();
        let mut stream = ByteStream::memory();
        write_file_header(&mut stream, ANIM_MAGIC, CLIP_VERSION).unwrap();
        let extra = begin_chunk(&mut stream, 0x5854_5241).unwrap();
        stream.write_bytes(&[1, 2, 3, 4, 5]).unwrap();
        end_chunk(&mut stream, extra).unwrap();

        // Append the real chunks after the foreign one
        let original = to_bytes(&clip);
        stream.write_bytes(&original[8..]).unwrap();

        let mut reader = ByteStream::from_bytes(stream.into_bytes());
        let loaded = read_clip(&mut reader).unwrap();
        assert_eq!(loaded.channel_count(), 2);
        assert_eq!(loaded.name, "run");
    }

    #[test]
    fn test_invalid_magic() {
        let mut stream = ByteStream::memory();
        stream.write_u32(0xDEAD_BEEF).unwrap();
        stream.write_u32(CLIP_VERSION).unwrap();
        let mut reader = ByteStream::from_bytes(stream.into_bytes());
        assert!(matches!(read_clip(&mut reader), Err(Error::InvalidMagic { .. })));
    }

    #[test]
    fn test_truncated_keyframes_rejected() {
        let mut stream = ByteStream::memory();
        write_file_header(&mut stream, ANIM_MAGIC, CLIP_VERSION).unwrap();
        let chan = begin_chunk(&mut stream, CHUNK_CHAN).unwrap();
        stream.write_cstring("hips").unwrap();
        stream.write_u32(1000).unwrap();
        end_chunk(&mut stream, chan).unwrap();

        let mut reader = ByteStream::from_bytes(stream.into_bytes());
        assert!(matches!(read_clip(&mut reader), Err(Error::Format(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.anim");
        save_clip(&sample_clip(), &path).unwrap();

        let loaded = load_clip(&path).unwrap();
        assert_eq!(loaded.channel_count(), 2);
        assert!(loaded.find_channel("spine").is_some());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_clip(dir.path().join("none.anim")), Err(Error::Io(_))));
    }
}
