//! Chunk framing shared by the mesh and clip containers
//!
//! A container is `magic:u32, version:u32` followed by `(id:u32, length:u32,
//! payload)` records. `length` counts the payload bytes only, so a reader can
//! always skip a chunk it does not understand.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::core::{Error, Result};
use super::stream::ByteStream;

/// Four-character chunk identifier stored as a `u32`
pub type FourCC = u32;

pub const MESH_MAGIC: FourCC = 0x4D45_5348; // "MESH"
pub const ANIM_MAGIC: FourCC = 0x414E_494D; // "ANIM"

pub const CHUNK_MATS: FourCC = 0x4D41_5453; // "MATS"
pub const CHUNK_SKEL: FourCC = 0x534B_454C; // "SKEL"
pub const CHUNK_BUFF: FourCC = 0x4255_4646; // "BUFF"
pub const CHUNK_VRTS: FourCC = 0x5652_5453; // "VRTS"
pub const CHUNK_IDXS: FourCC = 0x4944_5853; // "IDXS"
pub const CHUNK_SKIN: FourCC = 0x534B_494E; // "SKIN"
pub const CHUNK_INFO: FourCC = 0x494E_464F; // "INFO"
pub const CHUNK_CHAN: FourCC = 0x4348_414E; // "CHAN"

/// Render a chunk id as its four ASCII characters for diagnostics
pub fn fourcc_name(id: FourCC) -> String {
    id.to_be_bytes()
        .iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
        .collect()
}

/// `(id, length)` record preceding each payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: FourCC,
    pub length: u32,
}

impl ChunkHeader {
    pub const SIZE: u64 = 8;

    pub fn read<S: Read>(stream: &mut ByteStream<S>) -> Result<Self> {
        Ok(Self {
            id: stream.read_u32()?,
            length: stream.read_u32()?,
        })
    }
}

/// A chunk located in a stream: header plus absolute payload bounds
#[derive(Clone, Copy, Debug)]
pub struct ChunkSpan {
    pub header: ChunkHeader,
    pub payload_start: u64,
    pub end: u64,
}

impl ChunkSpan {
    pub fn id(&self) -> FourCC {
        self.header.id
    }
}

/// Write `magic` and `version`
pub fn write_file_header<S: Write>(
    stream: &mut ByteStream<S>,
    magic: FourCC,
    version: u32,
) -> Result<()> {
    stream.write_u32(magic)?;
    stream.write_u32(version)?;
    Ok(())
}

/// Read and validate `magic` and `version`, returning the file version.
///
/// Versions are `major * 100 + minor`; any minor revision of a supported
/// major version is accepted.
pub fn read_file_header<S: Read>(
    stream: &mut ByteStream<S>,
    magic: FourCC,
    supported_version: u32,
) -> Result<u32> {
    let found = stream.read_u32()?;
    if found != magic {
        return Err(Error::InvalidMagic {
            expected: magic,
            found,
        });
    }

    let version = stream.read_u32()?;
    if version / 100 > supported_version / 100 {
        return Err(Error::UnsupportedVersion {
            found: version,
            supported: supported_version,
        });
    }
    if version != supported_version {
        log::debug!("Reading {} file version {} (native {})", fourcc_name(magic), version, supported_version);
    }
    Ok(version)
}

/// Start a chunk: writes the id and a placeholder length.
///
/// Returns the payload start position to hand to [`end_chunk`].
pub fn begin_chunk<S: Write + Seek>(stream: &mut ByteStream<S>, id: FourCC) -> Result<u64> {
    stream.write_u32(id)?;
    stream.write_u32(0)?;
    Ok(stream.tell()?)
}

/// Back-patch the length of the chunk whose payload began at `payload_start`
pub fn end_chunk<S: Write + Seek>(stream: &mut ByteStream<S>, payload_start: u64) -> Result<()> {
    let current = stream.tell()?;
    let length = u32::try_from(current - payload_start)
        .map_err(|_| Error::Format(format!("chunk payload of {} bytes is too large", current - payload_start)))?;

    stream.seek(SeekFrom::Start(payload_start - 4))?;
    stream.write_u32(length)?;
    stream.seek(SeekFrom::Start(current))?;
    Ok(())
}

/// Read the next chunk header if a whole header fits before `limit`.
///
/// Returns `None` once fewer than 8 bytes remain. A chunk claiming to extend
/// past `limit` is a format error.
pub fn next_chunk<S: Read + Seek>(stream: &mut ByteStream<S>, limit: u64) -> Result<Option<ChunkSpan>> {
    let pos = stream.tell()?;
    if pos + ChunkHeader::SIZE > limit {
        if pos < limit {
            log::warn!("Ignoring {} trailing bytes", limit - pos);
        }
        return Ok(None);
    }

    let header = ChunkHeader::read(stream)?;
    let payload_start = pos + ChunkHeader::SIZE;
    let end = payload_start + u64::from(header.length);
    if end > limit {
        return Err(Error::Format(format!(
            "chunk {} at offset {} declares {} bytes but only {} remain",
            fourcc_name(header.id),
            pos,
            header.length,
            limit - payload_start
        )));
    }

    Ok(Some(ChunkSpan {
        header,
        payload_start,
        end,
    }))
}

/// Position the stream at the end of `span`, failing if the payload reader overran it
pub fn finish_chunk<S: Read + Seek>(stream: &mut ByteStream<S>, span: &ChunkSpan) -> Result<()> {
    let pos = stream.tell()?;
    if pos > span.end {
        return Err(Error::Format(format!(
            "chunk {} payload overran its declared length by {} bytes",
            fourcc_name(span.id()),
            pos - span.end
        )));
    }
    if pos < span.end {
        stream.seek(SeekFrom::Start(span.end))?;
    }
    Ok(())
}

/// Skip a chunk without interpreting it
pub fn skip_chunk<S: Read + Seek>(stream: &mut ByteStream<S>, span: &ChunkSpan) -> Result<()> {
    stream.seek(SeekFrom::Start(span.end))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_names() {
        assert_eq!(fourcc_name(MESH_MAGIC), "MESH");
        assert_eq!(fourcc_name(CHUNK_SKIN), "SKIN");
        assert_eq!(fourcc_name(CHUNK_CHAN), "CHAN");
        assert_eq!(fourcc_name(0x0041_4200), "?AB?");
    }

    #[test]
    fn test_length_back_patch() {
        let mut stream = ByteStream::memory();
        let start = begin_chunk(&mut stream, CHUNK_MATS).unwrap();
        stream.write_u32(1).unwrap();
        stream.write_cstring("skin").unwrap();
        end_chunk(&mut stream, start).unwrap();

        let bytes = stream.into_bytes();
        assert_eq!(bytes.len(), 8 + 4 + 5);

        let mut stream = ByteStream::from_bytes(bytes);
        let header = ChunkHeader::read(&mut stream).unwrap();
        assert_eq!(header.id, CHUNK_MATS);
        assert_eq!(header.length, 9);
    }

    #[test]
    fn test_nested_chunks() {
        let mut stream = ByteStream::memory();
        let outer = begin_chunk(&mut stream, CHUNK_BUFF).unwrap();
        stream.write_u32(7).unwrap();
        let inner = begin_chunk(&mut stream, CHUNK_VRTS).unwrap();
        stream.write_u32(0).unwrap();
        end_chunk(&mut stream, inner).unwrap();
        end_chunk(&mut stream, outer).unwrap();

        let size = stream.size().unwrap();
        let mut stream = ByteStream::from_bytes(stream.into_bytes());
        let span = next_chunk(&mut stream, size).unwrap().unwrap();
        assert_eq!(span.id(), CHUNK_BUFF);
        assert_eq!(span.header.length, 4 + 8 + 4);
        assert_eq!(stream.read_u32().unwrap(), 7);

        let sub = next_chunk(&mut stream, span.end).unwrap().unwrap();
        assert_eq!(sub.id(), CHUNK_VRTS);
        assert_eq!(sub.header.length, 4);
        finish_chunk(&mut stream, &sub).unwrap();
        assert!(next_chunk(&mut stream, span.end).unwrap().is_none());
    }

    #[test]
    fn test_declared_length_past_end() {
        let mut stream = ByteStream::memory();
        stream.write_u32(CHUNK_SKEL).unwrap();
        stream.write_u32(100).unwrap();
        stream.write_u32(0).unwrap();
        let size = stream.size().unwrap();

        let mut stream = ByteStream::from_bytes(stream.into_bytes());
        assert!(matches!(next_chunk(&mut stream, size), Err(Error::Format(_))));
    }

    #[test]
    fn test_overrun_detected() {
        let mut stream = ByteStream::memory();
        stream.write_u32(CHUNK_IDXS).unwrap();
        stream.write_u32(2).unwrap();
        stream.write_u32(0).unwrap();
        let size = stream.size().unwrap();

        let mut stream = ByteStream::from_bytes(stream.into_bytes());
        let span = next_chunk(&mut stream, size).unwrap().unwrap();
        stream.read_u32().unwrap();
        assert!(matches!(finish_chunk(&mut stream, &span), Err(Error::Format(_))));
    }

    #[test]
    fn test_file_header_versions() {
        let mut stream = ByteStream::memory();
        write_file_header(&mut stream, MESH_MAGIC, 105).unwrap();
        let mut reader = ByteStream::from_bytes(stream.into_bytes());
        assert_eq!(read_file_header(&mut reader, MESH_MAGIC, 100).unwrap(), 105);

        let mut stream = ByteStream::memory();
        write_file_header(&mut stream, MESH_MAGIC, 200).unwrap();
        let mut reader = ByteStream::from_bytes(stream.into_bytes());
        assert!(matches!(
            read_file_header(&mut reader, MESH_MAGIC, 100),
            Err(Error::UnsupportedVersion { found: 200, supported: 100 })
        ));

        let mut stream = ByteStream::memory();
        write_file_header(&mut stream, ANIM_MAGIC, 100).unwrap();
        let mut reader = ByteStream::from_bytes(stream.into_bytes());
        assert!(matches!(
            read_file_header(&mut reader, MESH_MAGIC, 100),
            Err(Error::InvalidMagic { .. })
        ));
    }
}
