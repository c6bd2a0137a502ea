//! Seekable binary stream with a switchable byte order
//!
//! Every asset format in the crate goes through [`ByteStream`]: integers and
//! floats in the stream's [`Endian`], length-prefixed ("UTF") strings with a
//! `u16` length, and NUL-terminated strings.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

/// Byte order used for multi-byte values
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Binary reader/writer over any seekable byte source or sink
#[derive(Debug)]
pub struct ByteStream<S> {
    inner: S,
    endian: Endian,
}

macro_rules! endian_reads {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Read a `", stringify!($ty), "` in the stream byte order")]
            pub fn $name(&mut self) -> io::Result<$ty> {
                match self.endian {
                    Endian::Little => self.inner.$name::<LittleEndian>(),
                    Endian::Big => self.inner.$name::<BigEndian>(),
                }
            }
        )*
    };
}

macro_rules! endian_writes {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Write a `", stringify!($ty), "` in the stream byte order")]
            pub fn $name(&mut self, value: $ty) -> io::Result<()> {
                match self.endian {
                    Endian::Little => self.inner.$name::<LittleEndian>(value),
                    Endian::Big => self.inner.$name::<BigEndian>(value),
                }
            }
        )*
    };
}

impl<S> ByteStream<S> {
    /// Wrap a stream using little-endian byte order
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            endian: Endian::Little,
        }
    }

    /// Wrap a stream with an explicit byte order
    pub fn with_endian(inner: S, endian: Endian) -> Self {
        Self { inner, endian }
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn is_big_endian(&self) -> bool {
        self.endian == Endian::Big
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap the underlying stream
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl ByteStream<Cursor<Vec<u8>>> {
    /// Create an empty in-memory stream
    pub fn memory() -> Self {
        Self::new(Cursor::new(Vec::new()))
    }

    /// Create an in-memory stream positioned at the start of `bytes`
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(Cursor::new(bytes))
    }

    /// Consume the stream and return its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

impl ByteStream<BufReader<File>> {
    /// Open a file for buffered reading
    pub fn open_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl ByteStream<BufWriter<File>> {
    /// Create (or truncate) a file for buffered writing
    pub fn create_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<S: Read> ByteStream<S> {
    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.inner.read_u8()
    }

    pub fn read_i8(&mut self) -> io::Result<i8> {
        self.inner.read_i8()
    }

    pub fn read_bool(&mut self) -> io::Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    endian_reads! {
        read_u16 => u16,
        read_i16 => i16,
        read_u32 => u32,
        read_i32 => i32,
        read_u64 => u64,
        read_i64 => i64,
        read_f32 => f32,
        read_f64 => f64,
    }

    /// Fill `buf` completely or fail with `UnexpectedEof`
    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.inner.read_exact(buf)
    }

    /// Read exactly `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        self.inner.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Read a string prefixed by a `u16` byte length
    pub fn read_utf(&mut self) -> io::Result<String> {
        let len = self.read_u16()? as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read bytes up to a NUL terminator (consumed) or the end of the stream
    pub fn read_cstring(&mut self) -> io::Result<String> {
        let mut bytes = Vec::with_capacity(32);
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == 0 => break,
                Ok(_) => bytes.push(byte[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a fixed-size, NUL-padded string field
    pub fn read_fixed_string(&mut self, len: usize) -> io::Result<String> {
        let bytes = self.read_bytes(len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

impl<S: Write> ByteStream<S> {
    pub fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.inner.write_u8(value)
    }

    pub fn write_i8(&mut self, value: i8) -> io::Result<()> {
        self.inner.write_i8(value)
    }

    pub fn write_bool(&mut self, value: bool) -> io::Result<()> {
        self.write_u8(value as u8)
    }

    endian_writes! {
        write_u16 => u16,
        write_i16 => i16,
        write_u32 => u32,
        write_i32 => i32,
        write_u64 => u64,
        write_i64 => i64,
        write_f32 => f32,
        write_f64 => f64,
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    /// Write a string prefixed by its `u16` byte length
    pub fn write_utf(&mut self, value: &str) -> io::Result<()> {
        let len = u16::try_from(value.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("string of {} bytes exceeds u16 length prefix", value.len()),
            )
        })?;
        self.write_u16(len)?;
        self.write_bytes(value.as_bytes())
    }

    /// Write the string bytes followed by a NUL terminator
    pub fn write_cstring(&mut self, value: &str) -> io::Result<()> {
        if value.as_bytes().contains(&0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "string contains an interior NUL byte",
            ));
        }
        self.write_bytes(value.as_bytes())?;
        self.write_u8(0)
    }

    /// Write a NUL-padded field of exactly `len` bytes.
    ///
    /// At most `len - 1` bytes of `value` are kept so the field is always terminated.
    pub fn write_fixed_string(&mut self, value: &str, len: usize) -> io::Result<()> {
        let mut field = vec![0u8; len];
        let keep = value.len().min(len.saturating_sub(1));
        field[..keep].copy_from_slice(&value.as_bytes()[..keep]);
        self.write_bytes(&field)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<S: Seek> ByteStream<S> {
    pub fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }

    /// Current position from the start of the stream
    pub fn tell(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    /// Total stream length in bytes (position is preserved)
    pub fn size(&mut self) -> io::Result<u64> {
        let pos = self.inner.stream_position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        if pos != end {
            self.inner.seek(SeekFrom::Start(pos))?;
        }
        Ok(end)
    }

    /// Bytes left between the current position and the end
    pub fn remaining(&mut self) -> io::Result<u64> {
        let pos = self.tell()?;
        Ok(self.size()?.saturating_sub(pos))
    }

    pub fn is_eof(&mut self) -> io::Result<bool> {
        Ok(self.remaining()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut stream = ByteStream::memory();
        stream.write_u32(0x4D455348).unwrap();
        stream.write_u16(0x0102).unwrap();
        assert_eq!(stream.into_bytes(), vec![0x48, 0x53, 0x45, 0x4D, 0x02, 0x01]);
    }

    #[test]
    fn test_big_endian_layout() {
        let mut stream = ByteStream::memory();
        stream.set_endian(Endian::Big);
        assert!(stream.is_big_endian());
        stream.write_u32(0x4D455348).unwrap();
        assert_eq!(stream.into_bytes(), b"MESH".to_vec());
    }

    #[test]
    fn test_mixed_values() {
        let mut stream = ByteStream::memory();
        stream.write_i32(-1).unwrap();
        stream.write_f32(1.5).unwrap();
        stream.write_f64(-2.25).unwrap();
        stream.write_i64(i64::MIN).unwrap();
        stream.write_bool(true).unwrap();

        let mut stream = ByteStream::from_bytes(stream.into_bytes());
        assert_eq!(stream.read_i32().unwrap(), -1);
        assert_eq!(stream.read_f32().unwrap(), 1.5);
        assert_eq!(stream.read_f64().unwrap(), -2.25);
        assert_eq!(stream.read_i64().unwrap(), i64::MIN);
        assert!(stream.read_bool().unwrap());
        assert!(stream.is_eof().unwrap());
    }

    #[test]
    fn test_strings() {
        let mut stream = ByteStream::memory();
        stream.write_utf("hips").unwrap();
        stream.write_cstring("mixamorig:LeftArm").unwrap();
        stream.write_cstring("").unwrap();
        stream.write_fixed_string("walk", 8).unwrap();

        let bytes = stream.into_bytes();
        assert_eq!(&bytes[0..2], &[4, 0]);
        assert_eq!(bytes.len(), 2 + 4 + 18 + 1 + 8);

        let mut stream = ByteStream::from_bytes(bytes);
        assert_eq!(stream.read_utf().unwrap(), "hips");
        assert_eq!(stream.read_cstring().unwrap(), "mixamorig:LeftArm");
        assert_eq!(stream.read_cstring().unwrap(), "");
        assert_eq!(stream.read_fixed_string(8).unwrap(), "walk");
    }

    #[test]
    fn test_fixed_string_truncates() {
        let mut stream = ByteStream::memory();
        stream.write_fixed_string("abcdefgh", 4).unwrap();
        let bytes = stream.into_bytes();
        assert_eq!(bytes, vec![b'a', b'b', b'c', 0]);
    }

    #[test]
    fn test_cstring_without_terminator_reads_to_end() {
        let mut stream = ByteStream::from_bytes(b"tail".to_vec());
        assert_eq!(stream.read_cstring().unwrap(), "tail");
        assert!(stream.is_eof().unwrap());
    }

    #[test]
    fn test_cstring_rejects_interior_nul() {
        let mut stream = ByteStream::memory();
        assert!(stream.write_cstring("a\0b").is_err());
    }

    #[test]
    fn test_seek_tell_size() {
        let mut stream = ByteStream::memory();
        stream.write_u32(0).unwrap();
        stream.write_u32(7).unwrap();
        assert_eq!(stream.tell().unwrap(), 8);

        stream.seek(SeekFrom::Start(0)).unwrap();
        stream.write_u32(42).unwrap();
        assert_eq!(stream.tell().unwrap(), 4);
        assert_eq!(stream.size().unwrap(), 8);
        assert_eq!(stream.tell().unwrap(), 4);
        assert_eq!(stream.remaining().unwrap(), 4);

        stream.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(stream.read_u32().unwrap(), 42);
        assert_eq!(stream.read_u32().unwrap(), 7);
        assert!(stream.is_eof().unwrap());
    }

    #[test]
    fn test_read_past_end_fails() {
        let mut stream = ByteStream::from_bytes(vec![1, 2]);
        let err = stream.read_u32().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_file_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");

        let mut writer = ByteStream::create_file(&path).unwrap();
        writer.write_utf("bone").unwrap();
        writer.write_f32(3.0).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let mut reader = ByteStream::open_file(&path).unwrap();
        assert_eq!(reader.size().unwrap(), 10);
        assert_eq!(reader.read_utf().unwrap(), "bone");
        assert_eq!(reader.read_f32().unwrap(), 3.0);
    }
}
