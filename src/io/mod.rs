//! Binary I/O primitives for the asset containers

pub mod stream;
pub mod chunk;

pub use stream::{ByteStream, Endian};
pub use chunk::{ChunkHeader, ChunkSpan, FourCC};
