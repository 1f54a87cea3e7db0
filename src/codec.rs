use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;

pub trait NumberWriter: Write {
    fn write_u64_le(&mut self, v: u64) -> Result<()> {
        self.write_u64::<LittleEndian>(v).map_err(From::from)
    }

    fn write_u32_le(&mut self, v: u32) -> Result<()> {
        self.write_u32::<LittleEndian>(v).map_err(From::from)
    }

    fn write_u8_le(&mut self, v: u8) -> Result<()> {
        self.write_u8(v).map_err(From::from)
    }
}

impl<T> NumberWriter for T where T: Write {}

pub trait NumberReader {
    fn read_u64_le(&mut self) -> Result<u64>;
}

impl NumberReader for &[u8] {
    fn read_u64_le(&mut self) -> Result<u64> {
        ReadBytesExt::read_u64::<LittleEndian>(self)
            .map_err(|_| Error::Corruption("truncated fixed64".into()))
    }
}

/// Decodes a little endian u32 from the first four bytes of `data`.
/// Callers guarantee the length.
pub fn decode_u32_le(data: &[u8]) -> u32 {
    LittleEndian::read_u32(data)
}

/// Fixed-width big endian encoding, used for cache keys so that numeric
/// order and byte order agree.
pub fn encode_u64_be(v: u64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, v);
    buf
}
