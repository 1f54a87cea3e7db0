use std::{io::Read, ops::Deref};

use integer_encoding::VarInt;
use snap::read::FrameDecoder;

use crate::{
    codec::{decode_u32_le, NumberReader, NumberWriter},
    env::RandomAccessFile,
    error::{Error, Result},
    options::{Compress, ReadOption},
};

/// Two varint64 handles take at most 20 bytes each.
pub const MAX_BLOCK_HANDLE_LENGTH: usize = 20;
pub const FOOTER_LENGTH: usize = 2 * MAX_BLOCK_HANDLE_LENGTH;
pub const FULL_FOOTER_LENGTH: usize = FOOTER_LENGTH + 8;
pub const TABLE_MAGIC_NUMBER: u64 = 0xdb4775248b80fb57;
// 1-byte type + 32-bit crc
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Location of a block inside a table file.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct BlockHandle {
    offset: u64,
    size: u64,
}

impl BlockHandle {
    pub fn new(offset: u64, size: u64) -> Self {
        BlockHandle { offset, size }
    }

    pub fn size(&self) -> u64 {
        self.size
    }
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        let mut buf = [0u8; MAX_BLOCK_HANDLE_LENGTH];
        let n = self.offset.encode_var(&mut buf);
        let n = n + self.size.encode_var(&mut buf[n..]);
        dst.extend_from_slice(&buf[..n]);
    }

    pub fn encoded(&self) -> Vec<u8> {
        let mut dst = Vec::with_capacity(MAX_BLOCK_HANDLE_LENGTH);
        self.encode_to(&mut dst);
        dst
    }

    /// Decodes a handle and returns it with the number of bytes consumed.
    pub fn decode_from(data: &[u8]) -> Result<(Self, usize)> {
        let (offset, offset_len) =
            u64::decode_var(data).ok_or_else(|| Error::Corruption("bad block handle".into()))?;
        let (size, size_len) = u64::decode_var(&data[offset_len..])
            .ok_or_else(|| Error::Corruption("bad block handle".into()))?;
        Ok((BlockHandle { offset, size }, offset_len + size_len))
    }
}

#[derive(Default, Clone, Copy, Debug)]
pub struct Footer {
    pub meta_index_handle: BlockHandle,
    pub index_handle: BlockHandle,
}

impl Footer {
    pub fn new(meta: BlockHandle, index: BlockHandle) -> Footer {
        Footer {
            meta_index_handle: meta,
            index_handle: index,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FULL_FOOTER_LENGTH);
        self.meta_index_handle.encode_to(&mut buf);
        self.index_handle.encode_to(&mut buf);
        buf.resize(FOOTER_LENGTH, 0);
        // writes into a Vec cannot fail
        let _ = buf.write_u64_le(TABLE_MAGIC_NUMBER);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < FULL_FOOTER_LENGTH {
            return Err(Error::Corruption("footer is too short".into()));
        }
        let mut magic = &data[FOOTER_LENGTH..FULL_FOOTER_LENGTH];
        if magic.read_u64_le()? != TABLE_MAGIC_NUMBER {
            return Err(Error::Corruption("not an sstable (bad magic number)".into()));
        }

        let (meta_index_handle, n) = BlockHandle::decode_from(data)?;
        let (index_handle, _) = BlockHandle::decode_from(&data[n..])?;
        Ok(Footer {
            meta_index_handle,
            index_handle,
        })
    }
}

/// Uncompressed block bytes.
#[derive(Default, Debug)]
pub struct BlockContent {
    pub data: Vec<u8>,
}

impl BlockContent {
    pub fn new(data: Vec<u8>) -> Self {
        BlockContent { data }
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reads the block `handle` points at from a file of `file_size` bytes.
    /// Handles reaching past the end of the file are corruption.
    pub fn read_block_from_file<R: RandomAccessFile + ?Sized>(
        file: &R,
        file_size: u64,
        handle: &BlockHandle,
        option: &ReadOption,
    ) -> Result<Self> {
        let block_end = handle
            .offset
            .checked_add(handle.size)
            .and_then(|end| end.checked_add(BLOCK_TRAILER_SIZE as u64));
        match block_end {
            Some(end) if end <= file_size => {}
            _ => {
                return Err(Error::Corruption(format!(
                    "block handle {}+{} past end of file ({} bytes)",
                    handle.offset, handle.size, file_size
                )))
            }
        }

        let n = handle.size as usize;
        let mut buf = vec![0; n + BLOCK_TRAILER_SIZE];
        file.read_exact_at(buf.as_mut(), handle.offset)
            .map_err(|_| Error::Corruption("truncated block read".into()))?;

        if option.verify_checksum {
            let checksum = decode_u32_le(&buf[n + 1..]);
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&buf[..n + 1]);
            if checksum != hasher.finalize() {
                return Err(Error::Corruption("block checksum mismatch".into()));
            }
        }

        match Compress::try_from(buf[n])? {
            Compress::NO => {
                buf.truncate(n);
                Ok(BlockContent { data: buf })
            }
            Compress::Snappy => {
                let mut uncompressed_data = Vec::new();
                FrameDecoder::new(&buf[..n])
                    .read_to_end(&mut uncompressed_data)
                    .map_err(|_| Error::Corruption("corrupted compressed block content".into()))?;
                Ok(BlockContent {
                    data: uncompressed_data,
                })
            }
        }
    }
}

impl AsRef<[u8]> for BlockContent {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Deref for BlockContent {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
