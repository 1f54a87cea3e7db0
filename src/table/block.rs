use super::format::BlockContent;
use crate::{
    cmp::Comparator,
    codec::decode_u32_le,
    error::{Error, Result},
    iterator::DBIterator,
};
use integer_encoding::VarInt;
use std::{cmp::Ordering, sync::Arc};

const RESTART_SIZE: usize = 4;

/// A decoded block: entries followed by the restart array. Cloning shares
/// the underlying bytes.
#[derive(Clone)]
pub struct Block {
    content: Arc<BlockContent>,
    restart_offset: u32,
    num_restarts: u32,
}

impl Block {
    pub fn from_raw(content: BlockContent) -> Result<Self> {
        let n = content.len();
        if n < RESTART_SIZE {
            return Err(Error::Corruption(
                "bad block contents, size too small".into(),
            ));
        }
        let num_restarts = decode_u32_le(&content[n - RESTART_SIZE..]);
        let max_restart_allowed = (n - RESTART_SIZE) / RESTART_SIZE;
        if num_restarts as usize > max_restart_allowed {
            return Err(Error::Corruption("bad block contents, restart array".into()));
        }
        let restart_offset = (n - (1 + num_restarts as usize) * RESTART_SIZE) as u32;
        Ok(Block {
            content: Arc::new(content),
            restart_offset,
            num_restarts,
        })
    }

    /// Size of the block contents in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }

    pub fn iter(&self, comparator: Arc<dyn Comparator>) -> BlockIter {
        BlockIter::new(self, comparator)
    }
}

struct EntryHeader {
    shared: u32,
    non_shared: u32,
    value_len: u32,
    header_len: u32,
}

pub struct BlockIter {
    block_content: Arc<BlockContent>,
    comparator: Arc<dyn Comparator>,

    restarts: u32,
    num_restarts: u32,

    // offset of the current entry; `restarts` when invalid
    current: u32,
    restart_index: u32,
    key: Vec<u8>,
    value_offset: u32,
    value_len: u32,
    err: Option<Error>,
}

impl BlockIter {
    fn new(block: &Block, comparator: Arc<dyn Comparator>) -> Self {
        BlockIter {
            block_content: block.content.clone(),
            comparator,

            restarts: block.restart_offset,
            num_restarts: block.num_restarts,

            current: block.restart_offset,
            restart_index: block.num_restarts,

            key: Vec::new(),
            value_offset: 0,
            value_len: 0,
            err: None,
        }
    }

    fn next_entry_offset(&self) -> u32 {
        self.value_offset + self.value_len
    }

    fn get_restart_point(&self, index: u32) -> u32 {
        assert!(index < self.num_restarts);
        let offset = self.restarts as usize + RESTART_SIZE * index as usize;
        decode_u32_le(&self.block_content[offset..])
    }

    fn seek_to_restart_point(&mut self, index: u32) {
        self.key.clear();
        self.restart_index = index;
        // parse_next_entry starts at the end of the current value
        self.value_offset = self.get_restart_point(index);
        self.value_len = 0;
    }

    fn decode_entry(&self, offset: u32) -> Option<EntryHeader> {
        if offset >= self.restarts {
            return None;
        }
        let data = &self.block_content[offset as usize..self.restarts as usize];
        if data.len() < 3 {
            return None;
        }

        let (shared, non_shared, value_len, header_len) =
            if (data[0] | data[1] | data[2]) < 128 {
                // fast path: all three values are encoded in one byte each
                (data[0] as u32, data[1] as u32, data[2] as u32, 3)
            } else {
                let (shared, n1) = u32::decode_var(data)?;
                let (non_shared, n2) = u32::decode_var(&data[n1..])?;
                let (value_len, n3) = u32::decode_var(&data[n1 + n2..])?;
                (shared, non_shared, value_len, n1 + n2 + n3)
            };

        let remain = (data.len() - header_len) as u64;
        if remain < non_shared as u64 + value_len as u64 {
            return None;
        }
        Some(EntryHeader {
            shared,
            non_shared,
            value_len,
            header_len: header_len as u32,
        })
    }

    fn parse_next_entry(&mut self) -> bool {
        self.current = self.next_entry_offset();
        if self.current >= self.restarts {
            self.current = self.restarts;
            self.restart_index = self.num_restarts;
            return false;
        }

        match self.decode_entry(self.current) {
            Some(h) if self.key.len() >= h.shared as usize => {
                let key_offset = (self.current + h.header_len) as usize;
                let key_end = key_offset + h.non_shared as usize;
                self.key.truncate(h.shared as usize);
                self.key
                    .extend_from_slice(&self.block_content[key_offset..key_end]);
                self.value_offset = key_end as u32;
                self.value_len = h.value_len;

                while self.restart_index + 1 < self.num_restarts
                    && self.get_restart_point(self.restart_index + 1) < self.current
                {
                    self.restart_index += 1;
                }
                true
            }
            _ => {
                self.corruption_err();
                false
            }
        }
    }

    fn corruption_err(&mut self) {
        self.current = self.restarts;
        self.restart_index = self.num_restarts;
        self.key.clear();
        self.value_offset = self.restarts;
        self.value_len = 0;
        self.err
            .get_or_insert(Error::Corruption("bad entry in block".into()));
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.comparator.compare(a, b)
    }
}

impl DBIterator for BlockIter {
    fn valid(&self) -> bool {
        self.current < self.restarts
    }

    fn seek_to_first(&mut self) {
        if self.num_restarts == 0 {
            return;
        }
        self.seek_to_restart_point(0);
        self.parse_next_entry();
    }

    fn seek_to_last(&mut self) {
        if self.num_restarts == 0 {
            return;
        }
        self.seek_to_restart_point(self.num_restarts - 1);
        while self.parse_next_entry() && self.next_entry_offset() < self.restarts {}
    }

    fn seek(&mut self, target: &[u8]) {
        if self.num_restarts == 0 {
            return;
        }
        // binary search for the last restart point with a key < target
        let (mut left, mut right) = (0, self.num_restarts - 1);
        while left < right {
            let mid = (left + right + 1) / 2;
            let region_offset = self.get_restart_point(mid);
            let header = match self.decode_entry(region_offset) {
                Some(h) if h.shared == 0 => h,
                _ => {
                    self.corruption_err();
                    return;
                }
            };
            let key_offset = (region_offset + header.header_len) as usize;
            let key = &self.block_content[key_offset..key_offset + header.non_shared as usize];
            if self.compare(key, target) == Ordering::Less {
                left = mid;
            } else {
                right = mid - 1;
            }
        }

        self.seek_to_restart_point(left);
        while self.parse_next_entry() {
            if self.compare(&self.key, target) != Ordering::Less {
                return;
            }
        }
    }

    fn next(&mut self) {
        assert!(self.valid());
        self.parse_next_entry();
    }

    fn prev(&mut self) {
        assert!(self.valid());

        // scan back to a restart point before the current entry
        let original = self.current;
        while self.get_restart_point(self.restart_index) >= original {
            if self.restart_index == 0 {
                // no more entries
                self.current = self.restarts;
                self.restart_index = self.num_restarts;
                return;
            }
            self.restart_index -= 1;
        }

        self.seek_to_restart_point(self.restart_index);
        while self.parse_next_entry() && self.next_entry_offset() < original {}
    }

    fn key(&self) -> &[u8] {
        assert!(self.valid());
        &self.key
    }

    fn value(&self) -> &[u8] {
        assert!(self.valid());
        let start = self.value_offset as usize;
        &self.block_content[start..start + self.value_len as usize]
    }

    fn status(&mut self) -> Result<()> {
        match self.err.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{cmp::BitWiseComparator, table::block_builder::BlockBuilder};

    use super::*;

    fn get_data() -> Vec<(&'static [u8], &'static [u8])> {
        [
            ("key1", "value1"),
            ("loooooooooooooooooooooooooooooooooongerkey1", "shrtvl1"),
            ("medium length key 1", "some value 2"),
            ("prefix_key1", "value"),
            ("prefix_key2", "value"),
            ("prefix_key3", "value"),
        ]
        .iter()
        .map(|&(k, v)| (k.as_bytes(), v.as_bytes()))
        .collect()
    }

    fn build_block(restart_interval: u32) -> Block {
        let comparator = Arc::new(BitWiseComparator {});
        let mut builder = BlockBuilder::new(comparator, restart_interval);
        for &(k, v) in get_data().iter() {
            builder.add(k, v);
        }
        Block::from_raw(BlockContent::new(builder.finish())).unwrap()
    }

    #[test]
    fn test_block_iterator() {
        for interval in [1, 2, 3, 16] {
            let block = build_block(interval);
            let mut iter = block.iter(Arc::new(BitWiseComparator {}));
            assert!(!iter.valid());

            iter.seek_to_first();
            for &(key, val) in get_data().iter() {
                assert!(iter.valid());
                assert_eq!(key, iter.key());
                assert_eq!(val, iter.value());
                iter.next();
            }
            assert!(!iter.valid());
            assert!(iter.status().is_ok());
        }
    }

    #[test]
    fn test_block_iterator_backward() {
        for interval in [1, 3, 16] {
            let block = build_block(interval);
            let mut iter = block.iter(Arc::new(BitWiseComparator {}));

            iter.seek_to_last();
            for &(key, val) in get_data().iter().rev() {
                assert!(iter.valid());
                assert_eq!(key, iter.key());
                assert_eq!(val, iter.value());
                iter.prev();
            }
            assert!(!iter.valid());
        }
    }

    #[test]
    fn test_block_seek() {
        for interval in [1, 2, 16] {
            let block = build_block(interval);
            let mut iter = block.iter(Arc::new(BitWiseComparator {}));

            iter.seek(b"prefix_key2");
            assert!(iter.valid());
            assert_eq!(iter.key(), b"prefix_key2");

            iter.seek(b"n");
            assert_eq!(iter.key(), b"prefix_key1");

            iter.seek(b"");
            assert_eq!(iter.key(), b"key1");

            iter.seek(b"prefix_key4");
            assert!(!iter.valid());
        }
    }

    #[test]
    fn test_empty_block() {
        let mut builder = BlockBuilder::new(Arc::new(BitWiseComparator {}), 16);
        let block = Block::from_raw(BlockContent::new(builder.finish())).unwrap();
        let mut iter = block.iter(Arc::new(BitWiseComparator {}));
        iter.seek_to_first();
        assert!(!iter.valid());
        iter.seek(b"a");
        assert!(!iter.valid());
        assert!(iter.status().is_ok());
    }

    #[test]
    fn test_corrupt_blocks() {
        assert!(Block::from_raw(BlockContent::new(vec![1, 2])).is_err());
        // claims more restarts than fit
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&100u32.to_le_bytes());
        assert!(Block::from_raw(BlockContent::new(data)).is_err());

        // entry whose key length runs past the restart array
        let mut data = vec![0u8, 200, 1, b'k'];
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        let block = Block::from_raw(BlockContent::new(data)).unwrap();
        let mut iter = block.iter(Arc::new(BitWiseComparator {}));
        iter.seek_to_first();
        assert!(!iter.valid());
        assert!(iter.status().unwrap_err().is_corruption());
    }
}
