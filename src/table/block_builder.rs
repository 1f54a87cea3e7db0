use std::{
    cmp::{self, Ordering},
    mem,
    sync::Arc,
};

use integer_encoding::{FixedIntWriter, VarIntWriter};

use crate::cmp::Comparator;

/// Builds prefix-compressed blocks. Every `block_restart_interval` keys the
/// full key is stored and its offset recorded as a restart point.
pub struct BlockBuilder {
    comparator: Arc<dyn Comparator>,
    block_restart_interval: u32,
    buffer: Vec<u8>,    // destination buffer
    restarts: Vec<u32>, // restart points
    counter: u32,       // number of entries emitted since restart
    last_key: Vec<u8>,
    entries: usize,
}

impl BlockBuilder {
    pub fn new(comparator: Arc<dyn Comparator>, block_restart_interval: u32) -> Self {
        assert!(block_restart_interval >= 1);
        BlockBuilder {
            comparator,
            block_restart_interval,
            buffer: Vec::new(),
            restarts: vec![0],
            counter: 0,
            last_key: Vec::new(),
            entries: 0,
        }
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn current_size_estimate(&self) -> usize {
        self.buffer.len() + 4 * self.restarts.len() + 4
    }

    pub fn last_key(&self) -> &[u8] {
        &self.last_key
    }

    /// Appends an entry. Keys must arrive in strictly increasing order.
    pub fn add(&mut self, key: &[u8], val: &[u8]) {
        assert!(self.counter <= self.block_restart_interval);
        assert!(
            self.buffer.is_empty()
                || self.comparator.compare(key, &self.last_key) == Ordering::Greater
        );

        let mut shared = 0;
        if self.counter < self.block_restart_interval {
            let smallest = cmp::min(key.len(), self.last_key.len());
            while shared < smallest && self.last_key[shared] == key[shared] {
                shared += 1;
            }
        } else {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
        }

        let non_shared = key.len() - shared;

        // writes into a Vec cannot fail
        let _ = self.buffer.write_varint(shared as u32);
        let _ = self.buffer.write_varint(non_shared as u32);
        let _ = self.buffer.write_varint(val.len() as u32);

        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(val);

        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);

        self.counter += 1;
        self.entries += 1;
    }

    /// Appends the restart array and returns the block contents. The
    /// builder is reset and can be reused.
    pub fn finish(&mut self) -> Vec<u8> {
        let mut buffer = mem::take(&mut self.buffer);
        buffer.reserve(self.restarts.len() * 4 + 4);
        for r in self.restarts.iter() {
            let _ = buffer.write_fixedint(*r);
        }
        let _ = buffer.write_fixedint(self.restarts.len() as u32);

        self.restarts.clear();
        self.restarts.push(0);
        self.counter = 0;
        self.entries = 0;
        self.last_key.clear();
        buffer
    }
}

#[cfg(test)]
mod tests {
    use crate::cmp::BitWiseComparator;

    use super::*;

    #[test]
    fn test_prefix_compression_and_restarts() {
        let comparator = Arc::new(BitWiseComparator {});
        let mut builder = BlockBuilder::new(comparator, 2);
        builder.add(b"key1", b"value1");
        builder.add(b"key2", b"v2");
        builder.add(b"prefix1", b"value2");
        assert_eq!(builder.entries(), 3);
        assert_eq!(builder.last_key(), b"prefix1");

        let block = builder.finish();
        // entry 1: 3 + 4 + 6, entry 2: 3 + 1 + 2, entry 3: 3 + 7 + 6
        // restarts [0, 19] and their count
        assert_eq!(block.len(), 13 + 6 + 16 + 12);
        assert_eq!(&block[block.len() - 4..], &2u32.to_le_bytes());

        assert!(builder.is_empty());
        assert_eq!(builder.entries(), 0);
        assert_eq!(builder.finish().len(), 8);
    }

    #[test]
    #[should_panic]
    fn test_unsorted_keys_panic() {
        let mut builder = BlockBuilder::new(Arc::new(BitWiseComparator {}), 16);
        builder.add(b"b", b"");
        builder.add(b"a", b"");
    }
}
