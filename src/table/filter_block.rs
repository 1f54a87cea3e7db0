//! Filter block: one filter per 2KiB range of data-block offsets.
//!
//! ```text
//! [filter 0][filter 1]...[filter n-1]
//! [offset 0: u32 LE]...[offset n-1: u32 LE]
//! [array offset: u32 LE]
//! [base lg: u8]
//! ```
//!
//! Filter `i` covers data blocks starting in `[i << base_lg, (i + 1) << base_lg)`.

use std::sync::Arc;

use bytes::Bytes;

use crate::{codec::decode_u32_le, codec::NumberWriter, filter::FilterPolicy};

/// Format constant, shared by writers and readers of the same file.
pub const FILTER_BASE_LG: u8 = 11;
pub const FILTER_BASE: u64 = 1 << FILTER_BASE_LG;

/// Array offset plus base lg.
const TRAILER_SIZE: usize = 5;

/// Builds the filter block of a table.
///
/// Calls must follow `(start_block add_key*)* finish`.
pub struct FilterBlockBuilder {
    policy: Arc<dyn FilterPolicy>,
    keys: Vec<u8>,             // flattened pending keys
    start: Vec<usize>,         // start of each pending key in `keys`
    result: Vec<u8>,           // filters built so far
    filter_offsets: Vec<u32>,
}

impl FilterBlockBuilder {
    pub fn new(policy: Arc<dyn FilterPolicy>) -> Self {
        FilterBlockBuilder {
            policy,
            keys: Vec::new(),
            start: Vec::new(),
            result: Vec::new(),
            filter_offsets: Vec::new(),
        }
    }

    /// Notes that a data block starts at `block_offset`. Every filter whose
    /// range ends at or before that offset is generated now.
    pub fn start_block(&mut self, block_offset: u64) {
        let filter_index = (block_offset / FILTER_BASE) as usize;
        assert!(
            filter_index >= self.filter_offsets.len(),
            "block offset {} moves backwards",
            block_offset
        );

        while filter_index > self.filter_offsets.len() {
            self.generate_filter();
        }
    }

    pub fn add_key(&mut self, key: &[u8]) {
        self.start.push(self.keys.len());
        self.keys.extend_from_slice(key);
    }

    pub fn finish(mut self) -> Vec<u8> {
        if !self.start.is_empty() {
            self.generate_filter();
        }

        let array_offset = self.result.len() as u32;
        self.result.reserve(self.filter_offsets.len() * 4 + TRAILER_SIZE);
        for offset in self.filter_offsets.iter() {
            let _ = self.result.write_u32_le(*offset);
        }
        let _ = self.result.write_u32_le(array_offset);
        self.result.push(FILTER_BASE_LG);

        self.result
    }

    fn generate_filter(&mut self) {
        self.filter_offsets.push(self.result.len() as u32);
        if self.start.is_empty() {
            // an empty range still gets an (empty) filter so index i is filter i
            return;
        }

        let limits = self.start.iter().skip(1).copied().chain([self.keys.len()]);
        let tmp_keys: Vec<&[u8]> = self
            .start
            .iter()
            .zip(limits)
            .map(|(&begin, end)| &self.keys[begin..end])
            .collect();
        self.policy.create_filter(&tmp_keys, &mut self.result);

        self.keys.clear();
        self.start.clear();
    }
}

/// Answers membership queries against a filter block. Malformed input makes
/// every query a possible match.
pub struct FilterBlockReader {
    policy: Arc<dyn FilterPolicy>,
    data: Bytes,
    offset: usize, // start of the offset array
    num: usize,
    base_lg: u8,
}

impl FilterBlockReader {
    pub fn new(policy: Arc<dyn FilterPolicy>, data: Bytes) -> Self {
        let mut reader = FilterBlockReader {
            policy,
            data: Bytes::new(),
            offset: 0,
            num: 0,
            base_lg: 0,
        };

        let n = data.len();
        if n < TRAILER_SIZE {
            return reader;
        }

        reader.base_lg = data[n - 1];
        let last_word = decode_u32_le(&data[n - TRAILER_SIZE..]) as usize;
        if last_word > n - TRAILER_SIZE {
            return reader;
        }
        reader.offset = last_word;
        reader.num = (n - TRAILER_SIZE - last_word) / 4;
        reader.data = data;
        reader
    }

    /// Number of filters in the block.
    pub fn num_filters(&self) -> usize {
        self.num
    }

    pub fn key_may_match(&self, block_offset: u64, key: &[u8]) -> bool {
        let index = block_offset.checked_shr(self.base_lg as u32).unwrap_or(0) as usize;
        if index >= self.num {
            // errors are treated as potential matches
            return true;
        }

        let pos = self.offset + index * 4;
        let start = decode_u32_le(&self.data[pos..]) as usize;
        let limit = decode_u32_le(&self.data[pos + 4..]) as usize;
        if start == limit {
            // empty filters do not match any keys
            false
        } else if start < limit && limit <= self.offset {
            self.policy.key_may_match(key, &self.data[start..limit])
        } else {
            true
        }
    }
}
