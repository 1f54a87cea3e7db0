use std::cmp::{self, Ordering};

pub trait Comparator: Send + Sync {
    fn compare(&self, left: &[u8], right: &[u8]) -> Ordering;

    fn name(&self) -> &'static str;

    /// Shortens `start` to a key in `[start, limit)` when possible. Used for
    /// index separators so the index block stays small.
    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]);

    fn find_shortest_successor(&self, key: &mut Vec<u8>);
}

#[derive(Clone, Copy, Default)]
pub struct BitWiseComparator {}

impl Comparator for BitWiseComparator {
    fn compare(&self, left: &[u8], right: &[u8]) -> Ordering {
        left.cmp(right)
    }

    fn name(&self) -> &'static str {
        "leveldb.BytewiseComparator"
    }

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        let min_length = cmp::min(start.len(), limit.len());
        let mut diff_index = 0;
        while diff_index < min_length && limit[diff_index] == start[diff_index] {
            diff_index += 1;
        }
        if diff_index < min_length {
            let diff_byte = start[diff_index];
            if diff_byte < 0xff && diff_byte + 1 < limit[diff_index] {
                start[diff_index] += 1;
                start.truncate(diff_index + 1);
            }
        }
    }

    fn find_shortest_successor(&self, key: &mut Vec<u8>) {
        if let Some(i) = key.iter().position(|b| *b != 0xff) {
            key[i] += 1;
            key.truncate(i + 1);
        }
    }
}
