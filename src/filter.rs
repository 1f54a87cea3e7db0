use std::cmp;

use crate::utils::hash::bloom_hash;

/// Algorithm that summarizes a set of keys into a compact filter which can
/// later answer "may this key be in the set?".
pub trait FilterPolicy: Send + Sync {
    /// Name persisted in the table's meta index. Changing the encoding of a
    /// policy requires changing its name.
    fn name(&self) -> &'static str;

    /// Appends a filter summarizing `keys` to `dst`.
    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>);

    /// Must return true for every key that was passed to `create_filter`.
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;
}

const MAX_PROBES: usize = 30;

pub struct BloomFilterPolicy {
    bits_per_key: usize,
    hash_num: usize,
}

impl BloomFilterPolicy {
    pub fn new(bits_per_key: usize) -> Self {
        // 0.69 =~ ln(2), the probe count minimizing the false positive rate
        let hash_num = (bits_per_key as f64 * 0.69) as usize;
        let hash_num = cmp::min(MAX_PROBES, cmp::max(1, hash_num));

        BloomFilterPolicy {
            bits_per_key,
            hash_num,
        }
    }
}

impl FilterPolicy for BloomFilterPolicy {
    fn name(&self) -> &'static str {
        "leveldb.BuiltinBloomFilter2"
    }

    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>) {
        // tiny filters have a very high false positive rate
        let bits = cmp::max(keys.len() * self.bits_per_key, 64);
        let bytes = (bits + 7) / 8;
        let bits = bytes * 8;

        let init_size = dst.len();
        dst.resize(init_size + bytes, 0);
        dst.push(self.hash_num as u8);

        let data = &mut dst[init_size..init_size + bytes];
        for key in keys {
            let mut h = bloom_hash(key);
            let delta = h.rotate_right(17);
            for _ in 0..self.hash_num {
                let bitpos = h as usize % bits;
                data[bitpos / 8] |= 1 << (bitpos % 8);
                h = h.wrapping_add(delta);
            }
        }
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        let len = filter.len();
        if len < 2 {
            return false;
        }
        let bits = (len - 1) * 8;
        let hash_num = filter[len - 1] as usize;
        if hash_num > MAX_PROBES {
            // reserved for potentially new encodings
            return true;
        }

        let mut h = bloom_hash(key);
        let delta = h.rotate_right(17);
        for _ in 0..hash_num {
            let bitpos = h as usize % bits;
            if filter[bitpos / 8] & (1 << (bitpos % 8)) == 0 {
                return false;
            }
            h = h.wrapping_add(delta);
        }

        true
    }
}
