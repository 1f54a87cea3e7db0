use byteorder::{ByteOrder, LittleEndian};

const BLOOM_SEED: u32 = 0xbc9f1d34;

/// Murmur-like hash used by the table format. Filters persist its output,
/// so it must not change.
pub fn hash(data: &[u8], seed: u32) -> u32 {
    let m: u32 = 0xc6a4a793;
    let r: u32 = 24;
    let mut h = seed ^ m.wrapping_mul(data.len() as u32);

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        h = h.wrapping_add(LittleEndian::read_u32(chunk));
        h = h.wrapping_mul(m);
        h ^= h >> 16;
    }

    let rest = chunks.remainder();
    if rest.len() >= 3 {
        h = h.wrapping_add(u32::from(rest[2]) << 16);
    }
    if rest.len() >= 2 {
        h = h.wrapping_add(u32::from(rest[1]) << 8);
    }
    if !rest.is_empty() {
        h = h.wrapping_add(u32::from(rest[0]));
        h = h.wrapping_mul(m);
        h ^= h >> r;
    }
    h
}

pub fn bloom_hash(key: &[u8]) -> u32 {
    hash(key, BLOOM_SEED)
}
