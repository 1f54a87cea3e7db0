use std::{cmp, sync::Arc};

use crate::{
    cmp::{BitWiseComparator, Comparator},
    error::{Error, Result},
    filter::FilterPolicy,
    table::block::Block,
    utils::cache::ShardLruCache,
};

/// Files reserved for the rest of the engine (logs, manifest, lock).
const NUM_NON_TABLE_CACHE_FILES: usize = 10;

/// Uncompressed data blocks keyed by `cache_id ‖ block_offset`.
pub type BlockCache = ShardLruCache<[u8; 16], Block>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compress {
    NO = 0x0,
    Snappy = 0x1,
}

impl Compress {
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for Compress {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0x0 => Ok(Self::NO),
            0x1 => Ok(Self::Snappy),
            _ => Err(Error::Corruption(format!("unknown compress type {}", v))),
        }
    }
}

#[derive(Clone)]
pub struct Options {
    pub comparator: Arc<dyn Comparator>,

    /// When set, tables are written with a filter block and point lookups
    /// consult it before reading a data block.
    pub filter_policy: Option<Arc<dyn FilterPolicy>>,

    pub block_restart_interval: u32,
    pub block_size: usize,

    pub compression_type: Compress,

    pub block_cache: Option<Arc<BlockCache>>,

    pub max_open_files: usize,
}

impl Options {
    /// Number of tables the table cache keeps open.
    pub fn table_cache_size(&self) -> usize {
        cmp::max(
            1,
            self.max_open_files
                .saturating_sub(NUM_NON_TABLE_CACHE_FILES),
        )
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            comparator: Arc::new(BitWiseComparator {}),
            filter_policy: None,
            block_restart_interval: 16,
            block_size: 4096,
            compression_type: Compress::Snappy,
            block_cache: None,
            max_open_files: 1000,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReadOption {
    pub verify_checksum: bool,
    pub fill_cache: bool,
}

impl Default for ReadOption {
    fn default() -> Self {
        ReadOption {
            verify_checksum: false,
            fill_cache: true,
        }
    }
}
