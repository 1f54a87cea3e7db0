//! Read side of a sorted string table store: filter blocks, tables and a
//! cache of open tables.

pub mod cmp;
mod codec;
pub mod env;
pub mod error;
pub mod filenames;
pub mod filter;
pub mod iterator;
pub mod options;
pub mod table;
pub mod table_cache;
pub mod utils;

pub use cmp::{BitWiseComparator, Comparator};
pub use env::{mem::MemEnv, Env};
#[cfg(unix)]
pub use env::posix::PosixEnv;
pub use error::{Error, Result};
pub use filter::{BloomFilterPolicy, FilterPolicy};
pub use iterator::DBIterator;
pub use options::{Compress, Options, ReadOption};
pub use table::{Table, TableBuilder};
pub use table_cache::{TableAndFile, TableCache};
