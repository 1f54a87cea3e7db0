pub mod block;
pub mod block_builder;
pub mod filter_block;
pub mod format;
#[allow(clippy::module_inception)]
mod table;
pub mod two_level_iterator;

pub use table::{Table, TableBlockIterBuilder, TableBuilder, TableIterator};
