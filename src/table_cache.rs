use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, trace, warn};

use crate::{
    codec::encode_u64_be,
    env::{Env, RandomAccessFile},
    error::Result,
    filenames::{sst_table_file_name, table_file_name, FileNum},
    iterator::{CleanupIterator, DBIterator, EmptyIterator},
    options::{Options, ReadOption},
    table::Table,
    utils::cache::{Cache, ShardLruCache},
};

/// An open table file and the table parsed from it. The table owns the
/// file handle; dropping the last handle closes the file.
pub struct TableAndFile<R: RandomAccessFile> {
    file_number: FileNum,
    table: Arc<Table<R>>,
}

impl<R: RandomAccessFile> TableAndFile<R> {
    pub fn table(&self) -> &Arc<Table<R>> {
        &self.table
    }
}

impl<R: RandomAccessFile> Drop for TableAndFile<R> {
    fn drop(&mut self) {
        trace!(file_number = self.file_number, "closing table");
    }
}

/// Keeps recently used tables open, keyed by file number.
pub struct TableCache<E: Env> {
    env: E,
    dbname: PathBuf,
    options: Arc<Options>,
    cache: ShardLruCache<[u8; 8], TableAndFile<E::RandomAccessFile>>,
}

impl<E: Env> TableCache<E> {
    /// Creates a cache holding at most `entries` open tables.
    pub fn new<P: AsRef<Path>>(dbname: P, options: Arc<Options>, env: E, entries: usize) -> Self {
        TableCache {
            env,
            dbname: dbname.as_ref().to_path_buf(),
            options,
            cache: ShardLruCache::new(entries as u64),
        }
    }

    /// Creates a cache sized by [`Options::table_cache_size`].
    pub fn from_options<P: AsRef<Path>>(dbname: P, options: Arc<Options>, env: E) -> Self {
        let entries = options.table_cache_size();
        Self::new(dbname, options, env, entries)
    }

    /// Returns a handle to the table for `file_number`, opening the file on
    /// a miss. Failures are returned to the caller and leave no cache entry
    /// behind, so a later call retries the open.
    pub fn find_table(
        &self,
        file_number: FileNum,
        file_size: u64,
    ) -> Result<Arc<TableAndFile<E::RandomAccessFile>>> {
        let key = encode_u64_be(file_number);
        if let Some(handle) = self.cache.lookup(&key) {
            trace!(file_number, "table cache hit");
            return Ok(handle);
        }
        trace!(file_number, "table cache miss");

        let file = Arc::new(self.open_table_file(file_number)?);
        let table = Table::open(self.options.clone(), file, file_size).map_err(|e| {
            warn!(file_number, file_size, error = %e, "failed to open table");
            e
        })?;
        debug!(file_number, file_size, "opened table file");

        let value = TableAndFile {
            file_number,
            table: Arc::new(table),
        };
        Ok(self.cache.insert(key, value, 1))
    }

    fn open_table_file(&self, file_number: FileNum) -> Result<E::RandomAccessFile> {
        let file_name = table_file_name(&self.dbname, file_number);
        let err = match self.env.new_random_access_file(&file_name) {
            Ok(file) => return Ok(file),
            Err(err) => err,
        };

        let old_file_name = sst_table_file_name(&self.dbname, file_number);
        match self.env.new_random_access_file(&old_file_name) {
            Ok(file) => {
                warn!(
                    file_number,
                    path = %old_file_name.display(),
                    "opened table under legacy name"
                );
                Ok(file)
            }
            Err(_) => {
                warn!(
                    file_number,
                    path = %file_name.display(),
                    error = %err,
                    "cannot open table file"
                );
                Err(err)
            }
        }
    }

    /// Returns an iterator over the table for `file_number`. The iterator
    /// keeps the cache handle until it is dropped. Open failures are
    /// reported through the iterator's status.
    pub fn new_iterator(
        &self,
        read_option: &ReadOption,
        file_number: FileNum,
        file_size: u64,
    ) -> Box<dyn DBIterator> {
        self.new_iterator_with_table(read_option, file_number, file_size)
            .0
    }

    /// Like [`TableCache::new_iterator`], also returning the table the
    /// iterator reads from. The table is `None` when the open failed.
    pub fn new_iterator_with_table(
        &self,
        read_option: &ReadOption,
        file_number: FileNum,
        file_size: u64,
    ) -> (Box<dyn DBIterator>, Option<Arc<Table<E::RandomAccessFile>>>) {
        let handle = match self.find_table(file_number, file_size) {
            Ok(handle) => handle,
            Err(err) => return (Box::new(EmptyIterator::with_error(err)), None),
        };

        let table = handle.table.clone();
        let mut iter = CleanupIterator::new(table.clone().iter(read_option.clone()));
        iter.register_cleanup(move || {
            trace!(file_number = handle.file_number, "releasing table handle");
            drop(handle);
        });
        (Box::new(iter), Some(table))
    }

    /// Looks `key` up in the table for `file_number`, calling
    /// `handle_result` with the first entry at or after it, if any.
    pub fn get<F>(
        &self,
        read_option: &ReadOption,
        file_number: FileNum,
        file_size: u64,
        key: &[u8],
        handle_result: F,
    ) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]),
    {
        let handle = self.find_table(file_number, file_size)?;
        handle.table.internal_get(read_option, key, handle_result)
    }

    /// Drops the cached entry for `file_number`. Outstanding handles and
    /// iterators stay usable.
    pub fn evict(&self, file_number: FileNum) {
        debug!(file_number, "evicting table");
        self.cache.erase(&encode_u64_be(file_number));
    }
}
