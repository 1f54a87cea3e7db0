use std::{cmp::Ordering, io::Write, sync::Arc};

use bytes::Bytes;
use snap::write::FrameEncoder;
use tracing::{debug, trace};

use crate::{
    cmp::BitWiseComparator,
    codec::{encode_u64_be, NumberWriter},
    env::{RandomAccessFile, WritableFile},
    error::{Error, Result},
    iterator::DBIterator,
    options::{Compress, Options, ReadOption},
    utils::cache::Cache,
};

use super::{
    block::{Block, BlockIter},
    block_builder::BlockBuilder,
    filter_block::{FilterBlockBuilder, FilterBlockReader},
    format::{BlockContent, BlockHandle, Footer, BLOCK_TRAILER_SIZE, FULL_FOOTER_LENGTH},
    two_level_iterator::{BlockIterBuilder, TwoLevelIterator},
};

const FILTER_META_PREFIX: &str = "filter.";

fn filter_meta_key(policy_name: &str) -> Vec<u8> {
    let mut key = Vec::from(FILTER_META_PREFIX);
    key.extend_from_slice(policy_name.as_bytes());
    key
}

/// An immutable, sorted map from keys to values backed by a table file.
///
/// A table shares its file handle; whoever opened the file keeps their own
/// reference and the table never writes through it.
pub struct Table<R: RandomAccessFile> {
    file: Arc<R>,
    file_size: u64,
    options: Arc<Options>,
    cache_id: u64,

    meta_index_handle: BlockHandle,
    index_block: Block,
    filter: Option<FilterBlockReader>,
}

pub type TableIterator<R> = TwoLevelIterator<BlockIter, TableBlockIterBuilder<R>>;

impl<R: RandomAccessFile> Table<R> {
    /// Opens the table stored in bytes `[0, size)` of `file` and reads the
    /// metadata needed to serve lookups.
    pub fn open(options: Arc<Options>, file: Arc<R>, size: u64) -> Result<Self> {
        if (FULL_FOOTER_LENGTH as u64) > size {
            return Err(Error::Corruption("file is too short to be an sstable".into()));
        }

        let mut scratch = [0u8; FULL_FOOTER_LENGTH];
        file.read_exact_at(&mut scratch, size - FULL_FOOTER_LENGTH as u64)?;
        let footer = Footer::decode(&scratch)?;

        let read_options = ReadOption {
            verify_checksum: true,
            fill_cache: false,
        };
        let index_content = BlockContent::read_block_from_file(
            file.as_ref(),
            size,
            &footer.index_handle,
            &read_options,
        )?;
        let index_block = Block::from_raw(index_content)?;

        let filter = Self::read_filter(file.as_ref(), size, &options, &footer)?;
        let cache_id = options
            .block_cache
            .as_ref()
            .map_or(0, |cache| cache.new_id());

        debug!(
            file_size = size,
            has_filter = filter.is_some(),
            cache_id,
            "opened table"
        );
        Ok(Table {
            file,
            file_size: size,
            options,
            cache_id,
            meta_index_handle: footer.meta_index_handle,
            index_block,
            filter,
        })
    }

    fn read_filter(
        file: &R,
        file_size: u64,
        options: &Options,
        footer: &Footer,
    ) -> Result<Option<FilterBlockReader>> {
        let policy = match options.filter_policy {
            Some(ref policy) => policy,
            None => return Ok(None),
        };

        let read_option = ReadOption {
            verify_checksum: true,
            fill_cache: false,
        };
        let meta_block_content = BlockContent::read_block_from_file(
            file,
            file_size,
            &footer.meta_index_handle,
            &read_option,
        )?;
        let meta_block = Block::from_raw(meta_block_content)?;
        let mut iter = meta_block.iter(Arc::new(BitWiseComparator {}));

        let key = filter_meta_key(policy.name());
        iter.seek(&key);
        iter.status()?;
        if !iter.valid() || iter.key() != key.as_slice() {
            // written without a filter, or with another policy
            return Ok(None);
        }

        let (handle, _) = BlockHandle::decode_from(iter.value())?;
        let content = BlockContent::read_block_from_file(file, file_size, &handle, &read_option)?;
        Ok(Some(FilterBlockReader::new(
            policy.clone(),
            Bytes::from(content.data),
        )))
    }

    fn block_cache_key(&self, offset: u64) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&encode_u64_be(self.cache_id));
        key[8..].copy_from_slice(&encode_u64_be(offset));
        key
    }

    fn read_block(&self, read_option: &ReadOption, handle: &BlockHandle) -> Result<Block> {
        let read = || -> Result<Block> {
            let content = BlockContent::read_block_from_file(
                self.file.as_ref(),
                self.file_size,
                handle,
                read_option,
            )?;
            Block::from_raw(content)
        };

        let cache = match self.options.block_cache {
            Some(ref cache) => cache,
            None => return read(),
        };
        let key = self.block_cache_key(handle.offset());
        if let Some(block) = cache.lookup(&key) {
            return Ok(Block::clone(&block));
        }
        let block = read()?;
        if read_option.fill_cache {
            cache.insert(key, block.clone(), block.size() as u64);
        }
        Ok(block)
    }

    fn block_iter_from_index(
        &self,
        read_option: &ReadOption,
        index_value: &[u8],
    ) -> Result<BlockIter> {
        let (block_handle, _) = BlockHandle::decode_from(index_value)?;
        let block = self.read_block(read_option, &block_handle)?;
        Ok(block.iter(self.options.comparator.clone()))
    }

    /// Returns an iterator over the table contents. It is invalid until
    /// positioned by a seek.
    pub fn iter(self: Arc<Self>, option: ReadOption) -> TableIterator<R> {
        let index_iter = self.index_block.iter(self.options.comparator.clone());
        let block_iter_builder = TableBlockIterBuilder { table: self };

        TwoLevelIterator::new(index_iter, block_iter_builder, option)
    }

    /// Seeks `key` and calls `handle_result` with the entry found, if any.
    /// The call is skipped without reading the data block when the filter
    /// rules the key out.
    pub fn internal_get<F>(
        &self,
        read_option: &ReadOption,
        key: &[u8],
        mut handle_result: F,
    ) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]),
    {
        let mut index_iter = self.index_block.iter(self.options.comparator.clone());
        index_iter.seek(key);
        if index_iter.valid() {
            let handle_value = index_iter.value();
            if let (Some(filter), Ok((handle, _))) =
                (&self.filter, BlockHandle::decode_from(handle_value))
            {
                if !filter.key_may_match(handle.offset(), key) {
                    trace!(block_offset = handle.offset(), "filter rejected key");
                    return Ok(());
                }
            }

            let mut block_iter = self.block_iter_from_index(read_option, handle_value)?;
            block_iter.seek(key);
            if block_iter.valid() {
                handle_result(block_iter.key(), block_iter.value());
            }
            block_iter.status()?;
        }
        index_iter.status()
    }

    /// Approximate file offset where the data for `key` begins (or would
    /// begin). Keys past the last entry map to an offset near the end of
    /// the file.
    pub fn approximate_offset_of(&self, key: &[u8]) -> u64 {
        let mut index_iter = self.index_block.iter(self.options.comparator.clone());
        index_iter.seek(key);
        if index_iter.valid() {
            if let Ok((handle, _)) = BlockHandle::decode_from(index_iter.value()) {
                return handle.offset();
            }
        }
        // past the last key, or an unparseable index entry: the meta index
        // sits right before the end of the file
        self.meta_index_handle.offset()
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }
}

pub struct TableBlockIterBuilder<R: RandomAccessFile> {
    table: Arc<Table<R>>,
}

impl<R: RandomAccessFile> BlockIterBuilder for TableBlockIterBuilder<R> {
    type Iter = BlockIter;

    fn build(&self, option: &ReadOption, index_val: &[u8]) -> Result<Self::Iter> {
        self.table.block_iter_from_index(option, index_val)
    }
}

/// Writes a table file: data blocks, filter block, meta index, index and
/// footer, in that order.
pub struct TableBuilder<W: WritableFile> {
    options: Arc<Options>,
    file: W,

    offset: u64,
    data_block: BlockBuilder,
    index_block: BlockBuilder,

    last_key: Vec<u8>,
    num_entries: u64,

    filter_block: Option<FilterBlockBuilder>,

    // an index entry for the last flushed block is added once the next
    // key is known, so the separator can be shortened
    pending_index_entry: bool,
    pending_handle: BlockHandle,
    compress_out: Vec<u8>,
}

impl<W: WritableFile> TableBuilder<W> {
    pub fn new(options: Arc<Options>, file: W) -> Self {
        let data_block =
            BlockBuilder::new(options.comparator.clone(), options.block_restart_interval);
        let index_block = BlockBuilder::new(options.comparator.clone(), 1);
        let filter_block = options.filter_policy.clone().map(|policy| {
            let mut filter_block_builder = FilterBlockBuilder::new(policy);
            filter_block_builder.start_block(0);
            filter_block_builder
        });
        TableBuilder {
            options,
            file,
            offset: 0,
            data_block,
            index_block,
            last_key: Vec::new(),
            num_entries: 0,
            filter_block,
            pending_index_entry: false,
            pending_handle: BlockHandle::default(),
            compress_out: Vec::new(),
        }
    }

    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Bytes written so far.
    pub fn file_size(&self) -> u64 {
        self.offset
    }

    /// Adds an entry. Keys must be added in strictly increasing order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.num_entries > 0 {
            assert_eq!(
                self.options.comparator.compare(key, &self.last_key),
                Ordering::Greater
            );
        }

        if self.pending_index_entry {
            assert!(self.data_block.is_empty());
            self.options
                .comparator
                .find_shortest_separator(&mut self.last_key, key);
            self.index_block
                .add(&self.last_key, &self.pending_handle.encoded());
            self.pending_index_entry = false;
        }

        if let Some(ref mut filter) = self.filter_block {
            filter.add_key(key);
        }

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.num_entries += 1;
        self.data_block.add(key, value);

        if self.data_block.current_size_estimate() >= self.options.block_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes the buffered data block, if any.
    pub fn flush(&mut self) -> Result<()> {
        if self.data_block.is_empty() {
            return Ok(());
        }
        assert!(!self.pending_index_entry);

        let raw = self.data_block.finish();
        self.pending_handle = self.write_block(&raw)?;
        self.pending_index_entry = true;
        self.file.flush()?;

        if let Some(ref mut filter) = self.filter_block {
            filter.start_block(self.offset);
        }
        Ok(())
    }

    /// Finishes the table and returns the file size.
    pub fn finish(mut self, sync: bool) -> Result<u64> {
        self.flush()?;

        let mut meta_index_block =
            BlockBuilder::new(self.options.comparator.clone(), self.options.block_restart_interval);
        if let (Some(filter_builder), Some(policy)) =
            (self.filter_block.take(), self.options.filter_policy.clone())
        {
            let filter_content = filter_builder.finish();
            let filter_block_handle = self.write_raw_block(&filter_content, Compress::NO)?;
            meta_index_block.add(&filter_meta_key(policy.name()), &filter_block_handle.encoded());
        }
        let meta_index_block_handle = self.write_block(&meta_index_block.finish())?;

        if self.pending_index_entry {
            self.options
                .comparator
                .find_shortest_successor(&mut self.last_key);
            self.index_block
                .add(&self.last_key, &self.pending_handle.encoded());
            self.pending_index_entry = false;
        }
        let index_contents = self.index_block.finish();
        let index_block_handle = self.write_block(&index_contents)?;

        let footer = Footer::new(meta_index_block_handle, index_block_handle);
        let buf = footer.encode();
        self.file.append(&buf)?;
        self.offset += buf.len() as u64;

        self.file.flush()?;
        if sync {
            self.file.sync()?;
        }
        debug!(
            entries = self.num_entries,
            file_size = self.offset,
            "finished table"
        );
        Ok(self.offset)
    }

    fn write_block(&mut self, raw: &[u8]) -> Result<BlockHandle> {
        let compress_type = match self.options.compression_type {
            Compress::NO => Compress::NO,
            Compress::Snappy => {
                self.compress_out.clear();
                {
                    let mut encoder = FrameEncoder::new(&mut self.compress_out);
                    encoder.write_all(raw)?;
                    encoder.flush()?;
                }
                // keep the raw block unless compression saves at least 12.5%
                if self.compress_out.len() < raw.len() - (raw.len() / 8) {
                    Compress::Snappy
                } else {
                    Compress::NO
                }
            }
        };

        match compress_type {
            Compress::Snappy => {
                let compressed = std::mem::take(&mut self.compress_out);
                let handle = self.write_raw_block(&compressed, Compress::Snappy);
                self.compress_out = compressed;
                handle
            }
            Compress::NO => self.write_raw_block(raw, Compress::NO),
        }
    }

    fn write_raw_block(
        &mut self,
        block_content: &[u8],
        compress_type: Compress,
    ) -> Result<BlockHandle> {
        let handle = BlockHandle::new(self.offset, block_content.len() as u64);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(block_content);
        hasher.update(&[compress_type.as_byte()]);
        let checksum = hasher.finalize();

        let mut trailer = Vec::with_capacity(BLOCK_TRAILER_SIZE);
        trailer.write_u8_le(compress_type.as_byte())?;
        trailer.write_u32_le(checksum)?;

        self.file.append(block_content)?;
        self.file.append(&trailer)?;
        self.offset += (block_content.len() + BLOCK_TRAILER_SIZE) as u64;

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        path::Path,
        sync::atomic::{AtomicUsize, Ordering as AtomicOrdering},
    };

    use crate::{
        env::{
            mem::{MemEnv, MemRandomAccessFile},
            Env,
        },
        filter::{BloomFilterPolicy, FilterPolicy},
        utils::cache::ShardLruCache,
    };

    use super::*;

    /// Counts block reads so tests can tell whether a lookup touched a data
    /// block.
    struct CountingFile<R> {
        inner: R,
        reads: AtomicUsize,
    }

    impl<R: RandomAccessFile> CountingFile<R> {
        fn new(inner: R) -> Self {
            CountingFile {
                inner,
                reads: AtomicUsize::new(0),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(AtomicOrdering::SeqCst)
        }
    }

    impl<R: RandomAccessFile> RandomAccessFile for CountingFile<R> {
        fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
            self.reads.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.read_at(buf, offset)
        }

        fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
            self.reads.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.read_exact_at(buf, offset)
        }
    }

    type TestFile = CountingFile<MemRandomAccessFile>;

    fn test_options(filter: bool, compression_type: Compress) -> Options {
        let filter_policy: Option<Arc<dyn FilterPolicy>> = if filter {
            Some(Arc::new(BloomFilterPolicy::new(10)))
        } else {
            None
        };
        Options {
            filter_policy,
            block_restart_interval: 4,
            block_size: 256,
            compression_type,
            ..Default::default()
        }
    }

    fn test_data(n: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        (0..n)
            .map(|i| {
                (
                    format!("key{:06}", i * 2).into_bytes(),
                    format!("value:{:06}", i).into_bytes(),
                )
            })
            .collect()
    }

    fn build_table(
        env: &MemEnv,
        path: &Path,
        options: &Arc<Options>,
        data: &[(Vec<u8>, Vec<u8>)],
    ) -> u64 {
        let file = env.new_writable_file(path).unwrap();
        let mut builder = TableBuilder::new(options.clone(), file);
        for (k, v) in data.iter() {
            builder.add(k, v).unwrap();
        }
        assert_eq!(builder.num_entries(), data.len() as u64);
        let size = builder.finish(true).unwrap();
        assert_eq!(size, env.file_size(path).unwrap());
        size
    }

    fn open_table(
        env: &MemEnv,
        path: &Path,
        options: &Arc<Options>,
    ) -> Result<(Arc<TestFile>, Table<TestFile>)> {
        let size = env.file_size(path)?;
        let file = Arc::new(CountingFile::new(env.new_random_access_file(path)?));
        let table = Table::open(options.clone(), file.clone(), size)?;
        Ok((file, table))
    }

    fn read_file(env: &MemEnv, path: &Path) -> Vec<u8> {
        let size = env.file_size(path).unwrap() as usize;
        let mut buf = vec![0; size];
        env.new_random_access_file(path)
            .unwrap()
            .read_exact_at(&mut buf, 0)
            .unwrap();
        buf
    }

    fn write_file(env: &MemEnv, path: &Path, data: &[u8]) {
        let mut file = env.new_writable_file(path).unwrap();
        file.append(data).unwrap();
        file.flush().unwrap();
    }

    #[test]
    fn test_table_iterate() {
        let env = MemEnv::new();
        let path = Path::new("000001.ldb");
        let data = test_data(500);
        for filter in [false, true] {
            for compression_type in [Compress::NO, Compress::Snappy] {
                let options = Arc::new(test_options(filter, compression_type));
                build_table(&env, path, &options, &data);
                let (_, table) = open_table(&env, path, &options).unwrap();
                assert_eq!(table.has_filter(), filter);

                let mut iter = Arc::new(table).iter(ReadOption::default());
                assert!(!iter.valid());

                iter.seek_to_first();
                for (k, v) in data.iter() {
                    assert!(iter.valid());
                    assert_eq!(iter.key(), k.as_slice());
                    assert_eq!(iter.value(), v.as_slice());
                    iter.next();
                }
                assert!(!iter.valid());

                iter.seek_to_last();
                for (k, v) in data.iter().rev() {
                    assert!(iter.valid());
                    assert_eq!(iter.key(), k.as_slice());
                    assert_eq!(iter.value(), v.as_slice());
                    iter.prev();
                }
                assert!(!iter.valid());

                iter.seek(b"key000101");
                assert!(iter.valid());
                assert_eq!(iter.key(), b"key000102");
                iter.seek(b"key999999");
                assert!(!iter.valid());
                assert!(iter.status().is_ok());
            }
        }
    }

    #[test]
    fn test_empty_table() {
        let env = MemEnv::new();
        let path = Path::new("000002.ldb");
        let options = Arc::new(test_options(true, Compress::Snappy));
        build_table(&env, path, &options, &[]);

        let (_, table) = open_table(&env, path, &options).unwrap();
        let mut calls = 0;
        table
            .internal_get(&ReadOption::default(), b"a", |_, _| calls += 1)
            .unwrap();
        assert_eq!(calls, 0);

        let mut iter = Arc::new(table).iter(ReadOption::default());
        iter.seek_to_first();
        assert!(!iter.valid());
        assert!(iter.status().is_ok());
    }

    #[test]
    fn test_internal_get() {
        let env = MemEnv::new();
        let path = Path::new("000003.ldb");
        let data = test_data(500);
        let options = Arc::new(test_options(true, Compress::Snappy));
        build_table(&env, path, &options, &data);
        let (file, table) = open_table(&env, path, &options).unwrap();

        for (k, v) in data.iter() {
            let mut found = None;
            table
                .internal_get(&ReadOption::default(), k, |key, val| {
                    found = Some((key.to_vec(), val.to_vec()))
                })
                .unwrap();
            assert_eq!(found, Some((k.clone(), v.clone())));
        }

        // odd keys were never added; the filter skips nearly all of them
        let before = file.reads();
        let mut calls = 0;
        for i in 0..500 {
            let key = format!("key{:06}", i * 2 + 1).into_bytes();
            table
                .internal_get(&ReadOption::default(), &key, |found, _| {
                    assert_ne!(found, key.as_slice());
                    calls += 1;
                })
                .unwrap();
        }
        let block_reads = file.reads() - before;
        assert!(calls <= block_reads);
        assert!(block_reads <= 25, "{} blocks read", block_reads);
    }

    #[test]
    fn test_internal_get_without_filter_reads_block() {
        let env = MemEnv::new();
        let path = Path::new("000004.ldb");
        let options = Arc::new(test_options(false, Compress::NO));
        build_table(&env, path, &options, &test_data(100));
        let (file, table) = open_table(&env, path, &options).unwrap();

        let before = file.reads();
        let mut seen = Vec::new();
        table
            .internal_get(&ReadOption::default(), b"key000012", |k, v| {
                seen.push((k.to_vec(), v.to_vec()))
            })
            .unwrap();
        assert_eq!(file.reads() - before, 1);
        assert_eq!(seen, vec![(b"key000012".to_vec(), b"value:000006".to_vec())]);

        // past the last key nothing is read
        let before = file.reads();
        table
            .internal_get(&ReadOption::default(), b"zzz", |_, _| panic!("unexpected"))
            .unwrap();
        assert_eq!(file.reads(), before);
    }

    #[test]
    fn test_approximate_offset_of() {
        let env = MemEnv::new();
        let path = Path::new("000005.ldb");
        let options = Arc::new(Options {
            block_size: 1024,
            compression_type: Compress::NO,
            ..Default::default()
        });
        let data: Vec<(Vec<u8>, Vec<u8>)> = [
            ("k01", 5),
            ("k02", 6),
            ("k03", 10000),
            ("k04", 200000),
            ("k05", 300000),
            ("k06", 6),
            ("k07", 100000),
        ]
        .iter()
        .map(|&(k, n)| (k.as_bytes().to_vec(), vec![b'x'; n]))
        .collect();
        build_table(&env, path, &options, &data);
        let (_, table) = open_table(&env, path, &options).unwrap();

        let between = |key: &[u8], low: u64, high: u64| {
            let offset = table.approximate_offset_of(key);
            assert!(
                offset >= low && offset <= high,
                "{:?}: {} not in [{}, {}]",
                String::from_utf8_lossy(key),
                offset,
                low,
                high
            );
        };
        between(b"abc", 0, 0);
        between(b"k01", 0, 0);
        between(b"k01a", 0, 0);
        between(b"k02", 0, 0);
        between(b"k03", 0, 0);
        between(b"k04", 10000, 11000);
        between(b"k04a", 210000, 211000);
        between(b"k05", 210000, 211000);
        between(b"k06", 510000, 511000);
        between(b"k07", 510000, 511000);
        between(b"xyz", 610000, 612000);
    }

    #[test]
    fn test_open_rejects_bad_files() {
        let env = MemEnv::new();
        let options = Arc::new(test_options(true, Compress::NO));

        let short = Path::new("short.ldb");
        write_file(&env, short, b"too short");
        assert!(open_table(&env, short, &options)
            .err()
            .unwrap()
            .is_corruption());

        let path = Path::new("000006.ldb");
        build_table(&env, path, &options, &test_data(100));
        let good = read_file(&env, path);

        let mut bad_magic = good.clone();
        let n = bad_magic.len();
        bad_magic[n - 1] ^= 0xff;
        write_file(&env, path, &bad_magic);
        assert!(open_table(&env, path, &options)
            .err()
            .unwrap()
            .is_corruption());

        let footer = Footer::decode(&good[good.len() - FULL_FOOTER_LENGTH..]).unwrap();

        // the filter block ends right before the meta index block
        let mut bad_filter = good.clone();
        let last_filter_byte = footer.meta_index_handle.offset() as usize - BLOCK_TRAILER_SIZE - 1;
        bad_filter[last_filter_byte] ^= 0xff;
        write_file(&env, path, &bad_filter);
        assert!(open_table(&env, path, &options)
            .err()
            .unwrap()
            .is_corruption());

        let mut bad_index = good.clone();
        bad_index[footer.index_handle.offset() as usize] ^= 0xff;
        write_file(&env, path, &bad_index);
        assert!(open_table(&env, path, &options)
            .err()
            .unwrap()
            .is_corruption());

        write_file(&env, path, &good);
        assert!(open_table(&env, path, &options).is_ok());
    }

    #[test]
    fn test_open_rejects_handles_past_end_of_file() {
        let env = MemEnv::new();
        let options = Arc::new(test_options(true, Compress::NO));
        let path = Path::new("000009.ldb");
        build_table(&env, path, &options, &test_data(100));
        let good = read_file(&env, path);
        let body_len = good.len() - FULL_FOOTER_LENGTH;
        let footer = Footer::decode(&good[body_len..]).unwrap();

        let with_footer = |footer: Footer| {
            let mut data = good[..body_len].to_vec();
            data.extend_from_slice(&footer.encode());
            data
        };
        let bad_footers = [
            Footer::new(BlockHandle::new(0, 10), BlockHandle::new(0, u64::MAX)),
            Footer::new(BlockHandle::new(0, 10), BlockHandle::new(0, 1 << 40)),
            Footer::new(BlockHandle::new(0, 10), BlockHandle::new(u64::MAX - 2, 4)),
            Footer::new(
                BlockHandle::new(footer.meta_index_handle.offset(), 1 << 40),
                footer.index_handle,
            ),
        ];
        for bad in bad_footers.iter() {
            write_file(&env, path, &with_footer(*bad));
            let err = open_table(&env, path, &options).err().unwrap();
            assert!(err.is_corruption(), "{:?}: {}", bad, err);
        }

        write_file(&env, path, &with_footer(footer));
        assert!(open_table(&env, path, &options).is_ok());
    }

    #[test]
    fn test_table_without_matching_filter_policy() {
        let env = MemEnv::new();
        let path = Path::new("000007.ldb");
        let written = Arc::new(test_options(false, Compress::NO));
        let data = test_data(50);
        build_table(&env, path, &written, &data);

        let options = Arc::new(test_options(true, Compress::NO));
        let (_, table) = open_table(&env, path, &options).unwrap();
        assert!(!table.has_filter());

        let mut found = false;
        table
            .internal_get(&ReadOption::default(), &data[7].0, |k, _| {
                found = k == data[7].0.as_slice()
            })
            .unwrap();
        assert!(found);
    }

    #[test]
    fn test_block_cache() {
        let env = MemEnv::new();
        let path = Path::new("000008.ldb");
        let cache = Arc::new(ShardLruCache::new(1 << 20));
        let options = Arc::new(Options {
            block_cache: Some(cache.clone()),
            ..test_options(false, Compress::Snappy)
        });
        let data = test_data(200);
        build_table(&env, path, &options, &data);

        let (_, no_fill) = open_table(&env, path, &options).unwrap();
        let read_option = ReadOption {
            fill_cache: false,
            ..Default::default()
        };
        let mut iter = Arc::new(no_fill).iter(read_option);
        iter.seek_to_first();
        assert!(iter.valid());
        assert_eq!(cache.total_charge(), 0);

        let (file, table) = open_table(&env, path, &options).unwrap();
        let table = Arc::new(table);
        let count = |table: &Arc<Table<_>>| {
            let mut iter = table.clone().iter(ReadOption::default());
            iter.seek_to_first();
            let mut n = 0;
            while iter.valid() {
                n += 1;
                iter.next();
            }
            n
        };
        assert_eq!(count(&table), data.len());
        assert!(cache.total_charge() > 0);

        let reads = file.reads();
        assert_eq!(count(&table), data.len());
        assert_eq!(file.reads(), reads);

        // a second open gets its own slice of the cache key space
        let (_, other) = open_table(&env, path, &options).unwrap();
        assert_ne!(other.cache_id, table.cache_id);
    }
}
