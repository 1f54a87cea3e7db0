pub mod mem;
pub mod posix;

use std::path::Path;

use crate::error::Result;

pub trait RandomAccessFile: Send + Sync {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize>;
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()>;
}

pub trait WritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn sync(&mut self) -> Result<()>;
}

pub trait Env: Send + Sync + Clone + 'static {
    type RandomAccessFile: RandomAccessFile + 'static;
    type WritableFile: WritableFile + 'static;

    fn new_random_access_file(&self, name: &Path) -> Result<Self::RandomAccessFile>;
    fn new_writable_file(&self, name: &Path) -> Result<Self::WritableFile>;
    fn file_size(&self, path: &Path) -> Result<u64>;
    fn file_exists(&self, path: &Path) -> bool;
    fn delete_file(&self, path: &Path) -> Result<()>;
    fn rename_file(&self, from: &Path, to: &Path) -> Result<()>;
}
