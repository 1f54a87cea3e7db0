use super::{Env, RandomAccessFile, WritableFile};
use crate::error::Result;
#[cfg(unix)]
use std::os::unix::fs::FileExt;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

pub struct PosixFile(File);

#[cfg(unix)]
impl RandomAccessFile for PosixFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        Ok(self.0.read_at(buf, offset)?)
    }
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        Ok(self.0.read_exact_at(buf, offset)?)
    }
}

pub struct PosixWritableFile(BufWriter<File>);

impl WritableFile for PosixWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        Ok(self.0.write_all(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.0.flush()?)
    }

    fn sync(&mut self) -> Result<()> {
        self.0.flush()?;
        Ok(self.0.get_ref().sync_all()?)
    }
}

#[cfg(unix)]
#[derive(Clone, Copy, Default)]
pub struct PosixEnv {}

#[cfg(unix)]
impl Env for PosixEnv {
    type RandomAccessFile = PosixFile;
    type WritableFile = PosixWritableFile;

    fn new_random_access_file(&self, name: &Path) -> Result<Self::RandomAccessFile> {
        Ok(PosixFile(fs::OpenOptions::new().read(true).open(name)?))
    }

    fn new_writable_file(&self, path: &Path) -> Result<Self::WritableFile> {
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(PosixWritableFile(BufWriter::new(file)))
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        Ok(fs::remove_file(path)?)
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<()> {
        Ok(fs::rename(from, to)?)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_write_then_read_at() {
        let env = PosixEnv {};
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("000001.ldb");

        let mut file = env.new_writable_file(&path).unwrap();
        file.append(b"hello ").unwrap();
        file.append(b"world").unwrap();
        file.sync().unwrap();
        drop(file);

        assert!(env.file_exists(&path));
        assert_eq!(env.file_size(&path).unwrap(), 11);

        let file = env.new_random_access_file(&path).unwrap();
        let mut buf = [0u8; 5];
        file.read_exact_at(&mut buf, 6).unwrap();
        assert_eq!(&buf, b"world");
        assert!(file.read_exact_at(&mut buf, 8).is_err());

        let renamed = tmp_dir.path().join("000001.sst");
        env.rename_file(&path, &renamed).unwrap();
        assert!(!env.file_exists(&path));
        assert!(env.new_random_access_file(&path).err().unwrap().is_not_found());

        env.delete_file(&renamed).unwrap();
        assert!(!env.file_exists(&renamed));
    }
}
