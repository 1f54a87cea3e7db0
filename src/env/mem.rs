use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use crate::error::{Error, Result};

use super::{Env, RandomAccessFile, WritableFile};

type FileData = Arc<Mutex<Vec<u8>>>;

#[derive(Default)]
struct MemFsState {
    files: HashMap<PathBuf, FileData>,
    opens: HashMap<PathBuf, usize>,
}

/// In-memory environment. Besides storing files it counts how often each
/// file was opened for random access and how many of those handles are
/// still alive.
#[derive(Clone, Default)]
pub struct MemEnv {
    state: Arc<Mutex<MemFsState>>,
    live_handles: Arc<AtomicUsize>,
}

impl MemEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `new_random_access_file` calls for `path`.
    pub fn open_count(&self, path: &Path) -> usize {
        self.state().opens.get(path).copied().unwrap_or(0)
    }

    /// Random access handles that have not been dropped yet.
    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, MemFsState> {
        // a panicking test thread must not hide the files from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn not_found(path: &Path) -> Error {
    Error::IOError {
        source: io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        ),
    }
}

fn lock(data: &FileData) -> MutexGuard<'_, Vec<u8>> {
    data.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct MemRandomAccessFile {
    data: FileData,
    live_handles: Arc<AtomicUsize>,
}

impl RandomAccessFile for MemRandomAccessFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let data = lock(&self.data);
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        let n = std::cmp::min(buf.len(), data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        if self.read_at(buf, offset)? < buf.len() {
            return Err(Error::IOError {
                source: io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of file"),
            });
        }
        Ok(())
    }
}

impl Drop for MemRandomAccessFile {
    fn drop(&mut self) {
        self.live_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MemWritableFile {
    data: FileData,
}

impl WritableFile for MemWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        lock(&self.data).extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Env for MemEnv {
    type RandomAccessFile = MemRandomAccessFile;
    type WritableFile = MemWritableFile;

    fn new_random_access_file(&self, name: &Path) -> Result<Self::RandomAccessFile> {
        let mut state = self.state();
        let data = state.files.get(name).cloned().ok_or_else(|| not_found(name))?;
        *state.opens.entry(name.to_path_buf()).or_insert(0) += 1;
        self.live_handles.fetch_add(1, Ordering::SeqCst);
        Ok(MemRandomAccessFile {
            data,
            live_handles: self.live_handles.clone(),
        })
    }

    fn new_writable_file(&self, name: &Path) -> Result<Self::WritableFile> {
        let data = FileData::default();
        self.state().files.insert(name.to_path_buf(), data.clone());
        Ok(MemWritableFile { data })
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        let state = self.state();
        let data = state.files.get(path).ok_or_else(|| not_found(path))?;
        let len = lock(data).len();
        Ok(len as u64)
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.state().files.contains_key(path)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        self.state()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.state();
        let data = state.files.remove(from).ok_or_else(|| not_found(from))?;
        state.files.insert(to.to_path_buf(), data);
        Ok(())
    }
}
