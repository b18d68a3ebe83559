//! Thread-safe filesystem handle
//!
//! One mutex guards the whole filesystem, so block allocation and chain
//! updates from different threads never interleave.

use crate::error::Result;
use crate::filesystem::{FileSystem, FsStats};
use crate::handle::{HandleId, OpenMode};
use crate::io::{DiskImage, Storage};
use crate::snapshot::FsSnapshot;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Cloneable, lock-protected [`FileSystem`]
pub struct SharedFileSystem<S: Storage = DiskImage> {
    inner: Arc<Mutex<FileSystem<S>>>,
}

impl<S: Storage> Clone for SharedFileSystem<S> {
    fn clone(&self) -> Self {
        SharedFileSystem {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Storage> SharedFileSystem<S> {
    pub fn new(fs: FileSystem<S>) -> Self {
        SharedFileSystem {
            inner: Arc::new(Mutex::new(fs)),
        }
    }

    /// Lock the filesystem for a sequence of operations
    pub fn lock(&self) -> MutexGuard<'_, FileSystem<S>> {
        self.inner.lock()
    }

    /// Run `f` with exclusive access
    pub fn with<R>(&self, f: impl FnOnce(&mut FileSystem<S>) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    pub fn create_file(&self, name: &str) -> Result<()> {
        self.inner.lock().create_file(name)
    }

    pub fn open(&self, name: &str, mode: OpenMode) -> Result<HandleId> {
        self.inner.lock().open(name, mode)
    }

    pub fn close_handle(&self, id: HandleId) -> Result<()> {
        self.inner.lock().close_handle(id)
    }

    pub fn read(&self, id: HandleId, max_len: usize) -> Result<Vec<u8>> {
        self.inner.lock().read(id, max_len)
    }

    pub fn write(&self, id: HandleId, data: &[u8]) -> Result<usize> {
        self.inner.lock().write(id, data)
    }

    pub fn seek(&self, id: HandleId, offset: i64, from_start: bool) -> Result<u64> {
        self.inner.lock().seek(id, offset, from_start)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        self.inner.lock().delete(name)
    }

    pub fn size_of(&self, name: &str) -> Result<u64> {
        self.inner.lock().size_of(name)
    }

    pub fn list_files(&self) -> Vec<String> {
        self.inner.lock().list_files()
    }

    pub fn stats(&self) -> FsStats {
        self.inner.lock().stats()
    }

    pub fn snapshot(&self) -> FsSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn save(&self) -> Result<()> {
        self.inner.lock().save()
    }

    /// Unwrap the filesystem if this is the last clone
    pub fn try_unwrap(self) -> std::result::Result<FileSystem<S>, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| SharedFileSystem { inner })
    }
}

impl<S: Storage> From<FileSystem<S>> for SharedFileSystem<S> {
    fn from(fs: FileSystem<S>) -> Self {
        Self::new(fs)
    }
}
