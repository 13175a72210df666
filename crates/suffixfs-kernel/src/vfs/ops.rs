//! VFS operations trait.
//!
//! The backing store as seen by the passthrough delegate: path-based, no
//! inodes, explicit offset/size.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::stream::{DirStream, collect_entries};
use super::types::{DirEntry, FileAttr, SetAttr, StatFs};
use super::VfsResult;

/// Backing store operations.
///
/// Paths are always relative to the backend's root. An empty path is the
/// root itself.
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get file attributes (without following a final symlink).
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Open a directory for enumeration.
    ///
    /// Entries come out in the store's own order, unsorted.
    async fn opendir(&self, path: &Path) -> VfsResult<Box<dyn DirStream>>;

    /// Read file contents.
    ///
    /// Reads up to `size` bytes starting at `offset`.
    /// Returns fewer bytes if EOF is reached.
    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    /// Read symbolic link target.
    async fn readlink(&self, path: &Path) -> VfsResult<PathBuf>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write data to a file at `offset`. Returns the number of bytes written.
    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32>;

    /// Create a new, empty file.
    async fn create(&self, path: &Path, mode: u32) -> VfsResult<FileAttr>;

    /// Create a new directory.
    async fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr>;

    /// Remove a file.
    async fn unlink(&self, path: &Path) -> VfsResult<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &Path) -> VfsResult<()>;

    /// Rename a file or directory.
    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()>;

    /// Set file attributes.
    async fn setattr(&self, path: &Path, attr: SetAttr) -> VfsResult<FileAttr>;

    /// Create a symlink at `path` pointing to `target`.
    async fn symlink(&self, path: &Path, target: &Path) -> VfsResult<FileAttr>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Returns true if this filesystem is read-only.
    fn read_only(&self) -> bool;

    /// Get filesystem statistics.
    async fn statfs(&self) -> VfsResult<StatFs>;

    /// Absolute host path for `path`, if the store is backed by one.
    async fn real_path(&self, _path: &Path) -> VfsResult<Option<PathBuf>> {
        Ok(None)
    }

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.getattr(path).await.is_ok()
    }

    /// Read all entries of a directory, in store order.
    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let mut stream = self.opendir(path).await?;
        collect_entries(stream.as_mut())
    }

    /// Write entire file contents, creating or truncating first.
    async fn write_all(&self, path: &Path, data: &[u8]) -> VfsResult<()> {
        if self.exists(path).await {
            self.setattr(path, SetAttr::new().with_size(0)).await?;
        } else {
            self.create(path, 0o644).await?;
        }
        self.write(path, 0, data).await?;
        Ok(())
    }
}
