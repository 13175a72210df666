//! Inode-based filesystem operations.
//!
//! A kernel transport speaks in inode numbers: "look up `name` in directory
//! 7", "list directory 7". [`NodeOps`] is that capability set. It is
//! implemented by [`Passthrough`], which maps inodes to paths on a
//! [`VfsOps`] store, and by layers stacked on top of it such as
//! [`crate::suffix::SuffixFs`].

mod passthrough;
mod table;

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::vfs::{DirStream, FileAttr, SetAttr, StatFs, VfsError, VfsOps, VfsResult};

pub use passthrough::Passthrough;
pub use table::NodeTable;

/// Inode number.
pub type Ino = u64;

/// Inode of the filesystem root. Always present, never forgotten.
pub const ROOT_INO: Ino = 1;

/// Default entry and attribute validity, one second.
pub const DEFAULT_TTL: Duration = Duration::from_secs(1);

/// Per-request context handed down from the transport.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Transport-assigned request id, for log correlation.
    pub unique: u64,
    /// Fires when the transport abandons the request.
    pub cancel: CancellationToken,
}

impl Request {
    /// Create a request with a fresh, never-cancelled token.
    pub fn new(unique: u64) -> Self {
        Self {
            unique,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a request bound to an existing cancellation token.
    pub fn with_cancel(unique: u64, cancel: CancellationToken) -> Self {
        Self { unique, cancel }
    }

    /// Fail with [`VfsError::Cancelled`] if the request has been abandoned.
    pub fn check(&self) -> VfsResult<()> {
        if self.cancel.is_cancelled() {
            Err(VfsError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Reply to a successful lookup or create.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Inode assigned to the child.
    pub ino: Ino,
    /// Attributes of the child.
    pub attr: FileAttr,
    /// How long the kernel may cache the name → inode mapping.
    pub entry_ttl: Duration,
    /// How long the kernel may cache `attr`.
    pub attr_ttl: Duration,
}

/// Inode-based filesystem operations.
#[async_trait]
pub trait NodeOps: Send + Sync {
    /// The path-based store underneath, for read-only directory scans.
    fn store(&self) -> &dyn VfsOps;

    /// Store-relative path of a node. This is the directory-handle-to-path
    /// capability that name resolution is built on.
    fn node_path(&self, ino: Ino) -> VfsResult<PathBuf>;

    /// Look up `name` in directory `parent`, taking one lookup reference.
    ///
    /// Names are raw bytes and need not be UTF-8.
    async fn lookup(&self, req: &Request, parent: Ino, name: &OsStr) -> VfsResult<Entry>;

    /// Drop `nlookup` lookup references on `ino`.
    fn forget(&self, ino: Ino, nlookup: u64);

    /// Get attributes of a node.
    async fn getattr(&self, req: &Request, ino: Ino) -> VfsResult<FileAttr>;

    /// Set attributes of a node.
    async fn setattr(&self, req: &Request, ino: Ino, attr: SetAttr) -> VfsResult<FileAttr>;

    /// Open directory `ino` for enumeration.
    async fn opendir(&self, req: &Request, ino: Ino) -> VfsResult<Box<dyn DirStream>>;

    /// Read file contents.
    async fn read(&self, req: &Request, ino: Ino, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    /// Write file contents.
    async fn write(&self, req: &Request, ino: Ino, offset: u64, data: &[u8]) -> VfsResult<u32>;

    /// Read a symlink target.
    async fn readlink(&self, req: &Request, ino: Ino) -> VfsResult<PathBuf>;

    /// Create a regular file `name` in `parent`.
    async fn create(
        &self,
        req: &Request,
        parent: Ino,
        name: &OsStr,
        mode: u32,
    ) -> VfsResult<Entry>;

    /// Create a directory `name` in `parent`.
    async fn mkdir(&self, req: &Request, parent: Ino, name: &OsStr, mode: u32)
    -> VfsResult<Entry>;

    /// Remove file `name` from `parent`.
    async fn unlink(&self, req: &Request, parent: Ino, name: &OsStr) -> VfsResult<()>;

    /// Remove empty directory `name` from `parent`.
    async fn rmdir(&self, req: &Request, parent: Ino, name: &OsStr) -> VfsResult<()>;

    /// Move `parent/name` to `new_parent/new_name`.
    async fn rename(
        &self,
        req: &Request,
        parent: Ino,
        name: &OsStr,
        new_parent: Ino,
        new_name: &OsStr,
    ) -> VfsResult<()>;

    /// Filesystem statistics.
    async fn statfs(&self, req: &Request) -> VfsResult<StatFs>;

    /// Read an extended attribute.
    async fn getxattr(&self, _req: &Request, _ino: Ino, name: &str) -> VfsResult<Vec<u8>> {
        Err(VfsError::no_attribute(name))
    }

    /// List extended attribute names.
    async fn listxattr(&self, _req: &Request, _ino: Ino) -> VfsResult<Vec<String>> {
        Ok(Vec::new())
    }
}
