//! Path-based backing store abstraction.
//!
//! Key components:
//!
//! - [`VfsOps`] - Filesystem operations on backend-relative paths
//! - [`DirStream`] - Ordered, closable directory enumeration
//! - [`LocalBackend`] - Real directory tree (with path security)
//! - [`MemoryBackend`] - In-memory tree with insertion-ordered directories
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: the store only knows paths. Inode numbers are
//!   handed out by [`crate::node::NodeTable`] one layer up.
//! - **Raw enumeration order**: `opendir` yields entries in whatever order the
//!   store produces them. Nothing here sorts, because name resolution and
//!   listings must observe the same order.

pub mod backends;
mod error;
mod ops;
mod stream;
mod types;

pub use backends::{LocalBackend, MemoryBackend};
pub use error::{VfsError, VfsResult};
pub use ops::VfsOps;
pub use stream::{DirStream, EntryStream, collect_entries};
pub use types::{DirEntry, FileAttr, FileType, SetAttr, StatFs};
