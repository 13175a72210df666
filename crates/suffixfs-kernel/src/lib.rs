//! # suffixfs-kernel
//!
//! Passthrough filesystem core that hides RISC OS style type suffixes.
//!
//! Files on the backing store carry a trailing `,xxx` filetype tag
//! (`photo,fe1`). Clients see and request the bare name (`photo`):
//!
//! - [`suffix::codec`] strips and recognizes the tag
//! - [`suffix::Resolver`] maps a bare name back to the name on disk
//! - [`suffix::SuffixFs`] is the lookup adapter and listing transformer,
//!   stacked on any [`node::NodeOps`] delegate
//! - [`node::Passthrough`] is that delegate over a path-based [`vfs::VfsOps`]
//!   store ([`LocalBackend`] for real directories)

pub mod config;
pub mod node;
pub mod suffix;
pub mod vfs;

pub use config::{ConfigError, SuffixFsConfig};
pub use node::{Entry, Ino, NodeOps, NodeTable, Passthrough, ROOT_INO, Request};
pub use suffix::{Resolution, Resolver, SuffixDirStream, SuffixFs, TieBreak};
pub use vfs::{
    DirEntry, DirStream, EntryStream, FileAttr, FileType, SetAttr, StatFs, VfsError, VfsOps,
    VfsResult,
    backends::{LocalBackend, MemoryBackend},
};
