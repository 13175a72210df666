//! Inode ↔ path bookkeeping.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Ino, ROOT_INO};
use crate::vfs::{VfsError, VfsResult};

#[derive(Debug)]
struct Node {
    path: PathBuf,
    lookups: u64,
}

/// Maps inode numbers to store-relative paths.
///
/// Every successful lookup takes a reference on the returned inode and the
/// kernel gives references back through `forget`. A node is dropped when its
/// count reaches zero. The root is pinned.
///
/// Lock order is `by_path` before `nodes`; no method holds a `nodes` guard
/// while touching `by_path`.
#[derive(Debug)]
pub struct NodeTable {
    nodes: DashMap<Ino, Node>,
    by_path: DashMap<PathBuf, Ino>,
    next_ino: AtomicU64,
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTable {
    /// Create a table holding only the root.
    pub fn new() -> Self {
        let nodes = DashMap::new();
        nodes.insert(
            ROOT_INO,
            Node {
                path: PathBuf::new(),
                lookups: 1,
            },
        );
        let by_path = DashMap::new();
        by_path.insert(PathBuf::new(), ROOT_INO);

        Self {
            nodes,
            by_path,
            next_ino: AtomicU64::new(ROOT_INO + 1),
        }
    }

    /// Path of `ino`, or [`VfsError::StaleHandle`] if it is unknown.
    pub fn path(&self, ino: Ino) -> VfsResult<PathBuf> {
        self.nodes
            .get(&ino)
            .map(|node| node.path.clone())
            .ok_or(VfsError::StaleHandle(ino))
    }

    /// Inode currently bound to `path`, without taking a reference.
    pub fn ino_of(&self, path: &Path) -> Option<Ino> {
        self.by_path.get(path).map(|ino| *ino)
    }

    /// Take a lookup reference on the node for `path`, allocating it if new.
    pub fn remember(&self, path: PathBuf) -> Ino {
        match self.by_path.entry(path) {
            MapEntry::Occupied(mut slot) => {
                let ino = *slot.get();
                if let Some(mut node) = self.nodes.get_mut(&ino) {
                    node.lookups += 1;
                    return ino;
                }
                // Forgotten after `by_path` was read but before the binding
                // was dropped. The old inode is dead; rebind the path.
                let ino = self.allocate(slot.key().clone());
                slot.insert(ino);
                ino
            }
            MapEntry::Vacant(slot) => {
                let ino = self.allocate(slot.key().clone());
                slot.insert(ino);
                ino
            }
        }
    }

    fn allocate(&self, path: PathBuf) -> Ino {
        let ino = self.next_ino.fetch_add(1, Ordering::Relaxed);
        self.nodes.insert(ino, Node { path, lookups: 1 });
        ino
    }

    /// Drop `nlookup` references on `ino`.
    pub fn forget(&self, ino: Ino, nlookup: u64) {
        if ino == ROOT_INO {
            return;
        }

        let released = match self.nodes.get_mut(&ino) {
            Some(mut node) => {
                node.lookups = node.lookups.saturating_sub(nlookup);
                node.lookups == 0
            }
            None => false,
        };

        if !released {
            return;
        }
        if let Some((_, node)) = self.nodes.remove_if(&ino, |_, node| node.lookups == 0) {
            self.by_path.remove_if(&node.path, |_, bound| *bound == ino);
        }
    }

    /// Detach `path` from its inode after the entry was removed.
    ///
    /// The inode stays valid until forgotten; a new entry created under the
    /// same path gets a fresh inode.
    pub fn unbind(&self, path: &Path) {
        self.by_path.remove(path);
    }

    /// Rebind `from` and everything below it to `to`.
    pub fn rename(&self, from: &Path, to: &Path) {
        let moved: Vec<(Ino, PathBuf)> = self
            .nodes
            .iter()
            .filter(|node| node.path.starts_with(from))
            .map(|node| (*node.key(), node.path.clone()))
            .collect();

        // A replaced target keeps its inode alive but loses its name.
        self.unbind(to);

        for (ino, old_path) in moved {
            let Ok(suffix) = old_path.strip_prefix(from) else {
                continue;
            };
            let new_path = if suffix.as_os_str().is_empty() {
                to.to_path_buf()
            } else {
                to.join(suffix)
            };

            if let Some(mut node) = self.nodes.get_mut(&ino) {
                node.path = new_path.clone();
            }
            self.by_path.remove_if(&old_path, |_, bound| *bound == ino);
            self.by_path.insert(new_path, ino);
        }
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if only the root is present.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}
