//! Passthrough delegate: inode operations forwarded to a path-based store.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use super::{DEFAULT_TTL, Entry, Ino, NodeOps, NodeTable, Request};
use crate::vfs::{DirStream, FileAttr, SetAttr, StatFs, VfsError, VfsOps, VfsResult};

/// Longest single path component accepted by a lookup or create.
const MAX_NAME_LEN: usize = 255;

/// Forwards every operation to a [`VfsOps`] store unchanged.
///
/// Names are used exactly as given; this layer knows nothing about
/// suffixes. It owns the [`NodeTable`] that turns the store's paths into
/// inode numbers.
pub struct Passthrough<B> {
    store: Arc<B>,
    nodes: NodeTable,
    entry_ttl: Duration,
    attr_ttl: Duration,
}

impl<B> std::fmt::Debug for Passthrough<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Passthrough")
            .field("nodes", &self.nodes.len())
            .field("entry_ttl", &self.entry_ttl)
            .field("attr_ttl", &self.attr_ttl)
            .finish()
    }
}

impl<B: VfsOps> Passthrough<B> {
    /// Wrap a store.
    pub fn new(store: B) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// Wrap a shared store.
    pub fn from_arc(store: Arc<B>) -> Self {
        Self {
            store,
            nodes: NodeTable::new(),
            entry_ttl: DEFAULT_TTL,
            attr_ttl: DEFAULT_TTL,
        }
    }

    /// Set the cache validity reported on entry replies.
    pub fn with_ttl(mut self, entry_ttl: Duration, attr_ttl: Duration) -> Self {
        self.entry_ttl = entry_ttl;
        self.attr_ttl = attr_ttl;
        self
    }

    fn check_name(name: &OsStr) -> VfsResult<()> {
        let bytes = name.as_bytes();
        if matches!(bytes, b"" | b"." | b"..") || bytes.iter().any(|&b| b == b'/' || b == 0) {
            return Err(VfsError::invalid_path(name.to_string_lossy()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(VfsError::NameTooLong);
        }
        Ok(())
    }

    fn child_path(&self, parent: Ino, name: &OsStr) -> VfsResult<PathBuf> {
        Self::check_name(name)?;
        Ok(self.nodes.path(parent)?.join(name))
    }

    fn entry(&self, path: PathBuf, attr: FileAttr) -> Entry {
        Entry {
            ino: self.nodes.remember(path),
            attr,
            entry_ttl: self.entry_ttl,
            attr_ttl: self.attr_ttl,
        }
    }
}

#[async_trait]
impl<B: VfsOps + 'static> NodeOps for Passthrough<B> {
    fn store(&self) -> &dyn VfsOps {
        self.store.as_ref()
    }

    fn node_path(&self, ino: Ino) -> VfsResult<PathBuf> {
        self.nodes.path(ino)
    }

    async fn lookup(&self, req: &Request, parent: Ino, name: &OsStr) -> VfsResult<Entry> {
        req.check()?;
        let path = self.child_path(parent, name)?;
        let attr = self.store.getattr(&path).await?;
        let entry = self.entry(path, attr);
        trace!(req = req.unique, parent, ?name, ino = entry.ino, "passthrough lookup");
        Ok(entry)
    }

    fn forget(&self, ino: Ino, nlookup: u64) {
        self.nodes.forget(ino, nlookup);
    }

    async fn getattr(&self, req: &Request, ino: Ino) -> VfsResult<FileAttr> {
        req.check()?;
        self.store.getattr(&self.nodes.path(ino)?).await
    }

    async fn setattr(&self, req: &Request, ino: Ino, attr: SetAttr) -> VfsResult<FileAttr> {
        req.check()?;
        self.store.setattr(&self.nodes.path(ino)?, attr).await
    }

    async fn opendir(&self, req: &Request, ino: Ino) -> VfsResult<Box<dyn DirStream>> {
        req.check()?;
        self.store.opendir(&self.nodes.path(ino)?).await
    }

    async fn read(&self, req: &Request, ino: Ino, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        req.check()?;
        self.store.read(&self.nodes.path(ino)?, offset, size).await
    }

    async fn write(&self, req: &Request, ino: Ino, offset: u64, data: &[u8]) -> VfsResult<u32> {
        req.check()?;
        self.store.write(&self.nodes.path(ino)?, offset, data).await
    }

    async fn readlink(&self, req: &Request, ino: Ino) -> VfsResult<PathBuf> {
        req.check()?;
        self.store.readlink(&self.nodes.path(ino)?).await
    }

    async fn create(
        &self,
        req: &Request,
        parent: Ino,
        name: &OsStr,
        mode: u32,
    ) -> VfsResult<Entry> {
        req.check()?;
        let path = self.child_path(parent, name)?;
        let attr = self.store.create(&path, mode).await?;
        Ok(self.entry(path, attr))
    }

    async fn mkdir(
        &self,
        req: &Request,
        parent: Ino,
        name: &OsStr,
        mode: u32,
    ) -> VfsResult<Entry> {
        req.check()?;
        let path = self.child_path(parent, name)?;
        let attr = self.store.mkdir(&path, mode).await?;
        Ok(self.entry(path, attr))
    }

    async fn unlink(&self, req: &Request, parent: Ino, name: &OsStr) -> VfsResult<()> {
        req.check()?;
        let path = self.child_path(parent, name)?;
        self.store.unlink(&path).await?;
        self.nodes.unbind(&path);
        Ok(())
    }

    async fn rmdir(&self, req: &Request, parent: Ino, name: &OsStr) -> VfsResult<()> {
        req.check()?;
        let path = self.child_path(parent, name)?;
        self.store.rmdir(&path).await?;
        self.nodes.unbind(&path);
        Ok(())
    }

    async fn rename(
        &self,
        req: &Request,
        parent: Ino,
        name: &OsStr,
        new_parent: Ino,
        new_name: &OsStr,
    ) -> VfsResult<()> {
        req.check()?;
        let from = self.child_path(parent, name)?;
        let to = self.child_path(new_parent, new_name)?;
        self.store.rename(&from, &to).await?;
        self.nodes.rename(&from, &to);
        Ok(())
    }

    async fn statfs(&self, req: &Request) -> VfsResult<StatFs> {
        req.check()?;
        self.store.statfs().await
    }
}

impl<B: VfsOps> Passthrough<B> {
    /// Host path of a node, when the store is backed by real files.
    pub async fn real_path(&self, ino: Ino) -> VfsResult<Option<PathBuf>> {
        let path = self.nodes.path(ino)?;
        self.store.real_path(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ROOT_INO;
    use crate::vfs::{MemoryBackend, collect_entries};
    use std::path::Path;

    async fn setup() -> Passthrough<MemoryBackend> {
        let store = MemoryBackend::new();
        store.mkdir(Path::new("Games"), 0o755).await.unwrap();
        store
            .write_all(Path::new("Games/Elite,ff8"), b"cobra")
            .await
            .unwrap();
        Passthrough::new(store)
    }

    #[tokio::test]
    async fn lookup_uses_names_verbatim() {
        let fs = setup().await;
        let req = Request::default();

        let games = fs.lookup(&req, ROOT_INO, OsStr::new("Games")).await.unwrap();
        assert!(games.attr.is_dir());
        assert_eq!(fs.node_path(games.ino).unwrap(), PathBuf::from("Games"));

        let elite = fs.lookup(&req, games.ino, OsStr::new("Elite,ff8")).await.unwrap();
        assert_eq!(fs.read(&req, elite.ino, 0, 64).await.unwrap(), b"cobra");

        let missing = fs.lookup(&req, games.ino, OsStr::new("Elite")).await.err().unwrap();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn lookup_rejects_bad_names() {
        let fs = setup().await;
        let req = Request::default();
        for name in ["", ".", "..", "a/b"] {
            let err = fs.lookup(&req, ROOT_INO, OsStr::new(name)).await.err().unwrap();
            assert!(matches!(err, VfsError::InvalidPath(_)), "{name:?}");
        }
        let long = "x".repeat(MAX_NAME_LEN + 1);
        let err = fs.lookup(&req, ROOT_INO, OsStr::new(&long)).await.err().unwrap();
        assert!(matches!(err, VfsError::NameTooLong));
    }

    #[tokio::test]
    async fn cancelled_request_fails_fast() {
        let fs = setup().await;
        let req = Request::default();
        req.cancel.cancel();
        let err = fs.lookup(&req, ROOT_INO, OsStr::new("Games")).await.err().unwrap();
        assert!(matches!(err, VfsError::Cancelled));
    }

    #[tokio::test]
    async fn rename_keeps_inode() {
        let fs = setup().await;
        let req = Request::default();

        let games = fs.lookup(&req, ROOT_INO, OsStr::new("Games")).await.unwrap();
        let elite = fs.lookup(&req, games.ino, OsStr::new("Elite,ff8")).await.unwrap();
        fs.rename(&req, games.ino, OsStr::new("Elite,ff8"), ROOT_INO, OsStr::new("Elite,ff8"))
            .await
            .unwrap();

        assert_eq!(fs.node_path(elite.ino).unwrap(), PathBuf::from("Elite,ff8"));
        let mut root = fs.opendir(&req, ROOT_INO).await.unwrap();
        let names: Vec<_> = collect_entries(root.as_mut())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Games", "Elite,ff8"]);
    }

    #[tokio::test]
    async fn stale_inode_is_reported() {
        let fs = setup().await;
        let err = fs.getattr(&Request::default(), 999).await.err().unwrap();
        assert!(matches!(err, VfsError::StaleHandle(999)));
    }
}
