//! Lookup adapter: the suffix-transparent filesystem layer.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use tracing::{debug, info};

use super::meta::{self, LoadExec};
use super::{Resolution, Resolver, SuffixDirStream};
use crate::config::SuffixFsConfig;
use crate::node::{Entry, Ino, NodeOps, Passthrough, Request};
use crate::vfs::{
    DirStream, FileAttr, LocalBackend, SetAttr, StatFs, VfsError, VfsOps, VfsResult,
};

/// Wraps a [`NodeOps`] delegate so clients see names without filetype suffixes.
///
/// `lookup` and the name-taking removals resolve the client's name to the
/// physical one before delegating; `opendir` strips suffixes from listings.
/// Everything that takes an inode is forwarded unchanged. The layer keeps no
/// state of its own beyond the resolver's policy.
#[derive(Debug)]
pub struct SuffixFs<D> {
    delegate: D,
    resolver: Resolver,
}

impl<D: NodeOps> SuffixFs<D> {
    pub fn new(delegate: D, resolver: Resolver) -> Self {
        Self { delegate, resolver }
    }

    /// The wrapped delegate.
    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve `name` in directory `parent` without looking it up.
    pub async fn resolve(
        &self,
        req: &Request,
        parent: Ino,
        name: &OsStr,
    ) -> VfsResult<Resolution> {
        req.check()?;
        let dir = self.delegate.node_path(parent)?;
        self.resolver
            .resolve(self.delegate.store(), &dir, name, &req.cancel)
            .await
    }

    async fn physical(&self, req: &Request, parent: Ino, name: &OsStr) -> VfsResult<OsString> {
        let resolution = self.resolve(req, parent, name).await?;
        if let Resolution::Suffixed(physical) = &resolution {
            debug!(
                req = req.unique,
                parent,
                "{} => {}",
                name.to_string_lossy(),
                physical.to_string_lossy()
            );
        }
        Ok(resolution.into_name())
    }

    /// Load/exec pair for a node, if its physical name carries one.
    async fn load_exec(&self, req: &Request, ino: Ino) -> VfsResult<Option<LoadExec>> {
        let path = self.delegate.node_path(ino)?;
        let Some(physical) = path.file_name() else {
            return Ok(None);
        };
        let attr = self.delegate.getattr(req, ino).await?;
        if attr.is_dir() {
            return Ok(None);
        }
        Ok(LoadExec::from_name(physical, attr.mtime))
    }
}

impl SuffixFs<Passthrough<LocalBackend>> {
    /// Build the layer over a real directory tree described by `config`.
    pub fn from_config(config: &SuffixFsConfig) -> Self {
        let store = if config.read_only {
            LocalBackend::read_only(&config.root)
        } else {
            LocalBackend::new(&config.root)
        };
        info!(
            root = %store.root().display(),
            tie_break = %config.tie_break,
            read_only = config.read_only,
            "serving suffix-transparent view"
        );

        let delegate = Passthrough::new(store).with_ttl(config.entry_ttl(), config.attr_ttl());
        Self::new(delegate, Resolver::new(config.tie_break))
    }
}

#[async_trait]
impl<D: NodeOps> NodeOps for SuffixFs<D> {
    fn store(&self) -> &dyn VfsOps {
        self.delegate.store()
    }

    fn node_path(&self, ino: Ino) -> VfsResult<PathBuf> {
        self.delegate.node_path(ino)
    }

    async fn lookup(&self, req: &Request, parent: Ino, name: &OsStr) -> VfsResult<Entry> {
        let physical = self.physical(req, parent, name).await?;
        self.delegate.lookup(req, parent, &physical).await
    }

    fn forget(&self, ino: Ino, nlookup: u64) {
        self.delegate.forget(ino, nlookup);
    }

    async fn getattr(&self, req: &Request, ino: Ino) -> VfsResult<FileAttr> {
        self.delegate.getattr(req, ino).await
    }

    async fn setattr(&self, req: &Request, ino: Ino, attr: SetAttr) -> VfsResult<FileAttr> {
        self.delegate.setattr(req, ino, attr).await
    }

    async fn opendir(&self, req: &Request, ino: Ino) -> VfsResult<Box<dyn DirStream>> {
        let inner = self.delegate.opendir(req, ino).await?;
        Ok(Box::new(SuffixDirStream::new(inner)))
    }

    async fn read(&self, req: &Request, ino: Ino, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        self.delegate.read(req, ino, offset, size).await
    }

    async fn write(&self, req: &Request, ino: Ino, offset: u64, data: &[u8]) -> VfsResult<u32> {
        self.delegate.write(req, ino, offset, data).await
    }

    async fn readlink(&self, req: &Request, ino: Ino) -> VfsResult<PathBuf> {
        self.delegate.readlink(req, ino).await
    }

    async fn create(
        &self,
        req: &Request,
        parent: Ino,
        name: &OsStr,
        mode: u32,
    ) -> VfsResult<Entry> {
        self.delegate.create(req, parent, name, mode).await
    }

    async fn mkdir(
        &self,
        req: &Request,
        parent: Ino,
        name: &OsStr,
        mode: u32,
    ) -> VfsResult<Entry> {
        self.delegate.mkdir(req, parent, name, mode).await
    }

    async fn unlink(&self, req: &Request, parent: Ino, name: &OsStr) -> VfsResult<()> {
        let physical = self.physical(req, parent, name).await?;
        self.delegate.unlink(req, parent, &physical).await
    }

    async fn rmdir(&self, req: &Request, parent: Ino, name: &OsStr) -> VfsResult<()> {
        let physical = self.physical(req, parent, name).await?;
        self.delegate.rmdir(req, parent, &physical).await
    }

    async fn rename(
        &self,
        req: &Request,
        parent: Ino,
        name: &OsStr,
        new_parent: Ino,
        new_name: &OsStr,
    ) -> VfsResult<()> {
        let physical = self.physical(req, parent, name).await?;
        self.delegate
            .rename(req, parent, &physical, new_parent, new_name)
            .await
    }

    async fn statfs(&self, req: &Request) -> VfsResult<StatFs> {
        self.delegate.statfs(req).await
    }

    async fn getxattr(&self, req: &Request, ino: Ino, name: &str) -> VfsResult<Vec<u8>> {
        if !meta::is_load_exec_xattr(name) {
            return self.delegate.getxattr(req, ino, name).await;
        }
        self.load_exec(req, ino)
            .await?
            .and_then(|pair| pair.xattr(name))
            .map(String::into_bytes)
            .ok_or_else(|| VfsError::no_attribute(name))
    }

    async fn listxattr(&self, req: &Request, ino: Ino) -> VfsResult<Vec<String>> {
        let mut names = self.delegate.listxattr(req, ino).await?;
        if self.load_exec(req, ino).await?.is_some() {
            for name in [meta::LOAD_XATTR, meta::EXEC_XATTR] {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ROOT_INO;
    use crate::suffix::TieBreak;
    use crate::vfs::{MemoryBackend, collect_entries};
    use std::path::Path;
    use std::time::UNIX_EPOCH;

    async fn fs_with(names: &[&str]) -> SuffixFs<Passthrough<MemoryBackend>> {
        let store = MemoryBackend::new();
        for name in names {
            store.write_all(Path::new(name), name.as_bytes()).await.unwrap();
        }
        SuffixFs::new(Passthrough::new(store), Resolver::default())
    }

    async fn listing(fs: &impl NodeOps, ino: Ino) -> Vec<OsString> {
        let mut stream = fs.opendir(&Request::default(), ino).await.unwrap();
        collect_entries(stream.as_mut())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    #[tokio::test]
    async fn photo_scenario() {
        let fs = fs_with(&["photo,fe1", "notes", "report,c00"]).await;
        let req = Request::default();

        assert_eq!(listing(&fs, ROOT_INO).await, vec!["photo", "notes", "report"]);

        let photo = fs.lookup(&req, ROOT_INO, OsStr::new("photo")).await.unwrap();
        assert_eq!(fs.read(&req, photo.ino, 0, 64).await.unwrap(), b"photo,fe1");
        assert_eq!(fs.node_path(photo.ino).unwrap(), PathBuf::from("photo,fe1"));

        let notes = fs.lookup(&req, ROOT_INO, OsStr::new("notes")).await.unwrap();
        assert_eq!(fs.read(&req, notes.ino, 0, 64).await.unwrap(), b"notes");

        let err = fs.lookup(&req, ROOT_INO, OsStr::new("missing")).await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn every_listed_name_can_be_looked_up() {
        let fs = fs_with(&["a,fff", "b", "c,c00", "d,fff,c00", ",abc"]).await;
        let req = Request::default();
        for name in listing(&fs, ROOT_INO).await {
            fs.lookup(&req, ROOT_INO, &name)
                .await
                .unwrap_or_else(|e| panic!("{name:?}: {e}"));
        }
    }

    #[tokio::test]
    async fn exact_name_shadows_suffixed_sibling() {
        let fs = fs_with(&["foo,a1b", "foo"]).await;
        let req = Request::default();

        assert_eq!(listing(&fs, ROOT_INO).await, vec!["foo", "foo"]);
        let foo = fs.lookup(&req, ROOT_INO, OsStr::new("foo")).await.unwrap();
        assert_eq!(fs.read(&req, foo.ino, 0, 64).await.unwrap(), b"foo");
    }

    #[tokio::test]
    async fn physical_name_is_still_reachable() {
        let fs = fs_with(&["photo,fe1"]).await;
        let entry = fs
            .lookup(&Request::default(), ROOT_INO, OsStr::new("photo,fe1"))
            .await
            .unwrap();
        assert_eq!(fs.node_path(entry.ino).unwrap(), PathBuf::from("photo,fe1"));
    }

    #[tokio::test]
    async fn lookup_in_subdirectory() {
        let store = MemoryBackend::new();
        store.mkdir(Path::new("Apps"), 0o755).await.unwrap();
        store
            .write_all(Path::new("Apps/Edit,ffa"), b"module")
            .await
            .unwrap();
        let fs = SuffixFs::new(Passthrough::new(store), Resolver::new(TieBreak::FirstSeen));
        let req = Request::default();

        let apps = fs.lookup(&req, ROOT_INO, OsStr::new("Apps")).await.unwrap();
        assert_eq!(listing(&fs, apps.ino).await, vec!["Edit"]);
        let edit = fs.lookup(&req, apps.ino, OsStr::new("Edit")).await.unwrap();
        assert_eq!(fs.read(&req, edit.ino, 0, 16).await.unwrap(), b"module");
    }

    #[tokio::test]
    async fn removals_resolve_logical_names() {
        let store = MemoryBackend::new();
        store.write_all(Path::new("photo,fe1"), b"x").await.unwrap();
        store.mkdir(Path::new("Old,1000"), 0o755).await.unwrap();
        store.mkdir(Path::new("Dir,fff"), 0o755).await.unwrap();
        store.write_all(Path::new("report,c00"), b"r").await.unwrap();
        let fs = SuffixFs::new(Passthrough::new(store), Resolver::default());
        let req = Request::default();

        fs.unlink(&req, ROOT_INO, OsStr::new("photo")).await.unwrap();
        fs.rmdir(&req, ROOT_INO, OsStr::new("Dir")).await.unwrap();
        fs.rename(&req, ROOT_INO, OsStr::new("report"), ROOT_INO, OsStr::new("summary,c00"))
            .await
            .unwrap();

        assert_eq!(listing(&fs, ROOT_INO).await, vec!["Old,1000", "summary"]);
        assert!(!fs.store().exists(Path::new("photo,fe1")).await);
    }

    #[tokio::test]
    async fn create_uses_name_as_given() {
        let fs = fs_with(&[]).await;
        let req = Request::default();
        let entry = fs.create(&req, ROOT_INO, OsStr::new("fresh"), 0o644).await.unwrap();
        assert_eq!(fs.node_path(entry.ino).unwrap(), PathBuf::from("fresh"));
    }

    #[tokio::test]
    async fn cancelled_lookup() {
        let fs = fs_with(&["photo,fe1"]).await;
        let req = Request::default();
        req.cancel.cancel();
        let err = fs.lookup(&req, ROOT_INO, OsStr::new("photo")).await.err().unwrap();
        assert!(matches!(err, VfsError::Cancelled));
    }

    #[tokio::test]
    async fn load_exec_attributes() {
        let store = MemoryBackend::new();
        store.write_all(Path::new("text,fff"), b"hi").await.unwrap();
        store
            .write_all(Path::new("game,0000ff00-0000801f"), b"")
            .await
            .unwrap();
        store.write_all(Path::new("plain"), b"").await.unwrap();
        store
            .setattr(Path::new("text,fff"), SetAttr::new().with_mtime(UNIX_EPOCH))
            .await
            .unwrap();
        let fs = SuffixFs::new(Passthrough::new(store), Resolver::default());
        let req = Request::default();

        let text = fs.lookup(&req, ROOT_INO, OsStr::new("text")).await.unwrap();
        assert_eq!(
            fs.getxattr(&req, text.ino, meta::LOAD_XATTR).await.unwrap(),
            b"ffffff33"
        );
        assert_eq!(
            fs.getxattr(&req, text.ino, meta::EXEC_XATTR).await.unwrap(),
            b"6e996a00"
        );
        assert_eq!(
            fs.listxattr(&req, text.ino).await.unwrap(),
            vec![meta::LOAD_XATTR, meta::EXEC_XATTR]
        );

        let game = fs
            .lookup(&req, ROOT_INO, OsStr::new("game,0000ff00-0000801f"))
            .await
            .unwrap();
        assert_eq!(
            fs.getxattr(&req, game.ino, meta::EXEC_XATTR).await.unwrap(),
            b"0000801f"
        );

        let plain = fs.lookup(&req, ROOT_INO, OsStr::new("plain")).await.unwrap();
        let err = fs
            .getxattr(&req, plain.ino, meta::LOAD_XATTR)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, VfsError::NoAttribute(_)));
        assert!(fs.listxattr(&req, plain.ino).await.unwrap().is_empty());

        let other = fs.getxattr(&req, text.ino, "user.comment").await.err().unwrap();
        assert!(matches!(other, VfsError::NoAttribute(_)));
    }
}
