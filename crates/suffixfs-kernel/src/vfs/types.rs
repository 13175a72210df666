//! Metadata shared by the store and the node layer.
//!
//! Entry names are [`OsString`]s: a host directory may hold names that are
//! not UTF-8 (Latin-1 filenames copied off old Econet servers are common),
//! and they have to survive listing, stripping and lookup byte for byte.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

impl FileType {
    pub fn is_file(&self) -> bool {
        *self == FileType::File
    }

    pub fn is_dir(&self) -> bool {
        *self == FileType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        *self == FileType::Symlink
    }
}

/// Attributes of a node as reported by the store.
///
/// `mtime` also feeds the stamped load/exec pair, so backends must report
/// the host's modification time rather than a synthetic one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttr {
    pub kind: FileType,
    pub size: u64,
    /// Permission bits only (`0o7777` mask).
    pub perm: u32,
    pub nlink: u32,
    pub mtime: SystemTime,
    /// Owner, when the store has one.
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl FileAttr {
    fn new(kind: FileType, size: u64, perm: u32, nlink: u32) -> Self {
        Self {
            kind,
            size,
            perm,
            nlink,
            mtime: SystemTime::now(),
            uid: None,
            gid: None,
        }
    }

    /// A regular file of `size` bytes, modified now.
    pub fn file(size: u64, perm: u32) -> Self {
        Self::new(FileType::File, size, perm, 1)
    }

    pub fn directory(perm: u32) -> Self {
        Self::new(FileType::Directory, 0, perm, 2)
    }

    /// A symlink whose target is `target_len` bytes long.
    pub fn symlink(target_len: u64) -> Self {
        Self::new(FileType::Symlink, target_len, 0o777, 1)
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// One name in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Single path component, exactly as the store holds it.
    pub name: OsString,
    pub kind: FileType,
}

impl DirEntry {
    pub fn new(name: impl Into<OsString>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn file(name: impl Into<OsString>) -> Self {
        Self::new(name, FileType::File)
    }

    pub fn directory(name: impl Into<OsString>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

/// Changes requested by `setattr`; `None` leaves a field alone.
///
/// A `size` change is how files are truncated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetAttr {
    pub size: Option<u64>,
    pub mtime: Option<SystemTime>,
    pub perm: Option<u32>,
}

impl SetAttr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(self, size: u64) -> Self {
        Self {
            size: Some(size),
            ..self
        }
    }

    pub fn with_mtime(self, mtime: SystemTime) -> Self {
        Self {
            mtime: Some(mtime),
            ..self
        }
    }

    pub fn with_perm(self, perm: u32) -> Self {
        Self {
            perm: Some(perm),
            ..self
        }
    }
}

/// Usage figures for the filesystem holding the backing root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatFs {
    pub bsize: u32,
    pub frsize: u32,
    pub blocks: u64,
    pub bfree: u64,
    /// Free blocks available to unprivileged users.
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    /// Longest single name the filesystem accepts.
    pub namelen: u32,
}

impl Default for StatFs {
    /// Figures for stores with no real device behind them.
    fn default() -> Self {
        Self {
            bsize: 4096,
            frsize: 4096,
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files: 0,
            ffree: 0,
            namelen: 255,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    #[test]
    fn attr_kinds() {
        let photo = FileAttr::file(5, 0o644);
        assert!(photo.is_file() && !photo.is_dir());
        assert_eq!(photo.nlink, 1);

        let apps = FileAttr::directory(0o755);
        assert!(apps.is_dir());
        assert_eq!(apps.size, 0);

        let link = FileAttr::symlink(9);
        assert!(link.kind.is_symlink());
        assert_eq!(link.perm, 0o777);
    }

    #[test]
    fn entry_names_keep_raw_bytes() {
        let latin1 = OsStr::from_bytes(b"caf\xe9,fff");
        let entry = DirEntry::file(latin1);
        assert_eq!(entry.name.as_bytes(), b"caf\xe9,fff");
        assert_eq!(DirEntry::directory("Apps").name, "Apps");
    }

    #[test]
    fn setattr_only_sets_what_was_asked() {
        let truncate = SetAttr::new().with_size(0);
        assert_eq!(truncate.size, Some(0));
        assert!(truncate.mtime.is_none() && truncate.perm.is_none());

        let chmod = SetAttr::new().with_perm(0o600).with_mtime(SystemTime::UNIX_EPOCH);
        assert_eq!(chmod.perm, Some(0o600));
        assert_eq!(chmod.mtime, Some(SystemTime::UNIX_EPOCH));
        assert!(chmod.size.is_none());
    }
}
