//! Listing transformer.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;

use super::codec;
use crate::vfs::{DirEntry, DirStream, VfsResult};

/// Presents a delegate's directory stream with suffixes stripped.
///
/// Order, count and per-entry errors are passed through untouched; only
/// names change. Two physical entries that strip to the same name are both
/// listed.
pub struct SuffixDirStream {
    inner: Box<dyn DirStream>,
    closed: bool,
}

impl SuffixDirStream {
    pub fn new(inner: Box<dyn DirStream>) -> Self {
        Self {
            inner,
            closed: false,
        }
    }
}

impl DirStream for SuffixDirStream {
    fn has_next(&self) -> bool {
        !self.closed && self.inner.has_next()
    }

    fn next_entry(&mut self) -> Option<VfsResult<DirEntry>> {
        assert!(!self.closed, "next_entry called on a closed directory stream");
        self.inner.next_entry().map(|item| {
            item.map(|mut entry| {
                if codec::has_suffix(&entry.name) {
                    let mut bytes = entry.name.into_vec();
                    bytes.truncate(bytes.len() - codec::SUFFIX_LEN);
                    entry.name = OsString::from_vec(bytes);
                }
                entry
            })
        })
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.close();
        }
    }
}

impl Drop for SuffixDirStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{EntryStream, FileType, VfsError, collect_entries};
    use std::collections::VecDeque;

    fn wrap(items: Vec<VfsResult<DirEntry>>) -> SuffixDirStream {
        SuffixDirStream::new(Box::new(EntryStream::new(VecDeque::from(items))))
    }

    #[test]
    fn strips_names_in_order() {
        let mut stream = wrap(vec![
            Ok(DirEntry::file("report,c00")),
            Ok(DirEntry::directory("Apps")),
            Ok(DirEntry::file("photo,fe1")),
            Ok(DirEntry::file("a,fff,c00")),
        ]);
        let entries = collect_entries(&mut stream).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_os_str()).collect();
        assert_eq!(names, vec!["report", "Apps", "photo", "a,fff"]);
        assert_eq!(entries[1].kind, FileType::Directory);
    }

    #[test]
    fn duplicates_are_kept() {
        let mut stream = wrap(vec![
            Ok(DirEntry::file("foo,a1b")),
            Ok(DirEntry::file("foo")),
        ]);
        let names: Vec<_> = collect_entries(&mut stream)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["foo", "foo"]);
    }

    #[test]
    fn errors_pass_through_in_position() {
        let mut stream = wrap(vec![
            Ok(DirEntry::file("a,fff")),
            Err(VfsError::other("bad entry")),
            Ok(DirEntry::file("b")),
        ]);
        assert_eq!(stream.next_entry().unwrap().unwrap().name, "a");
        assert!(stream.next_entry().unwrap().is_err());
        assert!(stream.has_next());
        assert_eq!(stream.next_entry().unwrap().unwrap().name, "b");
        assert!(!stream.has_next());
        assert!(stream.next_entry().is_none());
    }

    #[test]
    fn latin1_names_strip_bytewise() {
        use std::os::unix::ffi::OsStrExt;
        let mut stream = wrap(vec![
            Ok(DirEntry::file(std::ffi::OsStr::from_bytes(b"caf\xe9,fff"))),
            Ok(DirEntry::file(std::ffi::OsStr::from_bytes(b"na\xefve"))),
        ]);
        let names: Vec<_> = collect_entries(&mut stream)
            .unwrap()
            .into_iter()
            .map(|e| e.name.into_vec())
            .collect();
        assert_eq!(names, vec![b"caf\xe9".to_vec(), b"na\xefve".to_vec()]);
    }

    #[test]
    fn empty_directory() {
        let mut stream = wrap(Vec::new());
        assert!(!stream.has_next());
        assert!(stream.next_entry().is_none());
    }

    #[test]
    #[should_panic(expected = "closed directory stream")]
    fn next_after_close_panics() {
        let mut stream = wrap(vec![Ok(DirEntry::file("a,fff"))]);
        stream.close();
        assert!(!stream.has_next());
        let _ = stream.next_entry();
    }
}
