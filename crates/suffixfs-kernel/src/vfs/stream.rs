//! Directory entry streams.

use std::collections::VecDeque;

use super::error::VfsResult;
use super::types::DirEntry;

/// An open directory enumeration.
///
/// The lifecycle is Open → (`has_next`/`next_entry`)* → Closed. A stream is
/// owned by a single request and is never shared between tasks. Calling
/// `next_entry` after `close` is a programming error and panics.
pub trait DirStream: Send {
    /// Returns true if another entry (or per-entry error) is pending.
    fn has_next(&self) -> bool;

    /// Produce the next entry, a per-entry error, or `None` at end of stream.
    fn next_entry(&mut self) -> Option<VfsResult<DirEntry>>;

    /// Release the resources held by the stream.
    fn close(&mut self);
}

/// Drain a stream into a vector, stopping at the first error.
///
/// The stream is closed on every path out of this function.
pub fn collect_entries(stream: &mut dyn DirStream) -> VfsResult<Vec<DirEntry>> {
    let mut entries = Vec::new();
    let result = loop {
        match stream.next_entry() {
            Some(Ok(entry)) => entries.push(entry),
            Some(Err(e)) => break Err(e),
            None => break Ok(entries),
        }
    };
    stream.close();
    result
}

/// Buffered stream over entries read up front by a backend.
#[derive(Debug, Default)]
pub struct EntryStream {
    pending: VecDeque<VfsResult<DirEntry>>,
    closed: bool,
}

impl EntryStream {
    /// Create a stream from raw results, preserving their order.
    pub fn new(pending: VecDeque<VfsResult<DirEntry>>) -> Self {
        Self {
            pending,
            closed: false,
        }
    }

    /// Create a stream from entries that were all read successfully.
    pub fn from_entries(entries: impl IntoIterator<Item = DirEntry>) -> Self {
        Self::new(entries.into_iter().map(Ok).collect())
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl DirStream for EntryStream {
    fn has_next(&self) -> bool {
        !self.closed && !self.pending.is_empty()
    }

    fn next_entry(&mut self) -> Option<VfsResult<DirEntry>> {
        assert!(!self.closed, "next_entry called on a closed directory stream");
        self.pending.pop_front()
    }

    fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
    }
}
