//! Logical → physical name resolution.

use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::codec;
use crate::vfs::{DirStream, VfsError, VfsOps, VfsResult};

/// How to choose between several physical names with the same logical name.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum TieBreak {
    /// The first match in the store's enumeration order.
    FirstSeen,
    /// The lexicographically smallest physical name (hence smallest suffix).
    #[default]
    LowestSuffix,
}

/// Outcome of resolving a logical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An entry with exactly the requested name exists.
    Exact(OsString),
    /// A suffixed entry strips to the requested name.
    Suffixed(OsString),
    /// Nothing matched (or the directory could not be scanned); the name is
    /// passed through and the delegate decides whether it exists.
    Fallback(OsString),
}

impl Resolution {
    /// The physical name to hand to the delegate.
    pub fn name(&self) -> &OsStr {
        match self {
            Resolution::Exact(name) | Resolution::Suffixed(name) | Resolution::Fallback(name) => {
                name
            }
        }
    }

    /// Consume into the physical name.
    pub fn into_name(self) -> OsString {
        match self {
            Resolution::Exact(name) | Resolution::Suffixed(name) | Resolution::Fallback(name) => {
                name
            }
        }
    }
}

/// Maps logical names to the physical names present in a directory.
///
/// Stateless apart from its tie-break policy: every call re-reads the
/// directory and nothing is cached between calls. The store is only read.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    tie_break: TieBreak,
}

impl Resolver {
    /// Create a resolver with the given tie-break policy.
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    /// The configured tie-break policy.
    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Resolve `logical` inside store directory `dir`.
    ///
    /// Never fails on I/O: an unreadable directory degrades to
    /// [`Resolution::Fallback`]. The only error is [`VfsError::Cancelled`],
    /// returned as soon as `cancel` fires.
    pub async fn resolve(
        &self,
        store: &dyn VfsOps,
        dir: &Path,
        logical: &OsStr,
        cancel: &CancellationToken,
    ) -> VfsResult<Resolution> {
        let bytes = logical.as_bytes();
        if matches!(bytes, b"" | b"." | b"..") || bytes.contains(&b'/') {
            return Ok(Resolution::Fallback(logical.to_owned()));
        }

        // An existing exact name always wins over suffixed variants.
        let exact_path = dir.join(logical);
        let exact = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(VfsError::Cancelled),
            attr = store.getattr(&exact_path) => attr,
        };
        match exact {
            Ok(_) => return Ok(Resolution::Exact(logical.to_owned())),
            Err(e) if !e.is_not_found() => {
                // Exists but unreadable; let the delegate report the error.
                debug!(dir = %dir.display(), ?logical, error = %e, "exact-name lookup failed");
                return Ok(Resolution::Exact(logical.to_owned()));
            }
            Err(_) => {}
        }

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(VfsError::Cancelled),
            stream = store.opendir(dir) => stream,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!(dir = %dir.display(), ?logical, error = %e, "directory scan failed, passing name through");
                return Ok(Resolution::Fallback(logical.to_owned()));
            }
        };

        let found = self.scan(stream.as_mut(), dir, logical, cancel);
        stream.close();

        Ok(match found? {
            Some(physical) => Resolution::Suffixed(physical),
            None => Resolution::Fallback(logical.to_owned()),
        })
    }

    fn scan(
        &self,
        stream: &mut dyn DirStream,
        dir: &Path,
        logical: &OsStr,
        cancel: &CancellationToken,
    ) -> VfsResult<Option<OsString>> {
        let mut best: Option<OsString> = None;

        while let Some(item) = stream.next_entry() {
            if cancel.is_cancelled() {
                return Err(VfsError::Cancelled);
            }

            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };

            let name = entry.name;
            if !name.as_bytes().starts_with(logical.as_bytes()) || name.len() == logical.len() {
                continue;
            }
            if codec::strip(&name) != logical {
                continue;
            }

            match self.tie_break {
                TieBreak::FirstSeen => return Ok(Some(name)),
                TieBreak::LowestSuffix => {
                    if best.as_ref().is_none_or(|current| name < *current) {
                        best = Some(name);
                    }
                }
            }
        }

        Ok(best)
    }
}
