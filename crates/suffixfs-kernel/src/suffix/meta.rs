//! RISC OS load and exec addresses.
//!
//! Econet clients ask for a file's load/exec pair through the
//! `user.econet_load` and `user.econet_exec` extended attributes. A physical
//! name can carry the pair literally (`game,0000ff00-0000801f`). Otherwise a
//! filetype suffix yields a "stamped" pair: the top twelve bits of load are
//! set, the filetype sits above bit 8, and the remaining 40 bits hold the
//! modification time in centiseconds since 1900-01-01.

use regex::bytes::Regex;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use super::codec;

/// Extended attribute carrying the load address.
pub const LOAD_XATTR: &str = "user.econet_load";

/// Extended attribute carrying the exec address.
pub const EXEC_XATTR: &str = "user.econet_exec";

/// Centiseconds between 1900-01-01 and the Unix epoch.
const EPOCH_OFFSET_CS: u64 = 0x33_6e99_6a00;

static LOAD_EXEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r",([0-9a-f]{8})-([0-9a-f]{8})$").expect("valid load/exec pattern")
});

/// A load/exec address pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadExec {
    pub load: u32,
    pub exec: u32,
}

impl LoadExec {
    /// Derive the pair for a physical name, or `None` if it is untyped.
    pub fn from_name<S: AsRef<OsStr> + ?Sized>(physical: &S, mtime: SystemTime) -> Option<Self> {
        let physical = physical.as_ref();
        if let Some(caps) = LOAD_EXEC.captures(physical.as_bytes()) {
            let hex = |i| std::str::from_utf8(caps.get(i)?.as_bytes()).ok();
            let load = u32::from_str_radix(hex(1)?, 16).ok()?;
            let exec = u32::from_str_radix(hex(2)?, 16).ok()?;
            return Some(Self { load, exec });
        }

        codec::filetype(physical).map(|filetype| Self::stamped(filetype, mtime))
    }

    /// A filetype-stamped pair for a file modified at `mtime`.
    pub fn stamped(filetype: u16, mtime: SystemTime) -> Self {
        let secs = mtime
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let cs = secs.wrapping_mul(100).wrapping_add(EPOCH_OFFSET_CS);

        let load = 0xfff0_0000 | (u32::from(filetype & 0xfff) << 8) | ((cs >> 32) & 0xff) as u32;
        Self {
            load,
            exec: cs as u32,
        }
    }

    /// Value of the named attribute, as eight lowercase hex digits.
    pub fn xattr(&self, name: &str) -> Option<String> {
        match name {
            LOAD_XATTR => Some(format!("{:08x}", self.load)),
            EXEC_XATTR => Some(format!("{:08x}", self.exec)),
            _ => None,
        }
    }
}

/// Returns true for the attribute names this module answers.
pub fn is_load_exec_xattr(name: &str) -> bool {
    name == LOAD_XATTR || name == EXEC_XATTR
}
