//! Filetype suffix codec.
//!
//! A physical name may end in `,xxx`, three lowercase hex digits giving the
//! RISC OS filetype (`photo,fe1`, `!Boot,feb`). The tag is anchored to the
//! end of the name, so `a,fff,c00` carries `,c00` and strips to `a,fff`.
//!
//! Names are handled as raw bytes; the stem need not be UTF-8.

use regex::bytes::Regex;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::sync::LazyLock;

/// Length of a suffix in bytes, separator included.
pub const SUFFIX_LEN: usize = 4;

/// A non-empty stem of any bytes followed by the trailing tag.
static SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?s-u:.+),([0-9a-f]{3})$").expect("valid suffix pattern"));

/// Remove a trailing filetype suffix, if any.
///
/// Total and pure: a name without a suffix is returned unchanged. A name that
/// is nothing but a suffix (`,fff`) is left alone so no entry is ever
/// presented under an empty name.
pub fn strip<S: AsRef<OsStr> + ?Sized>(name: &S) -> &OsStr {
    let name = name.as_ref();
    if has_suffix(name) {
        let bytes = name.as_bytes();
        OsStr::from_bytes(&bytes[..bytes.len() - SUFFIX_LEN])
    } else {
        name
    }
}

/// Returns true if `name` ends in a filetype suffix.
pub fn has_suffix<S: AsRef<OsStr> + ?Sized>(name: &S) -> bool {
    SUFFIX.is_match(name.as_ref().as_bytes())
}

/// The filetype number encoded in `name`'s suffix.
pub fn filetype<S: AsRef<OsStr> + ?Sized>(name: &S) -> Option<u16> {
    let caps = SUFFIX.captures(name.as_ref().as_bytes())?;
    let digits = std::str::from_utf8(caps.get(1)?.as_bytes()).ok()?;
    u16::from_str_radix(digits, 16).ok()
}
