//! Suffix-transparent naming.
//!
//! The backing store holds `photo,fe1`; clients list and open `photo`.
//!
//! - [`codec`] - recognizing and stripping the `,xxx` tag
//! - [`Resolver`] - finding the physical name for a logical one
//! - [`SuffixFs`] - the [`NodeOps`](crate::node::NodeOps) layer doing both
//!   directions
//! - [`SuffixDirStream`] - listings with tags removed
//! - [`meta`] - load/exec extended attributes derived from the tag
//!
//! ## Design Decisions
//!
//! - **No cache**: every lookup re-reads its directory, so the view always
//!   matches the store. Listings and resolution see the same enumeration.
//! - **Exact names win**: `foo` shadows `foo,a1b` when both exist.
//! - **Listings keep duplicates**: `foo` and `foo,a1b` both list as `foo`.

pub mod codec;
mod dirstream;
mod layer;
pub mod meta;
mod resolver;

pub use dirstream::SuffixDirStream;
pub use layer::SuffixFs;
pub use meta::LoadExec;
pub use resolver::{Resolution, Resolver, TieBreak};
