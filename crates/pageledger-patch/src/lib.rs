//! Line-range patch codec for pageledger.
//!
//! Every commit in a page's ledger stores exactly one [`Patch`]: a half-open
//! range of the parent's lines plus the lines that replace it. This crate
//! computes such patches between two texts and applies them back.
//!
//! # Crate layout
//!
//! - [`patch`]: the [`Patch`] value type, its signed wire form
//!   [`RawPatch`], and the line model ([`lines`] / [`join`]).
//! - [`diff`]: [`diff()`](diff::diff) (bounding-range patch) and
//!   [`hunks`](diff::hunks) (LCS alignment, used to flag multi-hunk edits).
//! - [`error`]: the [`PatchError`] enum.
//!
//! A patch only ever captures one contiguous range. An edit touching several
//! separate regions is recorded as the single range bounding all of them.

pub mod diff;
pub mod error;
pub mod patch;

pub use diff::{Hunk, diff, diff_lines, hunks};
pub use error::PatchError;
pub use patch::{Patch, RawPatch, join, lines};
