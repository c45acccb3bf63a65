//! Error types for patch construction and application.

use thiserror::Error;

/// Errors returned when a [`Patch`](crate::Patch) is malformed or does not
/// fit the text it is applied to.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PatchError {
    /// `old_start` lies after `old_end`.
    #[error("inverted patch range: old_start {old_start} is past old_end {old_end}")]
    InvertedRange {
        /// Start of the replaced range.
        old_start: usize,
        /// End (exclusive) of the replaced range.
        old_end: usize,
    },

    /// A wire-form index was negative.
    #[error("negative patch index: {field} = {value}")]
    NegativeIndex {
        /// Which field carried the value (`old_start` or `old_end`).
        field: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// The range reaches past the end of the parent text.
    #[error("patch range end {old_end} exceeds the parent's {line_count} line(s)")]
    OutOfBounds {
        /// End (exclusive) of the replaced range.
        old_end: usize,
        /// Number of lines in the text the patch was applied to.
        line_count: usize,
    },
}
