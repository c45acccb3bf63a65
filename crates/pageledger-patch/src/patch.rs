//! The [`Patch`] value type and the line model it operates on.

use serde::{Deserialize, Serialize};

use crate::error::PatchError;

// ---------------------------------------------------------------------------
// Line model
// ---------------------------------------------------------------------------

/// Split a text into lines on `'\n'`.
///
/// The empty string is the empty page (no lines), so that
/// `join(&lines(t)) == t` holds for every `t`. A trailing newline yields a
/// trailing empty line.
#[must_use]
pub fn lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n').map(str::to_owned).collect()
}

/// Join lines back into a text with `'\n'` separators.
#[must_use]
pub fn join(lines: &[String]) -> String {
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// A single line-range replacement.
///
/// Replaces `[old_start, old_end)` of the parent's lines with `new_lines`.
/// `old_start == old_end` is a pure insertion before line `old_start`.
///
/// Serializes as `{"old_start":…,"old_end":…,"new_lines":[…]}`. Deserializing
/// goes through [`RawPatch`], so negative or inverted ranges are rejected at
/// the boundary.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPatch")]
pub struct Patch {
    old_start: usize,
    old_end: usize,
    new_lines: Vec<String>,
}

impl Patch {
    /// Build a patch, checking that the range is not inverted.
    ///
    /// # Errors
    /// Returns [`PatchError::InvertedRange`] if `old_start > old_end`.
    pub fn new(old_start: usize, old_end: usize, new_lines: Vec<String>) -> Result<Self, PatchError> {
        if old_start > old_end {
            return Err(PatchError::InvertedRange { old_start, old_end });
        }
        Ok(Self {
            old_start,
            old_end,
            new_lines,
        })
    }

    /// Build a patch whose range the caller already knows is ordered.
    pub(crate) fn from_ordered(old_start: usize, old_end: usize, new_lines: Vec<String>) -> Self {
        debug_assert!(old_start <= old_end);
        Self {
            old_start,
            old_end,
            new_lines,
        }
    }

    /// A pure insertion of `new_lines` before line `at`.
    #[must_use]
    pub const fn insert(at: usize, new_lines: Vec<String>) -> Self {
        Self {
            old_start: at,
            old_end: at,
            new_lines,
        }
    }

    /// Start of the replaced range.
    #[must_use]
    pub const fn old_start(&self) -> usize {
        self.old_start
    }

    /// End (exclusive) of the replaced range.
    #[must_use]
    pub const fn old_end(&self) -> usize {
        self.old_end
    }

    /// The replacement lines.
    #[must_use]
    pub fn new_lines(&self) -> &[String] {
        &self.new_lines
    }

    /// `true` if applying this patch cannot change any text.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.old_start == self.old_end && self.new_lines.is_empty()
    }

    /// Number of parent lines removed by the patch.
    #[must_use]
    pub const fn removed(&self) -> usize {
        self.old_end - self.old_start
    }

    /// Check that the patch fits a parent text of `line_count` lines.
    ///
    /// # Errors
    /// Returns [`PatchError::OutOfBounds`] if `old_end > line_count`.
    pub const fn check_bounds(&self, line_count: usize) -> Result<(), PatchError> {
        if self.old_end > line_count {
            return Err(PatchError::OutOfBounds {
                old_end: self.old_end,
                line_count,
            });
        }
        Ok(())
    }

    /// Apply the patch: `old[..old_start] ++ new_lines ++ old[old_end..]`.
    ///
    /// # Errors
    /// Returns [`PatchError::OutOfBounds`] if the range does not fit `old`.
    pub fn apply(&self, old: &[String]) -> Result<Vec<String>, PatchError> {
        self.check_bounds(old.len())?;
        let mut out = Vec::with_capacity(old.len() - self.removed() + self.new_lines.len());
        out.extend_from_slice(&old[..self.old_start]);
        out.extend(self.new_lines.iter().cloned());
        out.extend_from_slice(&old[self.old_end..]);
        Ok(out)
    }

    /// Apply in place, reusing the buffer. Used when replaying long chains.
    ///
    /// # Errors
    /// Returns [`PatchError::OutOfBounds`] if the range does not fit `lines`;
    /// `lines` is left untouched in that case.
    pub fn apply_in_place(&self, lines: &mut Vec<String>) -> Result<(), PatchError> {
        self.check_bounds(lines.len())?;
        lines.splice(self.old_start..self.old_end, self.new_lines.iter().cloned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RawPatch: signed wire form
// ---------------------------------------------------------------------------

/// Wire form of a [`Patch`] with signed indices, as clients send it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPatch {
    /// Start of the replaced range.
    pub old_start: i64,
    /// End (exclusive) of the replaced range.
    pub old_end: i64,
    /// Replacement lines.
    #[serde(default)]
    pub new_lines: Vec<String>,
}

fn unsigned(field: &'static str, value: i64) -> Result<usize, PatchError> {
    usize::try_from(value).map_err(|_| PatchError::NegativeIndex { field, value })
}

impl TryFrom<RawPatch> for Patch {
    type Error = PatchError;

    fn try_from(raw: RawPatch) -> Result<Self, Self::Error> {
        let old_start = unsigned("old_start", raw.old_start)?;
        let old_end = unsigned("old_end", raw.old_end)?;
        Self::new(old_start, old_end, raw.new_lines)
    }
}

impl From<Patch> for RawPatch {
    #[allow(clippy::cast_possible_wrap)]
    fn from(patch: Patch) -> Self {
        Self {
            old_start: patch.old_start as i64,
            old_end: patch.old_end as i64,
            new_lines: patch.new_lines,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
