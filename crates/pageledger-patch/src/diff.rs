//! Computing patches between two texts.
//!
//! [`diff`] produces the one [`Patch`] a commit stores: the minimal range of
//! the old lines that differs, found by trimming the common line prefix and
//! suffix. [`hunks`] runs a line-level LCS alignment over that range and
//! reports each separate edit region; `diff` uses it only to log when several
//! hunks were coalesced into one patch.
//!
//! # Example flow
//!
//! ```text
//! old: a b c d e        new: a X c Y e
//!        └─────┘                └─────┘
//! diff  → Patch { old_start: 1, old_end: 4, new_lines: [X, c, Y] }
//! hunks → [1..2 → 1..2, 3..4 → 3..4]   (two hunks, coalesced by diff)
//! ```

use crate::patch::{Patch, lines};

/// Upper bound on LCS table cells. Larger regions are reported as one hunk.
const LCS_CELL_LIMIT: usize = 4_000_000;

// ---------------------------------------------------------------------------
// Hunk
// ---------------------------------------------------------------------------

/// One contiguous edit region from an LCS alignment.
///
/// Ranges are half-open and index into the full old / new line sequences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hunk {
    /// Start of the removed old lines.
    pub old_start: usize,
    /// End (exclusive) of the removed old lines.
    pub old_end: usize,
    /// Start of the inserted new lines.
    pub new_start: usize,
    /// End (exclusive) of the inserted new lines.
    pub new_end: usize,
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

/// Compute the single-range patch turning `old` into `new`.
///
/// `apply(lines(old), diff(old, new)) == lines(new)` always holds. Identical
/// inputs give an empty insertion anchored at the end of the text.
#[must_use]
pub fn diff(old: &str, new: &str) -> Patch {
    diff_lines(&lines(old), &lines(new))
}

/// [`diff`] over pre-split lines.
#[must_use]
pub fn diff_lines(old: &[String], new: &[String]) -> Patch {
    let (prefix, suffix) = trim_common(old, new);
    let old_end = old.len() - suffix;
    let new_end = new.len() - suffix;

    let hunk_count = align(old, new, prefix, old_end, new_end).len();
    if hunk_count > 1 {
        tracing::debug!(
            hunks = hunk_count,
            old_start = prefix,
            old_end,
            "multi-hunk edit coalesced into one bounding range"
        );
    }

    // trim_common bounds prefix + suffix by both lengths.
    Patch::from_ordered(prefix, old_end, new[prefix..new_end].to_vec())
}

/// LCS-aligned edit regions between `old` and `new`, in order.
///
/// Empty when the inputs are identical.
#[must_use]
pub fn hunks(old: &[String], new: &[String]) -> Vec<Hunk> {
    let (prefix, suffix) = trim_common(old, new);
    align(old, new, prefix, old.len() - suffix, new.len() - suffix)
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Lengths of the common prefix and (non-overlapping) common suffix.
fn trim_common(old: &[String], new: &[String]) -> (usize, usize) {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    (prefix, suffix)
}

/// Align `old[lo..old_hi]` against `new[lo..new_hi]` and collect hunks.
fn align(old: &[String], new: &[String], lo: usize, old_hi: usize, new_hi: usize) -> Vec<Hunk> {
    let a = &old[lo..old_hi];
    let b = &new[lo..new_hi];
    if a.is_empty() && b.is_empty() {
        return Vec::new();
    }
    if a.is_empty() || b.is_empty() || (a.len() + 1).saturating_mul(b.len() + 1) > LCS_CELL_LIMIT {
        return vec![Hunk {
            old_start: lo,
            old_end: old_hi,
            new_start: lo,
            new_end: new_hi,
        }];
    }

    // table[i][j] = LCS length of a[i..] and b[j..], stored row-major.
    let width = b.len() + 1;
    let mut table = vec![0_u32; (a.len() + 1) * width];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut out = Vec::new();
    let mut open: Option<(usize, usize)> = None;
    let (mut i, mut j) = (0, 0);
    let close = |open: &mut Option<(usize, usize)>, out: &mut Vec<Hunk>, i: usize, j: usize| {
        if let Some((oi, oj)) = open.take() {
            out.push(Hunk {
                old_start: lo + oi,
                old_end: lo + i,
                new_start: lo + oj,
                new_end: lo + j,
            });
        }
    };

    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            close(&mut open, &mut out, i, j);
            i += 1;
            j += 1;
        } else {
            open.get_or_insert((i, j));
            if table[(i + 1) * width + j] >= table[i * width + j + 1] {
                i += 1;
            } else {
                j += 1;
            }
        }
    }
    if i < a.len() || j < b.len() {
        open.get_or_insert((i, j));
    }
    close(&mut open, &mut out, a.len(), b.len());
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::join;
    use proptest::prelude::*;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn genesis_diff_is_insert_at_zero() {
        let patch = diff("", "# v1");
        assert_eq!(patch, Patch::insert(0, v(&["# v1"])));
    }

    #[test]
    fn single_line_replacement() {
        let patch = diff("# v1", "# v2");
        assert_eq!(patch, Patch::new(0, 1, v(&["# v2"])).unwrap());
    }

    #[test]
    fn insert_in_middle() {
        let patch = diff("a\nc", "a\nb\nc");
        assert_eq!(patch, Patch::insert(1, v(&["b"])));
    }

    #[test]
    fn delete_in_middle() {
        let patch = diff("a\nb\nc", "a\nc");
        assert_eq!(patch, Patch::new(1, 2, Vec::new()).unwrap());
    }

    #[test]
    fn identical_texts_give_noop() {
        let patch = diff("a\nb", "a\nb");
        assert!(patch.is_noop());
        assert_eq!(patch.old_start(), 2);
    }

    #[test]
    fn repeated_lines_do_not_overlap_prefix_and_suffix() {
        // Common prefix "a a" and suffix "a" would overlap without bounding.
        let patch = diff("a\na", "a\na\na");
        assert_eq!(patch.removed(), 0);
        assert_eq!(patch.new_lines(), v(&["a"]));
        assert_eq!(patch.apply(&v(&["a", "a"])).unwrap(), v(&["a", "a", "a"]));
    }

    #[test]
    fn two_separate_edits_coalesce_into_bounding_range() {
        let old = "a\nb\nc\nd\ne";
        let new = "a\nX\nc\nY\ne";
        let patch = diff(old, new);
        assert_eq!(patch, Patch::new(1, 4, v(&["X", "c", "Y"])).unwrap());
        assert_eq!(patch.apply(&lines(old)).unwrap(), lines(new));

        let found = hunks(&lines(old), &lines(new));
        assert_eq!(
            found,
            vec![
                Hunk { old_start: 1, old_end: 2, new_start: 1, new_end: 2 },
                Hunk { old_start: 3, old_end: 4, new_start: 3, new_end: 4 },
            ]
        );
    }

    #[test]
    fn identical_inputs_have_no_hunks() {
        assert!(hunks(&v(&["a", "b"]), &v(&["a", "b"])).is_empty());
    }

    #[test]
    fn pure_insertion_is_one_hunk() {
        let found = hunks(&v(&["a", "c"]), &v(&["a", "b", "c"]));
        assert_eq!(
            found,
            vec![Hunk { old_start: 1, old_end: 1, new_start: 1, new_end: 2 }]
        );
    }

    fn arb_lines() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(prop::sample::select(vec!["#", "a", "b", "", "- x"]), 0..6)
            .prop_map(|ls| ls.into_iter().map(str::to_owned).collect())
    }

    proptest! {
        #[test]
        fn prop_apply_inverts_contiguous_edit(
            prefix in arb_lines(),
            removed in arb_lines(),
            inserted in arb_lines(),
            suffix in arb_lines(),
        ) {
            let old = join(&[prefix.clone(), removed, suffix.clone()].concat());
            let new = join(&[prefix, inserted, suffix].concat());
            let patch = diff(&old, &new);
            prop_assert_eq!(patch.apply(&lines(&old)).unwrap(), lines(&new));
        }

        #[test]
        fn prop_patch_range_is_minimal(old in arb_lines(), new in arb_lines()) {
            let patch = diff_lines(&old, &new);
            let start = patch.old_start();
            if start < old.len() && start < new.len() {
                prop_assert_ne!(&old[start], &new[start]);
            }
            prop_assert_eq!(old.len() - patch.removed() + patch.new_lines().len(), new.len());
        }

        #[test]
        fn prop_diff_survives_the_wire(old in arb_lines(), new in arb_lines()) {
            let patch = diff_lines(&old, &new);
            prop_assert!(patch.old_start() <= patch.old_end());
            prop_assert!(patch.old_end() <= old.len());
            let back = Patch::try_from(crate::patch::RawPatch::from(patch.clone()));
            prop_assert_eq!(back, Ok(patch));
        }

        #[test]
        fn prop_hunks_are_ordered_and_disjoint(old in arb_lines(), new in arb_lines()) {
            let found = hunks(&old, &new);
            for pair in found.windows(2) {
                prop_assert!(pair[0].old_end < pair[1].old_start || pair[0].new_end < pair[1].new_start);
            }
        }
    }
}
