//! Knuth-Morris-Pratt pattern matching
//!
//! KMP finds every occurrence of a pattern within a text in O(n + m), where n
//! is the text length and m the pattern length. A failure table (longest
//! proper prefix that is also a suffix, "LPS") lets the scan resume after a
//! mismatch or a full match without re-reading text it has already matched,
//! so overlapping occurrences are all reported.
//!
//! Positions reported by this module are *end* indexes: the index one past
//! the last matched symbol. An occurrence ending at `end` starts at
//! `end - pattern.len()`.

use super::{ComputeError, ComputeResult};
use crate::engines::core::parallel::CancellationToken;

/// Number of text symbols scanned between two cancellation checks
pub const CANCEL_CHECK_INTERVAL: usize = 64 * 1024;

/// Build the failure table for `pattern`.
///
/// Entry `i` is the length of the longest proper prefix of `pattern[..=i]`
/// that is also a suffix of it. The table has one entry per pattern symbol,
/// `table[0]` is always 0 and `table[i] <= i`.
pub fn build_lps(pattern: &[u8]) -> ComputeResult<Vec<usize>> {
    if pattern.is_empty() {
        return Err(ComputeError::InvalidPattern("Pattern cannot be empty".to_string()));
    }

    let m = pattern.len();
    let mut table = vec![0; m];
    let mut len = 0;
    let mut i = 1;

    while i < m {
        if pattern[i] == pattern[len] {
            len += 1;
            table[i] = len;
            i += 1;
        } else if len != 0 {
            // Fall back to the next shorter border, keep `i`
            len = table[len - 1];
        } else {
            table[i] = 0;
            i += 1;
        }
    }

    Ok(table)
}

/// Scan `text` for `pattern` using a table from [`build_lps`].
///
/// Matches are produced lazily in left-to-right order.
pub fn scan<'a>(text: &'a [u8], pattern: &'a [u8], table: &'a [usize]) -> KmpMatches<'a> {
    KmpMatches::new(text, pattern, table)
}

/// Find the end index of every occurrence of `pattern` in `text`
pub fn kmp_search(text: &[u8], pattern: &[u8]) -> ComputeResult<Vec<usize>> {
    let table = build_lps(pattern)?;
    Ok(scan(text, pattern, &table).collect())
}

/// Like [`kmp_search`], but polls `token` every [`CANCEL_CHECK_INTERVAL`]
/// text symbols and gives up with [`ComputeError::Cancelled`] once it fires.
/// Nothing is returned for a cancelled scan.
pub fn kmp_search_cancellable(
    text: &[u8],
    pattern: &[u8],
    token: &CancellationToken,
) -> ComputeResult<Vec<usize>> {
    kmp_search_interruptible(text, pattern, || token.is_cancelled())
}

/// Scan in chunks of [`CANCEL_CHECK_INTERVAL`] symbols, asking `interrupted`
/// before each chunk and once more at the end. Matches found before an
/// interruption are dropped.
pub fn kmp_search_interruptible<F>(text: &[u8], pattern: &[u8], mut interrupted: F) -> ComputeResult<Vec<usize>>
where
    F: FnMut() -> bool,
{
    let table = build_lps(pattern)?;
    let mut matches = scan(text, pattern, &table);
    let mut found = Vec::new();
    let mut limit = 0;

    loop {
        if interrupted() {
            return Err(ComputeError::Cancelled);
        }
        if limit >= text.len() {
            break;
        }

        limit = (limit + CANCEL_CHECK_INTERVAL).min(text.len());
        while let Some(end) = matches.next_before(limit) {
            found.push(end);
        }
    }

    Ok(found)
}

/// Lazy iterator over the end indexes of `pattern` in `text`
#[derive(Debug, Clone)]
pub struct KmpMatches<'a> {
    text: &'a [u8],
    pattern: &'a [u8],
    table: &'a [usize],
    /// Cursor into the text
    i: usize,
    /// Length of the pattern prefix currently matched
    j: usize,
}

impl<'a> KmpMatches<'a> {
    fn new(text: &'a [u8], pattern: &'a [u8], table: &'a [usize]) -> Self {
        debug_assert_eq!(pattern.len(), table.len(), "failure table does not fit pattern");
        Self {
            text,
            pattern,
            table,
            i: 0,
            j: 0,
        }
    }

    /// Advance until the next match or until the text cursor reaches `limit`,
    /// whichever comes first. Resuming with a larger limit continues the same
    /// scan.
    fn next_before(&mut self, limit: usize) -> Option<usize> {
        let n = self.text.len();
        let m = self.pattern.len();
        let limit = limit.min(n);

        if m == 0 {
            return None;
        }

        while self.i < limit {
            if self.pattern[self.j] == self.text[self.i] {
                self.i += 1;
                self.j += 1;
            }

            if self.j == m {
                let end = self.i;
                self.j = self.table[self.j - 1];
                return Some(end);
            } else if self.i < n && self.pattern[self.j] != self.text[self.i] {
                if self.j != 0 {
                    self.j = self.table[self.j - 1];
                } else {
                    self.i += 1;
                }
            }
        }

        None
    }
}

impl<'a> Iterator for KmpMatches<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        self.next_before(self.text.len())
    }
}
