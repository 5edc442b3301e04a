//! Clustering-Column Range Translator
//!
//! View rows inside one partition are ordered by their clustering bytes
//! (`c_col`), compared as unsigned byte strings. Reads select a contiguous
//! slice of that order, described by a [`ClusteringRange`].
//!
//! ## Partial prefixes
//!
//! A partial clustering prefix `p` selects the half-open interval
//! `[p, next(p))`, where `next(p)` treats `p` as a big-endian base-256 numeral
//! and adds one. `next(p)` keeps the length of `p`, so besides every `c_col`
//! starting with `p` the interval also admits values shorter than `next(p)`
//! that sort below it (`01` lies inside `[00 ff, 01 00)`):
//!
//! ```text
//! p          next(p)
//! 00 ff   →  01 00
//! ff fe   →  ff ff
//! ff ff   →  (overflow: right-open range c_col >= ff ff)
//! (empty) →  (whole partition)
//! ```

/// A slice of a view partition, in clustering order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusteringRange {
    /// Every row of the partition.
    Full,
    /// `c_col >= start`
    From(Vec<u8>),
    /// `c_col < finish`
    Before(Vec<u8>),
    /// `start <= c_col < finish`
    Between(Vec<u8>, Vec<u8>),
    /// No row can match; nothing needs to be queried.
    Nothing,
}

impl ClusteringRange {
    /// Range of every clustering value starting with `prefix`.
    pub fn prefix(prefix: &[u8]) -> Self {
        if prefix.is_empty() {
            return ClusteringRange::Full;
        }
        match successor(prefix) {
            Some(next) => ClusteringRange::Between(prefix.to_vec(), next),
            None => ClusteringRange::From(prefix.to_vec()),
        }
    }

    /// Explicit `[start, finish)` range. An empty bound is open on that side.
    pub fn between(start: &[u8], finish: &[u8]) -> Self {
        match (start.is_empty(), finish.is_empty()) {
            (true, true) => ClusteringRange::Full,
            (false, true) => ClusteringRange::From(start.to_vec()),
            (true, false) => ClusteringRange::Before(finish.to_vec()),
            (false, false) if start >= finish => ClusteringRange::Nothing,
            (false, false) => ClusteringRange::Between(start.to_vec(), finish.to_vec()),
        }
    }

    /// Whether `c_col` falls inside this range.
    pub fn contains(&self, c_col: &[u8]) -> bool {
        match self {
            ClusteringRange::Full => true,
            ClusteringRange::From(start) => c_col >= start.as_slice(),
            ClusteringRange::Before(finish) => c_col < finish.as_slice(),
            ClusteringRange::Between(start, finish) => {
                c_col >= start.as_slice() && c_col < finish.as_slice()
            }
            ClusteringRange::Nothing => false,
        }
    }

    /// Lower bound, if any.
    pub fn start(&self) -> Option<&[u8]> {
        match self {
            ClusteringRange::From(start) | ClusteringRange::Between(start, _) => {
                Some(start.as_slice())
            }
            _ => None,
        }
    }

    /// Exclusive upper bound, if any.
    pub fn finish(&self) -> Option<&[u8]> {
        match self {
            ClusteringRange::Before(finish) | ClusteringRange::Between(_, finish) => {
                Some(finish.as_slice())
            }
            _ => None,
        }
    }
}

/// Smallest byte string of the same length that is greater than every string
/// prefixed by `prefix`. `None` when `prefix` is empty or all `0xFF`.
///
/// The caller's buffer is never modified.
pub fn successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let last = prefix.iter().rposition(|&b| b != u8::MAX)?;
    let mut next = prefix.to_vec();
    next[last] += 1;
    for b in &mut next[last + 1..] {
        *b = 0;
    }
    Some(next)
}

/// Whether every byte of `prefix` is `0xFF` (vacuously true when empty).
pub fn is_max(prefix: &[u8]) -> bool {
    prefix.iter().all(|&b| b == u8::MAX)
}

/// Stored form of caller-supplied clustering columns.
///
/// Absent clustering is persisted as the zero-length byte string, never null.
pub fn normalize(c_cols: Option<&[u8]>) -> &[u8] {
    c_cols.unwrap_or(&[])
}
