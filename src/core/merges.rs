//! Ordered merge rules and rank lookup.
//!
//! A merge artifact lists symbol pairs one per line, in priority order. The
//! rank of a rule is its position in the list; lower ranks are applied first.
//!
//! ```text
//! #version: 0.2
//! Ġ t
//! Ġ a
//! h e
//! ```

use rustc_hash::FxHashMap;
use std::path::Path;

use super::error::LoadError;

/// A merge rule with its rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePair<'a> {
    pub left: &'a str,
    pub right: &'a str,
    pub rank: u32,
}

/// The ordered merge-rule table.
///
/// Lookups are nested by left then right symbol so `rank_of` never needs to
/// allocate a key.
#[derive(Debug, Clone, Default)]
pub struct MergeTable {
    pairs: Vec<(String, String)>,
    ranks: FxHashMap<String, FxHashMap<String, u32>>,
    live: usize,
}

impl MergeTable {
    /// Build a table from pairs in priority order.
    ///
    /// A pair listed twice keeps the rank of its last occurrence; the earlier
    /// rank becomes dead and is never returned by a lookup.
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        let mut ranks: FxHashMap<String, FxHashMap<String, u32>> = FxHashMap::default();
        let mut live = 0usize;
        for (rank, (left, right)) in pairs.iter().enumerate() {
            let previous = ranks
                .entry(left.clone())
                .or_default()
                .insert(right.clone(), rank as u32);
            match previous {
                Some(old) => log::warn!(
                    "merge rule {left:?} {right:?} listed at ranks {old} and {rank}; keeping {rank}"
                ),
                None => live += 1,
            }
        }
        Self { pairs, ranks, live }
    }

    /// Parse a `merges.txt` document.
    pub fn from_text(text: &str) -> Result<Self, LoadError> {
        let mut pairs = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.is_empty() || line.starts_with("#version") {
                continue;
            }
            let (left, right) = line
                .split_once(' ')
                .filter(|(left, right)| {
                    !left.is_empty() && !right.is_empty() && !right.contains(' ')
                })
                .ok_or_else(|| LoadError::MalformedMerge {
                    line: idx + 1,
                    content: line.to_string(),
                })?;
            pairs.push((left.to_string(), right.to_string()));
        }
        Ok(Self::new(pairs))
    }

    /// Parse `merges.txt` bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, LoadError> {
        let text = std::str::from_utf8(data).map_err(|e| {
            let line_idx = data[..e.valid_up_to()]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            let content = data
                .split(|&b| b == b'\n')
                .nth(line_idx)
                .map(|line| String::from_utf8_lossy(line).into_owned())
                .unwrap_or_default();
            LoadError::MalformedMerge {
                line: line_idx + 1,
                content,
            }
        })?;
        Self::from_text(text)
    }

    /// Read and parse a `merges.txt` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
        Self::from_bytes(&data)
    }

    /// Rank of the rule merging `left` and `right`, if any.
    #[inline]
    pub fn rank_of(&self, left: &str, right: &str) -> Option<u32> {
        self.ranks.get(left)?.get(right).copied()
    }

    /// The rule listed at `rank`, if it is live.
    pub fn pair_of(&self, rank: u32) -> Option<MergePair<'_>> {
        let (left, right) = self.pairs.get(rank as usize)?;
        (self.rank_of(left, right) == Some(rank)).then_some(MergePair {
            left,
            right,
            rank,
        })
    }

    /// The lowest-ranked rule among adjacent pairs of `symbols`.
    ///
    /// Ranks are unique, so the answer never depends on scan order.
    pub fn best_pair<'s, S: AsRef<str>>(&self, symbols: &'s [S]) -> Option<MergePair<'s>> {
        symbols
            .windows(2)
            .filter_map(|w| {
                let (left, right) = (w[0].as_ref(), w[1].as_ref());
                self.rank_of(left, right)
                    .map(|rank| MergePair { left, right, rank })
            })
            .min_by_key(|pair| pair.rank)
    }

    /// All pairs in listed order, including dead duplicates.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Iterate over live rules in rank order.
    pub fn iter(&self) -> impl Iterator<Item = MergePair<'_>> + '_ {
        (0..self.pairs.len() as u32).filter_map(|rank| self.pair_of(rank))
    }

    /// Number of listed rules, including dead duplicates.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Number of live rules.
    pub fn live_len(&self) -> usize {
        self.live
    }

    /// Whether the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl PartialEq for MergeTable {
    fn eq(&self, other: &Self) -> bool {
        self.pairs == other.pairs
    }
}

impl Eq for MergeTable {}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> MergeTable {
        MergeTable::new(
            pairs
                .iter()
                .map(|(l, r)| (l.to_string(), r.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_parse_merges_text() {
        let merges = MergeTable::from_text("#version: 0.2\nĠ t\nh e\n\nĠt he\n").unwrap();
        assert_eq!(merges.len(), 3);
        assert_eq!(merges.rank_of("Ġ", "t"), Some(0));
        assert_eq!(merges.rank_of("h", "e"), Some(1));
        assert_eq!(merges.rank_of("Ġt", "he"), Some(2));
        assert_eq!(merges.rank_of("t", "Ġ"), None);
    }

    #[test]
    fn test_malformed_lines_rejected() {
        for bad in ["a\n", "a b c\n", " a\n", "a \n"] {
            let err = MergeTable::from_text(bad).unwrap_err();
            assert!(
                matches!(err, LoadError::MalformedMerge { line: 1, .. }),
                "{bad:?} gave {err}"
            );
        }
        let err = MergeTable::from_text("#version: 0.2\na b\nbroken\n").unwrap_err();
        assert!(matches!(err, LoadError::MalformedMerge { line: 3, .. }));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = MergeTable::from_bytes(b"a b\n\xff c\n").unwrap_err();
        assert!(matches!(err, LoadError::MalformedMerge { line: 2, .. }));
    }

    #[test]
    fn test_best_pair_picks_lowest_rank() {
        let merges = table(&[("0", "0"), ("2", "0"), ("2", "00")]);
        let symbols = ["2", "0", "0", "0"];
        let best = merges.best_pair(&symbols).unwrap();
        assert_eq!((best.left, best.right, best.rank), ("0", "0", 0));

        let symbols = ["2", "00", "0"];
        let best = merges.best_pair(&symbols).unwrap();
        assert_eq!((best.left, best.right, best.rank), ("2", "00", 2));

        assert!(merges.best_pair(&["x", "y"]).is_none());
        assert!(merges.best_pair::<&str>(&[]).is_none());
    }

    #[test]
    fn test_duplicate_rule_keeps_last_rank() {
        let merges = table(&[("a", "b"), ("c", "d"), ("a", "b")]);
        assert_eq!(merges.len(), 3);
        assert_eq!(merges.live_len(), 2);
        assert_eq!(merges.rank_of("a", "b"), Some(2));
        assert!(merges.pair_of(0).is_none());
        let ranks: Vec<u32> = merges.iter().map(|p| p.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
    }
}
