//! Sequence number gap detection
//!
//! Tracks observed sequence numbers and computes which ones are missing
//! between the lowest and highest seen.

use std::collections::BTreeSet;

/// Every sequence in `[min, max]` of `sequences` that is absent, ascending.
///
/// An empty set has no span and yields no gaps. The result grows with the
/// width of the gaps; `GapDetector::gaps` does not.
pub fn missing(sequences: &BTreeSet<i32>) -> Vec<i32> {
    let Some(&lo) = sequences.first() else {
        return Vec::new();
    };

    let mut gaps = Vec::new();
    let mut expected = i64::from(lo);
    for &seq in sequences {
        let seq = i64::from(seq);
        // Values between `expected` and `seq` fit in i32: both ends do.
        gaps.extend((expected..seq).map(|s| s as i32));
        expected = seq + 1;
    }
    gaps
}

#[derive(Debug, Clone, Default)]
pub struct GapDetector {
    seen: BTreeSet<i32>,
}

impl GapDetector {
    pub fn new() -> Self {
        GapDetector {
            seen: BTreeSet::new(),
        }
    }

    /// Record a sequence number. Returns false if it was already seen.
    pub fn observe(&mut self, seq_num: i32) -> bool {
        self.seen.insert(seq_num)
    }

    pub fn contains(&self, seq_num: i32) -> bool {
        self.seen.contains(&seq_num)
    }

    /// Observed (min, max), or `None` before anything was seen.
    pub fn span(&self) -> Option<(i32, i32)> {
        Some((*self.seen.first()?, *self.seen.last()?))
    }

    pub fn missing(&self) -> Vec<i32> {
        missing(&self.seen)
    }

    /// Missing sequences collapsed into inclusive (start, end) ranges.
    ///
    /// Proportional to the number of observed sequences, not the span.
    pub fn gaps(&self) -> Vec<(i32, i32)> {
        self.seen
            .iter()
            .zip(self.seen.iter().skip(1))
            .filter_map(|(&prev, &next)| {
                (i64::from(next) - i64::from(prev) > 1).then_some((prev + 1, next - 1))
            })
            .collect()
    }

    pub fn total_missing(&self) -> usize {
        match self.span() {
            None => 0,
            Some((lo, hi)) => (i64::from(hi) - i64::from(lo) + 1) as usize - self.seen.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }
}
