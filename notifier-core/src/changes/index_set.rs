/*
    index_set.rs - Range-compressed sets of row positions

    Diffs are recorded as sparse position sets. Internally they are kept as
    sorted, non-overlapping, non-adjacent half-open ranges so that bulk
    insertions/deletions stay small. The boundary only ever sees the
    flattened, strictly ascending form.
*/

use std::fmt;
use std::ops::Range;

/// Sparse set of positions stored as disjoint ranges
#[derive(Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    ranges: Vec<Range<usize>>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single position.
    ///
    /// # Panics
    ///
    /// If `index` is `usize::MAX`, a position no collection row can have.
    pub fn add(&mut self, index: usize) {
        match index.checked_add(1) {
            Some(end) => self.add_range(index..end),
            None => panic!("position {} is out of range for an index set", index),
        }
    }

    /// Add every position in `range`, merging with touching ranges
    pub fn add_range(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }

        let mut start = range.start;
        let mut end = range.end;

        // Ranges ending before `start` are neither overlapping nor adjacent
        let first = self.ranges.partition_point(|r| r.end < start);
        let mut last = first;
        while last < self.ranges.len() && self.ranges[last].start <= end {
            start = start.min(self.ranges[last].start);
            end = end.max(self.ranges[last].end);
            last += 1;
        }

        self.ranges.splice(first..last, std::iter::once(start..end));
    }

    pub fn contains(&self, index: usize) -> bool {
        let candidate = self.ranges.partition_point(|r| r.end <= index);
        self.ranges
            .get(candidate)
            .map(|r| r.contains(&index))
            .unwrap_or(false)
    }

    /// Number of positions in the set
    pub fn count(&self) -> usize {
        self.ranges.iter().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.ranges.iter().flat_map(|r| r.clone())
    }

    /// Expand into an explicit ascending index list for transport
    pub fn flatten(&self) -> Vec<usize> {
        let mut indexes = Vec::with_capacity(self.count());
        indexes.extend(self.iter());
        indexes
    }
}

impl fmt::Debug for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ranges.iter()).finish()
    }
}

impl FromIterator<usize> for IndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = IndexSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<usize> for IndexSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for index in iter {
            self.add(index);
        }
    }
}
