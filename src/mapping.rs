//! Column mappings between two relations.

use smallvec::SmallVec;

use crate::symbol::Symbol;

/// Parallel lists of column positions: `local[i]` in the relation being
/// written or probed corresponds to `foreign[i]` in the relation being read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ColumnMapping {
    local: SmallVec<[usize; 6]>,
    foreign: SmallVec<[usize; 6]>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I: IntoIterator<Item = (usize, usize)>>(pairs: I) -> Self {
        let mut mapping = Self::new();
        for (local, foreign) in pairs {
            mapping.push(local, foreign);
        }
        mapping
    }

    pub fn push(&mut self, local: usize, foreign: usize) {
        self.local.push(local);
        self.foreign.push(foreign);
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    pub fn local(&self) -> &[usize] {
        &self.local
    }

    pub fn foreign(&self) -> &[usize] {
        &self.foreign
    }

    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.local.iter().copied().zip(self.foreign.iter().copied())
    }

    /// True when `row` (read at foreign columns) agrees with `probe` (read at local columns).
    #[inline]
    pub fn matches(&self, probe: &[Symbol], row: &[Symbol]) -> bool {
        self.pairs().all(|(l, f)| probe[l] == row[f])
    }
}

#[cfg(test)]
#[path = "tests/mapping.rs"]
mod tests;
