//! Flat tuple store.
//!
//! A [`Relation`] is a multiset of fixed-arity symbol tuples held row-major
//! in one growable buffer. Row order is not stable: deletions are batched
//! with [`Relation::mark_deleted`] and applied by
//! [`Relation::finalize_deletion`], which moves the last live row into each
//! hole. Any mutation other than a whole-relation rebuild through
//! [`Relation::rewrite_indexed`] or [`Relation::build_index`] drops the
//! column index, so a stale index is never consulted.

use std::ops::Range;

use crate::index::ColumnIndex;
use crate::mapping::ColumnMapping;
use crate::query::EqualityQuery;
use crate::symbol::Symbol;

/// Relations with more rows than this consult their column index.
pub const INDEX_MIN_ROWS: usize = 4;

const CAPACITY_STEP: usize = 8;

#[derive(Clone, Debug, Default)]
pub struct Relation {
    arity: usize,
    data: Vec<Symbol>,
    count: usize,
    capacity: usize,
    deleted: Vec<usize>,
    index: ColumnIndex,
    index_valid: bool,
}

impl Relation {
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            ..Self::default()
        }
    }

    pub fn with_capacity(arity: usize, rows: usize) -> Self {
        let mut rel = Self::new(arity);
        rel.reallocate(rows);
        rel
    }

    /// Build from explicit rows; each row is truncated or padded to `arity`.
    pub fn from_rows<R: AsRef<[Symbol]>>(arity: usize, rows: &[R]) -> Self {
        let mut rel = Self::with_capacity(arity, rows.len());
        for row in rows {
            rel.push_row(row.as_ref());
        }
        rel
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn has_pending_deletions(&self) -> bool {
        !self.deleted.is_empty()
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[Symbol] {
        &self.data[i * self.arity..(i + 1) * self.arity]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [Symbol] {
        self.index_valid = false;
        let arity = self.arity;
        &mut self.data[i * arity..(i + 1) * arity]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Symbol]> + '_ {
        (0..self.count).map(move |i| self.row(i))
    }

    /// Rows copied out and sorted; convenient for order-insensitive comparison.
    pub fn sorted_rows(&self) -> Vec<Vec<Symbol>> {
        let mut rows: Vec<Vec<Symbol>> = self.rows().map(|r| r.to_vec()).collect();
        rows.sort();
        rows
    }

    /// Grow storage to at least `min_rows`, rounded up to a multiple of eight. Never shrinks.
    pub fn reallocate(&mut self, min_rows: usize) {
        if min_rows <= self.capacity {
            return;
        }
        let rows = min_rows.div_ceil(CAPACITY_STEP) * CAPACITY_STEP;
        self.data.reserve_exact(rows * self.arity - self.data.len());
        self.capacity = rows;
    }

    fn ensure_room(&mut self, extra: usize) {
        let needed = self.count + extra;
        if needed > self.capacity {
            self.reallocate(needed.max(self.capacity * 2));
        }
    }

    /// Append one row, truncated or padded with the default symbol to the arity.
    pub fn push_row(&mut self, row: &[Symbol]) -> usize {
        self.ensure_room(1);
        let n = row.len().min(self.arity);
        self.data.extend_from_slice(&row[..n]);
        self.data
            .extend(std::iter::repeat(Symbol::default()).take(self.arity - n));
        self.count += 1;
        self.index_valid = false;
        self.count - 1
    }

    /// Append one row of default symbols.
    pub fn push_blank_row(&mut self) -> usize {
        self.push_row(&[])
    }

    /// Append a copy of row `i`.
    pub fn duplicate_row(&mut self, i: usize) -> usize {
        self.ensure_room(1);
        let start = i * self.arity;
        self.data.extend_from_within(start..start + self.arity);
        self.count += 1;
        self.index_valid = false;
        self.count - 1
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.count = 0;
        self.deleted.clear();
        self.index_valid = false;
    }

    /// Replace content with `source`, copying `min(arity)` columns per row.
    pub fn rewrite(&mut self, source: &Relation) {
        self.clear();
        self.merge_append(source);
    }

    /// Replace content with `source` and rebuild the column index.
    pub fn rewrite_indexed(&mut self, source: &Relation) {
        self.rewrite(source);
        self.build_index();
    }

    /// Append every row of `source`, copying `min(arity)` columns per row.
    pub fn merge_append(&mut self, source: &Relation) {
        self.ensure_room(source.count);
        if source.arity == self.arity {
            self.data
                .extend_from_slice(&source.data[..source.count * source.arity]);
            self.count += source.count;
        } else {
            for row in source.rows() {
                self.push_row(row);
            }
        }
        self.index_valid = false;
    }

    /// Append rows of `source` copying only `columns` (same positions in both).
    pub fn merge_columns(&mut self, source: &Relation, columns: &[usize]) {
        self.ensure_room(source.count);
        for r in 0..source.count {
            let i = self.push_blank_row();
            let base = i * self.arity;
            for &c in columns {
                self.data[base + c] = source.data[r * source.arity + c];
            }
        }
    }

    /// Replace content with the rows of `source` in `range` accepted by `keep`.
    pub fn rewrite_where<F>(&mut self, source: &Relation, range: Range<usize>, mut keep: F)
    where
        F: FnMut(&[Symbol]) -> bool,
    {
        self.clear();
        for i in range {
            let row = source.row(i);
            if keep(row) {
                self.push_row(row);
            }
        }
    }

    /// Append the rows of `source` accepted by `keep`.
    pub fn append_where<F>(&mut self, source: &Relation, mut keep: F)
    where
        F: FnMut(&[Symbol]) -> bool,
    {
        for row in source.rows() {
            if keep(row) {
                self.push_row(row);
            }
        }
    }

    /// Replace content with the rows of `source` satisfying `query`, narrowing through
    /// the source's index when it has one.
    pub fn rewrite_with_query(&mut self, source: &Relation, query: &EqualityQuery) {
        let range = source.narrow(query.symbols().iter().copied());
        self.rewrite_where(source, range, |row| query.pass(row));
    }

    /// Schedule row `i` for removal at the next [`Relation::finalize_deletion`].
    pub fn mark_deleted(&mut self, i: usize) {
        debug_assert!(i < self.count);
        self.deleted.push(i);
    }

    /// Apply pending deletions by moving the last live row into each hole.
    ///
    /// Marks are applied highest first, so the row moved into a hole is never
    /// itself pending. Duplicate marks are harmless. Returns the lowest row
    /// index that changed, or `len()` when nothing was deleted.
    pub fn finalize_deletion(&mut self) -> usize {
        if self.deleted.is_empty() {
            return self.count;
        }
        let mut marks = std::mem::take(&mut self.deleted);
        marks.sort_unstable();
        marks.dedup();
        let lowest = marks[0];
        let arity = self.arity;
        for &m in marks.iter().rev() {
            if m >= self.count {
                continue;
            }
            let last = self.count - 1;
            if m != last {
                self.data
                    .copy_within(last * arity..(last + 1) * arity, m * arity);
            }
            self.data.truncate(last * arity);
            self.count = last;
        }
        marks.clear();
        self.deleted = marks;
        self.index_valid = false;
        lowest.min(self.count)
    }

    /// Remove rows from `from` onward that equal an earlier row on `columns`
    /// (all columns when `None`). Returns the number of rows removed.
    pub fn delete_duplicates(&mut self, columns: Option<&[usize]>, from: usize) -> usize {
        let mut removed = 0;
        for i in from.max(1)..self.count {
            let dup = (0..i).any(|j| match columns {
                Some(cols) => cols.iter().all(|&c| self.row(i)[c] == self.row(j)[c]),
                None => self.row(i) == self.row(j),
            });
            if dup {
                self.deleted.push(i);
                removed += 1;
            }
        }
        if removed > 0 {
            self.finalize_deletion();
        }
        removed
    }

    pub fn build_index(&mut self) {
        self.index.rebuild(&self.data, self.arity, self.count);
        self.index_valid = true;
    }

    pub fn index_valid(&self) -> bool {
        self.index_valid
    }

    /// Candidate row range for rows whose columns equal the given symbols.
    /// The full range unless a valid index exists and the relation is large enough.
    pub fn narrow<I>(&self, constraints: I) -> Range<usize>
    where
        I: IntoIterator<Item = (usize, Symbol)>,
    {
        let mut range = 0..self.count;
        if !self.index_valid || self.count <= INDEX_MIN_ROWS {
            return range;
        }
        for (col, sym) in constraints {
            match self.index.range(col, sym) {
                Some((first, last)) => {
                    range.start = range.start.max(first);
                    range.end = range.end.min(last + 1);
                }
                None => return 0..0,
            }
            if range.start >= range.end {
                return 0..0;
            }
        }
        range
    }

    /// Candidate range for rows matching `probe` through `mapping`
    /// (this relation read at foreign columns).
    pub fn candidate_range(&self, mapping: &ColumnMapping, probe: &[Symbol]) -> Range<usize> {
        self.narrow(mapping.pairs().map(|(l, f)| (f, probe[l])))
    }

    /// First row at or after `from` matching `probe` through `mapping`.
    pub fn find_row(&self, from: usize, mapping: &ColumnMapping, probe: &[Symbol]) -> Option<usize> {
        let range = self.candidate_range(mapping, probe);
        (from.max(range.start)..range.end).find(|&i| mapping.matches(probe, self.row(i)))
    }

    pub fn contains_row(&self, row: &[Symbol]) -> bool {
        self.rows().any(|r| r == row)
    }
}

#[cfg(test)]
#[path = "tests/relation.rs"]
mod tests;
