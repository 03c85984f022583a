//! Per-column row-range index.
//!
//! For every column and symbol the index stores the first and last row at
//! which the symbol occurs. Ranges only describe the row order produced by
//! the last full population, so the owning relation drops the index on any
//! partial mutation.

const ABSENT: u32 = u32::MAX;

use crate::symbol::Symbol;

#[derive(Clone, Debug, Default)]
struct ColumnRanges {
    first: Vec<u32>,
    last: Vec<u32>,
}

impl ColumnRanges {
    fn record(&mut self, sym: Symbol, row: u32) {
        let k = sym.index();
        if k >= self.first.len() {
            self.first.resize(k + 1, ABSENT);
            self.last.resize(k + 1, ABSENT);
        }
        if self.first[k] == ABSENT {
            self.first[k] = row;
        }
        self.last[k] = row;
    }

    fn reset(&mut self) {
        self.first.fill(ABSENT);
        self.last.fill(ABSENT);
    }
}

#[derive(Clone, Debug, Default)]
pub struct ColumnIndex {
    columns: Vec<ColumnRanges>,
}

impl ColumnIndex {
    /// Rebuild from row-major `data` holding `rows` tuples of width `arity`.
    /// Buffers are reused across rebuilds.
    pub fn rebuild(&mut self, data: &[Symbol], arity: usize, rows: usize) {
        self.columns.resize_with(arity, ColumnRanges::default);
        for col in &mut self.columns {
            col.reset();
        }
        for r in 0..rows {
            let row = &data[r * arity..(r + 1) * arity];
            for (c, &sym) in row.iter().enumerate() {
                self.columns[c].record(sym, r as u32);
            }
        }
    }

    /// Inclusive row range holding `sym` in `column`, or `None` if it never occurs.
    pub fn range(&self, column: usize, sym: Symbol) -> Option<(usize, usize)> {
        let col = self.columns.get(column)?;
        let k = sym.index();
        match col.first.get(k) {
            Some(&first) if first != ABSENT => Some((first as usize, col.last[k] as usize)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(n: u32) -> Symbol {
        Symbol::from_raw(n)
    }

    #[test]
    fn ranges_cover_first_and_last_occurrence() {
        let data = [s(1), s(2), s(3), s(2), s(1), s(5)];
        let mut index = ColumnIndex::default();
        index.rebuild(&data, 2, 3);
        assert_eq!(index.range(0, s(1)), Some((0, 2)));
        assert_eq!(index.range(0, s(3)), Some((1, 1)));
        assert_eq!(index.range(1, s(2)), Some((0, 1)));
        assert_eq!(index.range(1, s(9)), None);
        assert_eq!(index.range(4, s(1)), None);
    }

    #[test]
    fn rebuild_forgets_old_content() {
        let mut index = ColumnIndex::default();
        index.rebuild(&[s(4), s(4)], 1, 2);
        index.rebuild(&[s(1)], 1, 1);
        assert_eq!(index.range(0, s(4)), None);
        assert_eq!(index.range(0, s(1)), Some((0, 0)));
    }
}
