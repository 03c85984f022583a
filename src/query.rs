//! Equality queries local to one tuple.
//!
//! A query pins columns to constants and ties columns to each other. It is
//! used three ways: to select ground rows matching a condition's constants
//! and repeated variables, to describe the equality a `distinct` forbids,
//! and to fill a rule head's constant and repeated columns.

use smallvec::SmallVec;

use crate::symbol::Symbol;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct EqualityQuery {
    /// `row[col] == sym`
    symbols: SmallVec<[(usize, Symbol); 4]>,
    /// `row[target] == row[source]`, always `target > source`
    variables: SmallVec<[(usize, usize); 2]>,
}

impl EqualityQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equal_symbol(&mut self, column: usize, sym: Symbol) {
        self.symbols.push((column, sym));
    }

    pub fn equal_columns(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let (target, source) = if a > b { (a, b) } else { (b, a) };
        self.variables.push((target, source));
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.variables.is_empty()
    }

    pub fn symbols(&self) -> &[(usize, Symbol)] {
        &self.symbols
    }

    pub fn variables(&self) -> &[(usize, usize)] {
        &self.variables
    }

    /// Every equality holds.
    #[inline]
    pub fn pass(&self, row: &[Symbol]) -> bool {
        self.symbols.iter().all(|&(c, s)| row[c] == s)
            && self.variables.iter().all(|&(t, s)| row[t] == row[s])
    }

    /// Make the row satisfy the query: copy tied columns, then write constants.
    pub fn fill(&self, row: &mut [Symbol]) {
        for &(t, s) in &self.variables {
            row[t] = row[s];
        }
        for &(c, s) in &self.symbols {
            row[c] = s;
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
    fn pass_checks_symbols_and_ties() {
        let mut q = EqualityQuery::new();
        q.equal_symbol(0, s(1));
        q.equal_columns(1, 2);
        assert!(q.pass(&[s(1), s(4), s(4)]));
        assert!(!q.pass(&[s(2), s(4), s(4)]));
        assert!(!q.pass(&[s(1), s(4), s(5)]));
    }

    #[test]
    fn fill_satisfies_query() {
        let mut q = EqualityQuery::new();
        q.equal_columns(2, 0);
        q.equal_symbol(1, s(7));
        let mut row = [s(3), s(0), s(0)];
        q.fill(&mut row);
        assert_eq!(row, [s(3), s(7), s(3)]);
        assert!(q.pass(&row));
    }

    #[test]
    fn self_tie_is_ignored() {
        let mut q = EqualityQuery::new();
        q.equal_columns(1, 1);
        assert!(q.is_empty());
    }
}
