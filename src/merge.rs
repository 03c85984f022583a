//! Merge-step semantics.
//!
//! Each function combines an accumulator (`into`) with the data of one
//! proven condition (`source`). Column mappings read `local` columns of the
//! accumulator and `foreign` columns of the source. Rows the merge drops are
//! only *marked*; the caller applies them with
//! [`Relation::finalize_deletion`] so it learns the lowest touched row.
//!
//! Every merge takes an admission check. The unfiltered variants pass
//! [`admit_all`]; the filtered variants pass a closure evaluating distinct
//! constraints and propagated filters on each candidate row before it is
//! kept, rather than as a separate pass.

use smallvec::SmallVec;

use crate::mapping::ColumnMapping;
use crate::relation::Relation;
use crate::symbol::Symbol;

type Scratch = SmallVec<[Symbol; 16]>;

/// How one condition contributes to a conjunction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MergeKind {
    /// Only new variables and nothing bound yet: accumulator := project(source).
    Project,
    /// Only new variables on a non-empty accumulator: cross product.
    Combine,
    /// Shared and new variables: one output row per matching source row.
    Expand,
    /// Only shared variables: keep rows with a match.
    Verify,
    /// Negated condition: keep rows without a match.
    Not,
    /// Copy a forked path's bound columns back into path 0.
    ForkReturn,
}

impl MergeKind {
    /// Pick the kind for a condition from its variable split.
    pub fn choose(negated: bool, new_vars: usize, common_vars: usize, anything_bound: bool) -> Self {
        if negated {
            MergeKind::Not
        } else if new_vars == 0 {
            MergeKind::Verify
        } else if common_vars > 0 {
            MergeKind::Expand
        } else if anything_bound {
            MergeKind::Combine
        } else {
            MergeKind::Project
        }
    }

    /// Kinds that write new columns and can therefore produce duplicates.
    pub fn binds(self) -> bool {
        matches!(self, MergeKind::Project | MergeKind::Combine | MergeKind::Expand)
    }
}

/// Admission check used by the unfiltered variants.
#[inline]
pub fn admit_all(_: &[Symbol]) -> bool {
    true
}

fn scratch_from(row: &[Symbol]) -> Scratch {
    SmallVec::from_slice(row)
}

#[inline]
fn write_new(dst: &mut [Symbol], src: &[Symbol], new: &ColumnMapping) {
    for (l, f) in new.pairs() {
        dst[l] = src[f];
    }
}

/// accumulator := project(source) through `new`.
pub fn project<C>(into: &mut Relation, source: &Relation, new: &ColumnMapping, mut check: C) -> bool
where
    C: FnMut(&[Symbol]) -> bool,
{
    into.clear();
    into.reallocate(source.len());
    let mut row: Scratch = SmallVec::from_elem(Symbol::default(), into.arity());
    for s in source.rows() {
        write_new(&mut row, s, new);
        if check(&row) {
            into.push_row(&row);
        }
    }
    !into.is_empty()
}

/// accumulator := accumulator x source, new columns written through `new`.
pub fn combine<C>(into: &mut Relation, source: &Relation, new: &ColumnMapping, mut check: C) -> bool
where
    C: FnMut(&[Symbol]) -> bool,
{
    let base = into.len();
    into.reallocate(base + base * source.len());
    let mut kept = 0;
    for a in 0..base {
        let mut row = scratch_from(into.row(a));
        for s in source.rows() {
            write_new(&mut row, s, new);
            if check(&row) {
                into.push_row(&row);
                kept += 1;
            }
        }
        into.mark_deleted(a);
    }
    kept > 0
}

/// Equi-join: each accumulator row is replaced by one row per matching source
/// row. The first match overwrites the row in place, further matches are
/// appended, and rows without any admitted match are marked deleted.
pub fn expand<C>(
    into: &mut Relation,
    source: &Relation,
    new: &ColumnMapping,
    common: &ColumnMapping,
    mut check: C,
) -> bool
where
    C: FnMut(&[Symbol]) -> bool,
{
    let base = into.len();
    let mut kept = 0;
    for a in 0..base {
        let probe = scratch_from(into.row(a));
        let mut candidate = probe.clone();
        let mut first = true;
        let mut from = 0;
        while let Some(j) = source.find_row(from, common, &probe) {
            from = j + 1;
            write_new(&mut candidate, source.row(j), new);
            if !check(&candidate) {
                continue;
            }
            if first {
                into.row_mut(a).copy_from_slice(&candidate);
                first = false;
            } else {
                into.push_row(&candidate);
            }
            kept += 1;
        }
        if first {
            into.mark_deleted(a);
        }
    }
    kept > 0
}

/// Semi-join: keep accumulator rows with at least one matching source row.
/// Without shared columns the step only asks whether the condition holds.
pub fn verify<C>(into: &mut Relation, source: &Relation, common: &ColumnMapping, mut check: C) -> bool
where
    C: FnMut(&[Symbol]) -> bool,
{
    if common.is_empty() {
        return !source.is_empty() || source.arity() == 0;
    }
    let mut kept = 0;
    for a in 0..into.len() {
        let row = into.row(a);
        if source.find_row(0, common, row).is_some() && check(row) {
            kept += 1;
        } else {
            into.mark_deleted(a);
        }
    }
    kept > 0
}

/// Anti-join: keep accumulator rows with no matching source row. `proven`
/// is the outcome of proving the negated condition; a failed proof keeps
/// every row.
pub fn negate<C>(
    into: &mut Relation,
    source: &Relation,
    common: &ColumnMapping,
    proven: bool,
    mut check: C,
) -> bool
where
    C: FnMut(&[Symbol]) -> bool,
{
    if common.is_empty() {
        return !proven;
    }
    let mut kept = 0;
    for a in 0..into.len() {
        let row = into.row(a);
        let matched = proven && source.find_row(0, common, row).is_some();
        if !matched && check(row) {
            kept += 1;
        } else {
            into.mark_deleted(a);
        }
    }
    kept > 0
}

#[cfg(test)]
#[path = "tests/merge.rs"]
mod tests;
