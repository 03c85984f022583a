//! Recursive conditions.
//!
//! A condition whose relation is already being proved further up the
//! graph is not compiled in place. Its step carries a [`RecurrenceSite`]
//! instead, and each proof borrows a subtree for the condition from an
//! idle pool, compiling a fresh one only when the pool is empty. Finished
//! subtrees go back to the pool, so the number of live subtrees follows
//! the recursion depth actually reached.
//!
//! Active sites are tabled. A site whose binding key (condition pattern
//! plus the current filter bindings) matches an active ancestor frame is
//! answered from that frame's memo, and the ancestor re-proves until its
//! rows stop changing. This keeps cyclic data, such as the transitive
//! closure of a graph with cycles, finite.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{AndId, OrId, ProofGraph, RelId, RootKind};
use crate::filter::{FilterKey, FilterSet};
use crate::ruleset::{Arg, Atom, ConditionKey};
use crate::symbol::Symbol;
use crate::trace::{debug, warn};

/// Re-proofs a tabled frame may run before its rows are taken as final.
const MAX_FIXPOINT_ROUNDS: u32 = 256;

/// Identity of an interchangeable subtree: the condition's constants,
/// the ties between its repeated variables, and its filter layout.
pub(crate) type PoolKey = (ConditionKey, SmallVec<[(usize, usize); 2]>, Vec<FilterKey>);

/// A pool key plus, per filter, the distinct source values it ties to.
type BindingKey = (PoolKey, Vec<Vec<Vec<Symbol>>>);

/// Repeated-variable ties of a condition as `(later, first)` positions.
pub(crate) fn tie_pattern(atom: &Atom) -> SmallVec<[(usize, usize); 2]> {
    let mut ties = SmallVec::new();
    for (i, arg) in atom.args.iter().enumerate() {
        if let Arg::Var(v) = *arg {
            if let Some(first) = atom.position_of(v) {
                if first != i {
                    ties.push((i, first));
                }
            }
        }
    }
    ties
}

#[derive(Debug)]
pub(crate) struct RecurrenceSite {
    pub(crate) condition: Atom,
    pub(crate) filters: FilterSet,
    key: PoolKey,
    /// Holds memo rows when the site is answered by an ancestor frame.
    scratch: RelId,
}

impl RecurrenceSite {
    pub(crate) fn new(condition: Atom, filters: FilterSet, scratch: RelId) -> Self {
        let key = (
            ConditionKey::of(&condition),
            tie_pattern(&condition),
            filters.key(),
        );
        Self {
            condition,
            filters,
            key,
            scratch,
        }
    }
}

#[derive(Debug)]
struct Frame {
    key: BindingKey,
    memo: Vec<Vec<Symbol>>,
    looped: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Recurrence {
    pool: FxHashMap<PoolKey, Vec<OrId>>,
    frames: Vec<Frame>,
}

impl Recurrence {
    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn idle(&self) -> usize {
        self.pool.values().map(Vec::len).sum()
    }
}

impl ProofGraph {
    fn binding_key(&self, site: &RecurrenceSite) -> BindingKey {
        let bindings = site
            .filters
            .iter()
            .map(|f| {
                let Some(src) = f.source() else {
                    return Vec::new();
                };
                let mut rows: Vec<Vec<Symbol>> = self.relations[src.index()]
                    .rows()
                    .map(|row| f.mapping().foreign().iter().map(|&c| row[c]).collect())
                    .collect();
                rows.sort_unstable();
                rows.dedup();
                rows
            })
            .collect();
        (site.key.clone(), bindings)
    }

    /// Prove a recursive condition below conjunction `a`. Returns whether
    /// it holds, the relation holding its tuples, and the borrowed subtree
    /// the caller hands back with [`ProofGraph::release_pooled`] once the
    /// tuples are merged.
    pub(crate) fn prove_recurrence(&mut self, a: AndId, site: &mut RecurrenceSite) -> (bool, RelId, Option<OrId>) {
        let depth = self.recurrence.frames.len();
        if depth >= self.cfg.max_recursion_depth {
            warn!(depth, "recursion depth limit reached, failing branch");
            self.relations[site.scratch.index()].clear();
            return (false, site.scratch, None);
        }

        for f in site.filters.iter_mut() {
            if let Some(src) = self.resolve_from_and(a, f.distance(), f.path()) {
                f.set_source(src);
            }
        }
        let key = self.binding_key(site);

        if let Some(frame) = self.recurrence.frames.iter_mut().rev().find(|f| f.key == key) {
            frame.looped = true;
            let scratch = &mut self.relations[site.scratch.index()];
            scratch.clear();
            for row in &frame.memo {
                scratch.push_row(row);
            }
            return (!frame.memo.is_empty(), site.scratch, None);
        }

        let child = match self.recurrence.pool.get_mut(&site.key).and_then(Vec::pop) {
            Some(child) => {
                self.metrics.record_recurrence_pool_hit();
                self.ors[child.index()].parent = Some(a);
                child
            }
            None => {
                self.metrics.record_recurrence_expansion();
                debug!(depth, "compiling recursive subtree");
                self.create_or(
                    site.condition.clone(),
                    Some(a),
                    site.filters.clone(),
                    RootKind::Condition,
                    true,
                )
            }
        };

        self.recurrence.frames.push(Frame {
            key,
            memo: Vec::new(),
            looped: false,
        });
        self.metrics.update_max_recursion_depth(self.recurrence.frames.len() as u64);

        let mut rounds = 0;
        let proven = loop {
            let proven = self.prove_or(child);
            if !self.recurrence.frames.last().is_some_and(|f| f.looped) {
                break proven;
            }
            let mut rows = self.data(child).sorted_rows();
            rows.dedup();
            let Some(frame) = self.recurrence.frames.last_mut() else {
                break proven;
            };
            if rows == frame.memo {
                break proven;
            }
            if rounds >= MAX_FIXPOINT_ROUNDS {
                warn!(rounds, "recursive fixpoint did not settle");
                break proven;
            }
            frame.memo = rows;
            frame.looped = false;
            rounds += 1;
            self.metrics.record_fixpoint_round();
        };
        self.recurrence.frames.pop();

        (proven, self.ors[child.index()].data, Some(child))
    }

    /// Return a borrowed subtree to the idle pool.
    pub(crate) fn release_pooled(&mut self, site: &RecurrenceSite, child: OrId) {
        self.ors[child.index()].parent = None;
        self.recurrence
            .pool
            .entry(site.key.clone())
            .or_default()
            .push(child);
    }
}
