//! Rule analysis: accumulator layout and the ordered merge steps of one rule.
//!
//! Column layout of a conjunction's accumulator:
//! - columns `0..head.arity()` hold the head tuple; a head variable lives at
//!   the first head position it occupies, later positions and head
//!   constants are written by the head query after the body is proved;
//! - then one column per body variable that appears in two or more
//!   literals and not in the head. A variable confined to a single literal
//!   is existential there and gets no column.
//!
//! A disjunction literal forks the accumulator: disjunct `i` runs on path
//! `i` against a copy of path 0, and fork-return steps copy the surviving
//! paths' bound columns back into path 0. Forking needs every disjunct to
//! bind the same columns; [`split_disjunctions`] turns other rules into one
//! rule per disjunct first.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::mapping::ColumnMapping;
use crate::merge::MergeKind;
use crate::query::EqualityQuery;
use crate::ruleset::{Arg, Condition, Literal, Rule, Var};
use crate::trace::debug;

/// One merge step of a planned rule.
#[derive(Clone, Debug)]
pub struct PlanOp {
    pub kind: MergeKind,
    pub path: usize,
    /// Condition proved by this step; `None` for fork returns.
    pub condition: Option<Condition>,
    /// Accumulator column <- condition argument, for variables bound here.
    pub new: ColumnMapping,
    /// Accumulator column <- condition argument, for variables bound earlier.
    pub common: ColumnMapping,
    pub new_vars: SmallVec<[Var; 4]>,
    pub common_vars: SmallVec<[Var; 4]>,
    /// Columns holding bound values after the step.
    pub bound: Vec<usize>,
    /// Paths `1..=fork_into` receive a copy of path 0 before the step runs.
    pub fork_into: usize,
    /// `distinct` checks settled by this step: a row is rejected when any
    /// group of equalities holds completely.
    pub distinct: Vec<EqualityQuery>,
}

impl PlanOp {
    fn fork_return(path: usize, bound: Vec<usize>) -> Self {
        Self {
            kind: MergeKind::ForkReturn,
            path,
            condition: None,
            new: ColumnMapping::new(),
            common: ColumnMapping::new(),
            new_vars: SmallVec::new(),
            common_vars: SmallVec::new(),
            bound,
            fork_into: 0,
            distinct: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RulePlan {
    pub width: usize,
    pub paths: usize,
    columns: FxHashMap<Var, usize>,
    pub head_query: EqualityQuery,
    pub ops: Vec<PlanOp>,
    /// A `distinct` that can never hold; the rule produces nothing.
    pub unsatisfiable: bool,
}

impl RulePlan {
    /// Accumulator column of `var`, if it has one.
    pub fn column(&self, var: Var) -> Option<usize> {
        self.columns.get(&var).copied()
    }

    pub fn build(rule: &Rule) -> Self {
        let columns = assign_columns(rule);
        let width = columns
            .values()
            .copied()
            .max()
            .map_or(rule.head.arity(), |m| (m + 1).max(rule.head.arity()));

        let mut head_query = EqualityQuery::new();
        for (i, arg) in rule.head.args.iter().enumerate() {
            match *arg {
                Arg::Const(c) => head_query.equal_symbol(i, c),
                Arg::Var(v) => {
                    if let Some(&home) = columns.get(&v) {
                        head_query.equal_columns(i, home);
                    }
                }
            }
        }

        let mut planner = Planner {
            columns: &columns,
            bound: Vec::new(),
            pending: Vec::new(),
            ops: Vec::new(),
            paths: 1,
            unsatisfiable: false,
        };
        for lit in &rule.body {
            match lit {
                Literal::Cond(c) => planner.condition(c, 0, 0),
                Literal::Or(cs) if cs.len() == 1 => planner.condition(&cs[0], 0, 0),
                Literal::Or(cs) => planner.fork(cs),
                Literal::Distinct(a, b) => planner.distinct(a, b),
            }
        }
        if !planner.pending.is_empty() {
            debug!(
                dropped = planner.pending.len(),
                "distinct over variables no condition binds"
            );
        }
        let Planner {
            ops,
            paths,
            unsatisfiable,
            ..
        } = planner;
        Self {
            width,
            paths,
            columns,
            head_query,
            ops,
            unsatisfiable,
        }
    }
}

/// Literals mentioning each variable.
fn literal_counts(rule: &Rule) -> FxHashMap<Var, usize> {
    let mut counts: FxHashMap<Var, usize> = FxHashMap::default();
    for lit in &rule.body {
        for v in lit.vars() {
            *counts.entry(v).or_default() += 1;
        }
    }
    counts
}

fn assign_columns(rule: &Rule) -> FxHashMap<Var, usize> {
    let mut columns: FxHashMap<Var, usize> = FxHashMap::default();
    for (i, arg) in rule.head.args.iter().enumerate() {
        if let Arg::Var(v) = *arg {
            columns.entry(v).or_insert(i);
        }
    }
    let counts = literal_counts(rule);
    let mut next = rule.head.arity();
    for lit in &rule.body {
        for v in lit.vars() {
            if counts.get(&v).copied().unwrap_or(0) >= 2 && !columns.contains_key(&v) {
                columns.insert(v, next);
                next += 1;
            }
        }
    }
    columns
}

struct PendingDistinct {
    left: Vec<Arg>,
    right: Vec<Arg>,
}

struct Planner<'a> {
    columns: &'a FxHashMap<Var, usize>,
    bound: Vec<Var>,
    pending: Vec<PendingDistinct>,
    ops: Vec<PlanOp>,
    paths: usize,
    unsatisfiable: bool,
}

impl Planner<'_> {
    fn is_bound(&self, v: Var) -> bool {
        self.bound.contains(&v)
    }

    fn bound_columns(&self, extra: &[Var]) -> Vec<usize> {
        let mut cols: Vec<usize> = self
            .bound
            .iter()
            .chain(extra)
            .filter_map(|v| self.columns.get(v).copied())
            .collect();
        cols.sort_unstable();
        cols.dedup();
        cols
    }

    /// Column variables `cond` would bind now.
    fn binds(&self, cond: &Condition) -> SmallVec<[Var; 4]> {
        let mut out: SmallVec<[Var; 4]> = SmallVec::new();
        if cond.negated {
            return out;
        }
        for v in cond.atom.vars() {
            if self.columns.contains_key(&v) && !self.is_bound(v) && !out.contains(&v) {
                out.push(v);
            }
        }
        out
    }

    fn op_for(&self, cond: &Condition, path: usize, fork_into: usize) -> PlanOp {
        let new_vars = self.binds(cond);
        let mut new = ColumnMapping::new();
        let mut common = ColumnMapping::new();
        let mut common_vars: SmallVec<[Var; 4]> = SmallVec::new();
        for (i, arg) in cond.atom.args.iter().enumerate() {
            let Arg::Var(v) = *arg else { continue };
            let Some(&col) = self.columns.get(&v) else { continue };
            if cond.atom.position_of(v) != Some(i) {
                continue;
            }
            if self.is_bound(v) {
                common.push(col, i);
                common_vars.push(v);
            } else if new_vars.contains(&v) {
                new.push(col, i);
            }
        }
        let kind = MergeKind::choose(cond.negated, new.len(), common.len(), !self.bound.is_empty());
        PlanOp {
            kind,
            path,
            condition: Some(cond.clone()),
            new,
            common,
            bound: self.bound_columns(&new_vars),
            new_vars,
            common_vars,
            fork_into,
            distinct: Vec::new(),
        }
    }

    /// Attach every pending `distinct` whose variables are bound once
    /// `extra` is, returning the equality groups to reject.
    fn settle(&mut self, extra: &[Var]) -> Vec<EqualityQuery> {
        let mut groups = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            let p = &self.pending[i];
            let ready = p
                .left
                .iter()
                .chain(&p.right)
                .filter_map(|a| a.as_var())
                .all(|v| self.columns.contains_key(&v) && (self.is_bound(v) || extra.contains(&v)));
            if !ready {
                i += 1;
                continue;
            }
            let p = self.pending.remove(i);
            match self.group(&p) {
                Some(g) if g.is_empty() => self.unsatisfiable = true,
                Some(g) => groups.push(g),
                None => {}
            }
        }
        groups
    }

    /// Equalities that together make the `distinct` false. `None` when two
    /// different constants face each other and the `distinct` always holds.
    fn group(&self, p: &PendingDistinct) -> Option<EqualityQuery> {
        let mut q = EqualityQuery::new();
        for (a, b) in p.left.iter().zip(&p.right) {
            match (*a, *b) {
                (Arg::Const(x), Arg::Const(y)) => {
                    if x != y {
                        return None;
                    }
                }
                (Arg::Var(v), Arg::Const(c)) | (Arg::Const(c), Arg::Var(v)) => {
                    q.equal_symbol(self.columns[&v], c);
                }
                (Arg::Var(v), Arg::Var(w)) => q.equal_columns(self.columns[&v], self.columns[&w]),
            }
        }
        Some(q)
    }

    fn condition(&mut self, cond: &Condition, path: usize, fork_into: usize) {
        let mut op = self.op_for(cond, path, fork_into);
        op.distinct = self.settle(&op.new_vars);
        self.bound.extend(op.new_vars.iter().copied());
        self.ops.push(op);
    }

    fn fork(&mut self, disjuncts: &[Condition]) {
        let k = disjuncts.len();
        let binds = self.binds(&disjuncts[0]);
        let mut ops = Vec::with_capacity(k);
        for (i, cond) in disjuncts.iter().enumerate() {
            let fork_into = if i == 0 { k - 1 } else { 0 };
            ops.push(self.op_for(cond, i, fork_into));
        }
        let groups = self.settle(&binds);
        for op in &mut ops {
            op.distinct = groups.clone();
        }
        self.bound.extend(binds.iter().copied());
        let bound = self.bound_columns(&[]);
        self.ops.extend(ops);
        for path in 1..k {
            self.ops.push(PlanOp::fork_return(path, bound.clone()));
        }
        self.paths = self.paths.max(k);
    }

    fn distinct(&mut self, left: &[Arg], right: &[Arg]) {
        self.pending.push(PendingDistinct {
            left: left.to_vec(),
            right: right.to_vec(),
        });
        let groups = self.settle(&[]);
        if groups.is_empty() {
            return;
        }
        // Bound already: the check rides on the latest step, or on every
        // disjunct step when the latest steps close a fork.
        let returns = self
            .ops
            .iter()
            .rev()
            .take_while(|o| o.kind == MergeKind::ForkReturn)
            .count();
        let end = self.ops.len() - returns;
        let start = if returns == 0 {
            end.saturating_sub(1)
        } else {
            end.saturating_sub(returns + 1)
        };
        for op in &mut self.ops[start..end] {
            op.distinct.extend(groups.iter().cloned());
        }
    }
}

/// Rewrite a rule whose disjuncts bind different columns into one rule per
/// disjunct. Other rules come back unchanged.
pub fn split_disjunctions(rule: &Rule) -> Vec<Rule> {
    let Some(pos) = rule
        .body
        .iter()
        .position(|l| matches!(l, Literal::Or(cs) if cs.len() > 1))
    else {
        return vec![rule.clone()];
    };
    let Literal::Or(disjuncts) = &rule.body[pos] else {
        return vec![rule.clone()];
    };
    let columns = assign_columns(rule);
    let mut bound: Vec<Var> = Vec::new();
    for lit in &rule.body[..pos] {
        for c in lit.conditions().filter(|c| !c.negated) {
            bound.extend(c.atom.vars());
        }
    }
    let binds = |c: &Condition| -> Vec<Var> {
        let mut vs: Vec<Var> = if c.negated {
            Vec::new()
        } else {
            c.atom
                .vars()
                .filter(|v| columns.contains_key(v) && !bound.contains(v))
                .collect()
        };
        vs.sort_unstable();
        vs.dedup();
        vs
    };
    let first = binds(&disjuncts[0]);
    if disjuncts.iter().all(|c| binds(c) == first) {
        return vec![rule.clone()];
    }
    disjuncts
        .iter()
        .map(|c| {
            let mut clone = rule.clone();
            clone.body[pos] = Literal::Cond(c.clone());
            clone
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/plan.rs"]
mod tests;
