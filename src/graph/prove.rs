//! Proving disjunctions and conjunctions.
//!
//! Every proof is set-at-a-time: a disjunction fills its data relation with
//! all tuples of its condition, a conjunction fills its main accumulator
//! with all head tuples of its rule. Relations that are written while
//! others are read are taken out of the arena with [`std::mem::take`] for
//! the duration of the write and put back afterwards.

use std::mem;

use super::{rel_pair, AndId, MergeStep, OrId, OrMode, ProofGraph, StepSource};
use crate::filter::FilterSet;
use crate::merge::{self, MergeKind};
use crate::query::EqualityQuery;
use crate::relation::{Relation, INDEX_MIN_ROWS};
use crate::symbol::Symbol;
use crate::trace::{debug, debug_span};

/// Run every filter of `filters` with a resolved source against `row`.
fn filters_pass(filters: &mut FilterSet, relations: &[Relation], learning: bool, row: &[Symbol]) -> bool {
    filters.iter_mut().all(|f| match f.source() {
        Some(src) => {
            let source = &relations[src.index()];
            if learning {
                f.pass_learning(row, source)
            } else {
                f.pass(row, source)
            }
        }
        None => true,
    })
}

fn query_pass(query: Option<&EqualityQuery>, row: &[Symbol]) -> bool {
    query.map_or(true, |q| q.pass(row))
}

impl ProofGraph {
    /// Prove a disjunction against the current state. True when its
    /// condition holds for at least one tuple; the tuples are then in
    /// [`ProofGraph::data`].
    pub fn prove(&mut self, or: OrId) -> bool {
        self.prove_or(or)
    }

    pub(crate) fn prove_or(&mut self, o: OrId) -> bool {
        self.metrics.record_or_proof();
        self.resolve_or_filters(o);

        let proven = match self.reuse_fill(o) {
            Some(hit) => {
                self.metrics.record_reuse_hit();
                hit
            }
            None => {
                let proven = match self.ors[o.index()].mode {
                    OrMode::Ground => {
                        let node = &self.ors[o.index()];
                        !self.relations[node.data.index()].is_empty()
                    }
                    OrMode::GroundQuery => self.prove_ground_query(o),
                    mode if mode.is_rewrite() => self.prove_rewrite(o),
                    _ => self.prove_union(o),
                };
                self.reuse_store(o);
                proven
            }
        };

        let node = &self.ors[o.index()];
        if node.mode != OrMode::Ground {
            let rel = &mut self.relations[node.own.index()];
            if rel.len() > INDEX_MIN_ROWS {
                rel.build_index();
            }
        }
        proven
    }

    fn prove_ground_query(&mut self, o: OrId) -> bool {
        let node = &self.ors[o.index()];
        let (Some(ground), Some(query)) = (node.ground, node.query.as_ref()) else {
            return false;
        };
        let (own, src) = rel_pair(&mut self.relations, node.own, ground);
        own.rewrite_with_query(src, query);
        !own.is_empty()
    }

    /// Rewrite from the ground relation through the query and the filters,
    /// narrowing the scan through the most selective filter when it pays.
    fn prove_rewrite(&mut self, o: OrId) -> bool {
        let Self {
            ors,
            relations,
            cfg,
            metrics,
            ..
        } = self;
        let node = &mut ors[o.index()];
        let mut out = mem::take(&mut relations[node.own.index()]);
        let Some(ground) = node.ground else {
            out.clear();
            relations[node.own.index()] = out;
            return false;
        };
        let rels: &[Relation] = relations;
        let target = &rels[ground.index()];
        let learning = node.mode == OrMode::LearningRewrite;

        let mut range = match node.query.as_ref() {
            Some(q) => target.narrow(q.symbols().iter().copied()),
            None => 0..target.len(),
        };
        let chosen = node
            .filters
            .choose_one(rels)
            .and_then(|i| node.filters.get(i))
            .and_then(|f| f.source().map(|s| (f, &rels[s.index()])));
        if let Some((filter, source)) = chosen {
            let narrow = if learning {
                source.len() < cfg.learning_source_limit && source.len() < target.len()
            } else {
                source.len() < cfg.learning_source_limit || target.len() > cfg.learning_target_floor
            };
            if narrow {
                let r = filter.candidate_range(target, source);
                range = range.start.max(r.start)..range.end.min(r.end);
                if range.start > range.end {
                    range = 0..0;
                }
            }
        }

        let query = node.query.as_ref();
        let filters = &mut node.filters;
        let mut rejected = 0u64;
        out.rewrite_where(target, range, |row| {
            if !query_pass(query, row) {
                return false;
            }
            let ok = filters_pass(filters, rels, learning, row);
            if !ok {
                rejected += 1;
            }
            ok
        });
        metrics.record_filter_rejections(rejected);
        let proven = !out.is_empty();
        relations[node.own.index()] = out;

        if learning && node.filters.visit() >= cfg.adapt_after_visits {
            let removed = node.filters.retain_established();
            metrics.record_filters_dropped(removed as u64);
            if node.filters.is_empty() {
                node.mode = if node.query.is_some() {
                    OrMode::GroundQuery
                } else {
                    node.data = ground;
                    OrMode::Ground
                };
                metrics.record_mode_downgrade();
                debug!(or = o.index(), mode = ?node.mode, "filters never narrowed, back to ground");
            } else if removed == 0 {
                node.mode = if node.query.is_some() {
                    OrMode::FilterQueryRewrite
                } else {
                    OrMode::FilterRewrite
                };
                metrics.record_mode_downgrade();
                debug!(or = o.index(), filters = node.filters.len(), "filter set settled");
            } else {
                node.filters.rewind_visits(10);
            }
        }
        proven
    }

    /// Union of the ground rows (in hybrid modes) and every realization
    /// that proves.
    fn prove_union(&mut self, o: OrId) -> bool {
        let oi = o.index();
        let own = self.ors[oi].own;
        let mut out = mem::take(&mut self.relations[own.index()]);
        out.clear();

        let node = &self.ors[oi];
        if matches!(node.mode, OrMode::Hybrid | OrMode::HybridQuery) {
            if let Some(g) = node.ground {
                let src = &self.relations[g.index()];
                match node.query.as_ref() {
                    Some(q) => out.append_where(src, |row| q.pass(row)),
                    None => out.merge_append(src),
                }
            }
        }

        let realizations = mem::take(&mut self.ors[oi].realizations);
        let mut success = false;
        for (i, &a) in realizations.iter().enumerate() {
            if !self.prove_and(a) {
                continue;
            }
            success = true;
            let old = out.len();
            let main = &self.relations[self.ands[a.index()].paths[0].index()];
            match self.ors[oi].query.as_ref() {
                Some(q) => out.append_where(main, |row| q.pass(row)),
                None => out.merge_append(main),
            }
            if let Some(dd) = self.ors[oi].dedup.get_mut(i) {
                dd.run(&mut out, None, old);
            }
        }
        self.ors[oi].realizations = realizations;

        let proven = !out.is_empty() || (success && out.arity() == 0);
        self.relations[own.index()] = out;
        proven
    }

    pub(crate) fn prove_and(&mut self, a: AndId) -> bool {
        self.metrics.record_and_proof();
        let ai = a.index();
        let _span = debug_span!("prove_and", and = ai).entered();

        let parent = self.ands[ai].parent;
        for guard in &self.ands[ai].head_guards {
            let f = guard.filter();
            if let Some(src) = self.resolve(parent, f.distance(), f.path()) {
                if !guard.pass(&self.relations[src.index()]) {
                    return false;
                }
            }
        }

        let paths = self.ands[ai].paths.clone();
        for &p in &paths {
            self.relations[p.index()].clear();
        }
        {
            let node = &mut self.ands[ai];
            node.active.iter_mut().for_each(|on| *on = false);
            node.active[0] = true;
            node.active_count = 1;
        }

        let mut steps = mem::take(&mut self.ands[ai].steps);
        let mut ok = true;
        for step in steps.iter_mut() {
            let path = step.op.path;
            if !self.ands[ai].active[path] {
                continue;
            }
            for k in 1..=step.op.fork_into {
                let (dst, src) = rel_pair(&mut self.relations, paths[k], paths[0]);
                dst.rewrite(src);
                let node = &mut self.ands[ai];
                if !node.active[k] {
                    node.active[k] = true;
                    node.active_count += 1;
                }
            }
            if !self.run_step(a, step) {
                self.relations[paths[path].index()].clear();
                let node = &mut self.ands[ai];
                node.active[path] = false;
                node.active_count -= 1;
                if node.active_count == 0 {
                    ok = false;
                    break;
                }
            }
        }
        self.ands[ai].steps = steps;
        if !ok {
            return false;
        }

        let node = &self.ands[ai];
        let main = &mut self.relations[paths[0].index()];
        if main.is_empty() {
            main.push_blank_row();
        }
        if !node.head_query.is_empty() {
            for i in 0..main.len() {
                node.head_query.fill(main.row_mut(i));
            }
        }
        true
    }

    /// Prove the step's condition and merge it into the step's path.
    fn run_step(&mut self, a: AndId, step: &mut MergeStep) -> bool {
        if matches!(step.source, StepSource::Path) {
            return self.fork_return(a, step);
        }
        let (proven, source, pooled) = match &mut step.source {
            StepSource::Path => return false,
            StepSource::Or(o) => {
                let o = *o;
                (self.prove_or(o), self.ors[o.index()].data, None)
            }
            StepSource::Recurrence(site) => self.prove_recurrence(a, site),
        };
        let kind = step.op.kind;
        if !proven && kind != MergeKind::Not {
            self.release_recurrence(step, pooled);
            return false;
        }

        let filtered = !step.filters.is_empty();
        if filtered {
            let parent = self.ands[a.index()].parent;
            for f in step.filters.iter_mut() {
                if let Some(src) = self.resolve(parent, f.distance(), f.path()) {
                    f.set_source(src);
                }
            }
        }

        let path_rel = self.ands[a.index()].paths[step.op.path];
        let mut acc = mem::take(&mut self.relations[path_rel.index()]);
        let rels = &self.relations;
        let src = &rels[source.index()];
        let groups = &step.op.distinct;
        let filters = &mut step.filters;
        let learning = step.learning;
        let mut rejected = 0u64;
        let mut check = |row: &[Symbol]| {
            if !groups.iter().all(|g| !g.pass(row)) {
                return false;
            }
            if !filtered || filters_pass(filters, rels, learning, row) {
                return true;
            }
            rejected += 1;
            false
        };

        let old = acc.len();
        let kept = match kind {
            MergeKind::Project => merge::project(&mut acc, src, &step.op.new, &mut check),
            MergeKind::Combine => merge::combine(&mut acc, src, &step.op.new, &mut check),
            MergeKind::Expand => merge::expand(&mut acc, src, &step.op.new, &step.op.common, &mut check),
            MergeKind::Verify => merge::verify(&mut acc, src, &step.op.common, &mut check),
            MergeKind::Not => merge::negate(&mut acc, src, &step.op.common, proven, &mut check),
            MergeKind::ForkReturn => false,
        };
        let mut lowest = acc.finalize_deletion();

        // Without shared columns these kinds keep the accumulator untouched.
        let unchecked = matches!(kind, MergeKind::Verify | MergeKind::Not) && step.op.common.is_empty();
        if unchecked && (filtered || !groups.is_empty()) {
            for i in 0..acc.len() {
                if !check(acc.row(i)) {
                    acc.mark_deleted(i);
                }
            }
            lowest = lowest.min(acc.finalize_deletion());
        }
        self.metrics.record_filter_rejections(rejected);

        if kind.binds() {
            let from = if kind == MergeKind::Project { 0 } else { old.min(lowest) };
            step.dedup.run(&mut acc, Some(&step.op.bound), from);
        }

        if step.learning && filtered && step.filters.visit() >= self.cfg.adapt_after_visits {
            let dropped = step
                .filters
                .drop_below(self.cfg.drop_threshold(step.recursive));
            self.metrics.record_filters_dropped(dropped as u64);
            step.learning = false;
            step.filters.order_by_performance();
            debug!(and = a.index(), dropped, "step filters settled");
        }

        self.metrics.record_merge(acc.len());
        let ok = if unchecked {
            kept && (old == 0 || !acc.is_empty())
        } else {
            !acc.is_empty()
        };
        self.relations[path_rel.index()] = acc;
        self.release_recurrence(step, pooled);
        ok
    }

    /// Copy a finished branch's bound columns into path 0 and retire the branch.
    fn fork_return(&mut self, a: AndId, step: &mut MergeStep) -> bool {
        let ai = a.index();
        let branch = step.op.path;
        let (main, other) = (self.ands[ai].paths[0], self.ands[ai].paths[branch]);
        let (dst, src) = rel_pair(&mut self.relations, main, other);
        let old = dst.len();
        dst.merge_columns(src, &step.op.bound);
        step.dedup.run(dst, Some(&step.op.bound), old);
        self.relations[other.index()].clear();

        let node = &mut self.ands[ai];
        node.active[branch] = false;
        if node.active[0] {
            node.active_count -= 1;
        } else {
            node.active[0] = true;
        }
        true
    }

    fn release_recurrence(&mut self, step: &MergeStep, pooled: Option<OrId>) {
        if let (Some(child), StepSource::Recurrence(site)) = (pooled, &step.source) {
            self.release_pooled(site, child);
        }
    }
}
