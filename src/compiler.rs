//! Building a [`ProofGraph`] from a [`RuleSet`].
//!
//! Compilation walks down from the simulator's entry points (`legal`,
//! `terminal`, each role's `goal`, the `next` and `init` rules of every
//! frame relation) and creates one disjunction per condition occurrence and
//! one conjunction per applicable rule. Filters are derived on the way
//! down: each step hands its child the columns it already binds, and every
//! conjunction passes its own filters on to the conditions mentioning the
//! filtered variables. Conditions whose relation is already on the path
//! from the root become recurrence sites and are compiled on demand.

use std::borrow::Cow;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::config::EngineConfig;
use crate::dedup::DuplicateRemover;
use crate::error::{GdlError, Result};
use crate::filter::{Filter, FilterSet, HeadGuard};
use crate::graph::recurrence::RecurrenceSite;
use crate::graph::{AndId, AndNode, MergeStep, OrId, OrMode, OrNode, ProofGraph, RelId, RootKind, StepSource};
use crate::plan::{split_disjunctions, PlanOp, RulePlan};
use crate::query::EqualityQuery;
use crate::relation::Relation;
use crate::ruleset::{Arg, Atom, Rule, RuleSet, Var};
use crate::symbol::Symbol;
use crate::trace::{debug, info};

/// `(relation ?0 ?1 ...)` over the relation's full arity.
fn general(relation: Symbol, arity: usize) -> Atom {
    Atom {
        relation,
        args: (0..arity).map(|i| Arg::Var(Var(i as u32))).collect(),
    }
}

/// Equalities a condition imposes on the tuples of its relation: its
/// constants and its repeated variables.
fn condition_query(atom: &Atom) -> Option<EqualityQuery> {
    let mut query = EqualityQuery::new();
    for (i, arg) in atom.args.iter().enumerate() {
        match *arg {
            Arg::Const(c) => query.equal_symbol(i, c),
            Arg::Var(v) => {
                if let Some(first) = atom.position_of(v) {
                    query.equal_columns(i, first);
                }
            }
        }
    }
    (!query.is_empty()).then_some(query)
}

impl ProofGraph {
    /// Compile every entry point of `rules`.
    pub fn compile(rules: Arc<RuleSet>, cfg: EngineConfig) -> Result<Self> {
        cfg.validate()?;
        let names = rules.names();
        if rules.rules(names.legal).is_empty() && rules.constant_facts(names.legal).is_none() {
            return Err(GdlError::compile("game defines no legal moves"));
        }

        let mut graph = Self::empty(Arc::clone(&rules), cfg);
        for (relation, facts) in rules.constant_relations() {
            let mut rel = Relation::from_rows(rules.arity(relation), facts);
            rel.build_index();
            let id = graph.alloc(rel);
            graph.ground.insert(relation, id);
        }
        for &frame in rules.frames() {
            let id = graph.alloc(Relation::new(rules.arity(frame)));
            graph.ground.insert(frame, id);
        }
        let does = graph.alloc(Relation::new(rules.arity(names.does)));
        graph.ground.insert(names.does, does);

        let root = |graph: &mut Self, atom: Atom, kind: RootKind| {
            graph.create_or(atom, None, FilterSet::new(), kind, false)
        };
        let legal = general(names.legal, rules.arity(names.legal));
        graph.roots.legal = Some(root(&mut graph, legal, RootKind::Query));
        let terminal = general(names.terminal, rules.arity(names.terminal));
        graph.roots.terminal = Some(root(&mut graph, terminal, RootKind::Query));
        for role in 0..rules.roles().len() {
            let goal = root(&mut graph, rules.goal_condition(role), RootKind::Query);
            graph.roots.goals.push(goal);
        }
        for &frame in rules.frames() {
            let next = (!rules.next_rules(frame).is_empty())
                .then(|| root(&mut graph, general(frame, rules.arity(frame)), RootKind::Next));
            graph.roots.next.push((frame, next));
        }
        for relation in rules.init_rule_relations() {
            let init = root(&mut graph, general(relation, rules.arity(relation)), RootKind::Init);
            graph.roots.init.push((relation, init));
        }

        graph.reuse.finish(&mut graph.ors);
        let (ors, ands) = graph.node_count();
        info!(
            disjunctions = ors,
            conjunctions = ands,
            relations = graph.relations.len(),
            shared = graph.reuse.slot_count(),
            "game compiled"
        );
        Ok(graph)
    }

    /// Compile an extra top-level question, e.g. `(reach ?x a)`. It does not
    /// take part in result sharing.
    pub fn add_query(&mut self, condition: Atom) -> OrId {
        self.create_or(condition, None, FilterSet::new(), RootKind::Query, false)
    }

    /// Replace the content of a fact, frame or `does` relation.
    pub fn set_facts<R: AsRef<[Symbol]>>(&mut self, relation: Symbol, rows: &[R]) -> Result<()> {
        let Some(id) = self.ground_relation(relation) else {
            let name = self.rules.symbols().lookup(relation).unwrap_or("?").to_string();
            return Err(GdlError::UnknownSymbol(name));
        };
        let fresh = Relation::from_rows(self.relations[id.index()].arity(), rows);
        self.relations[id.index()].rewrite_indexed(&fresh);
        self.invalidate_reuse();
        Ok(())
    }

    pub(crate) fn create_or(
        &mut self,
        condition: Atom,
        parent: Option<AndId>,
        filters: FilterSet,
        kind: RootKind,
        pooled: bool,
    ) -> OrId {
        let set = Arc::clone(&self.rules);
        let relation = condition.relation;
        let query = condition_query(&condition);
        let ground = match kind {
            RootKind::Condition | RootKind::Query => self.ground.get(&relation).copied(),
            RootKind::Next | RootKind::Init => None,
        };

        let rules: Cow<'_, [Rule]> = match kind {
            RootKind::Next => Cow::Borrowed(set.next_rules(relation)),
            RootKind::Init => Cow::Borrowed(set.init_rules(relation)),
            RootKind::Condition | RootKind::Query => set.rules_for_condition(&condition),
        };
        let plans: Vec<(Rule, RulePlan)> = rules
            .iter()
            .flat_map(split_disjunctions)
            .map(|rule| {
                let plan = RulePlan::build(&rule);
                (rule, plan)
            })
            .filter(|(_, plan)| !plan.unsatisfiable)
            .collect();

        let mode = match ground {
            Some(_) if plans.is_empty() => {
                if !filters.is_empty() && condition.arity() > 0 {
                    OrMode::LearningRewrite
                } else if query.is_some() {
                    OrMode::GroundQuery
                } else {
                    OrMode::Ground
                }
            }
            Some(_) if query.is_some() => OrMode::HybridQuery,
            Some(_) => OrMode::Hybrid,
            None => OrMode::Derived,
        };

        let own = self.alloc(Relation::new(condition.arity()));
        let data = match (mode, ground) {
            (OrMode::Ground, Some(g)) => g,
            _ => own,
        };
        let producer = filters.is_empty() && query.is_none();
        let o = OrId::new(self.ors.len());
        self.ors.push(OrNode {
            condition,
            kind,
            mode,
            data,
            own,
            ground,
            query,
            realizations: Vec::new(),
            dedup: Vec::new(),
            parent,
            filters,
            reuse: None,
            pooled,
        });

        let limit = match kind {
            RootKind::Condition => self.cfg.dedup_visit_limit,
            _ => self.cfg.dedup_visit_limit_top,
        };
        for (rule, plan) in plans {
            let a = self.create_and(o, &rule, plan);
            let node = &mut self.ors[o.index()];
            node.realizations.push(a);
            node.dedup.push(DuplicateRemover::new(limit));
        }

        let node = &self.ors[o.index()];
        if !pooled && mode.has_realizations() && matches!(kind, RootKind::Condition | RootKind::Query) {
            self.reuse.register(&node.condition, o, producer);
        }
        debug!(
            or = o.index(),
            relation = set.symbols().lookup(relation).unwrap_or("?"),
            mode = ?mode,
            rules = node.realizations.len(),
            filters = node.filters.len(),
            "disjunction compiled"
        );
        o
    }

    fn create_and(&mut self, o: OrId, rule: &Rule, plan: RulePlan) -> AndId {
        let mut and_filters = FilterSet::new();
        let mut head_guards = Vec::new();
        for f in self.ors[o.index()].filters.iter() {
            if let Some(guard) = HeadGuard::new(f, &plan.head_query) {
                head_guards.push(guard);
            }
            let lowered = f.remap(f.distance(), |local, _| match rule.head.args.get(local) {
                Some(&Arg::Var(v)) => plan.column(v).map(|c| (c, Some(v))),
                _ => None,
            });
            if let Some(lowered) = lowered {
                and_filters.add(lowered);
            }
        }

        let paths: SmallVec<[RelId; 2]> = (0..plan.paths)
            .map(|_| self.alloc(Relation::new(plan.width)))
            .collect();
        let a = AndId::new(self.ands.len());
        self.ands.push(AndNode {
            parent: o,
            paths,
            active: SmallVec::from_elem(false, plan.paths),
            active_count: 0,
            steps: Vec::new(),
            head_query: plan.head_query.clone(),
            head_guards,
        });

        let pooled = self.ors[o.index()].pooled;
        let steps: Vec<MergeStep> = plan
            .ops
            .into_iter()
            .map(|op| self.create_step(a, op, &and_filters, pooled))
            .collect();
        self.ands[a.index()].steps = steps;
        a
    }

    fn create_step(&mut self, a: AndId, op: PlanOp, and_filters: &FilterSet, pooled: bool) -> MergeStep {
        let dedup = DuplicateRemover::new(self.cfg.dedup_visit_limit);
        let Some(cond) = op.condition.clone() else {
            return MergeStep {
                op,
                source: StepSource::Path,
                filters: FilterSet::new(),
                learning: false,
                dedup,
                recursive: false,
            };
        };

        let mut child_filters = FilterSet::new();
        let local = op
            .common
            .pairs()
            .zip(op.common_vars.iter().copied())
            .map(|((column, arg), v)| (column, arg, Some(v)));
        if let Some(local) = Filter::new(1, op.path, local) {
            child_filters.add(local);
        }
        let relation = cond.atom.relation;
        let recursive = !self.rules.rules(relation).is_empty() && self.on_chain(a, relation);
        // Recursive subtrees only see the step's own bindings, so their
        // filter layout is the same at every depth.
        if !recursive {
            for f in and_filters.iter() {
                let inherited = f.remap(f.distance() + 1, |_, var| {
                    let v = var?;
                    cond.atom.position_of(v).map(|p| (p, Some(v)))
                });
                if let Some(inherited) = inherited {
                    child_filters.add(inherited);
                }
            }
        }
        let source = if recursive {
            let scratch = self.alloc(Relation::new(cond.atom.arity()));
            StepSource::Recurrence(Box::new(RecurrenceSite::new(cond.atom, child_filters, scratch)))
        } else {
            let child = self.create_or(cond.atom, Some(a), child_filters, RootKind::Condition, pooled);
            StepSource::Or(child)
        };

        let mut filters = FilterSet::new();
        for f in and_filters.iter() {
            if !f.vars().any(|v| op.new_vars.contains(&v)) {
                continue;
            }
            let kept = f.remap(f.distance(), |local, var| op.bound.contains(&local).then_some((local, var)));
            if let Some(kept) = kept {
                filters.add(kept);
            }
        }

        MergeStep {
            learning: !filters.is_empty(),
            op,
            source,
            filters,
            dedup,
            recursive,
        }
    }
}

#[cfg(test)]
#[path = "tests/compiler.rs"]
mod tests;
