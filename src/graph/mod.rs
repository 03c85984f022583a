//! The proof graph: disjunction and conjunction nodes in one arena.
//!
//! Nodes refer to each other and to their relations by index. A
//! disjunction ([`OrNode`]) answers one condition: it owns a data relation
//! and proves it from a ground source, from its realizations (one
//! conjunction per applicable rule), or from both. A conjunction
//! ([`AndNode`]) proves one rule body by running its merge steps over one
//! accumulator per execution path.
//!
//! Filters name their source accumulator by distance instead of by
//! identity, so sources are resolved against the current parent links
//! each time a node is proved. This is what lets pooled recursive
//! subtrees be re-parented freely.

mod prove;
pub(crate) mod recurrence;
pub(crate) mod reuse;

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::config::EngineConfig;
use crate::dedup::DuplicateRemover;
use crate::filter::{FilterSet, HeadGuard};
use crate::metrics::ProofMetrics;
use crate::plan::PlanOp;
use crate::query::EqualityQuery;
use crate::relation::Relation;
use crate::ruleset::{Atom, RuleSet};
use crate::symbol::Symbol;

use recurrence::{Recurrence, RecurrenceSite};
use reuse::{ReuseLink, ReuseManager};

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn new(i: usize) -> Self {
                $name(i as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(RelId);
arena_id!(OrId);
arena_id!(AndId);

/// How a disjunction produces its data.
///
/// Negative codes are the rewrite modes of a ground-backed node that
/// received filters from above.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrMode {
    /// Rewrite from ground through the filters, counting what they reject.
    LearningRewrite,
    /// Rewrite from ground through established filters.
    FilterRewrite,
    /// As [`OrMode::FilterRewrite`] plus the condition's own query.
    FilterQueryRewrite,
    /// Data is the ground relation itself.
    Ground,
    /// Data is the ground rows matching the condition's query.
    GroundQuery,
    /// Ground rows plus every realization's rows.
    Hybrid,
    /// As [`OrMode::Hybrid`] with the query applied to every row.
    HybridQuery,
    /// Union of the realizations.
    Derived,
}

impl OrMode {
    pub fn code(self) -> i8 {
        match self {
            OrMode::LearningRewrite => -1,
            OrMode::FilterRewrite => -2,
            OrMode::FilterQueryRewrite => -3,
            OrMode::Ground => 0,
            OrMode::GroundQuery => 1,
            OrMode::Hybrid => 2,
            OrMode::HybridQuery => 3,
            OrMode::Derived => 4,
        }
    }

    pub fn is_rewrite(self) -> bool {
        self.code() < 0
    }

    pub fn has_realizations(self) -> bool {
        matches!(self, OrMode::Hybrid | OrMode::HybridQuery | OrMode::Derived)
    }
}

/// Which rules a disjunction draws on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootKind {
    /// A body condition below some conjunction.
    Condition,
    /// A top-level question: `legal`, `goal`, `terminal` or a caller's query.
    Query,
    /// The `next` rules of one frame relation.
    Next,
    /// The `init` rules of one frame relation.
    Init,
}

#[derive(Debug)]
pub struct OrNode {
    pub(crate) condition: Atom,
    pub(crate) kind: RootKind,
    pub(crate) mode: OrMode,
    /// Relation the consumer reads: `own`, or the ground relation in [`OrMode::Ground`].
    pub(crate) data: RelId,
    pub(crate) own: RelId,
    pub(crate) ground: Option<RelId>,
    pub(crate) query: Option<EqualityQuery>,
    pub(crate) realizations: Vec<AndId>,
    pub(crate) dedup: Vec<DuplicateRemover>,
    pub(crate) parent: Option<AndId>,
    pub(crate) filters: FilterSet,
    pub(crate) reuse: Option<ReuseLink>,
    pub(crate) pooled: bool,
}

impl OrNode {
    pub fn mode(&self) -> OrMode {
        self.mode
    }

    pub fn relation(&self) -> Symbol {
        self.condition.relation
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn realizations(&self) -> &[AndId] {
        &self.realizations
    }
}

#[derive(Debug)]
pub(crate) enum StepSource {
    /// Fork return: reads another path of the same conjunction.
    Path,
    Or(OrId),
    Recurrence(Box<RecurrenceSite>),
}

#[derive(Debug)]
pub struct MergeStep {
    pub(crate) op: PlanOp,
    pub(crate) source: StepSource,
    /// Ancestor filters checked on each candidate row during the merge.
    pub(crate) filters: FilterSet,
    pub(crate) learning: bool,
    pub(crate) dedup: DuplicateRemover,
    pub(crate) recursive: bool,
}

impl MergeStep {
    pub fn op(&self) -> &PlanOp {
        &self.op
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn child(&self) -> Option<OrId> {
        match self.source {
            StepSource::Or(o) => Some(o),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct AndNode {
    pub(crate) parent: OrId,
    pub(crate) paths: SmallVec<[RelId; 2]>,
    pub(crate) active: SmallVec<[bool; 2]>,
    pub(crate) active_count: usize,
    pub(crate) steps: Vec<MergeStep>,
    pub(crate) head_query: EqualityQuery,
    pub(crate) head_guards: Vec<HeadGuard>,
}

impl AndNode {
    pub fn steps(&self) -> &[MergeStep] {
        &self.steps
    }

    pub fn main(&self) -> RelId {
        self.paths[0]
    }
}

/// Compiled game: every node and relation, plus the top-level entry points
/// the simulator drives.
pub struct ProofGraph {
    pub(crate) rules: Arc<RuleSet>,
    pub(crate) cfg: EngineConfig,
    pub(crate) metrics: ProofMetrics,
    pub(crate) relations: Vec<Relation>,
    pub(crate) ors: Vec<OrNode>,
    pub(crate) ands: Vec<AndNode>,
    /// Constant facts, frame state and `does`, by relation.
    pub(crate) ground: FxHashMap<Symbol, RelId>,
    pub(crate) recurrence: Recurrence,
    pub(crate) reuse: ReuseManager,
    pub(crate) roots: Roots,
}

#[derive(Debug, Default)]
pub(crate) struct Roots {
    pub legal: Option<OrId>,
    pub terminal: Option<OrId>,
    pub goals: Vec<OrId>,
    /// Frame relation and its `next` disjunction, in frame order.
    pub next: Vec<(Symbol, Option<OrId>)>,
    pub init: Vec<(Symbol, OrId)>,
}

/// Mutable view of `dst` next to a shared view of `src`.
pub(crate) fn rel_pair(rels: &mut [Relation], dst: RelId, src: RelId) -> (&mut Relation, &Relation) {
    let (d, s) = (dst.index(), src.index());
    debug_assert_ne!(d, s);
    if d < s {
        let (lo, hi) = rels.split_at_mut(s);
        (&mut lo[d], &hi[0])
    } else {
        let (lo, hi) = rels.split_at_mut(d);
        (&mut hi[0], &lo[s])
    }
}

impl ProofGraph {
    pub(crate) fn empty(rules: Arc<RuleSet>, cfg: EngineConfig) -> Self {
        Self {
            rules,
            cfg,
            metrics: ProofMetrics::new(),
            relations: Vec::new(),
            ors: Vec::new(),
            ands: Vec::new(),
            ground: FxHashMap::default(),
            recurrence: Recurrence::default(),
            reuse: ReuseManager::default(),
            roots: Roots::default(),
        }
    }

    pub(crate) fn alloc(&mut self, rel: Relation) -> RelId {
        self.relations.push(rel);
        RelId::new(self.relations.len() - 1)
    }

    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn metrics(&self) -> &ProofMetrics {
        &self.metrics
    }

    pub fn relation(&self, id: RelId) -> &Relation {
        &self.relations[id.index()]
    }

    pub(crate) fn relation_mut(&mut self, id: RelId) -> &mut Relation {
        &mut self.relations[id.index()]
    }

    pub fn or_node(&self, id: OrId) -> &OrNode {
        &self.ors[id.index()]
    }

    pub fn and_node(&self, id: AndId) -> &AndNode {
        &self.ands[id.index()]
    }

    /// Data relation of a disjunction as last proved.
    pub fn data(&self, id: OrId) -> &Relation {
        self.relation(self.ors[id.index()].data)
    }

    pub fn ground_relation(&self, relation: Symbol) -> Option<RelId> {
        self.ground.get(&relation).copied()
    }

    pub fn node_count(&self) -> (usize, usize) {
        (self.ors.len(), self.ands.len())
    }

    /// The conjunction `hops` disjunction levels above `start`.
    fn ancestor_and(&self, mut at: AndId, hops: u32) -> Option<AndId> {
        for _ in 0..hops {
            let or = self.ands[at.index()].parent;
            at = self.ors[or.index()].parent?;
        }
        Some(at)
    }

    /// Source accumulator of a filter attached to conjunction `and`.
    pub(crate) fn resolve_from_and(&self, and: AndId, distance: u32, path: usize) -> Option<RelId> {
        let at = self.ancestor_and(and, distance.checked_sub(1)?)?;
        self.ands[at.index()].paths.get(path).copied()
    }

    /// Source accumulator of a filter attached to disjunction `or` (or to
    /// one of its realizations).
    pub(crate) fn resolve(&self, or: OrId, distance: u32, path: usize) -> Option<RelId> {
        let parent = self.ors[or.index()].parent?;
        self.resolve_from_and(parent, distance, path)
    }

    /// Point every filter of `or` at its current source.
    pub(crate) fn resolve_or_filters(&mut self, or: OrId) {
        let sources: SmallVec<[Option<RelId>; 4]> = self.ors[or.index()]
            .filters
            .iter()
            .map(|f| self.resolve(or, f.distance(), f.path()))
            .collect();
        for (f, src) in self.ors[or.index()].filters.iter_mut().zip(sources) {
            if let Some(src) = src {
                f.set_source(src);
            }
        }
    }

    /// True when a disjunction for `relation` is already being proved on
    /// the chain above conjunction `and`.
    pub(crate) fn on_chain(&self, and: AndId, relation: Symbol) -> bool {
        let mut or = self.ands[and.index()].parent;
        loop {
            let node = &self.ors[or.index()];
            if matches!(node.kind, RootKind::Condition | RootKind::Query) && node.condition.relation == relation {
                return true;
            }
            match node.parent {
                Some(a) => or = self.ands[a.index()].parent,
                None => return false,
            }
        }
    }

    /// Drop every cached shared result. Called whenever the state changes.
    pub fn invalidate_reuse(&mut self) {
        self.reuse.invalidate();
    }
}

impl std::fmt::Debug for ProofGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofGraph")
            .field("relations", &self.relations.len())
            .field("ors", &self.ors.len())
            .field("ands", &self.ands.len())
            .field("shared", &self.reuse.slot_count())
            .finish()
    }
}
