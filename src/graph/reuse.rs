//! Sharing results between disjunctions that answer the same condition.
//!
//! Static disjunctions register under their condition pattern while the
//! graph is compiled. A pattern shared by two or more disjunctions, one of
//! which carries neither filters nor a query, gets one result slot. That
//! unrestricted disjunction is the producer: its first proof in a state
//! fills the slot. Every later proof of any disjunction in the group reads
//! the slot through its own query and filters instead of re-proving.
//!
//! Slots hold state-dependent results and are invalidated whenever frame
//! state or `does` changes.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::recurrence::tie_pattern;
use super::{OrId, OrNode, ProofGraph};
use crate::relation::Relation;
use crate::ruleset::{Atom, ConditionKey};
use crate::trace::debug;

type GroupKey = (ConditionKey, SmallVec<[(usize, usize); 2]>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ReuseLink {
    pub(crate) slot: usize,
    pub(crate) producer: bool,
}

#[derive(Debug, Default)]
struct Slot {
    ready: bool,
    data: Relation,
}

#[derive(Debug, Default)]
pub(crate) struct ReuseManager {
    groups: FxHashMap<GroupKey, Vec<(OrId, bool)>>,
    slots: Vec<Slot>,
    finished: bool,
}

impl ReuseManager {
    /// Record a disjunction for `condition`. Ignored once compilation has finished.
    pub(crate) fn register(&mut self, condition: &Atom, or: OrId, producer: bool) {
        if self.finished {
            return;
        }
        let key = (ConditionKey::of(condition), tie_pattern(condition));
        self.groups.entry(key).or_default().push((or, producer));
    }

    /// Link every group with a producer and at least one other member to a slot.
    pub(crate) fn finish(&mut self, ors: &mut [OrNode]) {
        self.finished = true;
        let mut groups: Vec<Vec<(OrId, bool)>> = std::mem::take(&mut self.groups).into_values().collect();
        groups.sort_by_key(|g| g.first().map(|(o, _)| *o));
        for members in groups {
            if members.len() < 2 || !members.iter().any(|&(_, p)| p) {
                continue;
            }
            let slot = self.slots.len();
            let arity = ors[members[0].0.index()].condition.arity();
            self.slots.push(Slot {
                ready: false,
                data: Relation::new(arity),
            });
            for (or, producer) in members {
                ors[or.index()].reuse = Some(ReuseLink { slot, producer });
            }
        }
        debug!(slots = self.slots.len(), "reuse slots linked");
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn invalidate(&mut self) {
        for slot in &mut self.slots {
            slot.ready = false;
        }
    }

    fn ready(&self, slot: usize) -> Option<&Relation> {
        self.slots.get(slot).filter(|s| s.ready).map(|s| &s.data)
    }

    fn store(&mut self, slot: usize, data: &Relation) {
        if let Some(s) = self.slots.get_mut(slot) {
            s.data.rewrite(data);
            s.ready = true;
        }
    }
}

impl ProofGraph {
    /// Answer `o` from its filled slot, if it has one.
    pub(crate) fn reuse_fill(&mut self, o: OrId) -> Option<bool> {
        let Self {
            ors,
            relations,
            reuse,
            ..
        } = self;
        let node = &mut ors[o.index()];
        let shared = reuse.ready(node.reuse?.slot)?;
        let mut out = std::mem::take(&mut relations[node.own.index()]);
        let query = node.query.as_ref();
        let filters = &mut node.filters;
        let rels: &[Relation] = relations;
        out.rewrite_where(shared, 0..shared.len(), |row| {
            query.map_or(true, |q| q.pass(row))
                && filters.iter_mut().all(|f| match f.source() {
                    Some(src) => f.pass(row, &rels[src.index()]),
                    None => true,
                })
        });
        let proven = !out.is_empty();
        relations[node.own.index()] = out;
        Some(proven)
    }

    /// Publish a producer's freshly proved rows.
    pub(crate) fn reuse_store(&mut self, o: OrId) {
        let node = &self.ors[o.index()];
        if let Some(link) = node.reuse.filter(|l| l.producer) {
            self.reuse.store(link.slot, &self.relations[node.own.index()]);
        }
    }
}
