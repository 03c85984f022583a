//! Body ordering and the per-condition rule index.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::{Arg, Atom, Literal, Rule, RuleSet, Var};
use crate::symbol::Symbol;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyArg {
    Const(Symbol),
    Any,
}

/// A condition reduced to its relation and constant arguments. Conditions
/// with equal keys are answered by the same specialized rules.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConditionKey {
    relation: Symbol,
    args: SmallVec<[KeyArg; 6]>,
}

impl ConditionKey {
    pub fn of(atom: &Atom) -> Self {
        Self {
            relation: atom.relation,
            args: atom
                .args
                .iter()
                .map(|a| match a {
                    Arg::Const(s) => KeyArg::Const(*s),
                    Arg::Var(_) => KeyArg::Any,
                })
                .collect(),
        }
    }

    pub fn relation(&self) -> Symbol {
        self.relation
    }

    /// No argument is constant.
    pub fn is_general(&self) -> bool {
        self.args.iter().all(|a| *a == KeyArg::Any)
    }

    /// Specialize `rule` to this key, or `None` when the head cannot match.
    fn apply(&self, rule: &Rule) -> Option<Rule> {
        let mut out = rule.clone();
        for (i, key) in self.args.iter().enumerate() {
            let KeyArg::Const(c) = *key else { continue };
            match out.head.args.get(i).copied()? {
                Arg::Const(d) if d == c => {}
                Arg::Const(_) => return None,
                Arg::Var(v) => {
                    if !out.substitute(v, c) {
                        return None;
                    }
                }
            }
        }
        Some(out)
    }

    /// The relation's rules whose heads can match this key, specialized.
    pub(crate) fn specialize(&self, set: &RuleSet) -> Vec<Rule> {
        set.rules(self.relation)
            .iter()
            .filter_map(|r| self.apply(r))
            .collect()
    }
}

/// Variables a literal binds when proved.
fn binds(lit: &Literal) -> SmallVec<[Var; 8]> {
    match lit {
        Literal::Cond(c) if !c.negated => c.atom.vars().collect(),
        Literal::Or(cs) => {
            let mut common: SmallVec<[Var; 8]> = lit.vars();
            common.retain(|v| cs.iter().all(|c| !c.negated && c.atom.position_of(*v).is_some()));
            common
        }
        _ => SmallVec::new(),
    }
}

fn is_check(lit: &Literal) -> bool {
    match lit {
        Literal::Cond(c) => c.negated,
        Literal::Distinct(..) => true,
        Literal::Or(_) => false,
    }
}

fn ground_size(set: &RuleSet, lit: &Literal) -> Option<usize> {
    match lit {
        Literal::Cond(c) if !c.negated && set.rules(c.atom.relation).is_empty() && !set.is_frame(c.atom.relation) => {
            set.constant_facts(c.atom.relation).map(<[_]>::len)
        }
        _ => None,
    }
}

/// Place checks right after the literal that binds their last variable, and
/// lead with a smaller fact table when it binds nothing the first
/// condition would not.
pub(crate) fn order_body(set: &RuleSet, body: &mut Vec<Literal>) {
    if let Some(first_size) = body.first().and_then(|l| ground_size(set, l)) {
        let first_vars = body[0].vars();
        let better = body
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(i, l)| ground_size(set, l).map(|n| (i, n, l)))
            .filter(|(_, n, l)| *n < first_size && l.vars().iter().all(|v| first_vars.contains(v)))
            .min_by_key(|(_, n, _)| *n)
            .map(|(i, _, _)| i);
        if let Some(i) = better {
            let lit = body.remove(i);
            body.insert(0, lit);
        }
    }

    let mut producers: VecDeque<Literal> = VecDeque::new();
    let mut checks: Vec<Literal> = Vec::new();
    for lit in body.drain(..) {
        if is_check(&lit) {
            checks.push(lit);
        } else {
            producers.push_back(lit);
        }
    }
    let mut bound: FxHashSet<Var> = FxHashSet::default();
    let mut out = Vec::new();
    loop {
        let mut i = 0;
        while i < checks.len() {
            if checks[i].vars().iter().all(|v| bound.contains(v)) {
                out.push(checks.remove(i));
            } else {
                i += 1;
            }
        }
        let Some(lit) = producers.pop_front() else { break };
        bound.extend(binds(&lit));
        out.push(lit);
    }
    out.append(&mut checks);
    *body = out;
}

pub(crate) fn order_bodies(set: &mut RuleSet) {
    let mut rules = set.rules.clone();
    let mut next_rules = set.next_rules.clone();
    let mut init_rules = set.init_rules.clone();
    for rule in rules
        .values_mut()
        .chain(next_rules.values_mut())
        .chain(init_rules.values_mut())
        .flatten()
    {
        order_body(set, &mut rule.body);
    }
    set.rules = rules;
    set.next_rules = next_rules;
    set.init_rules = init_rules;
}

/// Specialized rules for every condition with constants reachable from the
/// game's rules and the per-role `legal`/`goal` queries.
pub(crate) fn condition_index(set: &RuleSet) -> FxHashMap<ConditionKey, Vec<Rule>> {
    let mut index: FxHashMap<ConditionKey, Vec<Rule>> = FxHashMap::default();
    let mut work: Vec<ConditionKey> = Vec::new();
    let push_body = |rules: &[Rule], work: &mut Vec<ConditionKey>| {
        for rule in rules {
            for lit in &rule.body {
                for cond in lit.conditions() {
                    let key = ConditionKey::of(&cond.atom);
                    if !key.is_general() {
                        work.push(key);
                    }
                }
            }
        }
    };
    for rules in set
        .rules
        .values()
        .chain(set.next_rules.values())
        .chain(set.init_rules.values())
    {
        push_body(rules, &mut work);
    }
    for role in 0..set.roles().len() {
        work.push(ConditionKey::of(&set.legal_condition(role)));
        work.push(ConditionKey::of(&set.goal_condition(role)));
    }
    while let Some(key) = work.pop() {
        if index.contains_key(&key) {
            continue;
        }
        let rules = key.specialize(set);
        push_body(&rules, &mut work);
        index.insert(key, rules);
    }
    index
}
