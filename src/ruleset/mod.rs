//! Parsed game rules in the form the compiler consumes.
//!
//! Building a [`RuleSet`] runs four passes over the KIF sentences:
//! classification and body normalization ([`raw`]), argument-domain
//! analysis that flattens nested terms to fixed-width columns and interns
//! every symbol ([`domain`]), body ordering, and the condition index that
//! maps each argument-bound condition to the rules able to answer it
//! ([`specialize`]).

mod domain;
mod raw;
mod specialize;

use std::borrow::Cow;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::Result;
use crate::parser::{parse_kif, Sexpr};
use crate::symbol::{Symbol, SymbolTable};
use crate::trace::debug;

pub use specialize::ConditionKey;

/// Variable of one rule, numbered from zero in order of first occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Arg {
    Const(Symbol),
    Var(Var),
}

impl Arg {
    pub fn as_var(self) -> Option<Var> {
        match self {
            Arg::Var(v) => Some(v),
            Arg::Const(_) => None,
        }
    }
}

/// A relation applied to flattened arguments; `args.len()` is the relation's arity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Atom {
    pub relation: Symbol,
    pub args: Vec<Arg>,
}

impl Atom {
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.args.iter().filter_map(|a| a.as_var())
    }

    /// Position of the first occurrence of `var`.
    pub fn position_of(&self, var: Var) -> Option<usize> {
        self.args.iter().position(|&a| a == Arg::Var(var))
    }

    pub fn has_constants(&self) -> bool {
        self.args.iter().any(|a| matches!(a, Arg::Const(_)))
    }

    pub(crate) fn substitute(&mut self, var: Var, value: Symbol) {
        for arg in &mut self.args {
            if *arg == Arg::Var(var) {
                *arg = Arg::Const(value);
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Condition {
    pub atom: Atom,
    pub negated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Literal {
    Cond(Condition),
    /// The two argument groups are not equal as tuples.
    Distinct(Vec<Arg>, Vec<Arg>),
    /// Exactly one disjunct must hold. At most one per rule body.
    Or(Vec<Condition>),
}

impl Literal {
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> + '_ {
        let (single, many): (Option<&Condition>, &[Condition]) = match self {
            Literal::Cond(c) => (Some(c), &[]),
            Literal::Or(cs) => (None, cs),
            Literal::Distinct(..) => (None, &[]),
        };
        single.into_iter().chain(many.iter())
    }

    /// Variables mentioned anywhere in the literal.
    pub fn vars(&self) -> SmallVec<[Var; 8]> {
        let mut out: SmallVec<[Var; 8]> = SmallVec::new();
        let mut add = |v: Var| {
            if !out.contains(&v) {
                out.push(v);
            }
        };
        match self {
            Literal::Distinct(a, b) => a.iter().chain(b).filter_map(|x| x.as_var()).for_each(&mut add),
            _ => self.conditions().flat_map(|c| c.atom.vars()).for_each(&mut add),
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    pub head: Atom,
    pub body: Vec<Literal>,
    pub var_count: u32,
}

impl Rule {
    /// Replace `var` by `value` everywhere. Returns false when a `distinct`
    /// becomes unsatisfiable; satisfied `distinct`s are removed.
    pub(crate) fn substitute(&mut self, var: Var, value: Symbol) -> bool {
        self.head.substitute(var, value);
        for lit in &mut self.body {
            match lit {
                Literal::Cond(c) => c.atom.substitute(var, value),
                Literal::Or(cs) => cs.iter_mut().for_each(|c| c.atom.substitute(var, value)),
                Literal::Distinct(a, b) => {
                    for x in a.iter_mut().chain(b.iter_mut()) {
                        if *x == Arg::Var(var) {
                            *x = Arg::Const(value);
                        }
                    }
                }
            }
        }
        self.settle_distincts()
    }

    /// Evaluate `distinct`s whose arguments are all constants.
    pub(crate) fn settle_distincts(&mut self) -> bool {
        let mut ok = true;
        self.body.retain(|lit| match lit {
            Literal::Distinct(a, b) if a.iter().chain(b).all(|x| x.as_var().is_none()) => {
                if a == b {
                    ok = false;
                }
                false
            }
            _ => true,
        });
        ok
    }
}

/// Relation names the simulator addresses directly.
#[derive(Clone, Copy, Debug)]
pub struct KeyNames {
    pub role: Symbol,
    pub does: Symbol,
    pub legal: Symbol,
    pub goal: Symbol,
    pub terminal: Symbol,
}

/// Everything the compiler needs to know about one game.
pub struct RuleSet {
    symbols: Arc<SymbolTable>,
    roles: Vec<Symbol>,
    blank: Symbol,
    names: KeyNames,
    arities: FxHashMap<Symbol, usize>,
    constant_facts: IndexMap<Symbol, Vec<Vec<Symbol>>>,
    init_facts: IndexMap<Symbol, Vec<Vec<Symbol>>>,
    rules: IndexMap<Symbol, Vec<Rule>>,
    next_rules: IndexMap<Symbol, Vec<Rule>>,
    init_rules: IndexMap<Symbol, Vec<Rule>>,
    frames: Vec<Symbol>,
    index: FxHashMap<ConditionKey, Vec<Rule>>,
}

impl RuleSet {
    /// Parse and build a game from KIF text.
    pub fn from_kif(text: &str) -> Result<Self> {
        let sentences = parse_kif(text)?;
        Self::from_sentences(&sentences)
    }

    pub fn from_sentences(sentences: &[Sexpr]) -> Result<Self> {
        let game = raw::classify(sentences)?;
        let flat = domain::flatten(game)?;
        let mut set = Self {
            symbols: Arc::new(flat.symbols),
            roles: flat.roles,
            blank: flat.blank,
            names: flat.names,
            arities: flat.arities,
            constant_facts: flat.constant_facts,
            init_facts: flat.init_facts,
            rules: flat.rules,
            next_rules: flat.next_rules,
            init_rules: flat.init_rules,
            frames: Vec::new(),
            index: FxHashMap::default(),
        };
        set.frames = set.collect_frames();
        specialize::order_bodies(&mut set);
        set.index = specialize::condition_index(&set);
        debug!(
            roles = set.roles.len(),
            relations = set.arities.len(),
            conditions = set.index.len(),
            "ruleset built"
        );
        Ok(set)
    }

    fn collect_frames(&self) -> Vec<Symbol> {
        let mut frames: Vec<Symbol> = Vec::new();
        for name in self
            .init_facts
            .keys()
            .chain(self.next_rules.keys())
            .chain(self.init_rules.keys())
        {
            if !frames.contains(name) {
                frames.push(*name);
            }
        }
        frames
    }

    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    pub fn roles(&self) -> &[Symbol] {
        &self.roles
    }

    pub fn blank(&self) -> Symbol {
        self.blank
    }

    pub fn names(&self) -> KeyNames {
        self.names
    }

    pub fn arity(&self, relation: Symbol) -> usize {
        self.arities.get(&relation).copied().unwrap_or(0)
    }

    pub fn constant_facts(&self, relation: Symbol) -> Option<&[Vec<Symbol>]> {
        self.constant_facts.get(&relation).map(Vec::as_slice)
    }

    pub fn constant_relations(&self) -> impl Iterator<Item = (Symbol, &[Vec<Symbol>])> + '_ {
        self.constant_facts.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn init_facts(&self, relation: Symbol) -> Option<&[Vec<Symbol>]> {
        self.init_facts.get(&relation).map(Vec::as_slice)
    }

    /// Ordinary rules defining `relation`.
    pub fn rules(&self, relation: Symbol) -> &[Rule] {
        self.rules.get(&relation).map_or(&[], Vec::as_slice)
    }

    pub fn next_rules(&self, relation: Symbol) -> &[Rule] {
        self.next_rules.get(&relation).map_or(&[], Vec::as_slice)
    }

    pub fn init_rules(&self, relation: Symbol) -> &[Rule] {
        self.init_rules.get(&relation).map_or(&[], Vec::as_slice)
    }

    pub fn next_relations(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.next_rules.keys().copied()
    }

    pub fn init_rule_relations(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.init_rules.keys().copied()
    }

    /// Relations whose content persists across ticks, in state-encoding order.
    pub fn frames(&self) -> &[Symbol] {
        &self.frames
    }

    pub fn is_frame(&self, relation: Symbol) -> bool {
        self.frames.contains(&relation)
    }

    /// Rules able to answer `condition`, specialized to its constants.
    ///
    /// Keys the game's own rules never ask for, such as an ad hoc query
    /// with a bound argument, are specialized on the spot.
    pub fn rules_for_condition(&self, condition: &Atom) -> Cow<'_, [Rule]> {
        let key = ConditionKey::of(condition);
        if key.is_general() {
            return Cow::Borrowed(self.rules(condition.relation));
        }
        match self.index.get(&key) {
            Some(rules) => Cow::Borrowed(rules.as_slice()),
            None => Cow::Owned(key.specialize(self)),
        }
    }

    /// `(legal role ?a..)` for each role, in role order.
    pub fn legal_condition(&self, role: usize) -> Atom {
        self.role_condition(self.names.legal, role)
    }

    /// `(goal role ?v..)` for each role.
    pub fn goal_condition(&self, role: usize) -> Atom {
        self.role_condition(self.names.goal, role)
    }

    fn role_condition(&self, relation: Symbol, role: usize) -> Atom {
        let arity = self.arity(relation).max(1);
        let mut args = vec![Arg::Const(self.roles[role])];
        args.extend((1..arity).map(|i| Arg::Var(Var(i as u32 - 1))));
        Atom { relation, args }
    }

    /// True when proving `from` can require proving `to` through ordinary rules.
    pub fn depends_on(&self, from: Symbol, to: Symbol) -> bool {
        let mut seen = vec![from];
        let mut stack = vec![from];
        while let Some(rel) = stack.pop() {
            for rule in self.rules(rel) {
                for lit in &rule.body {
                    for cond in lit.conditions() {
                        let r = cond.atom.relation;
                        if r == to {
                            return true;
                        }
                        if !seen.contains(&r) {
                            seen.push(r);
                            stack.push(r);
                        }
                    }
                }
            }
        }
        false
    }

    /// Render a flattened tuple of `relation` as KIF text, skipping blanks.
    pub fn render_fact(&self, relation: Symbol, row: &[Symbol]) -> String {
        let mut out = String::from("(");
        out.push_str(self.symbols.lookup(relation).unwrap_or("?"));
        for &sym in row {
            if sym == self.blank {
                continue;
            }
            out.push(' ');
            out.push_str(self.symbols.lookup(sym).unwrap_or("?"));
        }
        out.push(')');
        out
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("roles", &self.roles.len())
            .field("relations", &self.arities.len())
            .field("frames", &self.frames)
            .finish()
    }
}

#[cfg(test)]
mod tests;
