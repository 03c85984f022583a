//! Argument domains and flattening of nested terms to fixed-width columns.
//!
//! Every argument position is a *slot* named by its root relation and the
//! path of argument indices leading to it. Slots that can exchange values
//! (through a shared variable, a `distinct`, or `does`/`legal`) are joined
//! into one domain, and the children of joined slots are joined too so that
//! a compound term has the same column layout everywhere it can travel.
//!
//! A domain whose terms are all constants is one column wide. A domain that
//! holds compound terms is laid out as the functor followed by the columns
//! of each argument domain; shorter terms are padded with the blank symbol.
//! Variables of a wide domain become one variable per column (`?x#0`,
//! `?x#1`, ..).

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::raw::{RawAtom, RawGame, RawLit, RawRule, RuleKind, Term};
use super::{Arg, Atom, Condition, KeyNames, Literal, Rule, Var};
use crate::error::{GdlError, Result};
use crate::symbol::{Symbol, SymbolTable};
use crate::trace::debug;

/// Deepest argument path a domain may reach. Deeper means a term is unified
/// with one of its own subterms.
const MAX_NESTING: usize = 16;

pub(crate) struct Flattened {
    pub symbols: SymbolTable,
    pub roles: Vec<Symbol>,
    pub blank: Symbol,
    pub names: KeyNames,
    pub arities: FxHashMap<Symbol, usize>,
    pub constant_facts: IndexMap<Symbol, Vec<Vec<Symbol>>>,
    pub init_facts: IndexMap<Symbol, Vec<Vec<Symbol>>>,
    pub rules: IndexMap<Symbol, Vec<Rule>>,
    pub next_rules: IndexMap<Symbol, Vec<Rule>>,
    pub init_rules: IndexMap<Symbol, Vec<Rule>>,
}

type SlotKey = (String, Vec<u16>);

#[derive(Default)]
struct Slots {
    keys: Vec<SlotKey>,
    lookup: FxHashMap<SlotKey, usize>,
    parent: Vec<usize>,
    /// Most arguments seen in a compound term at this slot.
    fn_arity: Vec<usize>,
}

impl Slots {
    fn slot(&mut self, root: &str, path: Vec<u16>) -> Result<usize> {
        let key = (root.to_string(), path);
        if let Some(&id) = self.lookup.get(&key) {
            return Ok(id);
        }
        if key.1.len() > MAX_NESTING {
            return Err(GdlError::compile(format!(
                "terms under {root} nest without bound"
            )));
        }
        let id = self.keys.len();
        self.keys.push(key.clone());
        self.lookup.insert(key, id);
        self.parent.push(id);
        self.fn_arity.push(0);
        Ok(id)
    }

    fn child(&mut self, slot: usize, i: usize) -> Result<usize> {
        let (root, path) = self.keys[slot].clone();
        let mut path = path;
        path.push(i as u16);
        self.slot(&root, path)
    }

    fn existing_child(&self, slot: usize, i: usize) -> Option<usize> {
        let (root, path) = &self.keys[slot];
        let mut path = path.clone();
        path.push(i as u16);
        self.lookup.get(&(root.clone(), path)).copied()
    }

    fn find(&self, mut x: usize) -> usize {
        while self.parent[x] != x {
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[hi] = lo;
        true
    }

    /// Join children of joined slots until nothing changes.
    fn close(&mut self) -> Result<()> {
        loop {
            let mut changed = false;
            let mut classes: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
            for s in 0..self.keys.len() {
                classes.entry(self.find(s)).or_default().push(s);
            }
            for members in classes.values() {
                let k = members.iter().map(|&m| self.fn_arity[m]).max().unwrap_or(0);
                if k == 0 {
                    continue;
                }
                for &m in members {
                    if self.fn_arity[m] < k {
                        self.fn_arity[m] = k;
                        changed = true;
                    }
                }
                for i in 0..k {
                    let first = self.child(members[0], i)?;
                    for &m in &members[1..] {
                        let c = self.child(m, i)?;
                        changed |= self.union(first, c);
                    }
                }
            }
            if !changed {
                return Ok(());
            }
        }
    }

    fn class_arity(&self, root: usize, members: &FxHashMap<usize, Vec<usize>>) -> usize {
        members
            .get(&root)
            .map_or(0, |ms| ms.iter().map(|&m| self.fn_arity[m]).max().unwrap_or(0))
    }

    /// Column width of every slot, computed per domain.
    fn widths(&self) -> Result<Vec<usize>> {
        let mut members: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for s in 0..self.keys.len() {
            members.entry(self.find(s)).or_default().push(s);
        }
        let mut width: FxHashMap<usize, usize> = FxHashMap::default();
        // Children sit at longer paths, so each round settles at least one
        // more level; a domain that never settles contains itself.
        for _ in 0..=MAX_NESTING + 1 {
            let mut changed = false;
            for (&root, ms) in &members {
                let k = self.class_arity(root, &members);
                let w = if k == 0 {
                    1
                } else {
                    let mut w = 1;
                    for i in 0..k {
                        let child = self
                            .existing_child(ms[0], i)
                            .map(|c| self.find(c))
                            .ok_or_else(|| GdlError::compile("argument domain lost a child"))?;
                        w += width.get(&child).copied().unwrap_or(1);
                    }
                    w
                };
                if width.insert(root, w) != Some(w) {
                    changed = true;
                }
            }
            if !changed {
                return Ok((0..self.keys.len())
                    .map(|s| width.get(&self.find(s)).copied().unwrap_or(1))
                    .collect());
            }
        }
        Err(GdlError::compile("argument domain widths do not converge"))
    }
}

fn root_name(relation: &str) -> &str {
    if relation == "does" {
        "legal"
    } else {
        relation
    }
}

/// Walks the raw game twice in the same order: once to register slots and
/// once to emit flattened atoms. `distinct` literals get synthetic slots
/// numbered in walk order.
struct Registrar {
    slots: Slots,
    raw_arities: FxHashMap<String, usize>,
    distinct_count: usize,
}

impl Registrar {
    fn atom(&mut self, atom: &RawAtom, vars: &mut FxHashMap<String, usize>) -> Result<()> {
        match self.raw_arities.get(root_name(&atom.name)) {
            Some(&n) if n != atom.args.len() => {
                return Err(GdlError::compile(format!(
                    "{} used with {} arguments, expected {n}",
                    atom.name,
                    atom.args.len()
                )))
            }
            Some(_) => {}
            None => {
                self.raw_arities
                    .insert(root_name(&atom.name).to_string(), atom.args.len());
            }
        }
        for (i, arg) in atom.args.iter().enumerate() {
            let slot = self.slots.slot(root_name(&atom.name), vec![i as u16])?;
            self.term(arg, slot, vars)?;
        }
        Ok(())
    }

    fn term(&mut self, term: &Term, slot: usize, vars: &mut FxHashMap<String, usize>) -> Result<()> {
        match term {
            Term::Const(_) => Ok(()),
            Term::Var(name) => {
                if let Some(&first) = vars.get(name) {
                    self.slots.union(first, slot);
                } else {
                    vars.insert(name.clone(), slot);
                }
                Ok(())
            }
            Term::Fn(_, args) => {
                self.slots.fn_arity[slot] = self.slots.fn_arity[slot].max(args.len());
                for (i, arg) in args.iter().enumerate() {
                    let child = self.slots.child(slot, i)?;
                    self.term(arg, child, vars)?;
                }
                Ok(())
            }
        }
    }

    fn distinct_slot(&mut self) -> Result<usize> {
        let root = format!("distinct {}", self.distinct_count);
        self.distinct_count += 1;
        self.slots.slot(&root, Vec::new())
    }

    fn rule(&mut self, rule: &RawRule) -> Result<()> {
        let mut vars = FxHashMap::default();
        self.atom(&rule.head, &mut vars)?;
        for lit in &rule.body {
            self.literal(lit, &mut vars)?;
        }
        Ok(())
    }

    fn literal(&mut self, lit: &RawLit, vars: &mut FxHashMap<String, usize>) -> Result<()> {
        match lit {
            RawLit::Atom { atom, .. } => self.atom(atom, vars),
            RawLit::Distinct(a, b) => {
                let slot = self.distinct_slot()?;
                self.term(a, slot, vars)?;
                self.term(b, slot, vars)
            }
            RawLit::Or(ds) => ds.iter().try_for_each(|d| self.literal(d, vars)),
            RawLit::Same(..) => Err(GdlError::compile("unresolved equality in rule body")),
        }
    }
}

fn intern_term(symbols: &SymbolTable, term: &Term) {
    match term {
        Term::Const(c) => {
            symbols.intern(c);
        }
        Term::Var(_) => {}
        Term::Fn(f, args) => {
            symbols.intern(f);
            args.iter().for_each(|a| intern_term(symbols, a));
        }
    }
}

fn intern_atom(symbols: &SymbolTable, atom: &RawAtom) {
    symbols.intern(&atom.name);
    atom.args.iter().for_each(|a| intern_term(symbols, a));
}

fn intern_literal(symbols: &SymbolTable, lit: &RawLit) {
    match lit {
        RawLit::Atom { atom, .. } => intern_atom(symbols, atom),
        RawLit::Distinct(a, b) | RawLit::Same(a, b) => {
            intern_term(symbols, a);
            intern_term(symbols, b);
        }
        RawLit::Or(ds) => ds.iter().for_each(|d| intern_literal(symbols, d)),
    }
}

/// Second walk: emit flattened atoms.
struct Emitter<'a> {
    slots: &'a Slots,
    widths: Vec<usize>,
    symbols: &'a SymbolTable,
    blank: Symbol,
    distinct_count: usize,
}

impl Emitter<'_> {
    fn sym(&self, text: &str) -> Symbol {
        self.symbols.intern(text)
    }

    fn top_slot(&self, relation: &str, i: usize) -> Result<usize> {
        self.slots
            .lookup
            .get(&(root_name(relation).to_string(), vec![i as u16]))
            .copied()
            .ok_or_else(|| GdlError::compile(format!("no domain for {relation}[{i}]")))
    }

    fn atom(&self, atom: &RawAtom, vars: &mut VarNames) -> Result<Atom> {
        let mut args = Vec::new();
        for (i, term) in atom.args.iter().enumerate() {
            let slot = self.top_slot(&atom.name, i)?;
            self.term(term, slot, vars, &mut args)?;
        }
        Ok(Atom {
            relation: self.sym(&atom.name),
            args,
        })
    }

    fn term(&self, term: &Term, slot: usize, vars: &mut VarNames, out: &mut Vec<Arg>) -> Result<()> {
        let width = self.widths[slot];
        match term {
            Term::Const(c) => {
                out.push(Arg::Const(self.sym(c)));
                out.extend((1..width).map(|_| Arg::Const(self.blank)));
            }
            Term::Var(name) if width == 1 => out.push(Arg::Var(vars.get(name))),
            Term::Var(name) => {
                out.extend((0..width).map(|k| Arg::Var(vars.get(&format!("{name}#{k}")))));
            }
            Term::Fn(f, args) => {
                let start = out.len();
                out.push(Arg::Const(self.sym(f)));
                for i in 0..self.slots.fn_arity[slot] {
                    let child = self
                        .slots
                        .existing_child(slot, i)
                        .ok_or_else(|| GdlError::compile(format!("no domain for argument {i} of {f}")))?;
                    match args.get(i) {
                        Some(arg) => self.term(arg, child, vars, out)?,
                        None => out.extend((0..self.widths[child]).map(|_| Arg::Const(self.blank))),
                    }
                }
                while out.len() - start < width {
                    out.push(Arg::Const(self.blank));
                }
            }
        }
        Ok(())
    }

    fn condition(&self, lit: &RawLit, vars: &mut VarNames) -> Result<Condition> {
        match lit {
            RawLit::Atom { atom, negated } => Ok(Condition {
                atom: self.atom(atom, vars)?,
                negated: *negated,
            }),
            _ => Err(GdlError::compile("only atoms may appear inside or")),
        }
    }

    fn rule(&mut self, rule: &RawRule) -> Result<Option<Rule>> {
        let mut vars = VarNames::default();
        let head = self.atom(&rule.head, &mut vars)?;
        let mut body = Vec::with_capacity(rule.body.len());
        for lit in &rule.body {
            body.push(match lit {
                RawLit::Atom { .. } => Literal::Cond(self.condition(lit, &mut vars)?),
                RawLit::Distinct(a, b) => {
                    let root = format!("distinct {}", self.distinct_count);
                    self.distinct_count += 1;
                    let slot = self
                        .slots
                        .lookup
                        .get(&(root, Vec::new()))
                        .copied()
                        .ok_or_else(|| GdlError::compile("distinct lost its domain"))?;
                    let mut left = Vec::new();
                    let mut right = Vec::new();
                    self.term(a, slot, &mut vars, &mut left)?;
                    self.term(b, slot, &mut vars, &mut right)?;
                    Literal::Distinct(left, right)
                }
                RawLit::Or(ds) => Literal::Or(
                    ds.iter()
                        .map(|d| self.condition(d, &mut vars))
                        .collect::<Result<Vec<_>>>()?,
                ),
                RawLit::Same(..) => return Err(GdlError::compile("unresolved equality in rule body")),
            });
        }
        let mut rule = Rule {
            head,
            body,
            var_count: vars.count(),
        };
        Ok(rule.settle_distincts().then_some(rule))
    }

    fn ground(&self, atom: &RawAtom) -> Result<Vec<Symbol>> {
        let mut vars = VarNames::default();
        let flat = self.atom(atom, &mut vars)?;
        flat.args
            .into_iter()
            .map(|a| match a {
                Arg::Const(s) => Ok(s),
                Arg::Var(_) => Err(GdlError::compile(format!("fact {} is not ground", atom.name))),
            })
            .collect()
    }
}

#[derive(Default)]
struct VarNames {
    ids: FxHashMap<String, Var>,
}

impl VarNames {
    fn get(&mut self, name: &str) -> Var {
        let next = Var(self.ids.len() as u32);
        *self.ids.entry(name.to_string()).or_insert(next)
    }

    fn count(&self) -> u32 {
        self.ids.len() as u32
    }
}

pub(crate) fn flatten(game: RawGame) -> Result<Flattened> {
    if game.roles.is_empty() {
        return Err(GdlError::compile("game declares no roles"));
    }
    let mut registrar = Registrar {
        slots: Slots::default(),
        raw_arities: FxHashMap::default(),
        distinct_count: 0,
    };
    for fact in game.facts.iter().chain(&game.init_facts) {
        registrar.atom(fact, &mut FxHashMap::default())?;
    }
    for rule in &game.rules {
        registrar.rule(rule)?;
    }
    registrar.slots.close()?;
    let widths = registrar.slots.widths()?;

    let mut symbols = SymbolTable::new();
    let mut roles = Vec::with_capacity(game.roles.len());
    for role in &game.roles {
        let sym = symbols.intern(role);
        if roles.contains(&sym) {
            return Err(GdlError::compile(format!("role {role} declared twice")));
        }
        roles.push(sym);
    }
    let names = KeyNames {
        role: symbols.intern("role"),
        does: symbols.intern("does"),
        legal: symbols.intern("legal"),
        goal: symbols.intern("goal"),
        terminal: symbols.intern("terminal"),
    };
    for fact in game.facts.iter().chain(&game.init_facts) {
        intern_atom(&symbols, fact);
    }
    for rule in &game.rules {
        intern_atom(&symbols, &rule.head);
        rule.body.iter().for_each(|l| intern_literal(&symbols, l));
    }
    let blank = symbols.intern_blank();

    let mut arities = FxHashMap::default();
    for name in registrar.raw_arities.keys().map(String::as_str).chain(["does"]) {
        let raw = registrar.raw_arities.get(root_name(name)).copied().unwrap_or(0);
        let width: usize = (0..raw)
            .map(|i| {
                registrar
                    .slots
                    .lookup
                    .get(&(root_name(name).to_string(), vec![i as u16]))
                    .map_or(1, |&slot| widths[slot])
            })
            .sum();
        arities.insert(symbols.intern(name), width);
    }

    let mut emitter = Emitter {
        slots: &registrar.slots,
        widths,
        symbols: &symbols,
        blank,
        distinct_count: 0,
    };
    let mut constant_facts: IndexMap<Symbol, Vec<Vec<Symbol>>> = IndexMap::new();
    for fact in &game.facts {
        let row = emitter.ground(fact)?;
        let rows = constant_facts.entry(symbols.intern(&fact.name)).or_default();
        if !rows.contains(&row) {
            rows.push(row);
        }
    }
    let mut init_facts: IndexMap<Symbol, Vec<Vec<Symbol>>> = IndexMap::new();
    for fact in &game.init_facts {
        let row = emitter.ground(fact)?;
        let rows = init_facts.entry(symbols.intern(&fact.name)).or_default();
        if !rows.contains(&row) {
            rows.push(row);
        }
    }
    let mut rules: IndexMap<Symbol, Vec<Rule>> = IndexMap::new();
    let mut next_rules: IndexMap<Symbol, Vec<Rule>> = IndexMap::new();
    let mut init_rules: IndexMap<Symbol, Vec<Rule>> = IndexMap::new();
    for raw in &game.rules {
        let Some(rule) = emitter.rule(raw)? else {
            debug!(head = %raw.head.name, "rule can never fire, dropped");
            continue;
        };
        let target = match raw.kind {
            RuleKind::Ordinary => &mut rules,
            RuleKind::Next => &mut next_rules,
            RuleKind::Init => &mut init_rules,
        };
        target.entry(rule.head.relation).or_default().push(rule);
    }

    Ok(Flattened {
        symbols,
        roles,
        blank,
        names,
        arities,
        constant_facts,
        init_facts,
        rules,
        next_rules,
        init_rules,
    })
}
