//! Sentence classification and body normalization on uninterned terms.

use crate::error::{GdlError, Result};
use crate::parser::Sexpr;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Term {
    Const(String),
    Var(String),
    Fn(String, Vec<Term>),
}

impl Term {
    fn substitute(&mut self, var: &str, value: &Term) {
        match self {
            Term::Var(v) if v == var => *self = value.clone(),
            Term::Fn(_, args) => args.iter_mut().for_each(|a| a.substitute(var, value)),
            _ => {}
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RawAtom {
    pub name: String,
    pub args: Vec<Term>,
}

impl RawAtom {
    fn substitute(&mut self, var: &str, value: &Term) {
        self.args.iter_mut().for_each(|a| a.substitute(var, value));
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RawLit {
    Atom { atom: RawAtom, negated: bool },
    Distinct(Term, Term),
    /// `(not (distinct a b))`, removed by substitution.
    Same(Term, Term),
    Or(Vec<RawLit>),
}

impl RawLit {
    fn substitute(&mut self, var: &str, value: &Term) {
        match self {
            RawLit::Atom { atom, .. } => atom.substitute(var, value),
            RawLit::Distinct(a, b) | RawLit::Same(a, b) => {
                a.substitute(var, value);
                b.substitute(var, value);
            }
            RawLit::Or(lits) => lits.iter_mut().for_each(|l| l.substitute(var, value)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RuleKind {
    Ordinary,
    Next,
    Init,
}

#[derive(Clone, Debug)]
pub(crate) struct RawRule {
    pub kind: RuleKind,
    pub head: RawAtom,
    pub body: Vec<RawLit>,
}

#[derive(Debug, Default)]
pub(crate) struct RawGame {
    pub roles: Vec<String>,
    pub facts: Vec<RawAtom>,
    pub init_facts: Vec<RawAtom>,
    pub rules: Vec<RawRule>,
}

fn compile_err(what: &str, expr: &Sexpr) -> GdlError {
    GdlError::compile(format!("{what}: {expr}"))
}

fn term_of(expr: &Sexpr) -> Result<Term> {
    match expr {
        Sexpr::Atom(a) => Ok(Term::Const(a.clone())),
        Sexpr::Var(v) => Ok(Term::Var(v.clone())),
        Sexpr::List(items) => {
            let (head, args) = items
                .split_first()
                .ok_or_else(|| compile_err("empty term", expr))?;
            let name = head
                .atom()
                .ok_or_else(|| compile_err("term head must be a constant", expr))?;
            let args = args.iter().map(term_of).collect::<Result<Vec<_>>>()?;
            Ok(Term::Fn(name.to_string(), args))
        }
    }
}

fn atom_of(expr: &Sexpr) -> Result<RawAtom> {
    match term_of(expr)? {
        Term::Const(name) => Ok(RawAtom { name, args: Vec::new() }),
        Term::Fn(name, args) => Ok(RawAtom { name, args }),
        Term::Var(_) => Err(compile_err("a sentence cannot be a variable", expr)),
    }
}

fn single_arg<'a>(items: &'a [Sexpr], expr: &Sexpr) -> Result<&'a Sexpr> {
    match items {
        [_, arg] => Ok(arg),
        _ => Err(compile_err("expected exactly one argument", expr)),
    }
}

/// Literals of one body conjunct; negation may expand into several.
fn literals_of(expr: &Sexpr, negated: bool, out: &mut Vec<RawLit>) -> Result<()> {
    let items = expr.list().unwrap_or(&[]);
    match expr.head() {
        Some("not") => literals_of(single_arg(items, expr)?, !negated, out),
        Some("true") => {
            let atom = atom_of(single_arg(items, expr)?)?;
            out.push(RawLit::Atom { atom, negated });
            Ok(())
        }
        Some("distinct") if items.len() == 3 => {
            let a = term_of(&items[1])?;
            let b = term_of(&items[2])?;
            out.push(if negated {
                RawLit::Same(a, b)
            } else {
                RawLit::Distinct(a, b)
            });
            Ok(())
        }
        Some("and") if !negated => {
            for item in &items[1..] {
                literals_of(item, false, out)?;
            }
            Ok(())
        }
        Some("or") if negated => {
            for item in &items[1..] {
                literals_of(item, true, out)?;
            }
            Ok(())
        }
        Some("or") => {
            let mut disjuncts = Vec::new();
            for item in &items[1..] {
                let mut lits = Vec::new();
                literals_of(item, false, &mut lits)?;
                match lits.len() {
                    1 => match lits.pop() {
                        Some(RawLit::Or(inner)) => disjuncts.extend(inner),
                        Some(lit) => disjuncts.push(lit),
                        None => {}
                    },
                    _ => return Err(compile_err("conjunction inside or is not supported", item)),
                }
            }
            out.push(RawLit::Or(disjuncts));
            Ok(())
        }
        _ => {
            out.push(RawLit::Atom {
                atom: atom_of(expr)?,
                negated,
            });
            Ok(())
        }
    }
}

/// Sort sentences into roles, facts, initial facts and rules.
pub(crate) fn classify(sentences: &[Sexpr]) -> Result<RawGame> {
    let mut game = RawGame::default();
    for sentence in sentences {
        let items = sentence.list().unwrap_or(&[]);
        match sentence.head() {
            Some("role") => {
                let role = single_arg(items, sentence)?
                    .atom()
                    .ok_or_else(|| compile_err("role must be a constant", sentence))?;
                game.roles.push(role.to_string());
                game.facts.push(atom_of(sentence)?);
            }
            Some("init") => game.init_facts.push(atom_of(single_arg(items, sentence)?)?),
            Some("base") | Some("input") => {}
            Some("<=") => {
                if let Some(rule) = rule_of(sentence, items)? {
                    game.rules.push(rule);
                }
            }
            _ => {
                let fact = atom_of(sentence)?;
                if fact.args.iter().any(contains_var) {
                    return Err(compile_err("facts must be ground", sentence));
                }
                game.facts.push(fact);
            }
        }
    }
    let mut rules = Vec::with_capacity(game.rules.len());
    for rule in game.rules.drain(..) {
        normalize(rule, &mut rules);
    }
    game.rules = rules;
    Ok(game)
}

fn contains_var(term: &Term) -> bool {
    match term {
        Term::Var(_) => true,
        Term::Const(_) => false,
        Term::Fn(_, args) => args.iter().any(contains_var),
    }
}

fn rule_of(sentence: &Sexpr, items: &[Sexpr]) -> Result<Option<RawRule>> {
    let head_expr = items
        .get(1)
        .ok_or_else(|| compile_err("rule without head", sentence))?;
    let (kind, head) = match head_expr.head() {
        Some("init") => (RuleKind::Init, atom_of(single_arg(head_expr.list().unwrap_or(&[]), head_expr)?)?),
        Some("next") => (RuleKind::Next, atom_of(single_arg(head_expr.list().unwrap_or(&[]), head_expr)?)?),
        Some("base") | Some("input") => return Ok(None),
        _ => (RuleKind::Ordinary, atom_of(head_expr)?),
    };
    let mut body = Vec::new();
    for lit in &items[2..] {
        literals_of(lit, false, &mut body)?;
    }
    Ok(Some(RawRule { kind, head, body }))
}

/// Bring one rule into the shape the compiler handles, pushing the results:
/// no `(not (distinct ..))`, no `distinct` inside `or`, at most one `or`.
pub(crate) fn normalize(mut rule: RawRule, out: &mut Vec<RawRule>) {
    if !remove_equalities(&mut rule) {
        return;
    }
    rule.body = rule
        .body
        .into_iter()
        .filter_map(|lit| match lit {
            RawLit::Or(mut ds) if ds.len() == 1 => ds.pop(),
            RawLit::Or(ds) if ds.is_empty() => None,
            other => Some(other),
        })
        .collect();

    let split_at = rule.body.iter().position(|lit| match lit {
        RawLit::Or(ds) => ds.iter().any(|d| matches!(d, RawLit::Distinct(..) | RawLit::Same(..))),
        _ => false,
    });
    if let Some(i) = split_at {
        let RawLit::Or(disjuncts) = rule.body[i].clone() else {
            return;
        };
        let (special, plain): (Vec<RawLit>, Vec<RawLit>) = disjuncts
            .into_iter()
            .partition(|d| matches!(d, RawLit::Distinct(..) | RawLit::Same(..)));
        for d in special {
            let mut clone = rule.clone();
            clone.body[i] = d;
            normalize(clone, out);
        }
        if !plain.is_empty() {
            let mut clone = rule;
            clone.body[i] = RawLit::Or(plain);
            normalize(clone, out);
        }
        return;
    }

    let ors: Vec<usize> = rule
        .body
        .iter()
        .enumerate()
        .filter(|(_, l)| matches!(l, RawLit::Or(_)))
        .map(|(i, _)| i)
        .collect();
    if ors.len() > 1 {
        let i = ors[0];
        let RawLit::Or(disjuncts) = rule.body[i].clone() else {
            return;
        };
        for d in disjuncts {
            let mut clone = rule.clone();
            clone.body[i] = d;
            normalize(clone, out);
        }
        return;
    }
    out.push(rule);
}

/// Apply every top-level `(not (distinct a b))` as a substitution.
/// Returns false when the rule can never fire.
fn remove_equalities(rule: &mut RawRule) -> bool {
    while let Some(i) = rule.body.iter().position(|l| matches!(l, RawLit::Same(..))) {
        let RawLit::Same(a, b) = rule.body.remove(i) else {
            continue;
        };
        let (var, value) = match (&a, &b) {
            (_, Term::Var(v)) => (v.clone(), a.clone()),
            (Term::Var(v), _) => (v.clone(), b.clone()),
            _ => {
                if a == b {
                    continue;
                }
                return false;
            }
        };
        if value == Term::Var(var.clone()) {
            continue;
        }
        rule.head.substitute(&var, &value);
        rule.body.iter_mut().for_each(|l| l.substitute(&var, &value));
    }
    true
}
