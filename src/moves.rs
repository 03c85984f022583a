//! Legal moves: bucketing proved `legal` rows per player, rendering them as
//! KIF text, and matching scripted move text back to a row.
//!
//! A `legal` row is the role in column 0 followed by the flattened action:
//! the action name in column 1 and its arguments after it, padded with the
//! blank symbol. The same layout is what gets written to `does`.

use rustc_hash::FxHashSet;

use crate::error::{GdlError, Result};
use crate::parser::{parse_kif, parse_one, Sexpr};
use crate::relation::Relation;
use crate::ruleset::RuleSet;
use crate::symbol::Symbol;

/// One legal move of one player, as its full `legal` row.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    row: Vec<Symbol>,
}

impl Move {
    pub fn from_row(row: &[Symbol]) -> Self {
        Self { row: row.to_vec() }
    }

    pub fn role(&self) -> Symbol {
        self.row[0]
    }

    /// The row as written to `does`.
    pub fn row(&self) -> &[Symbol] {
        &self.row
    }

    /// Action name followed by its columns, blanks included.
    pub fn action(&self) -> &[Symbol] {
        &self.row[1..]
    }

    /// `name` or `(name args..)`, skipping blanks.
    pub fn render_action(&self, set: &RuleSet) -> String {
        let symbols = set.symbols();
        let name = self
            .row
            .get(1)
            .and_then(|&s| symbols.lookup(s).ok())
            .unwrap_or("?");
        let args: Vec<&str> = self
            .row
            .iter()
            .skip(2)
            .filter(|&&s| s != set.blank())
            .map(|&s| symbols.lookup(s).unwrap_or("?"))
            .collect();
        if args.is_empty() {
            return name.to_string();
        }
        format!("({name} {})", args.join(" "))
    }

    /// `(role action)`.
    pub fn render(&self, set: &RuleSet) -> String {
        let role = set.symbols().lookup(self.role()).unwrap_or("?");
        format!("({role} {})", self.render_action(set))
    }

    /// True when `tokens` spell this move's action, blanks ignored.
    fn matches(&self, set: &RuleSet, tokens: &[String]) -> bool {
        let symbols = set.symbols();
        let mut own = self
            .row
            .iter()
            .skip(1)
            .filter(|&&s| s != set.blank())
            .map(|&s| symbols.lookup(s).unwrap_or(""));
        let mut given = tokens.iter();
        loop {
            match (own.next(), given.next()) {
                (None, None) => return true,
                (Some(a), Some(b)) if a.eq_ignore_ascii_case(b) => {}
                _ => return false,
            }
        }
    }
}

/// Split proved `legal` rows into one list per player, dropping duplicates
/// and rows naming something other than a role.
pub fn bucket(legal: &Relation, players: usize) -> Vec<Vec<Move>> {
    let mut out: Vec<Vec<Move>> = vec![Vec::new(); players];
    let mut seen: FxHashSet<&[Symbol]> = FxHashSet::default();
    for row in legal.rows() {
        let Some(&role) = row.first() else {
            continue;
        };
        if role.index() >= players || !seen.insert(row) {
            continue;
        }
        out[role.index()].push(Move::from_row(row));
    }
    out
}

fn flatten_tokens(expr: &Sexpr, out: &mut Vec<String>) {
    match expr {
        Sexpr::Atom(a) => out.push(a.clone()),
        Sexpr::Var(v) => out.push(format!("?{v}")),
        Sexpr::List(items) => items.iter().for_each(|e| flatten_tokens(e, out)),
    }
}

/// Index of the move in `moves` spelled by `action`, e.g. `(mark 1 1)`. A
/// player with a single legal move plays it whatever the text says.
pub fn find_move(set: &RuleSet, moves: &[Move], action: &str) -> Result<Option<usize>> {
    if moves.len() == 1 {
        return Ok(Some(0));
    }
    let mut tokens = Vec::new();
    flatten_tokens(&parse_one(action.trim())?, &mut tokens);
    Ok(moves.iter().position(|m| m.matches(set, &tokens)))
}

/// Split one line of a scripted game into per-player action texts, in role
/// order. Groups written `(role action)` are assigned by role name; any
/// other group goes to the next player without an action.
pub fn parse_joint_move(set: &RuleSet, line: &str) -> Result<Vec<String>> {
    let players = set.roles().len();
    let mut actions: Vec<Option<String>> = vec![None; players];
    let mut positional = Vec::new();
    for group in parse_kif(line)? {
        let by_role = group.list().and_then(|items| match items {
            [role, action] => {
                let role = role.atom()?;
                let player = set.roles().iter().position(|&r| {
                    set.symbols()
                        .lookup(r)
                        .is_ok_and(|name| name.eq_ignore_ascii_case(role))
                })?;
                Some((player, action.to_string()))
            }
            _ => None,
        });
        match by_role {
            Some((player, action)) if actions[player].is_none() => actions[player] = Some(action),
            _ => positional.push(group.to_string()),
        }
    }
    let mut positional = positional.into_iter();
    for slot in actions.iter_mut().filter(|a| a.is_none()) {
        *slot = positional.next();
    }
    actions
        .into_iter()
        .enumerate()
        .map(|(player, action)| {
            action.ok_or_else(|| GdlError::InvalidMove {
                player,
                text: line.trim().to_string(),
            })
        })
        .collect()
}
