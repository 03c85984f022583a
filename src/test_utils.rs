use std::sync::Arc;

use crate::ruleset::RuleSet;
use crate::symbol::Symbol;

pub(crate) const TICTACTOE: &str = include_str!("../games/tictactoe.kif");
pub(crate) const REACHABILITY: &str = include_str!("../games/reachability.kif");

pub(crate) fn ruleset(text: &str) -> Arc<RuleSet> {
    Arc::new(RuleSet::from_kif(text).expect("test game should build"))
}

pub(crate) fn sym(set: &RuleSet, text: &str) -> Symbol {
    set.symbols()
        .get(text)
        .unwrap_or_else(|| panic!("{text} was never interned"))
}

pub(crate) fn syms(set: &RuleSet, texts: &[&str]) -> Vec<Symbol> {
    texts.iter().map(|t| sym(set, t)).collect()
}
