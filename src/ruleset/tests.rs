use super::*;
use crate::test_utils::{ruleset, sym, syms, REACHABILITY, TICTACTOE};

#[test]
fn tictactoe_structure() {
    let set = ruleset(TICTACTOE);
    assert_eq!(set.roles().len(), 2);
    assert_eq!(set.symbols().lookup(set.roles()[0]).unwrap(), "xplayer");

    let cell = sym(&set, "cell");
    let control = sym(&set, "control");
    assert_eq!(set.arity(cell), 3);
    assert_eq!(set.init_facts(cell).map(<[_]>::len), Some(9));
    assert_eq!(set.frames(), &[cell, control]);
    assert_eq!(set.next_rules(cell).len(), 5, "the or of distincts splits in two");

    let legal = set.names().legal;
    assert_eq!(set.arity(legal), 4, "role, mark, row, column");
    assert_eq!(set.arity(set.names().does), 4);
    assert_eq!(set.arity(set.names().terminal), 0);
}

#[test]
fn or_with_distincts_is_split_into_two_rules() {
    let set = ruleset(TICTACTOE);
    let cell = sym(&set, "cell");
    let blank_rules = set
        .next_rules(cell)
        .iter()
        .filter(|r| r.head.args[2] == Arg::Const(sym(&set, "b")))
        .count();
    assert_eq!(blank_rules, 2);
}

#[test]
fn negations_follow_their_bindings() {
    let set = RuleSet::from_kif("(role r) (<= (p ?x) (not (q ?x)) (s ?x)) (s 1) (q 2)").unwrap();
    let p = set.symbols().get("p").unwrap();
    let body = &set.rules(p)[0].body;
    assert!(matches!(&body[0], Literal::Cond(c) if !c.negated));
    assert!(matches!(&body[1], Literal::Cond(c) if c.negated));
}

#[test]
fn distinct_waits_for_both_sides() {
    let set = RuleSet::from_kif("(role r) (<= (p ?x ?y) (distinct ?x ?y) (s ?x) (s ?y)) (s 1)").unwrap();
    let p = set.symbols().get("p").unwrap();
    let body = &set.rules(p)[0].body;
    assert!(matches!(body[2], Literal::Distinct(..)));
}

#[test]
fn smaller_fact_table_leads() {
    let set = RuleSet::from_kif(
        "(role r) (big 1 1) (big 1 2) (big 2 2) (small 1)
         (<= (p ?x ?y) (big ?x ?y) (small ?x))",
    )
    .unwrap();
    let p = set.symbols().get("p").unwrap();
    let Literal::Cond(first) = &set.rules(p)[0].body[0] else {
        panic!("first literal should be a condition");
    };
    assert_eq!(set.symbols().lookup(first.atom.relation).unwrap(), "small");
}

#[test]
fn condition_index_specializes_heads() {
    let set = ruleset(TICTACTOE);
    let x = sym(&set, "x");
    let line = sym(&set, "line");
    let cond = Atom {
        relation: line,
        args: vec![Arg::Const(x)],
    };
    let rules = set.rules_for_condition(&cond);
    assert_eq!(rules.len(), 3);
    assert!(rules.iter().all(|r| r.head.args[0] == Arg::Const(x)));

    let general = Atom {
        relation: line,
        args: vec![Arg::Var(Var(0))],
    };
    assert_eq!(set.rules_for_condition(&general).len(), 3);
}

#[test]
fn unindexed_condition_is_specialized_on_demand() {
    let set = ruleset(REACHABILITY);
    let reach = sym(&set, "reach");
    let d = sym(&set, "d");
    let cond = Atom {
        relation: reach,
        args: vec![Arg::Var(Var(0)), Arg::Const(d)],
    };
    let rules = set.rules_for_condition(&cond);
    assert_eq!(rules.len(), 2);
    assert!(rules.iter().all(|r| r.head.args[1] == Arg::Const(d)));
}

#[test]
fn goal_condition_selects_role_rules() {
    let set = ruleset(TICTACTOE);
    let goal = set.goal_condition(1);
    assert_eq!(goal.args[0], Arg::Const(set.roles()[1]));
    let rules = set.rules_for_condition(&goal);
    assert_eq!(rules.len(), 3);
}

#[test]
fn recursion_is_visible_through_dependencies() {
    let set = ruleset(REACHABILITY);
    let reach = sym(&set, "reach");
    let terminal = set.names().terminal;
    assert!(set.depends_on(reach, reach));
    assert!(set.depends_on(terminal, reach));
    assert!(!set.depends_on(reach, terminal));
}

#[test]
fn render_fact_skips_padding() {
    let set = ruleset(TICTACTOE);
    let row = syms(&set, &["xplayer", "noop"]);
    let mut padded = row.clone();
    padded.extend([set.blank(), set.blank()]);
    assert_eq!(set.render_fact(set.names().legal, &padded), "(legal xplayer noop)");
}

#[test]
fn bad_game_text_is_a_parse_error() {
    assert!(matches!(
        RuleSet::from_kif("(role x"),
        Err(crate::error::GdlError::Parse(_))
    ));
}
