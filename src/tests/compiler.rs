use super::*;
use crate::ruleset::Var;
use crate::test_utils::{ruleset, sym, REACHABILITY, TICTACTOE};

fn compiled(text: &str) -> ProofGraph {
    ProofGraph::compile(ruleset(text), EngineConfig::default()).expect("game should compile")
}

fn ors_for<'a>(graph: &'a ProofGraph, relation: &str) -> Vec<&'a crate::graph::OrNode> {
    let relation = sym(graph.rules(), relation);
    (0..graph.node_count().0)
        .map(|i| graph.or_node(OrId::new(i)))
        .filter(|o| o.relation() == relation)
        .collect()
}

#[test]
fn entry_points_of_tictactoe() {
    let graph = compiled(TICTACTOE);
    assert!(graph.roots.legal.is_some());
    assert!(graph.roots.terminal.is_some());
    assert_eq!(graph.roots.goals.len(), 2);
    assert_eq!(graph.roots.next.len(), 2);
    assert!(graph.roots.next.iter().all(|(_, o)| o.is_some()));
    assert!(graph.roots.init.is_empty());
}

#[test]
fn condition_query_collects_constants_and_ties() {
    let set = ruleset(TICTACTOE);
    let cell = sym(&set, "cell");
    let b = sym(&set, "b");
    let atom = Atom {
        relation: cell,
        args: vec![Arg::Var(Var(0)), Arg::Var(Var(0)), Arg::Const(b)],
    };
    let query = condition_query(&atom).expect("constant and tie");
    assert!(query.pass(&[b, b, b]));
    assert!(!query.pass(&[sym(&set, "1"), sym(&set, "2"), b]));

    let open = general(cell, 3);
    assert!(condition_query(&open).is_none());
}

#[test]
fn game_without_legal_moves_is_rejected() {
    let rules = ruleset("(role r) (init (p 1)) (<= (next (p ?x)) (true (p ?x)))");
    let err = ProofGraph::compile(rules, EngineConfig::default()).unwrap_err();
    assert!(matches!(err, GdlError::Compile(_)));
}

#[test]
fn invalid_config_is_rejected() {
    let cfg = EngineConfig {
        max_ticks: 0,
        ..EngineConfig::default()
    };
    assert!(ProofGraph::compile(ruleset(TICTACTOE), cfg).is_err());
}

#[test]
fn set_facts_needs_ground_storage() {
    let mut graph = compiled(TICTACTOE);
    let line = sym(graph.rules(), "line");
    let err = graph.set_facts::<Vec<Symbol>>(line, &[]).unwrap_err();
    assert!(matches!(err, GdlError::UnknownSymbol(name) if name == "line"));
}

#[test]
fn unfiltered_frame_condition_reads_ground_directly() {
    let graph = compiled(TICTACTOE);
    let ground = graph.ground_relation(sym(graph.rules(), "control")).unwrap();
    let direct = ors_for(&graph, "control")
        .into_iter()
        .find(|o| o.mode() == OrMode::Ground)
        .expect("(true (control ?w)) in legal binds nothing earlier");
    assert_eq!(direct.data, ground);
}

#[test]
fn filtered_frame_condition_starts_learning() {
    let graph = compiled(TICTACTOE);
    // (true (cell ?m 2 ?x)) after (true (cell ?m 1 ?x)) in row
    let learning = ors_for(&graph, "cell")
        .into_iter()
        .filter(|o| o.mode() == OrMode::LearningRewrite)
        .count();
    assert!(learning > 0);
    assert!(ors_for(&graph, "cell")
        .iter()
        .filter(|o| o.mode().is_rewrite())
        .all(|o| !o.filters().is_empty()));
}

#[test]
fn derived_conditions_have_realizations() {
    let graph = compiled(TICTACTOE);
    for node in ors_for(&graph, "line") {
        assert_eq!(node.mode(), OrMode::Derived);
        assert_eq!(node.realizations().len(), 3);
    }
}

#[test]
fn recursive_conditions_become_recurrence_sites() {
    let graph = compiled(REACHABILITY);
    let (_, ands) = graph.node_count();
    let recursive = (0..ands)
        .flat_map(|i| graph.and_node(AndId::new(i)).steps())
        .filter(|s| s.is_recursive())
        .count();
    assert!(recursive > 0);
    assert!((0..ands)
        .flat_map(|i| graph.and_node(AndId::new(i)).steps())
        .filter(|s| s.is_recursive())
        .all(|s| s.child().is_none()));
}

#[test]
fn repeated_unrestricted_conditions_share_a_slot() {
    // `open` appears under terminal and under both 50-point goals.
    let graph = compiled(TICTACTOE);
    assert!(graph.reuse.slot_count() >= 1);
    let linked = ors_for(&graph, "open")
        .into_iter()
        .filter(|o| o.reuse.is_some())
        .count();
    assert!(linked >= 2);
}
