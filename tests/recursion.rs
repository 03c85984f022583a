use std::collections::BTreeSet;
use std::sync::Arc;

use gdlgraph::ruleset::{Arg, Atom, Var};
use gdlgraph::{EngineConfig, ProofGraph, RuleSet, Symbol};
use proptest::prelude::*;

const NODES: [&str; 6] = ["n0", "n1", "n2", "n3", "n4", "n5"];

fn game(edges: &[(usize, usize)]) -> String {
    let mut text = String::from(
        "(role r)
         (<= (legal r wait) (node ?x))
         (<= (path ?x ?y) (edge ?x ?y))
         (<= (path ?x ?z) (edge ?x ?y) (path ?y ?z))\n",
    );
    for n in NODES {
        text.push_str(&format!("(node {n})\n"));
    }
    for &(a, b) in edges {
        text.push_str(&format!("(edge {} {})\n", NODES[a], NODES[b]));
    }
    text
}

fn closure(edges: &[(usize, usize)]) -> BTreeSet<(usize, usize)> {
    let mut out: BTreeSet<(usize, usize)> = edges.iter().copied().collect();
    loop {
        let extra: Vec<(usize, usize)> = out
            .iter()
            .flat_map(|&(a, b)| out.iter().filter(move |&&(c, _)| c == b).map(move |&(_, d)| (a, d)))
            .filter(|p| !out.contains(p))
            .collect();
        if extra.is_empty() {
            return out;
        }
        out.extend(extra);
    }
}

fn proved_paths(edges: &[(usize, usize)], from: Option<usize>, to: Option<usize>) -> BTreeSet<(usize, usize)> {
    let rules = Arc::new(RuleSet::from_kif(&game(edges)).expect("game builds"));
    let symbols = Arc::clone(rules.symbols());
    let Some(path) = symbols.get("path") else {
        return BTreeSet::new();
    };
    let mut graph = ProofGraph::compile(Arc::clone(&rules), EngineConfig::default()).expect("compiles");
    let arg = |bound: Option<usize>, var: u32| match bound {
        Some(n) => Arg::Const(symbols.get(NODES[n]).expect("node symbol")),
        None => Arg::Var(Var(var)),
    };
    let query = graph.add_query(Atom {
        relation: path,
        args: vec![arg(from, 0), arg(to, 1)],
    });
    if !graph.prove(query) {
        return BTreeSet::new();
    }
    let node_of = |sym: Symbol| {
        let text = symbols.lookup(sym).expect("interned");
        NODES.iter().position(|&n| n == text).expect("a node")
    };
    graph
        .data(query)
        .rows()
        .map(|row| (node_of(row[0]), node_of(row[1])))
        .collect()
}

#[test]
fn chain_closure() {
    let edges = [(0, 1), (1, 2), (2, 3), (3, 4)];
    assert_eq!(proved_paths(&edges, None, None), closure(&edges));
}

#[test]
fn cycle_closure() {
    let edges = [(0, 1), (1, 2), (2, 0), (2, 3)];
    let all = proved_paths(&edges, None, None);
    assert_eq!(all, closure(&edges));
    assert!(all.contains(&(0, 0)) && all.contains(&(2, 3)));
}

#[test]
fn self_loop_closure() {
    let edges = [(4, 4), (4, 5)];
    assert_eq!(proved_paths(&edges, None, None), closure(&edges));
}

#[test]
fn bound_source_closure() {
    let edges = [(0, 1), (1, 2), (2, 1), (3, 4)];
    let expected: BTreeSet<(usize, usize)> = closure(&edges).into_iter().filter(|&(a, _)| a == 1).collect();
    assert_eq!(proved_paths(&edges, Some(1), None), expected);
}

#[test]
fn bound_target_closure() {
    let edges = [(0, 1), (1, 2), (2, 1), (3, 4)];
    let expected: BTreeSet<(usize, usize)> = closure(&edges).into_iter().filter(|&(_, b)| b == 2).collect();
    assert_eq!(proved_paths(&edges, None, Some(2)), expected);
}

#[test]
fn both_ends_bound() {
    let edges = [(0, 1), (1, 2), (2, 1), (3, 4)];
    assert_eq!(proved_paths(&edges, Some(0), Some(2)), BTreeSet::from([(0, 2)]));
    assert!(proved_paths(&edges, Some(2), Some(0)).is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn closure_matches_reference(edges in prop::collection::vec((0usize..6, 0usize..6), 1..10)) {
        prop_assert_eq!(proved_paths(&edges, None, None), closure(&edges));
    }
}
