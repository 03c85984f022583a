use super::*;
use crate::ruleset::Atom;
use crate::symbol::Symbol;

fn c(n: u32) -> Arg {
    Arg::Const(Symbol::from_raw(n))
}

fn v(n: u32) -> Arg {
    Arg::Var(Var(n))
}

fn atom(rel: u32, args: &[Arg]) -> Atom {
    Atom {
        relation: Symbol::from_raw(rel),
        args: args.to_vec(),
    }
}

fn pos(rel: u32, args: &[Arg]) -> Literal {
    Literal::Cond(Condition {
        atom: atom(rel, args),
        negated: false,
    })
}

fn neg(rel: u32, args: &[Arg]) -> Literal {
    Literal::Cond(Condition {
        atom: atom(rel, args),
        negated: true,
    })
}

fn rule(head: Atom, body: Vec<Literal>) -> Rule {
    Rule {
        head,
        body,
        var_count: 8,
    }
}

#[test]
fn join_variable_gets_a_body_column() {
    // (p ?x ?y) <= (q ?x ?z) (r ?z ?y)
    let r = rule(atom(1, &[v(0), v(1)]), vec![pos(2, &[v(0), v(2)]), pos(3, &[v(2), v(1)])]);
    let plan = RulePlan::build(&r);
    assert_eq!(plan.width, 3);
    assert_eq!(plan.column(Var(2)), Some(2));

    assert_eq!(plan.ops[0].kind, MergeKind::Project);
    assert_eq!(plan.ops[0].new.pairs().collect::<Vec<_>>(), vec![(0, 0), (2, 1)]);
    assert_eq!(plan.ops[1].kind, MergeKind::Expand);
    assert_eq!(plan.ops[1].common.pairs().collect::<Vec<_>>(), vec![(2, 0)]);
    assert_eq!(plan.ops[1].new.pairs().collect::<Vec<_>>(), vec![(1, 1)]);
    assert_eq!(plan.ops[1].bound, vec![0, 1, 2]);
}

#[test]
fn single_literal_variable_is_existential() {
    // (p ?x) <= (q ?x ?w)
    let r = rule(atom(1, &[v(0)]), vec![pos(2, &[v(0), v(1)])]);
    let plan = RulePlan::build(&r);
    assert_eq!(plan.width, 1);
    assert_eq!(plan.column(Var(1)), None);
    assert_eq!(plan.ops[0].new.len(), 1);
}

#[test]
fn kinds_follow_variable_split() {
    // (p ?x) <= (q ?x) (s ?x) (not (t ?x)) (u ?y) (w ?y)
    let r = rule(
        atom(1, &[v(0)]),
        vec![
            pos(2, &[v(0)]),
            pos(3, &[v(0)]),
            neg(4, &[v(0)]),
            pos(5, &[v(1)]),
            pos(6, &[v(1)]),
        ],
    );
    let plan = RulePlan::build(&r);
    let kinds: Vec<MergeKind> = plan.ops.iter().map(|o| o.kind).collect();
    assert_eq!(
        kinds,
        vec![
            MergeKind::Project,
            MergeKind::Verify,
            MergeKind::Not,
            MergeKind::Combine,
            MergeKind::Verify
        ]
    );
}

#[test]
fn head_query_fills_repeats_and_constants() {
    // (p ?x ?x 7) <= (q ?x)
    let r = rule(atom(1, &[v(0), v(0), c(7)]), vec![pos(2, &[v(0)])]);
    let plan = RulePlan::build(&r);
    let mut row = vec![Symbol::from_raw(4), Symbol::default(), Symbol::default()];
    plan.head_query.fill(&mut row);
    assert_eq!(row, vec![Symbol::from_raw(4), Symbol::from_raw(4), Symbol::from_raw(7)]);
}

#[test]
fn distinct_rides_on_the_binding_step() {
    // (p ?x ?y) <= (q ?x) (r ?y) (distinct ?x ?y)
    let r = rule(
        atom(1, &[v(0), v(1)]),
        vec![
            pos(2, &[v(0)]),
            pos(3, &[v(1)]),
            Literal::Distinct(vec![v(0)], vec![v(1)]),
        ],
    );
    let plan = RulePlan::build(&r);
    assert!(plan.ops[0].distinct.is_empty());
    assert_eq!(plan.ops[1].distinct.len(), 1);
    assert!(!plan.unsatisfiable);
}

#[test]
fn distinct_of_a_variable_with_itself_never_holds() {
    let r = rule(
        atom(1, &[v(0)]),
        vec![pos(2, &[v(0)]), Literal::Distinct(vec![v(0)], vec![v(0)])],
    );
    assert!(RulePlan::build(&r).unsatisfiable);
}

#[test]
fn distinct_with_different_constants_is_dropped() {
    let r = rule(
        atom(1, &[v(0)]),
        vec![pos(2, &[v(0)]), Literal::Distinct(vec![v(0), c(1)], vec![c(3), c(2)])],
    );
    let plan = RulePlan::build(&r);
    assert!(plan.ops[0].distinct.is_empty());
}

#[test]
fn uniform_disjunction_forks() {
    // (p ?x) <= (or (a ?x) (b ?x))
    let r = rule(
        atom(1, &[v(0)]),
        vec![Literal::Or(vec![
            Condition {
                atom: atom(2, &[v(0)]),
                negated: false,
            },
            Condition {
                atom: atom(3, &[v(0)]),
                negated: false,
            },
        ])],
    );
    assert_eq!(split_disjunctions(&r).len(), 1);
    let plan = RulePlan::build(&r);
    assert_eq!(plan.paths, 2);
    assert_eq!(plan.ops.len(), 3);
    assert_eq!(plan.ops[0].fork_into, 1);
    assert_eq!(plan.ops[1].path, 1);
    assert_eq!(plan.ops[2].kind, MergeKind::ForkReturn);
    assert_eq!(plan.ops[2].path, 1);
    assert_eq!(plan.ops[2].bound, vec![0]);
}

#[test]
fn uneven_disjunction_is_split() {
    // (p ?x ?y) <= (q ?x ?y) (or (a ?x ?z) (b ?z)) (s ?z)
    let r = rule(
        atom(1, &[v(0), v(1)]),
        vec![
            pos(5, &[v(0), v(1)]),
            Literal::Or(vec![
                Condition {
                    atom: atom(2, &[v(0), v(2)]),
                    negated: false,
                },
                Condition {
                    atom: atom(3, &[v(2)]),
                    negated: true,
                },
            ]),
            pos(4, &[v(2)]),
        ],
    );
    let split = split_disjunctions(&r);
    assert_eq!(split.len(), 2);
    assert!(split.iter().all(|r| r.body.iter().all(|l| !matches!(l, Literal::Or(_)))));
}
