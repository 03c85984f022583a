use super::*;

fn atom(s: &str) -> Sexpr {
    Sexpr::Atom(s.to_string())
}

#[test]
fn parse_atom_and_variable() {
    assert_eq!(parse_one("cell").unwrap(), atom("cell"));
    assert_eq!(parse_one("?x").unwrap(), Sexpr::Var("x".to_string()));
}

#[test]
fn parse_numeric_atom() {
    assert_eq!(parse_one("100").unwrap(), atom("100"));
}

#[test]
fn parse_nested_list() {
    let e = parse_one("(init (cell 1 1 b))").unwrap();
    assert_eq!(
        e,
        Sexpr::List(vec![
            atom("init"),
            Sexpr::List(vec![atom("cell"), atom("1"), atom("1"), atom("b")]),
        ])
    );
    assert_eq!(e.head(), Some("init"));
}

#[test]
fn parse_rule_arrow_is_an_atom() {
    let e = parse_one("(<= (p ?x) (q ?x))").unwrap();
    assert_eq!(e.head(), Some("<="));
}

#[test]
fn comments_and_whitespace_are_skipped() {
    let exprs = parse_kif("; header\n(role x) ; trailing\n\n  (role o)\n").unwrap();
    assert_eq!(exprs.len(), 2);
    assert_eq!(exprs[1].to_string(), "(role o)");
}

#[test]
fn unclosed_paren_reports_opening_position() {
    let err = parse_kif("(role x)\n(init (cell 1").unwrap_err();
    assert_eq!(err.position, 15);
    assert!(err.message.contains("Unclosed"));
}

#[test]
fn stray_close_paren_fails() {
    assert!(parse_kif("(role x))").is_err());
}

#[test]
fn extra_input_after_single_expression_fails() {
    assert!(parse_one("(a) (b)").is_err());
}

#[test]
fn bare_question_mark_fails() {
    assert!(parse_one("(p ? )").is_err());
}

#[test]
fn display_round_trips_text() {
    let text = "(<= (legal ?p noop) (role ?p))";
    assert_eq!(parse_one(text).unwrap().to_string(), text);
}
