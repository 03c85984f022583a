use super::*;

fn s(n: u32) -> Symbol {
    Symbol::from_raw(n)
}

fn rel(arity: usize, rows: &[&[u32]]) -> Relation {
    let rows: Vec<Vec<Symbol>> = rows
        .iter()
        .map(|r| r.iter().map(|&n| s(n)).collect())
        .collect();
    Relation::from_rows(arity, &rows)
}

fn rows(r: &Relation) -> Vec<Vec<u32>> {
    let mut out: Vec<Vec<u32>> = r.rows().map(|row| row.iter().map(|x| x.raw()).collect()).collect();
    out.sort();
    out
}

#[test]
fn choose_follows_variable_split() {
    assert_eq!(MergeKind::choose(true, 2, 0, false), MergeKind::Not);
    assert_eq!(MergeKind::choose(false, 0, 2, true), MergeKind::Verify);
    assert_eq!(MergeKind::choose(false, 1, 1, true), MergeKind::Expand);
    assert_eq!(MergeKind::choose(false, 1, 0, true), MergeKind::Combine);
    assert_eq!(MergeKind::choose(false, 1, 0, false), MergeKind::Project);
}

#[test]
fn project_writes_mapped_columns() {
    // (q ?y ?x) projected into row layout [x, y]
    let source = rel(2, &[&[1, 2], &[3, 4]]);
    let mut acc = Relation::new(2);
    let new = ColumnMapping::from_pairs([(0, 1), (1, 0)]);
    assert!(project(&mut acc, &source, &new, admit_all));
    assert_eq!(rows(&acc), vec![vec![2, 1], vec![4, 3]]);
}

#[test]
fn project_with_check_filters_while_building() {
    let source = rel(1, &[&[1], &[2], &[3]]);
    let mut acc = Relation::new(1);
    let new = ColumnMapping::from_pairs([(0, 0)]);
    assert!(project(&mut acc, &source, &new, |row: &[Symbol]| row[0] != s(2)));
    assert_eq!(rows(&acc), vec![vec![1], vec![3]]);
    assert!(!project(&mut acc, &source, &new, |_: &[Symbol]| false));
}

#[test]
fn combine_is_cross_product() {
    let mut acc = rel(2, &[&[1, 0], &[2, 0]]);
    let source = rel(1, &[&[7], &[8]]);
    let new = ColumnMapping::from_pairs([(1, 0)]);
    assert!(combine(&mut acc, &source, &new, admit_all));
    acc.finalize_deletion();
    assert_eq!(rows(&acc), vec![vec![1, 7], vec![1, 8], vec![2, 7], vec![2, 8]]);
}

#[test]
fn expand_overwrites_first_match_and_appends_rest() {
    // acc [x, y]; source (edge ?x ?y) joined on x.
    let mut acc = rel(2, &[&[1, 0], &[2, 0], &[3, 0]]);
    let source = rel(2, &[&[1, 10], &[1, 11], &[3, 30]]);
    let new = ColumnMapping::from_pairs([(1, 1)]);
    let common = ColumnMapping::from_pairs([(0, 0)]);
    assert!(expand(&mut acc, &source, &new, &common, admit_all));
    assert_eq!(acc.row(0), &[s(1), s(10)]);
    acc.finalize_deletion();
    assert_eq!(rows(&acc), vec![vec![1, 10], vec![1, 11], vec![3, 30]]);
}

#[test]
fn expand_without_matches_fails() {
    let mut acc = rel(2, &[&[5, 0]]);
    let source = rel(2, &[&[1, 10]]);
    let new = ColumnMapping::from_pairs([(1, 1)]);
    let common = ColumnMapping::from_pairs([(0, 0)]);
    assert!(!expand(&mut acc, &source, &new, &common, admit_all));
    acc.finalize_deletion();
    assert!(acc.is_empty());
}

#[test]
fn verify_and_negate_partition_rows() {
    let acc = rel(1, &[&[1], &[2], &[3]]);
    let source = rel(1, &[&[2], &[9]]);
    let common = ColumnMapping::from_pairs([(0, 0)]);

    let mut kept = acc.clone();
    assert!(verify(&mut kept, &source, &common, admit_all));
    kept.finalize_deletion();
    assert_eq!(rows(&kept), vec![vec![2]]);

    let mut dropped = acc.clone();
    assert!(negate(&mut dropped, &source, &common, true, admit_all));
    dropped.finalize_deletion();
    assert_eq!(rows(&dropped), vec![vec![1], vec![3]]);
}

#[test]
fn unshared_verify_and_negate_only_test_the_condition() {
    let mut acc = rel(1, &[&[1]]);
    let empty = Relation::new(1);
    let full = rel(1, &[&[4]]);
    let none = ColumnMapping::new();
    assert!(verify(&mut acc, &full, &none, admit_all));
    assert!(!verify(&mut acc, &empty, &none, admit_all));
    assert!(verify(&mut acc, &Relation::new(0), &none, admit_all));
    assert!(!negate(&mut acc, &full, &none, true, admit_all));
    assert!(negate(&mut acc, &empty, &none, false, admit_all));
    assert_eq!(acc.len(), 1);
}

#[test]
fn failed_negated_proof_keeps_everything() {
    let mut acc = rel(1, &[&[1], &[2]]);
    let stale = rel(1, &[&[1]]);
    let common = ColumnMapping::from_pairs([(0, 0)]);
    assert!(negate(&mut acc, &stale, &common, false, admit_all));
    acc.finalize_deletion();
    assert_eq!(acc.len(), 2);
}
