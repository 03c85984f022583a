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

#[test]
fn reallocate_rounds_to_eight_and_never_shrinks() {
    let mut r = Relation::new(2);
    r.reallocate(3);
    assert_eq!(r.capacity(), 8);
    r.reallocate(17);
    assert_eq!(r.capacity(), 24);
    r.reallocate(5);
    assert_eq!(r.capacity(), 24);
}

#[test]
fn push_pads_and_truncates_to_arity() {
    let mut r = Relation::new(3);
    r.push_row(&[s(1)]);
    r.push_row(&[s(1), s(2), s(3), s(4)]);
    assert_eq!(r.row(0), &[s(1), Symbol::default(), Symbol::default()]);
    assert_eq!(r.row(1), &[s(1), s(2), s(3)]);
}

#[test]
fn finalize_moves_last_row_into_holes() {
    let mut r = rel(1, &[&[0], &[1], &[2], &[3], &[4]]);
    r.mark_deleted(1);
    r.mark_deleted(3);
    let lowest = r.finalize_deletion();
    assert_eq!(lowest, 1);
    assert_eq!(r.len(), 3);
    assert_eq!(r.sorted_rows(), vec![vec![s(0)], vec![s(2)], vec![s(4)]]);
}

#[test]
fn finalize_tolerates_repeated_marks() {
    let mut r = rel(2, &[&[0, 0], &[1, 1], &[2, 2]]);
    r.mark_deleted(2);
    r.mark_deleted(2);
    r.mark_deleted(0);
    r.finalize_deletion();
    assert_eq!(r.sorted_rows(), vec![vec![s(1), s(1)]]);
}

#[test]
fn finalize_without_marks_reports_len() {
    let mut r = rel(1, &[&[0], &[1]]);
    assert_eq!(r.finalize_deletion(), 2);
}

#[test]
fn rewrite_copies_min_arity() {
    let wide = rel(3, &[&[1, 2, 3], &[4, 5, 6]]);
    let mut narrow = Relation::new(2);
    narrow.rewrite(&wide);
    assert_eq!(narrow.sorted_rows(), vec![vec![s(1), s(2)], vec![s(4), s(5)]]);
}

#[test]
fn merge_columns_copies_only_listed_columns() {
    let src = rel(3, &[&[1, 2, 3]]);
    let mut dst = rel(3, &[&[7, 7, 7]]);
    dst.merge_columns(&src, &[0, 2]);
    assert_eq!(dst.row(1), &[s(1), Symbol::default(), s(3)]);
}

#[test]
fn delete_duplicates_respects_columns_and_start() {
    let mut r = rel(2, &[&[1, 1], &[1, 2], &[1, 1], &[2, 2]]);
    assert_eq!(r.delete_duplicates(None, 0), 1);
    assert_eq!(r.len(), 3);

    let mut r = rel(2, &[&[1, 1], &[1, 2], &[2, 3]]);
    assert_eq!(r.delete_duplicates(Some(&[0]), 0), 1);
    assert_eq!(r.len(), 2);
}

#[test]
fn index_is_dropped_by_partial_mutation() {
    let mut r = rel(1, &[&[1], &[2], &[3], &[4], &[5], &[6]]);
    r.build_index();
    assert!(r.index_valid());
    r.push_row(&[s(9)]);
    assert!(!r.index_valid());
    let mapping = ColumnMapping::from_pairs([(0, 0)]);
    assert_eq!(r.find_row(0, &mapping, &[s(9)]), Some(6));
}

#[test]
fn indexed_find_skips_to_candidate_range() {
    let mut src = Relation::new(2);
    for i in 0..10 {
        src.push_row(&[s(i % 3), s(i)]);
    }
    let mut r = Relation::new(2);
    r.rewrite_indexed(&src);
    let mapping = ColumnMapping::from_pairs([(0, 1)]);
    assert_eq!(r.candidate_range(&mapping, &[s(7)]), 7..8);
    assert_eq!(r.find_row(0, &mapping, &[s(7)]), Some(7));
    assert_eq!(r.find_row(0, &mapping, &[s(42)]), None);
}

#[test]
fn query_rewrite_uses_constants_and_ties() {
    let src = rel(3, &[&[1, 2, 2], &[1, 2, 3], &[2, 4, 4]]);
    let mut q = EqualityQuery::new();
    q.equal_symbol(0, s(1));
    q.equal_columns(1, 2);
    let mut out = Relation::new(3);
    out.rewrite_with_query(&src, &q);
    assert_eq!(out.sorted_rows(), vec![vec![s(1), s(2), s(2)]]);
}

#[test]
fn zero_arity_relation_counts_rows() {
    let mut r = Relation::new(0);
    assert!(r.is_empty());
    r.push_blank_row();
    assert_eq!(r.len(), 1);
    assert_eq!(r.row(0), &[] as &[Symbol]);
    let mut copy = Relation::new(0);
    copy.rewrite(&r);
    assert_eq!(copy.len(), 1);
}
