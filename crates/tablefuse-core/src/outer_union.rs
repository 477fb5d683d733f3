//! Outer union of integration-id-aligned tables (stage L3).
//!
//! Vertically concatenates two tables over the union of their column
//! sets. Positions a source table has no column for are filled with fresh
//! labeled nulls from the run's minter, so independent missing values
//! never compare equal downstream.

use std::collections::{BTreeSet, HashMap};

use crate::table::{Column, Table};
use crate::value::{NullMinter, Value};

/// Outer union of `a` and `b`.
///
/// The output column set is the union of both inputs' integration ids, in
/// ascending-id order; the output row bag holds every row of `a` followed
/// by every row of `b` (`|c.rows| = |a.rows| + |b.rows|`). Column
/// metadata for a shared id follows `a`. The output keeps `a`'s table
/// name (the accumulator in the pipeline fold).
///
/// Edge cases: if one side holds no rows the other is copied through; if
/// both are rowless the result is rowless; identical column sets
/// concatenate without any filling.
pub fn outer_union(a: &Table, b: &Table, minter: &mut NullMinter) -> Table {
    if b.is_empty() {
        let mut out = a.clone();
        out.sort_columns();
        return out;
    }
    if a.is_empty() {
        let mut out = Table::with_columns(a.name.clone(), b.columns().to_vec(), b.rows().to_vec());
        out.sort_columns();
        return out;
    }

    let a_ids: BTreeSet<u64> = a.column_ids().into_iter().collect();
    let b_ids: BTreeSet<u64> = b.column_ids().into_iter().collect();
    let merged_ids: Vec<u64> = a_ids.union(&b_ids).copied().collect();

    let columns: Vec<Column> = merged_ids
        .iter()
        .map(|&id| {
            a.columns()
                .iter()
                .chain(b.columns())
                .find(|c| c.id == id)
                .expect("merged id comes from one of the inputs")
                .clone()
        })
        .collect();

    let mut rows = Vec::with_capacity(a.tuple_count() + b.tuple_count());
    append_aligned(&mut rows, a, &merged_ids, minter);
    append_aligned(&mut rows, b, &merged_ids, minter);

    Table::with_columns(a.name.clone(), columns, rows)
}

/// Copy `source` rows into `rows`, reordered to `merged_ids`, minting a
/// labeled null for every id the source has no column for.
fn append_aligned(
    rows: &mut Vec<Vec<Value>>,
    source: &Table,
    merged_ids: &[u64],
    minter: &mut NullMinter,
) {
    let positions: HashMap<u64, usize> = source
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| (col.id, idx))
        .collect();

    for row in source.rows() {
        let aligned: Vec<Value> = merged_ids
            .iter()
            .map(|id| match positions.get(id) {
                Some(&idx) => row[idx].clone(),
                None => minter.mint(),
            })
            .collect();
        rows.push(aligned);
    }
}
