//! Subsumption removal and labeled-null replacement (stage L5).
//!
//! A tuple is dropped when another tuple carries the same values with
//! equal or fewer nulls, treating nulls as wildcards. Afterwards every
//! remaining labeled null is replaced by a plain `Null`, producing the
//! final full-disjunction table.

use crate::table::Table;
use crate::value::Value;

/// True when `t1` subsumes `t2`: every non-null cell of `t2` is matched
/// by an equal, non-null cell of `t1`. Equal tuples subsume each other.
pub fn subsumes(t1: &[Value], t2: &[Value]) -> bool {
    t1.iter().zip(t2).all(|(v1, v2)| {
        if v2.is_null_like() {
            true
        } else {
            !v1.is_null_like() && v1 == v2
        }
    })
}

/// Remove every tuple dominated by another surviving tuple, then replace
/// remaining labeled nulls with plain `Null`.
///
/// Mutual subsumption (equality up to null identity) keeps exactly one
/// representative.
pub fn subsume(table: &Table) -> Table {
    let rows = table.rows();
    let mut eliminated = vec![false; rows.len()];

    for i in 0..rows.len() {
        if eliminated[i] {
            continue;
        }
        for j in 0..rows.len() {
            if i == j || eliminated[j] {
                continue;
            }
            if subsumes(&rows[i], &rows[j]) {
                eliminated[j] = true;
            } else if subsumes(&rows[j], &rows[i]) {
                eliminated[i] = true;
                break;
            }
        }
    }

    let kept: Vec<Vec<Value>> = rows
        .iter()
        .zip(&eliminated)
        .filter(|(_, &gone)| !gone)
        .map(|(row, _)| row.clone())
        .collect();

    tracing::debug!(
        input = rows.len(),
        subsumed = rows.len() - kept.len(),
        "Subsumption pass complete"
    );

    let mut out = table.with_rows(kept);
    out.replace_labeled_nulls();
    out
}
