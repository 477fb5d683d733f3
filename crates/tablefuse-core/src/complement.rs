//! Fixed-point complementation of the outer-union result (stage L4).
//!
//! Repeatedly combines complementable tuple pairs (pairs with no column
//! where both values are non-null and unequal) until the tuple set
//! stops changing. Combination partners are always drawn from the
//! original outer union, so every maximal combination of facts is
//! reached.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::table::Table;
use crate::value::{canonical_row, CanonValue, Value};

/// Result of the complementation fixed point.
#[derive(Debug, Clone)]
pub struct ComplementOutcome {
    /// The complemented table, rows in canonical order.
    pub table: Table,
    /// Number of passes executed, including the pass that detected the
    /// fixed point.
    pub iterations: usize,
    /// False when the iteration cap was hit before the fixed point.
    pub converged: bool,
}

/// Two tuples are complementable when no column holds two non-null,
/// unequal values. Cross-type comparisons are unequal, so an `Int` facing
/// a `Real` in one column blocks the pair.
pub fn complementable(t1: &[Value], t2: &[Value]) -> bool {
    t1.iter()
        .zip(t2)
        .all(|(v1, v2)| v1.is_null_like() || v2.is_null_like() || v1 == v2)
}

/// Combine two complementable tuples: per column the first non-null value
/// wins, preferring `t1`; positions null in both become a plain `Null`.
pub fn combine(t1: &[Value], t2: &[Value]) -> Vec<Value> {
    t1.iter()
        .zip(t2)
        .map(|(v1, v2)| {
            if !v1.is_null_like() {
                v1.clone()
            } else if !v2.is_null_like() {
                v2.clone()
            } else {
                Value::Null
            }
        })
        .collect()
}

/// Run complementation to its fixed point, capped at `max_iterations`
/// passes. Hitting the cap logs a warning and returns the last iterate;
/// the pipeline continues with subsumption either way.
pub fn complement(table: &Table, max_iterations: usize) -> ComplementOutcome {
    let base: Vec<(Vec<Value>, Vec<CanonValue>)> = table
        .rows()
        .iter()
        .map(|row| (row.clone(), canonical_row(row)))
        .collect();

    let mut current: Vec<Vec<Value>> = table.rows().to_vec();
    let mut current_set = canonical_set(&current);
    let mut iterations = 0usize;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;
        let next = step(&current, &base);
        let next_set = canonical_set(&next);
        let at_fixed_point = next_set == current_set;
        current = next;
        current_set = next_set;
        if at_fixed_point {
            converged = true;
            break;
        }
    }

    if !converged {
        tracing::warn!(
            iterations = iterations,
            tuples = current.len(),
            "Complement iteration cap reached before fixed point; continuing with last iterate"
        );
    }

    current.sort_by_cached_key(|row| canonical_row(row));
    ComplementOutcome {
        table: table.with_rows(current),
        iterations,
        converged,
    }
}

/// One complementation pass. For each tuple of `current`, emit every
/// combination with a complementable, canonically-distinct partner from
/// `base`; tuples with no partner pass through unchanged. The per-tuple
/// loop runs in parallel; emission order is re-canonicalized by the
/// in-order deduplication, so parallel scheduling cannot leak into the
/// result.
fn step(
    current: &[Vec<Value>],
    base: &[(Vec<Value>, Vec<CanonValue>)],
) -> Vec<Vec<Value>> {
    let emitted: Vec<Vec<Vec<Value>>> = current
        .par_iter()
        .map(|t1| {
            let t1_key = canonical_row(t1);
            let mut combos = Vec::new();
            for (t2, t2_key) in base {
                if *t2_key == t1_key {
                    continue;
                }
                if complementable(t1, t2) {
                    combos.push(combine(t1, t2));
                }
            }
            if combos.is_empty() {
                combos.push(t1.clone());
            }
            combos
        })
        .collect();

    dedup_in_order(emitted.into_iter().flatten())
}

fn dedup_in_order(rows: impl Iterator<Item = Vec<Value>>) -> Vec<Vec<Value>> {
    let mut seen: HashSet<Vec<CanonValue>> = HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        if seen.insert(canonical_row(&row)) {
            out.push(row);
        }
    }
    out
}

fn canonical_set(rows: &[Vec<Value>]) -> HashSet<Vec<CanonValue>> {
    rows.iter().map(|row| canonical_row(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnType, Table};

    fn two_col_table(rows: Vec<Vec<Value>>) -> Table {
        Table::new(
            "u",
            vec![
                ("Col1".to_string(), ColumnType::Str),
                ("Col2".to_string(), ColumnType::Int),
            ],
            rows,
        )
    }

    fn three_col_table(rows: Vec<Vec<Value>>) -> Table {
        Table::new(
            "u",
            vec![
                ("Col1".to_string(), ColumnType::Str),
                ("Col2".to_string(), ColumnType::Int),
                ("Col3".to_string(), ColumnType::Int),
            ],
            rows,
        )
    }

    fn row_set(table: &Table) -> HashSet<Vec<CanonValue>> {
        canonical_set(table.rows())
    }

    #[test]
    fn test_complementable_pairs() {
        let a = vec![Value::from("A"), Value::Null];
        let b = vec![Value::Null, Value::from(1)];
        let c = vec![Value::from("B"), Value::from(1)];
        assert!(complementable(&a, &b));
        assert!(complementable(&b, &c));
        assert!(!complementable(&a, &c));
    }

    #[test]
    fn test_cross_type_values_block_a_pair() {
        let a = vec![Value::Int(1)];
        let b = vec![Value::Real(1.0)];
        assert!(!complementable(&a, &b));
    }

    #[test]
    fn test_combine_prefers_left_then_right_then_null() {
        let a = vec![Value::from("A"), Value::Null, Value::LabeledNull(1)];
        let b = vec![Value::Null, Value::from(2), Value::Str(String::new())];
        assert_eq!(
            combine(&a, &b),
            vec![Value::from("A"), Value::from(2), Value::Null]
        );
    }

    #[test]
    fn test_no_missing_values_is_a_fixed_point() {
        let table = two_col_table(vec![
            vec![Value::from("A"), Value::from(1)],
            vec![Value::from("B"), Value::from(2)],
            vec![Value::from("C"), Value::from(3)],
        ]);
        let outcome = complement(&table, 100);
        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(row_set(&outcome.table), row_set(&table));
    }

    #[test]
    fn test_partial_tuples_collapse_into_their_join() {
        let table = two_col_table(vec![
            vec![Value::from("A"), Value::Null],
            vec![Value::Null, Value::from(1)],
            vec![Value::from("A"), Value::from(1)],
        ]);
        let outcome = complement(&table, 100);
        assert!(outcome.converged);
        let expected = canonical_set(&[vec![Value::from("A"), Value::from(1)]]);
        assert_eq!(row_set(&outcome.table), expected);
    }

    #[test]
    fn test_three_column_join() {
        let table = three_col_table(vec![
            vec![Value::from("A"), Value::Null, Value::from(3)],
            vec![Value::Null, Value::from(2), Value::from(3)],
            vec![Value::from("A"), Value::from(2), Value::Null],
        ]);
        let outcome = complement(&table, 100);
        assert!(outcome.converged);
        let expected = canonical_set(&[vec![
            Value::from("A"),
            Value::from(2),
            Value::from(3),
        ]]);
        assert_eq!(row_set(&outcome.table), expected);
    }

    #[test]
    fn test_conflicting_tuples_pass_through() {
        let table = two_col_table(vec![
            vec![Value::from("A"), Value::from(1)],
            vec![Value::Null, Value::from(2)],
        ]);
        let outcome = complement(&table, 100);
        assert!(outcome.converged);
        assert_eq!(row_set(&outcome.table), row_set(&table));
    }

    #[test]
    fn test_duplicate_partial_tuples_deduplicate() {
        let table = three_col_table(vec![
            vec![Value::from("A"), Value::Null, Value::from(1)],
            vec![Value::from("B"), Value::from(2), Value::Null],
            vec![Value::from("A"), Value::Null, Value::from(1)],
        ]);
        let outcome = complement(&table, 100);
        assert!(outcome.converged);
        assert_eq!(outcome.table.tuple_count(), 2);
    }

    #[test]
    fn test_all_null_tuples_collapse_to_one() {
        let table = two_col_table(vec![
            vec![Value::Null, Value::Null],
            vec![Value::Null, Value::Null],
        ]);
        let outcome = complement(&table, 100);
        assert!(outcome.converged);
        assert_eq!(outcome.table.tuple_count(), 1);
        assert!(outcome.table.rows()[0].iter().all(Value::is_null_like));
    }

    #[test]
    fn test_labeled_null_identity_does_not_split_equal_tuples() {
        // same values, differently-labeled nulls: canonically equal, so
        // the pair is excluded as a self-pair and the set collapses
        let table = two_col_table(vec![
            vec![Value::from("A"), Value::LabeledNull(1)],
            vec![Value::from("A"), Value::LabeledNull(2)],
        ]);
        let outcome = complement(&table, 100);
        assert!(outcome.converged);
        assert_eq!(outcome.table.tuple_count(), 1);
    }

    #[test]
    fn test_fixed_point_is_permutation_independent() {
        let rows = vec![
            vec![Value::from("A"), Value::Null],
            vec![Value::Null, Value::from(1)],
            vec![Value::from("B"), Value::from(2)],
            vec![Value::from("A"), Value::from(1)],
        ];
        let mut reversed = rows.clone();
        reversed.reverse();

        let forward = complement(&two_col_table(rows), 100);
        let backward = complement(&two_col_table(reversed), 100);
        assert_eq!(row_set(&forward.table), row_set(&backward.table));
        // canonical output order is identical, not just the set
        assert_eq!(forward.table.rows(), backward.table.rows());
    }

    #[test]
    fn test_complement_is_idempotent_on_its_output() {
        let table = three_col_table(vec![
            vec![Value::from("A"), Value::Null, Value::from(3)],
            vec![Value::Null, Value::from(2), Value::from(3)],
            vec![Value::from("A"), Value::from(2), Value::Null],
        ]);
        let first = complement(&table, 100);
        let second = complement(&first.table, 100);
        assert_eq!(second.iterations, 1);
        assert_eq!(row_set(&second.table), row_set(&first.table));
    }

    #[test]
    fn test_iteration_cap_surfaces_nonconvergence() {
        let table = two_col_table(vec![
            vec![Value::from("A"), Value::Null],
            vec![Value::Null, Value::from(1)],
        ]);
        let outcome = complement(&table, 0);
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 0);
        // the last iterate is the input itself
        assert_eq!(row_set(&outcome.table), row_set(&table));
    }
}
