//! Relational tables keyed by integration ids.
//!
//! A `Table` is an ordered bag of tuples over a set of columns. Columns
//! are keyed by a `u64` integration id at every pipeline point: positional
//! ids at construction, globally-unique ids after offsetting, cluster ids
//! after alignment. Within one table the ids are always distinct and the
//! columns are kept in ascending-id order.

use std::collections::HashMap;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::value::{NullMinter, Value};

/// Primitive type of a source column, as inferred by the ingestion layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Str,
    Int,
    Real,
    Other,
}

/// A column: integration id, source name, and inferred type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Integration id. Positional at construction; rewritten to a
    /// globally-unique id and later to a cluster id by the pipeline.
    pub id: u64,
    /// Original column name from the source table.
    pub name: String,
    /// Inferred primitive type.
    pub dtype: ColumnType,
}

/// An ordered bag of tuples over integration-id-keyed columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Source name of the table (file stem for CSV-loaded tables).
    pub name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from named, typed columns and row data. Integration
    /// ids are assigned positionally (0..n); the pipeline re-offsets them
    /// to be globally unique across tables.
    ///
    /// # Panics
    /// Panics if any row's width differs from the column count.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<(String, ColumnType)>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let columns: Vec<Column> = columns
            .into_iter()
            .enumerate()
            .map(|(i, (name, dtype))| Column {
                id: i as u64,
                name,
                dtype,
            })
            .collect();
        let table = Self {
            name: name.into(),
            columns,
            rows,
        };
        table.assert_invariants();
        table
    }

    /// Build a table with explicit integration ids already assigned.
    ///
    /// # Panics
    /// Panics if ids are not distinct or any row width is wrong.
    pub fn with_columns(
        name: impl Into<String>,
        columns: Vec<Column>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let table = Self {
            name: name.into(),
            columns,
            rows,
        };
        table.assert_invariants();
        table
    }

    /// An empty table with no columns and no rows.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    fn assert_invariants(&self) {
        let mut seen = HashSet::with_capacity(self.columns.len());
        for col in &self.columns {
            assert!(
                seen.insert(col.id),
                "duplicate integration id {} in table {}",
                col.id,
                self.name
            );
        }
        for (i, row) in self.rows.iter().enumerate() {
            assert!(
                row.len() == self.columns.len(),
                "row {} of table {} has width {}, expected {}",
                i,
                self.name,
                row.len(),
                self.columns.len()
            );
        }
    }

    /// Number of tuples.
    pub fn tuple_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the table holds no tuples.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column metadata, in storage order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Integration ids, in storage order.
    pub fn column_ids(&self) -> Vec<u64> {
        self.columns.iter().map(|c| c.id).collect()
    }

    /// Row data, in storage order.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Values of the column with the given integration id, if present.
    pub fn column_values(&self, id: u64) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c.id == id)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Shift every integration id by `offset`, returning the next free
    /// offset. Called once per table so ids are disjoint across tables.
    pub fn offset_integration_ids(&mut self, offset: u64) -> u64 {
        for col in &mut self.columns {
            col.id += offset;
        }
        offset + self.columns.len() as u64
    }

    /// Rewrite every column id through the alignment assignment
    /// (pre-cluster id to cluster id) and restore ascending-id column
    /// order. Row values are permuted along with the columns.
    ///
    /// # Panics
    /// Panics if an id is missing from the assignment or the rewrite
    /// produces duplicate ids within this table (the clustering constraint
    /// guarantees it cannot; a violation is a programmer error).
    pub fn rename_columns(&mut self, assignments: &HashMap<u64, u64>) {
        for col in &mut self.columns {
            let new_id = *assignments
                .get(&col.id)
                .unwrap_or_else(|| panic!("no assignment for integration id {}", col.id));
            col.id = new_id;
        }
        self.sort_columns();
        self.assert_invariants();
    }

    /// Reorder columns (and row values) into ascending integration-id
    /// order.
    pub fn sort_columns(&mut self) {
        let mut order: Vec<usize> = (0..self.columns.len()).collect();
        order.sort_by_key(|&i| self.columns[i].id);
        if order.iter().enumerate().all(|(pos, &i)| pos == i) {
            return;
        }
        self.columns = order.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            let reordered: Vec<Value> = order.iter().map(|&i| row[i].clone()).collect();
            *row = reordered;
        }
    }

    /// Replace every semantically-null cell (`Null` or the empty-string
    /// sentinel) with a fresh labeled null from the run's minter. Runs
    /// once per table, before its first outer union.
    pub fn generate_labeled_nulls(&mut self, minter: &mut NullMinter) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if cell.is_null_like() {
                    *cell = minter.mint();
                }
            }
        }
    }

    /// Replace every labeled null with a plain `Null`.
    pub fn replace_labeled_nulls(&mut self) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if matches!(cell, Value::LabeledNull(_)) {
                    *cell = Value::Null;
                }
            }
        }
    }

    /// True if any cell is a labeled null.
    pub fn has_labeled_nulls(&self) -> bool {
        self.rows
            .iter()
            .any(|row| row.iter().any(|v| matches!(v, Value::LabeledNull(_))))
    }

    /// Replace the row bag, keeping the schema.
    pub(crate) fn with_rows(&self, rows: Vec<Vec<Value>>) -> Table {
        Table::with_columns(self.name.clone(), self.columns.clone(), rows)
    }
}
