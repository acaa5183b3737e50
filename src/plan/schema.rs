//! Output schema for a resolved plan node.
//!
//! A [`Schema`] is an ordered list of column descriptors. The column's
//! **position** is the authoritative binding used downstream by execution;
//! name/table are only for human-facing resolution (spec.md §3 "Schema").

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::plan::expr::SqlType;

/// One column of a node's output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub sql_type: SqlType,
    /// The table (or alias) this column is sourced from, if any.
    pub source_table: Option<String>,
    pub nullable: bool,
    pub default: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, sql_type: SqlType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sql_type,
            source_table: None,
            nullable,
            default: None,
        }
    }

    pub fn with_source_table(mut self, table: impl Into<String>) -> Self {
        self.source_table = Some(table.into());
        self
    }
}

/// An ordered list of [`ColumnDescriptor`]s produced by a plan node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema(pub Vec<ColumnDescriptor>);

impl Schema {
    pub fn empty() -> Self {
        Schema(Vec::new())
    }

    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Schema(columns)
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.0
    }

    /// Find every column in this schema whose name matches (case-insensitive),
    /// returning `(index, descriptor)` pairs for ambiguity checks by the caller.
    pub fn find_by_name(&self, name: &str) -> Vec<(usize, &ColumnDescriptor)> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name.eq_ignore_ascii_case(name))
            .collect()
    }

    /// Find the single column produced by `table` named `name`.
    pub fn find_by_table_and_name(&self, table: &str, name: &str) -> Option<(usize, &ColumnDescriptor)> {
        self.0.iter().enumerate().find(|(_, c)| {
            c.name.eq_ignore_ascii_case(name)
                && c.source_table
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(table))
        })
    }

    /// Columns exposed by a given table/alias, in schema order (used by star expansion).
    pub fn columns_for_table(&self, table: &str) -> Vec<(usize, &ColumnDescriptor)> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.source_table
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(table))
            })
            .collect()
    }

    pub fn extend(&mut self, other: Schema) {
        self.0.extend(other.0);
    }

    pub fn push(&mut self, col: ColumnDescriptor) {
        self.0.push(col);
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<String> = self
            .0
            .iter()
            .map(|c| format!("{}:{:?}", c.name, c.sql_type))
            .collect();
        write!(f, "[{}]", cols.join(", "))
    }
}
