//! Typed result envelope returned by every statement.

use std::fmt;

use crate::catalog::{Column, Row};
use crate::types::Value;

/// The shape of an [`ExecutionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Ddl,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultKind::Select => "SELECT",
            ResultKind::Insert => "INSERT",
            ResultKind::Update => "UPDATE",
            ResultKind::Delete => "DELETE",
            ResultKind::Merge => "MERGE",
            ResultKind::Ddl => "DDL",
        };
        f.write_str(name)
    }
}

/// Result of executing one statement.
///
/// Only the fields relevant to the [`ResultKind`] are populated: SELECT
/// carries columns and rows, mutations carry an affected-row count, DDL
/// carries a success flag and message. Each shape has its own constructor,
/// so a row-bearing DDL result cannot be built.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    kind: ResultKind,
    columns: Vec<Column>,
    rows: Vec<Row>,
    affected_rows: usize,
    success: bool,
    message: Option<String>,
}

impl ExecutionResult {
    fn new(kind: ResultKind) -> Self {
        ExecutionResult {
            kind,
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: 0,
            success: true,
            message: None,
        }
    }

    pub fn select(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        ExecutionResult {
            columns,
            rows,
            ..ExecutionResult::new(ResultKind::Select)
        }
    }

    pub fn inserted(count: usize) -> Self {
        ExecutionResult::mutation(ResultKind::Insert, count)
    }

    pub fn updated(count: usize) -> Self {
        ExecutionResult::mutation(ResultKind::Update, count)
    }

    pub fn deleted(count: usize) -> Self {
        ExecutionResult::mutation(ResultKind::Delete, count)
    }

    pub fn merged(count: usize) -> Self {
        ExecutionResult::mutation(ResultKind::Merge, count)
    }

    fn mutation(kind: ResultKind, count: usize) -> Self {
        ExecutionResult {
            affected_rows: count,
            ..ExecutionResult::new(kind)
        }
    }

    pub fn ddl(message: impl Into<String>) -> Self {
        ExecutionResult {
            message: Some(message.into()),
            ..ExecutionResult::new(ResultKind::Ddl)
        }
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Row values without row identities.
    pub fn values(&self) -> Vec<Vec<Value>> {
        self.rows.iter().map(|r| r.values.clone()).collect()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn affected_rows(&self) -> usize {
        self.affected_rows
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// First column of the first row, for scalar queries.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|r| r.values.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[test]
    fn test_select_shape() {
        let result = ExecutionResult::select(
            vec![Column::new("a", DataType::Integer)],
            vec![Row::synthetic(vec![Value::Integer(7)])],
        );
        assert_eq!(result.kind(), ResultKind::Select);
        assert_eq!(result.column_names(), vec!["a"]);
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.scalar(), Some(&Value::Integer(7)));
        assert_eq!(result.affected_rows(), 0);
    }

    #[test]
    fn test_mutation_and_ddl_shapes() {
        let merged = ExecutionResult::merged(3);
        assert_eq!(merged.kind(), ResultKind::Merge);
        assert_eq!(merged.affected_rows(), 3);
        assert!(merged.rows().is_empty());

        let ddl = ExecutionResult::ddl("Index idx does not exist, skipping");
        assert_eq!(ddl.kind(), ResultKind::Ddl);
        assert!(ddl.is_success());
        assert_eq!(ddl.message(), Some("Index idx does not exist, skipping"));
        assert_eq!(ResultKind::Ddl.to_string(), "DDL");
    }
}
