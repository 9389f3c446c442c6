//! Column scopes and per-row evaluation context.
//!
//! A [`ColumnScope`] is the table-qualification map for one row shape: the
//! combined column list plus, for every visible table (under its alias if it
//! has one), the offset and width of its columns inside a combined row. It is
//! built once per FROM clause or join and never mutated while rows are being
//! evaluated against it.
//!
//! An [`ExecutionContext`] binds a scope to the current row. Contexts nest:
//! a subquery's context points at the enclosing one so correlated column
//! references resolve against the outer row.

use std::ops::Range;

use crate::catalog::Column;
use crate::error::{HorizonError, Result};
use crate::types::Value;

#[derive(Debug, Clone)]
struct ScopeTable {
    /// Lower-cased alias or table name.
    name: String,
    offset: usize,
    width: usize,
}

/// Combined column list plus table-qualification map.
#[derive(Debug, Clone, Default)]
pub struct ColumnScope {
    columns: Vec<Column>,
    tables: Vec<ScopeTable>,
}

impl ColumnScope {
    /// A scope with no columns, used for FROM-less SELECTs.
    pub fn empty() -> Self {
        ColumnScope::default()
    }

    /// The scope of a single table visible as `name`.
    pub fn table(name: &str, columns: Vec<Column>) -> Self {
        let width = columns.len();
        ColumnScope {
            columns,
            tables: vec![ScopeTable {
                name: name.to_lowercase(),
                offset: 0,
                width,
            }],
        }
    }

    /// Columns with no owning table; only unqualified references reach them.
    pub fn anonymous(columns: Vec<Column>) -> Self {
        ColumnScope {
            columns,
            tables: Vec::new(),
        }
    }

    /// Concatenates `self` (left) and `right`, shifting the right side's table
    /// offsets by the left width.
    pub fn join(&self, right: &ColumnScope) -> ColumnScope {
        let shift = self.columns.len();
        let mut columns = self.columns.clone();
        columns.extend(right.columns.iter().cloned());
        let mut tables = self.tables.clone();
        tables.extend(right.tables.iter().map(|t| ScopeTable {
            name: t.name.clone(),
            offset: t.offset + shift,
            width: t.width,
        }));
        ColumnScope { columns, tables }
    }

    /// Appends anonymous columns after the existing ones.
    pub fn extend_anonymous(&mut self, columns: impl IntoIterator<Item = Column>) {
        self.columns.extend(columns);
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Visible table names in registration order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.find_table(name).is_some()
    }

    /// Absolute positions of `table`'s columns in a combined row.
    pub fn table_range(&self, table: &str) -> Option<Range<usize>> {
        self.find_table(table).map(|t| t.offset..t.offset + t.width)
    }

    /// Name of the table owning absolute position `index`, if any.
    pub fn owner_of(&self, index: usize) -> Option<&str> {
        self.tables
            .iter()
            .find(|t| (t.offset..t.offset + t.width).contains(&index))
            .map(|t| t.name.as_str())
    }

    fn find_table(&self, name: &str) -> Option<&ScopeTable> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// `Some(position)` if `table` is registered here and has column `name`;
    /// `Some(None)` if the table is registered but lacks the column; `None`
    /// if this scope does not know `table` at all.
    fn lookup_qualified(&self, table: &str, name: &str) -> Option<Option<usize>> {
        let t = self.find_table(table)?;
        Some(
            self.columns[t.offset..t.offset + t.width]
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(name))
                .map(|i| t.offset + i),
        )
    }

    /// First column named `name` across the combined list.
    pub fn lookup_unqualified(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Absolute position of `table.name` (or `name`) within this scope alone.
    ///
    /// A qualifier unknown to this scope falls back to the first column with
    /// a matching name, which can pick the wrong table when joined tables
    /// share column names.
    pub fn resolve(&self, table: Option<&str>, name: &str) -> Option<usize> {
        if let Some(t) = table {
            if let Some(found) = self.lookup_qualified(t, name) {
                return found;
            }
        }
        self.lookup_unqualified(name)
    }
}

/// The row currently under evaluation, its scope, and the enclosing context.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    scope: &'a ColumnScope,
    row: &'a [Value],
    outer: Option<&'a ExecutionContext<'a>>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        scope: &'a ColumnScope,
        row: &'a [Value],
        outer: Option<&'a ExecutionContext<'a>>,
    ) -> Self {
        ExecutionContext { scope, row, outer }
    }

    pub fn scope(&self) -> &'a ColumnScope {
        self.scope
    }

    pub fn row(&self) -> &'a [Value] {
        self.row
    }

    pub fn outer(&self) -> Option<&'a ExecutionContext<'a>> {
        self.outer
    }

    /// Finds `(depth, position)` for a column reference, where depth counts
    /// how many enclosing contexts were walked.
    ///
    /// Qualified references resolve in the innermost context whose scope
    /// registers the qualifier. Only when no context knows the qualifier do
    /// they fall back to name matching like unqualified references, which
    /// take the first match from the innermost context outward.
    fn locate(&self, table: Option<&str>, name: &str) -> Option<(usize, usize)> {
        if let Some(t) = table {
            let mut current: Option<&ExecutionContext<'a>> = Some(self);
            let mut depth = 0;
            while let Some(ctx) = current {
                if let Some(found) = ctx.scope.lookup_qualified(t, name) {
                    return found.map(|i| (depth, i));
                }
                current = ctx.outer;
                depth += 1;
            }
        }
        let mut current: Option<&ExecutionContext<'a>> = Some(self);
        let mut depth = 0;
        while let Some(ctx) = current {
            if let Some(i) = ctx.scope.lookup_unqualified(name) {
                return Some((depth, i));
            }
            current = ctx.outer;
            depth += 1;
        }
        None
    }

    /// Returns `true` if the reference resolves in this context chain.
    pub fn can_resolve(&self, table: Option<&str>, name: &str) -> bool {
        self.locate(table, name).is_some()
    }

    /// Value of a column reference for the current row(s).
    pub fn column_value(&self, table: Option<&str>, name: &str) -> Result<Value> {
        let (depth, index) = self
            .locate(table, name)
            .ok_or_else(|| HorizonError::ColumnNotFound(display_name(table, name)))?;
        let mut ctx: &ExecutionContext<'a> = self;
        for _ in 0..depth {
            ctx = ctx
                .outer
                .ok_or_else(|| HorizonError::Internal("context chain shorter than depth".into()))?;
        }
        Ok(ctx.row.get(index).cloned().unwrap_or(Value::Null))
    }
}

pub(crate) fn display_name(table: Option<&str>, name: &str) -> String {
    match table {
        Some(t) => format!("{t}.{name}"),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn cols(names: &[&str]) -> Vec<Column> {
        names
            .iter()
            .map(|n| Column::new(*n, DataType::Integer))
            .collect()
    }

    #[test]
    fn join_scope_offsets_qualified_columns() {
        let left = ColumnScope::table("l", cols(&["id", "val"]));
        let right = ColumnScope::table("r", cols(&["id", "val"]));
        let joined = left.join(&right);
        assert_eq!(joined.width(), 4);
        assert_eq!(joined.resolve(Some("l"), "val"), Some(1));
        assert_eq!(joined.resolve(Some("R"), "ID"), Some(2));
        assert_eq!(joined.resolve(None, "val"), Some(1));
        assert_eq!(joined.table_range("r"), Some(2..4));
        assert_eq!(joined.owner_of(3), Some("r"));
    }

    #[test]
    fn unknown_qualifier_falls_back_to_first_match() {
        let joined = ColumnScope::table("a", cols(&["x"])).join(&ColumnScope::table("b", cols(&["x"])));
        assert_eq!(joined.resolve(Some("zzz"), "x"), Some(0));
        // Known qualifier without the column does not fall back.
        assert_eq!(joined.resolve(Some("b"), "nope"), None);
    }

    #[test]
    fn context_reads_current_row() {
        let scope = ColumnScope::table("t", cols(&["a", "b"]));
        let row = vec![Value::Integer(1), Value::Integer(2)];
        let ctx = ExecutionContext::new(&scope, &row, None);
        assert_eq!(ctx.column_value(None, "b").unwrap(), Value::Integer(2));
        assert_eq!(ctx.column_value(Some("t"), "a").unwrap(), Value::Integer(1));
        assert!(matches!(
            ctx.column_value(None, "c").unwrap_err(),
            HorizonError::ColumnNotFound(_)
        ));
    }

    #[test]
    fn correlated_reference_resolves_in_outer_context() {
        let outer_scope = ColumnScope::table("a", cols(&["id"]));
        let outer_row = vec![Value::Integer(10)];
        let outer = ExecutionContext::new(&outer_scope, &outer_row, None);

        let inner_scope = ColumnScope::table("b", cols(&["id"]));
        let inner_row = vec![Value::Integer(20)];
        let inner = ExecutionContext::new(&inner_scope, &inner_row, Some(&outer));

        assert_eq!(inner.column_value(Some("a"), "id").unwrap(), Value::Integer(10));
        assert_eq!(inner.column_value(Some("b"), "id").unwrap(), Value::Integer(20));
        assert_eq!(inner.column_value(None, "id").unwrap(), Value::Integer(20));
        assert!(inner.can_resolve(Some("a"), "id"));
        assert!(!inner.can_resolve(Some("a"), "missing"));
    }

    #[test]
    fn anonymous_columns_resolve_unqualified_only() {
        let mut scope = ColumnScope::table("t", cols(&["a"]));
        scope.extend_anonymous(cols(&["$agg0"]));
        assert_eq!(scope.resolve(None, "$agg0"), Some(1));
        assert_eq!(scope.resolve(Some("t"), "$agg0"), None);
        assert_eq!(scope.table_names().collect::<Vec<_>>(), vec!["t"]);
    }
}
