//! INSERT, UPDATE, DELETE and both MERGE forms.
//!
//! Every value written goes through [`Column::coerce`] first. Statements are
//! applied row by row straight to storage: a failure part way through a
//! batch leaves the rows already written in place, and undoing them is the
//! caller's transaction boundary to manage.

use tracing::debug;

use super::context::{ColumnScope, ExecutionContext};
use super::{ExecutionResult, Executor};
use crate::catalog::{find_column_index, Column, IndexInfo, Row};
use crate::error::{HorizonError, Result};
use crate::sql::ast::{
    DeleteStatement, Expr, InsertSource, InsertStatement, MergeAction, MergeKeyStatement,
    MergeSource, MergeUsingStatement, TableName, UpdateStatement,
};
use crate::types::{values_equal, Value};

impl Executor<'_> {
    // ---- INSERT ----

    pub(crate) fn execute_insert(
        &mut self,
        insert: &InsertStatement,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<ExecutionResult> {
        let columns = self.table(&insert.table)?.columns().to_vec();
        let positions = target_positions(&insert.table, &columns, insert.columns.as_deref())?;

        let tuples = match &insert.source {
            InsertSource::Values(rows) => {
                let mut tuples = Vec::with_capacity(rows.len());
                for exprs in rows {
                    tuples.push(self.eval_constants(exprs, outer)?);
                }
                tuples
            }
            InsertSource::Query(query) => {
                let (_, rows) = self.run_query(query, outer)?;
                rows.into_iter().map(|row| row.values).collect()
            }
        };

        let mut inserted = 0;
        for values in tuples {
            let row = build_row(&columns, &positions, values)?;
            self.table_mut(&insert.table)?.insert_row(row)?;
            inserted += 1;
        }
        debug!(table = %insert.table, rows = inserted, "inserted rows");
        Ok(ExecutionResult::inserted(inserted))
    }

    /// Evaluate a VALUES tuple. Only enclosing contexts are visible.
    fn eval_constants(
        &mut self,
        exprs: &[Expr],
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<Vec<Value>> {
        let scope = ColumnScope::empty();
        let ctx = ExecutionContext::new(&scope, &[], outer);
        exprs.iter().map(|e| self.eval(e, &ctx)).collect()
    }

    // ---- UPDATE / DELETE ----

    pub(crate) fn execute_update(
        &mut self,
        update: &UpdateStatement,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<ExecutionResult> {
        let (columns, rows) = self.snapshot(&update.table)?;
        let assignments = resolve_assignments(&update.table, &columns, &update.assignments)?;
        let scope = ColumnScope::table(&update.table.name, columns.clone());

        // Assignments read the row as it was before the statement.
        let mut changes = Vec::new();
        for row in rows {
            let ctx = ExecutionContext::new(&scope, &row.values, outer);
            if let Some(condition) = &update.where_clause {
                if !self.eval_predicate(condition, &ctx)? {
                    continue;
                }
            }
            let values = self.assign(&columns, &assignments, row.values.clone(), &ctx)?;
            changes.push((row.id, values));
        }

        let table = self.table_mut(&update.table)?;
        let mut updated = 0;
        for (id, values) in changes {
            if table.update_row(id, values)? {
                updated += 1;
            }
        }
        debug!(table = %update.table, rows = updated, "updated rows");
        Ok(ExecutionResult::updated(updated))
    }

    pub(crate) fn execute_delete(
        &mut self,
        delete: &DeleteStatement,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<ExecutionResult> {
        let (columns, rows) = self.snapshot(&delete.table)?;
        let scope = ColumnScope::table(&delete.table.name, columns);

        let mut doomed = Vec::new();
        for row in &rows {
            let keep = match &delete.where_clause {
                Some(condition) => {
                    let ctx = ExecutionContext::new(&scope, &row.values, outer);
                    !self.eval_predicate(condition, &ctx)?
                }
                None => false,
            };
            if !keep {
                doomed.push(row.id);
            }
        }

        let table = self.table_mut(&delete.table)?;
        let deleted = doomed.into_iter().filter(|id| table.delete_row(*id)).count();
        debug!(table = %delete.table, rows = deleted, "deleted rows");
        Ok(ExecutionResult::deleted(deleted))
    }

    fn snapshot(&self, name: &TableName) -> Result<(Vec<Column>, Vec<Row>)> {
        let table = self.table(name)?;
        Ok((table.columns().to_vec(), table.all_rows()))
    }

    /// Apply `assignments` to `values`, evaluating each right-hand side in
    /// `ctx`.
    fn assign(
        &mut self,
        columns: &[Column],
        assignments: &[(usize, &Expr)],
        mut values: Vec<Value>,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Value>> {
        for &(index, expr) in assignments {
            let raw = self.eval(expr, ctx)?;
            values[index] = columns[index].coerce(&raw)?;
        }
        Ok(values)
    }

    // ---- MERGE ... KEY ----

    /// Upsert each VALUES tuple: update the row whose key columns equal the
    /// tuple's, or insert a new one. Key matching treats two nulls as equal.
    pub(crate) fn execute_merge_key(
        &mut self,
        merge: &MergeKeyStatement,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<ExecutionResult> {
        let (columns, key_names) = {
            let table = self.table(&merge.table)?;
            let key_names = if merge.key_columns.is_empty() {
                primary_key_columns(table.indexes(), &merge.table)?
            } else {
                merge.key_columns.clone()
            };
            (table.columns().to_vec(), key_names)
        };
        let positions = target_positions(&merge.table, &columns, merge.columns.as_deref())?;
        let keys = key_names
            .iter()
            .map(|name| column_position(&merge.table, &columns, name))
            .collect::<Result<Vec<_>>>()?;

        let mut merged = 0;
        for exprs in &merge.values {
            let raw = self.eval_constants(exprs, outer)?;
            check_arity(&positions, &raw)?;
            // Only listed columns are coerced here. Unlisted ones keep their
            // stored value on update and are validated on insert.
            let listed = positions
                .iter()
                .zip(&raw)
                .map(|(&p, value)| columns[p].coerce(value))
                .collect::<Result<Vec<_>>>()?;
            let key_values: Vec<Value> = keys
                .iter()
                .map(|&k| match positions.iter().position(|&p| p == k) {
                    Some(i) => listed[i].clone(),
                    None => columns[k].default.clone().unwrap_or(Value::Null),
                })
                .collect();

            let table = self.table_mut(&merge.table)?;
            let existing = table.all_rows().into_iter().find(|r| {
                keys.iter()
                    .zip(&key_values)
                    .all(|(&k, key)| values_equal(&r.values[k], key))
            });
            match existing {
                Some(current) => {
                    let mut updated = current.values;
                    for (&p, value) in positions.iter().zip(listed) {
                        updated[p] = value;
                    }
                    table.update_row(current.id, updated)?;
                }
                None => {
                    let row = build_row(&columns, &positions, listed)?;
                    table.insert_row(row)?;
                }
            }
            merged += 1;
        }
        debug!(table = %merge.table, rows = merged, "merged rows by key");
        Ok(ExecutionResult::merged(merged))
    }

    // ---- MERGE ... USING ----

    /// For each source row, find the first target row satisfying ON and run
    /// the first WHEN clause that applies to the outcome.
    pub(crate) fn execute_merge_using(
        &mut self,
        merge: &MergeUsingStatement,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<ExecutionResult> {
        check_merge_clauses(merge)?;
        let target_name = &merge.target.table;
        let columns = self.table(target_name)?.columns().to_vec();
        let target_scope = ColumnScope::table(merge.target.visible_name(), columns.clone());
        let (source_scope, source_rows) = match &merge.source {
            MergeSource::Table(source) => self.table_source(source)?,
            MergeSource::Query { query, alias } => {
                let (source_columns, rows) = self.run_query(query, outer)?;
                (ColumnScope::table(alias, source_columns), rows)
            }
        };
        let scope = target_scope.join(&source_scope);
        let width = columns.len();

        let mut affected = 0;
        for source in &source_rows {
            // Earlier source rows may have changed the target, so search the
            // live table each time.
            let mut matched: Option<(i64, Vec<Value>)> = None;
            let targets = self.table(target_name)?.all_rows();
            for target in targets {
                let mut combined = target.values;
                combined.extend(source.values.iter().cloned());
                let hit = {
                    let ctx = ExecutionContext::new(&scope, &combined, outer);
                    self.eval_predicate(&merge.on, &ctx)?
                };
                if hit {
                    matched = Some((target.id, combined));
                    break;
                }
            }
            let (target_id, combined) = match matched {
                Some((id, combined)) => (Some(id), combined),
                None => {
                    let mut combined = vec![Value::Null; width];
                    combined.extend(source.values.iter().cloned());
                    (None, combined)
                }
            };
            let ctx = ExecutionContext::new(&scope, &combined, outer);

            for clause in &merge.clauses {
                if clause.matched != target_id.is_some() {
                    continue;
                }
                if let Some(condition) = &clause.condition {
                    if !self.eval_predicate(condition, &ctx)? {
                        continue;
                    }
                }
                match (&clause.action, target_id) {
                    (MergeAction::Update(assignments), Some(id)) => {
                        let assignments = resolve_assignments(target_name, &columns, assignments)?;
                        let current = combined[..width].to_vec();
                        let values = self.assign(&columns, &assignments, current, &ctx)?;
                        self.table_mut(target_name)?.update_row(id, values)?;
                    }
                    (MergeAction::Delete, Some(id)) => {
                        self.table_mut(target_name)?.delete_row(id);
                    }
                    (MergeAction::Insert { columns: names, values }, None) => {
                        let positions = target_positions(target_name, &columns, names.as_deref())?;
                        let mut raw = Vec::with_capacity(values.len());
                        for expr in values {
                            raw.push(self.eval(expr, &ctx)?);
                        }
                        let row = build_row(&columns, &positions, raw)?;
                        self.table_mut(target_name)?.insert_row(row)?;
                    }
                    _ => {
                        return Err(HorizonError::Internal(
                            "MERGE action does not fit its WHEN clause".into(),
                        ))
                    }
                }
                affected += 1;
                break;
            }
        }
        debug!(
            table = %target_name,
            source_rows = source_rows.len(),
            rows = affected,
            "merged rows from source"
        );
        Ok(ExecutionResult::merged(affected))
    }
}

/// UPDATE and DELETE need a matched row, INSERT needs its absence.
fn check_merge_clauses(merge: &MergeUsingStatement) -> Result<()> {
    for clause in &merge.clauses {
        let fits = match clause.action {
            MergeAction::Update(_) | MergeAction::Delete => clause.matched,
            MergeAction::Insert { .. } => !clause.matched,
        };
        if !fits {
            let action = match clause.action {
                MergeAction::Update(_) => "UPDATE",
                MergeAction::Delete => "DELETE",
                MergeAction::Insert { .. } => "INSERT",
            };
            let when = if clause.matched { "MATCHED" } else { "NOT MATCHED" };
            return Err(HorizonError::InvalidMerge(format!(
                "{action} is not allowed in WHEN {when}"
            )));
        }
    }
    Ok(())
}

fn primary_key_columns(
    indexes: &[IndexInfo],
    table: &TableName,
) -> Result<Vec<String>> {
    indexes
        .iter()
        .find(|i| i.unique && i.name.starts_with("PRIMARY_KEY_"))
        .map(|i| i.columns.clone())
        .ok_or_else(|| {
            HorizonError::InvalidMerge(format!(
                "{table} needs KEY columns or a primary key"
            ))
        })
}

fn column_position(table: &TableName, columns: &[Column], name: &str) -> Result<usize> {
    find_column_index(columns, name)
        .ok_or_else(|| HorizonError::ColumnNotFound(format!("{}.{}", table, name)))
}

/// Column positions targeted by an optional column list. Without a list
/// every column is targeted in declaration order.
fn target_positions(
    table: &TableName,
    columns: &[Column],
    names: Option<&[String]>,
) -> Result<Vec<usize>> {
    match names {
        Some(names) => names
            .iter()
            .map(|name| column_position(table, columns, name))
            .collect(),
        None => Ok((0..columns.len()).collect()),
    }
}

fn resolve_assignments<'e>(
    table: &TableName,
    columns: &[Column],
    assignments: &'e [(String, Expr)],
) -> Result<Vec<(usize, &'e Expr)>> {
    assignments
        .iter()
        .map(|(name, expr)| Ok((column_position(table, columns, name)?, expr)))
        .collect()
}

fn check_arity(positions: &[usize], values: &[Value]) -> Result<()> {
    if values.len() != positions.len() {
        return Err(HorizonError::ColumnCountMismatch(format!(
            "expected {} values but got {}",
            positions.len(),
            values.len()
        )));
    }
    Ok(())
}

/// Lay `values` out at `positions` over a row of column defaults, then
/// coerce every value to its column type.
fn build_row(columns: &[Column], positions: &[usize], values: Vec<Value>) -> Result<Vec<Value>> {
    check_arity(positions, &values)?;
    let mut row: Vec<Value> = columns
        .iter()
        .map(|c| c.default.clone().unwrap_or(Value::Null))
        .collect();
    for (&position, value) in positions.iter().zip(values) {
        row[position] = value;
    }
    columns
        .iter()
        .zip(&row)
        .map(|(column, value)| column.coerce(value))
        .collect()
}
