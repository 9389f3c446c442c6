//! The SELECT pipeline, compound queries and common table expressions.
//!
//! A SELECT runs its stages in a fixed order, each consuming the rows the
//! previous stage produced:
//!
//! FROM -> WHERE -> GROUP BY / aggregates -> HAVING -> ORDER BY ->
//! LIMIT/OFFSET -> projection
//!
//! With DISTINCT, projection and deduplication run before LIMIT/OFFSET so the
//! limit counts distinct rows.

use std::collections::HashSet;

use tracing::debug;

use super::aggregate::{collect_aggregates, rewrite_aggregates};
use super::context::{display_name, ColumnScope, ExecutionContext};
use super::{CteTable, Executor};
use crate::catalog::{Column, Row};
use crate::error::{HorizonError, Result};
use crate::sql::ast::{CommonTableExpr, Expr, Query, SelectColumn, SelectStatement, SetOperator};
use crate::types::{compare_values, DataType, HashKey, Value};

/// One output column: a scope column passed through by `*`, or an
/// expression evaluated per row.
#[derive(Debug, Clone)]
enum Output {
    Position(usize),
    Expr(Expr),
}

struct Projection {
    columns: Vec<Column>,
    outputs: Vec<Output>,
    aliases: Vec<Option<String>>,
}

struct SortKey {
    output: Output,
    desc: bool,
}

impl Executor<'_> {
    /// Run a query and return its output columns and rows.
    pub(crate) fn run_query(
        &mut self,
        query: &Query,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<(Vec<Column>, Vec<Row>)> {
        match query {
            Query::Select(select) => self.run_select(select, outer),
            Query::Compound { op, left, right } => {
                let (columns, left_rows) = self.run_query(left, outer)?;
                let (right_columns, right_rows) = self.run_query(right, outer)?;
                if columns.len() != right_columns.len() {
                    return Err(HorizonError::ColumnCountMismatch(format!(
                        "{:?} operands have {} and {} columns",
                        op,
                        columns.len(),
                        right_columns.len()
                    )));
                }
                let rows = set_operation(*op, left_rows, right_rows);
                debug!(op = ?op, rows = rows.len(), "compound query");
                Ok((columns, rows))
            }
            Query::With { ctes, body } => {
                let depth = self.ctes.len();
                let result = self.run_with(ctes, body, outer);
                self.ctes.truncate(depth);
                result
            }
        }
    }

    fn run_with(
        &mut self,
        ctes: &[CommonTableExpr],
        body: &Query,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<(Vec<Column>, Vec<Row>)> {
        for cte in ctes {
            let (columns, rows) = self.run_query(&cte.query, outer)?;
            debug!(cte = %cte.name, rows = rows.len(), "materialized CTE");
            self.ctes.push(CteTable {
                name: cte.name.clone(),
                columns,
                rows,
            });
        }
        self.run_query(body, outer)
    }

    fn run_select(
        &mut self,
        select: &SelectStatement,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<(Vec<Column>, Vec<Row>)> {
        let (scope, rows) = match &select.from {
            Some(from) => self.resolve_from(from, outer)?,
            None => (ColumnScope::empty(), vec![Row::synthetic(Vec::new())]),
        };

        let rows = match &select.where_clause {
            Some(condition) => self.filter_rows(&scope, rows, condition, outer)?,
            None => rows,
        };

        let select_exprs: Vec<&Expr> = select
            .columns
            .iter()
            .filter_map(|c| match c {
                SelectColumn::Expr { expr, .. } => Some(expr),
                _ => None,
            })
            .collect();
        let needs_grouping = !select.group_by.is_empty()
            || select_exprs.iter().any(|e| e.contains_aggregate())
            || select.having.as_ref().is_some_and(Expr::contains_aggregate)
            || select.order_by.iter().any(|o| o.expr.contains_aggregate());

        let (scope, rows, aggregates) = if needs_grouping {
            let aggregates = collect_aggregates(
                select_exprs
                    .iter()
                    .copied()
                    .chain(select.having.as_ref())
                    .chain(select.order_by.iter().map(|o| &o.expr)),
            );
            let grouped = self.group_rows(scope, rows, &select.group_by, aggregates, outer)?;
            (grouped.scope, grouped.rows, grouped.aggregates)
        } else {
            (scope, rows, Vec::new())
        };

        let projection = project_columns(select, &scope, &aggregates)?;

        let rows = match &select.having {
            Some(having) => {
                let having = rewrite_aggregates(having, &aggregates);
                self.filter_rows(&scope, rows, &having, outer)?
            }
            None => rows,
        };

        let rows = if select.order_by.is_empty() {
            rows
        } else {
            let keys = sort_keys(select, &projection, &aggregates)?;
            self.sort_rows(&scope, rows, &keys, outer)?
        };

        self.validate_columns(&projection, &scope, outer)?;

        let rows = if select.distinct {
            let projected = self.project_rows(&projection, &scope, rows, outer)?;
            let distinct = distinct_rows(projected);
            self.apply_limit(select, distinct, outer)?
        } else {
            let limited = self.apply_limit(select, rows, outer)?;
            self.project_rows(&projection, &scope, limited, outer)?
        };
        debug!(rows = rows.len(), columns = projection.columns.len(), "select finished");
        Ok((projection.columns, rows))
    }

    /// Keep the rows for which `condition` is true. Null and false both
    /// exclude the row.
    pub(crate) fn filter_rows(
        &mut self,
        scope: &ColumnScope,
        rows: Vec<Row>,
        condition: &Expr,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<Vec<Row>> {
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            let keep = {
                let ctx = ExecutionContext::new(scope, &row.values, outer);
                self.eval_predicate(condition, &ctx)?
            };
            if keep {
                kept.push(row);
            }
        }
        Ok(kept)
    }

    fn output_value(&mut self, output: &Output, ctx: &ExecutionContext<'_>) -> Result<Value> {
        match output {
            Output::Position(i) => Ok(ctx.row().get(*i).cloned().unwrap_or(Value::Null)),
            Output::Expr(expr) => self.eval(expr, ctx),
        }
    }

    /// Stable sort on precomputed keys. Nulls sort first ascending.
    fn sort_rows(
        &mut self,
        scope: &ColumnScope,
        rows: Vec<Row>,
        keys: &[SortKey],
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<Vec<Row>> {
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let values = {
                let ctx = ExecutionContext::new(scope, &row.values, outer);
                let mut values = Vec::with_capacity(keys.len());
                for key in keys {
                    values.push(self.output_value(&key.output, &ctx)?);
                }
                values
            };
            keyed.push((values, row));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            for ((x, y), key) in a.iter().zip(b).zip(keys) {
                let ordering = compare_values(x, y);
                let ordering = if key.desc { ordering.reverse() } else { ordering };
                if ordering.is_ne() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }

    fn apply_limit(
        &mut self,
        select: &SelectStatement,
        rows: Vec<Row>,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<Vec<Row>> {
        if select.limit.is_none() && select.offset.is_none() {
            return Ok(rows);
        }
        let len = rows.len();
        let offset = match &select.offset {
            Some(expr) => self.eval_count(expr, outer)?.unwrap_or(0).min(len),
            None => 0,
        };
        let limit = match &select.limit {
            Some(expr) => self.eval_count(expr, outer)?.unwrap_or(len),
            None => len,
        };
        let limit = limit.min(len - offset);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    /// Evaluate a LIMIT or OFFSET expression. Negative values clamp to zero;
    /// null means "no bound".
    fn eval_count(
        &mut self,
        expr: &Expr,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<Option<usize>> {
        let scope = ColumnScope::empty();
        let ctx = ExecutionContext::new(&scope, &[], outer);
        let value = self.eval(expr, &ctx)?;
        if value.is_null() {
            return Ok(None);
        }
        let n = DataType::BigInt.convert(&value)?.as_i64().unwrap_or(0);
        Ok(Some(usize::try_from(n.max(0)).unwrap_or(usize::MAX)))
    }

    /// Fail on the first select-list column reference that resolves neither
    /// in `scope` nor in an enclosing context.
    fn validate_columns(
        &self,
        projection: &Projection,
        scope: &ColumnScope,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<()> {
        let ctx = ExecutionContext::new(scope, &[], outer);
        for output in &projection.outputs {
            let Output::Expr(expr) = output else {
                continue;
            };
            let mut missing = None;
            expr.walk(&mut |e| {
                if missing.is_some() {
                    return false;
                }
                if let Expr::Column { table, name } = e {
                    if !ctx.can_resolve(table.as_deref(), name) {
                        missing = Some(display_name(table.as_deref(), name));
                    }
                }
                true
            });
            if let Some(column) = missing {
                return Err(HorizonError::ColumnNotFound(column));
            }
        }
        Ok(())
    }

    fn project_rows(
        &mut self,
        projection: &Projection,
        scope: &ColumnScope,
        rows: Vec<Row>,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<Vec<Row>> {
        let mut projected = Vec::with_capacity(rows.len());
        for row in rows {
            let ctx = ExecutionContext::new(scope, &row.values, outer);
            let mut values = Vec::with_capacity(projection.outputs.len());
            for output in &projection.outputs {
                values.push(self.output_value(output, &ctx)?);
            }
            projected.push(Row::synthetic(values));
        }
        Ok(projected)
    }
}

// ---- projection ----

fn project_columns(
    select: &SelectStatement,
    scope: &ColumnScope,
    aggregates: &[Expr],
) -> Result<Projection> {
    let mut projection = Projection {
        columns: Vec::new(),
        outputs: Vec::new(),
        aliases: Vec::new(),
    };
    for item in &select.columns {
        match item {
            SelectColumn::AllColumns => {
                for (i, column) in scope.columns().iter().enumerate() {
                    // Hidden aggregate columns have no owning table.
                    if scope.owner_of(i).is_some() {
                        projection.push_position(i, column.clone());
                    }
                }
            }
            SelectColumn::TableAllColumns(table) => {
                let range = scope
                    .table_range(table)
                    .ok_or_else(|| HorizonError::TableNotFound(table.clone()))?;
                for i in range {
                    projection.push_position(i, scope.columns()[i].clone());
                }
            }
            SelectColumn::Expr { expr, alias } => {
                let name = match (alias, expr) {
                    (Some(alias), _) => alias.clone(),
                    (None, Expr::Column { name, .. }) => name.clone(),
                    (None, _) => format!("column{}", projection.outputs.len() + 1),
                };
                projection.columns.push(Column::new(name, DataType::Varchar(None)));
                projection
                    .outputs
                    .push(Output::Expr(rewrite_aggregates(expr, aggregates)));
                projection.aliases.push(alias.clone());
            }
        }
    }
    Ok(projection)
}

impl Projection {
    fn push_position(&mut self, index: usize, column: Column) {
        self.columns.push(column);
        self.outputs.push(Output::Position(index));
        self.aliases.push(None);
    }
}

/// Resolve ORDER BY items. A bare name matching a select-list alias sorts by
/// that item, and an integer literal sorts by the 1-based select position.
fn sort_keys(
    select: &SelectStatement,
    projection: &Projection,
    aggregates: &[Expr],
) -> Result<Vec<SortKey>> {
    select
        .order_by
        .iter()
        .map(|item| -> Result<SortKey> {
            let output = match &item.expr {
                Expr::Column { table: None, name } => projection
                    .aliases
                    .iter()
                    .position(|a| a.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(name)))
                    .map(|i| projection.outputs[i].clone()),
                Expr::Literal(value @ (Value::Integer(_) | Value::BigInt(_))) => {
                    let position = value.as_i64().unwrap_or(0);
                    let index = usize::try_from(position.saturating_sub(1))
                        .ok()
                        .filter(|i| *i < projection.outputs.len())
                        .ok_or_else(|| HorizonError::ColumnNotFound(position.to_string()))?;
                    Some(projection.outputs[index].clone())
                }
                _ => None,
            };
            Ok(SortKey {
                output: output
                    .unwrap_or_else(|| Output::Expr(rewrite_aggregates(&item.expr, aggregates))),
                desc: item.desc,
            })
        })
        .collect()
}

// ---- set operations ----

/// Row identity for deduplication: nulls compare equal to each other and
/// numerically equal values of different subtypes are duplicates.
fn row_key(row: &Row) -> Vec<Option<HashKey>> {
    row.values.iter().map(Value::hash_key).collect()
}

fn distinct_rows(rows: Vec<Row>) -> Vec<Row> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row_key(row)))
        .collect()
}

fn set_operation(op: SetOperator, left: Vec<Row>, right: Vec<Row>) -> Vec<Row> {
    match op {
        SetOperator::UnionAll => left.into_iter().chain(right).collect(),
        SetOperator::Union => distinct_rows(left.into_iter().chain(right).collect()),
        SetOperator::Intersect | SetOperator::Except => {
            let right_keys: HashSet<_> = right.iter().map(row_key).collect();
            let keep_present = op == SetOperator::Intersect;
            distinct_rows(left)
                .into_iter()
                .filter(|row| right_keys.contains(&row_key(row)) == keep_present)
                .collect()
        }
    }
}
