//! Grouping and aggregate functions.
//!
//! The grouping stage turns the filtered FROM rows into one row per group.
//! Each output row is the group's first input row (its representative)
//! followed by one hidden column per distinct aggregate call found in the
//! select list, HAVING and ORDER BY. Those expressions are then rewritten
//! to read the hidden columns, so the later pipeline stages evaluate them
//! with the ordinary scalar evaluator.
//!
//! Non-grouped columns read from the representative row. Whether they are
//! functionally dependent on the GROUP BY keys is not checked.

use std::collections::HashMap;

use tracing::debug;

use super::context::{ColumnScope, ExecutionContext};
use super::Executor;
use crate::catalog::{Column, Row};
use crate::error::{HorizonError, Result};
use crate::sql::ast::{AggregateFunc, Expr};
use crate::types::{compare_values, values_equal, DataType, Value};

const KEY_SEPARATOR: char = '\u{1f}';
const NULL_KEY: &str = "\u{0}NULL";

/// Output of the grouping stage.
pub(crate) struct Grouped {
    /// Input columns followed by the hidden aggregate columns.
    pub scope: ColumnScope,
    pub rows: Vec<Row>,
    /// Distinct aggregate calls, in hidden-column order.
    pub aggregates: Vec<Expr>,
}

/// Rewrite `expr` so its calls to `aggregates` read the hidden columns the
/// grouping stage appended.
pub(crate) fn rewrite_aggregates(expr: &Expr, aggregates: &[Expr]) -> Expr {
    expr.transform(&mut |e| {
        if !matches!(e, Expr::Aggregate { .. }) {
            return None;
        }
        aggregates
            .iter()
            .position(|a| a == e)
            .map(|i| Expr::col(hidden_column(i)))
    })
}

fn hidden_column(index: usize) -> String {
    format!("$agg{index}")
}

/// Distinct aggregate calls in `exprs`, in first-seen order.
pub(crate) fn collect_aggregates<'e>(exprs: impl IntoIterator<Item = &'e Expr>) -> Vec<Expr> {
    let mut found: Vec<Expr> = Vec::new();
    for expr in exprs {
        expr.walk(&mut |e| {
            if matches!(e, Expr::Aggregate { .. }) {
                if !found.contains(e) {
                    found.push(e.clone());
                }
                return false;
            }
            true
        });
    }
    found
}

impl Executor<'_> {
    /// Group `rows` by `group_by` and compute `aggregates` for each group.
    ///
    /// Without GROUP BY all rows form one group, which exists even when
    /// there are no rows. With GROUP BY, groups are emitted in the order
    /// their first row was seen.
    pub(crate) fn group_rows(
        &mut self,
        scope: ColumnScope,
        rows: Vec<Row>,
        group_by: &[Expr],
        aggregates: Vec<Expr>,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<Grouped> {
        let groups: Vec<Vec<Row>> = if group_by.is_empty() {
            vec![rows]
        } else {
            let mut index: HashMap<String, usize> = HashMap::new();
            let mut groups: Vec<Vec<Row>> = Vec::new();
            for row in rows {
                let key = {
                    let ctx = ExecutionContext::new(&scope, &row.values, outer);
                    let mut parts = Vec::with_capacity(group_by.len());
                    for expr in group_by {
                        let value = self.eval(expr, &ctx)?;
                        parts.push(if value.is_null() {
                            NULL_KEY.to_string()
                        } else {
                            value.to_string()
                        });
                    }
                    parts.join(&KEY_SEPARATOR.to_string())
                };
                match index.get(&key) {
                    Some(&i) => groups[i].push(row),
                    None => {
                        index.insert(key, groups.len());
                        groups.push(vec![row]);
                    }
                }
            }
            groups
        };

        let width = scope.width();
        let mut output = Vec::with_capacity(groups.len());
        for group in &groups {
            let mut values = match group.first() {
                Some(first) => first.values.clone(),
                None => vec![Value::Null; width],
            };
            for aggregate in &aggregates {
                values.push(self.compute_aggregate(aggregate, group, &scope, outer)?);
            }
            output.push(Row::synthetic(values));
        }
        debug!(
            groups = output.len(),
            aggregates = aggregates.len(),
            "grouped rows"
        );

        let mut grouped_scope = scope;
        grouped_scope.extend_anonymous(
            (0..aggregates.len()).map(|i| Column::new(hidden_column(i), DataType::Varchar(None))),
        );
        Ok(Grouped {
            scope: grouped_scope,
            rows: output,
            aggregates,
        })
    }

    fn compute_aggregate(
        &mut self,
        aggregate: &Expr,
        group: &[Row],
        scope: &ColumnScope,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<Value> {
        let Expr::Aggregate {
            func,
            arg,
            distinct,
        } = aggregate
        else {
            return Err(HorizonError::Internal(
                "non-aggregate expression in aggregate list".into(),
            ));
        };
        let Some(arg) = arg else {
            // COUNT(*) counts rows regardless of their values.
            return Ok(Value::BigInt(group.len() as i64));
        };

        let mut values = Vec::with_capacity(group.len());
        for row in group {
            let ctx = ExecutionContext::new(scope, &row.values, outer);
            let value = self.eval(arg, &ctx)?;
            if !value.is_null() {
                values.push(value);
            }
        }
        if *distinct {
            values = distinct_values(values);
        }
        accumulate(*func, &values)
    }
}

fn distinct_values(mut values: Vec<Value>) -> Vec<Value> {
    values.sort_by(compare_values);
    values.dedup_by(|a, b| values_equal(a, b));
    values
}

/// Fold non-null values with one aggregate function.
fn accumulate(func: AggregateFunc, values: &[Value]) -> Result<Value> {
    match func {
        AggregateFunc::Count => Ok(Value::BigInt(values.len() as i64)),
        AggregateFunc::Sum => Ok(Value::Double(sum(func, values)?)),
        AggregateFunc::Avg => {
            if values.is_empty() {
                return Ok(Value::Null);
            }
            Ok(Value::Double(sum(func, values)? / values.len() as f64))
        }
        AggregateFunc::Min => Ok(values
            .iter()
            .min_by(|a, b| compare_values(a, b))
            .cloned()
            .unwrap_or(Value::Null)),
        AggregateFunc::Max => Ok(values
            .iter()
            .max_by(|a, b| compare_values(a, b))
            .cloned()
            .unwrap_or(Value::Null)),
    }
}

/// Sum in double precision. An empty input sums to `0.0`.
fn sum(func: AggregateFunc, values: &[Value]) -> Result<f64> {
    values.iter().try_fold(0.0, |acc, value| {
        let x = match value {
            Value::Text(_) | Value::Boolean(_) => DataType::Double.convert(value)?.as_f64(),
            other => other.as_f64(),
        };
        x.map(|x| acc + x).ok_or_else(|| {
            HorizonError::TypeError(format!(
                "{} expects numeric values, got {}",
                func.name(),
                value.type_name()
            ))
        })
    })
}
