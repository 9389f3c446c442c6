//! FROM clause resolution and join algorithms.
//!
//! A FROM clause is one base table followed by a left-deep chain of joins.
//! Every join produces the left columns followed by the right columns, and
//! every join algorithm emits combined rows in that same left-then-right
//! layout.
//!
//! Two algorithms are available:
//!
//! - **Nested loop**: evaluates the join condition for every pair of rows
//!   against a temporary combined row. Handles any condition.
//! - **Hash join**: only for a single `col = col` condition with one column
//!   on each side. Builds a hash table over one input and probes it with the
//!   other. NULL keys never match. Every bucket hit is re-checked with
//!   [`values_equal`], and key columns holding values of more than one
//!   family (integral, floating, decimal, text, boolean) are joined with a
//!   nested loop instead, so both algorithms always agree.
//!
//! The algorithm is chosen per join from the input sizes and the condition
//! shape, see [`Executor::choose_join_algorithm`].

use std::collections::HashMap;

use tracing::{debug, trace};

use super::context::{ColumnScope, ExecutionContext};
use super::{Executor, JoinAlgorithm};
use crate::catalog::{find_column_index, Row};
use crate::error::{HorizonError, Result};
use crate::sql::ast::{BinaryOp, Expr, FromClause, Join, JoinCondition, JoinType, TableRef};
use crate::types::{values_equal, HashKey, Value};

/// Positions of the join key columns: `left` within a left row, `right`
/// within a right row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EquiKeys {
    left: usize,
    right: usize,
}

impl Executor<'_> {
    /// Resolve a FROM clause into its combined scope and rows.
    pub(crate) fn resolve_from(
        &mut self,
        from: &FromClause,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<(ColumnScope, Vec<Row>)> {
        let base = match from.tables.as_slice() {
            [single] => single,
            [] => return Err(HorizonError::Unsupported("FROM clause without a table".into())),
            _ => {
                return Err(HorizonError::Unsupported(
                    "multiple tables in FROM clause; use an explicit JOIN".into(),
                ))
            }
        };
        let (mut scope, mut rows) = self.table_source(base)?;
        for join in &from.joins {
            let (right_scope, right_rows) = self.table_source(&join.table)?;
            (scope, rows) = self.join(scope, rows, right_scope, right_rows, join, outer)?;
        }
        Ok((scope, rows))
    }

    /// Columns and a snapshot of the rows of a table or CTE.
    pub(crate) fn table_source(&self, table_ref: &TableRef) -> Result<(ColumnScope, Vec<Row>)> {
        let visible = table_ref.visible_name();
        if let Some(cte) = self.cte(&table_ref.table) {
            return Ok((
                ColumnScope::table(visible, cte.columns.clone()),
                cte.rows.clone(),
            ));
        }
        let table = self.table(&table_ref.table)?;
        Ok((
            ColumnScope::table(visible, table.columns().to_vec()),
            table.all_rows(),
        ))
    }

    fn join(
        &mut self,
        left_scope: ColumnScope,
        left_rows: Vec<Row>,
        right_scope: ColumnScope,
        right_rows: Vec<Row>,
        join: &Join,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<(ColumnScope, Vec<Row>)> {
        let condition = join_condition(&join.condition, &left_scope, &right_scope)?;
        let left_width = left_scope.width();
        let right_width = right_scope.width();
        let scope = left_scope.join(&right_scope);

        let keys = condition
            .as_ref()
            .and_then(|c| equi_join_keys(c, &scope, left_width))
            .filter(|k| single_key_family(&left_rows, k.left, &right_rows, k.right));
        let algorithm = self.choose_join_algorithm(left_rows.len(), right_rows.len(), keys.is_some());
        debug!(
            join_type = ?join.join_type,
            algorithm = ?algorithm,
            left_rows = left_rows.len(),
            right_rows = right_rows.len(),
            "joining {}",
            join.table.visible_name()
        );

        let rows = match keys {
            Some(keys) if algorithm == JoinAlgorithm::Hash => hash_join(
                join.join_type,
                &left_rows,
                &right_rows,
                keys,
                left_width,
                right_width,
            ),
            _ => self.nested_loop_join(
                join.join_type,
                &scope,
                &left_rows,
                &right_rows,
                left_width,
                condition.as_ref(),
                outer,
            )?,
        };
        Ok((scope, rows))
    }

    /// Pick the algorithm for one join. Only ever returns
    /// [`JoinAlgorithm::NestedLoop`] or [`JoinAlgorithm::Hash`].
    ///
    /// Small inputs on both sides always use nested loop. Otherwise an
    /// equi-join uses hashing when the inputs are lopsided or either side is
    /// large. Non-equi conditions and cross joins always use nested loop,
    /// even when hash join is forced by configuration.
    pub(crate) fn choose_join_algorithm(
        &self,
        left_rows: usize,
        right_rows: usize,
        equi_join: bool,
    ) -> JoinAlgorithm {
        if !equi_join {
            return JoinAlgorithm::NestedLoop;
        }
        match self.config.join_algorithm {
            JoinAlgorithm::NestedLoop => JoinAlgorithm::NestedLoop,
            JoinAlgorithm::Hash => JoinAlgorithm::Hash,
            JoinAlgorithm::Auto => {
                let threshold = self.config.small_table_threshold;
                if left_rows < threshold && right_rows < threshold {
                    return JoinAlgorithm::NestedLoop;
                }
                let small = left_rows.min(right_rows);
                let large = left_rows.max(right_rows);
                let ratio = if large == 0 {
                    1.0
                } else {
                    small as f64 / large as f64
                };
                if ratio < self.config.hash_join_size_ratio || large > self.config.hash_join_min_rows
                {
                    JoinAlgorithm::Hash
                } else {
                    JoinAlgorithm::NestedLoop
                }
            }
        }
    }

    fn nested_loop_join(
        &mut self,
        join_type: JoinType,
        scope: &ColumnScope,
        left: &[Row],
        right: &[Row],
        left_width: usize,
        condition: Option<&Expr>,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<Vec<Row>> {
        let right_width = scope.width() - left_width;
        let mut output = Vec::new();
        let mut right_matched = vec![false; right.len()];

        for l in left {
            let mut matched = false;
            for (ri, r) in right.iter().enumerate() {
                let combined = combine_values(l, r);
                let keep = match condition {
                    Some(cond) => {
                        let ctx = ExecutionContext::new(scope, &combined, outer);
                        self.eval_predicate(cond, &ctx)?
                    }
                    None => true,
                };
                if keep {
                    matched = true;
                    right_matched[ri] = true;
                    output.push(Row::synthetic(combined));
                }
            }
            if !matched && matches!(join_type, JoinType::Left | JoinType::Full) {
                output.push(pad_right(l, right_width));
            }
        }

        if matches!(join_type, JoinType::Right | JoinType::Full) {
            for (r, _) in right.iter().zip(&right_matched).filter(|(_, m)| !**m) {
                output.push(pad_left(left_width, r));
            }
        }
        Ok(output)
    }
}

/// Translate NATURAL and USING into an equality chain over qualified
/// references; ON passes through and no condition means a cross join.
fn join_condition(
    condition: &JoinCondition,
    left: &ColumnScope,
    right: &ColumnScope,
) -> Result<Option<Expr>> {
    let names: Vec<String> = match condition {
        JoinCondition::On(expr) => return Ok(Some(expr.clone())),
        JoinCondition::None => return Ok(None),
        JoinCondition::Natural => right
            .columns()
            .iter()
            .filter(|c| left.lookup_unqualified(&c.name).is_some())
            .map(|c| c.name.clone())
            .collect(),
        JoinCondition::Using(columns) => columns.clone(),
    };

    let mut chain: Option<Expr> = None;
    for name in &names {
        let li = left
            .lookup_unqualified(name)
            .ok_or_else(|| HorizonError::ColumnNotFound(name.clone()))?;
        let ri = find_column_index(right.columns(), name)
            .ok_or_else(|| HorizonError::ColumnNotFound(name.clone()))?;
        let equality = Expr::eq(
            qualified(left.owner_of(li), name),
            qualified(right.owner_of(ri), name),
        );
        chain = Some(match chain {
            Some(prev) => Expr::and(prev, equality),
            None => equality,
        });
    }
    Ok(chain)
}

fn qualified(table: Option<&str>, name: &str) -> Expr {
    match table {
        Some(t) => Expr::qcol(t, name),
        None => Expr::col(name),
    }
}

/// Recognise `a = b` where `a` and `b` are plain column references that
/// resolve to different sides of the join.
fn equi_join_keys(condition: &Expr, scope: &ColumnScope, left_width: usize) -> Option<EquiKeys> {
    let Expr::BinaryOp {
        left,
        op: BinaryOp::Eq,
        right,
    } = condition
    else {
        return None;
    };
    let a = join_column(left, scope)?;
    let b = join_column(right, scope)?;
    let (l, r) = if a < left_width && b >= left_width {
        (a, b)
    } else if b < left_width && a >= left_width {
        (b, a)
    } else {
        return None;
    };
    Some(EquiKeys {
        left: l,
        right: r - left_width,
    })
}

/// A column reference that resolves inside the join's own scope. Qualifiers
/// the scope does not know may belong to an enclosing query.
fn join_column(expr: &Expr, scope: &ColumnScope) -> Option<usize> {
    match expr {
        Expr::Column {
            table: Some(table),
            name,
        } if scope.has_table(table) => scope.resolve(Some(table), name),
        Expr::Column { table: None, name } => scope.lookup_unqualified(name),
        _ => None,
    }
}

/// Groups of values whose hash keys match exactly when the values compare
/// equal. Across families comparison goes through `f64` or display strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Boolean,
    Integral,
    Floating,
    Decimal,
    Text,
}

fn key_family(value: &Value) -> Option<KeyFamily> {
    match value {
        Value::Null => None,
        Value::Boolean(_) => Some(KeyFamily::Boolean),
        Value::Integer(_) | Value::BigInt(_) => Some(KeyFamily::Integral),
        Value::Real(_) | Value::Double(_) => Some(KeyFamily::Floating),
        Value::Decimal(_) => Some(KeyFamily::Decimal),
        Value::Text(_) => Some(KeyFamily::Text),
    }
}

/// `true` when every non-null key value on both sides is in one family.
/// Declared column types are not enough: CTE and derived columns are typed
/// VARCHAR whatever they hold.
fn single_key_family(left: &[Row], left_key: usize, right: &[Row], right_key: usize) -> bool {
    let keys = left
        .iter()
        .filter_map(|r| r.values.get(left_key))
        .chain(right.iter().filter_map(|r| r.values.get(right_key)));
    let mut family = None;
    for f in keys.filter_map(key_family) {
        match family {
            None => family = Some(f),
            Some(seen) if seen != f => return false,
            Some(_) => {}
        }
    }
    true
}

fn hash_join(
    join_type: JoinType,
    left: &[Row],
    right: &[Row],
    keys: EquiKeys,
    left_width: usize,
    right_width: usize,
) -> Vec<Row> {
    let mut output = Vec::new();
    match join_type {
        JoinType::Inner | JoinType::Cross if left.len() <= right.len() => {
            let table = BuildSide::new(left, keys.left);
            for r in right {
                for li in table.probe(r, keys.right) {
                    output.push(combine(&left[li], r));
                }
            }
        }
        JoinType::Inner | JoinType::Cross | JoinType::Left => {
            // LEFT keeps every left row, so left is always the probe side.
            let table = BuildSide::new(right, keys.right);
            for l in left {
                let matches = table.probe(l, keys.left);
                if matches.is_empty() {
                    if join_type == JoinType::Left {
                        output.push(pad_right(l, right_width));
                    }
                    continue;
                }
                for ri in matches {
                    output.push(combine(l, &right[ri]));
                }
            }
        }
        JoinType::Right => {
            let table = BuildSide::new(left, keys.left);
            for r in right {
                let matches = table.probe(r, keys.right);
                if matches.is_empty() {
                    output.push(pad_left(left_width, r));
                    continue;
                }
                for li in matches {
                    output.push(combine(&left[li], r));
                }
            }
        }
        JoinType::Full => {
            let table = BuildSide::new(left, keys.left);
            let mut left_matched = vec![false; left.len()];
            for r in right {
                let matches = table.probe(r, keys.right);
                if matches.is_empty() {
                    output.push(pad_left(left_width, r));
                    continue;
                }
                for li in matches {
                    left_matched[li] = true;
                    output.push(combine(&left[li], r));
                }
            }
            // Includes left rows whose key was NULL and never entered the table.
            for (l, _) in left.iter().zip(&left_matched).filter(|(_, m)| !**m) {
                output.push(pad_right(l, right_width));
            }
        }
    }
    output
}

/// The hashed input of a join: a multi-map from key to row positions.
struct BuildSide<'r> {
    rows: &'r [Row],
    key: usize,
    buckets: HashMap<HashKey, Vec<usize>>,
}

impl<'r> BuildSide<'r> {
    /// Rows with a NULL key are skipped.
    fn new(rows: &'r [Row], key: usize) -> Self {
        let mut buckets: HashMap<HashKey, Vec<usize>> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            if let Some(k) = row.values.get(key).and_then(Value::hash_key) {
                buckets.entry(k).or_default().push(i);
            }
        }
        trace!(build_rows = rows.len(), buckets = buckets.len(), "built hash table");
        BuildSide { rows, key, buckets }
    }

    /// Positions of build rows whose key equals `row[key]`, in build order.
    fn probe(&self, row: &Row, key: usize) -> Vec<usize> {
        let Some(value) = row.values.get(key) else {
            return Vec::new();
        };
        let Some(bucket) = value.hash_key().and_then(|k| self.buckets.get(&k)) else {
            return Vec::new();
        };
        bucket
            .iter()
            .copied()
            .filter(|&i| {
                self.rows[i]
                    .values
                    .get(self.key)
                    .map_or(false, |candidate| values_equal(candidate, value))
            })
            .collect()
    }
}

fn combine_values(left: &Row, right: &Row) -> Vec<Value> {
    let mut values = Vec::with_capacity(left.len() + right.len());
    values.extend(left.values.iter().cloned());
    values.extend(right.values.iter().cloned());
    values
}

fn combine(left: &Row, right: &Row) -> Row {
    Row::synthetic(combine_values(left, right))
}

fn pad_right(left: &Row, right_width: usize) -> Row {
    combine(left, &Row::nulls(right_width))
}

fn pad_left(left_width: usize, right: &Row) -> Row {
    combine(&Row::nulls(left_width), right)
}
