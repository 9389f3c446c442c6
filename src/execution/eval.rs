//! Scalar expression evaluation.
//!
//! [`Executor::eval`] evaluates one expression against one
//! [`ExecutionContext`]. Logical operators and comparisons use three-valued
//! logic: a NULL operand makes a comparison NULL, and `AND`/`OR` only turn
//! NULL into a definite answer when the other side decides the result.
//!
//! Aggregate calls never reach this evaluator; the aggregation stage
//! replaces them with references to precomputed columns first.

use std::cmp::Ordering;

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::context::ExecutionContext;
use super::Executor;
use crate::error::{HorizonError, Result};
use crate::sql::ast::{BinaryOp, Expr, Query, SequenceOp, TableName, UnaryOp};
use crate::types::{compare_values, values_equal, Value};

impl Executor<'_> {
    /// Evaluate `expr` for the row bound in `ctx`.
    pub(crate) fn eval(&mut self, expr: &Expr, ctx: &ExecutionContext<'_>) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Column { table, name } => ctx.column_value(table.as_deref(), name),
            Expr::BinaryOp { left, op, right } => self.eval_binary(left, *op, right, ctx),
            Expr::UnaryOp { op, expr } => {
                let value = self.eval(expr, ctx)?;
                eval_unary(*op, &value)
            }
            Expr::IsNull { expr, negated } => {
                let value = self.eval(expr, ctx)?;
                Ok(Value::Boolean(value.is_null() != *negated))
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = self.eval(expr, ctx)?;
                let low = self.eval(low, ctx)?;
                let high = self.eval(high, ctx)?;
                let within = and3(
                    &compare(BinaryOp::GtEq, &value, &low),
                    &compare(BinaryOp::LtEq, &value, &high),
                );
                Ok(if *negated { not3(&within) } else { within })
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let value = self.eval(expr, ctx)?;
                let mut candidates = Vec::with_capacity(list.len());
                for item in list {
                    candidates.push(self.eval(item, ctx)?);
                }
                Ok(membership(&value, candidates.iter(), *negated))
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let value = self.eval(expr, ctx)?;
                let pattern = self.eval(pattern, ctx)?;
                if value.is_null() || pattern.is_null() {
                    return Ok(Value::Null);
                }
                let matched = like_match(&value.to_string(), &pattern.to_string())?;
                Ok(Value::Boolean(matched != *negated))
            }
            Expr::Function { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, ctx)?);
                }
                call_function(name, &values)
            }
            Expr::Aggregate { func, .. } => Err(HorizonError::Unsupported(format!(
                "aggregate function {} is not allowed here",
                func.name()
            ))),
            Expr::Cast { expr, data_type } => {
                let value = self.eval(expr, ctx)?;
                data_type.convert(&value)
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                let operand = match operand {
                    Some(expr) => Some(self.eval(expr, ctx)?),
                    None => None,
                };
                for (when, then) in when_clauses {
                    let hit = match &operand {
                        Some(subject) => {
                            let candidate = self.eval(when, ctx)?;
                            compare(BinaryOp::Eq, subject, &candidate).to_bool()
                        }
                        None => self.eval(when, ctx)?.to_bool(),
                    };
                    if hit {
                        return self.eval(then, ctx);
                    }
                }
                match else_clause {
                    Some(expr) => self.eval(expr, ctx),
                    None => Ok(Value::Null),
                }
            }
            Expr::Subquery(query) => self.eval_scalar_subquery(query, ctx),
            Expr::Exists { query, negated } => {
                let (_, rows) = self.run_query(query, Some(ctx))?;
                Ok(Value::Boolean(rows.is_empty() == *negated))
            }
            Expr::InSubquery {
                expr,
                query,
                negated,
            } => {
                let value = self.eval(expr, ctx)?;
                let (columns, rows) = self.run_query(query, Some(ctx))?;
                if columns.len() != 1 {
                    return Err(HorizonError::SubqueryNotSingleColumn);
                }
                Ok(membership(
                    &value,
                    rows.iter().filter_map(|r| r.values.first()),
                    *negated,
                ))
            }
            Expr::Sequence { name, op } => self.eval_sequence(name, *op),
        }
    }

    /// Evaluate a filter condition. NULL counts as false.
    pub(crate) fn eval_predicate(&mut self, expr: &Expr, ctx: &ExecutionContext<'_>) -> Result<bool> {
        Ok(self.eval(expr, ctx)?.to_bool())
    }

    fn eval_binary(
        &mut self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Value> {
        let left = self.eval(left, ctx)?;
        // Short-circuit when the left side already decides the result.
        match (op, truth(&left)) {
            (BinaryOp::And, Some(false)) => return Ok(Value::Boolean(false)),
            (BinaryOp::Or, Some(true)) => return Ok(Value::Boolean(true)),
            _ => {}
        }
        let right = self.eval(right, ctx)?;
        binary_value(op, &left, &right)
    }

    fn eval_scalar_subquery(&mut self, query: &Query, ctx: &ExecutionContext<'_>) -> Result<Value> {
        let (_, rows) = self.run_query(query, Some(ctx))?;
        if rows.len() > 1 {
            return Err(HorizonError::SubqueryTooManyRows);
        }
        let Some(row) = rows.into_iter().next() else {
            return Ok(Value::Null);
        };
        if row.values.len() != 1 {
            return Err(HorizonError::SubqueryNotSingleColumn);
        }
        Ok(row.values.into_iter().next().unwrap_or(Value::Null))
    }

    fn eval_sequence(&mut self, name: &TableName, op: SequenceOp) -> Result<Value> {
        let schema = name
            .schema
            .clone()
            .unwrap_or_else(|| self.config.default_schema.clone());
        let sequence = self
            .storage
            .get_sequence_mut(&schema, &name.name)
            .ok_or_else(|| HorizonError::SequenceNotFound(name.name.clone()))?;
        let value = match op {
            SequenceOp::Next => sequence.next_value()?,
            SequenceOp::Current => sequence.current_value()?,
        };
        Ok(Value::BigInt(value))
    }
}

// ---- operators ----

/// Apply a binary operator to two already-evaluated operands.
pub(crate) fn binary_value(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match op {
        BinaryOp::Add => left.add(right),
        BinaryOp::Sub => left.sub(right),
        BinaryOp::Mul => left.mul(right),
        BinaryOp::Div => left.div(right),
        BinaryOp::Mod => left.rem(right),
        BinaryOp::Concat => Ok(left.concat(right)),
        BinaryOp::And => Ok(and3(left, right)),
        BinaryOp::Or => Ok(or3(left, right)),
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::Gt
        | BinaryOp::LtEq
        | BinaryOp::GtEq => Ok(compare(op, left, right)),
    }
}

fn eval_unary(op: UnaryOp, value: &Value) -> Result<Value> {
    match op {
        UnaryOp::Neg => value.negate(),
        UnaryOp::Not => Ok(not3(value)),
    }
}

/// Comparison with NULL propagation. Non-null operands are ordered by
/// [`compare_values`], so numeric subtypes compare numerically and
/// incomparable pairs fall back to their string forms.
fn compare(op: BinaryOp, left: &Value, right: &Value) -> Value {
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    let ord = compare_values(left, right);
    let result = match op {
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::NotEq => ord != Ordering::Equal,
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Gt => ord == Ordering::Greater,
        BinaryOp::LtEq => ord != Ordering::Greater,
        BinaryOp::GtEq => ord != Ordering::Less,
        _ => return Value::Null,
    };
    Value::Boolean(result)
}

fn truth(value: &Value) -> Option<bool> {
    if value.is_null() {
        None
    } else {
        Some(value.to_bool())
    }
}

fn from_truth(truth: Option<bool>) -> Value {
    truth.map_or(Value::Null, Value::Boolean)
}

fn and3(left: &Value, right: &Value) -> Value {
    match (truth(left), truth(right)) {
        (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
        (Some(true), Some(true)) => Value::Boolean(true),
        _ => Value::Null,
    }
}

fn or3(left: &Value, right: &Value) -> Value {
    match (truth(left), truth(right)) {
        (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
        (Some(false), Some(false)) => Value::Boolean(false),
        _ => Value::Null,
    }
}

fn not3(value: &Value) -> Value {
    from_truth(truth(value).map(|b| !b))
}

/// `value [NOT] IN (candidates)`: TRUE on a match, NULL if there was no match
/// but a NULL was involved, FALSE otherwise (inverted when negated).
fn membership<'v>(
    value: &Value,
    candidates: impl Iterator<Item = &'v Value>,
    negated: bool,
) -> Value {
    let mut saw_null = value.is_null();
    if !saw_null {
        for candidate in candidates {
            if candidate.is_null() {
                saw_null = true;
            } else if values_equal(value, candidate) {
                return Value::Boolean(!negated);
            }
        }
    }
    if saw_null {
        Value::Null
    } else {
        Value::Boolean(negated)
    }
}

// ---- LIKE ----

/// Whole-string SQL LIKE match: `%` is any run of characters, `_` exactly
/// one, and `\` escapes the next pattern character.
pub(crate) fn like_match(text: &str, pattern: &str) -> Result<bool> {
    let re = Regex::new(&like_to_regex(pattern))
        .map_err(|e| HorizonError::Internal(format!("invalid LIKE pattern {pattern:?}: {e}")))?;
    Ok(re.is_match(text))
}

fn like_to_regex(pattern: &str) -> String {
    let mut out = String::from("(?s)^");
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => out.push_str(&regex::escape("\\")),
            },
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

// ---- scalar functions ----

fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(HorizonError::InvalidArgument {
            function: name.to_string(),
            value: format!("({} arguments)", args.len()),
        });
    }
    Ok(())
}

fn numeric_arg(function: &str, value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        HorizonError::TypeError(format!(
            "{function} expects a numeric argument, got {}",
            value.type_name()
        ))
    })
}

fn integer_arg(function: &str, value: &Value) -> Result<i64> {
    let integral = match value {
        Value::Integer(_) | Value::BigInt(_) => value.as_i64(),
        other => other.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64),
    };
    integral.ok_or_else(|| HorizonError::InvalidArgument {
        function: function.to_string(),
        value: value.to_sql_literal(),
    })
}

/// Call a scalar function by (case-insensitive) name.
pub(crate) fn call_function(name: &str, args: &[Value]) -> Result<Value> {
    let upper = name.to_uppercase();
    let name = upper.as_str();
    match name {
        "COALESCE" => {
            check_arity(name, args, 1, usize::MAX)?;
            return Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null));
        }
        "IFNULL" => {
            check_arity(name, args, 2, 2)?;
            return Ok(if args[0].is_null() { args[1].clone() } else { args[0].clone() });
        }
        "NULLIF" => {
            check_arity(name, args, 2, 2)?;
            let equal = !args[1].is_null() && values_equal(&args[0], &args[1]);
            return Ok(if equal { Value::Null } else { args[0].clone() });
        }
        "CONCAT" => {
            // NULL arguments are skipped rather than nulling the result.
            let joined: String = args
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| v.to_string())
                .collect();
            return Ok(Value::Text(joined));
        }
        _ => {}
    }

    // Everything below returns NULL on any NULL argument.
    if args.iter().any(Value::is_null) {
        return match name {
            "ABS" | "SQRT" | "POWER" | "ROUND" | "FLOOR" | "CEIL" | "CEILING" | "MOD" | "SIGN"
            | "UPPER" | "LOWER" | "LENGTH" | "TRIM" | "LTRIM" | "RTRIM" | "SUBSTRING"
            | "SUBSTR" | "REPLACE" => Ok(Value::Null),
            _ => Err(HorizonError::Unsupported(format!("function {name}"))),
        };
    }

    match name {
        "ABS" => {
            check_arity(name, args, 1, 1)?;
            abs(&args[0])
        }
        "SQRT" => {
            check_arity(name, args, 1, 1)?;
            let x = numeric_arg(name, &args[0])?;
            if x < 0.0 {
                return Err(HorizonError::InvalidArgument {
                    function: name.to_string(),
                    value: args[0].to_sql_literal(),
                });
            }
            Ok(Value::Double(x.sqrt()))
        }
        "POWER" => {
            check_arity(name, args, 2, 2)?;
            let base = numeric_arg(name, &args[0])?;
            let exponent = numeric_arg(name, &args[1])?;
            Ok(Value::Double(base.powf(exponent)))
        }
        "ROUND" => {
            check_arity(name, args, 1, 2)?;
            let precision = match args.get(1) {
                Some(p) => integer_arg(name, p)?,
                None => 0,
            };
            round(&args[0], precision)
        }
        "FLOOR" | "CEIL" | "CEILING" => {
            check_arity(name, args, 1, 1)?;
            let up = name != "FLOOR";
            match &args[0] {
                v @ (Value::Integer(_) | Value::BigInt(_)) => Ok(v.clone()),
                Value::Decimal(d) => Ok(Value::Decimal(if up { d.ceil() } else { d.floor() })),
                other => {
                    let x = numeric_arg(name, other)?;
                    Ok(Value::Double(if up { x.ceil() } else { x.floor() }))
                }
            }
        }
        "MOD" => {
            check_arity(name, args, 2, 2)?;
            args[0].rem(&args[1])
        }
        "SIGN" => {
            check_arity(name, args, 1, 1)?;
            let x = numeric_arg(name, &args[0])?;
            let sign = if x > 0.0 {
                1
            } else if x < 0.0 {
                -1
            } else {
                0
            };
            Ok(Value::Integer(sign))
        }
        "UPPER" => {
            check_arity(name, args, 1, 1)?;
            Ok(Value::Text(args[0].to_string().to_uppercase()))
        }
        "LOWER" => {
            check_arity(name, args, 1, 1)?;
            Ok(Value::Text(args[0].to_string().to_lowercase()))
        }
        "LENGTH" => {
            check_arity(name, args, 1, 1)?;
            Ok(Value::BigInt(args[0].to_string().chars().count() as i64))
        }
        "TRIM" => {
            check_arity(name, args, 1, 1)?;
            Ok(Value::Text(args[0].to_string().trim().to_string()))
        }
        "LTRIM" => {
            check_arity(name, args, 1, 1)?;
            Ok(Value::Text(args[0].to_string().trim_start().to_string()))
        }
        "RTRIM" => {
            check_arity(name, args, 1, 1)?;
            Ok(Value::Text(args[0].to_string().trim_end().to_string()))
        }
        "SUBSTRING" | "SUBSTR" => {
            check_arity(name, args, 2, 3)?;
            let start = integer_arg(name, &args[1])?;
            let length = match args.get(2) {
                Some(l) => Some(integer_arg(name, l)?),
                None => None,
            };
            substring(name, &args[0].to_string(), start, length)
        }
        "REPLACE" => {
            check_arity(name, args, 3, 3)?;
            let text = args[0].to_string();
            let from = args[1].to_string();
            if from.is_empty() {
                return Ok(Value::Text(text));
            }
            Ok(Value::Text(text.replace(&from, &args[2].to_string())))
        }
        _ => Err(HorizonError::Unsupported(format!("function {name}"))),
    }
}

/// Absolute value, keeping the argument's numeric subtype.
fn abs(value: &Value) -> Result<Value> {
    let overflow = || HorizonError::Overflow(format!("ABS({})", value.to_sql_literal()));
    match value {
        Value::Integer(i) => i.checked_abs().map(Value::Integer).ok_or_else(overflow),
        Value::BigInt(i) => i.checked_abs().map(Value::BigInt).ok_or_else(overflow),
        Value::Real(r) => Ok(Value::Real(r.abs())),
        Value::Double(d) => Ok(Value::Double(d.abs())),
        Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
        other => Err(HorizonError::TypeError(format!(
            "ABS expects a numeric argument, got {}",
            other.type_name()
        ))),
    }
}

/// Round half to even at `precision` decimal places. Precision 0 yields an
/// integral value, anything else a double.
fn round(value: &Value, precision: i64) -> Result<Value> {
    let overflow = || HorizonError::Overflow(format!("ROUND({})", value.to_sql_literal()));
    let decimal = match value.as_decimal() {
        Some(d) => d,
        None => {
            // Non-finite floats have no decimal form; they round to themselves.
            let x = numeric_arg("ROUND", value)?;
            return Ok(Value::Double(x));
        }
    };
    let rounded = if precision >= 0 {
        let dp = u32::try_from(precision).map_err(|_| overflow())?;
        decimal.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven)
    } else {
        let exponent = u32::try_from(-precision).map_err(|_| overflow())?;
        let factor = 10i64
            .checked_pow(exponent)
            .map(Decimal::from)
            .ok_or_else(overflow)?;
        let scaled = decimal.checked_div(factor).ok_or_else(overflow)?;
        scaled
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
            .checked_mul(factor)
            .ok_or_else(overflow)?
    };
    if precision == 0 {
        rounded.to_i64().map(Value::BigInt).ok_or_else(overflow)
    } else {
        rounded.to_f64().map(Value::Double).ok_or_else(overflow)
    }
}

/// 1-based SUBSTRING. Positions before the first character still consume
/// length, so `SUBSTRING('hello', 0, 3)` is `'he'`.
fn substring(function: &str, text: &str, start: i64, length: Option<i64>) -> Result<Value> {
    let begin = start.saturating_sub(1);
    let end = match length {
        Some(len) if len < 0 => {
            return Err(HorizonError::InvalidArgument {
                function: function.to_string(),
                value: len.to_string(),
            })
        }
        Some(len) => Some(begin.saturating_add(len)),
        None => None,
    };
    let begin = begin.max(0) as usize;
    let chars = text.chars().skip(begin);
    let result: String = match end {
        Some(end) => chars.take((end.max(0) as usize).saturating_sub(begin)).collect(),
        None => chars.collect(),
    };
    Ok(Value::Text(result))
}
