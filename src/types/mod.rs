//! Core value types and SQL type system for the Horizon engine.
//!
//! This module provides:
//! - [`Value`]: the fundamental runtime value representation. Every cell of
//!   every row, every literal, and every intermediate expression result is a
//!   `Value`.
//! - [`DataType`]: declared column types, together with the assignment
//!   conversion rules ([`DataType::convert`]) used by INSERT, UPDATE, MERGE and
//!   `CAST`.
//! - Numeric promotion for arithmetic. Operand pairs are widened to the
//!   highest-precedence numeric type present, in the order
//!   `DECIMAL > DOUBLE > REAL > BIGINT > INTEGER`.
//! - [`compare_values`] / [`values_equal`]: the total ordering used for
//!   sorting, MIN/MAX and comparison operators, and the key-equality used for
//!   deduplication and MERGE key lookup.
//! - [`HashKey`]: a hashable normalisation of non-null values used by the hash
//!   join, consistent with [`values_equal`] for same-family operands.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::{HorizonError, Result};

// ---------------------------------------------------------------------------
// DataType
// ---------------------------------------------------------------------------

/// A declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    BigInt,
    /// IEEE 754 single precision.
    Real,
    /// IEEE 754 double precision.
    Double,
    /// Arbitrary precision decimal.
    Decimal,
    /// Character data with an optional maximum length.
    Varchar(Option<usize>),
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Real => write!(f, "REAL"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Decimal => write!(f, "DECIMAL"),
            DataType::Varchar(Some(len)) => write!(f, "VARCHAR({len})"),
            DataType::Varchar(None) => write!(f, "VARCHAR"),
        }
    }
}

impl DataType {
    /// Returns `true` for the numeric types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Integer
                | DataType::BigInt
                | DataType::Real
                | DataType::Double
                | DataType::Decimal
        )
    }

    /// Converts `value` to this type following assignment rules.
    ///
    /// - NULL always stays NULL.
    /// - Numeric targets accept any numeric value (rounding fractional values
    ///   when the target is integral and failing when the result is out of
    ///   range), booleans (`1`/`0`), and text that parses as a number.
    /// - BOOLEAN accepts booleans, numbers (non-zero is true) and the strings
    ///   `TRUE`, `FALSE`, `1`, `0` in any case.
    /// - VARCHAR accepts anything and stores its display form. The length
    ///   limit is checked by the column, not here.
    ///
    /// # Examples
    ///
    /// ```
    /// use horizon::types::{DataType, Value};
    ///
    /// let v = DataType::Integer.convert(&Value::Text("42".into())).unwrap();
    /// assert!(matches!(v, Value::Integer(42)));
    ///
    /// let v = DataType::Varchar(None).convert(&Value::BigInt(7)).unwrap();
    /// assert_eq!(v, Value::Text("7".into()));
    /// ```
    pub fn convert(&self, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let converted = match self {
            DataType::Boolean => value.to_boolean().map(Value::Boolean),
            DataType::Integer => value
                .to_integral()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::Integer),
            DataType::BigInt => value.to_integral().map(Value::BigInt),
            DataType::Real => value.to_f64_lossy().and_then(|f| {
                let narrowed = f as f32;
                (narrowed.is_finite() || !f.is_finite()).then_some(Value::Real(narrowed))
            }),
            DataType::Double => value.to_f64_lossy().map(Value::Double),
            DataType::Decimal => value.to_decimal_lossy().map(Value::Decimal),
            DataType::Varchar(_) => Some(Value::Text(value.to_string())),
        };
        converted.ok_or_else(|| {
            HorizonError::TypeError(format!(
                "cannot convert {} to {}",
                value.to_sql_literal(),
                self
            ))
        })
    }

    /// Returns `true` if `value` is already stored in this type's
    /// representation. NULL matches every type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (DataType::Boolean, Value::Boolean(_)) => true,
            (DataType::Integer, Value::Integer(_)) => true,
            (DataType::BigInt, Value::BigInt(_)) => true,
            (DataType::Real, Value::Real(_)) => true,
            (DataType::Double, Value::Double(_)) => true,
            (DataType::Decimal, Value::Decimal(_)) => true,
            (DataType::Varchar(max), Value::Text(s)) => {
                max.map_or(true, |max| s.chars().count() <= max)
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A dynamically-typed SQL value.
///
/// | Variant   | SQL type   | Rust type  |
/// |-----------|------------|------------|
/// | `Null`    | NULL       | -          |
/// | `Boolean` | BOOLEAN    | `bool`     |
/// | `Integer` | INTEGER    | `i32`      |
/// | `BigInt`  | BIGINT     | `i64`      |
/// | `Real`    | REAL       | `f32`      |
/// | `Double`  | DOUBLE     | `f64`      |
/// | `Decimal` | DECIMAL    | `Decimal`  |
/// | `Text`    | VARCHAR    | `String`   |
///
/// # Equality
///
/// `PartialEq` follows [`values_equal`]: numeric values compare across
/// subtypes (`Integer(1) == Double(1.0)`) and two NULLs are equal. This is the
/// *key* equality used for deduplication and MERGE key lookup; the SQL `=`
/// operator layers three-valued logic on top of it.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Decimal(Decimal),
    Text(String),
}

/// Precedence of the numeric types for arithmetic promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum NumericRank {
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
}

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
        }
    }
}

impl Value {
    /// Returns the [`DataType`] of this value, or `None` for NULL.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Integer(_) => Some(DataType::Integer),
            Value::BigInt(_) => Some(DataType::BigInt),
            Value::Real(_) => Some(DataType::Real),
            Value::Double(_) => Some(DataType::Double),
            Value::Decimal(_) => Some(DataType::Decimal),
            Value::Text(_) => Some(DataType::Varchar(None)),
        }
    }

    /// A short type name for diagnostics.
    pub fn type_name(&self) -> String {
        self.data_type()
            .map_or_else(|| "NULL".to_string(), |t| t.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some()
    }

    fn numeric_rank(&self) -> Option<NumericRank> {
        match self {
            Value::Integer(_) => Some(NumericRank::Integer),
            Value::BigInt(_) => Some(NumericRank::BigInt),
            Value::Real(_) => Some(NumericRank::Real),
            Value::Double(_) => Some(NumericRank::Double),
            Value::Decimal(_) => Some(NumericRank::Decimal),
            _ => None,
        }
    }

    /// Exact integer view of `Integer` and `BigInt`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i as i64),
            Value::BigInt(i) => Some(*i),
            _ => None,
        }
    }

    /// Floating view of any numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::BigInt(i) => Some(*i as f64),
            Value::Real(r) => Some(*r as f64),
            Value::Double(d) => Some(*d),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Decimal view of any numeric value. Fails for non-finite floats.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Integer(i) => Some(Decimal::from(*i)),
            Value::BigInt(i) => Some(Decimal::from(*i)),
            Value::Real(r) => Decimal::from_f32(*r),
            Value::Double(d) => Decimal::from_f64(*d),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// SQL truthiness: NULL is false, booleans are themselves, numbers are
    /// true iff non-zero, strings are true iff non-empty.
    ///
    /// ```
    /// use horizon::types::Value;
    ///
    /// assert!(!Value::Null.to_bool());
    /// assert!(!Value::Integer(0).to_bool());
    /// assert!(Value::Double(0.5).to_bool());
    /// assert!(!Value::Text(String::new()).to_bool());
    /// ```
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::BigInt(i) => *i != 0,
            Value::Real(r) => *r != 0.0,
            Value::Double(d) => *d != 0.0,
            Value::Decimal(d) => !d.is_zero(),
            Value::Text(s) => !s.is_empty(),
        }
    }

    /// Renders the value the way it would be written as a SQL literal.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            other => other.to_string(),
        }
    }

    // -- conversion helpers -------------------------------------------------

    fn to_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Text(s) => match s.trim().to_ascii_uppercase().as_str() {
                "TRUE" | "1" => Some(true),
                "FALSE" | "0" => Some(false),
                _ => None,
            },
            v if v.is_numeric() => Some(v.to_bool()),
            _ => None,
        }
    }

    /// Integral view used by INTEGER/BIGINT conversion. Fractional values are
    /// rounded half away from zero.
    fn to_integral(&self) -> Option<i64> {
        match self {
            Value::Boolean(b) => Some(*b as i64),
            Value::Integer(i) => Some(*i as i64),
            Value::BigInt(i) => Some(*i),
            Value::Real(_) | Value::Double(_) => {
                let f = self.as_f64()?.round();
                (f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64)
                    .then_some(f as i64)
            }
            Value::Decimal(d) => d.round().to_i64(),
            Value::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| Decimal::from_str(s).ok().and_then(|d| d.round().to_i64()))
            }
            Value::Null => None,
        }
    }

    fn to_f64_lossy(&self) -> Option<f64> {
        match self {
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            other => other.as_f64(),
        }
    }

    fn to_decimal_lossy(&self) -> Option<Decimal> {
        match self {
            Value::Boolean(b) => Some(Decimal::from(*b as i64)),
            Value::Text(s) => Decimal::from_str(s.trim()).ok(),
            other => other.as_decimal(),
        }
    }

    // -- arithmetic -----------------------------------------------------------

    /// `self + other`. Numeric operands are promoted; any non-numeric operand
    /// turns the operation into string concatenation.
    pub fn add(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        if self.is_numeric() && other.is_numeric() {
            self.numeric_op(other, ArithOp::Add)
        } else {
            Ok(self.concat(other))
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value> {
        self.strict_numeric_op(other, ArithOp::Sub)
    }

    pub fn mul(&self, other: &Value) -> Result<Value> {
        self.strict_numeric_op(other, ArithOp::Mul)
    }

    /// `self / other`, always computed in double precision.
    pub fn div(&self, other: &Value) -> Result<Value> {
        let (a, b) = match self.float_operands(other, "/")? {
            Some(pair) => pair,
            None => return Ok(Value::Null),
        };
        if b == 0.0 {
            return Err(HorizonError::DivisionByZero(format!(
                "{} / {}",
                self.to_sql_literal(),
                other.to_sql_literal()
            )));
        }
        Ok(Value::Double(a / b))
    }

    /// `self % other`, always computed in double precision.
    pub fn rem(&self, other: &Value) -> Result<Value> {
        let (a, b) = match self.float_operands(other, "%")? {
            Some(pair) => pair,
            None => return Ok(Value::Null),
        };
        if b == 0.0 {
            return Err(HorizonError::DivisionByZero(format!(
                "{} % {}",
                self.to_sql_literal(),
                other.to_sql_literal()
            )));
        }
        Ok(Value::Double(a % b))
    }

    /// Unary minus, preserving the numeric subtype.
    pub fn negate(&self) -> Result<Value> {
        let overflow = || HorizonError::Overflow(format!("-{}", self.to_sql_literal()));
        match self {
            Value::Null => Ok(Value::Null),
            Value::Integer(i) => i.checked_neg().map(Value::Integer).ok_or_else(overflow),
            Value::BigInt(i) => i.checked_neg().map(Value::BigInt).ok_or_else(overflow),
            Value::Real(r) => Ok(Value::Real(-r)),
            Value::Double(d) => Ok(Value::Double(-d)),
            Value::Decimal(d) => Ok(Value::Decimal(-*d)),
            other => Err(HorizonError::TypeError(format!(
                "unsupported operand type for unary -: {}",
                other.type_name()
            ))),
        }
    }

    /// String concatenation of both operands' display forms. NULL if either
    /// operand is NULL.
    pub fn concat(&self, other: &Value) -> Value {
        if self.is_null() || other.is_null() {
            return Value::Null;
        }
        Value::Text(format!("{self}{other}"))
    }

    fn strict_numeric_op(&self, other: &Value, op: ArithOp) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        if !(self.is_numeric() && other.is_numeric()) {
            return Err(unsupported_operands(op.symbol(), self, other));
        }
        self.numeric_op(other, op)
    }

    fn float_operands(&self, other: &Value, symbol: &str) -> Result<Option<(f64, f64)>> {
        if self.is_null() || other.is_null() {
            return Ok(None);
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => Ok(Some((a, b))),
            _ => Err(unsupported_operands(symbol, self, other)),
        }
    }

    /// Both operands must be numeric and non-null.
    fn numeric_op(&self, other: &Value, op: ArithOp) -> Result<Value> {
        let rank = match (self.numeric_rank(), other.numeric_rank()) {
            (Some(a), Some(b)) => a.max(b),
            _ => return Err(unsupported_operands(op.symbol(), self, other)),
        };
        let overflow = || {
            HorizonError::Overflow(format!(
                "{} {} {}",
                self.to_sql_literal(),
                op.symbol(),
                other.to_sql_literal()
            ))
        };
        match rank {
            NumericRank::Integer => {
                let (a, b) = match (self, other) {
                    (Value::Integer(a), Value::Integer(b)) => (*a, *b),
                    _ => return Err(HorizonError::Internal("integer rank mismatch".into())),
                };
                let result = match op {
                    ArithOp::Add => a.checked_add(b),
                    ArithOp::Sub => a.checked_sub(b),
                    ArithOp::Mul => a.checked_mul(b),
                };
                result.map(Value::Integer).ok_or_else(overflow)
            }
            NumericRank::BigInt => {
                let (a, b) = match (self.as_i64(), other.as_i64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(HorizonError::Internal("bigint rank mismatch".into())),
                };
                let result = match op {
                    ArithOp::Add => a.checked_add(b),
                    ArithOp::Sub => a.checked_sub(b),
                    ArithOp::Mul => a.checked_mul(b),
                };
                result.map(Value::BigInt).ok_or_else(overflow)
            }
            NumericRank::Real | NumericRank::Double => {
                let (a, b) = match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(HorizonError::Internal("float rank mismatch".into())),
                };
                let result = match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                };
                if rank == NumericRank::Real {
                    Ok(Value::Real(result as f32))
                } else {
                    Ok(Value::Double(result))
                }
            }
            NumericRank::Decimal => {
                let (a, b) = match (self.as_decimal(), other.as_decimal()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(overflow()),
                };
                let result = match op {
                    ArithOp::Add => a.checked_add(b),
                    ArithOp::Sub => a.checked_sub(b),
                    ArithOp::Mul => a.checked_mul(b),
                };
                result.map(Value::Decimal).ok_or_else(overflow)
            }
        }
    }

    /// Hashable normalisation for hash joins. `None` for NULL, which never
    /// matches anything under join semantics.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Null => None,
            Value::Boolean(b) => Some(HashKey::Boolean(*b)),
            Value::Integer(i) => Some(HashKey::Integral(*i as i64)),
            Value::BigInt(i) => Some(HashKey::Integral(*i)),
            Value::Decimal(d) => {
                if d.fract().is_zero() {
                    if let Some(i) = d.to_i64() {
                        return Some(HashKey::Integral(i));
                    }
                }
                Some(HashKey::Decimal(d.normalize()))
            }
            Value::Real(_) | Value::Double(_) => self.as_f64().map(float_key),
            Value::Text(s) => Some(HashKey::Text(s.clone())),
        }
    }
}

fn unsupported_operands(symbol: &str, left: &Value, right: &Value) -> HorizonError {
    HorizonError::TypeError(format!(
        "unsupported operand types for {}: {} and {}",
        symbol,
        left.type_name(),
        right.type_name()
    ))
}

fn float_key(f: f64) -> HashKey {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        HashKey::Integral(f as i64)
    } else if f.is_nan() {
        HashKey::Fractional(u64::MAX)
    } else {
        HashKey::Fractional(f.to_bits())
    }
}

/// Hashable form of a non-null [`Value`].
///
/// Integral values share a key across subtypes, so `Integer(1)`, `BigInt(1)`,
/// `Double(1.0)` and `Decimal(1.00)` land in the same bucket. Fractional
/// decimals are keyed by their exact value and fractional floats by their
/// bits, so a decimal and a float with the same fraction get different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Boolean(bool),
    Integral(i64),
    Fractional(u64),
    Decimal(Decimal),
    Text(String),
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Total ordering over values.
///
/// - NULL sorts before every non-null value.
/// - Numeric values compare numerically across subtypes (in decimal when
///   either side is a decimal, else in double precision, else as integers).
/// - Booleans and strings use their natural ordering.
/// - Any other pairing falls back to comparing display strings rather than
///   failing.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (a, b) if a.is_numeric() && b.is_numeric() => compare_numeric(a, b),
        (a, b) => a.to_string().cmp(&b.to_string()),
    }
}

fn compare_numeric(left: &Value, right: &Value) -> Ordering {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return a.cmp(&b);
    }
    if matches!(left, Value::Decimal(_)) || matches!(right, Value::Decimal(_)) {
        if let (Some(a), Some(b)) = (left.as_decimal(), right.as_decimal()) {
            return a.cmp(&b);
        }
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => compare_f64(a, b),
        _ => Ordering::Equal,
    }
}

/// Compares two `f64` values with a total ordering. NaN equals NaN and sorts
/// after every other value.
fn compare_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        _ => Ordering::Less,
    })
}

/// Key equality: two NULLs are equal, NULL never equals a non-null value,
/// otherwise [`compare_values`] decides.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.is_null(), right.is_null()) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        (false, false) => compare_values(left, right) == Ordering::Equal,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other)
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(compare_values(self, other))
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for Value {
    /// Whole floating values keep one decimal place to distinguish them from
    /// integers.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(true) => write!(f, "TRUE"),
            Value::Boolean(false) => write!(f, "FALSE"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::BigInt(i) => write!(f, "{i}"),
            Value::Real(r) => {
                if r.fract() == 0.0 && r.is_finite() {
                    write!(f, "{r:.1}")
                } else {
                    write!(f, "{r}")
                }
            }
            Value::Double(d) => {
                if d.fract() == 0.0 && d.is_finite() {
                    write!(f, "{d:.1}")
                } else {
                    write!(f, "{d}")
                }
            }
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// From trait implementations
// ---------------------------------------------------------------------------

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::BigInt(i)
    }
}

impl From<f32> for Value {
    fn from(r: f32) -> Self {
        Value::Real(r)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
