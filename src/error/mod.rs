//! Unified error handling for the Horizon query engine.
//!
//! This module defines [`HorizonError`], the single error type propagated
//! throughout the engine, from value conversion and expression evaluation,
//! through the join and aggregation stages, up to the statement executor.
//!
//! Every variant carries a stable numeric code (see [`HorizonError::code`]).
//! Codes are grouped by thousand-range, and the range determines the
//! [`StateClass`] reported to clients:
//!
//! | Range       | Class                               |
//! |-------------|-------------------------------------|
//! | 1000 - 1999 | [`StateClass::SyntaxOrAccess`]      |
//! | 2000 - 2999 | [`StateClass::ConstraintViolation`] |
//! | 3000 - 3999 | [`StateClass::TransactionRollback`] |
//! | 5000 - 5999 | [`StateClass::SystemError`]         |
//! | otherwise   | [`StateClass::General`]             |
//!
//! A convenience [`Result<T>`] type alias is re-exported so that callers can
//! write `Result<T>` instead of `std::result::Result<T, HorizonError>`.

use std::fmt;

use thiserror::Error;

/// The canonical error type for all Horizon engine operations.
///
/// Variants are organised by failure category so that callers can match on
/// the category without inspecting free-form strings. The `#[error]`
/// attribute of each variant is its message template.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HorizonError {
    // -- syntax / access (1xxx) -------------------------------------------

    /// The SQL text could not be parsed. Raised by the upstream parser, never
    /// by the engine itself.
    #[error("Syntax error in SQL statement: {0}")]
    Syntax(String),

    #[error("Table \"{0}\" not found")]
    TableNotFound(String),

    #[error("Column \"{0}\" not found")]
    ColumnNotFound(String),

    #[error("Sequence \"{0}\" not found")]
    SequenceNotFound(String),

    #[error("Index \"{0}\" not found")]
    IndexNotFound(String),

    #[error("Table \"{0}\" already exists")]
    DuplicateTable(String),

    #[error("Index \"{0}\" already exists")]
    DuplicateIndex(String),

    #[error("Duplicate column name \"{0}\"")]
    DuplicateColumn(String),

    /// The statement uses a shape or operator the engine does not implement.
    #[error("Feature not supported: {0}")]
    Unsupported(String),

    /// Arity or shape mismatch detected while binding a statement (e.g. an
    /// INSERT tuple with the wrong number of values).
    #[error("Column count does not match: {0}")]
    ColumnCountMismatch(String),

    /// A MERGE statement cannot be bound: no key to match on, or a WHEN
    /// action that does not fit its clause.
    #[error("Invalid MERGE statement: {0}")]
    InvalidMerge(String),

    // -- constraint violation (2xxx) --------------------------------------

    #[error("NULL not allowed for column \"{0}\"")]
    NullNotAllowed(String),

    #[error("Unique index or primary key violation: {0}")]
    UniqueViolation(String),

    /// A value could not be stored in a column of the declared type.
    #[error("Value {value} is invalid for column \"{column}\" of type {data_type}")]
    InvalidColumnValue {
        column: String,
        data_type: String,
        value: String,
    },

    // -- transaction rollback (3xxx) --------------------------------------

    /// Reported by the surrounding transaction manager; the engine itself
    /// never rolls back.
    #[error("Transaction rolled back: {0}")]
    TransactionRollback(String),

    // -- data exceptions (4xxx) -------------------------------------------

    /// Operand or argument types are not supported by an operator, function,
    /// or conversion.
    #[error("Data conversion error: {0}")]
    TypeError(String),

    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    /// A function argument is outside the function's mathematical domain.
    #[error("Invalid value {value} for parameter of {function}")]
    InvalidArgument { function: String, value: String },

    #[error("Numeric value out of range: {0}")]
    Overflow(String),

    #[error("Scalar subquery contains more than one row")]
    SubqueryTooManyRows,

    #[error("Subquery is not a single column query")]
    SubqueryNotSingleColumn,

    #[error("Current value of sequence \"{0}\" is not yet defined in this session")]
    SequenceNotStarted(String),

    // -- system (5xxx) ----------------------------------------------------

    /// An internal invariant was violated. This usually indicates a bug in
    /// the engine itself and should be reported.
    #[error("General error: {0}")]
    Internal(String),
}

impl HorizonError {
    /// Returns the stable numeric code for this error.
    pub fn code(&self) -> u32 {
        match self {
            HorizonError::Syntax(_) => 1001,
            HorizonError::TableNotFound(_) => 1002,
            HorizonError::ColumnNotFound(_) => 1003,
            HorizonError::SequenceNotFound(_) => 1004,
            HorizonError::IndexNotFound(_) => 1005,
            HorizonError::DuplicateTable(_) => 1006,
            HorizonError::DuplicateIndex(_) => 1007,
            HorizonError::DuplicateColumn(_) => 1008,
            HorizonError::Unsupported(_) => 1010,
            HorizonError::ColumnCountMismatch(_) => 1011,
            HorizonError::InvalidMerge(_) => 1012,
            HorizonError::NullNotAllowed(_) => 2001,
            HorizonError::UniqueViolation(_) => 2002,
            HorizonError::InvalidColumnValue { .. } => 2003,
            HorizonError::TransactionRollback(_) => 3001,
            HorizonError::TypeError(_) => 4001,
            HorizonError::DivisionByZero(_) => 4002,
            HorizonError::InvalidArgument { .. } => 4003,
            HorizonError::Overflow(_) => 4004,
            HorizonError::SubqueryTooManyRows => 4005,
            HorizonError::SubqueryNotSingleColumn => 4006,
            HorizonError::SequenceNotStarted(_) => 4007,
            HorizonError::Internal(_) => 5001,
        }
    }

    /// Returns the state class derived from the code's thousand-range.
    pub fn state_class(&self) -> StateClass {
        StateClass::from_code(self.code())
    }

    /// Returns `true` for errors raised before execution began (parse
    /// failures), as opposed to failures of the statement itself.
    pub fn is_upstream(&self) -> bool {
        matches!(self, HorizonError::Syntax(_))
    }
}

/// Client-visible classification of an error, derived from its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateClass {
    SyntaxOrAccess,
    ConstraintViolation,
    TransactionRollback,
    SystemError,
    General,
}

impl StateClass {
    /// Maps an error code onto its class by thousand-range.
    pub fn from_code(code: u32) -> StateClass {
        match code / 1000 {
            1 => StateClass::SyntaxOrAccess,
            2 => StateClass::ConstraintViolation,
            3 => StateClass::TransactionRollback,
            5 => StateClass::SystemError,
            _ => StateClass::General,
        }
    }

    /// The five-character SQLSTATE for this class.
    pub fn sql_state(&self) -> &'static str {
        match self {
            StateClass::SyntaxOrAccess => "42000",
            StateClass::ConstraintViolation => "23000",
            StateClass::TransactionRollback => "40000",
            StateClass::SystemError => "58000",
            StateClass::General => "HY000",
        }
    }
}

impl fmt::Display for StateClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_state())
    }
}

/// A specialised [`Result`] type for Horizon engine operations.
pub type Result<T> = std::result::Result<T, HorizonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_human_readable() {
        let cases: Vec<(HorizonError, &str)> = vec![
            (
                HorizonError::Syntax("unexpected token".into()),
                "Syntax error in SQL statement: unexpected token",
            ),
            (
                HorizonError::TableNotFound("USERS".into()),
                "Table \"USERS\" not found",
            ),
            (
                HorizonError::ColumnNotFound("EMAIL".into()),
                "Column \"EMAIL\" not found",
            ),
            (
                HorizonError::DivisionByZero("10 / 0".into()),
                "Division by zero: 10 / 0",
            ),
            (
                HorizonError::InvalidArgument {
                    function: "SQRT".into(),
                    value: "-1".into(),
                },
                "Invalid value -1 for parameter of SQRT",
            ),
            (
                HorizonError::InvalidColumnValue {
                    column: "AGE".into(),
                    data_type: "INTEGER".into(),
                    value: "'abc'".into(),
                },
                "Value 'abc' is invalid for column \"AGE\" of type INTEGER",
            ),
            (
                HorizonError::SubqueryTooManyRows,
                "Scalar subquery contains more than one row",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn codes_map_to_state_classes_by_thousand_range() {
        assert_eq!(
            HorizonError::TableNotFound("t".into()).state_class(),
            StateClass::SyntaxOrAccess
        );
        assert_eq!(
            HorizonError::NullNotAllowed("c".into()).state_class(),
            StateClass::ConstraintViolation
        );
        assert_eq!(
            HorizonError::TransactionRollback("deadlock".into()).state_class(),
            StateClass::TransactionRollback
        );
        assert_eq!(
            HorizonError::Internal("bug".into()).state_class(),
            StateClass::SystemError
        );
        assert_eq!(
            HorizonError::DivisionByZero("1 / 0".into()).state_class(),
            StateClass::General
        );
        assert_eq!(HorizonError::SubqueryTooManyRows.code(), 4005);
    }

    #[test]
    fn unknown_ranges_fall_back_to_general() {
        assert_eq!(StateClass::from_code(0), StateClass::General);
        assert_eq!(StateClass::from_code(9999), StateClass::General);
        assert_eq!(StateClass::General.sql_state(), "HY000");
        assert_eq!(StateClass::SyntaxOrAccess.to_string(), "42000");
    }

    #[test]
    fn only_parse_failures_are_upstream() {
        assert!(HorizonError::Syntax("x".into()).is_upstream());
        assert!(!HorizonError::TableNotFound("x".into()).is_upstream());
        assert!(!HorizonError::InvalidMerge("x".into()).is_upstream());
    }
}
