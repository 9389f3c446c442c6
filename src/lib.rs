//! # Horizon Engine
//!
//! The query-execution core of the Horizon in-memory relational database.
//! Statements arrive as parsed [`sql::Statement`] trees and run against a
//! [`catalog::Storage`] collaborator, producing an [`ExecutionResult`].
//!
//! ```
//! use horizon::sql::{ColumnDef, CreateTableStatement, Expr, InsertSource,
//!     InsertStatement, Query, SelectColumn, SelectStatement, Statement, TableName,
//!     FromClause, TableRef};
//! use horizon::{DataType, Database, Value};
//!
//! let db = Database::new();
//! db.execute(&Statement::CreateTable(CreateTableStatement {
//!     name: TableName::new("t"),
//!     if_not_exists: false,
//!     columns: vec![ColumnDef::new("x", DataType::Integer)],
//! }))?;
//! db.execute(&Statement::Insert(InsertStatement {
//!     table: TableName::new("t"),
//!     columns: None,
//!     source: InsertSource::Values(vec![vec![Expr::lit(42)]]),
//! }))?;
//! let result = db.query(&Query::from(SelectStatement {
//!     columns: vec![SelectColumn::AllColumns],
//!     from: Some(FromClause::table(TableRef::new("t"))),
//!     ..Default::default()
//! }))?;
//! assert_eq!(result.scalar(), Some(&Value::Integer(42)));
//! # Ok::<(), horizon::HorizonError>(())
//! ```

pub mod catalog;
pub mod error;
pub mod execution;
pub mod sql;
pub mod types;

pub use catalog::{Catalog, Column, Row, Sequence, Storage, Table};
pub use error::{HorizonError, Result};
pub use execution::{ExecutionResult, Executor, ExecutorConfig, JoinAlgorithm, ResultKind};
pub use types::{DataType, Value};

use std::sync::Mutex;

/// An in-memory database handle. Thread-safe via internal locking; each
/// statement holds the lock for its whole execution.
pub struct Database {
    inner: Mutex<Catalog>,
    config: ExecutorConfig,
}

impl Default for Database {
    fn default() -> Self {
        Database::new()
    }
}

impl Database {
    pub fn new() -> Self {
        Database::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Database {
            inner: Mutex::new(Catalog::new()),
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute one statement.
    pub fn execute(&self, stmt: &sql::Statement) -> Result<ExecutionResult> {
        let mut catalog = self.lock()?;
        Executor::new(&mut *catalog, &self.config).execute(stmt)
    }

    /// Run a query and return its rows.
    pub fn query(&self, query: &sql::Query) -> Result<ExecutionResult> {
        let mut catalog = self.lock()?;
        let stmt = sql::Statement::Query(query.clone());
        Executor::new(&mut *catalog, &self.config).execute(&stmt)
    }

    /// Create a sequence in the default schema.
    pub fn create_sequence(&self, name: &str, start: i64, increment: i64) -> Result<()> {
        let mut catalog = self.lock()?;
        catalog.create_sequence(
            &self.config.default_schema,
            Sequence::new(name, start, increment),
        )
    }

    /// Names of the tables in the default schema.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let catalog = self.lock()?;
        Ok(catalog.table_names(&self.config.default_schema))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Catalog>> {
        self.inner
            .lock()
            .map_err(|_| HorizonError::Internal("mutex poisoned".into()))
    }
}
