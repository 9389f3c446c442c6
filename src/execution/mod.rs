//! # Execution Engine
//!
//! Executes parsed statements against a [`Storage`] implementation. The
//! [`Executor`] is the single entry point: it dispatches on statement kind
//! and drives the pieces implemented in the submodules.
//!
//! - [`context`]: column scopes and the per-row evaluation context
//! - `eval`: the scalar expression evaluator and function library
//! - `join`: FROM resolution with nested-loop and hash joins
//! - `aggregate`: grouping and aggregate functions
//! - `select`: the SELECT pipeline, compound queries and CTEs
//! - `mutation`: INSERT, UPDATE, DELETE and both MERGE forms
//! - [`result`]: the typed result envelope
//!
//! Execution is synchronous. An `Executor` borrows its storage mutably for
//! its whole lifetime, so one statement runs at a time per storage handle.

pub mod context;
pub mod result;

mod aggregate;
mod eval;
mod join;
mod mutation;
mod select;

use tracing::debug;

use crate::catalog::{Column, IndexInfo, Row, Storage, Table};
use crate::error::{HorizonError, Result};
use crate::sql::ast::*;

pub use context::{ColumnScope, ExecutionContext};
pub use result::{ExecutionResult, ResultKind};

/// Join algorithm selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinAlgorithm {
    /// Pick per join from input sizes and the join condition.
    #[default]
    Auto,
    NestedLoop,
    /// Hash join whenever the condition is a simple equi-join; other
    /// conditions still run as nested loops.
    Hash,
}

/// Executor tuning knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Schema used for unqualified table names.
    pub default_schema: String,

    /// When both join inputs have fewer rows than this, nested loop is used.
    pub small_table_threshold: usize,

    /// Smaller/larger input ratio below which hash join is preferred.
    pub hash_join_size_ratio: f64,

    /// Hash join is preferred once either input exceeds this many rows.
    pub hash_join_min_rows: usize,

    pub join_algorithm: JoinAlgorithm,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            default_schema: "PUBLIC".to_string(),
            small_table_threshold: 100,
            hash_join_size_ratio: 1.0 / 3.0,
            hash_join_min_rows: 50,
            join_algorithm: JoinAlgorithm::Auto,
        }
    }
}

impl ExecutorConfig {
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    pub fn with_small_table_threshold(mut self, rows: usize) -> Self {
        self.small_table_threshold = rows;
        self
    }

    pub fn with_hash_join_size_ratio(mut self, ratio: f64) -> Self {
        self.hash_join_size_ratio = ratio;
        self
    }

    pub fn with_hash_join_min_rows(mut self, rows: usize) -> Self {
        self.hash_join_min_rows = rows;
        self
    }

    pub fn with_join_algorithm(mut self, algorithm: JoinAlgorithm) -> Self {
        self.join_algorithm = algorithm;
        self
    }
}

/// A materialized `WITH` query, visible as a table while its statement runs.
#[derive(Debug, Clone)]
struct CteTable {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Row>,
}

/// Statement executor over a borrowed storage collaborator.
pub struct Executor<'a> {
    storage: &'a mut dyn Storage,
    config: &'a ExecutorConfig,
    ctes: Vec<CteTable>,
}

impl<'a> Executor<'a> {
    pub fn new(storage: &'a mut dyn Storage, config: &'a ExecutorConfig) -> Self {
        Executor {
            storage,
            config,
            ctes: Vec::new(),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        self.config
    }

    /// Execute one statement.
    pub fn execute(&mut self, stmt: &Statement) -> Result<ExecutionResult> {
        self.execute_with_outer(stmt, None)
    }

    /// Execute one statement with an enclosing context, so column references
    /// the statement cannot resolve itself are looked up in `outer`.
    pub fn execute_with_outer(
        &mut self,
        stmt: &Statement,
        outer: Option<&ExecutionContext<'_>>,
    ) -> Result<ExecutionResult> {
        debug!(statement = stmt.kind(), "executing statement");
        match stmt {
            Statement::Query(query) => {
                let (columns, rows) = self.run_query(query, outer)?;
                Ok(ExecutionResult::select(columns, rows))
            }
            Statement::Insert(insert) => self.execute_insert(insert, outer),
            Statement::Update(update) => self.execute_update(update, outer),
            Statement::Delete(delete) => self.execute_delete(delete, outer),
            Statement::Merge(MergeStatement::Key(merge)) => self.execute_merge_key(merge, outer),
            Statement::Merge(MergeStatement::Using(merge)) => {
                self.execute_merge_using(merge, outer)
            }
            Statement::CreateTable(ct) => self.execute_create_table(ct),
            Statement::DropTable(dt) => self.execute_drop_table(dt),
            Statement::CreateIndex(ci) => self.execute_create_index(ci),
            Statement::DropIndex(di) => self.execute_drop_index(di),
        }
    }

    // ---- storage helpers ----

    fn schema_of<'n>(&'n self, name: &'n TableName) -> &'n str {
        name.schema.as_deref().unwrap_or(&self.config.default_schema)
    }

    fn table(&self, name: &TableName) -> Result<&Table> {
        let schema = self.schema_of(name);
        self.storage
            .get_table(schema, &name.name)
            .ok_or_else(|| HorizonError::TableNotFound(name.name.clone()))
    }

    fn table_mut(&mut self, name: &TableName) -> Result<&mut Table> {
        let schema = name
            .schema
            .clone()
            .unwrap_or_else(|| self.config.default_schema.clone());
        self.storage
            .get_table_mut(&schema, &name.name)
            .ok_or_else(|| HorizonError::TableNotFound(name.name.clone()))
    }

    /// A CTE visible under `name`, innermost `WITH` first.
    fn cte(&self, name: &TableName) -> Option<&CteTable> {
        if name.schema.is_some() {
            return None;
        }
        self.ctes
            .iter()
            .rev()
            .find(|c| c.name.eq_ignore_ascii_case(&name.name))
    }

    // ---- CREATE TABLE ----

    fn execute_create_table(&mut self, ct: &CreateTableStatement) -> Result<ExecutionResult> {
        let schema = self.schema_of(&ct.name).to_string();
        if self.storage.get_table(&schema, &ct.name.name).is_some() {
            if ct.if_not_exists {
                debug!(table = %ct.name.name, "table exists, skipping create");
                return Ok(ExecutionResult::ddl(format!(
                    "Table {} already exists, skipping",
                    ct.name.name
                )));
            }
            return Err(HorizonError::DuplicateTable(ct.name.name.clone()));
        }

        let empty_scope = ColumnScope::empty();
        let empty_ctx = ExecutionContext::new(&empty_scope, &[], None);
        let mut columns = Vec::with_capacity(ct.columns.len());
        for def in &ct.columns {
            let mut column = Column::new(def.name.clone(), def.data_type);
            if def.not_null || def.primary_key {
                column = column.not_null();
            }
            if let Some(expr) = &def.default {
                let raw = self.eval(expr, &empty_ctx)?;
                let value = column.convert_value(&raw)?;
                column = column.with_default(value);
            }
            columns.push(column);
        }

        let mut table = Table::new(ct.name.name.clone(), columns)?;
        let primary_key: Vec<String> = ct
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        if !primary_key.is_empty() {
            table.create_index(IndexInfo {
                name: format!("PRIMARY_KEY_{}", ct.name.name.to_uppercase()),
                columns: primary_key,
                unique: true,
            })?;
        }
        self.storage.create_table(&schema, table)?;
        Ok(ExecutionResult::ddl(format!("Table {} created", ct.name.name)))
    }

    // ---- DROP TABLE ----

    fn execute_drop_table(&mut self, dt: &DropTableStatement) -> Result<ExecutionResult> {
        let schema = self.schema_of(&dt.name).to_string();
        if self.storage.get_table(&schema, &dt.name.name).is_none() && dt.if_exists {
            debug!(table = %dt.name.name, "table missing, skipping drop");
            return Ok(ExecutionResult::ddl(format!(
                "Table {} does not exist, skipping",
                dt.name.name
            )));
        }
        self.storage.drop_table(&schema, &dt.name.name)?;
        Ok(ExecutionResult::ddl(format!("Table {} dropped", dt.name.name)))
    }

    // ---- CREATE INDEX ----

    fn execute_create_index(&mut self, ci: &CreateIndexStatement) -> Result<ExecutionResult> {
        let schema = self.schema_of(&ci.table).to_string();
        // Index names are unique per schema.
        if self.storage.find_index_table(&schema, &ci.name).is_some() {
            if ci.if_not_exists {
                debug!(index = %ci.name, "index exists, skipping create");
                return Ok(ExecutionResult::ddl(format!(
                    "Index {} already exists, skipping",
                    ci.name
                )));
            }
            return Err(HorizonError::DuplicateIndex(ci.name.clone()));
        }
        let table = self.table_mut(&ci.table)?;
        table.create_index(IndexInfo {
            name: ci.name.clone(),
            columns: ci.columns.clone(),
            unique: ci.unique,
        })?;
        Ok(ExecutionResult::ddl(format!("Index {} created", ci.name)))
    }

    // ---- DROP INDEX ----

    fn execute_drop_index(&mut self, di: &DropIndexStatement) -> Result<ExecutionResult> {
        let schema = self.schema_of(&di.name).to_string();
        let owner = match self.storage.find_index_table(&schema, &di.name.name) {
            Some(owner) => owner,
            None if di.if_exists => {
                debug!(index = %di.name.name, "index missing, skipping drop");
                return Ok(ExecutionResult::ddl(format!(
                    "Index {} does not exist, skipping",
                    di.name.name
                )));
            }
            None => return Err(HorizonError::IndexNotFound(di.name.name.clone())),
        };
        let table = self
            .storage
            .get_table_mut(&schema, &owner)
            .ok_or_else(|| HorizonError::TableNotFound(owner.clone()))?;
        if !table.drop_index(&di.name.name) {
            return Err(HorizonError::IndexNotFound(di.name.name.clone()));
        }
        Ok(ExecutionResult::ddl(format!("Index {} dropped", di.name.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::types::{DataType, Value};

    fn create_users() -> Statement {
        Statement::CreateTable(CreateTableStatement {
            name: TableName::new("users"),
            if_not_exists: false,
            columns: vec![
                ColumnDef::new("id", DataType::Integer).primary_key(),
                ColumnDef::new("name", DataType::Varchar(Some(20))),
                ColumnDef::new("active", DataType::Boolean).default_value(Expr::lit(true)),
            ],
        })
    }

    #[test]
    fn test_config_builders() {
        let config = ExecutorConfig::default()
            .with_default_schema("APP")
            .with_join_algorithm(JoinAlgorithm::Hash)
            .with_small_table_threshold(10)
            .with_hash_join_min_rows(5)
            .with_hash_join_size_ratio(0.5);
        assert_eq!(config.default_schema, "APP");
        assert_eq!(config.join_algorithm, JoinAlgorithm::Hash);
        assert_eq!(config.small_table_threshold, 10);
        assert_eq!(config.hash_join_min_rows, 5);
        assert_eq!(ExecutorConfig::default().small_table_threshold, 100);
    }

    #[test]
    fn test_create_table_with_primary_key_and_default() {
        let mut catalog = Catalog::new();
        let config = ExecutorConfig::default();
        let mut exec = Executor::new(&mut catalog, &config);
        let result = exec.execute(&create_users()).unwrap();
        assert_eq!(result.kind(), ResultKind::Ddl);

        let table = catalog.get_table("PUBLIC", "users").unwrap();
        assert!(!table.columns()[0].nullable);
        assert_eq!(table.columns()[2].default, Some(Value::Boolean(true)));
        assert!(table.indexes()[0].unique);
    }

    #[test]
    fn test_create_table_twice() {
        let mut catalog = Catalog::new();
        let config = ExecutorConfig::default();
        let mut exec = Executor::new(&mut catalog, &config);
        exec.execute(&create_users()).unwrap();
        let err = exec.execute(&create_users()).unwrap_err();
        assert!(matches!(err, HorizonError::DuplicateTable(_)));

        let mut again = create_users();
        if let Statement::CreateTable(ct) = &mut again {
            ct.if_not_exists = true;
        }
        assert!(exec.execute(&again).unwrap().is_success());
    }

    #[test]
    fn test_drop_index_if_exists_is_a_noop() {
        let mut catalog = Catalog::new();
        let config = ExecutorConfig::default();
        let mut exec = Executor::new(&mut catalog, &config);
        let quiet = Statement::DropIndex(DropIndexStatement {
            name: TableName::new("idx_missing"),
            if_exists: true,
        });
        let result = exec.execute(&quiet).unwrap();
        assert!(result.is_success());
        assert!(result.message().unwrap().contains("does not exist"));

        let loud = Statement::DropIndex(DropIndexStatement {
            name: TableName::new("idx_missing"),
            if_exists: false,
        });
        assert!(matches!(
            exec.execute(&loud).unwrap_err(),
            HorizonError::IndexNotFound(_)
        ));
    }

    #[test]
    fn test_create_and_drop_index() {
        let mut catalog = Catalog::new();
        let config = ExecutorConfig::default();
        let mut exec = Executor::new(&mut catalog, &config);
        exec.execute(&create_users()).unwrap();
        let create = Statement::CreateIndex(CreateIndexStatement {
            name: "idx_name".into(),
            table: TableName::new("users"),
            columns: vec!["name".into()],
            unique: false,
            if_not_exists: false,
        });
        exec.execute(&create).unwrap();
        assert!(matches!(
            exec.execute(&create).unwrap_err(),
            HorizonError::DuplicateIndex(_)
        ));
        exec.execute(&Statement::DropIndex(DropIndexStatement {
            name: TableName::new("IDX_NAME"),
            if_exists: false,
        }))
        .unwrap();
        assert!(!catalog.get_table("public", "users").unwrap().has_index("idx_name"));
    }

    #[test]
    fn test_drop_table() {
        let mut catalog = Catalog::new();
        let config = ExecutorConfig::default();
        let mut exec = Executor::new(&mut catalog, &config);
        exec.execute(&create_users()).unwrap();
        let drop = Statement::DropTable(DropTableStatement {
            name: TableName::new("users"),
            if_exists: false,
        });
        exec.execute(&drop).unwrap();
        assert!(matches!(
            exec.execute(&drop).unwrap_err(),
            HorizonError::TableNotFound(_)
        ));
        let quiet = Statement::DropTable(DropTableStatement {
            name: TableName::new("users"),
            if_exists: true,
        });
        assert!(exec.execute(&quiet).unwrap().is_success());
    }
}
