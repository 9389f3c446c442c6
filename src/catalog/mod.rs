//! Schema catalog and in-memory row storage.
//!
//! The execution engine talks to storage only through the [`Storage`] trait:
//! table lookup by schema and name, DDL, and sequence access. [`Catalog`] is
//! the in-memory implementation the rest of the crate (and its tests) use.
//!
//! # Key types
//!
//! - [`Catalog`]: schemas, each holding tables and sequences.
//! - [`Table`]: column list, rows keyed by a stable id, and index metadata.
//! - [`Column`]: name, declared type, nullability, and the per-column value
//!   conversion/validation the executor applies before every mutation.
//! - [`Row`]: a stable id plus one value per column.
//! - [`Sequence`]: a named counter backing `NEXT VALUE FOR`.
//!
//! Names of schemas, tables, columns, indexes and sequences are
//! case-insensitive.

use std::collections::{BTreeMap, HashMap};

use crate::error::{HorizonError, Result};
use crate::types::{values_equal, DataType, Value};

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// A row: a stable identity plus values index-aligned with the owning column
/// list. Synthetic rows (join padding, computed results) carry id `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: i64,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(id: i64, values: Vec<Value>) -> Self {
        Row { id, values }
    }

    /// A row with no storage identity.
    pub fn synthetic(values: Vec<Value>) -> Self {
        Row { id: 0, values }
    }

    /// A synthetic row of `width` NULLs.
    pub fn nulls(width: usize) -> Self {
        Row::synthetic(vec![Value::Null; width])
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// Metadata for a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Value used by INSERT when the column is omitted.
    pub default: Option<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Column {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Converts a raw value to this column's declared type.
    pub fn convert_value(&self, raw: &Value) -> Result<Value> {
        self.data_type.convert(raw).map_err(|_| self.invalid(raw))
    }

    /// Returns `true` if `value` may be stored in this column as-is.
    pub fn is_valid_value(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.nullable;
        }
        self.data_type.matches(value)
    }

    /// Conversion followed by validation; the form every mutation uses.
    pub fn coerce(&self, raw: &Value) -> Result<Value> {
        let value = self.convert_value(raw)?;
        if self.is_valid_value(&value) {
            Ok(value)
        } else if value.is_null() {
            Err(HorizonError::NullNotAllowed(self.name.clone()))
        } else {
            Err(self.invalid(raw))
        }
    }

    fn invalid(&self, raw: &Value) -> HorizonError {
        HorizonError::InvalidColumnValue {
            column: self.name.clone(),
            data_type: self.data_type.to_string(),
            value: raw.to_sql_literal(),
        }
    }
}

/// Index of the first column named `name` (case-insensitive).
pub fn find_column_index(columns: &[Column], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.name.eq_ignore_ascii_case(name))
}

// ---------------------------------------------------------------------------
// Index metadata
// ---------------------------------------------------------------------------

/// Metadata for an index. Only uniqueness is enforced; lookups always scan.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    /// Ordered list of column names that form the index key.
    pub columns: Vec<String>,
    pub unique: bool,
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// An in-memory table.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: BTreeMap<i64, Vec<Value>>,
    next_row_id: i64,
    indexes: Vec<IndexInfo>,
}

impl Table {
    /// Creates an empty table. Column names must be unique.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        for (i, col) in columns.iter().enumerate() {
            if find_column_index(&columns[..i], &col.name).is_some() {
                return Err(HorizonError::DuplicateColumn(col.name.clone()));
            }
        }
        Ok(Table {
            name: name.into(),
            columns,
            rows: BTreeMap::new(),
            next_row_id: 1,
            indexes: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        find_column_index(&self.columns, name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// A snapshot of every row, in id order. The returned rows are owned
    /// copies; mutating them never touches the table.
    pub fn all_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|(id, values)| Row::new(*id, values.clone()))
            .collect()
    }

    pub fn get_row(&self, id: i64) -> Option<Row> {
        self.rows.get(&id).map(|values| Row::new(id, values.clone()))
    }

    /// Appends a row and returns its id.
    pub fn insert_row(&mut self, values: Vec<Value>) -> Result<i64> {
        self.check_row(&values, None)?;
        let id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(id, values);
        Ok(id)
    }

    /// Replaces the values of row `id`. Returns `false` if no such row.
    pub fn update_row(&mut self, id: i64, values: Vec<Value>) -> Result<bool> {
        if !self.rows.contains_key(&id) {
            return Ok(false);
        }
        self.check_row(&values, Some(id))?;
        self.rows.insert(id, values);
        Ok(true)
    }

    /// Removes row `id`. Returns `false` if no such row.
    pub fn delete_row(&mut self, id: i64) -> bool {
        self.rows.remove(&id).is_some()
    }

    pub fn indexes(&self) -> &[IndexInfo] {
        &self.indexes
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.iter().any(|i| i.name.eq_ignore_ascii_case(name))
    }

    /// Registers an index. A unique index is rejected if existing rows
    /// already violate it.
    pub fn create_index(&mut self, index: IndexInfo) -> Result<()> {
        if self.has_index(&index.name) {
            return Err(HorizonError::DuplicateIndex(index.name));
        }
        for col in &index.columns {
            if self.column_index(col).is_none() {
                return Err(HorizonError::ColumnNotFound(col.clone()));
            }
        }
        if index.unique {
            for (id, values) in &self.rows {
                self.check_unique(&index, values, Some(*id))?;
            }
        }
        self.indexes.push(index);
        Ok(())
    }

    /// Removes an index. Returns `false` if no such index.
    pub fn drop_index(&mut self, name: &str) -> bool {
        let before = self.indexes.len();
        self.indexes.retain(|i| !i.name.eq_ignore_ascii_case(name));
        self.indexes.len() != before
    }

    fn check_row(&self, values: &[Value], own_id: Option<i64>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(HorizonError::ColumnCountMismatch(format!(
                "table {} has {} columns but {} values were supplied",
                self.name,
                self.columns.len(),
                values.len()
            )));
        }
        for (col, value) in self.columns.iter().zip(values) {
            if !col.is_valid_value(value) {
                return Err(if value.is_null() {
                    HorizonError::NullNotAllowed(col.name.clone())
                } else {
                    HorizonError::InvalidColumnValue {
                        column: col.name.clone(),
                        data_type: col.data_type.to_string(),
                        value: value.to_sql_literal(),
                    }
                });
            }
        }
        for index in self.indexes.iter().filter(|i| i.unique) {
            self.check_unique(index, values, own_id)?;
        }
        Ok(())
    }

    fn check_unique(&self, index: &IndexInfo, values: &[Value], own_id: Option<i64>) -> Result<()> {
        let positions: Vec<usize> = index
            .columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        // Keys containing NULL never conflict.
        if positions.iter().any(|&p| values[p].is_null()) {
            return Ok(());
        }
        let conflict = self.rows.iter().any(|(id, existing)| {
            Some(*id) != own_id
                && positions
                    .iter()
                    .all(|&p| values_equal(&existing[p], &values[p]))
        });
        if conflict {
            let key: Vec<String> = positions.iter().map(|&p| values[p].to_sql_literal()).collect();
            return Err(HorizonError::UniqueViolation(format!(
                "{} ON {}({}) VALUES ({})",
                index.name,
                self.name,
                index.columns.join(", "),
                key.join(", ")
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// A named counter.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub name: String,
    start: i64,
    increment: i64,
    current: Option<i64>,
}

impl Sequence {
    pub fn new(name: impl Into<String>, start: i64, increment: i64) -> Self {
        Sequence {
            name: name.into(),
            start,
            increment,
            current: None,
        }
    }

    /// Advances the sequence and returns the new value.
    pub fn next_value(&mut self) -> Result<i64> {
        let next = match self.current {
            None => self.start,
            Some(current) => current.checked_add(self.increment).ok_or_else(|| {
                HorizonError::Overflow(format!("sequence {} exhausted", self.name))
            })?,
        };
        self.current = Some(next);
        Ok(next)
    }

    /// The value last returned by [`next_value`](Self::next_value).
    pub fn current_value(&self) -> Result<i64> {
        self.current
            .ok_or_else(|| HorizonError::SequenceNotStarted(self.name.clone()))
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// The storage operations the executor depends on.
///
/// Implementations provide no locking; isolation between concurrent
/// statements is the caller's concern.
pub trait Storage {
    fn get_table(&self, schema: &str, name: &str) -> Option<&Table>;

    fn get_table_mut(&mut self, schema: &str, name: &str) -> Option<&mut Table>;

    fn create_table(&mut self, schema: &str, table: Table) -> Result<()>;

    fn drop_table(&mut self, schema: &str, name: &str) -> Result<Table>;

    fn get_sequence_mut(&mut self, schema: &str, name: &str) -> Option<&mut Sequence>;

    /// Name of the table in `schema` that owns index `index`, if any.
    fn find_index_table(&self, schema: &str, index: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
struct Schema {
    tables: HashMap<String, Table>,
    sequences: HashMap<String, Sequence>,
}

/// In-memory [`Storage`] holding any number of schemas.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    schemas: HashMap<String, Schema>,
}

impl Catalog {
    /// Create a new, empty catalog.
    pub fn new() -> Self {
        Catalog::default()
    }

    pub fn create_sequence(&mut self, schema: &str, sequence: Sequence) -> Result<()> {
        let key = sequence.name.to_lowercase();
        let entry = self.schemas.entry(schema.to_lowercase()).or_default();
        if entry.sequences.contains_key(&key) {
            return Err(HorizonError::Unsupported(format!(
                "sequence {} already exists",
                sequence.name
            )));
        }
        entry.sequences.insert(key, sequence);
        Ok(())
    }

    /// Table names in `schema`, sorted.
    pub fn table_names(&self, schema: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .schemas
            .get(&schema.to_lowercase())
            .map(|s| s.tables.values().map(|t| t.name().to_string()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl Storage for Catalog {
    fn get_table(&self, schema: &str, name: &str) -> Option<&Table> {
        self.schemas
            .get(&schema.to_lowercase())?
            .tables
            .get(&name.to_lowercase())
    }

    fn get_table_mut(&mut self, schema: &str, name: &str) -> Option<&mut Table> {
        self.schemas
            .get_mut(&schema.to_lowercase())?
            .tables
            .get_mut(&name.to_lowercase())
    }

    fn create_table(&mut self, schema: &str, table: Table) -> Result<()> {
        let key = table.name().to_lowercase();
        let entry = self.schemas.entry(schema.to_lowercase()).or_default();
        if entry.tables.contains_key(&key) {
            return Err(HorizonError::DuplicateTable(table.name().to_string()));
        }
        entry.tables.insert(key, table);
        Ok(())
    }

    fn drop_table(&mut self, schema: &str, name: &str) -> Result<Table> {
        self.schemas
            .get_mut(&schema.to_lowercase())
            .and_then(|s| s.tables.remove(&name.to_lowercase()))
            .ok_or_else(|| HorizonError::TableNotFound(name.to_string()))
    }

    fn get_sequence_mut(&mut self, schema: &str, name: &str) -> Option<&mut Sequence> {
        self.schemas
            .get_mut(&schema.to_lowercase())?
            .sequences
            .get_mut(&name.to_lowercase())
    }

    fn find_index_table(&self, schema: &str, index: &str) -> Option<String> {
        self.schemas
            .get(&schema.to_lowercase())?
            .tables
            .values()
            .find(|t| t.has_index(index))
            .map(|t| t.name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        Table::new(
            "users",
            vec![
                Column::new("id", DataType::Integer).not_null(),
                Column::new("name", DataType::Varchar(Some(5))),
            ],
        )
        .unwrap()
    }

    #[test]
    fn insert_update_delete_round_trip() {
        let mut table = users();
        let id = table
            .insert_row(vec![Value::Integer(1), Value::Text("ann".into())])
            .unwrap();
        assert_eq!(id, 1);
        assert!(table
            .update_row(id, vec![Value::Integer(1), Value::Text("bob".into())])
            .unwrap());
        assert_eq!(table.all_rows()[0].values[1], Value::Text("bob".into()));
        assert!(table.delete_row(id));
        assert!(!table.delete_row(id));
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn row_ids_are_stable_and_increasing() {
        let mut table = users();
        let a = table.insert_row(vec![Value::Integer(1), Value::Null]).unwrap();
        let b = table.insert_row(vec![Value::Integer(2), Value::Null]).unwrap();
        table.delete_row(a);
        let c = table.insert_row(vec![Value::Integer(3), Value::Null]).unwrap();
        assert!(a < b && b < c);
        let ids: Vec<i64> = table.all_rows().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b, c]);
    }

    #[test]
    fn column_coerce_converts_and_validates() {
        let table = users();
        let id = &table.columns()[0];
        assert!(matches!(id.coerce(&Value::Text("7".into())).unwrap(), Value::Integer(7)));
        assert!(matches!(
            id.coerce(&Value::Null).unwrap_err(),
            HorizonError::NullNotAllowed(_)
        ));
        let name = &table.columns()[1];
        assert!(matches!(
            name.coerce(&Value::Text("too long".into())).unwrap_err(),
            HorizonError::InvalidColumnValue { .. }
        ));
        assert!(name.is_valid_value(&Value::Null));
    }

    #[test]
    fn insert_rejects_wrong_arity_and_nulls() {
        let mut table = users();
        assert!(matches!(
            table.insert_row(vec![Value::Integer(1)]).unwrap_err(),
            HorizonError::ColumnCountMismatch(_)
        ));
        assert!(matches!(
            table.insert_row(vec![Value::Null, Value::Null]).unwrap_err(),
            HorizonError::NullNotAllowed(_)
        ));
    }

    #[test]
    fn unique_index_is_enforced() {
        let mut table = users();
        table
            .create_index(IndexInfo {
                name: "ux_id".into(),
                columns: vec!["id".into()],
                unique: true,
            })
            .unwrap();
        table.insert_row(vec![Value::Integer(1), Value::Null]).unwrap();
        let err = table
            .insert_row(vec![Value::Integer(1), Value::Null])
            .unwrap_err();
        assert!(matches!(err, HorizonError::UniqueViolation(_)));

        // Updating a row to its own key is fine.
        assert!(table
            .update_row(1, vec![Value::Integer(1), Value::Text("x".into())])
            .unwrap());
    }

    #[test]
    fn unique_index_creation_checks_existing_rows() {
        let mut table = users();
        table.insert_row(vec![Value::Integer(1), Value::Text("a".into())]).unwrap();
        table.insert_row(vec![Value::Integer(2), Value::Text("a".into())]).unwrap();
        let err = table
            .create_index(IndexInfo {
                name: "ux_name".into(),
                columns: vec!["name".into()],
                unique: true,
            })
            .unwrap_err();
        assert!(matches!(err, HorizonError::UniqueViolation(_)));
        assert!(!table.has_index("ux_name"));
    }

    #[test]
    fn duplicate_column_names_are_rejected() {
        let err = Table::new(
            "t",
            vec![
                Column::new("a", DataType::Integer),
                Column::new("A", DataType::Integer),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, HorizonError::DuplicateColumn(_)));
    }

    #[test]
    fn sequence_current_requires_next() {
        let mut seq = Sequence::new("seq", 10, 5);
        assert!(matches!(
            seq.current_value().unwrap_err(),
            HorizonError::SequenceNotStarted(_)
        ));
        assert_eq!(seq.next_value().unwrap(), 10);
        assert_eq!(seq.next_value().unwrap(), 15);
        assert_eq!(seq.current_value().unwrap(), 15);
    }

    #[test]
    fn catalog_lookup_is_case_insensitive() {
        let mut catalog = Catalog::new();
        catalog.create_table("PUBLIC", users()).unwrap();
        assert!(catalog.get_table("public", "USERS").is_some());
        assert!(catalog.get_table("other", "users").is_none());
        assert!(matches!(
            catalog.create_table("public", users()).unwrap_err(),
            HorizonError::DuplicateTable(_)
        ));
        assert_eq!(catalog.table_names("Public"), vec!["users".to_string()]);
        catalog.drop_table("PUBLIC", "Users").unwrap();
        assert!(catalog.get_table("PUBLIC", "users").is_none());
    }

    #[test]
    fn find_index_table_searches_schema() {
        let mut catalog = Catalog::new();
        let mut table = users();
        table
            .create_index(IndexInfo {
                name: "idx_name".into(),
                columns: vec!["name".into()],
                unique: false,
            })
            .unwrap();
        catalog.create_table("PUBLIC", table).unwrap();
        assert_eq!(
            catalog.find_index_table("PUBLIC", "IDX_NAME"),
            Some("users".to_string())
        );
        assert_eq!(catalog.find_index_table("PUBLIC", "missing"), None);
    }
}
