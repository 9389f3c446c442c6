#![allow(dead_code)]

use std::cmp::Ordering;

use horizon::sql::{
    ColumnDef, CreateTableStatement, Expr, FromClause, InsertSource, InsertStatement, JoinCondition,
    JoinType, Query, SelectColumn, SelectStatement, Statement, TableName, TableRef,
};
use horizon::types::compare_values;
use horizon::{DataType, Database, ExecutionResult, Value};

pub fn create_table(db: &Database, name: &str, columns: &[(&str, DataType)]) {
    let columns = columns
        .iter()
        .map(|(n, t)| ColumnDef::new(*n, *t))
        .collect();
    db.execute(&Statement::CreateTable(CreateTableStatement {
        name: TableName::new(name),
        if_not_exists: false,
        columns,
    }))
    .unwrap();
}

pub fn insert(db: &Database, table: &str, rows: Vec<Vec<Value>>) -> ExecutionResult {
    let rows = rows
        .into_iter()
        .map(|r| r.into_iter().map(Expr::Literal).collect())
        .collect();
    db.execute(&Statement::Insert(InsertStatement {
        table: TableName::new(table),
        columns: None,
        source: InsertSource::Values(rows),
    }))
    .unwrap()
}

/// An integer table with every column nullable.
pub fn int_table(db: &Database, name: &str, columns: &[&str], rows: &[Vec<Option<i64>>]) {
    let defs: Vec<_> = columns.iter().map(|c| (*c, DataType::BigInt)).collect();
    create_table(db, name, &defs);
    if !rows.is_empty() {
        insert(
            db,
            name,
            rows.iter()
                .map(|r| r.iter().map(|v| Value::from(*v)).collect())
                .collect(),
        );
    }
}

pub fn from(table: &str) -> Option<FromClause> {
    Some(FromClause::table(TableRef::new(table)))
}

pub fn select(columns: Vec<SelectColumn>, from: Option<FromClause>) -> SelectStatement {
    SelectStatement {
        columns,
        from,
        ..Default::default()
    }
}

pub fn select_all(table: &str) -> Query {
    select(vec![SelectColumn::AllColumns], from(table)).into()
}

/// `SELECT * FROM left <join> right ON left.key = right.key`.
pub fn join_on_key(join_type: JoinType, left: &str, right: &str, key: &str) -> Query {
    let from = FromClause::table(TableRef::new(left)).join(
        join_type,
        TableRef::new(right),
        JoinCondition::On(Expr::eq(Expr::qcol(left, key), Expr::qcol(right, key))),
    );
    select(vec![SelectColumn::AllColumns], Some(from)).into()
}

pub fn ints(row: &[Value]) -> Vec<Option<i64>> {
    row.iter().map(|v| v.as_i64()).collect()
}

/// Rows in a canonical order, for multiset comparison.
pub fn sorted(mut rows: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    rows.sort_by(|a, b| {
        a.iter()
            .zip(b)
            .map(|(x, y)| compare_values(x, y))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    rows
}

/// Deterministic pseudo-random integers in `0..bound`.
pub fn lcg(seed: u64, count: usize, bound: u64) -> Vec<u64> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) % bound
        })
        .collect()
}
