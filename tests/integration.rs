mod common;

use std::sync::Arc;
use std::thread;

use common::*;
use horizon::sql::{
    AggregateFunc, BinaryOp, CommonTableExpr, CreateIndexStatement, DropIndexStatement, Expr,
    FromClause, InsertSource, InsertStatement, JoinType, MergeKeyStatement, MergeStatement,
    OrderByItem, Query, SelectColumn, SelectStatement, SequenceOp, SetOperator, Statement,
    TableName, TableRef,
};
use horizon::{
    DataType, Database, ExecutorConfig, HorizonError, JoinAlgorithm, ResultKind, Value,
};

fn people(db: &Database) {
    create_table(db, "t", &[("id", DataType::Integer), ("name", DataType::Varchar(None))]);
    insert(
        db,
        "t",
        vec![
            vec![Value::Integer(1), Value::from("a")],
            vec![Value::Integer(2), Value::from("b")],
        ],
    );
}

fn employees(db: &Database) {
    create_table(
        db,
        "emp",
        &[
            ("name", DataType::Varchar(None)),
            ("dept", DataType::Integer),
            ("salary", DataType::Integer),
        ],
    );
    insert(
        db,
        "emp",
        [
            ("ann", Some(1), Some(100)),
            ("bob", Some(1), Some(200)),
            ("cy", Some(2), Some(50)),
            ("dee", Some(2), None),
            ("eve", None, Some(80)),
        ]
        .into_iter()
        .map(|(n, d, s)| vec![Value::from(n), Value::from(d), Value::from(s)])
        .collect(),
    );
}

#[test]
fn select_with_where() {
    let db = Database::new();
    people(&db);
    let mut query = select(vec![SelectColumn::expr(Expr::col("name"))], from("t"));
    query.where_clause = Some(Expr::eq(Expr::col("id"), Expr::lit(1)));

    let result = db.query(&query.into()).unwrap();
    assert_eq!(result.kind(), ResultKind::Select);
    assert_eq!(result.column_names(), vec!["name"]);
    assert_eq!(result.values(), vec![vec![Value::from("a")]]);
}

#[test]
fn left_join_pads_unmatched_rows() {
    let db = Database::new();
    int_table(&db, "l", &["id", "val"], &[vec![Some(1), Some(10)], vec![Some(2), Some(20)]]);
    int_table(&db, "r", &["id", "val"], &[vec![Some(1), Some(100)]]);

    let result = db.query(&join_on_key(JoinType::Left, "l", "r", "id")).unwrap();
    let rows: Vec<_> = result.values().iter().map(|r| ints(r)).collect();
    assert_eq!(
        rows,
        vec![
            vec![Some(1), Some(10), Some(1), Some(100)],
            vec![Some(2), Some(20), None, None],
        ]
    );
}

#[test]
fn group_by_sum() {
    let db = Database::new();
    int_table(
        &db,
        "e",
        &["dept", "salary"],
        &[vec![Some(1), Some(100)], vec![Some(1), Some(200)], vec![Some(2), Some(50)]],
    );
    let mut query = select(
        vec![
            SelectColumn::expr(Expr::col("dept")),
            SelectColumn::expr(Expr::agg(AggregateFunc::Sum, Expr::col("salary"))),
        ],
        from("e"),
    );
    query.group_by = vec![Expr::col("dept")];

    let result = db.query(&query.into()).unwrap();
    assert_eq!(result.column_names(), vec!["dept", "column2"]);
    assert_eq!(
        result.values(),
        vec![
            vec![Value::BigInt(1), Value::Double(300.0)],
            vec![Value::BigInt(2), Value::Double(50.0)],
        ]
    );
}

#[test]
fn sqrt_domain_error_and_null() {
    let db = Database::new();
    let sqrt = |arg: Expr| -> Query {
        select(vec![SelectColumn::expr(Expr::func("SQRT", vec![arg]))], None).into()
    };

    let err = db.query(&sqrt(Expr::lit(-1))).unwrap_err();
    assert!(matches!(err, HorizonError::InvalidArgument { .. }));
    assert_eq!(err.code() / 1000, 4);

    let result = db.query(&sqrt(Expr::null())).unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.columns().len(), 1);
    assert_eq!(result.scalar(), Some(&Value::Null));
}

fn merge_x(db: &Database) -> usize {
    let stmt = Statement::Merge(MergeStatement::Key(MergeKeyStatement {
        table: TableName::new("m"),
        columns: None,
        key_columns: vec!["id".into()],
        values: vec![vec![Expr::lit(1), Expr::lit("x")]],
    }));
    db.execute(&stmt).unwrap().affected_rows()
}

#[test]
fn merge_key_updates_or_inserts() {
    let db = Database::new();
    create_table(&db, "m", &[("id", DataType::Integer), ("v", DataType::Varchar(None))]);

    assert_eq!(merge_x(&db), 1);
    assert_eq!(
        db.query(&select_all("m")).unwrap().values(),
        vec![vec![Value::Integer(1), Value::from("x")]]
    );

    insert(&db, "m", vec![vec![Value::Integer(2), Value::from("y")]]);
    db.execute(&Statement::Update(horizon::sql::UpdateStatement {
        table: TableName::new("m"),
        assignments: vec![("v".into(), Expr::lit("old"))],
        where_clause: Some(Expr::eq(Expr::col("id"), Expr::lit(1))),
    }))
    .unwrap();
    assert_eq!(merge_x(&db), 1);
    assert_eq!(
        db.query(&select_all("m")).unwrap().values(),
        vec![
            vec![Value::Integer(1), Value::from("x")],
            vec![Value::Integer(2), Value::from("y")],
        ]
    );
}

#[test]
fn join_algorithms_agree() {
    let nested = Database::with_config(
        ExecutorConfig::default().with_join_algorithm(JoinAlgorithm::NestedLoop),
    );
    let hashed =
        Database::with_config(ExecutorConfig::default().with_join_algorithm(JoinAlgorithm::Hash));
    for db in [&nested, &hashed] {
        let keys = lcg(7, 60, 12);
        let left: Vec<_> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| vec![Some(i as i64), (*k != 0).then_some(*k as i64)])
            .collect();
        let right: Vec<_> = lcg(11, 40, 12)
            .iter()
            .enumerate()
            .map(|(i, k)| vec![(*k != 0).then_some(*k as i64), Some(1000 + i as i64)])
            .collect();
        int_table(db, "a", &["id", "k"], &left);
        int_table(db, "b", &["k", "payload"], &right);
    }

    for join_type in [JoinType::Inner, JoinType::Left, JoinType::Right, JoinType::Full] {
        let query = join_on_key(join_type, "a", "b", "k");
        let expected = sorted(nested.query(&query).unwrap().values());
        let actual = sorted(hashed.query(&query).unwrap().values());
        assert_eq!(expected, actual, "{join_type:?}");
    }
}

#[test]
fn left_join_keeps_every_left_row() {
    let db = Database::new();
    let left: Vec<_> = lcg(3, 80, 20).iter().map(|k| vec![Some(*k as i64)]).collect();
    let right: Vec<_> = lcg(5, 15, 20).iter().map(|k| vec![Some(*k as i64)]).collect();
    int_table(&db, "a", &["k"], &left);
    int_table(&db, "b", &["k"], &right);

    let rows = db
        .query(&join_on_key(JoinType::Left, "a", "b", "k"))
        .unwrap()
        .values();
    for row in &left {
        let hits: Vec<_> = rows.iter().filter(|r| r[0].as_i64() == row[0]).collect();
        assert!(!hits.is_empty());
        if !right.contains(row) {
            assert!(hits.iter().all(|r| r[1].is_null()));
        }
    }
    let unmatched = left.iter().filter(|r| !right.contains(r)).count();
    assert_eq!(rows.iter().filter(|r| r[1].is_null()).count(), unmatched);
}

#[test]
fn null_equality_differs_between_where_and_merge_keys() {
    let db = Database::new();
    int_table(&db, "n", &["k", "v"], &[vec![None, Some(1)]]);

    let mut query = select(vec![SelectColumn::AllColumns], from("n"));
    query.where_clause = Some(Expr::eq(Expr::col("k"), Expr::null()));
    assert_eq!(db.query(&query.clone().into()).unwrap().row_count(), 0);
    query.where_clause = Some(Expr::eq(Expr::col("k"), Expr::col("k")));
    assert_eq!(db.query(&query.into()).unwrap().row_count(), 0);

    let merge = Statement::Merge(MergeStatement::Key(MergeKeyStatement {
        table: TableName::new("n"),
        columns: None,
        key_columns: vec!["k".into()],
        values: vec![vec![Expr::null(), Expr::lit(2)]],
    }));
    assert_eq!(db.execute(&merge).unwrap().affected_rows(), 1);
    let rows = db.query(&select_all("n")).unwrap().values();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][1], Value::BigInt(2));
}

#[test]
fn aggregates_agree_with_filtered_rows() {
    let db = Database::new();
    employees(&db);
    let filter = Expr::binary(Expr::col("dept"), BinaryOp::LtEq, Expr::lit(2));

    let mut filtered = select(vec![SelectColumn::AllColumns], from("emp"));
    filtered.where_clause = Some(filter.clone());
    let rows = db.query(&filtered.into()).unwrap().values();

    let mut stats = select(
        vec![
            SelectColumn::expr(Expr::count_star()),
            SelectColumn::expr(Expr::agg(AggregateFunc::Sum, Expr::col("salary"))),
            SelectColumn::expr(Expr::agg(AggregateFunc::Count, Expr::col("salary"))),
            SelectColumn::expr(Expr::agg(AggregateFunc::Avg, Expr::col("salary"))),
        ],
        from("emp"),
    );
    stats.where_clause = Some(filter);
    let stats = db.query(&stats.into()).unwrap().values().remove(0);

    assert_eq!(stats[0], Value::BigInt(rows.len() as i64));
    let (sum, count, avg) = match (&stats[1], &stats[2], &stats[3]) {
        (Value::Double(s), Value::BigInt(c), Value::Double(a)) => (*s, *c, *a),
        other => panic!("unexpected aggregate values {other:?}"),
    };
    assert_eq!(count, 3);
    assert_eq!(avg, sum / count as f64);

    let mut empty = select(
        vec![SelectColumn::expr(Expr::agg(AggregateFunc::Avg, Expr::col("salary")))],
        from("emp"),
    );
    empty.where_clause = Some(Expr::binary(Expr::col("dept"), BinaryOp::Gt, Expr::lit(9)));
    assert_eq!(db.query(&empty.into()).unwrap().scalar(), Some(&Value::Null));
}

#[test]
fn select_star_is_repeatable() {
    let db = Database::new();
    employees(&db);
    let first = db.query(&select_all("emp")).unwrap();
    let second = db.query(&select_all("emp")).unwrap();
    assert_eq!(first.columns(), second.columns());
    assert_eq!(first.values(), second.values());
    assert_eq!(first.columns()[2].data_type, DataType::Integer);
}

#[test]
fn correlated_subquery_reads_outer_row() {
    let db = Database::new();
    employees(&db);
    let dept_avg = select(
        vec![SelectColumn::expr(Expr::agg(AggregateFunc::Avg, Expr::col("salary")))],
        Some(FromClause::table(TableRef::new("emp").with_alias("x"))),
    );
    let dept_avg = SelectStatement {
        where_clause: Some(Expr::eq(Expr::qcol("x", "dept"), Expr::qcol("e", "dept"))),
        ..dept_avg
    };
    let mut query = select(
        vec![SelectColumn::expr(Expr::qcol("e", "name"))],
        Some(FromClause::table(TableRef::new("emp").with_alias("e"))),
    );
    query.where_clause = Some(Expr::binary(
        Expr::col("salary"),
        BinaryOp::Gt,
        Expr::subquery(dept_avg),
    ));

    let result = db.query(&query.into()).unwrap();
    assert_eq!(result.values(), vec![vec![Value::from("bob")]]);
}

#[test]
fn exists_and_in_subqueries() {
    let db = Database::new();
    employees(&db);
    int_table(&db, "depts", &["id"], &[vec![Some(2)]]);

    let dept_ids = select(vec![SelectColumn::expr(Expr::col("id"))], from("depts"));
    let mut query = select(vec![SelectColumn::expr(Expr::col("name"))], from("emp"));
    query.where_clause = Some(Expr::in_subquery(Expr::col("dept"), dept_ids));
    let names = db.query(&query.clone().into()).unwrap().values();
    assert_eq!(names, vec![vec![Value::from("cy")], vec![Value::from("dee")]]);

    let mut none = select(vec![SelectColumn::AllColumns], from("depts"));
    none.where_clause = Some(Expr::eq(Expr::col("id"), Expr::lit(99)));
    query.where_clause = Some(Expr::exists(none));
    assert_eq!(db.query(&query.into()).unwrap().row_count(), 0);
}

#[test]
fn scalar_subquery_cardinality() {
    let db = Database::new();
    employees(&db);
    let many = select(vec![SelectColumn::expr(Expr::col("name"))], from("emp"));
    let query = select(vec![SelectColumn::expr(Expr::subquery(many))], None);
    let err = db.query(&query.into()).unwrap_err();
    assert!(matches!(err, HorizonError::SubqueryTooManyRows));

    let mut wide = select(vec![SelectColumn::AllColumns], from("emp"));
    wide.limit = Some(Expr::lit(1));
    let query = select(vec![SelectColumn::expr(Expr::subquery(wide))], None);
    assert!(matches!(
        db.query(&query.into()),
        Err(HorizonError::SubqueryNotSingleColumn)
    ));
}

#[test]
fn distinct_union_and_cte() {
    let db = Database::new();
    employees(&db);
    let mut depts = select(vec![SelectColumn::expr(Expr::col("dept"))], from("emp"));
    depts.distinct = true;
    depts.order_by = vec![OrderByItem::asc(Expr::col("dept"))];
    let result = db.query(&depts.into()).unwrap();
    assert_eq!(
        result.values(),
        vec![vec![Value::Null], vec![Value::Integer(1)], vec![Value::Integer(2)]]
    );

    let names = |table: &str| -> Query {
        select(vec![SelectColumn::expr(Expr::col("name"))], from(table)).into()
    };
    let query = Query::With {
        ctes: vec![CommonTableExpr {
            name: "rich".into(),
            query: {
                let mut q = select(vec![SelectColumn::expr(Expr::col("name"))], from("emp"));
                q.where_clause = Some(Expr::binary(
                    Expr::col("salary"),
                    BinaryOp::GtEq,
                    Expr::lit(100),
                ));
                q.into()
            },
        }],
        body: Box::new(Query::Compound {
            op: SetOperator::Union,
            left: Box::new(names("rich")),
            right: Box::new(names("rich")),
        }),
    };
    assert_eq!(db.query(&query).unwrap().row_count(), 2);
    assert!(db.table_names().unwrap().iter().all(|t| t != "rich"));
}

#[test]
fn insert_select_with_sequence_ids() {
    let db = Database::new();
    employees(&db);
    create_table(&db, "archive", &[("id", DataType::BigInt), ("name", DataType::Varchar(None))]);
    db.create_sequence("archive_ids", 100, 10).unwrap();

    let next = Expr::Sequence {
        name: TableName::new("archive_ids"),
        op: SequenceOp::Next,
    };
    let source = select(
        vec![SelectColumn::expr(next), SelectColumn::expr(Expr::col("name"))],
        from("emp"),
    );
    let result = db
        .execute(&Statement::Insert(InsertStatement {
            table: TableName::new("archive"),
            columns: None,
            source: InsertSource::Query(Box::new(source.into())),
        }))
        .unwrap();
    assert_eq!(result.kind(), ResultKind::Insert);
    assert_eq!(result.affected_rows(), 5);

    let ids: Vec<_> = db
        .query(&select_all("archive"))
        .unwrap()
        .values()
        .into_iter()
        .map(|r| r[0].clone())
        .collect();
    assert_eq!(ids.first(), Some(&Value::BigInt(100)));
    assert_eq!(ids.last(), Some(&Value::BigInt(140)));
}

#[test]
fn drop_missing_index() {
    let db = Database::new();
    people(&db);
    let drop = |if_exists| {
        Statement::DropIndex(DropIndexStatement {
            name: TableName::new("idx_name"),
            if_exists,
        })
    };
    let result = db.execute(&drop(true)).unwrap();
    assert!(result.is_success());
    assert!(result.message().is_some());
    assert!(matches!(db.execute(&drop(false)), Err(HorizonError::IndexNotFound(_))));

    db.execute(&Statement::CreateIndex(CreateIndexStatement {
        name: "idx_name".into(),
        table: TableName::new("t"),
        columns: vec!["name".into()],
        unique: true,
        if_not_exists: false,
    }))
    .unwrap();
    let dup = db.execute(&Statement::Insert(InsertStatement {
        table: TableName::new("t"),
        columns: None,
        source: InsertSource::Values(vec![vec![Expr::lit(3), Expr::lit("a")]]),
    }));
    assert!(matches!(dup, Err(HorizonError::UniqueViolation(_))));
    assert_eq!(db.execute(&drop(false)).unwrap().kind(), ResultKind::Ddl);
}

#[test]
fn concurrent_inserts_are_serialized() {
    let db = Arc::new(Database::new());
    create_table(&db, "hits", &[("n", DataType::Integer)]);
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for i in 0..25 {
                    insert(&db, "hits", vec![vec![Value::Integer(t * 100 + i)]]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let count = select(vec![SelectColumn::expr(Expr::count_star())], from("hits"));
    assert_eq!(
        db.query(&count.into()).unwrap().scalar(),
        Some(&Value::BigInt(100))
    );
}
