//! Abstract syntax tree definitions for Horizon SQL.
//!
//! The tree is produced by the upstream parser and consumed unchanged by the
//! execution engine. Statement and expression kinds are closed enums, so
//! every consumer matches them exhaustively.
//!
//! Small constructor helpers (`Expr::col`, `Expr::eq`, `TableRef::new`, ...)
//! keep hand-built trees readable in tests and embedding code.

use std::fmt;

use crate::types::{DataType, Value};

/// A top-level SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A SELECT, possibly compound or wrapped in a `WITH` clause.
    Query(Query),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Merge(MergeStatement),
    CreateTable(CreateTableStatement),
    DropTable(DropTableStatement),
    CreateIndex(CreateIndexStatement),
    DropIndex(DropIndexStatement),
}

impl Statement {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Query(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
            Statement::Merge(_) => "MERGE",
            Statement::CreateTable(_) => "CREATE TABLE",
            Statement::DropTable(_) => "DROP TABLE",
            Statement::CreateIndex(_) => "CREATE INDEX",
            Statement::DropIndex(_) => "DROP INDEX",
        }
    }
}

impl From<SelectStatement> for Statement {
    fn from(select: SelectStatement) -> Self {
        Statement::Query(Query::Select(Box::new(select)))
    }
}

/// A row-producing query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(Box<SelectStatement>),
    /// `left UNION|UNION ALL|INTERSECT|EXCEPT right`.
    Compound {
        op: SetOperator,
        left: Box<Query>,
        right: Box<Query>,
    },
    /// `WITH name AS (query), ... body`.
    With {
        ctes: Vec<CommonTableExpr>,
        body: Box<Query>,
    },
}

impl From<SelectStatement> for Query {
    fn from(select: SelectStatement) -> Self {
        Query::Select(Box::new(select))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

/// One `name AS (query)` entry of a `WITH` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonTableExpr {
    pub name: String,
    pub query: Query,
}

/// A `SELECT` statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectStatement {
    pub distinct: bool,
    pub columns: Vec<SelectColumn>,
    pub from: Option<FromClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

/// A single item in the SELECT column list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    /// An arbitrary expression, optionally aliased (`expr AS alias`).
    Expr { expr: Expr, alias: Option<String> },
    /// A bare `*`.
    AllColumns,
    /// A qualified `table.*`.
    TableAllColumns(String),
}

impl SelectColumn {
    pub fn expr(expr: Expr) -> Self {
        SelectColumn::Expr { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        SelectColumn::Expr {
            expr,
            alias: Some(alias.into()),
        }
    }
}

/// A possibly schema-qualified object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        TableName {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        TableName {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A table reference in FROM, optionally aliased.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub table: TableName,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        TableRef {
            table: TableName::new(name),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The name column references use to qualify this table.
    pub fn visible_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table.name)
    }
}

/// The `FROM` clause: base table references plus a chain of joins applied
/// left to right.
///
/// Only a single base reference is supported; a comma-separated list of
/// independent tables is rejected by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub tables: Vec<TableRef>,
    pub joins: Vec<Join>,
}

impl FromClause {
    pub fn table(table: TableRef) -> Self {
        FromClause {
            tables: vec![table],
            joins: vec![],
        }
    }

    pub fn join(mut self, join_type: JoinType, table: TableRef, condition: JoinCondition) -> Self {
        self.joins.push(Join {
            join_type,
            table,
            condition,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub condition: JoinCondition,
}

/// The flavour of a `JOIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    On(Expr),
    /// Equality over every column name both sides share.
    Natural,
    Using(Vec<String>),
    None,
}

/// A single item in an `ORDER BY` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub desc: bool,
}

impl OrderByItem {
    pub fn asc(expr: Expr) -> Self {
        OrderByItem { expr, desc: false }
    }

    pub fn desc(expr: Expr) -> Self {
        OrderByItem { expr, desc: true }
    }
}

/// An `INSERT` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: TableName,
    pub columns: Option<Vec<String>>,
    pub source: InsertSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    /// Multiple value rows: `VALUES (a, b), (c, d)`.
    Values(Vec<Vec<Expr>>),
    Query(Box<Query>),
}

/// An `UPDATE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: TableName,
    pub assignments: Vec<(String, Expr)>,
    pub where_clause: Option<Expr>,
}

/// A `DELETE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: TableName,
    pub where_clause: Option<Expr>,
}

/// A `MERGE` statement in either of its two forms.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeStatement {
    /// `MERGE INTO t [(cols)] KEY (key_cols) VALUES (...), ...`
    Key(MergeKeyStatement),
    /// `MERGE INTO t USING source ON cond WHEN [NOT] MATCHED ... THEN ...`
    Using(MergeUsingStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeKeyStatement {
    pub table: TableName,
    pub columns: Option<Vec<String>>,
    pub key_columns: Vec<String>,
    pub values: Vec<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeUsingStatement {
    pub target: TableRef,
    pub source: MergeSource,
    pub on: Expr,
    pub clauses: Vec<MergeWhen>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeSource {
    Table(TableRef),
    Query { query: Box<Query>, alias: String },
}

/// One `WHEN [NOT] MATCHED [AND condition] THEN action` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeWhen {
    pub matched: bool,
    pub condition: Option<Expr>,
    pub action: MergeAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeAction {
    Update(Vec<(String, Expr)>),
    Delete,
    Insert {
        columns: Option<Vec<String>>,
        values: Vec<Expr>,
    },
}

/// A `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub name: TableName,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
}

/// A column definition inside `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
    pub not_null: bool,
    pub default: Option<Expr>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        ColumnDef {
            name: name.into(),
            data_type,
            primary_key: false,
            not_null: false,
            default: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default_value(mut self, expr: Expr) -> Self {
        self.default = Some(expr);
        self
    }
}

/// A `DROP TABLE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    pub name: TableName,
    pub if_exists: bool,
}

/// A `CREATE INDEX` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStatement {
    pub name: String,
    pub table: TableName,
    pub columns: Vec<String>,
    pub unique: bool,
    pub if_not_exists: bool,
}

/// A `DROP INDEX` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexStatement {
    pub name: TableName,
    pub if_exists: bool,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// An expression node in the AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column {
        table: Option<String>,
        name: String,
    },
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    /// A scalar function call.
    Function {
        name: String,
        args: Vec<Expr>,
    },
    /// An aggregate call. `arg` is `None` for `COUNT(*)`.
    Aggregate {
        func: AggregateFunc,
        arg: Option<Box<Expr>>,
        distinct: bool,
    },
    Cast {
        expr: Box<Expr>,
        data_type: DataType,
    },
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },
    /// A scalar subquery.
    Subquery(Box<Query>),
    Exists {
        query: Box<Query>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        query: Box<Query>,
        negated: bool,
    },
    /// `NEXT VALUE FOR seq` / `CURRENT VALUE FOR seq`.
    Sequence {
        name: TableName,
        op: SequenceOp,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOp {
    Next,
    Current,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
    Concat,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Concat => "||",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl Expr {
    pub fn lit(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn null() -> Expr {
        Expr::Literal(Value::Null)
    }

    pub fn col(name: impl Into<String>) -> Expr {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    pub fn qcol(table: impl Into<String>, name: impl Into<String>) -> Expr {
        Expr::Column {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::binary(left, BinaryOp::Eq, right)
    }

    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::binary(left, BinaryOp::And, right)
    }

    pub fn not(expr: Expr) -> Expr {
        Expr::UnaryOp {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn agg(func: AggregateFunc, arg: Expr) -> Expr {
        Expr::Aggregate {
            func,
            arg: Some(Box::new(arg)),
            distinct: false,
        }
    }

    pub fn count_star() -> Expr {
        Expr::Aggregate {
            func: AggregateFunc::Count,
            arg: None,
            distinct: false,
        }
    }

    pub fn subquery(query: impl Into<Query>) -> Expr {
        Expr::Subquery(Box::new(query.into()))
    }

    pub fn exists(query: impl Into<Query>) -> Expr {
        Expr::Exists {
            query: Box::new(query.into()),
            negated: false,
        }
    }

    pub fn in_subquery(expr: Expr, query: impl Into<Query>) -> Expr {
        Expr::InSubquery {
            expr: Box::new(expr),
            query: Box::new(query.into()),
            negated: false,
        }
    }

    /// Returns `true` if an aggregate call appears anywhere in this tree,
    /// without descending into subqueries (their aggregates belong to them).
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Aggregate { .. } => true,
            Expr::Literal(_)
            | Expr::Column { .. }
            | Expr::Subquery(_)
            | Expr::Exists { .. }
            | Expr::Sequence { .. } => false,
            Expr::BinaryOp { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Expr::UnaryOp { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::InSubquery { expr, .. } => expr.contains_aggregate(),
            Expr::Between {
                expr, low, high, ..
            } => expr.contains_aggregate() || low.contains_aggregate() || high.contains_aggregate(),
            Expr::InList { expr, list, .. } => {
                expr.contains_aggregate() || list.iter().any(Expr::contains_aggregate)
            }
            Expr::Like { expr, pattern, .. } => {
                expr.contains_aggregate() || pattern.contains_aggregate()
            }
            Expr::Function { args, .. } => args.iter().any(Expr::contains_aggregate),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                operand.as_deref().is_some_and(Expr::contains_aggregate)
                    || when_clauses
                        .iter()
                        .any(|(w, t)| w.contains_aggregate() || t.contains_aggregate())
                    || else_clause.as_deref().is_some_and(Expr::contains_aggregate)
            }
        }
    }

    /// Pre-order traversal. `f` returns `false` to skip a node's children.
    /// Subquery bodies are not entered.
    pub fn walk(&self, f: &mut impl FnMut(&Expr) -> bool) {
        if !f(self) {
            return;
        }
        match self {
            Expr::Literal(_)
            | Expr::Column { .. }
            | Expr::Subquery(_)
            | Expr::Exists { .. }
            | Expr::Sequence { .. } => {}
            Expr::BinaryOp { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::UnaryOp { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::InSubquery { expr, .. } => expr.walk(f),
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.walk(f);
                low.walk(f);
                high.walk(f);
            }
            Expr::InList { expr, list, .. } => {
                expr.walk(f);
                for item in list {
                    item.walk(f);
                }
            }
            Expr::Like { expr, pattern, .. } => {
                expr.walk(f);
                pattern.walk(f);
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.walk(f);
                }
            }
            Expr::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.walk(f);
                }
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(operand) = operand {
                    operand.walk(f);
                }
                for (when, then) in when_clauses {
                    when.walk(f);
                    then.walk(f);
                }
                if let Some(else_clause) = else_clause {
                    else_clause.walk(f);
                }
            }
        }
    }

    /// Copy of the tree where every node for which `f` returns a replacement
    /// is swapped out. Replaced subtrees are not descended into and subquery
    /// bodies are copied unchanged.
    pub fn transform(&self, f: &mut impl FnMut(&Expr) -> Option<Expr>) -> Expr {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Expr::Literal(_)
            | Expr::Column { .. }
            | Expr::Subquery(_)
            | Expr::Exists { .. }
            | Expr::Sequence { .. } => self.clone(),
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: Box::new(left.transform(f)),
                op: *op,
                right: Box::new(right.transform(f)),
            },
            Expr::UnaryOp { op, expr } => Expr::UnaryOp {
                op: *op,
                expr: Box::new(expr.transform(f)),
            },
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: Box::new(expr.transform(f)),
                negated: *negated,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Expr::Between {
                expr: Box::new(expr.transform(f)),
                low: Box::new(low.transform(f)),
                high: Box::new(high.transform(f)),
                negated: *negated,
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => Expr::InList {
                expr: Box::new(expr.transform(f)),
                list: list.iter().map(|e| e.transform(f)).collect(),
                negated: *negated,
            },
            Expr::Like {
                expr,
                pattern,
                negated,
            } => Expr::Like {
                expr: Box::new(expr.transform(f)),
                pattern: Box::new(pattern.transform(f)),
                negated: *negated,
            },
            Expr::Function { name, args } => Expr::Function {
                name: name.clone(),
                args: args.iter().map(|e| e.transform(f)).collect(),
            },
            Expr::Aggregate {
                func,
                arg,
                distinct,
            } => Expr::Aggregate {
                func: *func,
                arg: arg.as_ref().map(|a| Box::new(a.transform(f))),
                distinct: *distinct,
            },
            Expr::Cast { expr, data_type } => Expr::Cast {
                expr: Box::new(expr.transform(f)),
                data_type: *data_type,
            },
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => Expr::Case {
                operand: operand.as_ref().map(|o| Box::new(o.transform(f))),
                when_clauses: when_clauses
                    .iter()
                    .map(|(w, t)| (w.transform(f), t.transform(f)))
                    .collect(),
                else_clause: else_clause.as_ref().map(|e| Box::new(e.transform(f))),
            },
            Expr::InSubquery {
                expr,
                query,
                negated,
            } => Expr::InSubquery {
                expr: Box::new(expr.transform(f)),
                query: query.clone(),
                negated: *negated,
            },
        }
    }
}
