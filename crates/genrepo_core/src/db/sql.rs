//! SQL text rendering and row decoding.
//!
//! # Responsibility
//! - Render composed queries, key lookups, eager-include lookups and
//!   pending writes into parameterized statements.
//! - Convert between `Value` and rusqlite's value types.
//!
//! # Invariants
//! - Every identifier passes `quote()` (validated and double-quoted).
//! - Every value is a bound parameter, never inlined into SQL text.

use super::{DbError, DbResult};
use crate::entity::{EntityMeta, KeyValue, MappingError, Record, Value};
use crate::query::{CompareOp, Direction, Expr, Query};
use crate::session::tracker::{PendingWrite, WriteKind};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(value) => ToSqlOutput::Owned(SqlValue::Integer(*value)),
            Value::Real(value) => ToSqlOutput::Owned(SqlValue::Real(*value)),
            Value::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Value::Blob(value) => ToSqlOutput::Borrowed(ValueRef::Blob(value)),
        })
    }
}

/// Decodes one cell. Text that is not valid UTF-8 is a mapping fault.
fn value_from_ref(column: &str, value: ValueRef<'_>) -> Result<Value, MappingError> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(value) => Value::Integer(value),
        ValueRef::Real(value) => Value::Real(value),
        ValueRef::Text(bytes) => {
            let text =
                String::from_utf8(bytes.to_vec()).map_err(|err| MappingError::InvalidValue {
                    column: column.to_string(),
                    message: err.to_string(),
                })?;
            Value::Text(text)
        }
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    })
}

/// Validates `name` as a plain identifier and returns it double-quoted.
pub(crate) fn quote(name: &str) -> DbResult<String> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(format!("\"{name}\""))
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

fn select_from(meta: &EntityMeta) -> DbResult<String> {
    let columns = meta
        .select_columns()
        .map(quote)
        .collect::<DbResult<Vec<_>>>()?;
    Ok(format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        quote(meta.table)?
    ))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn to_sql_count(value: u64) -> Value {
    Value::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Renders a composed query: filter, then ordering, then paging.
pub(crate) fn select_query<E>(meta: &EntityMeta, query: &Query<E>) -> DbResult<Statement> {
    let mut sql = select_from(meta)?;
    let mut params = Vec::new();

    if let Some(filter) = query.filter_ref() {
        sql.push_str(" WHERE ");
        render_expr(filter.expr(), &mut sql, &mut params)?;
    }

    if !query.sort_keys().is_empty() {
        let keys = query
            .sort_keys()
            .iter()
            .map(|key| {
                let direction = match key.direction {
                    Direction::Ascending => "ASC",
                    Direction::Descending => "DESC",
                };
                Ok(format!("{} {direction}", quote(key.column)?))
            })
            .collect::<DbResult<Vec<_>>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys.join(", "));
    }

    match query.limit() {
        Some(limit) => {
            sql.push_str(" LIMIT ?");
            params.push(to_sql_count(limit));
            if query.offset() > 0 {
                sql.push_str(" OFFSET ?");
                params.push(to_sql_count(query.offset()));
            }
        }
        None if query.offset() > 0 => {
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(to_sql_count(query.offset()));
        }
        None => {}
    }

    Ok(Statement { sql, params })
}

fn render_expr(expr: &Expr, sql: &mut String, params: &mut Vec<Value>) -> DbResult<()> {
    match expr {
        Expr::Compare {
            column,
            op: CompareOp::Eq,
            value: Value::Null,
        } => {
            sql.push_str(&format!("{} IS NULL", quote(column)?));
        }
        Expr::Compare {
            column,
            op: CompareOp::Ne,
            value: Value::Null,
        } => {
            sql.push_str(&format!("{} IS NOT NULL", quote(column)?));
        }
        Expr::Compare { column, op, value } => {
            sql.push_str(&format!("{} {} ?", quote(column)?, op.as_sql()));
            params.push(value.clone());
        }
        Expr::IsNull { column, negated } => {
            let test = if *negated { "IS NOT NULL" } else { "IS NULL" };
            sql.push_str(&format!("{} {test}", quote(column)?));
        }
        Expr::In { column, values } => {
            if values.is_empty() {
                sql.push_str("0 = 1");
            } else {
                sql.push_str(&format!(
                    "{} IN ({})",
                    quote(column)?,
                    placeholders(values.len())
                ));
                params.extend(values.iter().cloned());
            }
        }
        Expr::And(left, right) => render_binary(left, "AND", right, sql, params)?,
        Expr::Or(left, right) => render_binary(left, "OR", right, sql, params)?,
        Expr::Not(inner) => {
            sql.push_str("NOT (");
            render_expr(inner, sql, params)?;
            sql.push(')');
        }
    }
    Ok(())
}

fn render_binary(
    left: &Expr,
    op: &str,
    right: &Expr,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> DbResult<()> {
    sql.push('(');
    render_expr(left, sql, params)?;
    sql.push_str(&format!(" {op} "));
    render_expr(right, sql, params)?;
    sql.push(')');
    Ok(())
}

pub(crate) fn find_by_key(meta: &EntityMeta, key: &KeyValue) -> DbResult<Statement> {
    Ok(Statement {
        sql: format!(
            "{} WHERE {} = ?",
            select_from(meta)?,
            quote(meta.primary_key)?
        ),
        params: vec![Value::from(key.clone())],
    })
}

/// Rows of `target` whose `column` is one of `values`.
pub(crate) fn select_related(
    target: &EntityMeta,
    column: &str,
    values: &[Value],
) -> DbResult<Statement> {
    Ok(Statement {
        sql: format!(
            "{} WHERE {} IN ({})",
            select_from(target)?,
            quote(column)?,
            placeholders(values.len())
        ),
        params: values.to_vec(),
    })
}

/// Non-key persisted columns present in `record`, in `COLUMNS` order.
fn writable_fields<'r>(meta: &EntityMeta, record: &'r Record) -> Vec<(&'static str, &'r Value)> {
    meta.columns
        .iter()
        .filter_map(|column| record.get(column).map(|value| (*column, value)))
        .collect()
}

pub(crate) fn render_write(write: &PendingWrite) -> DbResult<Statement> {
    let meta = &write.meta;
    let table = quote(meta.table)?;
    match write.kind {
        WriteKind::Insert => {
            let mut columns = Vec::new();
            let mut params = Vec::new();
            if let Some(key) = &write.key {
                columns.push(quote(meta.primary_key)?);
                params.push(Value::from(key.clone()));
            }
            for (column, value) in writable_fields(meta, &write.record) {
                columns.push(quote(column)?);
                params.push(value.clone());
            }
            let sql = if columns.is_empty() {
                format!("INSERT INTO {table} DEFAULT VALUES")
            } else {
                format!(
                    "INSERT INTO {table} ({}) VALUES ({})",
                    columns.join(", "),
                    placeholders(params.len())
                )
            };
            Ok(Statement { sql, params })
        }
        WriteKind::Update => {
            let key_column = quote(meta.primary_key)?;
            let mut assignments = Vec::new();
            let mut params = Vec::new();
            for (column, value) in writable_fields(meta, &write.record) {
                assignments.push(format!("{} = ?", quote(column)?));
                params.push(value.clone());
            }
            if assignments.is_empty() {
                assignments.push(format!("{key_column} = {key_column}"));
            }
            params.push(Value::from(required_key(write)?));
            Ok(Statement {
                sql: format!(
                    "UPDATE {table} SET {} WHERE {key_column} = ?",
                    assignments.join(", ")
                ),
                params,
            })
        }
        WriteKind::Delete => Ok(Statement {
            sql: format!(
                "DELETE FROM {table} WHERE {} = ?",
                quote(meta.primary_key)?
            ),
            params: vec![Value::from(required_key(write)?)],
        }),
    }
}

fn required_key(write: &PendingWrite) -> DbResult<KeyValue> {
    write.key.clone().ok_or(DbError::KeyNotSet {
        entity: write.meta.table,
    })
}

/// Runs a query statement and decodes every row by column name.
pub(crate) fn fetch_records(conn: &Connection, statement: &Statement) -> DbResult<Vec<Record>> {
    let mut stmt = conn.prepare(&statement.sql)?;
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Record::new();
        for (index, name) in names.iter().enumerate() {
            let value = value_from_ref(name, row.get_ref(index)?)?;
            record.set(name.as_str(), value);
        }
        records.push(record);
    }
    Ok(records)
}

pub(crate) fn execute(conn: &Connection, statement: &Statement) -> DbResult<usize> {
    Ok(conn.execute(&statement.sql, params_from_iter(statement.params.iter()))?)
}
