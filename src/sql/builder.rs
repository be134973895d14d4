//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from entity metadata.

use crate::context::ListQuery;
use crate::error::PersistenceError;
use crate::model::EntityModel;
use crate::sql::BindValue;
use serde_json::{Map, Value};

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

/// Placeholder style of the target backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

/// Quote identifier (safe: only from static entity metadata).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
    dialect: Dialect,
}

impl QueryBuf {
    fn new(dialect: Dialect) -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
            dialect,
        }
    }

    /// Records the value and returns its placeholder.
    fn push_param(&mut self, v: BindValue) -> String {
        self.params.push(v);
        match self.dialect {
            Dialect::Postgres => format!("${}", self.params.len()),
            Dialect::Sqlite => "?".to_string(),
        }
    }
}

fn select_column_list(model: &EntityModel) -> String {
    model
        .columns
        .iter()
        .map(|c| quoted(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Primary keys are text (UUID) in every table.
fn pk_value(id: &str) -> BindValue {
    BindValue::Text(Some(id.to_string()))
}

/// SELECT by primary key.
pub fn select_by_id(dialect: Dialect, model: &EntityModel, id: &str) -> QueryBuf {
    let mut q = QueryBuf::new(dialect);
    let ph = q.push_param(pk_value(id));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(model),
        quoted(model.table),
        quoted(model.pk),
        ph
    );
    q
}

/// SELECT list with exact-match filters, ordered by primary key. Unknown filter columns are rejected.
pub fn select_list(dialect: Dialect, model: &EntityModel, query: &ListQuery) -> Result<QueryBuf, PersistenceError> {
    let mut q = QueryBuf::new(dialect);
    let mut where_parts = Vec::new();
    for (col, val) in &query.filters {
        let column = model.column(col).ok_or_else(|| {
            PersistenceError::InvalidQuery(format!("unknown column '{}' on {}", col, model.table))
        })?;
        if val.is_null() {
            where_parts.push(format!("{} IS NULL", quoted(column.name)));
            continue;
        }
        let ph = q.push_param(BindValue::for_column(column, val)?);
        where_parts.push(format!("{} = {}", quoted(column.name), ph));
    }

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let mut sql = format!("SELECT {} FROM {}", select_column_list(model), quoted(model.table));
    if !where_parts.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_parts.join(" AND "));
    }
    let limit_ph = q.push_param(BindValue::BigInt(Some(i64::from(limit))));
    let offset_ph = q.push_param(BindValue::BigInt(Some(i64::from(offset))));
    sql.push_str(&format!(
        " ORDER BY {} LIMIT {} OFFSET {}",
        quoted(model.pk),
        limit_ph,
        offset_ph
    ));
    q.sql = sql;
    Ok(q)
}

pub fn count(dialect: Dialect, model: &EntityModel) -> QueryBuf {
    let mut q = QueryBuf::new(dialect);
    q.sql = format!("SELECT COUNT(*) FROM {}", quoted(model.table));
    q
}

/// INSERT with every model column taken from `row`; missing nullable columns bind NULL.
pub fn insert(dialect: Dialect, model: &EntityModel, row: &Map<String, Value>) -> Result<QueryBuf, PersistenceError> {
    let mut q = QueryBuf::new(dialect);
    let mut cols = Vec::with_capacity(model.columns.len());
    let mut placeholders = Vec::with_capacity(model.columns.len());
    for c in model.columns {
        let v = row.get(c.name).unwrap_or(&Value::Null);
        placeholders.push(q.push_param(BindValue::for_column(c, v)?));
        cols.push(quoted(c.name));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted(model.table),
        cols.join(", "),
        placeholders.join(", ")
    );
    Ok(q)
}

/// UPDATE all non-key columns present in `row`, keyed by the row's primary key.
pub fn update(dialect: Dialect, model: &EntityModel, row: &Map<String, Value>) -> Result<QueryBuf, PersistenceError> {
    let id = row_id(model, row)?;
    let mut q = QueryBuf::new(dialect);
    let mut sets = Vec::new();
    for c in model.columns.iter().filter(|c| c.name != model.pk) {
        if let Some(v) = row.get(c.name) {
            let ph = q.push_param(BindValue::for_column(c, v)?);
            sets.push(format!("{} = {}", quoted(c.name), ph));
        }
    }
    if sets.is_empty() {
        return Err(PersistenceError::InvalidQuery(format!(
            "update of {} '{}' sets no columns",
            model.entity, id
        )));
    }
    let id_ph = q.push_param(pk_value(&id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quoted(model.table),
        sets.join(", "),
        quoted(model.pk),
        id_ph
    );
    Ok(q)
}

pub fn delete(dialect: Dialect, model: &EntityModel, id: &str) -> QueryBuf {
    let mut q = QueryBuf::new(dialect);
    let ph = q.push_param(pk_value(id));
    q.sql = format!("DELETE FROM {} WHERE {} = {}", quoted(model.table), quoted(model.pk), ph);
    q
}

pub fn row_id(model: &EntityModel, row: &Map<String, Value>) -> Result<String, PersistenceError> {
    row.get(model.pk)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PersistenceError::InvalidQuery(format!("{} row has no '{}'", model.entity, model.pk)))
}
