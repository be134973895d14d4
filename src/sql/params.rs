//! Convert serde_json::Value to column-typed values that sqlx can bind.

use crate::error::PersistenceError;
use crate::model::{ColumnDef, ColumnType};
use serde_json::Value;

/// A value bound to a query, typed by the target column so NULLs keep their SQL type.
#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    Text(Option<String>),
    BigInt(Option<i64>),
    Bool(Option<bool>),
}

impl BindValue {
    pub fn for_column(column: &ColumnDef, v: &Value) -> Result<Self, PersistenceError> {
        let mismatch = || {
            PersistenceError::InvalidQuery(format!(
                "column '{}' expects {:?}, got {}",
                column.name, column.type_, v
            ))
        };
        if v.is_null() {
            if !column.nullable {
                return Err(PersistenceError::InvalidQuery(format!(
                    "column '{}' is not nullable",
                    column.name
                )));
            }
            return Ok(match column.type_ {
                ColumnType::Text => BindValue::Text(None),
                ColumnType::BigInt => BindValue::BigInt(None),
                ColumnType::Bool => BindValue::Bool(None),
            });
        }
        Ok(match column.type_ {
            ColumnType::Text => match v {
                Value::String(s) => BindValue::Text(Some(s.clone())),
                Value::Number(n) => BindValue::Text(Some(n.to_string())),
                _ => return Err(mismatch()),
            },
            ColumnType::BigInt => match v {
                Value::Number(n) => BindValue::BigInt(Some(n.as_i64().ok_or_else(mismatch)?)),
                Value::String(s) => BindValue::BigInt(Some(s.parse().map_err(|_| mismatch())?)),
                _ => return Err(mismatch()),
            },
            ColumnType::Bool => match v {
                Value::Bool(b) => BindValue::Bool(Some(*b)),
                _ => return Err(mismatch()),
            },
        })
    }
}
