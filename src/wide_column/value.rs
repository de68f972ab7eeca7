// src/wide_column/value.rs

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::schema::Column;
use crate::error::{AppError, AppResult};

/// A value bound to a statement parameter or read back from a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CqlValue {
    Null,
    Int(i32),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

/// Column → value pairs, ordered by column so rendered statements are stable.
pub type ColumnValues = BTreeMap<Column, CqlValue>;

impl fmt::Display for CqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CqlValue::Null => f.write_str("null"),
            CqlValue::Int(v) => write!(f, "{v}"),
            CqlValue::Text(v) => write!(f, "'{v}'"),
            CqlValue::Uuid(v) => write!(f, "{v}"),
            CqlValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<Uuid> for CqlValue {
    fn from(v: Uuid) -> Self {
        CqlValue::Uuid(v)
    }
}

impl From<Option<Uuid>> for CqlValue {
    fn from(v: Option<Uuid>) -> Self {
        v.map_or(CqlValue::Null, CqlValue::Uuid)
    }
}

impl From<i32> for CqlValue {
    fn from(v: i32) -> Self {
        CqlValue::Int(v)
    }
}

impl From<String> for CqlValue {
    fn from(v: String) -> Self {
        CqlValue::Text(v)
    }
}

impl From<&str> for CqlValue {
    fn from(v: &str) -> Self {
        CqlValue::Text(v.to_owned())
    }
}

impl From<DateTime<Utc>> for CqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        CqlValue::Timestamp(v)
    }
}

/// A row returned by a select, keyed by column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(pub ColumnValues);

impl Row {
    pub fn get(&self, column: Column) -> Option<&CqlValue> {
        self.0.get(&column)
    }

    /// Reads a nullable UUID column.
    pub fn opt_uuid(&self, column: Column) -> AppResult<Option<Uuid>> {
        match self.get(column) {
            None | Some(CqlValue::Null) => Ok(None),
            Some(CqlValue::Uuid(v)) => Ok(Some(*v)),
            Some(other) => Err(type_mismatch(column, "uuid", other)),
        }
    }

    pub fn uuid(&self, column: Column) -> AppResult<Uuid> {
        self.opt_uuid(column)?
            .ok_or_else(|| AppError::Internal(format!("column {column} is null")))
    }

    pub fn int(&self, column: Column) -> AppResult<i32> {
        match self.get(column) {
            Some(CqlValue::Int(v)) => Ok(*v),
            Some(other) => Err(type_mismatch(column, "int", other)),
            None => Err(AppError::Internal(format!("column {column} missing"))),
        }
    }

    pub fn text(&self, column: Column) -> AppResult<String> {
        match self.get(column) {
            Some(CqlValue::Text(v)) => Ok(v.clone()),
            Some(CqlValue::Null) | None => Ok(String::new()),
            Some(other) => Err(type_mismatch(column, "text", other)),
        }
    }

    pub fn timestamp(&self, column: Column) -> AppResult<DateTime<Utc>> {
        match self.get(column) {
            Some(CqlValue::Timestamp(v)) => Ok(*v),
            Some(other) => Err(type_mismatch(column, "timestamp", other)),
            None => Err(AppError::Internal(format!("column {column} missing"))),
        }
    }
}

fn type_mismatch(column: Column, expected: &str, found: &CqlValue) -> AppError {
    AppError::Internal(format!(
        "column {column}: expected {expected}, found {found:?}"
    ))
}
