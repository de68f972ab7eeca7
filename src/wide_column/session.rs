// src/wide_column/session.rs

use async_trait::async_trait;

use super::schema::{Column, OrderBy, Table};
use super::value::{CqlValue, Row};
use crate::error::AppResult;

/// Replica acknowledgement level for a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    One,
    Quorum,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Insert,
    Select,
    Update,
    Delete,
}

/// A fully parameterised statement. Identifiers come from the static schema;
/// every value travels as a bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub table: Table,
    /// Insert columns, update `SET` columns or select projection.
    pub columns: Vec<Column>,
    /// Values for `columns` (insert/update only).
    pub values: Vec<CqlValue>,
    /// Equality conditions, ANDed.
    pub conditions: Vec<(Column, CqlValue)>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub consistency: Consistency,
}

impl Statement {
    /// Renders the statement text with `?` placeholders.
    pub fn cql(&self) -> String {
        let table = self.table.name();
        let mut cql = match self.kind {
            StatementKind::Insert => format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                join(&self.columns, ", "),
                vec!["?"; self.columns.len()].join(", ")
            ),
            StatementKind::Select => {
                format!("SELECT {} FROM {table}", join(&self.columns, ", "))
            }
            StatementKind::Update => {
                let set: Vec<String> = self.columns.iter().map(|c| format!("{c} = ?")).collect();
                format!("UPDATE {table} SET {}", set.join(", "))
            }
            StatementKind::Delete => format!("DELETE FROM {table}"),
        };

        if !self.conditions.is_empty() {
            let clauses: Vec<String> = self
                .conditions
                .iter()
                .map(|(c, _)| format!("{c} = ?"))
                .collect();
            cql.push_str(" WHERE ");
            cql.push_str(&clauses.join(" AND "));
        }
        if let Some(order) = self.order_by {
            cql.push_str(&format!(" ORDER BY {order}"));
        }
        if let Some(limit) = self.limit {
            cql.push_str(&format!(" LIMIT {limit}"));
        }
        cql
    }

    /// Bound parameters in placeholder order.
    pub fn bound_values(&self) -> Vec<&CqlValue> {
        self.values
            .iter()
            .chain(self.conditions.iter().map(|(_, v)| v))
            .collect()
    }
}

fn join(columns: &[Column], sep: &str) -> String {
    columns
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Connection to the wide-column cluster. Shared by every request task.
#[async_trait]
pub trait CqlSession: Send + Sync + 'static {
    /// Executes one statement. Writes return no rows.
    async fn execute(&self, statement: &Statement) -> AppResult<Vec<Row>>;
}
