// src/wide_column/memory.rs

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::schema::{Column, Direction, OrderBy, Table};
use super::session::{CqlSession, Statement, StatementKind};
use super::value::{ColumnValues, CqlValue, Row};
use crate::error::{AppError, AppResult};

type PrimaryKey = Vec<CqlValue>;

#[derive(Debug, Default)]
struct ClusterState {
    tables: HashMap<Table, BTreeMap<PrimaryKey, ColumnValues>>,
    executed: Vec<Statement>,
    failures: HashSet<(Table, StatementKind)>,
}

#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: Mutex<ClusterState>,
    record: bool,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cluster that keeps every executed statement for inspection.
    pub fn recording() -> Self {
        Self {
            record: true,
            ..Self::default()
        }
    }

    /// Makes every statement of `kind` against `table` fail as unavailable.
    pub fn fail_on(&self, table: Table, kind: StatementKind) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.insert((table, kind));
        }
    }

    /// Statements executed so far, including failed ones. Always empty unless
    /// built with `recording()`.
    pub fn executed(&self) -> Vec<Statement> {
        self.state
            .lock()
            .map(|s| s.executed.clone())
            .unwrap_or_default()
    }

    /// Number of executed statements that read from `table`.
    pub fn select_count(&self, table: Table) -> usize {
        self.executed()
            .iter()
            .filter(|s| s.kind == StatementKind::Select && s.table == table)
            .count()
    }

    /// Raw row count of a base table.
    pub fn row_count(&self, table: Table) -> usize {
        self.state
            .lock()
            .map(|s| s.tables.get(&table).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl CqlSession for MemoryCluster {
    async fn execute(&self, statement: &Statement) -> AppResult<Vec<Row>> {
        let mut state = self.state.lock().map_err(|_| AppError::Internal("lock poisoned".into()))?;
        if self.record {
            state.executed.push(statement.clone());
        }

        if state.failures.contains(&(statement.table, statement.kind)) {
            return Err(AppError::TransientStore(format!(
                "{} on {} unavailable",
                kind_name(statement.kind),
                statement.table
            )));
        }

        match statement.kind {
            StatementKind::Insert => {
                insert(&mut state, statement)?;
                Ok(Vec::new())
            }
            StatementKind::Update => {
                update(&mut state, statement)?;
                Ok(Vec::new())
            }
            StatementKind::Delete => {
                delete(&mut state, statement)?;
                Ok(Vec::new())
            }
            StatementKind::Select => select(&state, statement),
        }
    }
}

fn kind_name(kind: StatementKind) -> &'static str {
    match kind {
        StatementKind::Insert => "insert",
        StatementKind::Select => "select",
        StatementKind::Update => "update",
        StatementKind::Delete => "delete",
    }
}

fn reject_view(table: Table) -> AppResult<()> {
    if table.is_view() {
        return Err(AppError::Validation(format!(
            "cannot write to materialized view {table}"
        )));
    }
    Ok(())
}

fn primary_key(table: Table, row: &ColumnValues) -> AppResult<PrimaryKey> {
    table
        .primary_key()
        .iter()
        .map(|col| match row.get(col) {
            Some(CqlValue::Null) | None => Err(AppError::Validation(format!(
                "missing primary key column {col} for {table}"
            ))),
            Some(v) => Ok(v.clone()),
        })
        .collect()
}

fn insert(state: &mut ClusterState, stmt: &Statement) -> AppResult<()> {
    reject_view(stmt.table)?;
    let row: ColumnValues = stmt
        .columns
        .iter()
        .copied()
        .zip(stmt.values.iter().cloned())
        .collect();
    let key = primary_key(stmt.table, &row)?;
    let rows = state.tables.entry(stmt.table).or_default();
    rows.entry(key).or_default().extend(row);
    Ok(())
}

fn update(state: &mut ClusterState, stmt: &Statement) -> AppResult<()> {
    reject_view(stmt.table)?;
    let pk = stmt.table.primary_key();
    if let Some(col) = stmt.columns.iter().find(|c| pk.contains(c)) {
        return Err(AppError::Validation(format!(
            "cannot update primary key column {col}"
        )));
    }
    let conditions: ColumnValues = stmt.conditions.iter().cloned().collect();
    let key = primary_key(stmt.table, &conditions)?;
    let rows = state.tables.entry(stmt.table).or_default();
    let row = rows.entry(key).or_insert(conditions);
    for (col, value) in stmt.columns.iter().zip(stmt.values.iter()) {
        row.insert(*col, value.clone());
    }
    Ok(())
}

fn delete(state: &mut ClusterState, stmt: &Statement) -> AppResult<()> {
    reject_view(stmt.table)?;
    require_partition_key(stmt)?;
    if let Some(rows) = state.tables.get_mut(&stmt.table) {
        rows.retain(|_, row| !matches_all(row, &stmt.conditions));
    }
    Ok(())
}

fn select(state: &ClusterState, stmt: &Statement) -> AppResult<Vec<Row>> {
    require_partition_key(stmt)?;
    let source = stmt.table.base().unwrap_or(stmt.table);
    let view_key = stmt.table.primary_key();

    let mut rows: Vec<&ColumnValues> = state
        .tables
        .get(&source)
        .map(|rows| {
            rows.values()
                .filter(|row| {
                    view_key
                        .iter()
                        .all(|c| !matches!(row.get(c), None | Some(CqlValue::Null)))
                })
                .filter(|row| matches_all(row, &stmt.conditions))
                .collect()
        })
        .unwrap_or_default();

    let ordering: Vec<OrderBy> = match stmt.order_by {
        Some(order) => {
            if !stmt.table.clustering().iter().any(|c| c.column == order.column) {
                return Err(AppError::Validation(format!(
                    "{} is not a clustering column of {}",
                    order.column, stmt.table
                )));
            }
            // The requested column leads; the rest of the clustering order
            // still breaks ties.
            std::iter::once(order)
                .chain(
                    stmt.table
                        .clustering()
                        .iter()
                        .copied()
                        .filter(|c| c.column != order.column),
                )
                .collect()
        }
        None => stmt.table.clustering().to_vec(),
    };
    rows.sort_by(|a, b| compare(a, b, &ordering));

    if let Some(limit) = stmt.limit {
        rows.truncate(limit);
    }

    let projection: &[Column] = if stmt.columns.is_empty() {
        stmt.table.columns()
    } else {
        &stmt.columns
    };

    Ok(rows
        .into_iter()
        .map(|row| {
            Row(projection
                .iter()
                .map(|c| (*c, row.get(c).cloned().unwrap_or(CqlValue::Null)))
                .collect())
        })
        .collect())
}

fn require_partition_key(stmt: &Statement) -> AppResult<()> {
    let partition = stmt.table.primary_key()[0];
    if !stmt.conditions.iter().any(|(c, _)| *c == partition) {
        return Err(AppError::Validation(format!(
            "{} on {} must restrict partition key {partition}",
            kind_name(stmt.kind),
            stmt.table
        )));
    }
    if let Some((col, _)) = stmt
        .conditions
        .iter()
        .find(|(c, _)| !stmt.table.primary_key().contains(c))
    {
        return Err(AppError::Validation(format!(
            "{col} is not part of the primary key of {}",
            stmt.table
        )));
    }
    Ok(())
}

fn matches_all(row: &ColumnValues, conditions: &[(Column, CqlValue)]) -> bool {
    conditions
        .iter()
        .all(|(col, value)| row.get(col).unwrap_or(&CqlValue::Null) == value)
}

fn compare(a: &ColumnValues, b: &ColumnValues, ordering: &[OrderBy]) -> Ordering {
    for order in ordering {
        let left = a.get(&order.column).unwrap_or(&CqlValue::Null);
        let right = b.get(&order.column).unwrap_or(&CqlValue::Null);
        let cmp = match order.direction {
            Direction::Asc => left.cmp(right),
            Direction::Desc => right.cmp(left),
        };
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}
