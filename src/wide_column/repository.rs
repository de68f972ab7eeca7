// src/wide_column/repository.rs

use std::sync::Arc;

use super::schema::{Column, OrderBy, Table};
use super::session::{Consistency, CqlSession, Statement, StatementKind};
use super::value::{ColumnValues, CqlValue, Row};
use crate::error::{AppError, AppResult};

/// Generic insert/select/update/delete over the fixed schema.
///
/// Every statement runs at quorum consistency and is logged with its bound
/// values before execution.
#[derive(Clone)]
pub struct WideColumnRepository {
    session: Arc<dyn CqlSession>,
    consistency: Consistency,
}

impl WideColumnRepository {
    pub fn new(session: Arc<dyn CqlSession>) -> Self {
        Self {
            session,
            consistency: Consistency::Quorum,
        }
    }

    /// Inserts one row. Fails with `NoData` when `data` is empty.
    pub async fn insert(&self, table: Table, data: ColumnValues) -> AppResult<()> {
        if data.is_empty() {
            return Err(AppError::NoData);
        }
        ensure_writable(table)?;
        ensure_columns(table, data.keys())?;

        let (columns, values): (Vec<Column>, Vec<CqlValue>) = data.into_iter().unzip();
        let statement = self.statement(StatementKind::Insert, table, columns, values, Vec::new());
        self.run(statement, "insert record").await.map(|_| ())
    }

    /// Selects `columns` (all table columns when empty) from rows matching
    /// every condition.
    pub async fn select(
        &self,
        table: Table,
        columns: &[Column],
        conditions: ColumnValues,
        order_by: Option<OrderBy>,
        limit: Option<usize>,
    ) -> AppResult<Vec<Row>> {
        ensure_columns(table, columns.iter())?;
        ensure_columns(table, conditions.keys())?;
        if let Some(order) = order_by {
            ensure_columns(table, std::iter::once(&order.column))?;
        }

        let mut statement = self.statement(
            StatementKind::Select,
            table,
            columns.to_vec(),
            Vec::new(),
            conditions.into_iter().collect(),
        );
        statement.order_by = order_by;
        statement.limit = limit.filter(|l| *l > 0);
        self.run(statement, "retrieve records").await
    }

    /// Updates matching rows. Fails with `NoUpdates` when `updates` is empty.
    pub async fn update(
        &self,
        table: Table,
        updates: ColumnValues,
        conditions: ColumnValues,
    ) -> AppResult<()> {
        if updates.is_empty() {
            return Err(AppError::NoUpdates);
        }
        ensure_writable(table)?;
        ensure_columns(table, updates.keys())?;
        ensure_columns(table, conditions.keys())?;

        let (columns, values): (Vec<Column>, Vec<CqlValue>) = updates.into_iter().unzip();
        let statement = self.statement(
            StatementKind::Update,
            table,
            columns,
            values,
            conditions.into_iter().collect(),
        );
        self.run(statement, "update record").await.map(|_| ())
    }

    /// Deletes matching rows. Refuses an empty condition set so a call can
    /// never wipe a whole table.
    pub async fn delete(&self, table: Table, conditions: ColumnValues) -> AppResult<()> {
        if conditions.is_empty() {
            return Err(AppError::NoConditions);
        }
        ensure_writable(table)?;
        ensure_columns(table, conditions.keys())?;

        let statement = self.statement(
            StatementKind::Delete,
            table,
            Vec::new(),
            Vec::new(),
            conditions.into_iter().collect(),
        );
        self.run(statement, "delete records").await.map(|_| ())
    }

    fn statement(
        &self,
        kind: StatementKind,
        table: Table,
        columns: Vec<Column>,
        values: Vec<CqlValue>,
        conditions: Vec<(Column, CqlValue)>,
    ) -> Statement {
        Statement {
            kind,
            table,
            columns,
            values,
            conditions,
            order_by: None,
            limit: None,
            consistency: self.consistency,
        }
    }

    async fn run(&self, statement: Statement, operation: &str) -> AppResult<Vec<Row>> {
        let bound: Vec<String> = statement
            .bound_values()
            .iter()
            .map(ToString::to_string)
            .collect();
        tracing::debug!(
            consistency = ?statement.consistency,
            values = ?bound,
            "Executing query: {}",
            statement.cql()
        );

        self.session
            .execute(&statement)
            .await
            .map_err(|e| e.context(&format!("failed to {operation} in {}", statement.table)))
    }
}

fn ensure_writable(table: Table) -> AppResult<()> {
    if table.is_view() {
        return Err(AppError::Validation(format!(
            "{table} is a materialized view and is read-only"
        )));
    }
    Ok(())
}

fn ensure_columns<'a>(table: Table, mut columns: impl Iterator<Item = &'a Column>) -> AppResult<()> {
    match columns.find(|c| !table.has_column(**c)) {
        Some(col) => Err(AppError::Validation(format!(
            "column {col} does not belong to {table}"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wide_column::MemoryCluster;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn repo() -> (Arc<MemoryCluster>, WideColumnRepository) {
        let cluster = Arc::new(MemoryCluster::recording());
        (cluster.clone(), WideColumnRepository::new(cluster))
    }

    #[tokio::test]
    async fn guards_reject_empty_sets() {
        let (cluster, repo) = repo();
        assert!(matches!(
            repo.insert(Table::Quizzes, BTreeMap::new()).await,
            Err(AppError::NoData)
        ));
        assert!(matches!(
            repo.update(Table::Quizzes, BTreeMap::new(), BTreeMap::new()).await,
            Err(AppError::NoUpdates)
        ));
        assert!(matches!(
            repo.delete(Table::Questions, BTreeMap::new()).await,
            Err(AppError::NoConditions)
        ));
        assert!(cluster.executed().is_empty());
    }

    #[tokio::test]
    async fn rejects_foreign_columns_and_view_writes() {
        let (cluster, repo) = repo();
        let quiz = Uuid::new_v4();

        let bad = BTreeMap::from([
            (Column::QuizUuid, CqlValue::from(quiz)),
            (Column::AnswerHash, CqlValue::from("x")),
        ]);
        assert!(matches!(
            repo.insert(Table::Quizzes, bad).await,
            Err(AppError::Validation(_))
        ));

        let row = BTreeMap::from([(Column::QuizUuid, CqlValue::from(quiz))]);
        assert!(matches!(
            repo.delete(Table::UserQuizzesByScore, row).await,
            Err(AppError::Validation(_))
        ));
        assert!(cluster.executed().is_empty());
    }

    #[tokio::test]
    async fn insert_update_select_delete() {
        let (_cluster, repo) = repo();
        let quiz = Uuid::new_v4();
        let head = Uuid::new_v4();
        let key = || BTreeMap::from([(Column::QuizUuid, CqlValue::from(quiz))]);

        repo.insert(
            Table::Quizzes,
            BTreeMap::from([
                (Column::QuizUuid, CqlValue::from(quiz)),
                (Column::QuestionUuid, CqlValue::from(head)),
                (Column::TotalTime, CqlValue::Int(30)),
            ]),
        )
        .await
        .unwrap();

        repo.update(
            Table::Quizzes,
            BTreeMap::from([(Column::TotalTime, CqlValue::Int(45))]),
            key(),
        )
        .await
        .unwrap();

        let rows = repo
            .select(Table::Quizzes, &[Column::QuestionUuid, Column::TotalTime], key(), None, Some(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].uuid(Column::QuestionUuid).unwrap(), head);
        assert_eq!(rows[0].int(Column::TotalTime).unwrap(), 45);

        repo.delete(Table::Quizzes, key()).await.unwrap();
        let rows = repo.select(Table::Quizzes, &[], key(), None, None).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_transient_with_context() {
        let (cluster, repo) = repo();
        cluster.fail_on(Table::Questions, StatementKind::Delete);
        let err = repo
            .delete(
                Table::Questions,
                BTreeMap::from([(Column::QuizUuid, CqlValue::from(Uuid::new_v4()))]),
            )
            .await
            .unwrap_err();
        match err {
            AppError::TransientStore(msg) => assert!(msg.contains("questions")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
