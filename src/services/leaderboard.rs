// src/services/leaderboard.rs

use std::collections::BTreeMap;
use std::time::Duration;

use uuid::Uuid;

use crate::config::CacheConfig;
use crate::error::AppResult;
use crate::models::progress::LeaderboardEntry;
use crate::stores::CacheClient;
use crate::wide_column::{Column, CqlValue, OrderBy, Row, Table, WideColumnRepository};

pub const DEFAULT_LIMIT: usize = 10;

/// Cache-aside reader over the score-ordered progress view.
///
/// The cache is advisory: an unreachable cache degrades to a store read and
/// never fails the call.
#[derive(Clone)]
pub struct LeaderboardReader {
    repo: WideColumnRepository,
    cache: CacheClient,
    ttl: Duration,
}

impl LeaderboardReader {
    pub fn new(repo: WideColumnRepository, cache: CacheClient, config: &CacheConfig) -> Self {
        Self {
            repo,
            cache,
            ttl: config.leaderboard_ttl,
        }
    }

    /// Highest scores for the quiz, best first. A non-positive `limit` means
    /// `DEFAULT_LIMIT`.
    pub async fn top_scores(&self, quiz_uuid: Uuid, limit: i64) -> AppResult<Vec<LeaderboardEntry>> {
        let limit = usize::try_from(limit)
            .ok()
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT);
        let key = format!("top_scores:{quiz_uuid}:{limit}");

        match self.cache.get_json::<Vec<LeaderboardEntry>>(&key).await {
            Ok(Some(entries)) if !entries.is_empty() => {
                tracing::debug!(%key, "Leaderboard cache hit");
                return Ok(entries);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(%key, error = %e, "Leaderboard cache read failed"),
        }

        let rows = self
            .repo
            .select(
                Table::UserQuizzesByScore,
                &[Column::UserUuid, Column::QuizUuid, Column::FullName, Column::Score],
                BTreeMap::from([(Column::QuizUuid, CqlValue::from(quiz_uuid))]),
                Some(OrderBy::desc(Column::Score)),
                Some(limit),
            )
            .await?;

        let entries = rows
            .iter()
            .map(entry_from_row)
            .collect::<AppResult<Vec<_>>>()?;

        if let Err(e) = self.cache.set_json(&key, &entries, self.ttl).await {
            tracing::warn!(%key, error = %e, "Failed to cache leaderboard");
        }

        Ok(entries)
    }
}

fn entry_from_row(row: &Row) -> AppResult<LeaderboardEntry> {
    Ok(LeaderboardEntry {
        user_uuid: row.uuid(Column::UserUuid)?,
        quiz_uuid: row.uuid(Column::QuizUuid)?,
        full_name: row.text(Column::FullName)?,
        score: row.int(Column::Score)?,
    })
}
