use quiz_core::model::SessionRecord;

use super::SqliteRepository;
use super::mapping::{map_leaderboard_row, map_record, map_record_row};
use crate::repository::{LeaderboardRow, RecordId, RecordRow, ResultRepository, StorageError};

fn connection(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn append_record(&self, record: &SessionRecord) -> Result<RecordId, StorageError> {
        let result = record.result();
        let res = sqlx::query(
            r"
                INSERT INTO session_results (
                    session_id, player, topic, difficulty,
                    total_score, correct_count, total_questions, accuracy_percent, best_streak,
                    started_at, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(record.session_id().to_string())
        .bind(record.player())
        .bind(record.topic())
        .bind(record.difficulty().as_str())
        .bind(i64::from(result.total_score()))
        .bind(i64::from(result.correct_count()))
        .bind(i64::from(result.total_questions()))
        .bind(i64::from(result.accuracy_percent()))
        .bind(i64::from(result.best_streak()))
        .bind(record.started_at())
        .bind(record.completed_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::Conflict
            } else {
                connection(e)
            }
        })?;

        Ok(res.last_insert_rowid())
    }

    async fn get_record(&self, id: RecordId) -> Result<SessionRecord, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    session_id, player, topic, difficulty,
                    total_score, correct_count, total_questions, accuracy_percent, best_streak,
                    started_at, completed_at
                FROM session_results
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(connection)?
        .ok_or(StorageError::NotFound)?;

        map_record(&row)
    }

    async fn recent_records(
        &self,
        player: &str,
        limit: u32,
    ) -> Result<Vec<RecordRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, session_id, player, topic, difficulty,
                    total_score, correct_count, total_questions, accuracy_percent, best_streak,
                    started_at, completed_at
                FROM session_results
                WHERE player = ?1
                ORDER BY completed_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(player)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(connection)?;

        rows.iter().map(map_record_row).collect()
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    player,
                    SUM(total_score) AS total_score,
                    COUNT(*) AS sessions,
                    MAX(accuracy_percent) AS best_accuracy
                FROM session_results
                GROUP BY player
                ORDER BY total_score DESC, player ASC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(connection)?;

        rows.iter().map(map_leaderboard_row).collect()
    }
}
