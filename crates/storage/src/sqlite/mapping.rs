use chrono::{DateTime, Utc};
use quiz_core::model::{Difficulty, SessionId, SessionRecord, SessionResult};
use sqlx::Row;

use crate::repository::{LeaderboardRow, RecordRow, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn get_u32(row: &sqlx::sqlite::SqliteRow, field: &'static str) -> Result<u32, StorageError> {
    u32_from_i64(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

pub(crate) fn map_record(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, StorageError> {
    let session_id: SessionId = row
        .try_get::<String, _>("session_id")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let player: String = row.try_get("player").map_err(ser)?;
    let topic: String = row.try_get("topic").map_err(ser)?;
    let difficulty: Difficulty = row
        .try_get::<String, _>("difficulty")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let started_at: DateTime<Utc> = row.try_get("started_at").map_err(ser)?;
    let completed_at: DateTime<Utc> = row.try_get("completed_at").map_err(ser)?;

    let result = SessionResult::from_persisted(
        get_u32(row, "total_score")?,
        get_u32(row, "correct_count")?,
        get_u32(row, "total_questions")?,
        get_u32(row, "accuracy_percent")?,
        get_u32(row, "best_streak")?,
    )
    .map_err(ser)?;

    SessionRecord::new(
        session_id,
        player,
        topic,
        difficulty,
        result,
        started_at,
        completed_at,
    )
    .map_err(ser)
}

pub(crate) fn map_record_row(row: &sqlx::sqlite::SqliteRow) -> Result<RecordRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    Ok(RecordRow {
        id,
        record: map_record(row)?,
    })
}

pub(crate) fn map_leaderboard_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<LeaderboardRow, StorageError> {
    Ok(LeaderboardRow {
        player: row.try_get("player").map_err(ser)?,
        total_score: u64_from_i64("total_score", row.try_get("total_score").map_err(ser)?)?,
        sessions: get_u32(row, "sessions")?,
        best_accuracy: get_u32(row, "best_accuracy")?,
    })
}
