use async_trait::async_trait;
use quiz_core::model::SessionRecord;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage identifier of a persisted session record (`SQLite` row id).
pub type RecordId = i64;

/// A persisted record together with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRow {
    pub id: RecordId,
    pub record: SessionRecord,
}

/// Per-player aggregate across all persisted sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub player: String,
    pub total_score: u64,
    pub sessions: u32,
    pub best_accuracy: u32,
}

/// Results consumer: the sink for completed quiz sessions.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Persist a completed session and return its storage id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a record with the same session id exists,
    /// or other storage errors.
    async fn append_record(&self, record: &SessionRecord) -> Result<RecordId, StorageError>;

    /// Fetch a record by storage id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_record(&self, id: RecordId) -> Result<SessionRecord, StorageError>;

    /// Most recent records for a player, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the records cannot be loaded.
    async fn recent_records(
        &self,
        player: &str,
        limit: u32,
    ) -> Result<Vec<RecordRow>, StorageError>;

    /// Players ranked by total score, ties broken by name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the aggregate cannot be computed.
    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<BTreeMap<RecordId, SessionRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn limit_usize(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn append_record(&self, record: &SessionRecord) -> Result<RecordId, StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard
            .values()
            .any(|existing| existing.session_id() == record.session_id())
        {
            return Err(StorageError::Conflict);
        }
        let id = guard.keys().next_back().map_or(1, |last| last + 1);
        guard.insert(id, record.clone());
        Ok(id)
    }

    async fn get_record(&self, id: RecordId) -> Result<SessionRecord, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn recent_records(
        &self,
        player: &str,
        limit: u32,
    ) -> Result<Vec<RecordRow>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<RecordRow> = guard
            .iter()
            .filter(|(_, record)| record.player() == player)
            .map(|(id, record)| RecordRow {
                id: *id,
                record: record.clone(),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.record
                .completed_at()
                .cmp(&a.record.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(limit_usize(limit));
        Ok(rows)
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut by_player: BTreeMap<&str, LeaderboardRow> = BTreeMap::new();
        for record in guard.values() {
            let result = record.result();
            let row = by_player
                .entry(record.player())
                .or_insert_with(|| LeaderboardRow {
                    player: record.player().to_string(),
                    total_score: 0,
                    sessions: 0,
                    best_accuracy: 0,
                });
            row.total_score += u64::from(result.total_score());
            row.sessions = row.sessions.saturating_add(1);
            row.best_accuracy = row.best_accuracy.max(result.accuracy_percent());
        }

        let mut rows: Vec<LeaderboardRow> = by_player.into_values().collect();
        rows.sort_by(|a, b| {
            b.total_score
                .cmp(&a.total_score)
                .then_with(|| a.player.cmp(&b.player))
        });
        rows.truncate(limit_usize(limit));
        Ok(rows)
    }
}

/// Bundle of repositories handed to services.
#[derive(Clone)]
pub struct Storage {
    pub results: Arc<dyn ResultRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let results: Arc<dyn ResultRepository> = Arc::new(InMemoryRepository::new());
        Self { results }
    }
}
