use chrono::{DateTime, Utc};
use std::fmt;

use quiz_core::QuizSessionEngine;
use quiz_core::model::{Difficulty, SessionId, SessionRecord};
use storage::repository::RecordId;

use crate::error::SessionError;

/// One player's attempt: the engine plus who is playing what, and when.
pub struct ActiveSession {
    id: SessionId,
    player: String,
    topic: String,
    difficulty: Difficulty,
    engine: QuizSessionEngine,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    record_id: Option<RecordId>,
}

impl ActiveSession {
    pub(crate) fn new(
        player: impl Into<String>,
        topic: impl Into<String>,
        difficulty: Difficulty,
        engine: QuizSessionEngine,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            player: player.into(),
            topic: topic.into(),
            difficulty,
            engine,
            started_at,
            completed_at: None,
            record_id: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn player(&self) -> &str {
        &self.player
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Difficulty actually played, after adaptation.
    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn engine(&self) -> &QuizSessionEngine {
        &self.engine
    }

    pub(crate) fn engine_mut(&mut self) -> &mut QuizSessionEngine {
        &mut self.engine
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.engine.is_complete()
    }

    /// Storage id of the persisted record, once written.
    #[must_use]
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub(crate) fn mark_completed(&mut self, at: DateTime<Utc>) {
        if self.completed_at.is_none() {
            self.completed_at = Some(at.max(self.started_at));
        }
    }

    pub(crate) fn set_record_id(&mut self, id: RecordId) {
        self.record_id = Some(id);
    }

    /// Build the persistable record of a completed attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotComplete` before completion, or
    /// `SessionError::Record` if the record fails validation.
    pub fn build_record(&self) -> Result<SessionRecord, SessionError> {
        let completed_at = self.completed_at.ok_or(SessionError::NotComplete)?;
        let result = self
            .engine
            .result()
            .map_err(|_| SessionError::NotComplete)?;
        let record = SessionRecord::new(
            self.id,
            self.player.clone(),
            self.topic.clone(),
            self.difficulty,
            result,
            self.started_at,
            completed_at,
        )?;
        Ok(record)
    }
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("id", &self.id)
            .field("player", &self.player)
            .field("topic", &self.topic)
            .field("difficulty", &self.difficulty)
            .field("status", &self.engine.status())
            .field("score", &self.engine.score())
            .field("started_at", &self.started_at)
            .field("record_id", &self.record_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::ScoringPolicy;
    use quiz_core::model::{Question, QuestionId};
    use quiz_core::time::fixed_now;

    fn session() -> ActiveSession {
        let options = vec!["a".to_string(), "b".to_string()];
        let question = Question::new(QuestionId::new(1), "Q", options, 0, 100).unwrap();
        let engine = QuizSessionEngine::started(ScoringPolicy::default(), vec![question]).unwrap();
        ActiveSession::new("ada", "Science", Difficulty::Easy, engine, fixed_now())
    }

    #[test]
    fn record_requires_completion() {
        let session = session();
        assert!(matches!(
            session.build_record(),
            Err(SessionError::NotComplete)
        ));
    }

    #[test]
    fn record_carries_session_metadata() {
        let mut session = session();
        session.engine_mut().submit_answer(0).unwrap();
        session.engine_mut().advance().unwrap();
        session.mark_completed(fixed_now() + chrono::Duration::seconds(12));

        let record = session.build_record().unwrap();
        assert_eq!(record.session_id(), session.id());
        assert_eq!(record.player(), "ada");
        assert_eq!(record.duration_secs(), 12);
        assert_eq!(record.result().correct_count(), 1);
    }

    #[test]
    fn completion_time_is_set_once() {
        let mut session = session();
        let first = fixed_now() + chrono::Duration::seconds(5);
        session.mark_completed(first);
        session.mark_completed(first + chrono::Duration::seconds(5));
        assert_eq!(session.completed_at(), Some(first));
    }
}
