use std::sync::Arc;

use log::{info, warn};
use quiz_core::model::SessionRecordError;
use quiz_core::{AnswerOutcome, QuizSessionEngine, ScoringPolicy, SessionStatus, TickOutcome};
use storage::repository::{RecordId, ResultRepository};

use super::active::ActiveSession;
use crate::Clock;
use crate::error::SessionError;
use crate::leaderboard::QuizPlanner;
use crate::supplier::{QuestionSupplier, QuizRequest};

/// Orchestrates session start, engine calls and result persistence.
#[derive(Clone)]
pub struct QuizSessionService {
    clock: Clock,
    supplier: Arc<dyn QuestionSupplier>,
    results: Arc<dyn ResultRepository>,
    planner: QuizPlanner,
    adaptive: bool,
}

impl QuizSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        supplier: Arc<dyn QuestionSupplier>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        let planner = QuizPlanner::new(Arc::clone(&results));
        Self {
            clock,
            supplier,
            results,
            planner,
            adaptive: true,
        }
    }

    /// Toggle adjusting the requested difficulty from the player's history.
    #[must_use]
    pub fn with_adaptive_difficulty(mut self, adaptive: bool) -> Self {
        self.adaptive = adaptive;
        self
    }

    #[must_use]
    pub fn with_planner(mut self, planner: QuizPlanner) -> Self {
        self.planner = planner;
        self
    }

    /// Fetch questions and start a new attempt for `player`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Record` for a blank player, `SessionError::Supply`
    /// if no questions can be fetched, `SessionError::Engine` if the supplied
    /// list is unusable, or `SessionError::Storage` if history cannot be read.
    pub async fn start_session(
        &self,
        player: &str,
        request: QuizRequest,
    ) -> Result<ActiveSession, SessionError> {
        let player = player.trim();
        if player.is_empty() {
            return Err(SessionRecordError::EmptyPlayer.into());
        }

        let difficulty = if self.adaptive {
            self.planner
                .effective_difficulty(player, request.difficulty())
                .await?
        } else {
            request.difficulty()
        };
        let request = request.with_difficulty(difficulty);

        let questions = self.supplier.supply(&request).await?;
        let engine =
            QuizSessionEngine::started(ScoringPolicy::for_difficulty(difficulty), questions)?;
        let session = ActiveSession::new(
            player,
            request.topic(),
            difficulty,
            engine,
            self.clock.now(),
        );
        info!(
            "session {} started for {player}: {} {} questions on {:?}",
            session.id(),
            session.engine().questions().len(),
            difficulty,
            request.topic()
        );
        Ok(session)
    }

    /// Submit an answer for the current question. Never completes the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Engine` if the engine rejects the answer.
    pub fn answer(
        &self,
        session: &mut ActiveSession,
        option_index: usize,
    ) -> Result<AnswerOutcome, SessionError> {
        Ok(session.engine_mut().submit_answer(option_index)?)
    }

    /// One second of countdown; persists the record if a timeout ends the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Engine` outside `InProgress`, or
    /// `SessionError::Storage` if the final record cannot be written.
    pub async fn tick(&self, session: &mut ActiveSession) -> Result<TickOutcome, SessionError> {
        let outcome = session.engine_mut().tick()?;
        if matches!(outcome, TickOutcome::TimedOut { completed: true, .. }) {
            self.complete(session).await?;
        }
        Ok(outcome)
    }

    /// Move past an answered question; persists the record on completion.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Engine` if the current question is unanswered or
    /// the session is not running, or `SessionError::Storage` if the final
    /// record cannot be written.
    pub async fn advance(&self, session: &mut ActiveSession) -> Result<SessionStatus, SessionError> {
        let status = session.engine_mut().advance()?;
        if status == SessionStatus::Completed {
            self.complete(session).await?;
        }
        Ok(status)
    }

    /// Retry record persistence after a completed session.
    ///
    /// This is useful when the final append failed (e.g. transient storage error).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotComplete` if the session is still running.
    /// Returns `SessionError::Storage` if persistence fails.
    pub async fn finalize_record(
        &self,
        session: &mut ActiveSession,
    ) -> Result<RecordId, SessionError> {
        if let Some(id) = session.record_id() {
            return Ok(id);
        }
        if !session.is_complete() {
            return Err(SessionError::NotComplete);
        }
        session.mark_completed(self.clock.now());
        self.persist(session).await
    }

    async fn complete(&self, session: &mut ActiveSession) -> Result<(), SessionError> {
        session.mark_completed(self.clock.now());
        if session.record_id().is_none() {
            self.persist(session).await?;
        }
        Ok(())
    }

    async fn persist(&self, session: &mut ActiveSession) -> Result<RecordId, SessionError> {
        let record = session.build_record()?;
        match self.results.append_record(&record).await {
            Ok(id) => {
                session.set_record_id(id);
                info!(
                    "session {} finished: score {} ({}% accuracy), record {id}",
                    session.id(),
                    record.result().total_score(),
                    record.result().accuracy_percent()
                );
                Ok(id)
            }
            Err(err) => {
                warn!("failed to persist session {}: {err}", session.id());
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::model::{Difficulty, Question, QuestionId, SessionRecord};
    use quiz_core::time::fixed_clock;
    use std::sync::atomic::{AtomicBool, Ordering};
    use storage::repository::{
        InMemoryRepository, LeaderboardRow, RecordRow, StorageError,
    };

    use crate::error::SupplyError;

    struct TwoQuestions;

    #[async_trait]
    impl QuestionSupplier for TwoQuestions {
        async fn supply(&self, _request: &QuizRequest) -> Result<Vec<Question>, SupplyError> {
            (1..=2)
                .map(|id| {
                    let options = vec!["right".to_string(), "wrong".to_string()];
                    Question::new(QuestionId::new(id), format!("Q{id}"), options, 0, 100)
                        .map_err(|source| SupplyError::InvalidQuestion { index: 0, source })
                })
                .collect()
        }
    }

    /// Fails the first append, then delegates.
    struct Flaky {
        inner: InMemoryRepository,
        failed: AtomicBool,
    }

    #[async_trait]
    impl ResultRepository for Flaky {
        async fn append_record(&self, record: &SessionRecord) -> Result<RecordId, StorageError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(StorageError::Connection("disk full".into()));
            }
            self.inner.append_record(record).await
        }
        async fn get_record(&self, id: RecordId) -> Result<SessionRecord, StorageError> {
            self.inner.get_record(id).await
        }
        async fn recent_records(
            &self,
            player: &str,
            limit: u32,
        ) -> Result<Vec<RecordRow>, StorageError> {
            self.inner.recent_records(player, limit).await
        }
        async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, StorageError> {
            self.inner.leaderboard(limit).await
        }
    }

    fn service(results: Arc<dyn ResultRepository>) -> QuizSessionService {
        QuizSessionService::new(fixed_clock(), Arc::new(TwoQuestions), results)
    }

    fn request() -> QuizRequest {
        QuizRequest::new("Science", Difficulty::Hard, 2).unwrap()
    }

    #[tokio::test]
    async fn start_uses_difficulty_time_budget() {
        let svc = service(Arc::new(InMemoryRepository::new()));
        let session = svc.start_session("ada", request()).await.unwrap();
        assert_eq!(session.difficulty(), Difficulty::Hard);
        assert_eq!(
            session.engine().time_remaining(),
            Difficulty::Hard.time_per_question()
        );
        assert_eq!(session.engine().status(), SessionStatus::InProgress);
    }

    #[tokio::test]
    async fn blank_player_is_rejected() {
        let svc = service(Arc::new(InMemoryRepository::new()));
        let err = svc.start_session("  ", request()).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Record(SessionRecordError::EmptyPlayer)
        ));
    }

    #[tokio::test]
    async fn completion_persists_once() {
        let repo = InMemoryRepository::new();
        let svc = service(Arc::new(repo.clone()));
        let mut session = svc.start_session("ada", request()).await.unwrap();

        svc.answer(&mut session, 0).unwrap();
        assert_eq!(svc.advance(&mut session).await.unwrap(), SessionStatus::InProgress);
        assert!(session.record_id().is_none());
        svc.answer(&mut session, 1).unwrap();
        assert_eq!(svc.advance(&mut session).await.unwrap(), SessionStatus::Completed);

        let id = session.record_id().expect("record persisted");
        assert_eq!(svc.finalize_record(&mut session).await.unwrap(), id);
        let stored = repo.get_record(id).await.unwrap();
        assert_eq!(stored.result().correct_count(), 1);
        assert_eq!(stored.session_id(), session.id());
        assert_eq!(repo.recent_records("ada", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn timeout_on_last_question_persists() {
        let repo = InMemoryRepository::new();
        let svc = service(Arc::new(repo.clone()));
        let mut session = svc.start_session("ada", request()).await.unwrap();
        svc.answer(&mut session, 0).unwrap();
        svc.advance(&mut session).await.unwrap();

        let completed = loop {
            if let TickOutcome::TimedOut { completed, .. } = svc.tick(&mut session).await.unwrap() {
                break completed;
            }
        };
        assert!(completed);
        assert!(session.record_id().is_some());
    }

    #[tokio::test]
    async fn failed_append_can_be_retried() {
        let flaky = Arc::new(Flaky {
            inner: InMemoryRepository::new(),
            failed: AtomicBool::new(false),
        });
        let svc = service(flaky.clone()).with_adaptive_difficulty(false);
        let mut session = svc.start_session("ada", request()).await.unwrap();
        for _ in 0..2 {
            svc.answer(&mut session, 0).unwrap();
            if session.engine().current_index() == 1 {
                let err = svc.advance(&mut session).await.unwrap_err();
                assert_eq!(err.code(), "STORAGE_ERROR");
            } else {
                svc.advance(&mut session).await.unwrap();
            }
        }
        assert!(session.is_complete());
        assert!(session.record_id().is_none());

        let id = svc.finalize_record(&mut session).await.unwrap();
        assert_eq!(flaky.inner.get_record(id).await.unwrap().player(), "ada");
    }

    #[tokio::test]
    async fn finalize_before_completion_fails() {
        let svc = service(Arc::new(InMemoryRepository::new()));
        let mut session = svc.start_session("ada", request()).await.unwrap();
        assert!(matches!(
            svc.finalize_record(&mut session).await,
            Err(SessionError::NotComplete)
        ));
    }
}
