//! Session lookup by id, shaped like a request/reply API.
//!
//! Replies never reveal the correct option of an open question; it is only
//! sent back once the question has been answered.

use std::collections::HashMap;

use serde::Serialize;

use quiz_core::model::{Difficulty, SessionId, SessionResult};
use quiz_core::{Answer, AnswerOutcome, QuizSessionEngine, TickOutcome};
use storage::repository::RecordId;

use super::active::ActiveSession;
use super::workflow::QuizSessionService;
use crate::error::SessionError;
use crate::supplier::QuizRequest;

/// What a player sees of the current question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub index: usize,
    pub total: usize,
    pub prompt: String,
    pub options: Vec<String>,
    pub points: u32,
    pub time_remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl QuestionView {
    fn current(engine: &QuizSessionEngine) -> Option<Self> {
        let question = engine.current_question()?;
        Some(Self {
            index: engine.current_index(),
            total: engine.questions().len(),
            prompt: question.prompt().to_string(),
            options: question.options().to_vec(),
            points: question.points(),
            time_remaining: engine.time_remaining(),
            difficulty: question.difficulty(),
            category: question.category().map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub player: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub score: u32,
    pub streak: u32,
    pub completed: bool,
    /// `None` once the session is complete.
    pub question: Option<QuestionView>,
}

impl SessionSnapshot {
    fn of(session: &ActiveSession) -> Self {
        let engine = session.engine();
        Self {
            session_id: session.id(),
            player: session.player().to_string(),
            topic: session.topic().to_string(),
            difficulty: session.difficulty(),
            score: engine.score(),
            streak: engine.streak(),
            completed: engine.is_complete(),
            question: QuestionView::current(engine),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReply {
    pub correct: bool,
    pub timed_out: bool,
    pub correct_index: usize,
    pub points_awarded: u32,
    pub score: u32,
    pub streak: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl AnswerReply {
    fn from_outcome(outcome: &AnswerOutcome, engine: &QuizSessionEngine) -> Self {
        let explanation = engine
            .questions()
            .get(outcome.question_index)
            .and_then(|q| q.explanation())
            .map(str::to_string);
        Self {
            correct: outcome.correct,
            timed_out: outcome.answer == Answer::TimedOut,
            correct_index: outcome.correct_index,
            points_awarded: outcome.points_awarded,
            score: outcome.score,
            streak: outcome.streak,
            explanation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReply {
    pub time_remaining: u32,
    /// Set when this tick expired the current question.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timed_out: Option<AnswerReply>,
    pub completed: bool,
}

/// Owns every live session of one process and routes calls by id.
pub struct SessionRegistry {
    service: QuizSessionService,
    sessions: HashMap<SessionId, ActiveSession>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(service: QuizSessionService) -> Self {
        Self {
            service,
            sessions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn service(&self) -> &QuizSessionService {
        &self.service
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Start a session and return its id with the first question.
    ///
    /// # Errors
    ///
    /// Propagates `QuizSessionService::start_session` failures.
    pub async fn create(
        &mut self,
        player: &str,
        request: QuizRequest,
    ) -> Result<SessionSnapshot, SessionError> {
        let session = self.service.start_session(player, request).await?;
        let snapshot = SessionSnapshot::of(&session);
        self.sessions.insert(session.id(), session);
        Ok(snapshot)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for an unknown id.
    pub fn snapshot(&self, id: SessionId) -> Result<SessionSnapshot, SessionError> {
        self.get(id).map(SessionSnapshot::of)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for an unknown id, or the engine's
    /// rejection (`INVALID_STATE`, `ALREADY_ANSWERED`, `INVALID_OPTION`).
    pub fn answer(&mut self, id: SessionId, option_index: usize) -> Result<AnswerReply, SessionError> {
        let session = self.sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        let outcome = self.service.answer(session, option_index)?;
        Ok(AnswerReply::from_outcome(&outcome, session.engine()))
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for an unknown id, `INVALID_STATE`
    /// outside a running session, or a storage error when a timeout ends
    /// the session and the record cannot be written.
    pub async fn tick(&mut self, id: SessionId) -> Result<TickReply, SessionError> {
        let session = self.sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        let outcome = self.service.tick(session).await?;
        let engine = session.engine();
        Ok(match outcome {
            TickOutcome::Running { time_remaining } => TickReply {
                time_remaining,
                timed_out: None,
                completed: false,
            },
            TickOutcome::TimedOut { outcome, completed } => TickReply {
                time_remaining: engine.time_remaining(),
                timed_out: Some(AnswerReply::from_outcome(&outcome, engine)),
                completed,
            },
        })
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for an unknown id, `INVALID_STATE` if
    /// the current question is unanswered, or a storage error on completion.
    pub async fn advance(&mut self, id: SessionId) -> Result<SessionSnapshot, SessionError> {
        let session = self.sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        self.service.advance(session).await?;
        Ok(SessionSnapshot::of(session))
    }

    /// Final result of a completed session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for an unknown id or `INVALID_STATE`
    /// while the session is still running.
    pub fn result(&self, id: SessionId) -> Result<SessionResult, SessionError> {
        Ok(self.get(id)?.engine().result()?)
    }

    /// Retry writing the record of a completed session.
    ///
    /// # Errors
    ///
    /// See `QuizSessionService::finalize_record`.
    pub async fn finalize(&mut self, id: SessionId) -> Result<RecordId, SessionError> {
        let session = self.sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        self.service.finalize_record(session).await
    }

    /// Drop a session, handing it back to the caller.
    pub fn remove(&mut self, id: SessionId) -> Option<ActiveSession> {
        self.sessions.remove(&id)
    }

    fn get(&self, id: SessionId) -> Result<&ActiveSession, SessionError> {
        self.sessions.get(&id).ok_or(SessionError::NotFound(id))
    }
}
