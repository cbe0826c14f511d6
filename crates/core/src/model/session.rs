use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{Difficulty, SessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionRecordError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("a session result needs at least one question")]
    NoQuestions,

    #[error("correct count ({correct}) exceeds total questions ({total})")]
    CountMismatch { correct: u32, total: u32 },

    #[error("accuracy {stored}% does not match {correct}/{total}")]
    AccuracyMismatch { stored: u32, correct: u32, total: u32 },

    #[error("player name is empty")]
    EmptyPlayer,
}

/// Percentage of correct answers, rounded half-up in integer arithmetic.
#[must_use]
pub fn accuracy_percent(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct);
    let total = u64::from(total);
    let rounded = (correct * 200 + total) / (total * 2);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// Aggregate outcome of one finished quiz attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    total_score: u32,
    correct_count: u32,
    total_questions: u32,
    accuracy_percent: u32,
    best_streak: u32,
}

impl SessionResult {
    /// Build a result from raw counters, deriving the accuracy.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError::NoQuestions` for an empty session and
    /// `SessionRecordError::CountMismatch` if `correct_count > total_questions`.
    pub fn from_counts(
        total_score: u32,
        correct_count: u32,
        total_questions: u32,
        best_streak: u32,
    ) -> Result<Self, SessionRecordError> {
        if total_questions == 0 {
            return Err(SessionRecordError::NoQuestions);
        }
        if correct_count > total_questions || best_streak > correct_count {
            return Err(SessionRecordError::CountMismatch {
                correct: correct_count.max(best_streak),
                total: total_questions,
            });
        }
        Ok(Self {
            total_score,
            correct_count,
            total_questions,
            accuracy_percent: accuracy_percent(correct_count, total_questions),
            best_streak,
        })
    }

    // Engine-side constructor; the engine guarantees the counters are consistent.
    pub(crate) fn tally(
        total_score: u32,
        correct_count: u32,
        total_questions: u32,
        best_streak: u32,
    ) -> Self {
        Self {
            total_score,
            correct_count,
            total_questions,
            accuracy_percent: accuracy_percent(correct_count, total_questions),
            best_streak,
        }
    }

    /// Rehydrate a result from storage, checking the stored accuracy.
    ///
    /// # Errors
    ///
    /// Same as [`SessionResult::from_counts`], plus
    /// `SessionRecordError::AccuracyMismatch` when the stored percentage disagrees.
    pub fn from_persisted(
        total_score: u32,
        correct_count: u32,
        total_questions: u32,
        accuracy: u32,
        best_streak: u32,
    ) -> Result<Self, SessionRecordError> {
        let result = Self::from_counts(total_score, correct_count, total_questions, best_streak)?;
        if result.accuracy_percent != accuracy {
            return Err(SessionRecordError::AccuracyMismatch {
                stored: accuracy,
                correct: correct_count,
                total: total_questions,
            });
        }
        Ok(result)
    }

    #[must_use]
    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        self.accuracy_percent
    }

    #[must_use]
    pub fn best_streak(&self) -> u32 {
        self.best_streak
    }
}

/// A completed session as handed to the results consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    session_id: SessionId,
    player: String,
    topic: String,
    difficulty: Difficulty,
    result: SessionResult,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl SessionRecord {
    /// # Errors
    ///
    /// Returns `SessionRecordError::EmptyPlayer` for a blank player name and
    /// `SessionRecordError::InvalidTimeRange` if `completed_at` is before `started_at`.
    pub fn new(
        session_id: SessionId,
        player: impl Into<String>,
        topic: impl Into<String>,
        difficulty: Difficulty,
        result: SessionResult,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, SessionRecordError> {
        let player = player.into();
        if player.trim().is_empty() {
            return Err(SessionRecordError::EmptyPlayer);
        }
        if completed_at < started_at {
            return Err(SessionRecordError::InvalidTimeRange);
        }
        Ok(Self {
            session_id,
            player,
            topic: topic.into(),
            difficulty,
            result,
            started_at,
            completed_at,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn player(&self) -> &str {
        &self.player
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn result(&self) -> &SessionResult {
        &self.result
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Wall-clock seconds spent in the session.
    #[must_use]
    pub fn duration_secs(&self) -> i64 {
        (self.completed_at - self.started_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn accuracy_rounds_half_up() {
        assert_eq!(accuracy_percent(1, 3), 33);
        assert_eq!(accuracy_percent(2, 3), 67);
        assert_eq!(accuracy_percent(1, 8), 13);
        assert_eq!(accuracy_percent(1, 200), 1);
        assert_eq!(accuracy_percent(0, 5), 0);
        assert_eq!(accuracy_percent(5, 5), 100);
    }

    #[test]
    fn result_rejects_empty_session() {
        let err = SessionResult::from_counts(0, 0, 0, 0).unwrap_err();
        assert_eq!(err, SessionRecordError::NoQuestions);
    }

    #[test]
    fn result_rejects_more_correct_than_total() {
        let err = SessionResult::from_counts(100, 4, 3, 3).unwrap_err();
        assert!(matches!(err, SessionRecordError::CountMismatch { .. }));
    }

    #[test]
    fn persisted_result_checks_accuracy() {
        let ok = SessionResult::from_persisted(330, 2, 3, 67, 2).unwrap();
        assert_eq!(ok.accuracy_percent(), 67);

        let err = SessionResult::from_persisted(330, 2, 3, 66, 2).unwrap_err();
        assert!(matches!(err, SessionRecordError::AccuracyMismatch { stored: 66, .. }));
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = SessionResult::from_counts(110, 1, 1, 1).unwrap();
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["totalScore"], 110);
        assert_eq!(json["accuracyPercent"], 100);
        assert_eq!(json["bestStreak"], 1);
    }

    #[test]
    fn record_rejects_inverted_time_range() {
        let now = fixed_now();
        let result = SessionResult::from_counts(0, 0, 1, 0).unwrap();
        let err = SessionRecord::new(
            SessionId::generate(),
            "ada",
            "Science",
            Difficulty::Easy,
            result,
            now,
            now - Duration::seconds(1),
        )
        .unwrap_err();
        assert_eq!(err, SessionRecordError::InvalidTimeRange);
    }

    #[test]
    fn record_reports_duration() {
        let now = fixed_now();
        let result = SessionResult::from_counts(0, 0, 1, 0).unwrap();
        let record = SessionRecord::new(
            SessionId::generate(),
            "ada",
            "Science",
            Difficulty::Easy,
            result,
            now,
            now + Duration::seconds(42),
        )
        .unwrap();
        assert_eq!(record.duration_secs(), 42);
    }
}
