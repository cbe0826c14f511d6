//! Runtime of a single quiz attempt.
//!
//! The engine is a synchronous state machine: `NotStarted -> InProgress -> Completed`.
//! Callers drive the countdown by calling [`QuizSessionEngine::tick`] once per second;
//! the engine never sleeps or reads a clock.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use log::debug;
use thiserror::Error;

use crate::model::{Question, QuestionId, SessionResult};
use crate::scoring::ScoringPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::NotStarted => "not started",
            SessionStatus::InProgress => "in progress",
            SessionStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Broad failure classes of engine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    InvalidInput,
    InvalidState,
    AlreadyAnswered,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
    #[error("a session needs at least one question")]
    NoQuestions,

    #[error("question id {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("option {index} is out of range for {len} options")]
    OptionOutOfRange { index: usize, len: usize },

    #[error("cannot {operation} while the session is {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    #[error("question {index} has not been answered yet")]
    Unanswered { index: usize },

    #[error("question {index} was already answered")]
    AlreadyAnswered { index: usize },
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> EngineErrorKind {
        match self {
            EngineError::NoQuestions
            | EngineError::DuplicateQuestion(_)
            | EngineError::OptionOutOfRange { .. } => EngineErrorKind::InvalidInput,
            EngineError::InvalidState { .. } | EngineError::Unanswered { .. } => {
                EngineErrorKind::InvalidState
            }
            EngineError::AlreadyAnswered { .. } => EngineErrorKind::AlreadyAnswered,
        }
    }

    /// Stable machine-readable code for API replies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NoQuestions | EngineError::DuplicateQuestion(_) => "INVALID_INPUT",
            EngineError::OptionOutOfRange { .. } => "INVALID_OPTION",
            EngineError::InvalidState { .. } | EngineError::Unanswered { .. } => "INVALID_STATE",
            EngineError::AlreadyAnswered { .. } => "ALREADY_ANSWERED",
        }
    }
}

/// What was recorded for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Selected(usize),
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AnswerRecord {
    answer: Answer,
    correct: bool,
    points: u32,
}

/// Outcome of answering (or timing out on) one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub question_index: usize,
    pub question_id: QuestionId,
    pub answer: Answer,
    pub correct: bool,
    pub correct_index: usize,
    pub points_awarded: u32,
    pub score: u32,
    pub streak: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The countdown moved; the current question is still open or already answered.
    Running { time_remaining: u32 },
    /// The countdown hit zero on an unanswered question, which was scored as
    /// incorrect and advanced past.
    TimedOut {
        outcome: AnswerOutcome,
        completed: bool,
    },
}

/// Aggregated view of session progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

pub struct QuizSessionEngine {
    policy: ScoringPolicy,
    status: SessionStatus,
    questions: Vec<Question>,
    current_index: usize,
    answers: BTreeMap<usize, AnswerRecord>,
    score: u32,
    streak: u32,
    best_streak: u32,
    time_remaining: u32,
    result: Option<SessionResult>,
}

impl QuizSessionEngine {
    #[must_use]
    pub fn new(policy: ScoringPolicy) -> Self {
        Self {
            policy,
            status: SessionStatus::NotStarted,
            questions: Vec::new(),
            current_index: 0,
            answers: BTreeMap::new(),
            score: 0,
            streak: 0,
            best_streak: 0,
            time_remaining: policy.time_budget_secs(),
            result: None,
        }
    }

    /// Build an engine and start it in one step.
    ///
    /// # Errors
    ///
    /// See [`QuizSessionEngine::start`].
    pub fn started(policy: ScoringPolicy, questions: Vec<Question>) -> Result<Self, EngineError> {
        let mut engine = Self::new(policy);
        engine.start(questions)?;
        Ok(engine)
    }

    /// Begin the session with a fixed question list.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidState` unless the session is `NotStarted`,
    /// `EngineError::NoQuestions` for an empty list and
    /// `EngineError::DuplicateQuestion` if two questions share an id.
    pub fn start(&mut self, questions: Vec<Question>) -> Result<(), EngineError> {
        self.require(SessionStatus::NotStarted, "start")?;
        if questions.is_empty() {
            return Err(EngineError::NoQuestions);
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(EngineError::DuplicateQuestion(question.id()));
            }
        }

        debug!(
            "quiz session started with {} questions, {}s per question",
            questions.len(),
            self.policy.time_budget_secs()
        );
        self.questions = questions;
        self.current_index = 0;
        self.answers.clear();
        self.score = 0;
        self.streak = 0;
        self.best_streak = 0;
        self.time_remaining = self.policy.time_budget_secs();
        self.result = None;
        self.status = SessionStatus::InProgress;
        Ok(())
    }

    /// Answer the current question. Does not advance.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidState` outside `InProgress`,
    /// `EngineError::AlreadyAnswered` if the current question already has an answer
    /// and `EngineError::OptionOutOfRange` for an index past the question's options.
    pub fn submit_answer(&mut self, option_index: usize) -> Result<AnswerOutcome, EngineError> {
        self.require(SessionStatus::InProgress, "submit an answer")?;
        let index = self.current_index;
        if self.answers.contains_key(&index) {
            return Err(EngineError::AlreadyAnswered { index });
        }
        let len = self.questions[index].options().len();
        if option_index >= len {
            return Err(EngineError::OptionOutOfRange {
                index: option_index,
                len,
            });
        }
        Ok(self.record(Answer::Selected(option_index)))
    }

    /// Count the current question's timer down by one second.
    ///
    /// Reaching zero on an unanswered question records a timeout and advances.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidState` outside `InProgress`.
    pub fn tick(&mut self) -> Result<TickOutcome, EngineError> {
        self.require(SessionStatus::InProgress, "tick")?;
        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining > 0 || self.answers.contains_key(&self.current_index) {
            return Ok(TickOutcome::Running {
                time_remaining: self.time_remaining,
            });
        }

        debug!("question {} timed out", self.current_index);
        let outcome = self.record(Answer::TimedOut);
        self.step();
        Ok(TickOutcome::TimedOut {
            outcome,
            completed: self.is_complete(),
        })
    }

    /// Move past the answered current question, completing the session after the last one.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidState` outside `InProgress` and
    /// `EngineError::Unanswered` if the current question has no answer yet.
    pub fn advance(&mut self) -> Result<SessionStatus, EngineError> {
        self.require(SessionStatus::InProgress, "advance")?;
        if !self.answers.contains_key(&self.current_index) {
            return Err(EngineError::Unanswered {
                index: self.current_index,
            });
        }
        self.step();
        Ok(self.status)
    }

    /// # Errors
    ///
    /// Returns `EngineError::InvalidState` until the session is `Completed`.
    pub fn result(&self) -> Result<SessionResult, EngineError> {
        self.result.ok_or(EngineError::InvalidState {
            operation: "read the result",
            status: self.status,
        })
    }

    /// Consume the engine and hand over its result.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidState` until the session is `Completed`.
    pub fn into_result(self) -> Result<SessionResult, EngineError> {
        self.result()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    #[must_use]
    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// `None` before start and after completion.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.status {
            SessionStatus::InProgress => self.questions.get(self.current_index),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_current_answered(&self) -> bool {
        self.answers.contains_key(&self.current_index)
    }

    #[must_use]
    pub fn answer_for(&self, index: usize) -> Option<Answer> {
        self.answers.get(&index).map(|r| r.answer)
    }

    /// Points awarded for the question at `index`, once it has an answer.
    #[must_use]
    pub fn points_for(&self, index: usize) -> Option<u32> {
        self.answers.get(&index).map(|r| r.points)
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[must_use]
    pub fn best_streak(&self) -> u32 {
        self.best_streak
    }

    #[must_use]
    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.questions.len();
        let answered = self.answers.len();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: self.is_complete(),
        }
    }

    fn require(&self, expected: SessionStatus, operation: &'static str) -> Result<(), EngineError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                operation,
                status: self.status,
            })
        }
    }

    // Callers have validated state and answer; only bookkeeping happens here.
    fn record(&mut self, answer: Answer) -> AnswerOutcome {
        let index = self.current_index;
        let question = &self.questions[index];
        let question_id = question.id();
        let correct_index = question.correct_index();
        let base_points = question.points();
        let correct = matches!(answer, Answer::Selected(i) if i == correct_index);

        let points = if correct {
            self.streak = self.streak.saturating_add(1);
            self.best_streak = self.best_streak.max(self.streak);
            let points = self
                .policy
                .award(base_points, self.time_remaining, self.streak);
            self.score = self.score.saturating_add(points);
            points
        } else {
            self.streak = 0;
            0
        };

        self.answers.insert(
            index,
            AnswerRecord {
                answer,
                correct,
                points,
            },
        );

        AnswerOutcome {
            question_index: index,
            question_id,
            answer,
            correct,
            correct_index,
            points_awarded: points,
            score: self.score,
            streak: self.streak,
        }
    }

    fn step(&mut self) {
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            self.time_remaining = self.policy.time_budget_secs();
            return;
        }

        self.current_index = self.questions.len();
        self.status = SessionStatus::Completed;
        let result = self.tally();
        debug!(
            "quiz session completed: score {}, {}/{} correct",
            result.total_score(),
            result.correct_count(),
            result.total_questions()
        );
        self.result = Some(result);
    }

    fn tally(&self) -> SessionResult {
        let correct = self.answers.values().filter(|r| r.correct).count();
        SessionResult::tally(
            self.score,
            u32::try_from(correct).unwrap_or(u32::MAX),
            u32::try_from(self.questions.len()).unwrap_or(u32::MAX),
            self.best_streak,
        )
    }
}

impl fmt::Debug for QuizSessionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSessionEngine")
            .field("status", &self.status)
            .field("questions_len", &self.questions.len())
            .field("current_index", &self.current_index)
            .field("answers_len", &self.answers.len())
            .field("score", &self.score)
            .field("streak", &self.streak)
            .field("time_remaining", &self.time_remaining)
            .finish_non_exhaustive()
    }
}
