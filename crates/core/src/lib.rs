#![forbid(unsafe_code)]

pub mod engine;
pub mod error;
pub mod model;
pub mod scoring;
pub mod time;

pub use engine::{
    Answer, AnswerOutcome, EngineError, EngineErrorKind, QuizSessionEngine, SessionProgress,
    SessionStatus, TickOutcome,
};
pub use error::Error;
pub use scoring::{ScoringPolicy, ScoringPolicyError};
pub use time::Clock;
