use thiserror::Error;

use crate::engine::EngineError;
use crate::model::{ParseDifficultyError, QuestionError, SessionRecordError};
use crate::scoring::ScoringPolicyError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Scoring(#[from] ScoringPolicyError),
    #[error(transparent)]
    Record(#[from] SessionRecordError),
    #[error(transparent)]
    Difficulty(#[from] ParseDifficultyError),
}
