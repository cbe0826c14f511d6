//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::EngineError;
use quiz_core::model::{QuestionError, QuestionId, SessionId, SessionRecordError};
use storage::repository::StorageError;

/// Errors emitted by question suppliers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SupplyError {
    #[error("question supply unavailable: {0}")]
    Unavailable(String),
    #[error("question supply rejected the request with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("question supply returned an undecodable body: {0}")]
    Decode(String),
    #[error("question supply returned no questions")]
    Empty,
    #[error("question {index} from supply is invalid: {source}")]
    InvalidQuestion {
        index: usize,
        #[source]
        source: QuestionError,
    },
    #[error("question {index} from supply repeats id {id}")]
    DuplicateQuestion { index: usize, id: QuestionId },
    #[error("invalid quiz request: {0}")]
    InvalidRequest(&'static str),
}

impl SupplyError {
    /// Whether a fallback supplier should be tried.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SupplyError::Unavailable(_))
    }
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Supply(#[from] SupplyError),
    #[error(transparent)]
    Record(#[from] SessionRecordError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("session is not complete")]
    NotComplete,
}

impl SessionError {
    /// Stable machine-readable code for API replies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Engine(e) => e.code(),
            SessionError::Supply(SupplyError::InvalidRequest(_)) => "INVALID_INPUT",
            SessionError::Supply(e) if e.is_unavailable() => "SUPPLY_UNAVAILABLE",
            SessionError::Supply(_) => "SUPPLY_ERROR",
            SessionError::Record(_) | SessionError::Storage(_) => "STORAGE_ERROR",
            SessionError::NotFound(_) => "SESSION_NOT_FOUND",
            SessionError::NotComplete => "INVALID_STATE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn supply_failures_keep_distinct_codes() {
        let code = |e: SupplyError| SessionError::from(e).code();
        assert_eq!(code(SupplyError::Unavailable("timeout".into())), "SUPPLY_UNAVAILABLE");
        assert_eq!(code(SupplyError::InvalidRequest("topic is empty")), "INVALID_INPUT");
        assert_eq!(code(SupplyError::HttpStatus(StatusCode::BAD_REQUEST)), "SUPPLY_ERROR");
        assert_eq!(code(SupplyError::Decode("eof".into())), "SUPPLY_ERROR");
        assert_eq!(code(SupplyError::Empty), "SUPPLY_ERROR");
        let repeated = SupplyError::DuplicateQuestion {
            index: 1,
            id: QuestionId::new(4),
        };
        assert_eq!(code(repeated), "SUPPLY_ERROR");
    }

    #[test]
    fn engine_and_lookup_codes() {
        assert_eq!(
            SessionError::NotFound(SessionId::generate()).code(),
            "SESSION_NOT_FOUND"
        );
        assert_eq!(SessionError::NotComplete.code(), "INVALID_STATE");
        assert_eq!(
            SessionError::from(EngineError::AlreadyAnswered { index: 0 }).code(),
            "ALREADY_ANSWERED"
        );
    }
}
