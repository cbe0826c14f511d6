//! Question supply: where a session's questions come from before it starts.

use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use quiz_core::model::{Difficulty, Question};

use crate::error::SupplyError;

mod fixtures;
mod remote;

pub use fixtures::StaticSupplier;
pub use remote::{RemoteSupplier, RemoteSupplierConfig};

/// What a caller asks a supplier for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    topic: String,
    difficulty: Difficulty,
    count: usize,
}

impl QuizRequest {
    /// # Errors
    ///
    /// Returns `SupplyError::InvalidRequest` for a blank topic or a zero count.
    pub fn new(
        topic: impl Into<String>,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Self, SupplyError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(SupplyError::InvalidRequest("topic is empty"));
        }
        if count == 0 {
            return Err(SupplyError::InvalidRequest("count must be at least one"));
        }
        Ok(Self {
            topic,
            difficulty,
            count,
        })
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
    pub fn count(&self) -> usize {
        self.count
    }

    /// Same request at another difficulty.
    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }
}

/// Provides the immutable question list for a session.
#[async_trait]
pub trait QuestionSupplier: Send + Sync {
    /// # Errors
    ///
    /// Returns `SupplyError` when no valid question list can be produced.
    async fn supply(&self, request: &QuizRequest) -> Result<Vec<Question>, SupplyError>;
}

#[async_trait]
impl<T> QuestionSupplier for Arc<T>
where
    T: QuestionSupplier + ?Sized,
{
    async fn supply(&self, request: &QuizRequest) -> Result<Vec<Question>, SupplyError> {
        self.as_ref().supply(request).await
    }
}

/// Tries `primary` and falls back to `secondary` when the primary is unavailable.
///
/// Other errors (bad requests, malformed questions) are returned as-is.
pub struct FallbackSupplier<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> FallbackSupplier<P, S> {
    #[must_use]
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl<P, S> QuestionSupplier for FallbackSupplier<P, S>
where
    P: QuestionSupplier,
    S: QuestionSupplier,
{
    async fn supply(&self, request: &QuizRequest) -> Result<Vec<Question>, SupplyError> {
        match self.primary.supply(request).await {
            Err(err) if err.is_unavailable() => {
                warn!("primary question supply failed ({err}); using fallback");
                self.secondary.supply(request).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuestionId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing {
        calls: AtomicUsize,
        make: fn() -> SupplyError,
    }

    #[async_trait]
    impl QuestionSupplier for Failing {
        async fn supply(&self, _request: &QuizRequest) -> Result<Vec<Question>, SupplyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.make)())
        }
    }

    struct Fixed;

    #[async_trait]
    impl QuestionSupplier for Fixed {
        async fn supply(&self, _request: &QuizRequest) -> Result<Vec<Question>, SupplyError> {
            let options = vec!["yes".to_string(), "no".to_string()];
            Ok(vec![
                Question::new(QuestionId::new(1), "Fixed?", options, 0, 10).unwrap(),
            ])
        }
    }

    fn request() -> QuizRequest {
        QuizRequest::new("Science", Difficulty::Easy, 1).unwrap()
    }

    #[test]
    fn request_validates_topic_and_count() {
        assert!(QuizRequest::new("  ", Difficulty::Easy, 1).is_err());
        assert!(QuizRequest::new("Science", Difficulty::Easy, 0).is_err());
    }

    #[tokio::test]
    async fn fallback_used_when_primary_unavailable() {
        let supplier = FallbackSupplier::new(
            Failing {
                calls: AtomicUsize::new(0),
                make: || SupplyError::Unavailable("connection refused".into()),
            },
            Fixed,
        );
        let questions = supplier.supply(&request()).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(supplier.primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fallback_not_used_for_other_errors() {
        let supplier = FallbackSupplier::new(
            Failing {
                calls: AtomicUsize::new(0),
                make: || SupplyError::Empty,
            },
            Fixed,
        );
        let err = supplier.supply(&request()).await.unwrap_err();
        assert!(matches!(err, SupplyError::Empty));
    }
}
