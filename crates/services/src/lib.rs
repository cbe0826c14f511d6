#![forbid(unsafe_code)]

pub mod error;
pub mod leaderboard;
pub mod sessions;
pub mod supplier;

pub use quiz_core::Clock;

pub use error::{SessionError, SupplyError};
pub use leaderboard::{
    ActivityStreak, LeaderboardService, QuizPlanner, Recommendation, RecommendationKind,
};
pub use supplier::{
    FallbackSupplier, QuestionSupplier, QuizRequest, RemoteSupplier, RemoteSupplierConfig,
    StaticSupplier,
};

pub use sessions::{
    ActiveSession, AnswerReply, QuestionView, QuizSessionService, SessionRegistry,
    SessionSnapshot, TickReply,
};
