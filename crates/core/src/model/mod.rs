mod difficulty;
mod ids;
mod question;
mod session;

pub use difficulty::{Difficulty, ParseDifficultyError};
pub use ids::{ParseIdError, QuestionId, SessionId};
pub use question::{Question, QuestionError};
pub use session::{SessionRecord, SessionRecordError, SessionResult, accuracy_percent};
