mod active;
mod registry;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use active::ActiveSession;
pub use registry::{AnswerReply, QuestionView, SessionRegistry, SessionSnapshot, TickReply};
pub use workflow::QuizSessionService;
