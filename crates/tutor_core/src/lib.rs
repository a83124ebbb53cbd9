//! crates/tutor_core/src/lib.rs
//!
//! The runtime-agnostic core of the adaptive tutor: domain types, the
//! mastery-band planner, the content coercion layer, the port traits and
//! the session orchestrator. Service adapters live in `services/api`.

pub mod content;
pub mod domain;
pub mod mastery;
pub mod planner;
pub mod ports;
pub mod session;

pub use domain::{
    ActionType, AiAction, ChatMessage, ChatRole, Difficulty, Goal, Question, QuizResult,
    StudentProfile,
};
pub use mastery::MasteryRecord;
pub use ports::{ContentProvider, PortError, PortResult, QuizResultSink, SessionStore};
pub use session::{ActionFillTicket, SessionOrchestrator, SessionView};
