//! crates/tutor_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the tutoring core.
//! These traits form the boundary of the hexagonal architecture: the
//! orchestrator only ever talks to the content provider, the session
//! store and the telemetry sink through them.

use async_trait::async_trait;

use crate::content::ActionContent;
use crate::domain::{
    ActionType, ChatMessage, Difficulty, Question, QuizResult, StudentProfile,
};
use crate::mastery::MasteryRecord;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services
/// (generation backend, key-value store, telemetry transport).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Content generation failed: {0}")]
    Provider(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The external content-generation collaborator.
///
/// Every request carries a natural-language instruction plus a strict
/// output schema; the adapter behind this trait is responsible for coercing
/// whatever comes back into the typed shapes (see the `content` module).
/// The quiz path never errors by contract: the adapter's own failure path
/// yields the designated single-item fallback quiz instead.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Generates exactly 5 mixed-difficulty diagnostic questions scoped to
    /// the profile's subject and class level.
    async fn generate_diagnostic(&self, profile: &StudentProfile) -> PortResult<Vec<Question>>;

    /// Generates 5 quiz questions for `topic` at the given difficulty.
    async fn generate_quiz(
        &self,
        profile: &StudentProfile,
        topic: &str,
        difficulty: Difficulty,
    ) -> PortResult<Vec<Question>>;

    /// Generates tailored study content for the action just planned.
    async fn generate_action_content(
        &self,
        profile: &StudentProfile,
        topic: &str,
        action_type: ActionType,
    ) -> PortResult<ActionContent>;

    /// Answers one tutor-chat message given the full message history.
    async fn chat(
        &self,
        profile: &StudentProfile,
        history: &[ChatMessage],
        message: &str,
        topic: &str,
    ) -> PortResult<String>;
}

/// The persistence collaborator: two independent keyed entries, one for
/// the serialized profile and one for the mastery mapping. Both are read
/// once at session start and written synchronously on every mutation.
/// No schema versioning is defined.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_profile(&self) -> PortResult<Option<StudentProfile>>;
    async fn save_profile(&self, profile: &StudentProfile) -> PortResult<()>;
    async fn load_mastery(&self) -> PortResult<MasteryRecord>;
    async fn save_mastery(&self, mastery: &MasteryRecord) -> PortResult<()>;
}

/// The quiz-result submission collaborator. Delivery is fire-and-forget: a
/// failure is logged by the orchestrator and never retried or allowed to
/// block a transition.
#[async_trait]
pub trait QuizResultSink: Send + Sync {
    async fn submit(&self, result: &QuizResult) -> PortResult<()>;
}
