//! crates/tutor_core/src/domain.rs
//!
//! Defines the pure, core data structures for the tutoring application.
//! These structs are independent of any database or transport format; the
//! serde derives exist because the profile and mastery snapshots are
//! persisted as JSON and the API service re-renders them to the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The learner's stated learning goal, captured once at onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Goal {
    Basics,
    Exam,
    Job,
}

/// Identity and preferences for one learner.
///
/// Created at onboarding completion and immutable afterwards; the current
/// subject/topic context lives in the session state, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    /// Opaque stable identifier, generated once at onboarding and never
    /// reassigned.
    pub id: Uuid,
    pub name: String,
    pub class_level: String,
    pub subject: String,
    pub goal: Goal,
    pub language: String,
    /// Advisory only; the orchestrator never schedules against it.
    pub daily_time_minutes: Option<u32>,
}

/// One assessment item produced by the content provider.
///
/// After coercion (see the `content` module) `correct_option_index` is
/// always a valid index into `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique within the batch the question was generated in.
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
    pub explanation: Option<String>,
}

/// The planner's verdict for one completed quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Remedial,
    Practice,
    Advance,
}

/// The discrete difficulty tier a quiz is generated at, derived from the
/// learner's last recorded mastery for the topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Weak,
    Average,
    Strong,
}

impl Difficulty {
    /// The phrasing passed to the content provider when requesting a quiz.
    pub fn prompt_description(self) -> &'static str {
        match self {
            Difficulty::Weak => "beginner (focus on basics)",
            Difficulty::Average => "intermediate (application based)",
            Difficulty::Strong => "advanced (critical thinking)",
        }
    }
}

/// The tutor's prescribed next step plus generated study content for the
/// topic just quizzed.
///
/// Lives in two phases: *pending* (published immediately after scoring,
/// `content` empty) and *filled* (once the background content request
/// resolves). At most one action is current per session; a new quiz
/// completion replaces it entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAction {
    pub action_type: ActionType,
    pub topic: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl AiAction {
    /// A freshly published action with no generated content yet.
    pub fn pending(action_type: ActionType, topic: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            action_type,
            topic,
            title: None,
            description: None,
            content: String::new(),
            timestamp,
        }
    }
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One entry in the dashboard chat log. The log is append-only and scoped
/// to the current dashboard session; it is not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// The result record emitted to the telemetry collaborator on every quiz
/// completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub student_id: Uuid,
    pub topic: String,
    pub score: u8,
    pub timestamp: DateTime<Utc>,
}

/// Computes the final percentage score for a quiz as `round(correct /
/// total * 100)`. An empty quiz scores 0.
pub fn quiz_score(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = correct.min(total);
    ((correct as f64 / total as f64) * 100.0).round() as u8
}
