pub mod fill_task;
pub mod rest;
pub mod state;

// Re-export the handlers so the binary that builds the router can reach
// them without digging through the module tree.
pub use rest::{
    chat_handler, complete_diagnostic_handler, complete_quiz_handler, get_session_handler,
    new_topic_handler, onboarding_handler, select_topic_handler, ApiDoc,
};
pub use state::AppState;
