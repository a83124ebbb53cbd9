//! services/api/src/web/fill_task.rs
//!
//! The fire-and-forget background task that fills a pending action with
//! generated study content after a quiz completes. The dashboard is never
//! blocked on it: the provider call runs outside the session lock, and the
//! orchestrator's generation counter decides on re-acquire whether the
//! result is still current.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use tutor_core::domain::StudentProfile;
use tutor_core::session::{ActionFillTicket, SessionOrchestrator};

/// Resolves one action-fill ticket. A failed generation is applied as a
/// failure (the action's content stays empty); a stale ticket is discarded
/// by the orchestrator's guard. No retry either way.
pub async fn run_action_fill(
    session: Arc<Mutex<SessionOrchestrator>>,
    profile: StudentProfile,
    ticket: ActionFillTicket,
) {
    info!(
        topic = %ticket.topic,
        action = ?ticket.action_type,
        "starting background action content fill"
    );
    let provider = { session.lock().await.provider() };
    let outcome = provider
        .generate_action_content(&profile, &ticket.topic, ticket.action_type)
        .await;
    session
        .lock()
        .await
        .apply_action_fill(ticket.generation, outcome);
}
