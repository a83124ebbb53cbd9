//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;
use tokio::sync::Mutex;
use tutor_core::session::SessionOrchestrator;

/// The shared application state, created once at startup and passed to all
/// handlers.
///
/// The orchestrator sits behind one async mutex: handlers lock it, apply a
/// single event, and release it, which gives the core the cooperative
/// single-threaded event model it assumes. Background work (the action
/// content fill, the chat round-trip) runs its provider call outside the
/// lock and re-acquires it only to apply the outcome.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<SessionOrchestrator>>,
}
