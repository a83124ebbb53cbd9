//! services/api/src/adapters/telemetry.rs
//!
//! This module contains the quiz-result submission adapter. There is no
//! real backend endpoint yet, so the adapter logs the serialized payload;
//! the `QuizResultSink` port is the seam a real transport plugs into.

use async_trait::async_trait;
use tracing::info;
use tutor_core::domain::QuizResult;
use tutor_core::ports::{PortError, PortResult, QuizResultSink};

/// A sink that records quiz results in the service log.
#[derive(Clone, Default)]
pub struct LogResultSink;

#[async_trait]
impl QuizResultSink for LogResultSink {
    async fn submit(&self, result: &QuizResult) -> PortResult<()> {
        let payload = serde_json::to_string(result)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        info!(target: "quiz_submission", "submitting quiz result: {payload}");
        Ok(())
    }
}
