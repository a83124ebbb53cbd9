//! services/api/src/adapters/store.rs
//!
//! This module contains the session-store adapter, the concrete
//! implementation of the `SessionStore` port. The contract is a local
//! key-value store holding two independent entries (the serialized
//! profile and the serialized mastery mapping), so the adapter is a single
//! `(key, value)` table in SQLite, written through on every mutation.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tutor_core::domain::StudentProfile;
use tutor_core::mastery::MasteryRecord;
use tutor_core::ports::{PortError, PortResult, SessionStore};

const PROFILE_KEY: &str = "student_profile";
const MASTERY_KEY: &str = "topic_mastery";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A SQLite-backed adapter that implements the `SessionStore` port.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Creates a new `SqliteStore`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the backing table at startup. No schema versioning is
    /// defined for the stored snapshots.
    pub async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS session_store (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read(&self, key: &str) -> PortResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM session_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn write(&self, key: &str, value: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO session_store (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for SqliteStore {
    async fn load_profile(&self) -> PortResult<Option<StudentProfile>> {
        match self.read(PROFILE_KEY).await? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| PortError::Unexpected(format!("corrupt profile snapshot: {e}"))),
            None => Ok(None),
        }
    }

    async fn save_profile(&self, profile: &StudentProfile) -> PortResult<()> {
        let json = serde_json::to_string(profile)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.write(PROFILE_KEY, &json).await
    }

    async fn load_mastery(&self) -> PortResult<MasteryRecord> {
        match self.read(MASTERY_KEY).await? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| PortError::Unexpected(format!("corrupt mastery snapshot: {e}"))),
            None => Ok(MasteryRecord::new()),
        }
    }

    async fn save_mastery(&self, mastery: &MasteryRecord) -> PortResult<()> {
        let json = serde_json::to_string(mastery)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.write(MASTERY_KEY, &json).await
    }
}
