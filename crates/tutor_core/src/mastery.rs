//! crates/tutor_core/src/mastery.rs
//!
//! The per-topic mastery record: the source of truth for difficulty
//! selection. Serializes as a plain `{"Topic": score}` JSON object so the
//! persisted shape is the same key-value layout the store contract expects.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Mapping from topic name to the last observed quiz score (0-100).
///
/// A topic appears at most once; writes are last-write-wins. A key is
/// written exactly once per completed quiz on that topic and never deleted
/// within a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MasteryRecord(HashMap<String, u8>);

impl MasteryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, topic: &str) -> Option<u8> {
        self.0.get(topic).copied()
    }

    /// Records `score` for `topic`, overwriting any prior score.
    pub fn set(&mut self, topic: &str, score: u8) {
        self.0.insert(topic.to_string(), score.min(100));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.0.iter().map(|(topic, score)| (topic.as_str(), *score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut mastery = MasteryRecord::new();
        mastery.set("Algebra", 60);
        assert_eq!(mastery.get("Algebra"), Some(60));
        assert_eq!(mastery.get("Geometry"), None);
    }

    #[test]
    fn last_write_wins() {
        let mut mastery = MasteryRecord::new();
        mastery.set("Algebra", 35);
        mastery.set("Algebra", 80);
        assert_eq!(mastery.get("Algebra"), Some(80));
        assert_eq!(mastery.len(), 1);
    }

    #[test]
    fn scores_above_the_scale_are_clamped() {
        let mut mastery = MasteryRecord::new();
        mastery.set("Algebra", 250);
        assert_eq!(mastery.get("Algebra"), Some(100));
    }

    #[test]
    fn serializes_as_a_plain_object() {
        let mut mastery = MasteryRecord::new();
        mastery.set("Fractions", 45);
        let json = serde_json::to_string(&mastery).unwrap();
        assert_eq!(json, r#"{"Fractions":45}"#);

        let restored: MasteryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, mastery);
    }
}
