//! crates/tutor_core/src/planner.rs
//!
//! The two pure decision functions of the tutor: difficulty selection for
//! the next quiz and next-action planning after a completed quiz.
//!
//! Both consume the same three-band partition of [0, 100]. The difficulty
//! tiers and the planner categories correspond band-for-band; routing both
//! through `ScoreBand` keeps the thresholds from drifting apart.

use crate::domain::{ActionType, Difficulty};

/// The shared partition of the score range. 40 and 70 are inclusive-lower
/// on their band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    /// score < 40
    Low,
    /// 40 <= score < 70
    Mid,
    /// score >= 70
    High,
}

impl ScoreBand {
    pub fn of(score: u8) -> Self {
        match score {
            0..=39 => ScoreBand::Low,
            40..=69 => ScoreBand::Mid,
            _ => ScoreBand::High,
        }
    }
}

/// Maps the learner's last recorded score for a topic to the difficulty of
/// the next quiz on it. No prior score means the topic has never been
/// quizzed, and the first exposure is pitched at `Average`.
pub fn select_difficulty(previous_score: Option<u8>) -> Difficulty {
    match previous_score {
        None => Difficulty::Average,
        Some(score) => match ScoreBand::of(score) {
            ScoreBand::Low => Difficulty::Weak,
            ScoreBand::Mid => Difficulty::Average,
            ScoreBand::High => Difficulty::Strong,
        },
    }
}

/// Decides the pedagogical follow-up for a completed quiz.
pub fn next_action(score: u8) -> ActionType {
    match ScoreBand::of(score) {
        ScoreBand::Low => ActionType::Remedial,
        ScoreBand::Mid => ActionType::Practice,
        ScoreBand::High => ActionType::Advance,
    }
}
