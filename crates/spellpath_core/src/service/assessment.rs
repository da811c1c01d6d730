//! Placement estimates for assessment sessions.
//!
//! The learner's level is never written from here; callers apply an
//! estimate explicitly.

use crate::engine::rating::rating_to_level;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentEstimate {
    pub suggested_level: u32,
    /// Highest level offered to the learner after placement.
    pub max_level: u32,
}

impl AssessmentEstimate {
    fn around(suggested_level: u32, store_max_level: u32, headroom: u32) -> Self {
        let suggested_level = suggested_level.clamp(1, store_max_level.max(1));
        Self {
            suggested_level,
            max_level: store_max_level.min(suggested_level.saturating_add(headroom)),
        }
    }
}

/// Estimate from the current rating, before any diagnostic answer.
pub fn initial_estimate(rating: f64, store_max_level: u32, headroom: u32) -> AssessmentEstimate {
    AssessmentEstimate::around(
        rating_to_level(rating, store_max_level),
        store_max_level,
        headroom,
    )
}

/// Estimate from diagnostic `(word_level, correct)` results.
///
/// Walks levels upward and keeps the last level answered correctly before
/// the first miss; level 1 when the lowest word was missed.
pub fn refine_estimate(
    results: &[(u32, bool)],
    store_max_level: u32,
    headroom: u32,
) -> Option<AssessmentEstimate> {
    if results.is_empty() {
        return None;
    }
    let mut ordered = results.to_vec();
    ordered.sort_by_key(|(level, _)| *level);

    let mut suggested = 1;
    for (level, correct) in ordered {
        if !correct {
            break;
        }
        suggested = level;
    }
    Some(AssessmentEstimate::around(
        suggested,
        store_max_level,
        headroom,
    ))
}
