//! Learner progress summary derived from attempt history.

use crate::engine::rating::level_to_percentile_midpoint;
use crate::model::attempt::Attempt;
use crate::model::learner::{Learner, LearnerId};
use crate::model::word::WordId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MOST_MISSED_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedWordCount {
    pub word_id: WordId,
    pub word: String,
    pub misses: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerStats {
    pub learner_id: LearnerId,
    pub level: u32,
    pub rating: f64,
    pub percentile: f64,
    pub total_attempts: u64,
    pub correct_attempts: u64,
    /// Fraction in `[0, 1]`; zero without attempts.
    pub accuracy: f64,
    pub current_streak: u32,
    pub best_streak: u32,
    pub average_response_ms: Option<u64>,
    pub most_missed: Vec<MissedWordCount>,
}

/// Summarizes `attempts`, which must be in sequence order.
pub fn compute_stats(
    learner: &Learner,
    attempts: &[Attempt],
    most_missed_limit: usize,
) -> LearnerStats {
    let total_attempts = attempts.len() as u64;
    let correct_attempts = attempts.iter().filter(|attempt| attempt.correct).count() as u64;
    let accuracy = if total_attempts == 0 {
        0.0
    } else {
        correct_attempts as f64 / total_attempts as f64
    };

    let mut current_streak = 0u32;
    let mut best_streak = 0u32;
    for attempt in attempts {
        if attempt.correct {
            current_streak += 1;
            best_streak = best_streak.max(current_streak);
        } else {
            current_streak = 0;
        }
    }

    let average_response_ms = if attempts.is_empty() {
        None
    } else {
        let sum: u128 = attempts.iter().map(|a| u128::from(a.response_ms)).sum();
        Some((sum / attempts.len() as u128) as u64)
    };

    LearnerStats {
        learner_id: learner.id,
        level: learner.level,
        rating: learner.rating,
        percentile: level_to_percentile_midpoint(learner.level),
        total_attempts,
        correct_attempts,
        accuracy,
        current_streak,
        best_streak,
        average_response_ms,
        most_missed: most_missed(attempts, most_missed_limit),
    }
}

// Ordered by miss count desc, then spelling asc.
fn most_missed(attempts: &[Attempt], limit: usize) -> Vec<MissedWordCount> {
    let mut counts: HashMap<WordId, MissedWordCount> = HashMap::new();
    for attempt in attempts.iter().filter(|attempt| !attempt.correct) {
        counts
            .entry(attempt.word_id)
            .or_insert_with(|| MissedWordCount {
                word_id: attempt.word_id,
                word: attempt.word.clone(),
                misses: 0,
            })
            .misses += 1;
    }

    let mut ranked: Vec<MissedWordCount> = counts.into_values().collect();
    ranked.sort_by(|left, right| {
        right
            .misses
            .cmp(&left.misses)
            .then_with(|| left.word.cmp(&right.word))
    });
    ranked.truncate(limit);
    ranked
}
