//! Elo-style skill rating model.
//!
//! # Responsibility
//! - Update a learner rating from one attempt outcome.
//! - Map levels to anchor ratings and display percentiles.
//!
//! # Invariants
//! - Pure functions; no I/O and no hidden state.
//! - `level_to_base_elo` is strictly increasing in level.
//! - `level_to_percentile_midpoint` is non-decreasing and within `[0, 100]`.
//! - A correct answer never lowers the rating; a miss never raises it.

use crate::model::attempt::Attempt;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rating assigned to a brand new learner; equals the level-1 anchor.
pub const DEFAULT_RATING: f64 = 1500.0;
pub const BASE_ELO: f64 = 1500.0;
pub const ELO_PER_LEVEL: f64 = 100.0;
pub const DEFAULT_K_FACTOR: f64 = 24.0;

const LOGISTIC_SCALE: f64 = 400.0;
/// Level whose anchor is treated as the population-average speller.
const POPULATION_MEDIAN_LEVEL: u32 = 6;
const RATING_CHAIN_EPSILON: f64 = 1e-9;

/// Tunables for rating updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingConfig {
    pub k_factor: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelError {
    OutOfRange { level: u32, max_level: u32 },
}

impl Display for LevelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { level, max_level } => {
                write!(f, "level {level} is outside [1, {max_level}]")
            }
        }
    }
}

impl Error for LevelError {}

/// Anchor rating of a level.
pub fn level_to_base_elo(level: u32) -> f64 {
    BASE_ELO + f64::from(level.max(1) - 1) * ELO_PER_LEVEL
}

/// Probability that a speller rated `rating` gets an item rated `item_rating`.
pub fn expected_score(rating: f64, item_rating: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((item_rating - rating) / LOGISTIC_SCALE))
}

/// Next rating after one attempt at an item of `item_level`.
pub fn update_rating(
    current: f64,
    did_succeed: bool,
    item_level: u32,
    config: &RatingConfig,
) -> f64 {
    let expected = expected_score(current, level_to_base_elo(item_level));
    let actual = if did_succeed { 1.0 } else { 0.0 };
    current + config.k_factor * (actual - expected)
}

/// Approximate population percentile for a level, for display only.
///
/// Computed as the expected score of the level anchor against a speller at
/// the population median level, scaled to `[0, 100]`, one decimal.
pub fn level_to_percentile_midpoint(level: u32) -> f64 {
    let median = level_to_base_elo(POPULATION_MEDIAN_LEVEL);
    let raw = 100.0 * expected_score(level_to_base_elo(level), median);
    ((raw * 10.0).round() / 10.0).clamp(0.0, 100.0)
}

/// Highest level whose anchor does not exceed `rating`, within `[1, max_level]`.
pub fn rating_to_level(rating: f64, max_level: u32) -> u32 {
    let max_level = max_level.max(1);
    if !rating.is_finite() || rating <= BASE_ELO {
        return 1;
    }
    let steps = ((rating - BASE_ELO) / ELO_PER_LEVEL).floor();
    let level = 1.0 + steps;
    if level >= f64::from(max_level) {
        max_level
    } else {
        level as u32
    }
}

/// Clamps a requested level into `[1, max_level]`.
pub fn clamp_level(level: u32, max_level: u32) -> u32 {
    level.clamp(1, max_level.max(1))
}

/// Rejects levels outside `[1, max_level]`.
pub fn check_level(level: u32, max_level: u32) -> Result<u32, LevelError> {
    if level == 0 || level > max_level {
        return Err(LevelError::OutOfRange { level, max_level });
    }
    Ok(level)
}

/// First place where an ordered attempt history breaks the rating chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainBreak {
    /// Index of the attempt whose `rating_before` does not match.
    pub index: usize,
    pub expected_before: f64,
    pub actual_before: f64,
}

/// Checks `rating_after[i] == rating_before[i + 1]` over one learner's
/// attempts, which must already be in insertion order.
pub fn verify_rating_chain(attempts: &[Attempt]) -> Result<(), ChainBreak> {
    for (index, pair) in attempts.windows(2).enumerate() {
        let (previous, next) = (&pair[0], &pair[1]);
        if (previous.rating_after - next.rating_before).abs() > RATING_CHAIN_EPSILON {
            return Err(ChainBreak {
                index: index + 1,
                expected_before: previous.rating_after,
                actual_before: next.rating_before,
            });
        }
    }
    Ok(())
}
