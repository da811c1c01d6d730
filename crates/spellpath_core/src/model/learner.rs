//! Learner (kid) domain model.
//!
//! # Invariants
//! - `level >= 1`; upper bound is the word store's max level and is enforced
//!   by callers that know it.
//! - `successful_attempts <= total_attempts`.
//! - Rating and level only change through the rating update, mini-set branch
//!   transitions, or explicit override.

use crate::engine::rating::DEFAULT_RATING;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a learner.
pub type LearnerId = Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum LearnerValidationError {
    NilId,
    InvalidLevel(u32),
    NonFiniteRating,
    CountersOutOfOrder { total: u64, successful: u64 },
}

impl Display for LearnerValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "learner id must not be nil"),
            Self::InvalidLevel(level) => write!(f, "learner level {level} must be >= 1"),
            Self::NonFiniteRating => write!(f, "learner rating must be finite"),
            Self::CountersOutOfOrder { total, successful } => write!(
                f,
                "successful attempts {successful} exceed total attempts {total}"
            ),
        }
    }
}

impl Error for LearnerValidationError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Learner {
    pub id: LearnerId,
    /// Opaque reference to the owning account; never interpreted by core.
    pub owner_ref: String,
    pub display_name: String,
    pub level: u32,
    pub rating: f64,
    pub total_attempts: u64,
    pub successful_attempts: u64,
}

impl Learner {
    /// New learner at level 1 with the default rating.
    pub fn new(owner_ref: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_ref: owner_ref.into(),
            display_name: display_name.into(),
            level: 1,
            rating: DEFAULT_RATING,
            total_attempts: 0,
            successful_attempts: 0,
        }
    }

    pub fn validate(&self) -> Result<(), LearnerValidationError> {
        if self.id.is_nil() {
            return Err(LearnerValidationError::NilId);
        }
        if self.level == 0 {
            return Err(LearnerValidationError::InvalidLevel(self.level));
        }
        if !self.rating.is_finite() {
            return Err(LearnerValidationError::NonFiniteRating);
        }
        if self.successful_attempts > self.total_attempts {
            return Err(LearnerValidationError::CountersOutOfOrder {
                total: self.total_attempts,
                successful: self.successful_attempts,
            });
        }
        Ok(())
    }
}
