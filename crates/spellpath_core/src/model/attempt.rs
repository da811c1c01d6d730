//! Attempt domain model.
//!
//! # Invariants
//! - Attempts are append-only; there is no update or delete path.
//! - `rating_before`/`rating_after` form a per-learner chain in `sequence`
//!   order (see `engine::rating::verify_rating_chain`).

use crate::model::learner::LearnerId;
use crate::model::session::SessionId;
use crate::model::word::WordId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of an attempt.
pub type AttemptId = Uuid;

/// How the learner entered an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    TapLetters,
    Typed,
}

impl InputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TapLetters => "tap_letters",
            Self::Typed => "typed",
        }
    }

    /// Parses a wire/storage name; unknown modalities are rejected.
    pub fn parse(value: &str) -> Result<Self, UnknownInputMode> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tap_letters" | "tap" => Ok(Self::TapLetters),
            "typed" | "type" => Ok(Self::Typed),
            other => Err(UnknownInputMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownInputMode(pub String);

impl Display for UnknownInputMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown input mode `{}`; expected tap_letters|typed",
            self.0
        )
    }
}

impl Error for UnknownInputMode {}

/// One recorded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: AttemptId,
    pub session_id: SessionId,
    pub learner_id: LearnerId,
    pub miniset_ordinal: u32,
    pub word_id: WordId,
    /// Literal word as presented.
    pub word: String,
    /// Submission exactly as entered, before normalization.
    pub user_spelling: String,
    pub correct: bool,
    pub rating_before: f64,
    pub rating_after: f64,
    pub response_ms: u64,
    pub replay_count: u32,
    pub edit_count: u32,
    pub input_mode: InputMode,
    /// Idempotency token; unique within a session.
    pub prompt_id: Option<Uuid>,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Store-assigned insertion order; `0` before the attempt is stored.
    pub sequence: i64,
}
