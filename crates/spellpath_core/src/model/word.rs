//! Word domain model.
//!
//! # Responsibility
//! - Define the immutable practice item presented to learners.
//! - Validate spelling shape and level before persistence.
//!
//! # Invariants
//! - `spelling` is lowercase ASCII letters with optional inner hyphen or
//!   apostrophe, and always starts with a letter.
//! - `level` is `>= 1` and never changes after the word is stored.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a word.
pub type WordId = Uuid;

/// Stable identifier of a custom word list.
pub type WordListId = Uuid;

static SPELLING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z'\-]*$").expect("valid spelling regex"));

/// Validation errors for word records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordValidationError {
    NilId,
    EmptySpelling,
    InvalidSpelling(String),
    InvalidLevel(i64),
}

impl Display for WordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "word id must not be nil"),
            Self::EmptySpelling => write!(f, "word spelling must not be empty"),
            Self::InvalidSpelling(value) => write!(
                f,
                "word spelling `{value}` must be lowercase letters with optional hyphen/apostrophe"
            ),
            Self::InvalidLevel(level) => write!(f, "word level {level} must be >= 1"),
        }
    }
}

impl Error for WordValidationError {}

/// A single spelling item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub id: WordId,
    /// Canonical lowercase spelling.
    pub spelling: String,
    pub level: u32,
    pub definition: Option<String>,
    pub example_sentence: Option<String>,
}

impl Word {
    /// Creates a word with a generated id.
    pub fn new(spelling: impl Into<String>, level: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            spelling: spelling.into(),
            level,
            definition: None,
            example_sentence: None,
        }
    }

    /// Number of characters a learner has to produce.
    pub fn len(&self) -> usize {
        self.spelling.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.spelling.is_empty()
    }

    /// Checks the stored-shape invariants.
    pub fn validate(&self) -> Result<(), WordValidationError> {
        if self.id.is_nil() {
            return Err(WordValidationError::NilId);
        }
        if self.spelling.is_empty() {
            return Err(WordValidationError::EmptySpelling);
        }
        if !SPELLING_RE.is_match(&self.spelling) {
            return Err(WordValidationError::InvalidSpelling(self.spelling.clone()));
        }
        if self.level == 0 {
            return Err(WordValidationError::InvalidLevel(i64::from(self.level)));
        }
        Ok(())
    }
}

/// Named custom list of words, e.g. a weekly school list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordList {
    pub id: WordListId,
    pub owner_ref: String,
    pub name: String,
    /// Ordered member word ids.
    pub word_ids: Vec<WordId>,
}
