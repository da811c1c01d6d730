//! Typed errors surfaced by the session service.
//!
//! # Invariants
//! - Every error maps to exactly one coarse `ErrorKind`.
//! - `StateConflict` and `StoreFailure` are retryable from a fresh read; the
//!   service never leaves partial writes behind when returning either.

use crate::engine::rating::LevelError;
use crate::model::attempt::UnknownInputMode;
use crate::model::session::{InvalidTransition, SessionId};
use crate::repo::RepoError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type SessionResult<T> = Result<T, SessionError>;

/// Coarse error classes exposed to the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    StateConflict,
    StoreFailure,
}

#[derive(Debug)]
pub enum SessionError {
    /// Malformed request; rejected before any store access.
    Validation(String),
    NotFound { entity: &'static str, id: Uuid },
    /// No words exist for the requested level (or at all when `None`).
    NoWordsAvailable { level: Option<u32> },
    InvalidTransition(InvalidTransition),
    /// Request is stale relative to stored state.
    StateConflict(String),
    LockNotAcquired { session_id: SessionId },
    Store(RepoError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } | Self::NoWordsAvailable { .. } => ErrorKind::NotFound,
            Self::InvalidTransition(_) | Self::StateConflict(_) | Self::LockNotAcquired { .. } => {
                ErrorKind::StateConflict
            }
            Self::Store(_) => ErrorKind::StoreFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StateConflict | ErrorKind::StoreFailure
        )
    }

    /// Stable machine-readable code for logs and envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::NoWordsAvailable { .. } => "no_words",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::StateConflict(_) => "state_conflict",
            Self::LockNotAcquired { .. } => "lock_not_acquired",
            Self::Store(_) => "store_failure",
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "invalid request: {message}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::NoWordsAvailable { level: Some(level) } => {
                write!(f, "no words available at level {level}")
            }
            Self::NoWordsAvailable { level: None } => write!(f, "word store is empty"),
            Self::InvalidTransition(err) => write!(f, "{err}"),
            Self::StateConflict(message) => write!(f, "state conflict: {message}"),
            Self::LockNotAcquired { session_id } => {
                write!(f, "session {session_id} is busy; retry the request")
            }
            Self::Store(err) => write!(f, "store failure: {err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTransition(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Conflict(message) => Self::StateConflict(message),
            RepoError::InvalidWord(err) => Self::Validation(err.to_string()),
            RepoError::InvalidLearner(err) => Self::Validation(err.to_string()),
            other => Self::Store(other),
        }
    }
}

impl From<InvalidTransition> for SessionError {
    fn from(value: InvalidTransition) -> Self {
        Self::InvalidTransition(value)
    }
}

impl From<LevelError> for SessionError {
    fn from(value: LevelError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<UnknownInputMode> for SessionError {
    fn from(value: UnknownInputMode) -> Self {
        Self::Validation(value.to_string())
    }
}
