//! Session domain model and lifecycle transition table.
//!
//! # Responsibility
//! - Define the persisted session record and its mini-set rows.
//! - Own the closed set of session states and the only legal transitions.
//!
//! # Invariants
//! - A session starts in `Start`, alternates `Spelling`/`Break` once per
//!   mini-set and ends in `Complete`.
//! - `Complete` is terminal; nothing transitions out of it.
//! - `word_index` always points inside the active mini-set while `Spelling`.

use crate::model::learner::LearnerId;
use crate::model::word::{WordId, WordListId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a practice session.
pub type SessionId = Uuid;

/// Lifecycle state tag persisted on every session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Start,
    Spelling,
    Break,
    Complete,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Spelling => "spelling",
            Self::Break => "break",
            Self::Complete => "complete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start" => Some(Self::Start),
            "spelling" => Some(Self::Spelling),
            "break" => Some(Self::Break),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    /// Applies one action to this state.
    ///
    /// Returns the target state, or `InvalidTransition` when the action's
    /// required source state does not match. No coercion is attempted.
    pub fn transition(self, action: SessionAction) -> Result<Self, InvalidTransition> {
        match (self, action) {
            (Self::Start, SessionAction::Start) => Ok(Self::Spelling),
            (Self::Spelling, SessionAction::Submit { completes_miniset }) => {
                if completes_miniset {
                    Ok(Self::Break)
                } else {
                    Ok(Self::Spelling)
                }
            }
            (Self::Break, SessionAction::ContinueMiniSet) => Ok(Self::Spelling),
            (Self::Spelling | Self::Break, SessionAction::Finish) => Ok(Self::Complete),
            (from, action) => Err(InvalidTransition { from, action }),
        }
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State-mutating actions of the session machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Start,
    Submit { completes_miniset: bool },
    ContinueMiniSet,
    Finish,
}

impl SessionAction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Submit { .. } => "submit",
            Self::ContinueMiniSet => "complete_miniset",
            Self::Finish => "finish",
        }
    }

    /// States from which this action is accepted.
    pub fn required_states(self) -> &'static [SessionState] {
        match self {
            Self::Start => &[SessionState::Start],
            Self::Submit { .. } => &[SessionState::Spelling],
            Self::ContinueMiniSet => &[SessionState::Break],
            Self::Finish => &[SessionState::Spelling, SessionState::Break],
        }
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: SessionState,
    pub action: SessionAction,
}

impl Display for InvalidTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let expected = self
            .action
            .required_states()
            .iter()
            .map(|state| state.as_str())
            .collect::<Vec<_>>()
            .join("|");
        write!(
            f,
            "action `{}` requires state {expected}, session is `{}`",
            self.action.name(),
            self.from
        )
    }
}

impl Error for InvalidTransition {}

/// How the session picks words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Level-matched adaptive practice.
    #[default]
    Practice,
    /// Diagnostic calibration across levels.
    Assessment,
    /// Re-practice of recently missed words.
    Review,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Practice => "practice",
            Self::Assessment => "assessment",
            Self::Review => "review",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "practice" => Some(Self::Practice),
            "assessment" => Some(Self::Assessment),
            "review" => Some(Self::Review),
            _ => None,
        }
    }
}

/// Learner-chosen branch out of a break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MiniSetChoice {
    Continue,
    ChallengeJump,
    PracticeMissed,
}

/// Why a mini-set was assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiniSetKind {
    Initial,
    Diagnostic,
    Continue,
    ChallengeJump,
    PracticeMissed,
}

impl MiniSetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Diagnostic => "diagnostic",
            Self::Continue => "continue",
            Self::ChallengeJump => "challenge_jump",
            Self::PracticeMissed => "practice_missed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "initial" => Some(Self::Initial),
            "diagnostic" => Some(Self::Diagnostic),
            "continue" => Some(Self::Continue),
            "challenge_jump" => Some(Self::ChallengeJump),
            "practice_missed" => Some(Self::PracticeMissed),
            _ => None,
        }
    }
}

impl From<MiniSetChoice> for MiniSetKind {
    fn from(value: MiniSetChoice) -> Self {
        match value {
            MiniSetChoice::Continue => Self::Continue,
            MiniSetChoice::ChallengeJump => Self::ChallengeJump,
            MiniSetChoice::PracticeMissed => Self::PracticeMissed,
        }
    }
}

/// One fixed-size batch of words inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniSet {
    pub session_id: SessionId,
    /// Zero-based position within the session.
    pub ordinal: u32,
    pub level: u32,
    pub kind: MiniSetKind,
    pub word_ids: Vec<WordId>,
    pub created_at: i64,
}

/// Persisted practice session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub learner_id: LearnerId,
    pub mode: SessionMode,
    pub list_id: Option<WordListId>,
    pub state: SessionState,
    /// Ordinal of the active (or last) mini-set.
    pub current_miniset: u32,
    pub word_index: u32,
    pub current_level: u32,
    pub attempts_total: u64,
    pub correct_total: u64,
    pub minisets_completed: u32,
    pub level_start: u32,
    pub level_end: Option<u32>,
    pub assessment_suggested_level: Option<u32>,
    pub assessment_max_level: Option<u32>,
    /// Epoch milliseconds.
    pub started_at: i64,
    pub ended_at: Option<i64>,
}

impl Session {
    /// Fresh session in `Start` for the given learner level.
    pub fn new(learner_id: LearnerId, mode: SessionMode, level: u32, started_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_id,
            mode,
            list_id: None,
            state: SessionState::Start,
            current_miniset: 0,
            word_index: 0,
            current_level: level,
            attempts_total: 0,
            correct_total: 0,
            minisets_completed: 0,
            level_start: level,
            level_end: None,
            assessment_suggested_level: None,
            assessment_max_level: None,
            started_at,
            ended_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Complete
    }
}

/// Partial update applied by `SessionRepository::update_session`.
///
/// `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub state: Option<SessionState>,
    pub current_miniset: Option<u32>,
    pub word_index: Option<u32>,
    pub current_level: Option<u32>,
    pub attempts_total: Option<u64>,
    pub correct_total: Option<u64>,
    pub minisets_completed: Option<u32>,
    pub level_end: Option<u32>,
    pub assessment_suggested_level: Option<u32>,
    pub assessment_max_level: Option<u32>,
    pub ended_at: Option<i64>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionAction, SessionState};

    #[test]
    fn transition_table_accepts_lifecycle() {
        let state = SessionState::Start
            .transition(SessionAction::Start)
            .unwrap();
        assert_eq!(state, SessionState::Spelling);

        let state = state
            .transition(SessionAction::Submit {
                completes_miniset: false,
            })
            .unwrap();
        assert_eq!(state, SessionState::Spelling);

        let state = state
            .transition(SessionAction::Submit {
                completes_miniset: true,
            })
            .unwrap();
        assert_eq!(state, SessionState::Break);

        let state = state.transition(SessionAction::ContinueMiniSet).unwrap();
        assert_eq!(state, SessionState::Spelling);
        assert_eq!(
            state.transition(SessionAction::Finish).unwrap(),
            SessionState::Complete
        );
    }

    #[test]
    fn complete_is_terminal() {
        for action in [
            SessionAction::Start,
            SessionAction::Submit {
                completes_miniset: false,
            },
            SessionAction::ContinueMiniSet,
            SessionAction::Finish,
        ] {
            let err = SessionState::Complete.transition(action).unwrap_err();
            assert_eq!(err.from, SessionState::Complete);
        }
    }

    #[test]
    fn submit_during_break_is_rejected() {
        let err = SessionState::Break
            .transition(SessionAction::Submit {
                completes_miniset: false,
            })
            .unwrap_err();
        assert!(err.to_string().contains("requires state spelling"));
    }

    #[test]
    fn state_tags_roundtrip_through_storage_names() {
        for state in [
            SessionState::Start,
            SessionState::Spelling,
            SessionState::Break,
            SessionState::Complete,
        ] {
            assert_eq!(SessionState::parse(state.as_str()), Some(state));
        }
        assert_eq!(SessionState::parse("paused"), None);
    }
}
