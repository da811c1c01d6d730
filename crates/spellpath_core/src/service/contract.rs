//! Request and response payloads of the session actions.
//!
//! Field names serialize in camelCase; these structs are the JSON shapes the
//! `api` module exchanges with callers.

use crate::engine::diff::ErrorDetails;
use crate::engine::lesson::Lesson;
use crate::engine::prompt::Prompt;
use crate::model::attempt::AttemptId;
use crate::model::learner::LearnerId;
use crate::model::session::{MiniSetChoice, MiniSetKind, SessionId, SessionMode};
use crate::model::word::{Word, WordId, WordListId};
use crate::service::assessment::AssessmentEstimate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub learner_id: LearnerId,
    /// Explicit words; capped to the mini-set size. Wins over `list_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_ids: Option<Vec<WordId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<WordListId>,
    #[serde(default)]
    pub assessment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SessionMode>,
}

impl StartRequest {
    /// Level-based practice for `learner_id`.
    pub fn practice(learner_id: LearnerId) -> Self {
        Self {
            learner_id,
            ..Self::default()
        }
    }

    pub fn assessment(learner_id: LearnerId) -> Self {
        Self {
            learner_id,
            assessment: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub session_id: SessionId,
    pub mode: SessionMode,
    pub current_word: Word,
    pub current_prompt: Prompt,
    pub word_index: u32,
    pub level: u32,
    pub miniset_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_suggested_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_max_level: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub session_id: SessionId,
    pub word_id: WordId,
    /// As entered; normalized only for comparison.
    pub user_spelling: String,
    pub response_ms: u64,
    #[serde(default)]
    pub replay_count: u32,
    #[serde(default)]
    pub edit_count: u32,
    /// `tap_letters` or `typed`; defaults to the level's modality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_mode: Option<String>,
    /// Echo of the prompt id; one attempt per prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextStep {
    NextWord,
    Break,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedWord {
    pub word_id: WordId,
    pub word: String,
    pub user_spelling: String,
}

/// Recap shown when a mini-set ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakSummary {
    pub miniset_ordinal: u32,
    pub level: u32,
    pub kind: MiniSetKind,
    pub word_count: u32,
    pub correct_count: u32,
    pub correct_words: Vec<String>,
    pub missed_words: Vec<MissedWord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<AssessmentEstimate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub correct: bool,
    pub correct_spelling: String,
    pub error_details: ErrorDetails,
    pub attempt_id: AttemptId,
    pub rating_before: f64,
    pub rating_after: f64,
    pub next_step: NextStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_word: Option<Word>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_prompt: Option<Prompt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_summary: Option<BreakSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson: Option<Lesson>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMiniSetRequest {
    pub session_id: SessionId,
    pub action: MiniSetChoice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMiniSetResponse {
    pub current_word: Word,
    pub current_prompt: Prompt,
    pub word_index: u32,
    pub level: u32,
    pub kind: MiniSetKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishRequest {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishResponse {
    pub session_id: SessionId,
    pub attempts_total: u64,
    pub correct_total: u64,
    pub mini_sets_completed: u32,
    pub level_end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedWordResult {
    pub word: String,
    pub correct: bool,
}

/// Read-only view of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedResult {
    pub session_id: SessionId,
    pub mode: SessionMode,
    pub attempts_total: u64,
    pub correct_total: u64,
    pub accuracy: f64,
    pub mini_sets_completed: u32,
    pub level_start: u32,
    pub level_end: u32,
    pub percentile: f64,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub words: Vec<SharedWordResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_request_accepts_minimal_json() {
        let learner_id = Uuid::new_v4();
        let request: StartRequest =
            serde_json::from_str(&format!(r#"{{"learnerId":"{learner_id}"}}"#)).unwrap();
        assert_eq!(request, StartRequest::practice(learner_id));
    }

    #[test]
    fn finish_response_uses_camel_case() {
        let response = FinishResponse {
            session_id: Uuid::nil(),
            attempts_total: 5,
            correct_total: 4,
            mini_sets_completed: 1,
            level_end: 2,
        };
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["miniSetsCompleted"], 1);
        assert_eq!(value["levelEnd"], 2);
        assert_eq!(value["attemptsTotal"], 5);
    }

    #[test]
    fn submit_request_defaults_optional_counters() {
        let json = format!(
            r#"{{"sessionId":"{}","wordId":"{}","userSpelling":"cat","responseMs":900}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let request: SubmitRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.replay_count, 0);
        assert!(request.prompt_id.is_none());
        assert!(request.input_mode.is_none());
    }
}
