//! JSON action contract.
//!
//! # Responsibility
//! - Decode one tagged action (`{"type": "SUBMIT", ...}`) and run it on a
//!   `SessionService`.
//! - Wrap every outcome in an `ActionEnvelope`.
//!
//! # Invariants
//! - `handle_json` never panics and always returns an envelope.
//! - Failures carry the coarse `errorKind` plus a retry hint; successes carry
//!   the action's response under `data`.

use crate::model::learner::LearnerId;
use crate::model::session::SessionId;
use crate::repo::lock_repo::SessionLockRepository;
use crate::repo::store::SpellingStore;
use crate::service::contract::{
    CompleteMiniSetRequest, FinishRequest, StartRequest, SubmitRequest,
};
use crate::service::error::{ErrorKind, SessionError};
use crate::service::session_service::SessionService;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One action, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionRequest {
    Start(StartRequest),
    Submit(SubmitRequest),
    CompleteMiniset(CompleteMiniSetRequest),
    Finish(FinishRequest),
    SharedResult(SessionRef),
    ApplyAssessment(SessionRef),
    OverrideLevel(LevelOverride),
    LearnerStats(LearnerRef),
}

impl ActionRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start(_) => "START",
            Self::Submit(_) => "SUBMIT",
            Self::CompleteMiniset(_) => "COMPLETE_MINISET",
            Self::Finish(_) => "FINISH",
            Self::SharedResult(_) => "SHARED_RESULT",
            Self::ApplyAssessment(_) => "APPLY_ASSESSMENT",
            Self::OverrideLevel(_) => "OVERRIDE_LEVEL",
            Self::LearnerStats(_) => "LEARNER_STATS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerRef {
    pub learner_id: LearnerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelOverride {
    pub learner_id: LearnerId,
    pub level: u32,
}

/// Failure half of the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionFailure {
    pub error_kind: ErrorKind,
    pub error_code: String,
    pub message: String,
    pub retryable: bool,
}

/// Response envelope for every action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEnvelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub failure: Option<ActionFailure>,
}

impl ActionEnvelope {
    fn success(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            failure: None,
        }
    }

    fn failure(err: &SessionError) -> Self {
        Self {
            ok: false,
            data: None,
            failure: Some(ActionFailure {
                error_kind: err.kind(),
                error_code: err.code().to_string(),
                message: err.to_string(),
                retryable: err.is_retryable(),
            }),
        }
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(|failure| failure.error_kind)
    }
}

/// Runs one decoded action and returns its JSON response.
pub fn dispatch<S, L, R>(
    service: &mut SessionService<S, L, R>,
    request: &ActionRequest,
) -> Result<Value, SessionError>
where
    S: SpellingStore,
    L: SessionLockRepository,
    R: Rng,
{
    match request {
        ActionRequest::Start(inner) => to_value(service.start(inner)?),
        ActionRequest::Submit(inner) => to_value(service.submit(inner)?),
        ActionRequest::CompleteMiniset(inner) => to_value(service.complete_miniset(inner)?),
        ActionRequest::Finish(inner) => to_value(service.finish(inner)?),
        ActionRequest::SharedResult(inner) => {
            to_value(service.get_shared_result(inner.session_id)?)
        }
        ActionRequest::ApplyAssessment(inner) => {
            to_value(service.apply_assessment(inner.session_id)?)
        }
        ActionRequest::OverrideLevel(inner) => {
            let learner = service.override_learner_level(inner.learner_id, inner.level)?;
            to_value(learner)
        }
        ActionRequest::LearnerStats(inner) => to_value(service.learner_stats(inner.learner_id)?),
    }
}

/// Decodes `input`, dispatches it and wraps the outcome.
pub fn handle_json<S, L, R>(service: &mut SessionService<S, L, R>, input: &str) -> ActionEnvelope
where
    S: SpellingStore,
    L: SessionLockRepository,
    R: Rng,
{
    let request: ActionRequest = match serde_json::from_str(input) {
        Ok(request) => request,
        Err(err) => {
            return ActionEnvelope::failure(&SessionError::Validation(format!(
                "malformed action: {err}"
            )))
        }
    };

    match dispatch(service, &request) {
        Ok(data) => ActionEnvelope::success(data),
        Err(err) => ActionEnvelope::failure(&err),
    }
}

fn to_value<T: Serialize>(response: T) -> Result<Value, SessionError> {
    serde_json::to_value(response).map_err(|err| {
        SessionError::Validation(format!("response is not representable as JSON: {err}"))
    })
}
