//! Session use-case service: the adaptive practice state machine.
//!
//! # Responsibility
//! - Run START / SUBMIT / COMPLETE_MINISET / FINISH against the store.
//! - Pick mini-set words, build prompts, score submissions and move ratings.
//! - Expose read-only session results and learner progress.
//!
//! # Invariants
//! - Every mutating action runs under the per-session lock and releases it on
//!   every exit path.
//! - Requests are validated before any store access.
//! - A submission's attempt row, learner rating/counters and session patch
//!   commit together or not at all.
//! - The learner rating read for `rating_before` happens inside the same
//!   transaction that appends the attempt, which keeps the per-learner
//!   rating chain intact across concurrent sessions.
//! - FINISH on a `Complete` session returns stored totals and writes nothing.

use crate::config::SessionConfig;
use crate::engine::diff::{analyze, SpellingAnalysis};
use crate::engine::lesson::{lesson_for, Lesson};
use crate::engine::prompt::build_prompt;
use crate::engine::rating::{
    check_level, clamp_level, level_to_base_elo, level_to_percentile_midpoint, update_rating,
};
use crate::model::attempt::{Attempt, InputMode};
use crate::model::learner::{Learner, LearnerId};
use crate::model::now_epoch_ms;
use crate::model::session::{
    InvalidTransition, MiniSet, MiniSetChoice, MiniSetKind, Session, SessionAction, SessionId,
    SessionMode, SessionPatch,
};
use crate::model::word::{Word, WordId};
use crate::repo::attempt_repo::{AttemptListQuery, AttemptRepository};
use crate::repo::learner_repo::LearnerRepository;
use crate::repo::lock_repo::SessionLockRepository;
use crate::repo::session_repo::SessionRepository;
use crate::repo::store::SpellingStore;
use crate::repo::word_repo::WordRepository;
use crate::repo::RepoError;
use crate::service::assessment::{initial_estimate, refine_estimate, AssessmentEstimate};
use crate::service::contract::{
    BreakSummary, CompleteMiniSetRequest, CompleteMiniSetResponse, FinishRequest, FinishResponse,
    MissedWord, NextStep, SharedResult, SharedWordResult, StartRequest, StartResponse,
    SubmitRequest, SubmitResponse,
};
use crate::service::error::{SessionError, SessionResult};
use crate::service::selection::{diagnostic_levels, distinct_missed, pick_level_words};
use crate::service::stats::{compute_stats, LearnerStats, MOST_MISSED_LIMIT};
use log::{info, warn};
use rand::Rng;
use std::collections::HashSet;
use std::time::Instant;
use uuid::Uuid;

/// Session facade over a store, a lock table and a random source.
pub struct SessionService<S, L, R>
where
    S: SpellingStore,
    L: SessionLockRepository,
    R: Rng,
{
    store: S,
    locks: L,
    rng: R,
    config: SessionConfig,
}

impl<S, L, R> SessionService<S, L, R>
where
    S: SpellingStore,
    L: SessionLockRepository,
    R: Rng,
{
    /// Creates a service with default tunables.
    pub fn new(store: S, locks: L, rng: R) -> Self {
        Self {
            store,
            locks,
            rng,
            config: SessionConfig::default(),
        }
    }

    /// Creates a service with explicit tunables.
    pub fn with_config(store: S, locks: L, rng: R, config: SessionConfig) -> SessionResult<Self> {
        config.validate().map_err(SessionError::Validation)?;
        Ok(Self {
            store,
            locks,
            rng,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Opens a session and presents its first word.
    pub fn start(&mut self, request: &StartRequest) -> SessionResult<StartResponse> {
        let started = Instant::now();
        let result = self.start_session(request);
        log_outcome(
            "session_start",
            result.as_ref().ok().map(|response| response.session_id),
            started,
            &result,
        );
        result
    }

    /// Scores one answer and advances the session.
    pub fn submit(&mut self, request: &SubmitRequest) -> SessionResult<SubmitResponse> {
        let started = Instant::now();
        let result = self.submit_answer(request);
        log_outcome("session_submit", Some(request.session_id), started, &result);
        if let Ok(response) = &result {
            info!(
                "event=session_submit_scored module=session session_id={} correct={} next_step={:?}",
                request.session_id, response.correct, response.next_step
            );
        }
        result
    }

    /// Leaves a break with the learner's branch choice.
    pub fn complete_miniset(
        &mut self,
        request: &CompleteMiniSetRequest,
    ) -> SessionResult<CompleteMiniSetResponse> {
        let started = Instant::now();
        let result = self.with_session_lock(request.session_id, |service| {
            service.begin_next_miniset(request.session_id, request.action)
        });
        log_outcome(
            "session_continue",
            Some(request.session_id),
            started,
            &result,
        );
        result
    }

    /// Closes the session. Idempotent once `Complete`.
    pub fn finish(&mut self, request: &FinishRequest) -> SessionResult<FinishResponse> {
        let started = Instant::now();
        let result = self.finish_session(request.session_id);
        log_outcome("session_finish", Some(request.session_id), started, &result);
        result
    }

    /// Read-only result of a finished session.
    pub fn get_shared_result(&self, session_id: SessionId) -> SessionResult<SharedResult> {
        let session = self.load_session(session_id)?;
        if !session.is_complete() {
            return Err(SessionError::StateConflict(format!(
                "session {session_id} is not complete"
            )));
        }

        let attempts = self
            .store
            .attempts()
            .list_attempts(&AttemptListQuery::for_session(session_id))?;
        let level_end = session.level_end.unwrap_or(session.current_level);
        let accuracy = if session.attempts_total == 0 {
            0.0
        } else {
            session.correct_total as f64 / session.attempts_total as f64
        };

        Ok(SharedResult {
            session_id,
            mode: session.mode,
            attempts_total: session.attempts_total,
            correct_total: session.correct_total,
            accuracy,
            mini_sets_completed: session.minisets_completed,
            level_start: session.level_start,
            level_end,
            percentile: level_to_percentile_midpoint(level_end),
            started_at: session.started_at,
            ended_at: session.ended_at,
            words: attempts
                .into_iter()
                .map(|attempt| SharedWordResult {
                    word: attempt.word,
                    correct: attempt.correct,
                })
                .collect(),
        })
    }

    /// Sets a learner's level explicitly and resets the rating to its anchor.
    pub fn override_learner_level(
        &self,
        learner_id: LearnerId,
        level: u32,
    ) -> SessionResult<Learner> {
        let max_level = self.max_level()?;
        check_level(level, max_level)?;

        self.store.in_transaction(|store| -> SessionResult<()> {
            let learner = store
                .learners()
                .get_learner(learner_id)?
                .ok_or(SessionError::NotFound {
                    entity: "learner",
                    id: learner_id,
                })?;
            store.learners().set_learner_level(learner_id, level)?;
            store.learners().set_learner_rating(
                learner_id,
                level_to_base_elo(level),
                learner.total_attempts,
                learner.successful_attempts,
            )?;
            Ok(())
        })?;

        info!(
            "event=learner_level_override module=session status=ok learner_id={learner_id} level={level}"
        );
        self.load_learner(learner_id)
    }

    /// Applies an assessment session's suggested level to its learner.
    ///
    /// Only the refined estimate counts: the diagnostic mini-set must be done.
    pub fn apply_assessment(&self, session_id: SessionId) -> SessionResult<Learner> {
        let session = self.load_session(session_id)?;
        if session.mode != SessionMode::Assessment {
            return Err(SessionError::StateConflict(format!(
                "session {session_id} is not an assessment"
            )));
        }
        if session.minisets_completed == 0 {
            return Err(SessionError::StateConflict(format!(
                "session {session_id} has not finished its diagnostic words"
            )));
        }
        let suggested = session.assessment_suggested_level.ok_or_else(|| {
            SessionError::StateConflict(format!("session {session_id} has no assessment estimate"))
        })?;
        self.override_learner_level(session.learner_id, suggested)
    }

    /// Progress summary recomputed from the learner's attempt history.
    pub fn learner_stats(&self, learner_id: LearnerId) -> SessionResult<LearnerStats> {
        let learner = self.load_learner(learner_id)?;
        let attempts = self
            .store
            .attempts()
            .list_attempts(&AttemptListQuery::for_learner(learner_id))?;
        Ok(compute_stats(&learner, &attempts, MOST_MISSED_LIMIT))
    }

    fn start_session(&mut self, request: &StartRequest) -> SessionResult<StartResponse> {
        let mode = resolve_mode(request)?;
        let learner = self.load_learner(request.learner_id)?;
        let max_level = self.max_level()?;
        let level = clamp_level(learner.level, max_level);

        let (kind, words) = self.initial_words(request, mode, learner.id, level, max_level)?;
        let first_word = words
            .first()
            .cloned()
            .ok_or(SessionError::NoWordsAvailable { level: Some(level) })?;
        let estimate = (mode == SessionMode::Assessment)
            .then(|| initial_estimate(learner.rating, max_level, self.config.assessment_headroom));

        let now = now_epoch_ms();
        let mut session = Session::new(learner.id, mode, level, now);
        if request.word_ids.is_none() {
            session.list_id = request.list_id;
        }
        let session_id = session.id;
        let miniset = MiniSet {
            session_id,
            ordinal: 0,
            level,
            kind,
            word_ids: words.iter().map(|word| word.id).collect(),
            created_at: now,
        };
        let patch = SessionPatch {
            state: Some(session.state.transition(SessionAction::Start)?),
            assessment_suggested_level: estimate.map(|value| value.suggested_level),
            assessment_max_level: estimate.map(|value| value.max_level),
            ..SessionPatch::default()
        };

        self.with_session_lock(session_id, |service| {
            service.store.in_transaction(|store| -> SessionResult<()> {
                store.sessions().create_session(&session)?;
                store.sessions().append_miniset(&miniset)?;
                store.sessions().update_session(session_id, &patch)?;
                Ok(())
            })
        })?;

        let prompt = build_prompt(&first_word, level, &self.config.prompt, &mut self.rng);
        Ok(StartResponse {
            session_id,
            mode,
            current_word: first_word,
            current_prompt: prompt,
            word_index: 0,
            level,
            miniset_size: miniset.word_ids.len(),
            assessment_suggested_level: patch.assessment_suggested_level,
            assessment_max_level: patch.assessment_max_level,
        })
    }

    fn submit_answer(&mut self, request: &SubmitRequest) -> SessionResult<SubmitResponse> {
        let input_mode = request
            .input_mode
            .as_deref()
            .map(InputMode::parse)
            .transpose()?;
        let spelling_chars = request.user_spelling.trim().chars().count();
        if spelling_chars > self.config.max_spelling_chars {
            return Err(SessionError::Validation(format!(
                "userSpelling has {spelling_chars} characters, limit is {}",
                self.config.max_spelling_chars
            )));
        }

        self.with_session_lock(request.session_id, |service| {
            service.record_answer(request, input_mode)
        })
    }

    fn record_answer(
        &mut self,
        request: &SubmitRequest,
        input_mode: Option<InputMode>,
    ) -> SessionResult<SubmitResponse> {
        let session = self.load_session(request.session_id)?;
        let answer = SessionAction::Submit {
            completes_miniset: false,
        };
        ensure_state(&session, answer)?;
        let miniset = self.load_miniset(&session, session.current_miniset)?;

        let index = session.word_index as usize;
        let current_word_id = *miniset.word_ids.get(index).ok_or_else(|| {
            SessionError::Store(RepoError::InvalidData(format!(
                "word index {index} outside mini-set {} of session {}",
                miniset.ordinal, session.id
            )))
        })?;
        if request.word_id != current_word_id {
            return Err(SessionError::StateConflict(format!(
                "word {} is not the current word of session {}",
                request.word_id, session.id
            )));
        }
        if let Some(prompt_id) = request.prompt_id {
            if self
                .store
                .attempts()
                .find_by_prompt(session.id, prompt_id)?
                .is_some()
            {
                return Err(SessionError::StateConflict(format!(
                    "prompt {prompt_id} already answered"
                )));
            }
        }

        let word = self.load_word(current_word_id)?;
        let analysis = analyze(&word.spelling, &request.user_spelling);
        let correct = analysis.is_correct();
        let completes_miniset = index + 1 >= miniset.word_ids.len();
        let next_state = session
            .state
            .transition(SessionAction::Submit { completes_miniset })?;
        let input_mode =
            input_mode.unwrap_or_else(|| self.config.prompt.input_mode_for(session.current_level));

        let estimate = if completes_miniset && miniset.kind == MiniSetKind::Diagnostic {
            let mut results = self.diagnostic_results(&session, miniset.ordinal)?;
            results.push((word.level, correct));
            refine_estimate(&results, self.max_level()?, self.config.assessment_headroom)
        } else {
            None
        };

        let rating_config = self.config.rating;
        let now = now_epoch_ms();
        let stored = self.store.in_transaction(|store| -> SessionResult<Attempt> {
            let learner = store
                .learners()
                .get_learner(session.learner_id)?
                .ok_or(SessionError::NotFound {
                    entity: "learner",
                    id: session.learner_id,
                })?;
            let rating_after = update_rating(learner.rating, correct, word.level, &rating_config);

            let attempt = Attempt {
                id: Uuid::new_v4(),
                session_id: session.id,
                learner_id: learner.id,
                miniset_ordinal: miniset.ordinal,
                word_id: word.id,
                word: word.spelling.clone(),
                user_spelling: request.user_spelling.clone(),
                correct,
                rating_before: learner.rating,
                rating_after,
                response_ms: request.response_ms,
                replay_count: request.replay_count,
                edit_count: request.edit_count,
                input_mode,
                prompt_id: request.prompt_id,
                created_at: now,
                sequence: 0,
            };
            let stored = store.attempts().append_attempt(&attempt)?;
            store.learners().set_learner_rating(
                learner.id,
                rating_after,
                learner.total_attempts + 1,
                learner.successful_attempts + u64::from(correct),
            )?;

            let mut patch = SessionPatch {
                state: Some(next_state),
                attempts_total: Some(session.attempts_total + 1),
                correct_total: Some(session.correct_total + u64::from(correct)),
                ..SessionPatch::default()
            };
            if completes_miniset {
                patch.minisets_completed = Some(session.minisets_completed + 1);
            } else {
                patch.word_index = Some(session.word_index + 1);
            }
            if let Some(estimate) = estimate {
                patch.assessment_suggested_level = Some(estimate.suggested_level);
                patch.assessment_max_level = Some(estimate.max_level);
            }
            store.sessions().update_session(session.id, &patch)?;
            Ok(stored)
        })?;

        let mut response = SubmitResponse {
            correct,
            correct_spelling: word.spelling.clone(),
            error_details: analysis.error_details(),
            attempt_id: stored.id,
            rating_before: stored.rating_before,
            rating_after: stored.rating_after,
            next_step: NextStep::NextWord,
            next_word: None,
            next_prompt: None,
            word_index: None,
            break_summary: None,
            lesson: None,
        };

        if completes_miniset {
            let attempts = self.store.attempts().list_attempts(&AttemptListQuery {
                session_id: Some(session.id),
                miniset_ordinal: Some(miniset.ordinal),
                ..AttemptListQuery::default()
            })?;
            let (summary, lesson) = summarize_miniset(&miniset, &attempts, estimate);
            response.next_step = NextStep::Break;
            response.break_summary = Some(summary);
            response.lesson = lesson;
        } else {
            let next_word_id = miniset.word_ids.get(index + 1).copied().ok_or_else(|| {
                SessionError::Store(RepoError::InvalidData(format!(
                    "mini-set {} of session {} ended early",
                    miniset.ordinal, session.id
                )))
            })?;
            let next_word = self.load_word(next_word_id)?;
            let prompt = build_prompt(
                &next_word,
                session.current_level,
                &self.config.prompt,
                &mut self.rng,
            );
            response.next_word = Some(next_word);
            response.next_prompt = Some(prompt);
            response.word_index = Some(session.word_index + 1);
        }
        Ok(response)
    }

    fn begin_next_miniset(
        &mut self,
        session_id: SessionId,
        choice: MiniSetChoice,
    ) -> SessionResult<CompleteMiniSetResponse> {
        let session = self.load_session(session_id)?;
        ensure_state(&session, SessionAction::ContinueMiniSet)?;
        let max_level = self.max_level()?;
        let current_level = clamp_level(session.current_level, max_level);

        let (kind, level, words) = match choice {
            MiniSetChoice::ChallengeJump => {
                let level = (current_level + 1).min(max_level);
                let words = self.level_words(session.learner_id, level)?;
                (MiniSetKind::from(choice), level, words)
            }
            MiniSetChoice::PracticeMissed => {
                let missed = self.missed_in_miniset(&session)?;
                if missed.is_empty() {
                    let words = self.continue_words(&session, current_level)?;
                    (MiniSetKind::Continue, current_level, words)
                } else {
                    (MiniSetKind::from(choice), current_level, missed)
                }
            }
            MiniSetChoice::Continue => {
                let words = self.continue_words(&session, current_level)?;
                (MiniSetKind::from(choice), current_level, words)
            }
        };

        let first_word = words
            .first()
            .cloned()
            .ok_or(SessionError::NoWordsAvailable { level: Some(level) })?;
        let next_state = session.state.transition(SessionAction::ContinueMiniSet)?;
        let ordinal = session.current_miniset + 1;
        let miniset = MiniSet {
            session_id,
            ordinal,
            level,
            kind,
            word_ids: words.iter().map(|word| word.id).collect(),
            created_at: now_epoch_ms(),
        };
        let patch = SessionPatch {
            state: Some(next_state),
            current_miniset: Some(ordinal),
            word_index: Some(0),
            current_level: Some(level),
            ..SessionPatch::default()
        };

        self.store.in_transaction(|store| -> SessionResult<()> {
            store.learners().set_learner_level(session.learner_id, level)?;
            store.sessions().append_miniset(&miniset)?;
            store.sessions().update_session(session_id, &patch)?;
            Ok(())
        })?;

        let prompt = build_prompt(&first_word, level, &self.config.prompt, &mut self.rng);
        Ok(CompleteMiniSetResponse {
            current_word: first_word,
            current_prompt: prompt,
            word_index: 0,
            level,
            kind,
        })
    }

    fn finish_session(&mut self, session_id: SessionId) -> SessionResult<FinishResponse> {
        let session = self.load_session(session_id)?;
        if session.is_complete() {
            return Ok(finish_response(&session));
        }
        self.with_session_lock(session_id, |service| service.close_session(session_id))
    }

    fn close_session(&mut self, session_id: SessionId) -> SessionResult<FinishResponse> {
        let session = self.load_session(session_id)?;
        if session.is_complete() {
            return Ok(finish_response(&session));
        }
        let next_state = session.state.transition(SessionAction::Finish)?;
        let learner = self.load_learner(session.learner_id)?;

        let attempts = self
            .store
            .attempts()
            .list_attempts(&AttemptListQuery::for_session(session_id))?;
        let attempts_total = attempts.len() as u64;
        let correct_total = attempts.iter().filter(|attempt| attempt.correct).count() as u64;
        if attempts_total != session.attempts_total || correct_total != session.correct_total {
            warn!(
                "event=session_totals_mismatch module=session session_id={session_id} stored_total={} history_total={attempts_total}",
                session.attempts_total
            );
        }

        let patch = SessionPatch {
            state: Some(next_state),
            attempts_total: Some(attempts_total),
            correct_total: Some(correct_total),
            level_end: Some(learner.level),
            ended_at: Some(now_epoch_ms()),
            ..SessionPatch::default()
        };
        self.store.sessions().update_session(session_id, &patch)?;

        Ok(FinishResponse {
            session_id,
            attempts_total,
            correct_total,
            mini_sets_completed: session.minisets_completed,
            level_end: learner.level,
        })
    }

    fn initial_words(
        &mut self,
        request: &StartRequest,
        mode: SessionMode,
        learner_id: LearnerId,
        level: u32,
        max_level: u32,
    ) -> SessionResult<(MiniSetKind, Vec<Word>)> {
        let size = self.config.miniset_size;
        if let Some(word_ids) = &request.word_ids {
            let mut seen = HashSet::new();
            let mut words = Vec::new();
            for word_id in word_ids.iter().filter(|id| seen.insert(**id)).take(size) {
                words.push(self.load_word(*word_id)?);
            }
            return Ok((MiniSetKind::Initial, words));
        }

        if let Some(list_id) = request.list_id {
            let words = self.store.words().get_words_by_list(list_id)?;
            if words.is_empty() {
                return Err(SessionError::Validation(format!(
                    "word list {list_id} is empty"
                )));
            }
            return Ok((
                MiniSetKind::Initial,
                words.into_iter().take(size).collect(),
            ));
        }

        match mode {
            SessionMode::Assessment => {
                Ok((MiniSetKind::Diagnostic, self.diagnostic_words(max_level)?))
            }
            SessionMode::Review => {
                let missed = self.review_words(learner_id)?;
                if missed.is_empty() {
                    Ok((MiniSetKind::Initial, self.level_words(learner_id, level)?))
                } else {
                    Ok((MiniSetKind::Initial, missed))
                }
            }
            SessionMode::Practice => {
                Ok((MiniSetKind::Initial, self.level_words(learner_id, level)?))
            }
        }
    }

    fn continue_words(&mut self, session: &Session, level: u32) -> SessionResult<Vec<Word>> {
        if let Some(list_id) = session.list_id {
            let used: HashSet<WordId> = self
                .store
                .sessions()
                .list_minisets(session.id)?
                .into_iter()
                .flat_map(|miniset| miniset.word_ids)
                .collect();
            let remaining: Vec<Word> = self
                .store
                .words()
                .get_words_by_list(list_id)?
                .into_iter()
                .filter(|word| !used.contains(&word.id))
                .take(self.config.miniset_size)
                .collect();
            if !remaining.is_empty() {
                return Ok(remaining);
            }
        }

        if session.mode == SessionMode::Review {
            let missed = self.review_words(session.learner_id)?;
            if !missed.is_empty() {
                return Ok(missed);
            }
        }
        self.level_words(session.learner_id, level)
    }

    fn level_words(&mut self, learner_id: LearnerId, level: u32) -> SessionResult<Vec<Word>> {
        let candidates = self.store.words().get_words_by_level(level)?;
        if candidates.is_empty() {
            return Err(SessionError::NoWordsAvailable { level: Some(level) });
        }
        let recent: HashSet<WordId> = self
            .store
            .attempts()
            .list_attempts(&AttemptListQuery {
                learner_id: Some(learner_id),
                limit: Some(self.config.recent_window),
                newest_first: true,
                ..AttemptListQuery::default()
            })?
            .into_iter()
            .map(|attempt| attempt.word_id)
            .collect();
        Ok(pick_level_words(
            candidates,
            &recent,
            self.config.miniset_size,
            &mut self.rng,
        ))
    }

    fn review_words(&self, learner_id: LearnerId) -> SessionResult<Vec<Word>> {
        let missed = self.store.attempts().list_attempts(&AttemptListQuery {
            learner_id: Some(learner_id),
            correct: Some(false),
            limit: Some(self.config.review_window),
            newest_first: true,
            ..AttemptListQuery::default()
        })?;
        distinct_missed(&missed, self.config.miniset_size)
            .into_iter()
            .map(|word_id| self.load_word(word_id))
            .collect()
    }

    fn diagnostic_words(&mut self, max_level: u32) -> SessionResult<Vec<Word>> {
        let no_recent = HashSet::new();
        let mut words = Vec::new();
        for level in diagnostic_levels(max_level, self.config.miniset_size) {
            let candidates = self.store.words().get_words_by_level(level)?;
            words.extend(pick_level_words(candidates, &no_recent, 1, &mut self.rng));
        }
        if words.is_empty() {
            return Err(SessionError::NoWordsAvailable { level: None });
        }
        Ok(words)
    }

    fn missed_in_miniset(&self, session: &Session) -> SessionResult<Vec<Word>> {
        let attempts = self.store.attempts().list_attempts(&AttemptListQuery {
            session_id: Some(session.id),
            miniset_ordinal: Some(session.current_miniset),
            ..AttemptListQuery::default()
        })?;
        distinct_missed(&attempts, self.config.miniset_size)
            .into_iter()
            .map(|word_id| self.load_word(word_id))
            .collect()
    }

    fn diagnostic_results(
        &self,
        session: &Session,
        ordinal: u32,
    ) -> SessionResult<Vec<(u32, bool)>> {
        let attempts = self.store.attempts().list_attempts(&AttemptListQuery {
            session_id: Some(session.id),
            miniset_ordinal: Some(ordinal),
            ..AttemptListQuery::default()
        })?;
        attempts
            .iter()
            .map(|attempt| {
                self.load_word(attempt.word_id)
                    .map(|word| (word.level, attempt.correct))
            })
            .collect()
    }

    fn with_session_lock<T, F>(&mut self, session_id: SessionId, work: F) -> SessionResult<T>
    where
        F: FnOnce(&mut Self) -> SessionResult<T>,
    {
        let grant = self.locks.acquire(session_id, self.config.lock_ttl)?;
        let token = match grant.token {
            Some(token) if grant.acquired => token,
            _ => return Err(SessionError::LockNotAcquired { session_id }),
        };

        let result = work(&mut *self);

        match self.locks.release(session_id, token) {
            Ok(true) => {}
            Ok(false) => warn!(
                "event=lock_release module=session status=expired session_id={session_id}"
            ),
            Err(err) => warn!(
                "event=lock_release module=session status=error session_id={session_id} error={err}"
            ),
        }
        result
    }

    fn load_session(&self, session_id: SessionId) -> SessionResult<Session> {
        self.store
            .sessions()
            .get_session(session_id)?
            .ok_or(SessionError::NotFound {
                entity: "session",
                id: session_id,
            })
    }

    fn load_learner(&self, learner_id: LearnerId) -> SessionResult<Learner> {
        self.store
            .learners()
            .get_learner(learner_id)?
            .ok_or(SessionError::NotFound {
                entity: "learner",
                id: learner_id,
            })
    }

    fn load_word(&self, word_id: WordId) -> SessionResult<Word> {
        self.store
            .words()
            .get_word(word_id)?
            .ok_or(SessionError::NotFound {
                entity: "word",
                id: word_id,
            })
    }

    fn load_miniset(&self, session: &Session, ordinal: u32) -> SessionResult<MiniSet> {
        self.store
            .sessions()
            .get_miniset(session.id, ordinal)?
            .ok_or_else(|| {
                SessionError::Store(RepoError::InvalidData(format!(
                    "session {} is missing mini-set {ordinal}",
                    session.id
                )))
            })
    }

    fn max_level(&self) -> SessionResult<u32> {
        self.store
            .words()
            .get_max_level()?
            .ok_or(SessionError::NoWordsAvailable { level: None })
    }
}

fn resolve_mode(request: &StartRequest) -> SessionResult<SessionMode> {
    if let Some(word_ids) = &request.word_ids {
        if word_ids.is_empty() {
            return Err(SessionError::Validation(
                "wordIds must not be empty".to_string(),
            ));
        }
    }

    let mode = match (request.assessment, request.mode) {
        (true, None | Some(SessionMode::Assessment)) => SessionMode::Assessment,
        (true, Some(other)) => {
            return Err(SessionError::Validation(format!(
                "assessment cannot be combined with mode `{}`",
                other.as_str()
            )))
        }
        (false, mode) => mode.unwrap_or_default(),
    };

    if mode == SessionMode::Assessment
        && (request.word_ids.is_some() || request.list_id.is_some())
    {
        return Err(SessionError::Validation(
            "assessment sessions choose their own words".to_string(),
        ));
    }
    Ok(mode)
}

fn ensure_state(session: &Session, action: SessionAction) -> SessionResult<()> {
    if action.required_states().contains(&session.state) {
        Ok(())
    } else {
        Err(InvalidTransition {
            from: session.state,
            action,
        }
        .into())
    }
}

fn finish_response(session: &Session) -> FinishResponse {
    FinishResponse {
        session_id: session.id,
        attempts_total: session.attempts_total,
        correct_total: session.correct_total,
        mini_sets_completed: session.minisets_completed,
        level_end: session.level_end.unwrap_or(session.current_level),
    }
}

fn summarize_miniset(
    miniset: &MiniSet,
    attempts: &[Attempt],
    assessment: Option<AssessmentEstimate>,
) -> (BreakSummary, Option<Lesson>) {
    let mut correct_words = Vec::new();
    let mut missed_words = Vec::new();
    let mut missed_analyses: Vec<SpellingAnalysis> = Vec::new();

    for attempt in attempts {
        if attempt.correct {
            correct_words.push(attempt.word.clone());
        } else {
            missed_words.push(MissedWord {
                word_id: attempt.word_id,
                word: attempt.word.clone(),
                user_spelling: attempt.user_spelling.clone(),
            });
            missed_analyses.push(analyze(&attempt.word, &attempt.user_spelling));
        }
    }

    let summary = BreakSummary {
        miniset_ordinal: miniset.ordinal,
        level: miniset.level,
        kind: miniset.kind,
        word_count: attempts.len() as u32,
        correct_count: correct_words.len() as u32,
        correct_words,
        missed_words,
        assessment,
    };
    (summary, lesson_for(&missed_analyses))
}

fn log_outcome<T>(
    event: &str,
    session_id: Option<SessionId>,
    started: Instant,
    result: &SessionResult<T>,
) {
    let duration_ms = started.elapsed().as_millis();
    let session = session_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());
    match result {
        Ok(_) => info!(
            "event={event} module=session status=ok session_id={session} duration_ms={duration_ms}"
        ),
        Err(err) => warn!(
            "event={event} module=session status=error session_id={session} duration_ms={duration_ms} error_code={} retryable={}",
            err.code(),
            err.is_retryable()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{ensure_state, resolve_mode};
    use crate::model::session::{Session, SessionAction, SessionMode, SessionState};
    use crate::service::contract::StartRequest;
    use crate::service::error::ErrorKind;
    use uuid::Uuid;

    #[test]
    fn resolve_mode_defaults_to_practice() {
        let request = StartRequest::practice(Uuid::new_v4());
        assert_eq!(resolve_mode(&request).unwrap(), SessionMode::Practice);
    }

    #[test]
    fn resolve_mode_rejects_conflicting_flags() {
        let mut request = StartRequest::assessment(Uuid::new_v4());
        request.mode = Some(SessionMode::Review);
        assert_eq!(
            resolve_mode(&request).unwrap_err().kind(),
            ErrorKind::Validation
        );

        let mut request = StartRequest::assessment(Uuid::new_v4());
        request.word_ids = Some(vec![Uuid::new_v4()]);
        assert_eq!(
            resolve_mode(&request).unwrap_err().kind(),
            ErrorKind::Validation
        );

        let mut request = StartRequest::practice(Uuid::new_v4());
        request.word_ids = Some(Vec::new());
        assert_eq!(
            resolve_mode(&request).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn ensure_state_rejects_submit_during_break() {
        let mut session = Session::new(Uuid::new_v4(), SessionMode::Practice, 1, 0);
        session.state = SessionState::Break;
        let answer = SessionAction::Submit {
            completes_miniset: false,
        };
        let err = ensure_state(&session, answer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert!(ensure_state(&session, SessionAction::Finish).is_ok());
    }
}
