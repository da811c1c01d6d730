//! Append-only attempt store.
//!
//! # Responsibility
//! - Append attempts and hand back the stored row with its sequence.
//! - List attempts by session or learner in insertion order.
//!
//! # Invariants
//! - There is no update or delete API; schema triggers reject both.
//! - `(session_id, prompt_id)` is unique, so a replayed submission for the
//!   same prompt surfaces as `RepoError::Conflict`.

use crate::model::attempt::{Attempt, InputMode};
use crate::model::learner::LearnerId;
use crate::model::session::SessionId;
use crate::repo::{
    bool_to_int, map_unique_violation, parse_bool, parse_u32, parse_u64, parse_uuid, RepoError,
    RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

const ATTEMPT_SELECT_SQL: &str = "SELECT
    seq,
    id,
    session_id,
    learner_id,
    miniset_ordinal,
    word_id,
    word,
    user_spelling,
    correct,
    rating_before,
    rating_after,
    response_ms,
    replay_count,
    edit_count,
    input_mode,
    prompt_id,
    created_at
FROM attempts";

/// Filters for listing attempts. One of `session_id` / `learner_id` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptListQuery {
    pub session_id: Option<SessionId>,
    pub learner_id: Option<LearnerId>,
    pub miniset_ordinal: Option<u32>,
    pub correct: Option<bool>,
    pub limit: Option<u32>,
    /// Order by sequence descending instead of ascending.
    pub newest_first: bool,
}

impl AttemptListQuery {
    pub fn for_session(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            ..Self::default()
        }
    }

    pub fn for_learner(learner_id: LearnerId) -> Self {
        Self {
            learner_id: Some(learner_id),
            ..Self::default()
        }
    }
}

/// Read/append contract of the attempt store.
pub trait AttemptRepository {
    fn append_attempt(&self, attempt: &Attempt) -> RepoResult<Attempt>;
    fn list_attempts(&self, query: &AttemptListQuery) -> RepoResult<Vec<Attempt>>;
    fn find_by_prompt(&self, session_id: SessionId, prompt_id: Uuid) -> RepoResult<Option<Attempt>>;
}

/// SQLite-backed attempt repository.
pub struct SqliteAttemptRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttemptRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AttemptRepository for SqliteAttemptRepository<'_> {
    fn append_attempt(&self, attempt: &Attempt) -> RepoResult<Attempt> {
        if !attempt.rating_before.is_finite() || !attempt.rating_after.is_finite() {
            return Err(RepoError::InvalidData(
                "attempt ratings must be finite".to_string(),
            ));
        }
        let response_ms = i64::try_from(attempt.response_ms).map_err(|_| {
            RepoError::InvalidData(format!("response_ms {} overflows", attempt.response_ms))
        })?;

        self.conn
            .execute(
                "INSERT INTO attempts (
                    id,
                    session_id,
                    learner_id,
                    miniset_ordinal,
                    word_id,
                    word,
                    user_spelling,
                    correct,
                    rating_before,
                    rating_after,
                    response_ms,
                    replay_count,
                    edit_count,
                    input_mode,
                    prompt_id,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
                params![
                    attempt.id.to_string(),
                    attempt.session_id.to_string(),
                    attempt.learner_id.to_string(),
                    attempt.miniset_ordinal,
                    attempt.word_id.to_string(),
                    attempt.word.as_str(),
                    attempt.user_spelling.as_str(),
                    bool_to_int(attempt.correct),
                    attempt.rating_before,
                    attempt.rating_after,
                    response_ms,
                    attempt.replay_count,
                    attempt.edit_count,
                    attempt.input_mode.as_str(),
                    attempt.prompt_id.map(|id| id.to_string()),
                    attempt.created_at,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || match attempt.prompt_id {
                    Some(prompt_id) => format!("prompt {prompt_id} already answered"),
                    None => format!("attempt {} already exists", attempt.id),
                })
            })?;

        let mut stored = attempt.clone();
        stored.sequence = self.conn.last_insert_rowid();
        Ok(stored)
    }

    fn list_attempts(&self, query: &AttemptListQuery) -> RepoResult<Vec<Attempt>> {
        if query.session_id.is_none() && query.learner_id.is_none() {
            return Err(RepoError::InvalidData(
                "attempt listing requires a session or learner filter".to_string(),
            ));
        }

        let mut sql = format!("{ATTEMPT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(session_id) = query.session_id {
            sql.push_str(" AND session_id = ?");
            bind_values.push(Value::Text(session_id.to_string()));
        }
        if let Some(learner_id) = query.learner_id {
            sql.push_str(" AND learner_id = ?");
            bind_values.push(Value::Text(learner_id.to_string()));
        }
        if let Some(ordinal) = query.miniset_ordinal {
            sql.push_str(" AND miniset_ordinal = ?");
            bind_values.push(Value::Integer(i64::from(ordinal)));
        }
        if let Some(correct) = query.correct {
            sql.push_str(" AND correct = ?");
            bind_values.push(Value::Integer(bool_to_int(correct)));
        }

        sql.push_str(if query.newest_first {
            " ORDER BY seq DESC"
        } else {
            " ORDER BY seq ASC"
        });

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut attempts = Vec::new();
        while let Some(row) = rows.next()? {
            attempts.push(read_attempt_row(row)?);
        }
        Ok(attempts)
    }

    fn find_by_prompt(
        &self,
        session_id: SessionId,
        prompt_id: Uuid,
    ) -> RepoResult<Option<Attempt>> {
        let row = self
            .conn
            .query_row(
                &format!("{ATTEMPT_SELECT_SQL} WHERE session_id = ?1 AND prompt_id = ?2;"),
                params![session_id.to_string(), prompt_id.to_string()],
                |row| Ok(read_attempt_row(row)),
            )
            .optional()?;
        row.transpose()
    }
}

fn read_attempt_row(row: &Row<'_>) -> RepoResult<Attempt> {
    let id_text: String = row.get("id")?;
    let session_text: String = row.get("session_id")?;
    let learner_text: String = row.get("learner_id")?;
    let word_text: String = row.get("word_id")?;
    let mode_text: String = row.get("input_mode")?;
    let prompt_id = match row.get::<_, Option<String>>("prompt_id")? {
        Some(value) => Some(parse_uuid(&value, "attempts.prompt_id")?),
        None => None,
    };

    Ok(Attempt {
        id: parse_uuid(&id_text, "attempts.id")?,
        session_id: parse_uuid(&session_text, "attempts.session_id")?,
        learner_id: parse_uuid(&learner_text, "attempts.learner_id")?,
        miniset_ordinal: parse_u32(row.get("miniset_ordinal")?, "attempts.miniset_ordinal")?,
        word_id: parse_uuid(&word_text, "attempts.word_id")?,
        word: row.get("word")?,
        user_spelling: row.get("user_spelling")?,
        correct: parse_bool(row.get("correct")?, "attempts.correct")?,
        rating_before: row.get("rating_before")?,
        rating_after: row.get("rating_after")?,
        response_ms: parse_u64(row.get("response_ms")?, "attempts.response_ms")?,
        replay_count: parse_u32(row.get("replay_count")?, "attempts.replay_count")?,
        edit_count: parse_u32(row.get("edit_count")?, "attempts.edit_count")?,
        input_mode: InputMode::parse(&mode_text)
            .map_err(|err| RepoError::InvalidData(format!("{err} in attempts.input_mode")))?,
        prompt_id,
        created_at: row.get("created_at")?,
        sequence: row.get("seq")?,
    })
}
