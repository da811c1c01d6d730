//! Session and mini-set store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist session rows and apply narrow patches to them.
//! - Persist the ordered mini-sets of a session.
//!
//! # Invariants
//! - Patches touch only the columns they set.
//! - Completed sessions reject every update (enforced by a schema trigger).
//! - Mini-set ordinals are unique per session and never rewritten.

use crate::model::session::{
    MiniSet, MiniSetKind, Session, SessionId, SessionMode, SessionPatch, SessionState,
};
use crate::model::word::WordId;
use crate::repo::{map_unique_violation, parse_u32, parse_u64, parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const SESSION_SELECT_SQL: &str = "SELECT
    id,
    learner_id,
    mode,
    list_id,
    state,
    current_miniset,
    word_index,
    current_level,
    attempts_total,
    correct_total,
    minisets_completed,
    level_start,
    level_end,
    assessment_suggested_level,
    assessment_max_level,
    started_at,
    ended_at
FROM sessions";

/// Read/write contract of the session store.
pub trait SessionRepository {
    fn create_session(&self, session: &Session) -> RepoResult<SessionId>;
    fn get_session(&self, id: SessionId) -> RepoResult<Option<Session>>;
    fn update_session(&self, id: SessionId, patch: &SessionPatch) -> RepoResult<()>;
    fn append_miniset(&self, miniset: &MiniSet) -> RepoResult<()>;
    fn get_miniset(&self, session_id: SessionId, ordinal: u32) -> RepoResult<Option<MiniSet>>;
    fn list_minisets(&self, session_id: SessionId) -> RepoResult<Vec<MiniSet>>;
}

/// SQLite-backed session repository.
pub struct SqliteSessionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSessionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SessionRepository for SqliteSessionRepository<'_> {
    fn create_session(&self, session: &Session) -> RepoResult<SessionId> {
        self.conn
            .execute(
                "INSERT INTO sessions (
                    id,
                    learner_id,
                    mode,
                    list_id,
                    state,
                    current_miniset,
                    word_index,
                    current_level,
                    attempts_total,
                    correct_total,
                    minisets_completed,
                    level_start,
                    level_end,
                    assessment_suggested_level,
                    assessment_max_level,
                    started_at,
                    ended_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17);",
                params![
                    session.id.to_string(),
                    session.learner_id.to_string(),
                    session.mode.as_str(),
                    session.list_id.map(|id| id.to_string()),
                    session.state.as_str(),
                    session.current_miniset,
                    session.word_index,
                    session.current_level,
                    count_to_sql(session.attempts_total)?,
                    count_to_sql(session.correct_total)?,
                    session.minisets_completed,
                    session.level_start,
                    session.level_end,
                    session.assessment_suggested_level,
                    session.assessment_max_level,
                    session.started_at,
                    session.ended_at,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || format!("session {} already exists", session.id))
            })?;

        Ok(session.id)
    }

    fn get_session(&self, id: SessionId) -> RepoResult<Option<Session>> {
        let row = self
            .conn
            .query_row(
                &format!("{SESSION_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(read_session_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn update_session(&self, id: SessionId, patch: &SessionPatch) -> RepoResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut assignments: Vec<&str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();
        let mut set = |column: &'static str, value: Value| {
            assignments.push(column);
            bind_values.push(value);
        };

        if let Some(state) = patch.state {
            set("state = ?", Value::Text(state.as_str().to_string()));
        }
        if let Some(value) = patch.current_miniset {
            set("current_miniset = ?", Value::Integer(i64::from(value)));
        }
        if let Some(value) = patch.word_index {
            set("word_index = ?", Value::Integer(i64::from(value)));
        }
        if let Some(value) = patch.current_level {
            set("current_level = ?", Value::Integer(i64::from(value)));
        }
        if let Some(value) = patch.attempts_total {
            set("attempts_total = ?", Value::Integer(count_to_sql(value)?));
        }
        if let Some(value) = patch.correct_total {
            set("correct_total = ?", Value::Integer(count_to_sql(value)?));
        }
        if let Some(value) = patch.minisets_completed {
            set("minisets_completed = ?", Value::Integer(i64::from(value)));
        }
        if let Some(value) = patch.level_end {
            set("level_end = ?", Value::Integer(i64::from(value)));
        }
        if let Some(value) = patch.assessment_suggested_level {
            set(
                "assessment_suggested_level = ?",
                Value::Integer(i64::from(value)),
            );
        }
        if let Some(value) = patch.assessment_max_level {
            set("assessment_max_level = ?", Value::Integer(i64::from(value)));
        }
        if let Some(value) = patch.ended_at {
            set("ended_at = ?", Value::Integer(value));
        }

        let sql = format!(
            "UPDATE sessions SET {}, updated_at = (strftime('%s', 'now') * 1000) WHERE id = ?;",
            assignments.join(", ")
        );
        bind_values.push(Value::Text(id.to_string()));

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(RepoError::not_found("session", id));
        }
        Ok(())
    }

    fn append_miniset(&self, miniset: &MiniSet) -> RepoResult<()> {
        if miniset.word_ids.is_empty() {
            return Err(RepoError::InvalidData(
                "mini-set must contain at least one word".to_string(),
            ));
        }
        let word_ids = serde_json::to_string(&miniset.word_ids)
            .map_err(|err| RepoError::InvalidData(format!("mini-set word ids: {err}")))?;

        self.conn
            .execute(
                "INSERT INTO session_minisets (session_id, ordinal, level, kind, word_ids, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    miniset.session_id.to_string(),
                    miniset.ordinal,
                    miniset.level,
                    miniset.kind.as_str(),
                    word_ids,
                    miniset.created_at,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || {
                    format!(
                        "mini-set {} of session {} already exists",
                        miniset.ordinal, miniset.session_id
                    )
                })
            })?;
        Ok(())
    }

    fn get_miniset(&self, session_id: SessionId, ordinal: u32) -> RepoResult<Option<MiniSet>> {
        let row = self
            .conn
            .query_row(
                "SELECT session_id, ordinal, level, kind, word_ids, created_at
                 FROM session_minisets
                 WHERE session_id = ?1 AND ordinal = ?2;",
                params![session_id.to_string(), ordinal],
                |row| Ok(read_miniset_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn list_minisets(&self, session_id: SessionId) -> RepoResult<Vec<MiniSet>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, ordinal, level, kind, word_ids, created_at
             FROM session_minisets
             WHERE session_id = ?1
             ORDER BY ordinal ASC;",
        )?;
        let mut rows = stmt.query([session_id.to_string()])?;
        let mut minisets = Vec::new();
        while let Some(row) = rows.next()? {
            minisets.push(read_miniset_row(row)?);
        }
        Ok(minisets)
    }
}

fn count_to_sql(value: u64) -> RepoResult<i64> {
    i64::try_from(value).map_err(|_| RepoError::InvalidData(format!("counter {value} overflows")))
}

fn optional_u32(value: Option<i64>, column: &str) -> RepoResult<Option<u32>> {
    value.map(|value| parse_u32(value, column)).transpose()
}

fn read_session_row(row: &Row<'_>) -> RepoResult<Session> {
    let id_text: String = row.get("id")?;
    let learner_text: String = row.get("learner_id")?;
    let mode_text: String = row.get("mode")?;
    let state_text: String = row.get("state")?;
    let list_id = match row.get::<_, Option<String>>("list_id")? {
        Some(value) => Some(parse_uuid(&value, "sessions.list_id")?),
        None => None,
    };

    Ok(Session {
        id: parse_uuid(&id_text, "sessions.id")?,
        learner_id: parse_uuid(&learner_text, "sessions.learner_id")?,
        mode: SessionMode::parse(&mode_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid session mode `{mode_text}` in sessions.mode"
            ))
        })?,
        list_id,
        state: SessionState::parse(&state_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid session state `{state_text}` in sessions.state"
            ))
        })?,
        current_miniset: parse_u32(row.get("current_miniset")?, "sessions.current_miniset")?,
        word_index: parse_u32(row.get("word_index")?, "sessions.word_index")?,
        current_level: parse_u32(row.get("current_level")?, "sessions.current_level")?,
        attempts_total: parse_u64(row.get("attempts_total")?, "sessions.attempts_total")?,
        correct_total: parse_u64(row.get("correct_total")?, "sessions.correct_total")?,
        minisets_completed: parse_u32(
            row.get("minisets_completed")?,
            "sessions.minisets_completed",
        )?,
        level_start: parse_u32(row.get("level_start")?, "sessions.level_start")?,
        level_end: optional_u32(row.get("level_end")?, "sessions.level_end")?,
        assessment_suggested_level: optional_u32(
            row.get("assessment_suggested_level")?,
            "sessions.assessment_suggested_level",
        )?,
        assessment_max_level: optional_u32(
            row.get("assessment_max_level")?,
            "sessions.assessment_max_level",
        )?,
        started_at: row.get("started_at")?,
        ended_at: row.get("ended_at")?,
    })
}

fn read_miniset_row(row: &Row<'_>) -> RepoResult<MiniSet> {
    let session_text: String = row.get("session_id")?;
    let kind_text: String = row.get("kind")?;
    let word_ids_text: String = row.get("word_ids")?;
    let word_ids: Vec<WordId> = serde_json::from_str(&word_ids_text).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid word id list in session_minisets.word_ids: {err}"
        ))
    })?;

    Ok(MiniSet {
        session_id: parse_uuid(&session_text, "session_minisets.session_id")?,
        ordinal: parse_u32(row.get("ordinal")?, "session_minisets.ordinal")?,
        level: parse_u32(row.get("level")?, "session_minisets.level")?,
        kind: MiniSetKind::parse(&kind_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid mini-set kind `{kind_text}` in session_minisets.kind"
            ))
        })?,
        word_ids,
        created_at: row.get("created_at")?,
    })
}
