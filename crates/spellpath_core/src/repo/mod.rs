//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the read/write contracts the session machine needs from the
//!   word, learner, session, attempt and lock stores.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod attempt_repo;
pub mod learner_repo;
pub mod lock_repo;
pub mod session_repo;
pub mod store;
pub mod word_repo;

use crate::db::DbError;
use crate::model::learner::LearnerValidationError;
use crate::model::word::WordValidationError;
use log::warn;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    InvalidWord(WordValidationError),
    InvalidLearner(LearnerValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: Uuid },
    /// Uniqueness conflict, e.g. a replayed prompt id.
    Conflict(String),
    InvalidData(String),
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidWord(err) => write!(f, "{err}"),
            Self::InvalidLearner(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidWord(err) => Some(err),
            Self::InvalidLearner(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::Conflict(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<WordValidationError> for RepoError {
    fn from(value: WordValidationError) -> Self {
        Self::InvalidWord(value)
    }
}

impl From<LearnerValidationError> for RepoError {
    fn from(value: LearnerValidationError) -> Self {
        Self::InvalidLearner(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_u32(value: i64, column: &str) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("value {value} out of range in {column}")))
}

pub(crate) fn parse_u64(value: i64, column: &str) -> RepoResult<u64> {
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative value {value} in {column}")))
}

pub(crate) fn parse_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

/// Converts a UNIQUE violation into `Conflict`, passing other errors through.
pub(crate) fn map_unique_violation(
    err: rusqlite::Error,
    message: impl FnOnce() -> String,
) -> RepoError {
    let db_error = DbError::Sqlite(err);
    if db_error.is_unique_violation() {
        RepoError::Conflict(message())
    } else {
        RepoError::Db(db_error)
    }
}

/// Runs `work` as one atomic unit on `conn`.
///
/// Opens `BEGIN IMMEDIATE` when no transaction is active, so the write lock
/// is taken before the first read. Inside an outer transaction a savepoint is
/// used instead. Any error rolls the unit back.
pub(crate) fn run_atomic<T, E, F>(conn: &Connection, work: F) -> Result<T, E>
where
    E: From<RepoError>,
    F: FnOnce() -> Result<T, E>,
{
    let nested = !conn.is_autocommit();
    let (begin, commit, rollback) = if nested {
        (
            "SAVEPOINT spellpath_unit;",
            "RELEASE spellpath_unit;",
            "ROLLBACK TO spellpath_unit; RELEASE spellpath_unit;",
        )
    } else {
        ("BEGIN IMMEDIATE;", "COMMIT;", "ROLLBACK;")
    };

    conn.execute_batch(begin).map_err(RepoError::from)?;
    match work() {
        Ok(value) => {
            if let Err(err) = conn.execute_batch(commit) {
                rollback_quietly(conn, rollback);
                return Err(RepoError::from(err).into());
            }
            Ok(value)
        }
        Err(err) => {
            rollback_quietly(conn, rollback);
            Err(err)
        }
    }
}

fn rollback_quietly(conn: &Connection, rollback: &str) {
    if let Err(err) = conn.execute_batch(rollback) {
        warn!("event=db_rollback module=repo status=error error={err}");
    }
}
