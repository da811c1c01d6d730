//! Core engine for SpellPath adaptive spelling practice.
//! This crate is the single source of truth for session, rating and
//! feedback invariants.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use api::{dispatch, handle_json, ActionEnvelope, ActionRequest};
pub use config::SessionConfig;
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings};
pub use model::attempt::{Attempt, InputMode};
pub use model::learner::{Learner, LearnerId};
pub use model::session::{MiniSetChoice, Session, SessionId, SessionMode, SessionState};
pub use model::word::{Word, WordId, WordList, WordListId};
pub use repo::lock_repo::{SessionLockRepository, SqliteSessionLockRepository};
pub use repo::store::{SpellingStore, SqliteSpellingStore};
pub use repo::{RepoError, RepoResult};
pub use service::error::{ErrorKind, SessionError, SessionResult};
pub use service::session_service::SessionService;

/// Minimal health-check API for integration smoke tests.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
