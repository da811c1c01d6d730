//! Aggregate store handed to the session service.
//!
//! # Responsibility
//! - Group the word, learner, session and attempt repositories behind one
//!   handle.
//! - Provide the atomic unit used for multi-row writes (attempt + learner
//!   rating + session patch).
//!
//! # Invariants
//! - Work run through `in_transaction` either commits entirely or leaves the
//!   store untouched.

use crate::repo::attempt_repo::{AttemptRepository, SqliteAttemptRepository};
use crate::repo::learner_repo::{LearnerRepository, SqliteLearnerRepository};
use crate::repo::run_atomic;
use crate::repo::session_repo::{SessionRepository, SqliteSessionRepository};
use crate::repo::word_repo::{SqliteWordRepository, WordRepository};
use crate::repo::RepoError;
use rusqlite::Connection;

/// Store contract consumed by the session state machine.
pub trait SpellingStore {
    type Words: WordRepository;
    type Learners: LearnerRepository;
    type Sessions: SessionRepository;
    type Attempts: AttemptRepository;

    fn words(&self) -> &Self::Words;
    fn learners(&self) -> &Self::Learners;
    fn sessions(&self) -> &Self::Sessions;
    fn attempts(&self) -> &Self::Attempts;

    /// Runs `work` atomically; any `Err` rolls every write back.
    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<RepoError>,
        F: FnOnce(&Self) -> Result<T, E>;
}

/// SQLite implementation over one connection.
pub struct SqliteSpellingStore<'conn> {
    conn: &'conn Connection,
    words: SqliteWordRepository<'conn>,
    learners: SqliteLearnerRepository<'conn>,
    sessions: SqliteSessionRepository<'conn>,
    attempts: SqliteAttemptRepository<'conn>,
}

impl<'conn> SqliteSpellingStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            words: SqliteWordRepository::new(conn),
            learners: SqliteLearnerRepository::new(conn),
            sessions: SqliteSessionRepository::new(conn),
            attempts: SqliteAttemptRepository::new(conn),
        }
    }
}

impl<'conn> SpellingStore for SqliteSpellingStore<'conn> {
    type Words = SqliteWordRepository<'conn>;
    type Learners = SqliteLearnerRepository<'conn>;
    type Sessions = SqliteSessionRepository<'conn>;
    type Attempts = SqliteAttemptRepository<'conn>;

    fn words(&self) -> &Self::Words {
        &self.words
    }

    fn learners(&self) -> &Self::Learners {
        &self.learners
    }

    fn sessions(&self) -> &Self::Sessions {
        &self.sessions
    }

    fn attempts(&self) -> &Self::Attempts {
        &self.attempts
    }

    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<RepoError>,
        F: FnOnce(&Self) -> Result<T, E>,
    {
        run_atomic(self.conn, || work(self))
    }
}
