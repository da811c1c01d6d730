//! Per-session mutual-exclusion lock.
//!
//! # Responsibility
//! - Grant at most one live lock per session id.
//! - Reclaim locks whose expiry has passed.
//! - Release only for the holder of the matching token.
//!
//! # Invariants
//! - Acquisition is one atomic statement: insert, or on key conflict update
//!   the row only when its `expires_at` is already in the past. A caller is
//!   granted the lock iff that statement changed a row.
//! - No waiting or retry happens here; a refused caller fails its request.
//! - Lock rows are not session history and may be purged once expired.

use crate::model::now_epoch_ms;
use crate::model::session::SessionId;
use crate::repo::{parse_uuid, RepoResult};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Opaque proof of lock ownership.
pub type LockToken = Uuid;

/// Outcome of one acquire call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockGrant {
    pub acquired: bool,
    /// Present only when `acquired`.
    pub token: Option<LockToken>,
    /// Expiry of our lock when acquired, otherwise of the current holder's.
    pub expires_at: Option<i64>,
}

/// Lock service contract.
pub trait SessionLockRepository {
    fn acquire(&self, session_id: SessionId, ttl: Duration) -> RepoResult<LockGrant>;
    /// Returns whether a row owned by `token` was deleted.
    fn release(&self, session_id: SessionId, token: LockToken) -> RepoResult<bool>;
}

/// SQLite-backed lock table.
pub struct SqliteSessionLockRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSessionLockRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// `acquire` against an explicit clock reading in epoch milliseconds.
    pub fn acquire_at(
        &self,
        session_id: SessionId,
        ttl: Duration,
        now_ms: i64,
    ) -> RepoResult<LockGrant> {
        let token = Uuid::new_v4();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_ms.saturating_add(ttl_ms);

        let changed = self.conn.execute(
            "INSERT INTO session_locks (session_id, token, acquired_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET
                token = excluded.token,
                acquired_at = excluded.acquired_at,
                expires_at = excluded.expires_at
             WHERE session_locks.expires_at < excluded.acquired_at;",
            params![
                session_id.to_string(),
                token.to_string(),
                now_ms,
                expires_at,
            ],
        )?;

        if changed == 1 {
            debug!(
                "event=lock_acquire module=lock status=ok session_id={session_id} expires_at={expires_at}"
            );
            return Ok(LockGrant {
                acquired: true,
                token: Some(token),
                expires_at: Some(expires_at),
            });
        }

        let holder_expiry: Option<i64> = self
            .conn
            .query_row(
                "SELECT expires_at FROM session_locks WHERE session_id = ?1;",
                [session_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        debug!("event=lock_acquire module=lock status=busy session_id={session_id}");
        Ok(LockGrant {
            acquired: false,
            token: None,
            expires_at: holder_expiry,
        })
    }

    /// Current holder token, if any row exists.
    pub fn holder(&self, session_id: SessionId) -> RepoResult<Option<LockToken>> {
        let token: Option<String> = self
            .conn
            .query_row(
                "SELECT token FROM session_locks WHERE session_id = ?1;",
                [session_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        token
            .map(|value| parse_uuid(&value, "session_locks.token"))
            .transpose()
    }

    /// Deletes every lock that expired before `now_ms`; returns the count.
    pub fn purge_expired(&self, now_ms: i64) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM session_locks WHERE expires_at < ?1;", [now_ms])?;
        Ok(removed)
    }
}

impl SessionLockRepository for SqliteSessionLockRepository<'_> {
    fn acquire(&self, session_id: SessionId, ttl: Duration) -> RepoResult<LockGrant> {
        self.acquire_at(session_id, ttl, now_epoch_ms())
    }

    fn release(&self, session_id: SessionId, token: LockToken) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM session_locks WHERE session_id = ?1 AND token = ?2;",
            params![session_id.to_string(), token.to_string()],
        )?;
        debug!(
            "event=lock_release module=lock status={} session_id={session_id}",
            if removed == 1 { "ok" } else { "not_owner" }
        );
        Ok(removed == 1)
    }
}
