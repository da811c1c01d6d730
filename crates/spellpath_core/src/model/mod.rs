//! Domain model for words, learners, sessions and attempts.
//!
//! # Responsibility
//! - Define canonical records passed between store, engine and service.
//! - Keep lifecycle rules (session transition table) next to the data.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Timestamps are Unix epoch milliseconds.

pub mod attempt;
pub mod learner;
pub mod session;
pub mod word;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall clock as Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
