//! Pure practice algorithms: rating, prompts, spelling diff and lessons.
//!
//! # Responsibility
//! - Hold every computation that does not touch the store.
//! - Take randomness as an injected `rand::Rng` so callers control seeding.

pub mod diff;
pub mod lesson;
pub mod prompt;
pub mod rating;
