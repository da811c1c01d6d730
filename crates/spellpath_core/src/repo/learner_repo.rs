//! Learner store contracts and SQLite implementation.
//!
//! # Invariants
//! - Level and rating writes are narrow patch operations; there is no
//!   whole-record update path.
//! - Writes to unknown learners return `NotFound`, never silently no-op.

use crate::model::learner::{Learner, LearnerId, LearnerValidationError};
use crate::repo::{map_unique_violation, parse_u32, parse_u64, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Read/write contract of the learner store.
pub trait LearnerRepository {
    fn create_learner(&self, learner: &Learner) -> RepoResult<LearnerId>;
    fn get_learner(&self, id: LearnerId) -> RepoResult<Option<Learner>>;
    fn set_learner_level(&self, id: LearnerId, level: u32) -> RepoResult<()>;
    fn set_learner_rating(
        &self,
        id: LearnerId,
        rating: f64,
        total_attempts: u64,
        successful_attempts: u64,
    ) -> RepoResult<()>;
}

/// SQLite-backed learner repository.
pub struct SqliteLearnerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLearnerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LearnerRepository for SqliteLearnerRepository<'_> {
    fn create_learner(&self, learner: &Learner) -> RepoResult<LearnerId> {
        learner.validate()?;

        self.conn
            .execute(
                "INSERT INTO learners (
                    id,
                    owner_ref,
                    display_name,
                    level,
                    rating,
                    total_attempts,
                    successful_attempts
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    learner.id.to_string(),
                    learner.owner_ref.as_str(),
                    learner.display_name.as_str(),
                    learner.level,
                    learner.rating,
                    to_sql_count(learner.total_attempts)?,
                    to_sql_count(learner.successful_attempts)?,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || format!("learner {} already exists", learner.id))
            })?;

        Ok(learner.id)
    }

    fn get_learner(&self, id: LearnerId) -> RepoResult<Option<Learner>> {
        let row = self
            .conn
            .query_row(
                "SELECT
                    id,
                    owner_ref,
                    display_name,
                    level,
                    rating,
                    total_attempts,
                    successful_attempts
                 FROM learners
                 WHERE id = ?1;",
                [id.to_string()],
                |row| Ok(read_learner_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn set_learner_level(&self, id: LearnerId, level: u32) -> RepoResult<()> {
        if level == 0 {
            return Err(LearnerValidationError::InvalidLevel(level).into());
        }
        let changed = self.conn.execute(
            "UPDATE learners
             SET level = ?1, updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?2;",
            params![level, id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("learner", id));
        }
        Ok(())
    }

    fn set_learner_rating(
        &self,
        id: LearnerId,
        rating: f64,
        total_attempts: u64,
        successful_attempts: u64,
    ) -> RepoResult<()> {
        if !rating.is_finite() {
            return Err(LearnerValidationError::NonFiniteRating.into());
        }
        if successful_attempts > total_attempts {
            return Err(LearnerValidationError::CountersOutOfOrder {
                total: total_attempts,
                successful: successful_attempts,
            }
            .into());
        }
        let changed = self.conn.execute(
            "UPDATE learners
             SET
                rating = ?1,
                total_attempts = ?2,
                successful_attempts = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?4;",
            params![
                rating,
                to_sql_count(total_attempts)?,
                to_sql_count(successful_attempts)?,
                id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("learner", id));
        }
        Ok(())
    }
}

fn to_sql_count(value: u64) -> RepoResult<i64> {
    i64::try_from(value).map_err(|_| RepoError::InvalidData(format!("counter {value} overflows")))
}

fn read_learner_row(row: &Row<'_>) -> RepoResult<Learner> {
    let id_text: String = row.get("id")?;
    let learner = Learner {
        id: parse_uuid(&id_text, "learners.id")?,
        owner_ref: row.get("owner_ref")?,
        display_name: row.get("display_name")?,
        level: parse_u32(row.get("level")?, "learners.level")?,
        rating: row.get("rating")?,
        total_attempts: parse_u64(row.get("total_attempts")?, "learners.total_attempts")?,
        successful_attempts: parse_u64(
            row.get("successful_attempts")?,
            "learners.successful_attempts",
        )?,
    };
    learner
        .validate()
        .map_err(|err| RepoError::InvalidData(err.to_string()))?;
    Ok(learner)
}
