//! Session tunables.
//!
//! Defaults: mini-set of 5 words, K-factor 24, base rating 1500, 30 s lock
//! TTL, tap-letters at level 1 with a 10-letter tray.

use crate::engine::prompt::PromptPolicy;
use crate::engine::rating::RatingConfig;
use crate::repo::lock_repo::DEFAULT_LOCK_TTL;
use std::time::Duration;

pub const DEFAULT_MINISET_SIZE: usize = 5;
pub const DEFAULT_RECENT_WINDOW: u32 = 20;
pub const DEFAULT_REVIEW_WINDOW: u32 = 50;
pub const DEFAULT_ASSESSMENT_HEADROOM: u32 = 2;
pub const DEFAULT_MAX_SPELLING_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub miniset_size: usize,
    /// Most recent attempts whose words are avoided when picking a mini-set.
    pub recent_window: u32,
    /// Most recent attempts scanned for missed words in review mode.
    pub review_window: u32,
    pub lock_ttl: Duration,
    /// Levels above the suggested level exposed as the assessment maximum.
    pub assessment_headroom: u32,
    /// Upper bound on a submitted spelling, after trimming.
    pub max_spelling_chars: usize,
    pub prompt: PromptPolicy,
    pub rating: RatingConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            miniset_size: DEFAULT_MINISET_SIZE,
            recent_window: DEFAULT_RECENT_WINDOW,
            review_window: DEFAULT_REVIEW_WINDOW,
            lock_ttl: DEFAULT_LOCK_TTL,
            assessment_headroom: DEFAULT_ASSESSMENT_HEADROOM,
            max_spelling_chars: DEFAULT_MAX_SPELLING_CHARS,
            prompt: PromptPolicy::default(),
            rating: RatingConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Rejects configurations the session machine cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.miniset_size == 0 {
            return Err("miniset_size must be >= 1".to_string());
        }
        if self.lock_ttl.is_zero() {
            return Err("lock_ttl must be positive".to_string());
        }
        if self.prompt.tray_size == 0 {
            return Err("prompt.tray_size must be >= 1".to_string());
        }
        if !(self.rating.k_factor.is_finite() && self.rating.k_factor > 0.0) {
            return Err("rating.k_factor must be a positive number".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SessionConfig;
    use std::time::Duration;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.miniset_size, 5);
        assert_eq!(config.rating.k_factor, 24.0);
        assert_eq!(config.lock_ttl, Duration::from_secs(30));
    }

    #[test]
    fn zero_sized_miniset_is_rejected() {
        let config = SessionConfig {
            miniset_size: 0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
