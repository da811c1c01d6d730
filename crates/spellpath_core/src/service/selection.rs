//! Word selection helpers for new mini-sets.
//!
//! # Invariants
//! - All randomness comes from the caller's `Rng`; identical candidate order
//!   and seed give identical picks.
//! - Recently seen words are used only to fill a set that fresh words cannot.

use crate::model::attempt::Attempt;
use crate::model::word::{Word, WordId};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Picks up to `size` words, preferring ones outside `recent`.
pub fn pick_level_words<R: Rng + ?Sized>(
    candidates: Vec<Word>,
    recent: &HashSet<WordId>,
    size: usize,
    rng: &mut R,
) -> Vec<Word> {
    let (mut fresh, mut seen): (Vec<Word>, Vec<Word>) = candidates
        .into_iter()
        .partition(|word| !recent.contains(&word.id));

    fresh.shuffle(rng);
    if fresh.len() >= size {
        fresh.truncate(size);
        return fresh;
    }

    seen.shuffle(rng);
    let missing = size - fresh.len();
    fresh.extend(seen.into_iter().take(missing));
    fresh
}

/// Evenly spaced levels across `[1, max_level]`, at most `count` of them.
///
/// Always includes level 1 and `max_level` when `count >= 2`.
pub fn diagnostic_levels(max_level: u32, count: usize) -> Vec<u32> {
    if max_level == 0 || count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![1];
    }
    if u64::from(max_level) <= count as u64 {
        return (1..=max_level).collect();
    }

    let span = u64::from(max_level - 1);
    let steps = (count - 1) as u64;
    let mut levels: Vec<u32> = (0..count as u64)
        .map(|k| 1 + ((k * span + steps / 2) / steps) as u32)
        .collect();
    levels.dedup();
    levels
}

/// Distinct word ids of incorrect attempts, first occurrence order.
pub fn distinct_missed(attempts: &[Attempt], limit: usize) -> Vec<WordId> {
    let mut seen = HashSet::new();
    attempts
        .iter()
        .filter(|attempt| !attempt.correct)
        .map(|attempt| attempt.word_id)
        .filter(|word_id| seen.insert(*word_id))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn words(spellings: &[&str]) -> Vec<Word> {
        spellings.iter().map(|s| Word::new(*s, 2)).collect()
    }

    #[test]
    fn prefers_words_outside_recent_window() {
        let pool = words(&["cat", "dog", "sun", "hat", "map", "pen", "cup"]);
        let recent: HashSet<WordId> = pool[..2].iter().map(|word| word.id).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let picked = pick_level_words(pool, &recent, 5, &mut rng);
        assert_eq!(picked.len(), 5);
        assert!(picked.iter().all(|word| !recent.contains(&word.id)));
    }

    #[test]
    fn fills_from_recent_when_fresh_words_run_out() {
        let pool = words(&["cat", "dog", "sun"]);
        let recent: HashSet<WordId> = pool[..2].iter().map(|word| word.id).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let picked = pick_level_words(pool.clone(), &recent, 5, &mut rng);
        assert_eq!(picked.len(), 3);
        assert_eq!(picked[0].id, pool[2].id);
    }

    #[test]
    fn same_seed_same_pick() {
        let pool = words(&["cat", "dog", "sun", "hat", "map", "pen", "cup"]);
        let empty = HashSet::new();
        let first = pick_level_words(pool.clone(), &empty, 3, &mut ChaCha8Rng::seed_from_u64(3));
        let second = pick_level_words(pool, &empty, 3, &mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(first, second);
    }

    #[test]
    fn diagnostic_levels_span_the_range() {
        assert_eq!(diagnostic_levels(10, 5), vec![1, 3, 6, 8, 10]);
        assert_eq!(diagnostic_levels(3, 5), vec![1, 2, 3]);
        assert_eq!(diagnostic_levels(7, 1), vec![1]);
        assert!(diagnostic_levels(0, 5).is_empty());
    }
}
