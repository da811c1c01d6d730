//! Per-word prompt generator.
//!
//! # Responsibility
//! - Choose the input modality for a word at a given level.
//! - Build the shuffled letter tray for tap-letters mode.
//!
//! # Invariants
//! - Stateless: every call draws a fresh prompt id and a fresh tray from the
//!   injected random source.
//! - The tray always contains the target's letters as a sub-multiset.
//! - The tray ordering is a uniform random permutation (Fisher-Yates).

use crate::model::attempt::InputMode;
use crate::model::word::Word;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::{Builder, Uuid};

pub const DEFAULT_TRAY_SIZE: usize = 10;
pub const DEFAULT_TAP_LETTERS_MAX_LEVEL: u32 = 1;

const FILLER_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Modality and tray policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPolicy {
    /// Levels at or below this use tap-letters input.
    pub tap_letters_max_level: u32,
    pub tray_size: usize,
}

impl Default for PromptPolicy {
    fn default() -> Self {
        Self {
            tap_letters_max_level: DEFAULT_TAP_LETTERS_MAX_LEVEL,
            tray_size: DEFAULT_TRAY_SIZE,
        }
    }
}

impl PromptPolicy {
    pub fn input_mode_for(&self, level: u32) -> InputMode {
        if level <= self.tap_letters_max_level {
            InputMode::TapLetters
        } else {
            InputMode::Typed
        }
    }
}

/// Presentation of one word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub prompt_id: Uuid,
    pub input_mode: InputMode,
    pub target_length: usize,
    /// Present only for tap-letters mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter_tray: Option<Vec<char>>,
}

/// Builds the prompt for `word` shown at `level`.
pub fn build_prompt<R: Rng + ?Sized>(
    word: &Word,
    level: u32,
    policy: &PromptPolicy,
    rng: &mut R,
) -> Prompt {
    let prompt_id = Builder::from_random_bytes(rng.gen()).into_uuid();
    let input_mode = policy.input_mode_for(level);
    let letter_tray = match input_mode {
        InputMode::TapLetters => Some(build_letter_tray(&word.spelling, policy.tray_size, rng)),
        InputMode::Typed => None,
    };

    Prompt {
        prompt_id,
        input_mode,
        target_length: word.len(),
        letter_tray,
    }
}

/// Target letters plus uniform filler up to `tray_size`, shuffled.
///
/// Targets longer than `tray_size` get a tray of exactly their own letters.
pub fn build_letter_tray<R: Rng + ?Sized>(
    target: &str,
    tray_size: usize,
    rng: &mut R,
) -> Vec<char> {
    let mut tray: Vec<char> = target.chars().collect();
    while tray.len() < tray_size {
        let index = rng.gen_range(0..FILLER_ALPHABET.len());
        tray.push(char::from(FILLER_ALPHABET[index]));
    }
    tray.shuffle(rng);
    tray
}

/// Whether `tray` holds enough copies of every character of `target`.
pub fn tray_can_spell(tray: &[char], target: &str) -> bool {
    let mut remaining = tray.to_vec();
    for ch in target.chars() {
        match remaining.iter().position(|candidate| *candidate == ch) {
            Some(index) => {
                remaining.swap_remove(index);
            }
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn level_one_uses_tap_letters_and_higher_levels_type() {
        let policy = PromptPolicy::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let word = Word::new("cat", 1);

        let prompt = build_prompt(&word, 1, &policy, &mut rng);
        assert_eq!(prompt.input_mode, InputMode::TapLetters);
        assert_eq!(prompt.target_length, 3);
        assert_eq!(
            prompt.letter_tray.as_ref().map(Vec::len),
            Some(DEFAULT_TRAY_SIZE)
        );

        let prompt = build_prompt(&word, 2, &policy, &mut rng);
        assert_eq!(prompt.input_mode, InputMode::Typed);
        assert!(prompt.letter_tray.is_none());
    }

    #[test]
    fn tray_contains_repeated_letters() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for target in ["balloon", "committee", "mississippi", "a", "don't", "x-ray"] {
            for _ in 0..50 {
                let tray = build_letter_tray(target, DEFAULT_TRAY_SIZE, &mut rng);
                assert!(tray.len() >= DEFAULT_TRAY_SIZE.max(target.len()));
                assert!(tray_can_spell(&tray, target), "{target}: {tray:?}");
            }
        }
    }

    #[test]
    fn long_word_tray_is_exactly_its_letters() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let tray = build_letter_tray("encyclopedia", 10, &mut rng);
        let mut sorted_tray = tray.clone();
        sorted_tray.sort_unstable();
        let mut sorted_target: Vec<char> = "encyclopedia".chars().collect();
        sorted_target.sort_unstable();
        assert_eq!(sorted_tray, sorted_target);
    }

    #[test]
    fn seeded_source_gives_reproducible_trays() {
        let word = Word::new("ship", 1);
        let policy = PromptPolicy::default();
        let first = build_prompt(&word, 1, &policy, &mut ChaCha8Rng::seed_from_u64(99));
        let second = build_prompt(&word, 1, &policy, &mut ChaCha8Rng::seed_from_u64(99));
        assert_eq!(first, second);
    }

    #[test]
    fn consecutive_calls_draw_new_prompts() {
        let word = Word::new("ship", 1);
        let policy = PromptPolicy::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let first = build_prompt(&word, 1, &policy, &mut rng);
        let second = build_prompt(&word, 1, &policy, &mut rng);
        assert_ne!(first.prompt_id, second.prompt_id);
    }

    #[test]
    fn shuffle_places_first_letter_everywhere() {
        // Two-letter tray: both orderings must show up over many draws.
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut seen_front = false;
        let mut seen_back = false;
        for _ in 0..200 {
            let tray = build_letter_tray("ab", 2, &mut rng);
            if tray[0] == 'a' {
                seen_front = true;
            } else {
                seen_back = true;
            }
        }
        assert!(seen_front && seen_back);
    }
}
