//! Break-time micro-lessons keyed to mistake patterns.
//!
//! # Responsibility
//! - Map each missed word's edit script to one mistake pattern.
//! - Pick the dominant pattern across a mini-set and attach a short lesson.
//!
//! # Invariants
//! - Patterns are derived from edit scripts only.
//! - No lesson is produced when nothing was missed.

use crate::engine::diff::{EditOp, SpellingAnalysis};
use serde::{Deserialize, Serialize};

/// Mistake patterns, in tie-break priority order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MistakePattern {
    LetterOrder,
    DoubleLetter,
    VowelChoice,
    MissingLetter,
    ExtraLetter,
    WrongLetter,
}

impl MistakePattern {
    pub fn key(self) -> &'static str {
        match self {
            Self::LetterOrder => "letter_order",
            Self::DoubleLetter => "double_letter",
            Self::VowelChoice => "vowel_choice",
            Self::MissingLetter => "missing_letter",
            Self::ExtraLetter => "extra_letter",
            Self::WrongLetter => "wrong_letter",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::LetterOrder => "Watch the order",
            Self::DoubleLetter => "Double letters",
            Self::VowelChoice => "Tricky vowels",
            Self::MissingLetter => "Every sound counts",
            Self::ExtraLetter => "No extra letters",
            Self::WrongLetter => "Listen for the consonant",
        }
    }

    fn tip(self) -> &'static str {
        match self {
            Self::LetterOrder => {
                "Two letters swapped places. Say the word slowly and write each sound in order."
            }
            Self::DoubleLetter => {
                "Some words hide a double letter. Clap the syllables and listen for the repeat."
            }
            Self::VowelChoice => {
                "Vowels can sound alike. Picture the word and remember which vowel it uses."
            }
            Self::MissingLetter => {
                "A letter went missing. Stretch the word out so every sound gets a letter."
            }
            Self::ExtraLetter => {
                "An extra letter slipped in. Check each letter against the sounds you hear."
            }
            Self::WrongLetter => {
                "One letter was swapped for a similar one. Listen closely to that sound."
            }
        }
    }
}

/// Lesson shown during a break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub pattern: MistakePattern,
    pub key: String,
    pub title: String,
    pub tip: String,
    /// Missed target words that showed this pattern.
    pub words: Vec<String>,
}

fn is_vowel(letter: char) -> bool {
    matches!(letter, 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}

/// Pattern of one incorrect analysis; `None` when it was correct.
pub fn classify_pattern(analysis: &SpellingAnalysis) -> Option<MistakePattern> {
    if analysis.is_correct() {
        return None;
    }
    let target: Vec<char> = analysis.target.chars().collect();
    let letter_at = |index: Option<usize>| index.and_then(|index| target.get(index)).copied();

    let mut found = Vec::new();
    for op in analysis.edits.iter().filter(|op| op.is_edit()) {
        let pattern = match *op {
            EditOp::Transpose { .. } => MistakePattern::LetterOrder,
            EditOp::Insert { position, letter } => {
                // The missing letter repeats one of its target neighbours.
                let before = letter_at(position.checked_sub(1));
                let after = letter_at(Some(position + 1));
                if before == Some(letter) || after == Some(letter) {
                    MistakePattern::DoubleLetter
                } else {
                    MistakePattern::MissingLetter
                }
            }
            EditOp::Delete { position, letter } => {
                // The extra letter doubles the target letter next to it.
                let before = letter_at(position.checked_sub(1));
                let at = letter_at(Some(position));
                if before == Some(letter) || at == Some(letter) {
                    MistakePattern::DoubleLetter
                } else {
                    MistakePattern::ExtraLetter
                }
            }
            EditOp::Substitute { typed, expected, .. } => {
                if is_vowel(typed) && is_vowel(expected) {
                    MistakePattern::VowelChoice
                } else {
                    MistakePattern::WrongLetter
                }
            }
            EditOp::Keep { .. } => continue,
        };
        found.push(pattern);
    }
    found.into_iter().min()
}

/// Lesson for the dominant pattern over a mini-set's missed words.
pub fn lesson_for(missed: &[SpellingAnalysis]) -> Option<Lesson> {
    let classified: Vec<(MistakePattern, &str)> = missed
        .iter()
        .filter_map(|analysis| classify_pattern(analysis).map(|p| (p, analysis.target.as_str())))
        .collect();

    let mut best: Option<(MistakePattern, usize)> = None;
    for (pattern, _) in &classified {
        let count = classified.iter().filter(|(other, _)| other == pattern).count();
        best = match best {
            Some((current, current_count))
                if current_count > count || (current_count == count && current <= *pattern) =>
            {
                Some((current, current_count))
            }
            _ => Some((*pattern, count)),
        };
    }

    let (pattern, _) = best?;
    let mut words: Vec<String> = classified
        .iter()
        .filter(|(other, _)| *other == pattern)
        .map(|(_, word)| (*word).to_string())
        .collect();
    words.dedup();

    Some(Lesson {
        pattern,
        key: pattern.key().to_string(),
        title: pattern.title().to_string(),
        tip: pattern.tip().to_string(),
        words,
    })
}
