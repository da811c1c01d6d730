//! Spelling diff analyzer.
//!
//! # Responsibility
//! - Align a learner submission against the target spelling.
//! - Produce an ordered edit script (submission -> target) and a mistake
//!   classification derived only from that script.
//! - Project the script into letter-by-letter feedback marks.
//!
//! # Invariants
//! - `apply_edit_script(normalized_submission, edits) == target` for every
//!   analysis this module returns.
//! - A single adjacent swap is reported as one `Transpose` op, never as two
//!   substitutions.
//! - Generic scripts are minimal (Levenshtein); on equal cost, substitution
//!   wins over delete+insert and edits land at the earliest position.
//! - Correct answers have an empty script.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One step of the submission -> target script.
///
/// `position` is the target index where the op's output lands. For `Delete`
/// it is the target index the extra letter sits in front of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOp {
    Keep { position: usize, letter: char },
    /// Target letter missing from the submission.
    Insert { position: usize, letter: char },
    /// Extra submitted letter.
    Delete { position: usize, letter: char },
    Substitute {
        position: usize,
        typed: char,
        expected: char,
    },
    /// Submitted `first, second` where the target has `second, first` at
    /// `position, position + 1`.
    Transpose {
        position: usize,
        first: char,
        second: char,
    },
}

impl EditOp {
    pub fn is_edit(&self) -> bool {
        !matches!(self, Self::Keep { .. })
    }

    pub fn position(&self) -> usize {
        match *self {
            Self::Keep { position, .. }
            | Self::Insert { position, .. }
            | Self::Delete { position, .. }
            | Self::Substitute { position, .. }
            | Self::Transpose { position, .. } => position,
        }
    }

    fn mistake_kind(&self) -> Option<MistakeKind> {
        match self {
            Self::Keep { .. } => None,
            Self::Insert { .. } => Some(MistakeKind::Omission),
            Self::Delete { .. } => Some(MistakeKind::Insertion),
            Self::Substitute { .. } => Some(MistakeKind::Substitution),
            Self::Transpose { .. } => Some(MistakeKind::Transposition),
        }
    }
}

/// Classification of a submission, named from the learner's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MistakeKind {
    Correct,
    /// Learner left out one letter.
    Omission,
    /// Learner added one extra letter.
    Insertion,
    Substitution,
    Transposition,
    Multiple,
}

/// Summary derived solely from an edit script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeSummary {
    pub kind: MistakeKind,
    /// Most frequent single-edit kind; `Correct` when there are no edits.
    pub dominant: MistakeKind,
    pub edit_distance: usize,
    /// Target positions touched by edits, in script order.
    pub positions: Vec<usize>,
}

impl MistakeSummary {
    pub fn from_script(edits: &[EditOp]) -> Self {
        let kinds: Vec<MistakeKind> = edits.iter().filter_map(EditOp::mistake_kind).collect();
        let positions = edits
            .iter()
            .filter(|op| op.is_edit())
            .map(EditOp::position)
            .collect();

        let kind = match kinds.as_slice() {
            [] => MistakeKind::Correct,
            [single] => *single,
            _ => MistakeKind::Multiple,
        };

        Self {
            kind,
            dominant: dominant_kind(&kinds),
            edit_distance: kinds.len(),
            positions,
        }
    }

    pub fn is_correct(&self) -> bool {
        self.kind == MistakeKind::Correct
    }
}

// Ties go to the kind that appears first in the script.
fn dominant_kind(kinds: &[MistakeKind]) -> MistakeKind {
    let mut best = MistakeKind::Correct;
    let mut best_count = 0;
    for candidate in kinds {
        let count = kinds.iter().filter(|kind| *kind == candidate).count();
        if count > best_count {
            best = *candidate;
            best_count = count;
        }
    }
    best
}

/// Letter-level feedback mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mark", rename_all = "snake_case")]
pub enum LetterMark {
    Correct { position: usize, letter: char },
    Wrong {
        position: usize,
        expected: char,
        typed: char,
    },
    Missing { position: usize, expected: char },
    Swapped { position: usize, expected: char },
    /// Extra typed letter in front of target `position`.
    Extra { position: usize, typed: char },
}

/// Structured feedback returned to callers with every submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    pub summary: MistakeSummary,
    pub edits: Vec<EditOp>,
    pub letters: Vec<LetterMark>,
}

/// Result of comparing one submission with its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellingAnalysis {
    pub target: String,
    pub normalized_submission: String,
    pub edits: Vec<EditOp>,
    pub summary: MistakeSummary,
}

impl SpellingAnalysis {
    pub fn is_correct(&self) -> bool {
        self.summary.is_correct()
    }

    /// Per-letter marks over the target, with extra letters interleaved.
    pub fn letter_marks(&self) -> Vec<LetterMark> {
        if self.edits.is_empty() {
            return self
                .target
                .chars()
                .enumerate()
                .map(|(position, letter)| LetterMark::Correct { position, letter })
                .collect();
        }

        let mut marks = Vec::with_capacity(self.edits.len() + 1);
        for op in &self.edits {
            match *op {
                EditOp::Keep { position, letter } => {
                    marks.push(LetterMark::Correct { position, letter })
                }
                EditOp::Insert { position, letter } => marks.push(LetterMark::Missing {
                    position,
                    expected: letter,
                }),
                EditOp::Delete { position, letter } => marks.push(LetterMark::Extra {
                    position,
                    typed: letter,
                }),
                EditOp::Substitute {
                    position,
                    typed,
                    expected,
                } => marks.push(LetterMark::Wrong {
                    position,
                    expected,
                    typed,
                }),
                EditOp::Transpose {
                    position,
                    first,
                    second,
                } => {
                    marks.push(LetterMark::Swapped {
                        position,
                        expected: second,
                    });
                    marks.push(LetterMark::Swapped {
                        position: position + 1,
                        expected: first,
                    });
                }
            }
        }
        marks
    }

    pub fn error_details(&self) -> ErrorDetails {
        ErrorDetails {
            summary: self.summary.clone(),
            edits: self.edits.clone(),
            letters: self.letter_marks(),
        }
    }
}

/// Edit script that does not reproduce the expected input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditScriptError {
    /// Op expected `expected` at submission index `index`.
    Mismatch {
        index: usize,
        expected: char,
        found: Option<char>,
    },
    /// Submission letters left over after the last op.
    TrailingInput { consumed: usize, total: usize },
}

impl Display for EditScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "edit script expected `{expected}` at index {index}, found {found:?}"
            ),
            Self::TrailingInput { consumed, total } => {
                write!(f, "edit script consumed {consumed} of {total} letters")
            }
        }
    }
}

impl Error for EditScriptError {}

/// Trims, lowercases and folds typographic apostrophes.
pub fn normalize_spelling(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|ch| match ch {
            '\u{2019}' | '\u{2018}' | '\u{02BC}' => '\'',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Compares `submission` against `target`.
pub fn analyze(target: &str, submission: &str) -> SpellingAnalysis {
    let target = normalize_spelling(target);
    let normalized_submission = normalize_spelling(submission);
    let target_chars: Vec<char> = target.chars().collect();
    let typed_chars: Vec<char> = normalized_submission.chars().collect();

    let edits = if target_chars == typed_chars {
        Vec::new()
    } else if let Some(position) = adjacent_swap_position(&typed_chars, &target_chars) {
        transposition_script(&typed_chars, position)
    } else {
        levenshtein_script(&typed_chars, &target_chars)
    };

    let summary = MistakeSummary::from_script(&edits);
    SpellingAnalysis {
        target,
        normalized_submission,
        edits,
        summary,
    }
}

/// Replays `edits` over `submission`, returning the produced string.
pub fn apply_edit_script(submission: &str, edits: &[EditOp]) -> Result<String, EditScriptError> {
    let typed: Vec<char> = submission.chars().collect();
    if edits.is_empty() {
        return Ok(submission.to_string());
    }

    let mut output = String::with_capacity(typed.len() + 2);
    let mut cursor = 0;
    for op in edits {
        match *op {
            EditOp::Keep { letter, .. } => {
                expect_at(&typed, cursor, letter)?;
                output.push(letter);
                cursor += 1;
            }
            EditOp::Insert { letter, .. } => output.push(letter),
            EditOp::Delete { letter, .. } => {
                expect_at(&typed, cursor, letter)?;
                cursor += 1;
            }
            EditOp::Substitute {
                typed: typed_letter,
                expected,
                ..
            } => {
                expect_at(&typed, cursor, typed_letter)?;
                output.push(expected);
                cursor += 1;
            }
            EditOp::Transpose { first, second, .. } => {
                expect_at(&typed, cursor, first)?;
                expect_at(&typed, cursor + 1, second)?;
                output.push(second);
                output.push(first);
                cursor += 2;
            }
        }
    }

    if cursor != typed.len() {
        return Err(EditScriptError::TrailingInput {
            consumed: cursor,
            total: typed.len(),
        });
    }
    Ok(output)
}

fn expect_at(typed: &[char], index: usize, expected: char) -> Result<(), EditScriptError> {
    let found = typed.get(index).copied();
    if found == Some(expected) {
        Ok(())
    } else {
        Err(EditScriptError::Mismatch {
            index,
            expected,
            found,
        })
    }
}

/// Index `i` when `typed` equals `target` except `typed[i..=i+1]` swapped.
fn adjacent_swap_position(typed: &[char], target: &[char]) -> Option<usize> {
    if typed.len() != target.len() || typed.len() < 2 {
        return None;
    }
    let first_diff = typed.iter().zip(target).position(|(a, b)| a != b)?;
    let next = first_diff + 1;
    if next >= typed.len() {
        return None;
    }
    let swapped = typed[first_diff] == target[next] && typed[next] == target[first_diff];
    if swapped && typed[next + 1..] == target[next + 1..] {
        Some(first_diff)
    } else {
        None
    }
}

fn transposition_script(typed: &[char], position: usize) -> Vec<EditOp> {
    let mut edits = Vec::with_capacity(typed.len() - 1);
    let mut index = 0;
    while index < typed.len() {
        if index == position {
            edits.push(EditOp::Transpose {
                position,
                first: typed[index],
                second: typed[index + 1],
            });
            index += 2;
        } else {
            edits.push(EditOp::Keep {
                position: index,
                letter: typed[index],
            });
            index += 1;
        }
    }
    edits
}

fn levenshtein_script(typed: &[char], target: &[char]) -> Vec<EditOp> {
    let rows = typed.len() + 1;
    let cols = target.len() + 1;
    let mut cost = vec![vec![0usize; cols]; rows];
    for (i, row) in cost.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..cols {
        cost[0][j] = j;
    }
    for i in 1..rows {
        for j in 1..cols {
            let diagonal = cost[i - 1][j - 1] + usize::from(typed[i - 1] != target[j - 1]);
            let delete = cost[i - 1][j] + 1;
            let insert = cost[i][j - 1] + 1;
            cost[i][j] = diagonal.min(delete).min(insert);
        }
    }

    // Walking back from the end and taking the diagonal whenever it is optimal
    // pushes the remaining edits toward the start of the word.
    let mut edits = Vec::with_capacity(rows.max(cols));
    let (mut i, mut j) = (typed.len(), target.len());
    while i > 0 || j > 0 {
        let current = cost[i][j];
        if i > 0 && j > 0 && typed[i - 1] == target[j - 1] && current == cost[i - 1][j - 1] {
            edits.push(EditOp::Keep {
                position: j - 1,
                letter: target[j - 1],
            });
            i -= 1;
            j -= 1;
        } else if i > 0 && j > 0 && current == cost[i - 1][j - 1] + 1 {
            edits.push(EditOp::Substitute {
                position: j - 1,
                typed: typed[i - 1],
                expected: target[j - 1],
            });
            i -= 1;
            j -= 1;
        } else if i > 0 && current == cost[i - 1][j] + 1 {
            edits.push(EditOp::Delete {
                position: j,
                letter: typed[i - 1],
            });
            i -= 1;
        } else {
            edits.push(EditOp::Insert {
                position: j - 1,
                letter: target[j - 1],
            });
            j -= 1;
        }
    }
    edits.reverse();
    edits
}
