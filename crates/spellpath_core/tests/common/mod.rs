#![allow(dead_code)]

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rusqlite::Connection;
use spellpath_core::engine::rating::level_to_base_elo;
use spellpath_core::repo::learner_repo::LearnerRepository;
use spellpath_core::repo::word_repo::WordRepository;
use spellpath_core::{
    Learner, LearnerId, SessionService, SpellingStore, SqliteSessionLockRepository,
    SqliteSpellingStore, Word,
};

pub type TestService<'conn> =
    SessionService<SqliteSpellingStore<'conn>, SqliteSessionLockRepository<'conn>, ChaCha8Rng>;

pub const LEVEL_ONE: &[&str] = &["cat", "dog", "sun", "hat", "map", "pen", "cup", "bed"];
pub const LEVEL_TWO: &[&str] = &[
    "frog", "ship", "lamp", "nest", "milk", "drum", "gift", "jump",
];
pub const LEVEL_THREE: &[&str] = &["friend", "school", "people", "because", "little", "around"];
pub const LEVEL_FOUR: &[&str] = &[
    "separate",
    "necessary",
    "beautiful",
    "different",
    "tomorrow",
];

/// Seeds four levels of words.
pub fn seed_words(conn: &Connection) -> Vec<Word> {
    let store = SqliteSpellingStore::new(conn);
    let mut words = Vec::new();
    for (level, spellings) in [LEVEL_ONE, LEVEL_TWO, LEVEL_THREE, LEVEL_FOUR]
        .iter()
        .enumerate()
    {
        for spelling in spellings.iter() {
            let word = Word::new(*spelling, level as u32 + 1);
            store.words().create_word(&word).unwrap();
            words.push(word);
        }
    }
    words
}

pub fn seed_learner(conn: &Connection, level: u32) -> LearnerId {
    let store = SqliteSpellingStore::new(conn);
    let mut learner = Learner::new("family-1", "Sam");
    learner.level = level;
    learner.rating = level_to_base_elo(level);
    store.learners().create_learner(&learner).unwrap()
}

pub fn service(conn: &Connection, seed: u64) -> TestService<'_> {
    SessionService::new(
        SqliteSpellingStore::new(conn),
        SqliteSessionLockRepository::new(conn),
        ChaCha8Rng::seed_from_u64(seed),
    )
}

/// A misspelling that is guaranteed to differ from `spelling`.
pub fn misspell(spelling: &str) -> String {
    format!("{spelling}x")
}
