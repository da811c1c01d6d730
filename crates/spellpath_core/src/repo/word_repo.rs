//! Word store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Serve words by id, by level, and by custom list.
//! - Report the highest level present, which bounds every level in core.
//!
//! # Invariants
//! - Words are validated before insert and never updated afterwards.
//! - Level queries return a stable order (`spelling ASC, id ASC`) so seeded
//!   selection is reproducible.
//! - List queries preserve list order.

use crate::model::word::{Word, WordId, WordList, WordListId};
use crate::repo::{map_unique_violation, parse_u32, parse_uuid, run_atomic, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const WORD_SELECT_SQL: &str = "SELECT
    words.id,
    words.spelling,
    words.level,
    words.definition,
    words.example_sentence
FROM words";

/// Read/write contract of the word store.
pub trait WordRepository {
    fn create_word(&self, word: &Word) -> RepoResult<WordId>;
    fn get_word(&self, id: WordId) -> RepoResult<Option<Word>>;
    fn get_words_by_level(&self, level: u32) -> RepoResult<Vec<Word>>;
    /// Highest level present; `None` when the store has no words.
    fn get_max_level(&self) -> RepoResult<Option<u32>>;
    fn create_word_list(&self, list: &WordList) -> RepoResult<WordListId>;
    /// Member words in list order; `NotFound` when the list does not exist.
    fn get_words_by_list(&self, list_id: WordListId) -> RepoResult<Vec<Word>>;
}

/// SQLite-backed word repository.
pub struct SqliteWordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteWordRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl WordRepository for SqliteWordRepository<'_> {
    fn create_word(&self, word: &Word) -> RepoResult<WordId> {
        word.validate()?;

        self.conn
            .execute(
                "INSERT INTO words (id, spelling, level, definition, example_sentence)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    word.id.to_string(),
                    word.spelling.as_str(),
                    word.level,
                    word.definition.as_deref(),
                    word.example_sentence.as_deref(),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || format!("word {} already exists", word.id))
            })?;

        Ok(word.id)
    }

    fn get_word(&self, id: WordId) -> RepoResult<Option<Word>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{WORD_SELECT_SQL} WHERE words.id = ?1;"))?;
        let row = stmt
            .query_row([id.to_string()], |row| Ok(read_word_row(row)))
            .optional()?;
        row.transpose()
    }

    fn get_words_by_level(&self, level: u32) -> RepoResult<Vec<Word>> {
        let mut stmt = self.conn.prepare(&format!(
            "{WORD_SELECT_SQL} WHERE words.level = ?1 ORDER BY words.spelling ASC, words.id ASC;"
        ))?;
        let mut rows = stmt.query([level])?;
        let mut words = Vec::new();
        while let Some(row) = rows.next()? {
            words.push(read_word_row(row)?);
        }
        Ok(words)
    }

    fn get_max_level(&self) -> RepoResult<Option<u32>> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(level) FROM words;", [], |row| row.get(0))?;
        max.map(|value| parse_u32(value, "words.level")).transpose()
    }

    fn create_word_list(&self, list: &WordList) -> RepoResult<WordListId> {
        if list.name.trim().is_empty() {
            return Err(RepoError::InvalidData(
                "word list name must not be empty".to_string(),
            ));
        }

        run_atomic(self.conn, || -> RepoResult<()> {
            self.conn
                .execute(
                    "INSERT INTO word_lists (id, owner_ref, name) VALUES (?1, ?2, ?3);",
                    params![
                        list.id.to_string(),
                        list.owner_ref.as_str(),
                        list.name.as_str(),
                    ],
                )
                .map_err(|err| {
                    map_unique_violation(err, || format!("word list {} already exists", list.id))
                })?;

            let mut insert = self.conn.prepare(
                "INSERT INTO word_list_items (list_id, position, word_id) VALUES (?1, ?2, ?3);",
            )?;
            let list_id = list.id.to_string();
            for (position, word_id) in list.word_ids.iter().enumerate() {
                if self.get_word(*word_id)?.is_none() {
                    return Err(RepoError::not_found("word", *word_id));
                }
                insert.execute(params![list_id, position as i64, word_id.to_string()])?;
            }
            Ok(())
        })?;

        Ok(list.id)
    }

    fn get_words_by_list(&self, list_id: WordListId) -> RepoResult<Vec<Word>> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM word_lists WHERE id = ?1);",
            [list_id.to_string()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(RepoError::not_found("word list", list_id));
        }

        let mut stmt = self.conn.prepare(&format!(
            "{WORD_SELECT_SQL}
             INNER JOIN word_list_items ON word_list_items.word_id = words.id
             WHERE word_list_items.list_id = ?1
             ORDER BY word_list_items.position ASC;"
        ))?;
        let mut rows = stmt.query([list_id.to_string()])?;
        let mut words = Vec::new();
        while let Some(row) = rows.next()? {
            words.push(read_word_row(row)?);
        }
        Ok(words)
    }
}

fn read_word_row(row: &Row<'_>) -> RepoResult<Word> {
    let id_text: String = row.get(0)?;
    let word = Word {
        id: parse_uuid(&id_text, "words.id")?,
        spelling: row.get(1)?,
        level: parse_u32(row.get(2)?, "words.level")?,
        definition: row.get(3)?,
        example_sentence: row.get(4)?,
    };
    word.validate()?;
    Ok(word)
}
