//! Command-line driver over `spellpath_core`.
//!
//! # Responsibility
//! - Seed words and learners into a database file.
//! - Run one JSON action read from stdin and print the envelope.
//!
//! # Invariants
//! - Output is JSON (or a single status line) on stdout; errors go to stderr
//!   with a non-zero exit code.

use log::info;
use serde::Deserialize;
use spellpath_core::engine::rating::level_to_base_elo;
use spellpath_core::repo::learner_repo::LearnerRepository;
use spellpath_core::repo::word_repo::WordRepository;
use spellpath_core::{
    handle_json, logging, open_db, Learner, SessionService, SpellingStore,
    SqliteSessionLockRepository, SqliteSpellingStore, Word,
};
use std::io::Read;
use std::process::ExitCode;
use uuid::Uuid;

const USAGE: &str = "usage:
  spellpath_cli ping
  spellpath_cli import-words <db> <words.json>
  spellpath_cli add-learner <db> <name> [level]
  spellpath_cli action <db>            (reads one JSON action from stdin)
  spellpath_cli stats <db> <learner-id>";

/// One entry of an import file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WordImport {
    spelling: String,
    level: u32,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    example_sentence: Option<String>,
}

fn main() -> ExitCode {
    match logging::LogSettings::from_env().and_then(|settings| match settings {
        Some(settings) => logging::init_with(settings),
        None => Ok(()),
    }) {
        Ok(()) => {}
        Err(err) => eprintln!("logging disabled: {err}"),
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<String, String> {
    let arg = |index: usize| args.get(index).map(String::as_str);
    match (arg(0), arg(1)) {
        (Some("ping"), _) => Ok(format!(
            "spellpath_core ping={} version={}",
            spellpath_core::ping(),
            spellpath_core::core_version()
        )),
        (Some("import-words"), Some(db)) => {
            let file = arg(2).ok_or(USAGE)?;
            import_words(db, file)
        }
        (Some("add-learner"), Some(db)) => {
            let name = arg(2).ok_or(USAGE)?;
            let level = match arg(3) {
                Some(raw) => raw
                    .parse::<u32>()
                    .map_err(|err| format!("invalid level `{raw}`: {err}"))?,
                None => 1,
            };
            add_learner(db, name, level)
        }
        (Some("action"), Some(db)) => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .map_err(|err| format!("failed to read stdin: {err}"))?;
            run_action(db, &input)
        }
        (Some("stats"), Some(db)) => {
            let raw = arg(2).ok_or(USAGE)?;
            let learner_id =
                Uuid::parse_str(raw).map_err(|err| format!("invalid learner id `{raw}`: {err}"))?;
            learner_stats(db, learner_id)
        }
        _ => Err(USAGE.to_string()),
    }
}

fn import_words(db: &str, file: &str) -> Result<String, String> {
    let raw =
        std::fs::read_to_string(file).map_err(|err| format!("failed to read `{file}`: {err}"))?;
    let entries: Vec<WordImport> =
        serde_json::from_str(&raw).map_err(|err| format!("invalid word file `{file}`: {err}"))?;

    let conn = open_db(db).map_err(|err| err.to_string())?;
    let store = SqliteSpellingStore::new(&conn);
    let imported = store
        .in_transaction(|store| {
            for entry in &entries {
                let mut word = Word::new(entry.spelling.trim().to_ascii_lowercase(), entry.level);
                word.definition = entry.definition.clone();
                word.example_sentence = entry.example_sentence.clone();
                store.words().create_word(&word)?;
            }
            Ok::<usize, spellpath_core::RepoError>(entries.len())
        })
        .map_err(|err| err.to_string())?;
    Ok(format!("imported {imported} words"))
}

fn add_learner(db: &str, name: &str, level: u32) -> Result<String, String> {
    let conn = open_db(db).map_err(|err| err.to_string())?;
    let store = SqliteSpellingStore::new(&conn);

    let mut learner = Learner::new("cli", name);
    learner.level = level;
    learner.rating = level_to_base_elo(level);
    let learner_id = store
        .learners()
        .create_learner(&learner)
        .map_err(|err| err.to_string())?;
    Ok(learner_id.to_string())
}

fn run_action(db: &str, input: &str) -> Result<String, String> {
    let conn = open_db(db).map_err(|err| err.to_string())?;
    let mut service = SessionService::new(
        SqliteSpellingStore::new(&conn),
        SqliteSessionLockRepository::new(&conn),
        rand::thread_rng(),
    );
    let envelope = handle_json(&mut service, input);
    info!(
        "event=cli_action module=cli status={} error_kind={:?}",
        if envelope.ok { "ok" } else { "error" },
        envelope.failure_kind()
    );
    let rendered = serde_json::to_string_pretty(&envelope).map_err(|err| err.to_string())?;
    if envelope.ok {
        Ok(rendered)
    } else {
        Err(rendered)
    }
}

fn learner_stats(db: &str, learner_id: Uuid) -> Result<String, String> {
    let conn = open_db(db).map_err(|err| err.to_string())?;
    let service = SessionService::new(
        SqliteSpellingStore::new(&conn),
        SqliteSessionLockRepository::new(&conn),
        rand::thread_rng(),
    );
    let stats = service
        .learner_stats(learner_id)
        .map_err(|err| err.to_string())?;
    serde_json::to_string_pretty(&stats).map_err(|err| err.to_string())
}
