mod common;

use common::{misspell, seed_learner, seed_words, service, TestService};
use spellpath_core::db::open_db_in_memory;
use spellpath_core::engine::prompt::tray_can_spell;
use spellpath_core::engine::rating::{level_to_base_elo, verify_rating_chain};
use spellpath_core::model::session::MiniSetKind;
use spellpath_core::repo::attempt_repo::{AttemptListQuery, AttemptRepository};
use spellpath_core::repo::learner_repo::LearnerRepository;
use spellpath_core::repo::lock_repo::{SessionLockRepository, SqliteSessionLockRepository};
use spellpath_core::repo::session_repo::SessionRepository;
use spellpath_core::repo::word_repo::WordRepository;
use spellpath_core::service::contract::{
    CompleteMiniSetRequest, FinishRequest, NextStep, StartRequest, SubmitRequest, SubmitResponse,
};
use spellpath_core::{
    ErrorKind, InputMode, MiniSetChoice, SessionError, SessionId, SessionMode, SessionState,
    SpellingStore, Word,
};
use std::time::Duration;
use uuid::Uuid;

fn answer(
    service: &mut TestService<'_>,
    session_id: SessionId,
    word: &Word,
    spelling: &str,
) -> SubmitResponse {
    service
        .submit(&SubmitRequest {
            session_id,
            word_id: word.id,
            user_spelling: spelling.to_string(),
            response_ms: 1200,
            ..SubmitRequest::default()
        })
        .unwrap()
}

fn session_state(service: &TestService<'_>, session_id: SessionId) -> SessionState {
    service
        .store()
        .sessions()
        .get_session(session_id)
        .unwrap()
        .unwrap()
        .state
}

fn attempt_count(service: &TestService<'_>, session_id: SessionId) -> usize {
    service
        .store()
        .attempts()
        .list_attempts(&AttemptListQuery::for_session(session_id))
        .unwrap()
        .len()
}

#[test]
fn full_session_runs_start_to_complete() {
    let conn = open_db_in_memory().unwrap();
    seed_words(&conn);
    let learner_id = seed_learner(&conn, 1);
    let mut service = service(&conn, 42);

    let start = service.start(&StartRequest::practice(learner_id)).unwrap();
    assert_eq!(start.word_index, 0);
    assert_eq!(start.level, 1);
    assert_eq!(start.miniset_size, 5);
    assert_eq!(start.current_word.level, 1);
    assert_eq!(start.current_prompt.input_mode, InputMode::TapLetters);
    let tray = start.current_prompt.letter_tray.clone().unwrap();
    assert!(tray_can_spell(&tray, &start.current_word.spelling));
    assert_eq!(
        session_state(&service, start.session_id),
        SessionState::Spelling
    );

    let session_id = start.session_id;
    let mut word = start.current_word;
    let mut seen = vec![word.id];
    for index in 0..5 {
        let last = index == 4;
        let spelling = if last {
            misspell(&word.spelling)
        } else {
            word.spelling.clone()
        };
        let response = answer(&mut service, session_id, &word, &spelling);
        assert_eq!(response.correct, !last);
        assert_eq!(response.correct_spelling, word.spelling);

        if last {
            assert_eq!(response.next_step, NextStep::Break);
            assert!(response.next_word.is_none());
            let summary = response.break_summary.unwrap();
            assert_eq!(summary.word_count, 5);
            assert_eq!(summary.correct_count, 4);
            assert_eq!(summary.missed_words.len(), 1);
            assert_eq!(summary.missed_words[0].user_spelling, spelling);
            assert!(response.lesson.is_some());
        } else {
            assert_eq!(response.next_step, NextStep::NextWord);
            assert_eq!(response.word_index, Some(index + 1));
            word = response.next_word.unwrap();
            assert!(!seen.contains(&word.id), "mini-set repeated a word");
            seen.push(word.id);
        }
    }

    assert_eq!(session_state(&service, session_id), SessionState::Break);
    let session = service
        .store()
        .sessions()
        .get_session(session_id)
        .unwrap()
        .unwrap();
    assert_eq!(session.attempts_total, 5);
    assert_eq!(session.correct_total, 4);
    assert_eq!(session.minisets_completed, 1);

    let next = service
        .complete_miniset(&CompleteMiniSetRequest {
            session_id,
            action: MiniSetChoice::Continue,
        })
        .unwrap();
    assert_eq!(next.word_index, 0);
    assert_eq!(next.level, 1);
    assert_eq!(next.kind, MiniSetKind::Continue);
    assert_eq!(session_state(&service, session_id), SessionState::Spelling);

    let finished = service.finish(&FinishRequest { session_id }).unwrap();
    assert_eq!(finished.attempts_total, 5);
    assert_eq!(finished.correct_total, 4);
    assert_eq!(finished.mini_sets_completed, 1);
    assert_eq!(finished.level_end, 1);
    assert_eq!(
        service.finish(&FinishRequest { session_id }).unwrap(),
        finished
    );

    let shared = service.get_shared_result(session_id).unwrap();
    assert_eq!(shared.words.len(), 5);
    assert!((shared.accuracy - 0.8).abs() < 1e-9);

    let learner = service
        .store()
        .learners()
        .get_learner(learner_id)
        .unwrap()
        .unwrap();
    assert_eq!(learner.total_attempts, 5);
    assert_eq!(learner.successful_attempts, 4);

    let history = service
        .store()
        .attempts()
        .list_attempts(&AttemptListQuery::for_learner(learner_id))
        .unwrap();
    verify_rating_chain(&history).unwrap();
    assert_eq!(history.last().unwrap().rating_after, learner.rating);

    let locks = SqliteSessionLockRepository::new(&conn);
    assert!(locks.holder(session_id).unwrap().is_none());
}

#[test]
fn actions_out_of_order_are_rejected_without_mutation() {
    let conn = open_db_in_memory().unwrap();
    seed_words(&conn);
    let learner_id = seed_learner(&conn, 1);
    let mut service = service(&conn, 7);

    let start = service.start(&StartRequest::practice(learner_id)).unwrap();
    let session_id = start.session_id;

    let err = service
        .complete_miniset(&CompleteMiniSetRequest {
            session_id,
            action: MiniSetChoice::Continue,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    let wrong_word = service
        .submit(&SubmitRequest {
            session_id,
            word_id: Uuid::new_v4(),
            user_spelling: "cat".to_string(),
            response_ms: 100,
            ..SubmitRequest::default()
        })
        .unwrap_err();
    assert_eq!(wrong_word.kind(), ErrorKind::StateConflict);

    let bad_mode = service
        .submit(&SubmitRequest {
            session_id,
            word_id: start.current_word.id,
            user_spelling: "cat".to_string(),
            response_ms: 100,
            input_mode: Some("voice".to_string()),
            ..SubmitRequest::default()
        })
        .unwrap_err();
    assert_eq!(bad_mode.kind(), ErrorKind::Validation);
    assert_eq!(attempt_count(&service, session_id), 0);

    let missing = service
        .finish(&FinishRequest {
            session_id: Uuid::new_v4(),
        })
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);

    service.finish(&FinishRequest { session_id }).unwrap();
    let after_finish = service
        .submit(&SubmitRequest {
            session_id,
            word_id: start.current_word.id,
            user_spelling: start.current_word.spelling.clone(),
            response_ms: 100,
            ..SubmitRequest::default()
        })
        .unwrap_err();
    assert!(matches!(after_finish, SessionError::InvalidTransition(_)));
    assert_eq!(attempt_count(&service, session_id), 0);
}

#[test]
fn busy_session_refuses_mutation() {
    let conn = open_db_in_memory().unwrap();
    seed_words(&conn);
    let learner_id = seed_learner(&conn, 1);
    let mut service = service(&conn, 9);
    let start = service.start(&StartRequest::practice(learner_id)).unwrap();

    let other_holder = SqliteSessionLockRepository::new(&conn);
    let grant = other_holder
        .acquire(start.session_id, Duration::from_secs(30))
        .unwrap();
    assert!(grant.acquired);

    let err = service
        .submit(&SubmitRequest {
            session_id: start.session_id,
            word_id: start.current_word.id,
            user_spelling: start.current_word.spelling.clone(),
            response_ms: 100,
            ..SubmitRequest::default()
        })
        .unwrap_err();
    assert!(matches!(err, SessionError::LockNotAcquired { .. }));
    assert!(err.is_retryable());
    assert_eq!(attempt_count(&service, start.session_id), 0);

    other_holder
        .release(start.session_id, grant.token.unwrap())
        .unwrap();
    answer(
        &mut service,
        start.session_id,
        &start.current_word,
        &start.current_word.spelling,
    );
    assert_eq!(attempt_count(&service, start.session_id), 1);
}

#[test]
fn replayed_prompt_is_a_state_conflict() {
    let conn = open_db_in_memory().unwrap();
    seed_words(&conn);
    let learner_id = seed_learner(&conn, 1);
    let mut service = service(&conn, 11);
    let start = service.start(&StartRequest::practice(learner_id)).unwrap();
    let prompt_id = start.current_prompt.prompt_id;

    let first = service
        .submit(&SubmitRequest {
            session_id: start.session_id,
            word_id: start.current_word.id,
            user_spelling: start.current_word.spelling.clone(),
            response_ms: 300,
            prompt_id: Some(prompt_id),
            ..SubmitRequest::default()
        })
        .unwrap();
    let next_word = first.next_word.unwrap();

    let replay = service
        .submit(&SubmitRequest {
            session_id: start.session_id,
            word_id: next_word.id,
            user_spelling: next_word.spelling.clone(),
            response_ms: 300,
            prompt_id: Some(prompt_id),
            ..SubmitRequest::default()
        })
        .unwrap_err();
    assert_eq!(replay.kind(), ErrorKind::StateConflict);
    assert_eq!(attempt_count(&service, start.session_id), 1);
}

#[test]
fn ratings_move_with_outcomes_and_chain_across_sessions() {
    let conn = open_db_in_memory().unwrap();
    seed_words(&conn);
    let learner_id = seed_learner(&conn, 2);
    let mut service = service(&conn, 5);

    let first = service.start(&StartRequest::practice(learner_id)).unwrap();
    let second = service.start(&StartRequest::practice(learner_id)).unwrap();

    let up = answer(
        &mut service,
        first.session_id,
        &first.current_word,
        &first.current_word.spelling,
    );
    assert!(up.rating_after > up.rating_before);

    let down = answer(
        &mut service,
        second.session_id,
        &second.current_word,
        &misspell(&second.current_word.spelling),
    );
    assert!(down.rating_after < down.rating_before);
    assert_eq!(down.rating_before, up.rating_after);

    let history = service
        .store()
        .attempts()
        .list_attempts(&AttemptListQuery::for_learner(learner_id))
        .unwrap();
    assert_eq!(history.len(), 2);
    verify_rating_chain(&history).unwrap();
}

#[test]
fn challenge_jump_raises_level_and_practice_missed_repeats_misses() {
    let conn = open_db_in_memory().unwrap();
    seed_words(&conn);
    let learner_id = seed_learner(&conn, 1);
    let mut service = service(&conn, 21);

    let start = service.start(&StartRequest::practice(learner_id)).unwrap();
    let session_id = start.session_id;
    let mut word = start.current_word;
    let mut missed = Vec::new();
    for index in 0..5 {
        let response = if index % 2 == 0 {
            missed.push(word.id);
            answer(&mut service, session_id, &word, &misspell(&word.spelling))
        } else {
            answer(&mut service, session_id, &word, &word.spelling)
        };
        if let Some(next) = response.next_word {
            word = next;
        }
    }

    let retry = service
        .complete_miniset(&CompleteMiniSetRequest {
            session_id,
            action: MiniSetChoice::PracticeMissed,
        })
        .unwrap();
    assert_eq!(retry.kind, MiniSetKind::PracticeMissed);
    assert_eq!(retry.current_word.id, missed[0]);
    let miniset = service
        .store()
        .sessions()
        .get_miniset(session_id, 1)
        .unwrap()
        .unwrap();
    assert_eq!(miniset.word_ids, missed);

    let mut word = retry.current_word;
    for _ in 0..missed.len() {
        let response = answer(&mut service, session_id, &word, &word.spelling);
        if let Some(next) = response.next_word {
            word = next;
        }
    }
    assert_eq!(session_state(&service, session_id), SessionState::Break);

    let clean_retry = service
        .complete_miniset(&CompleteMiniSetRequest {
            session_id,
            action: MiniSetChoice::PracticeMissed,
        })
        .unwrap();
    assert_eq!(clean_retry.kind, MiniSetKind::Continue);

    let mut word = clean_retry.current_word;
    loop {
        let response = answer(&mut service, session_id, &word, &word.spelling);
        match response.next_word {
            Some(next) => word = next,
            None => break,
        }
    }

    let jump = service
        .complete_miniset(&CompleteMiniSetRequest {
            session_id,
            action: MiniSetChoice::ChallengeJump,
        })
        .unwrap();
    assert_eq!(jump.kind, MiniSetKind::ChallengeJump);
    assert_eq!(jump.level, 2);
    assert_eq!(jump.current_word.level, 2);
    assert_eq!(jump.current_prompt.input_mode, InputMode::Typed);
    assert!(jump.current_prompt.letter_tray.is_none());
    let learner = service
        .store()
        .learners()
        .get_learner(learner_id)
        .unwrap()
        .unwrap();
    assert_eq!(learner.level, 2);

    let finished = service.finish(&FinishRequest { session_id }).unwrap();
    assert_eq!(finished.level_end, 2);
    assert_eq!(finished.mini_sets_completed, 3);
}

#[test]
fn challenge_jump_is_capped_at_the_top_level() {
    let conn = open_db_in_memory().unwrap();
    seed_words(&conn);
    let learner_id = seed_learner(&conn, 4);
    let mut service = service(&conn, 3);

    let start = service.start(&StartRequest::practice(learner_id)).unwrap();
    assert_eq!(start.level, 4);
    let mut word = start.current_word;
    loop {
        let response = answer(&mut service, start.session_id, &word, &word.spelling);
        match response.next_word {
            Some(next) => word = next,
            None => break,
        }
    }

    let jump = service
        .complete_miniset(&CompleteMiniSetRequest {
            session_id: start.session_id,
            action: MiniSetChoice::ChallengeJump,
        })
        .unwrap();
    assert_eq!(jump.level, 4);
}

#[test]
fn assessment_estimates_without_touching_the_learner_until_applied() {
    let conn = open_db_in_memory().unwrap();
    seed_words(&conn);
    let learner_id = seed_learner(&conn, 1);
    let mut service = service(&conn, 13);

    let start = service
        .start(&StartRequest::assessment(learner_id))
        .unwrap();
    assert_eq!(start.mode, SessionMode::Assessment);
    assert_eq!(start.miniset_size, 4);
    assert_eq!(start.assessment_suggested_level, Some(1));
    assert_eq!(start.assessment_max_level, Some(3));
    assert_eq!(start.current_word.level, 1);

    let session_id = start.session_id;
    let early = service.apply_assessment(session_id).unwrap_err();
    assert_eq!(early.kind(), ErrorKind::StateConflict);

    let mut word = start.current_word;
    let mut last = None;
    for _ in 0..4 {
        let spelling = if word.level == 3 {
            misspell(&word.spelling)
        } else {
            word.spelling.clone()
        };
        let response = answer(&mut service, session_id, &word, &spelling);
        if let Some(next) = response.next_word.clone() {
            assert!(next.level > word.level);
            word = next;
        }
        last = Some(response);
    }

    let summary = last.unwrap().break_summary.unwrap();
    assert_eq!(summary.kind, MiniSetKind::Diagnostic);
    let estimate = summary.assessment.unwrap();
    assert_eq!(estimate.suggested_level, 2);
    assert_eq!(estimate.max_level, 4);

    let learner = service
        .store()
        .learners()
        .get_learner(learner_id)
        .unwrap()
        .unwrap();
    assert_eq!(learner.level, 1);

    let applied = service.apply_assessment(session_id).unwrap();
    assert_eq!(applied.level, 2);
    assert_eq!(applied.rating, level_to_base_elo(2));

    let practice = service.start(&StartRequest::practice(learner_id)).unwrap();
    let err = service.apply_assessment(practice.session_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);
}

#[test]
fn explicit_words_and_lists_drive_the_miniset() {
    let conn = open_db_in_memory().unwrap();
    let words = seed_words(&conn);
    let learner_id = seed_learner(&conn, 1);
    let mut service = service(&conn, 17);

    let picked: Vec<Word> = words.iter().filter(|w| w.level == 3).take(3).cloned().collect();
    let start = service
        .start(&StartRequest {
            word_ids: Some(picked.iter().map(|w| w.id).collect()),
            ..StartRequest::practice(learner_id)
        })
        .unwrap();
    assert_eq!(start.miniset_size, 3);
    assert_eq!(start.current_word.id, picked[0].id);

    let mut word = start.current_word;
    let mut steps = 0;
    loop {
        steps += 1;
        let response = answer(&mut service, start.session_id, &word, &word.spelling);
        match response.next_word {
            Some(next) => word = next,
            None => break,
        }
    }
    assert_eq!(steps, 3);

    let list_words: Vec<Word> = words.iter().filter(|w| w.level == 2).cloned().collect();
    let list = spellpath_core::WordList {
        id: Uuid::new_v4(),
        owner_ref: "family-1".to_string(),
        name: "week 1".to_string(),
        word_ids: list_words.iter().map(|w| w.id).collect(),
    };
    service.store().words().create_word_list(&list).unwrap();

    let from_list = service
        .start(&StartRequest {
            list_id: Some(list.id),
            ..StartRequest::practice(learner_id)
        })
        .unwrap();
    assert_eq!(from_list.current_word.id, list_words[0].id);
    let mut word = from_list.current_word;
    loop {
        let response = answer(&mut service, from_list.session_id, &word, &word.spelling);
        match response.next_word {
            Some(next) => word = next,
            None => break,
        }
    }
    let rest = service
        .complete_miniset(&CompleteMiniSetRequest {
            session_id: from_list.session_id,
            action: MiniSetChoice::Continue,
        })
        .unwrap();
    assert_eq!(rest.current_word.id, list_words[5].id);
}

#[test]
fn review_mode_starts_from_recent_misses() {
    let conn = open_db_in_memory().unwrap();
    seed_words(&conn);
    let learner_id = seed_learner(&conn, 1);
    let mut service = service(&conn, 23);

    let start = service.start(&StartRequest::practice(learner_id)).unwrap();
    let missed = start.current_word.clone();
    answer(
        &mut service,
        start.session_id,
        &start.current_word,
        &misspell(&start.current_word.spelling),
    );
    service
        .finish(&FinishRequest {
            session_id: start.session_id,
        })
        .unwrap();

    let review = service
        .start(&StartRequest {
            mode: Some(SessionMode::Review),
            ..StartRequest::practice(learner_id)
        })
        .unwrap();
    assert_eq!(review.mode, SessionMode::Review);
    assert_eq!(review.miniset_size, 1);
    assert_eq!(review.current_word.id, missed.id);
}

#[test]
fn level_override_is_validated_and_resets_rating() {
    let conn = open_db_in_memory().unwrap();
    seed_words(&conn);
    let learner_id = seed_learner(&conn, 1);
    let service = service(&conn, 1);

    let err = service.override_learner_level(learner_id, 9).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = service.override_learner_level(learner_id, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let learner = service.override_learner_level(learner_id, 3).unwrap();
    assert_eq!(learner.level, 3);
    assert_eq!(learner.rating, level_to_base_elo(3));
}

#[test]
fn shared_result_requires_completion_and_stats_follow_history() {
    let conn = open_db_in_memory().unwrap();
    seed_words(&conn);
    let learner_id = seed_learner(&conn, 1);
    let mut service = service(&conn, 29);

    let start = service.start(&StartRequest::practice(learner_id)).unwrap();
    let err = service.get_shared_result(start.session_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    let first = answer(
        &mut service,
        start.session_id,
        &start.current_word,
        &start.current_word.spelling,
    );
    let second_word = first.next_word.unwrap();
    answer(
        &mut service,
        start.session_id,
        &second_word,
        &misspell(&second_word.spelling),
    );

    let stats = service.learner_stats(learner_id).unwrap();
    assert_eq!(stats.total_attempts, 2);
    assert_eq!(stats.correct_attempts, 1);
    assert_eq!(stats.current_streak, 0);
    assert_eq!(stats.best_streak, 1);
    assert_eq!(stats.most_missed.len(), 1);
    assert_eq!(stats.most_missed[0].word, second_word.spelling);
}

#[test]
fn empty_word_store_cannot_start() {
    let conn = open_db_in_memory().unwrap();
    let learner_id = seed_learner(&conn, 1);
    let mut service = service(&conn, 1);

    let err = service
        .start(&StartRequest::practice(learner_id))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(matches!(
        err,
        SessionError::NoWordsAvailable { level: None }
    ));
}
