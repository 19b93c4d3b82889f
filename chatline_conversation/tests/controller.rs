//! Integration tests for the turn-taking state machine.
//!
//! These tests verify that:
//! - A successful turn appends user + assistant and persists both
//! - A failed or empty reply appends only the user message and returns to idle
//! - Blank input and overlapping sends are no-ops, in `Sending` as well as
//!   `AwaitingResponse`
//! - Clearing is idempotent and persists an empty list each time
//! - A reply arriving after a clear is discarded
//! - The transcript survives a restart with a fresh adapter instance

mod common;

use std::sync::Arc;
use std::time::Duration;

use chatline_conversation::{
    ControllerConfig, ConversationController, MessageStore, SessionEvent, TurnOutcome,
};
use chatline_core::{Message, Role, SessionState, ValidationError, decode_message, encode_message};
use chatline_session::{FilePersistence, InMemoryPersistence};
use common::{
    GatedModel, GatedPersistence, KEY, ScriptedModel, controller, controller_with_config, drain,
};

fn roles_and_texts(messages: &[Message]) -> Vec<(Role, String)> {
    messages
        .iter()
        .map(|m| (m.role(), m.text().to_string()))
        .collect()
}

#[tokio::test]
async fn test_successful_turn_appends_user_and_assistant() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let model = Arc::new(ScriptedModel::replying("Hello!"));
    let controller = controller(Arc::clone(&model), &adapter);

    let outcome = controller.send_user_message("Hi").await;

    match outcome {
        TurnOutcome::Replied(message) => {
            assert_eq!(message.role(), Role::Assistant);
            assert_eq!(message.text(), "Hello!");
        }
        other => panic!("Expected Replied, got {other:?}"),
    }
    assert_eq!(
        roles_and_texts(&controller.transcript().await),
        vec![
            (Role::User, "Hi".to_string()),
            (Role::Assistant, "Hello!".to_string())
        ]
    );
    assert_eq!(controller.state(), SessionState::Idle);
    assert!(!controller.is_loading());
    assert_eq!(model.prompts(), vec!["Hi".to_string()]);

    // user message persisted before the model call, then the full turn
    let writes = adapter.writes().await;
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].1.len(), 1);
    let persisted: Vec<Message> = writes[1]
        .1
        .iter()
        .map(|raw| decode_message(raw).unwrap())
        .collect();
    assert_eq!(persisted, controller.transcript().await);
}

#[tokio::test]
async fn test_state_sequence_of_successful_turn() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let controller = controller(ScriptedModel::replying("Hello!"), &adapter);
    let mut events = controller.subscribe();

    controller.send_user_message("Hi").await;

    let states: Vec<SessionState> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::StateChanged(state) => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            SessionState::Sending,
            SessionState::AwaitingResponse,
            SessionState::Idle
        ]
    );
}

#[tokio::test]
async fn test_model_failure_keeps_only_user_message() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let controller = controller(
        ScriptedModel::new(vec![Err("HTTP 503".to_string())]),
        &adapter,
    );
    let mut events = controller.subscribe();

    let outcome = controller.send_user_message("Hi").await;

    let TurnOutcome::Failed(reason) = outcome.clone() else {
        panic!("Expected Failed, got {outcome:?}");
    };
    assert!(reason.contains("HTTP 503"));
    assert_eq!(controller.transcript().await.len(), 1);
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(controller.last_error(), Some(reason.clone()));

    let events = drain(&mut events);
    let error_at = events
        .iter()
        .position(|e| matches!(e, SessionEvent::StateChanged(SessionState::Error(_))))
        .unwrap();
    assert!(events.contains(&SessionEvent::TurnFailed { reason }));
    assert_eq!(
        events[error_at + 1..]
            .iter()
            .find(|e| matches!(e, SessionEvent::StateChanged(_))),
        Some(&SessionEvent::StateChanged(SessionState::Idle))
    );
}

#[tokio::test]
async fn test_empty_reply_is_a_failure() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let controller = controller(
        ScriptedModel::new(vec![Ok(None), Ok(Some("   ".to_string()))]),
        &adapter,
    );

    let first = controller.send_user_message("Hi").await;
    let second = controller.send_user_message("Anyone?").await;

    assert_eq!(first, TurnOutcome::Failed("empty response".to_string()));
    assert_eq!(second, TurnOutcome::Failed("empty response".to_string()));
    assert_eq!(
        roles_and_texts(&controller.transcript().await),
        vec![
            (Role::User, "Hi".to_string()),
            (Role::User, "Anyone?".to_string())
        ]
    );
}

#[tokio::test]
async fn test_retry_after_failure_succeeds() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let controller = controller(
        ScriptedModel::new(vec![Err("timeout".to_string()), Ok(Some("Hello!".to_string()))]),
        &adapter,
    );

    controller.send_user_message("Hi").await;
    let outcome = controller.send_user_message("Hi").await;

    assert!(matches!(outcome, TurnOutcome::Replied(_)));
    assert_eq!(controller.transcript().await.len(), 3);
    assert_eq!(controller.last_error(), None);
}

#[tokio::test]
async fn test_blank_input_is_a_no_op() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let model = Arc::new(ScriptedModel::replying("unused"));
    let controller = controller(Arc::clone(&model), &adapter);
    let mut events = controller.subscribe();

    for text in ["", "   ", "\n\t"] {
        assert_eq!(
            controller.send_user_message(text).await,
            TurnOutcome::Ignored(ValidationError::EmptyMessage)
        );
    }

    assert!(controller.transcript().await.is_empty());
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(model.calls(), 0);
    assert_eq!(adapter.write_count().await, 0);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_overlapping_send_is_rejected() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let model = Arc::new(GatedModel::new(Ok(Some("Hello!".to_string()))));
    let controller = Arc::new(controller(Arc::clone(&model), &adapter));
    let mut state = controller.subscribe_state();

    let first = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.send_user_message("Hi").await }
    });
    state
        .wait_for(|s| *s == SessionState::AwaitingResponse)
        .await
        .unwrap();
    assert!(controller.is_loading());

    let second = controller.send_user_message("Are you there?").await;

    assert_eq!(second, TurnOutcome::Rejected);
    assert_eq!(model.calls(), 1);
    assert_eq!(controller.transcript().await.len(), 1);

    model.release();
    assert!(matches!(first.await.unwrap(), TurnOutcome::Replied(_)));
    assert_eq!(controller.transcript().await.len(), 2);
    assert!(!controller.is_loading());
}

#[tokio::test]
async fn test_send_while_user_message_is_saving_is_rejected() {
    let adapter = Arc::new(GatedPersistence::new());
    let model = Arc::new(ScriptedModel::replying("Hello!"));
    let controller = Arc::new(ConversationController::new(
        Arc::clone(&model),
        MessageStore::new(Arc::clone(&adapter), KEY),
        ControllerConfig::default(),
    ));

    let first = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.send_user_message("Hi").await }
    });
    adapter.wait_until_held().await;
    assert_eq!(controller.state(), SessionState::Sending);

    let second = controller.send_user_message("Are you there?").await;

    assert_eq!(second, TurnOutcome::Rejected);
    assert_eq!(model.calls(), 0);

    adapter.release();
    assert!(matches!(first.await.unwrap(), TurnOutcome::Replied(_)));
    assert_eq!(model.prompts(), vec!["Hi".to_string()]);
    assert_eq!(controller.transcript().await.len(), 2);
}

#[tokio::test]
async fn test_clear_while_user_message_is_saving_discards_turn() {
    let adapter = Arc::new(GatedPersistence::new());
    let model = Arc::new(GatedModel::new(Ok(Some("late reply".to_string()))));
    let controller = Arc::new(ConversationController::new(
        Arc::clone(&model),
        MessageStore::new(Arc::clone(&adapter), KEY),
        ControllerConfig::default(),
    ));

    let turn = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.send_user_message("Hi").await }
    });
    adapter.wait_until_held().await;
    assert_eq!(controller.state(), SessionState::Sending);

    let clear = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.clear_conversation().await }
    });
    adapter.release();
    clear.await.unwrap().unwrap();
    model.release();

    assert_eq!(turn.await.unwrap(), TurnOutcome::Discarded);
    assert!(controller.transcript().await.is_empty());
    assert_eq!(controller.state(), SessionState::Idle);
    let last_write = adapter.writes().await.pop().unwrap();
    assert!(last_write.1.is_empty());
}

#[tokio::test]
async fn test_clear_twice_persists_empty_list_each_time() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let controller = controller(ScriptedModel::replying("Hello!"), &adapter);
    controller.send_user_message("Hi").await;
    let before = adapter.write_count().await;

    controller.clear_conversation().await.unwrap();
    assert!(controller.transcript().await.is_empty());
    controller.clear_conversation().await.unwrap();
    assert!(controller.transcript().await.is_empty());

    let writes = adapter.writes().await;
    assert_eq!(writes.len(), before + 2);
    assert!(writes[before..].iter().all(|(key, values)| key == KEY && values.is_empty()));
    assert_eq!(controller.generation(), 2);
}

#[tokio::test]
async fn test_reply_after_clear_is_discarded() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let model = Arc::new(GatedModel::new(Ok(Some("late reply".to_string()))));
    let controller = Arc::new(controller(Arc::clone(&model), &adapter));
    let mut state = controller.subscribe_state();
    let mut events = controller.subscribe();

    let turn = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.send_user_message("Hi").await }
    });
    state
        .wait_for(|s| *s == SessionState::AwaitingResponse)
        .await
        .unwrap();

    controller.clear_conversation().await.unwrap();
    model.release();

    assert_eq!(turn.await.unwrap(), TurnOutcome::Discarded);
    assert!(controller.transcript().await.is_empty());
    assert_eq!(controller.state(), SessionState::Idle);
    let last_write = adapter.writes().await.pop().unwrap();
    assert!(last_write.1.is_empty());
    assert!(drain(&mut events).contains(&SessionEvent::ResponseDiscarded { generation: 0 }));
}

#[tokio::test]
async fn test_failure_after_clear_is_discarded_silently() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let model = Arc::new(GatedModel::new(Err("HTTP 500".to_string())));
    let controller = Arc::new(controller(Arc::clone(&model), &adapter));
    let mut state = controller.subscribe_state();

    let turn = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.send_user_message("Hi").await }
    });
    state
        .wait_for(|s| *s == SessionState::AwaitingResponse)
        .await
        .unwrap();
    controller.clear_conversation().await.unwrap();
    model.release();

    assert_eq!(turn.await.unwrap(), TurnOutcome::Discarded);
    assert_eq!(controller.last_error(), None);
}

#[tokio::test]
async fn test_new_turn_after_clear_is_kept() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let controller = controller(
        ScriptedModel::new(vec![Ok(Some("Hello!".to_string())), Ok(Some("Again!".to_string()))]),
        &adapter,
    );

    controller.send_user_message("Hi").await;
    controller.clear_conversation().await.unwrap();
    controller.send_user_message("Hi again").await;

    assert_eq!(
        roles_and_texts(&controller.transcript().await),
        vec![
            (Role::User, "Hi again".to_string()),
            (Role::Assistant, "Again!".to_string())
        ]
    );
}

#[tokio::test]
async fn test_timeout_fails_the_turn() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let model = Arc::new(GatedModel::new(Ok(Some("too late".to_string()))));
    let controller = controller_with_config(
        Arc::clone(&model),
        &adapter,
        ControllerConfig::default().with_response_timeout(Duration::from_millis(20)),
    );

    let outcome = controller.send_user_message("Hi").await;

    assert_eq!(outcome, TurnOutcome::Failed("No response within 20ms".to_string()));
    assert_eq!(controller.transcript().await.len(), 1);
    assert_eq!(controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_dropped_turn_returns_to_idle() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    let model = Arc::new(GatedModel::new(Ok(Some("never".to_string()))));
    let controller = controller(Arc::clone(&model), &adapter);

    let cancelled =
        tokio::time::timeout(Duration::from_millis(20), controller.send_user_message("Hi")).await;

    assert!(cancelled.is_err());
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(controller.transcript().await.len(), 1);
}

#[tokio::test]
async fn test_persistence_failure_is_a_warning() {
    let adapter = Arc::new(InMemoryPersistence::recording());
    adapter.fail_writes(true);
    let controller = controller(ScriptedModel::replying("Hello!"), &adapter);
    let mut events = controller.subscribe();

    let outcome = controller.send_user_message("Hi").await;

    assert!(matches!(outcome, TurnOutcome::Replied(_)));
    assert_eq!(controller.transcript().await.len(), 2);
    let warnings = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::PersistenceWarning { .. }))
        .count();
    assert_eq!(warnings, 2);

    // next successful write reconciles the durable copy
    adapter.fail_writes(false);
    assert!(controller.clear_conversation().await.is_ok());
    assert_eq!(adapter.write_count().await, 1);
}

#[tokio::test]
async fn test_load_restores_and_skips_corrupt_records() {
    let good = encode_message(&Message::user("kept")).unwrap();
    let adapter = Arc::new(
        InMemoryPersistence::recording().with_list(KEY, vec![good, "{\"isUser\":1}".to_string()]),
    );
    let controller = controller(ScriptedModel::replying("Hello!"), &adapter);

    let report = controller.load().await.unwrap();

    assert_eq!(report.loaded, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(controller.transcript().await[0].text(), "kept");
}

#[tokio::test]
async fn test_transcript_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transcript.json");

    let first = ConversationController::new(
        ScriptedModel::replying("Hello!"),
        MessageStore::new(FilePersistence::new(&path), KEY),
        ControllerConfig::default(),
    );
    first.send_user_message("Hi").await;
    let before = first.transcript().await;
    drop(first);

    let second = ConversationController::new(
        ScriptedModel::default(),
        MessageStore::new(FilePersistence::new(&path), KEY),
        ControllerConfig::default(),
    );
    second.load().await.unwrap();

    assert_eq!(second.transcript().await, before);
}
