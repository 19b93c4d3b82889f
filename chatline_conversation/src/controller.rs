//! Turn-taking state machine.
//!
//! The `ConversationController` is the only caller of the model and the only
//! component that mutates the transcript in response to user intent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chatline_core::{
    Message, ModelClient, ModelError, PersistenceAdapter, PersistenceError, SessionState,
    ValidationError,
};
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, info, warn};

use crate::events::{EventBus, SessionEvent};
use crate::store::{LoadReport, MessageStore};

/// Configuration injected at construction time.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// An elapsed timeout fails the turn like any other model error.
    pub response_timeout: Option<Duration>,
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            response_timeout: None,
            event_capacity: 64,
        }
    }
}

impl ControllerConfig {
    #[must_use]
    pub const fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

/// What a call to [`ConversationController::send_user_message`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The assistant reply, already appended and persisted.
    Replied(Message),
    /// The model failed or answered with nothing; only the user message remains.
    Failed(String),
    /// The conversation was cleared while the model was answering.
    Discarded,
    /// Another turn is in flight. Nothing was appended.
    Rejected,
    /// Nothing to send. Nothing was appended.
    Ignored(ValidationError),
}

/// Moves the state out of `Sending`/`AwaitingResponse` when a turn ends,
/// including when the turn's future is dropped half-way.
struct TurnGuard<'a> {
    state: &'a watch::Sender<SessionState>,
    events: &'a EventBus,
}

impl<'a> TurnGuard<'a> {
    /// `None` unless the controller was idle.
    fn acquire(state: &'a watch::Sender<SessionState>, events: &'a EventBus) -> Option<Self> {
        let began = state.send_if_modified(|current| {
            if current.is_idle() {
                *current = SessionState::Sending;
                true
            } else {
                false
            }
        });
        if !began {
            return None;
        }
        events.publish(SessionEvent::StateChanged(SessionState::Sending));
        Some(Self { state, events })
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let reset = self.state.send_if_modified(|current| {
            if current.is_idle() {
                false
            } else {
                *current = SessionState::Idle;
                true
            }
        });
        if reset {
            self.events
                .publish(SessionEvent::StateChanged(SessionState::Idle));
        }
    }
}

/// Drives one linear conversation: at most one turn in flight, every
/// transcript change persisted before the next one is made.
///
/// All methods take `&self`, so a clear can be issued while a send is
/// waiting on the model. Each turn is tagged with the generation current when
/// its user message was appended; a reply whose generation no longer matches
/// is dropped instead of resurrecting cleared history.
pub struct ConversationController<M = Arc<dyn ModelClient>, P = Arc<dyn PersistenceAdapter>>
where
    M: Send + Sync,
    P: Send + Sync,
{
    model: M,
    store: Mutex<MessageStore<P>>,
    state: watch::Sender<SessionState>,
    last_error: watch::Sender<Option<String>>,
    generation: AtomicU64,
    events: EventBus,
    config: ControllerConfig,
}

impl<M, P> ConversationController<M, P>
where
    M: ModelClient + Send + Sync,
    P: PersistenceAdapter + Send + Sync,
{
    pub fn new(model: M, store: MessageStore<P>, config: ControllerConfig) -> Self {
        info!(
            "Creating conversation controller: model={}, key={}",
            model.model_name(),
            store.key()
        );
        Self {
            model,
            store: Mutex::new(store),
            state: watch::Sender::new(SessionState::Idle),
            last_error: watch::Sender::new(None),
            generation: AtomicU64::new(0),
            events: EventBus::new(config.event_capacity),
            config,
        }
    }

    /// Restore the persisted transcript.
    pub async fn load(&self) -> Result<LoadReport, PersistenceError> {
        let mut store = self.store.lock().await;
        let report = store.load().await?;
        if report.skipped > 0 {
            warn!("{} persisted messages could not be restored", report.skipped);
        }
        Ok(report)
    }

    /// Run one turn: append the user message, ask the model, append its reply.
    ///
    /// Blank text is ignored and a call made while another turn is in flight
    /// is rejected; neither changes the transcript or the state.
    pub async fn send_user_message(&self, text: &str) -> TurnOutcome {
        if text.trim().is_empty() {
            debug!("Ignoring empty submission");
            return TurnOutcome::Ignored(ValidationError::EmptyMessage);
        }

        let Some(_turn) = TurnGuard::acquire(&self.state, &self.events) else {
            debug!("Rejecting send: a turn is already in flight");
            return TurnOutcome::Rejected;
        };
        self.last_error.send_replace(None);

        let generation = {
            let mut store = self.store.lock().await;
            let generation = self.generation.load(Ordering::SeqCst);
            let message = Message::user(text);
            store.append(message.clone());
            self.events.publish(SessionEvent::MessageAppended(message));
            self.persist_or_warn(&store).await;
            generation
        };

        self.set_state(SessionState::AwaitingResponse);
        debug!("Turn {generation}: waiting on {}", self.model.model_name());

        let reply = match self.generate(text).await {
            Ok(Some(reply)) if !reply.trim().is_empty() => reply,
            Ok(_) => return self.fail_turn(generation, &ModelError::EmptyResponse),
            Err(e) => return self.fail_turn(generation, &e),
        };

        let mut store = self.store.lock().await;
        if !self.is_current(generation) {
            drop(store);
            return self.discard(generation);
        }

        let message = Message::assistant(reply);
        store.append(message.clone());
        self.events
            .publish(SessionEvent::MessageAppended(message.clone()));
        self.persist_or_warn(&store).await;
        drop(store);

        self.set_state(SessionState::Idle);
        debug!("Turn {generation} completed");
        TurnOutcome::Replied(message)
    }

    /// Empty the transcript and persist the empty list. Allowed in any state.
    ///
    /// An in-flight turn keeps running and still ends in `Idle`, but its reply
    /// is discarded.
    pub async fn clear_conversation(&self) -> Result<(), PersistenceError> {
        let mut store = self.store.lock().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        store.clear();
        self.events.publish(SessionEvent::Cleared);
        info!("Cleared conversation, now at generation {generation}");

        store.persist().await.inspect_err(|e| {
            warn!("Failed to persist cleared transcript: {e}");
            self.events.publish(SessionEvent::PersistenceWarning {
                reason: e.to_string(),
            });
        })
    }

    pub async fn transcript(&self) -> Vec<Message> {
        self.store.lock().await.snapshot().to_vec()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// True exactly while a turn is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Reason of the most recent failed turn, until the next turn starts.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    async fn generate(&self, prompt: &str) -> Result<Option<String>, ModelError> {
        match self.config.response_timeout {
            Some(limit) => tokio::time::timeout(limit, self.model.generate(prompt))
                .await
                .unwrap_or_else(|_| Err(ModelError::Timeout(limit))),
            None => self.model.generate(prompt).await,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state.clone());
        self.events.publish(SessionEvent::StateChanged(state));
    }

    async fn persist_or_warn(&self, store: &MessageStore<P>) {
        if let Err(e) = store.persist().await {
            warn!("Failed to persist transcript: {e}");
            self.events.publish(SessionEvent::PersistenceWarning {
                reason: e.to_string(),
            });
        }
    }

    fn fail_turn(&self, generation: u64, error: &ModelError) -> TurnOutcome {
        if !self.is_current(generation) {
            return self.discard(generation);
        }

        let reason = error.to_string();
        warn!("Turn {generation} failed: {reason}");
        self.last_error.send_replace(Some(reason.clone()));
        self.set_state(SessionState::Error(reason.clone()));
        self.events.publish(SessionEvent::TurnFailed {
            reason: reason.clone(),
        });
        self.set_state(SessionState::Idle);
        TurnOutcome::Failed(reason)
    }

    fn discard(&self, generation: u64) -> TurnOutcome {
        info!("Discarding result of turn {generation}: conversation was cleared");
        self.events
            .publish(SessionEvent::ResponseDiscarded { generation });
        self.set_state(SessionState::Idle);
        TurnOutcome::Discarded
    }
}
