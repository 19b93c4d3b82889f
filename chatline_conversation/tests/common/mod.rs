#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chatline_conversation::{
    ControllerConfig, ConversationController, MessageStore, SessionEvent,
};
use chatline_core::{ModelClient, ModelError, PersistenceAdapter, PersistenceError};
use chatline_session::InMemoryPersistence;
use tokio::sync::{Notify, broadcast};

pub const KEY: &str = "messages";

pub type Reply = Result<Option<String>, String>;

fn to_model_result(reply: Reply) -> Result<Option<String>, ModelError> {
    reply.map_err(|e| ModelError::Provider(anyhow::anyhow!(e)))
}

/// Answers from a fixed script, one entry per call.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(Some(text.to_string()))])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()));
        to_model_result(reply)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Holds every call until `release` is called once per call.
pub struct GatedModel {
    reply: Reply,
    gate: Notify,
    calls: AtomicUsize,
}

impl GatedModel {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for GatedModel {
    async fn generate(&self, _prompt: &str) -> Result<Option<String>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        to_model_result(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "gated"
    }
}

/// Holds the first `set_list` until `release` is called; later writes pass.
pub struct GatedPersistence {
    inner: InMemoryPersistence,
    armed: AtomicBool,
    entered: Notify,
    gate: Notify,
}

impl GatedPersistence {
    pub fn new() -> Self {
        Self {
            inner: InMemoryPersistence::recording(),
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            gate: Notify::new(),
        }
    }

    /// Resolves once the held write has started.
    pub async fn wait_until_held(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub async fn writes(&self) -> Vec<(String, Vec<String>)> {
        self.inner.writes().await
    }
}

impl Default for GatedPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceAdapter for GatedPersistence {
    async fn get_list(&self, key: &str) -> Result<Vec<String>, PersistenceError> {
        self.inner.get_list(key).await
    }

    async fn set_list(&self, key: &str, values: &[String]) -> Result<(), PersistenceError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.gate.notified().await;
        }
        self.inner.set_list(key, values).await
    }
}

pub fn controller<M: ModelClient>(
    model: M,
    adapter: &Arc<InMemoryPersistence>,
) -> ConversationController<M, Arc<InMemoryPersistence>> {
    controller_with_config(model, adapter, ControllerConfig::default())
}

pub fn controller_with_config<M: ModelClient>(
    model: M,
    adapter: &Arc<InMemoryPersistence>,
    config: ControllerConfig,
) -> ConversationController<M, Arc<InMemoryPersistence>> {
    ConversationController::new(model, MessageStore::new(Arc::clone(adapter), KEY), config)
}

pub fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
