//! In-memory transcript and its persistence round-trip.

use chatline_core::{
    Message, PersistenceAdapter, PersistenceError, decode_message, encode_message,
};
use tracing::{debug, info, warn};

/// Outcome of [`MessageStore::load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Malformed records left out of the transcript.
    pub skipped: usize,
}

/// Owns the ordered transcript and is the only writer of its persisted key.
///
/// The transcript only grows by `append` or empties by `clear`; neither
/// touches storage until `persist` is awaited.
pub struct MessageStore<P> {
    adapter: P,
    key: String,
    messages: Vec<Message>,
}

impl<P: PersistenceAdapter> MessageStore<P> {
    pub fn new(adapter: P, key: impl Into<String>) -> Self {
        Self {
            adapter,
            key: key.into(),
            messages: Vec::new(),
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Replace the transcript with the persisted one.
    ///
    /// A record that fails to decode is logged and skipped; the rest still
    /// load in stored order. On an adapter error the transcript is untouched.
    pub async fn load(&mut self) -> Result<LoadReport, PersistenceError> {
        let raw = self.adapter.get_list(&self.key).await?;

        let mut report = LoadReport::default();
        let mut messages = Vec::with_capacity(raw.len());
        for (index, entry) in raw.iter().enumerate() {
            match decode_message(entry) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    warn!("Skipping persisted record {index} under key {}: {e}", self.key);
                    report.skipped += 1;
                }
            }
        }
        report.loaded = messages.len();
        self.messages = messages;

        info!(
            "Loaded {} messages from key {} ({} skipped)",
            report.loaded, self.key, report.skipped
        );
        Ok(report)
    }

    pub async fn persist(&self) -> Result<(), PersistenceError> {
        let records = self
            .messages
            .iter()
            .map(encode_message)
            .collect::<Result<Vec<_>, _>>()?;

        self.adapter.set_list(&self.key, &records).await?;
        debug!("Persisted {} messages to key {}", records.len(), self.key);
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}
