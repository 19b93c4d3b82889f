#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Shared types for the chatline conversation engine.
//!
//! Everything the engine exchanges with its two external capabilities lives
//! here: the `Message` entity, the persisted record codec, the error
//! taxonomy, and the `ModelClient` / `PersistenceAdapter` seams.

use std::sync::Arc;

use async_trait::async_trait;

pub mod error;
pub mod message;
pub mod record;
pub mod state;

pub use error::{ModelError, PersistenceError, SerializationError, ValidationError};
pub use message::{Message, Role};
pub use record::{PersistedRecord, decode_message, encode_message};
pub use state::SessionState;

/// Remote generative-text capability: text in, text or failure out.
///
/// `Ok(None)` means the service answered without any text; callers decide
/// whether that counts as a failure.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, ModelError>;
    fn model_name(&self) -> &str;
}

/// Durable string-keyed store of ordered string lists.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Returns the stored list, or an empty list when the key is absent.
    async fn get_list(&self, key: &str) -> Result<Vec<String>, PersistenceError>;
    async fn set_list(&self, key: &str, values: &[String]) -> Result<(), PersistenceError>;
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, ModelError> {
        (**self).generate(prompt).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[async_trait]
impl<T: PersistenceAdapter + ?Sized> PersistenceAdapter for Arc<T> {
    async fn get_list(&self, key: &str) -> Result<Vec<String>, PersistenceError> {
        (**self).get_list(key).await
    }

    async fn set_list(&self, key: &str, values: &[String]) -> Result<(), PersistenceError> {
        (**self).set_list(key, values).await
    }
}
