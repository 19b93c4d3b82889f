//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy with its own type, so dispatch is
//! resolved at compile time.

use std::sync::Arc;

use chatline_config::Config;
use chatline_conversation::{ControllerConfig, ConversationController, MessageStore};
use chatline_core::{Message, ModelClient, PersistenceAdapter};
use chatline_providers::ChatCompletionsClient;
use chatline_session::{FilePersistence, InMemoryPersistence};
use chrono::Local;
use tracing::info;

mod chat;
mod clear;
mod history;
mod info;
mod init;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use clear::ClearStrategy;
pub use history::HistoryStrategy;
pub use info::InfoStrategy;
pub use init::{InitInput, InitStrategy};
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// # Design Principles
/// - **Static dispatch**: All calls are monomorphized at compile time
/// - **Type safety**: Each strategy defines its own input type via associated type
/// - **Extensibility**: Adding new commands requires only implementing this trait
///
/// # Example
/// ```rust,ignore
/// struct MyStrategy;
///
/// impl CommandStrategy for MyStrategy {
///     type Input = MyInput;
///
///     async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
///         // Command logic here
///         Ok(())
///     }
/// }
/// ```
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    ///
    /// # Errors
    /// Returns an error if command execution fails.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Open the configured persistence backend.
///
/// `ephemeral` keeps the transcript in memory for the lifetime of the process.
fn open_adapter(config: &Config, ephemeral: bool) -> anyhow::Result<Arc<dyn PersistenceAdapter>> {
    if ephemeral {
        info!("Using in-memory transcript storage");
        return Ok(Arc::new(InMemoryPersistence::new()));
    }

    let path = config.storage_path()?;
    info!("Transcript path: {}", path.display());
    Ok(Arc::new(FilePersistence::new(path)))
}

/// Load the persisted transcript without starting a model client.
async fn open_store(config: &Config) -> anyhow::Result<MessageStore<Arc<dyn PersistenceAdapter>>> {
    let adapter = open_adapter(config, false)?;
    let mut store = MessageStore::new(adapter, config.storage.key.clone());
    let report = store.load().await?;
    if report.skipped > 0 {
        eprintln!("⚠️  {} stored messages could not be read", report.skipped);
    }
    Ok(store)
}

/// Build a controller from config and restore its transcript.
async fn build_controller(
    config: &Config,
    model_override: Option<String>,
    ephemeral: bool,
) -> anyhow::Result<ConversationController> {
    let model: Arc<dyn ModelClient> = Arc::new(ChatCompletionsClient::new(
        config.provider_settings(model_override),
    )?);
    let store = MessageStore::new(open_adapter(config, ephemeral)?, config.storage.key.clone());

    let mut controller_config =
        ControllerConfig::default().with_event_capacity(config.conversation.event_capacity);
    if let Some(timeout) = config.response_timeout() {
        controller_config = controller_config.with_response_timeout(timeout);
    }

    let controller = ConversationController::new(model, store, controller_config);
    let report = controller.load().await?;
    if report.skipped > 0 {
        eprintln!("⚠️  {} stored messages could not be read", report.skipped);
    }
    Ok(controller)
}

fn print_message(message: &Message) {
    let speaker = if message.is_user() { "You" } else { "Assistant" };
    let at = message.timestamp().with_timezone(&Local);
    println!("[{}] {speaker}: {}", at.format("%Y-%m-%d %H:%M"), message.text());
}
