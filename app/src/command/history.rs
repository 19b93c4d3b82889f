use chatline_config::Config;

use super::{open_store, print_message};

/// Strategy for printing the persisted transcript.
#[derive(Debug, Clone, Copy)]
pub struct HistoryStrategy;

impl super::CommandStrategy for HistoryStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let store = open_store(&config).await?;

        if store.is_empty() {
            println!("No messages yet.");
            return Ok(());
        }

        for message in store.snapshot() {
            print_message(message);
        }
        Ok(())
    }
}
