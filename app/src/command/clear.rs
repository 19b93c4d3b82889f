use chatline_config::Config;
use tracing::info;

use super::open_store;

/// Strategy for emptying the persisted transcript.
#[derive(Debug, Clone, Copy)]
pub struct ClearStrategy;

impl super::CommandStrategy for ClearStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let mut store = open_store(&config).await?;
        let removed = store.len();

        store.clear();
        store.persist().await?;

        info!("Cleared {removed} messages under key {}", store.key());
        println!("Cleared {removed} messages.");
        Ok(())
    }
}
