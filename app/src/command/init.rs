use chatline_config::Config;
use tracing::warn;

/// Input parameters for the Init command strategy.
#[derive(Debug, Clone, Copy)]
pub struct InitInput {
    /// Replace an existing config file with the template
    pub force: bool,
}

/// Strategy for writing the config template to `~/chatline/config.json`.
///
/// The transcript is never touched, so `--force` only resets settings.
#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl super::CommandStrategy for InitStrategy {
    type Input = InitInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        if input.force {
            warn!("Overwriting existing configuration with the template");
        }
        Config::create_config(input.force)
    }
}
