use chatline_config::Config;

/// Strategy for displaying version information and where state lives.
#[derive(Debug, Clone, Copy)]
pub struct VersionStrategy;

impl super::CommandStrategy for VersionStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        println!("chatline {}", env!("CARGO_PKG_VERSION"));
        match Config::config_path() {
            Ok(path) if path.exists() => println!("config: {}", path.display()),
            Ok(path) => println!("config: {} (missing, run 'chatline init')", path.display()),
            Err(e) => println!("config: unavailable ({e})"),
        }
        Ok(())
    }
}
