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

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod command;

use command::{
    ChatInput, ChatStrategy, ClearStrategy, CommandStrategy, HistoryStrategy, InfoStrategy,
    InitInput, InitStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "chatline")]
#[command(about = "chatline conversation client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant (interactive unless -m is given)
    Chat {
        /// Single message to send
        #[arg(short = 'm', long)]
        message: Option<String>,

        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,

        /// Do not read or write the stored transcript
        #[arg(long)]
        ephemeral: bool,
    },
    /// Print the stored transcript
    History,
    /// Delete the stored transcript
    Clear,
    /// Initialize configuration
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show configuration
    Info,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            message,
            model,
            ephemeral,
        } => {
            ChatStrategy
                .execute(ChatInput {
                    message,
                    model,
                    ephemeral,
                })
                .await
        }
        Commands::History => HistoryStrategy.execute(()).await,
        Commands::Clear => ClearStrategy.execute(()).await,
        Commands::Init { force } => InitStrategy.execute(InitInput { force }).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
