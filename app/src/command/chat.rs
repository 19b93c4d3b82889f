//! Interactive conversation command.
//!
//! Drives a single `ConversationController`: each line typed is one turn,
//! `/clear` empties the conversation and `/history` prints the transcript.

use std::io::Write;

use chatline_config::Config;
use chatline_conversation::{ConversationController, SessionEvent, TurnOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tracing::{debug, info};

use super::{build_controller, print_message};

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Optional model override
    pub model: Option<String>,
    /// Keep the transcript in memory only
    pub ephemeral: bool,
}

/// Strategy for executing the Chat command.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let controller = build_controller(&config, input.model, input.ephemeral).await?;
        let watcher = tokio::spawn(watch_events(controller.subscribe()));

        if let Some(message) = input.message {
            let outcome = controller.send_user_message(&message).await;
            render_outcome(&outcome);
        } else {
            run_interactive(&controller).await?;
        }

        // Closing the bus lets the watcher drain what is left, then exit.
        drop(controller);
        watcher.await?;
        Ok(())
    }
}

async fn run_interactive(controller: &ConversationController) -> anyhow::Result<()> {
    println!(
        "chatline ({}) - {} messages restored",
        controller.model_name(),
        controller.transcript().await.len()
    );
    println!("Commands: /clear, /history, exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "exit" | "quit" => break,
            "/clear" => {
                // Failure is reported by the event watcher; memory is already empty.
                if controller.clear_conversation().await.is_ok() {
                    println!("Conversation cleared.");
                }
            }
            "/history" => {
                for message in controller.transcript().await {
                    print_message(&message);
                }
            }
            _ => {
                let outcome = controller.send_user_message(input).await;
                render_outcome(&outcome);
            }
        }
    }

    info!(
        "Conversation ended: {} messages",
        controller.transcript().await.len()
    );
    Ok(())
}

fn render_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Replied(message) => println!("\n{}\n", message.text()),
        TurnOutcome::Failed(reason) => eprintln!("❌ Error: {reason}"),
        TurnOutcome::Discarded => eprintln!("(reply dropped: conversation was cleared)"),
        TurnOutcome::Rejected => eprintln!("Still waiting on the previous reply."),
        TurnOutcome::Ignored(_) => {}
    }
}

/// Surface storage problems the turn itself does not report.
async fn watch_events(mut events: Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::PersistenceWarning { reason }) => {
                eprintln!("⚠️  Could not save conversation: {reason}");
            }
            Ok(event) => debug!("Session event: {event:?}"),
            Err(RecvError::Lagged(missed)) => debug!("Event watcher lagged by {missed}"),
            Err(RecvError::Closed) => break,
        }
    }
}
