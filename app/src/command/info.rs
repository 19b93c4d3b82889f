use chatline_config::{API_KEY_ENV, Config};

use super::open_store;

/// Strategy for displaying configuration information.
///
/// Outputs the model endpoint (API key masked), retry and timeout settings,
/// and where the transcript lives and how large it is.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== chatline Configuration ===\n");

        println!("Model:");
        println!("  Base URL: {}", config.model.base_url);
        println!("  Name: {}", config.model.model);
        println!("  API Key: {}", mask_secret(&config.model.api_key));
        if std::env::var(API_KEY_ENV).is_ok_and(|v| !v.is_empty()) {
            println!("  (API key taken from {API_KEY_ENV})");
        }
        if let Some(temperature) = config.model.temperature {
            println!("  Temperature: {temperature}");
        }
        if let Some(max_tokens) = config.model.max_tokens {
            println!("  Max Tokens: {max_tokens}");
        }
        if let Some(ref prompt) = config.model.system_prompt {
            println!("  System Prompt: {}", truncate(prompt, 60));
        }
        println!("  Request Timeout: {}s", config.model.request_timeout_secs);
        let retry = config.model.retry.to_policy();
        println!("  Attempts per turn: {}", retry.total_attempts());
        println!();

        println!("Conversation:");
        match config.response_timeout() {
            Some(timeout) => println!("  Response Timeout: {timeout:?}"),
            None => println!("  Response Timeout: (none)"),
        }
        println!("  Event Capacity: {}", config.conversation.event_capacity);
        println!();

        println!("Storage:");
        println!("  Path: {}", config.storage_path()?.display());
        println!("  Key: {}", config.storage.key);
        match open_store(&config).await {
            Ok(store) => println!("  Messages: {}", store.len()),
            Err(e) => {
                println!("  Status: unreadable");
                println!("  Error: {e}");
            }
        }

        Ok(())
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.is_empty() {
        "(not set)".to_string()
    } else if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "(not set)");
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("sk-1234567890abcd"), "sk-1...abcd");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world, again", 10), "hello w...");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }
}
