use chatline_providers::{ProviderSettings, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Overrides `model.api_key` when set and non-empty.
pub const API_KEY_ENV: &str = "CHATLINE_API_KEY";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub model: ModelSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub conversation: ConversationSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelSettings {
    #[serde(default = "ModelSettings::default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "ModelSettings::default_model")]
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Per HTTP attempt.
    #[serde(default = "ModelSettings::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl ModelSettings {
    fn default_base_url() -> String {
        "https://open.bigmodel.cn/api/paas/v4".to_string()
    }

    fn default_model() -> String {
        "glm-4-flash".to_string()
    }

    const fn default_request_timeout_secs() -> u64 {
        60
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    pub base_delays_secs: Vec<u64>,
    pub final_retries: usize,
    pub final_delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delays_secs: vec![2, 4, 6, 8],
            final_retries: 3,
            final_delay_secs: 10,
        }
    }
}

impl RetrySettings {
    #[must_use]
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delays: self
                .base_delays_secs
                .iter()
                .copied()
                .map(Duration::from_secs)
                .collect(),
            final_retries: self.final_retries,
            final_delay: Duration::from_secs(self.final_delay_secs),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageSettings {
    /// Defaults to `~/chatline/transcript.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "StorageSettings::default_key")]
    pub key: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: None,
            key: Self::default_key(),
        }
    }
}

impl StorageSettings {
    fn default_key() -> String {
        "messages".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConversationSettings {
    /// No timeout when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_timeout_secs: Option<u64>,
    #[serde(default = "ConversationSettings::default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            response_timeout_secs: None,
            event_capacity: Self::default_event_capacity(),
        }
    }
}

impl ConversationSettings {
    const fn default_event_capacity() -> usize {
        64
    }
}

impl Config {
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("chatline"))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'chatline init' to create config.",
                config_path.display()
            );
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)?;
        config.apply_api_key_override(std::env::var(API_KEY_ENV).ok());

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn apply_api_key_override(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            info!("Using API key from {API_KEY_ENV}");
            self.model.api_key = key;
        }
    }

    pub fn storage_path(&self) -> anyhow::Result<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("transcript.json")),
        }
    }

    #[must_use]
    pub fn response_timeout(&self) -> Option<Duration> {
        self.conversation
            .response_timeout_secs
            .map(Duration::from_secs)
    }

    #[must_use]
    pub fn provider_settings(&self, model_override: Option<String>) -> ProviderSettings {
        ProviderSettings {
            base_url: self.model.base_url.clone(),
            api_key: self.model.api_key.clone(),
            model: model_override.unwrap_or_else(|| self.model.model.clone()),
            system_prompt: self.model.system_prompt.clone(),
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
            request_timeout: Duration::from_secs(self.model.request_timeout_secs),
            retry: self.model.retry.to_policy(),
        }
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    /// `force` replaces an existing file with the template.
    pub fn create_config(force: bool) -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        Self::write_template(&config_path, force)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Edit the config file and add your API key (or export {API_KEY_ENV})");
        println!("   2. Run 'chatline chat' to start a conversation");
        println!();
        println!("🔧 Configuration options:");
        println!("   - model.base_url: any OpenAI-compatible chat completions endpoint");
        println!("   - storage.path: where the transcript is kept");
        println!("   - conversation.response_timeout_secs: give up on a slow reply");
        println!();
        Ok(())
    }

    pub fn write_template(config_path: &Path, force: bool) -> anyhow::Result<()> {
        if config_path.exists() && !force {
            anyhow::bail!(
                "Config file already exists at: {}. Edit it directly or run 'chatline init --force'.",
                config_path.display()
            );
        }

        let config_template = r#"{
  "model": {
    "base_url": "https://open.bigmodel.cn/api/paas/v4",
    "api_key": "your-api-key-here",
    "model": "glm-4-flash",
    "system_prompt": "You are a helpful AI assistant. Provide clear, concise responses.",
    "temperature": 0.7,
    "request_timeout_secs": 60
  },
  "storage": {
    "key": "messages"
  },
  "conversation": {
    "response_timeout_secs": 120,
    "event_capacity": 64
  }
}"#;

        std::fs::write(config_path, config_template)?;
        Ok(())
    }
}
