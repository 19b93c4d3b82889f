use std::time::Duration;

use async_trait::async_trait;
use chatline_core::{ModelClient, ModelError};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::retry::{RetryPolicy, retry_with_backoff};

/// Everything the client needs, injected by the caller.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Upper bound for one HTTP attempt, connect to last body byte.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

/// `ModelClient` for any OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionsClient {
    client: Client,
    settings: ProviderSettings,
}

impl ChatCompletionsClient {
    pub fn new(settings: ProviderSettings) -> anyhow::Result<Self> {
        info!(
            "Creating ChatCompletionsClient: base_url={}, model={}",
            settings.base_url, settings.model
        );
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    #[must_use]
    pub const fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn build_request(&self, prompt: &str) -> Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self
            .settings
            .system_prompt
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let mut request = json!({
            "model": self.settings.model,
            "messages": messages,
        });
        if let Some(temperature) = self.settings.temperature {
            request["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.settings.max_tokens {
            request["max_tokens"] = json!(max_tokens);
        }
        request
    }

    /// Helper method to send a single request
    async fn try_send(&self, request: &Value) -> anyhow::Result<Option<String>> {
        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.settings.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.settings.api_key)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        parse_completion(&response)
    }
}

/// Transport failures, timeouts, 429 and 5xx are worth another attempt.
/// Other statuses and malformed bodies fail the turn straight away.
fn is_transient(error: &anyhow::Error) -> bool {
    let Some(error) = error.downcast_ref::<reqwest::Error>() else {
        return false;
    };
    match error.status() {
        Some(status) => status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
        None => error.is_timeout() || error.is_connect() || error.is_request(),
    }
}

/// Extract `choices[0].message.content`. A null or missing content is an
/// absent answer, not an error.
fn parse_completion(response: &Value) -> anyhow::Result<Option<String>> {
    let choices = response
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("Invalid response format: missing choices"))?;

    let Some(first) = choices.first() else {
        return Ok(None);
    };

    match first.get("message").and_then(|m| m.get("content")) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(content)) => Ok(Some(content.clone())),
        Some(other) => anyhow::bail!("Invalid response format: content is {other}"),
    }
}

#[async_trait]
impl ModelClient for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, ModelError> {
        if self.settings.api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("API key is not configured").into());
        }

        let request = self.build_request(prompt);

        info!(
            "Sending request to chat completions API: model={}",
            self.settings.model
        );

        let content =
            retry_with_backoff(|| self.try_send(&request), &self.settings.retry, is_transient)
                .await?;

        debug!(
            "Received response: {} chars",
            content.as_deref().map_or(0, str::len)
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}
