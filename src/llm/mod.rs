//! Minimal chat-completions client for the classifier and report generator.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint. One client is
//! shared by both collaborators; every request carries a bounded timeout so a
//! hung endpoint can never wedge a session transition.

use crate::config::LlmSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key was found in the configured environment variable.
    #[error("no API key in ${0}")]
    MissingApiKey(String),
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat endpoint returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("chat endpoint returned no choices")]
    EmptyResponse,
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// ─── Client ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Build from config. The API key is read from the environment variable
    /// named in the settings; a missing key is not fatal here — each request
    /// fails with [`LlmError::MissingApiKey`] and callers apply their
    /// degradation policy.
    pub fn from_settings(settings: &LlmSettings) -> Self {
        let api_key = std::env::var(&settings.api_key_env).ok().filter(|k| !k.is_empty());
        Self::new(
            &settings.base_url,
            &settings.model,
            api_key,
            &settings.api_key_env,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        api_key_env: &str,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            api_key_env: api_key_env.to_string(),
        }
    }

    /// Run one system+user exchange and return the assistant text.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::MissingApiKey(self.api_key_env.clone()))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let parsed: ChatResponse = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)?;
        debug!(chars = content.len(), "chat completion received");
        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_fails_before_any_network_call() {
        let client = ChatClient::new(
            "https://example.invalid/v1",
            "gpt-4o",
            None,
            "SCRIBED_TEST_NO_SUCH_KEY",
            Duration::from_secs(1),
        );
        let err = client.complete("sys", "user", 10, 0.0).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey(_)));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ChatClient::new(
            "https://example.invalid/v1/",
            "m",
            Some("k".into()),
            "E",
            Duration::from_secs(1),
        );
        assert_eq!(client.base_url, "https://example.invalid/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let client = ChatClient::new(
            "https://example.invalid/v1",
            "m",
            Some("sk-secret".into()),
            "E",
            Duration::from_secs(1),
        );
        let out = format!("{client:?}");
        assert!(!out.contains("sk-secret"));
    }
}
