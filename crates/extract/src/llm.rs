use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::retry::{RetryConfig, RetryPolicy};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Connection settings for an OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl LlmSettings {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            request_timeout_secs: 120,
            retry: RetryConfig::default(),
        }
    }

    /// Resolve settings from the environment.
    ///
    /// Key: `GRAPHRAG_CHAT_API_KEY`, then `OPENAI_API_KEY`.
    /// Base URL: `GRAPHRAG_API_BASE`.
    /// Model: `model_override`, then `GRAPHRAG_CHAT_MODEL`, then `OPENAI_MODEL`.
    pub fn from_env(model_override: Option<&str>) -> Result<Self> {
        Self::from_lookup(model_override, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(model_override: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("GRAPHRAG_CHAT_API_KEY")
            .or_else(|| non_empty("OPENAI_API_KEY"))
            .context("Set GRAPHRAG_CHAT_API_KEY or OPENAI_API_KEY to use the LLM stages")?;

        let mut settings = Self::new(api_key);
        if let Some(base_url) = non_empty("GRAPHRAG_API_BASE") {
            settings.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(model) = model_override
            .map(str::to_string)
            .or_else(|| non_empty("GRAPHRAG_CHAT_MODEL"))
            .or_else(|| non_empty("OPENAI_MODEL"))
        {
            settings.model = model;
        }

        Ok(settings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct ChatClient {
    settings: LlmSettings,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            retry: RetryPolicy::from(&settings.retry),
            settings,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Send one chat completion request, without retry.
    pub async fn complete_once(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.settings.base_url);

        let request = ChatRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completion request failed: {} {}", status, body);
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let content = parse_reply(body)?;
        debug!(model = %self.settings.model, chars = content.len(), "Chat completion received");
        Ok(content)
    }

    /// Chat completion with exponential backoff on failure.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.retry
            .retry("chat_completion", || self.complete_once(messages))
            .await
    }
}

fn parse_reply(body: ChatResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .context("Chat completion response had no content")
}
