use async_trait::async_trait;
use newswatch_common::{Error, Result};
use newswatch_config::LlmConfig;
use serde::{Deserialize, Serialize};

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

/// Trait for LLM provider integrations (DeepSeek, OpenAI-compatible,
/// Anthropic). Failures surface as `Error::Provider` so callers can degrade
/// instead of aborting a monitoring cycle.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g. "openai", "anthropic").
    fn provider_id(&self) -> &str;

    /// Send a completion request and return the response.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Return the provider's configured default model, if known.
    fn configured_model(&self) -> Option<&str> {
        None
    }

    /// Check if the provider is reachable and configured.
    async fn health_check(&self) -> Result<bool>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Model override; empty means the provider's configured default.
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl LlmRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: String::new(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: user.into(),
            }],
            system: Some(system.into()),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_sampling(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = Some(temperature);
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Build the provider selected by config. "deepseek" is the OpenAI-compatible
/// wire protocol pointed at the DeepSeek endpoint.
pub fn build_provider(config: &LlmConfig) -> Result<Box<dyn LlmProvider>> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::Config("llm.api_key is not set".into()))?;

    match config.provider.as_str() {
        "deepseek" => Ok(Box::new(OpenAiProvider::new(
            api_key,
            Some(config.model.clone()),
            Some(
                config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| openai::DEEPSEEK_BASE_URL.to_string()),
            ),
        ))),
        "openai" => Ok(Box::new(OpenAiProvider::new(
            api_key,
            Some(config.model.clone()),
            config.base_url.clone(),
        ))),
        "anthropic" => Ok(Box::new(
            AnthropicProvider::new(api_key, Some(config.model.clone())).with_base_url_opt(
                config.base_url.clone(),
            ),
        )),
        other => Err(Error::Config(format!("unknown llm provider: {other}"))),
    }
}
