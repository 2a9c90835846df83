use async_trait::async_trait;
use newswatch_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{ChatMessage, ChatRole, LlmProvider, LlmRequest, LlmResponse, Usage};

const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_base_url_opt(self, base_url: Option<String>) -> Self {
        match base_url {
            Some(url) => self.with_base_url(url),
            None => self,
        }
    }

    fn build_request(&self, request: &LlmRequest) -> AnthropicRequest {
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        // System-role chat messages fold into the top-level system prompt;
        // the Messages API accepts only user/assistant turns.
        let mut system = request.system.clone().unwrap_or_default();
        let mut messages = Vec::new();

        for ChatMessage { role, content } in &request.messages {
            match role {
                ChatRole::System => {
                    if !system.is_empty() {
                        system.push('\n');
                    }
                    system.push_str(content);
                }
                ChatRole::User | ChatRole::Assistant => {
                    messages.push(AnthropicMessage {
                        role: role.as_str().to_string(),
                        content: content.clone(),
                    });
                }
            }
        }

        AnthropicRequest {
            model,
            messages,
            system: if system.is_empty() { None } else { Some(system) },
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_id(&self) -> &str {
        "anthropic"
    }

    fn configured_model(&self) -> Option<&str> {
        Some(&self.model)
    }

    #[instrument(skip(self, request), fields(model))]
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = self.build_request(request);

        tracing::Span::current().record("model", body.model.as_str());
        debug!("anthropic request: model={}", body.model);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("anthropic request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "anthropic API error: status={status}, body={body}"
            )));
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("failed to parse anthropic response: {e}")))?;

        Ok(from_anthropic_response(api_response))
    }

    async fn health_check(&self) -> Result<bool> {
        let request = LlmRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: "ping".to_string(),
            }],
            system: None,
            max_tokens: Some(1),
            temperature: None,
        };

        match self.complete(&request).await {
            Ok(_) => Ok(true),
            Err(e) => {
                info!("anthropic health check failed: {e}");
                Ok(false)
            }
        }
    }
}

// --- Wire types (private) ---

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    model: String,
    usage: Option<AnthropicUsage>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

fn from_anthropic_response(response: AnthropicResponse) -> LlmResponse {
    let content = response
        .content
        .iter()
        .filter_map(|block| match block {
            AnthropicContentBlock::Text { text } => Some(text.as_str()),
            AnthropicContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    LlmResponse {
        content,
        model: response.model,
        usage: response.usage.map(|u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        }),
        stop_reason: response.stop_reason,
    }
}
