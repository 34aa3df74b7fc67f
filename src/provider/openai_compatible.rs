use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::{ProviderSpec, ProxySetting};
use crate::error::{AppError, ProviderError, ProviderFailure, Result};
use super::{Provider, Vendor, clamp_max_tokens};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Vendor-specific fields merged into the top level of the body
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Gateway for vendors speaking the OpenAI chat-completions protocol
pub struct ChatCompletionsProvider {
    name: String,
    model: String,
    endpoint: String,
    api_key: String,
    max_tokens: u32,
    extra_params: Map<String, Value>,
    /// Connection pool; `None` once released
    client: Option<Client>,
}

impl ChatCompletionsProvider {
    pub fn new(spec: &ProviderSpec, vendor: Vendor, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut builder = Client::builder().timeout(timeout);
        builder = match spec.proxy_setting() {
            ProxySetting::System => builder,
            ProxySetting::Direct => builder.no_proxy(),
            ProxySetting::Url(url) => builder.proxy(reqwest::Proxy::all(url).map_err(|e| {
                AppError::Config(format!("Provider {}: invalid proxy {}: {}", spec.name, url, e))
            })?),
        };
        let client = builder.build()?;

        let mut extra_params = vendor.default_params();
        for (key, value) in &spec.extra_params {
            extra_params.insert(key.clone(), value.clone());
        }

        Ok(Self {
            name: spec.name.clone(),
            model: spec.model.clone(),
            endpoint: format!("{}/chat/completions", spec.base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            max_tokens: spec.max_tokens,
            extra_params,
            client: Some(client),
        })
    }

    pub fn build_request(&self, prompt: &str, temperature: f32, max_output_tokens: u32) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature,
            max_tokens: clamp_max_tokens(max_output_tokens, self.max_tokens),
            extra: self.extra_params.clone(),
        }
    }

    pub fn is_released(&self) -> bool {
        self.client.is_none()
    }

    fn error(&self, failure: ProviderFailure) -> ProviderError {
        ProviderError::new(self.name.clone(), failure)
    }

    fn classify_status(&self, status: StatusCode, body: String) -> ProviderError {
        let failure = match status {
            StatusCode::TOO_MANY_REQUESTS => ProviderFailure::RateLimited(body),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ProviderFailure::InvalidParameter(body),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderFailure::Timeout,
            _ => ProviderFailure::Api {
                status: status.as_u16(),
                message: body,
            },
        };
        self.error(failure)
    }
}

/// Pull the generated text out of a chat-completions body
pub fn extract_content(response: ChatCompletionResponse) -> std::result::Result<String, ProviderFailure> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderFailure::MalformedResponse("response has no choices".to_string()))?;

    let content = choice.message.content.unwrap_or_default();
    let content = content.trim();
    if content.is_empty() {
        return Err(ProviderFailure::EmptyResponse);
    }
    Ok(content.to_string())
}

#[async_trait]
impl Provider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_tokens_ceiling(&self) -> u32 {
        self.max_tokens
    }

    async fn submit(
        &self,
        prompt: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> std::result::Result<String, ProviderError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| self.error(ProviderFailure::Released))?;

        let request = self.build_request(prompt, temperature, max_output_tokens);
        debug!(
            "Sending chat completion to {} (model {}, max_tokens {})",
            self.endpoint, request.model, request.max_tokens
        );

        let response = client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.error(ProviderFailure::Timeout)
                } else {
                    self.error(ProviderFailure::Transport(e.to_string()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_status(status, body));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.error(ProviderFailure::Timeout)
            } else {
                self.error(ProviderFailure::MalformedResponse(e.to_string()))
            }
        })?;

        extract_content(body).map_err(|failure| self.error(failure))
    }

    async fn release(&mut self) -> std::result::Result<(), ProviderError> {
        if let Some(client) = self.client.take() {
            // Dropping the last handle closes pooled connections
            drop(client);
            debug!("Released provider {}", self.name);
        }
        Ok(())
    }
}
