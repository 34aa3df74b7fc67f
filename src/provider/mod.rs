// Provider gateways
//
// Every backend is an implementation of the `Provider` trait. Vendors that speak
// the OpenAI chat-completions protocol share one HTTP gateway and differ only in
// their `Vendor` entry (token ceiling, default request parameters).
//
// To add a vendor with a different wire protocol:
// 1. Implement `Provider` for a new gateway type in its own module
// 2. Add a `Vendor` variant and map it in `ProviderFactory::create_provider`

pub mod openai_compatible;
pub mod vendor;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

pub use openai_compatible::ChatCompletionsProvider;
pub use vendor::Vendor;

use crate::config::{Credentials, ProviderSpec};
use crate::error::{AppError, ProviderError, Result};

/// Uniform capability over one backend LLM API
#[async_trait]
pub trait Provider: Send + Sync {
    /// Configured provider name, used in logs and errors
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Highest `max_tokens` value this provider will be sent
    fn max_tokens_ceiling(&self) -> u32;

    /// Send a prompt and return the generated text.
    ///
    /// `max_output_tokens` is clamped to `max_tokens_ceiling()` before the call.
    async fn submit(
        &self,
        prompt: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> std::result::Result<String, ProviderError>;

    /// Close network resources. Calling it again is a no-op.
    async fn release(&mut self) -> std::result::Result<(), ProviderError>;
}

/// Clamp a requested output budget to a provider's ceiling
pub fn clamp_max_tokens(requested: u32, ceiling: u32) -> u32 {
    requested.min(ceiling)
}

/// Factory for creating provider gateways from configuration
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create one gateway, validating the spec against its vendor's limits
    pub fn create_provider(
        spec: &ProviderSpec,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Provider>> {
        let vendor = Vendor::from_name(&spec.name);

        if spec.max_tokens == 0 {
            return Err(AppError::Config(format!(
                "Provider {}: max_tokens must be greater than 0",
                spec.name
            )));
        }
        if let Some(ceiling) = vendor.max_tokens_ceiling() {
            if spec.max_tokens > ceiling {
                return Err(AppError::Config(format!(
                    "Provider {}: max_tokens {} exceeds the {} limit of {}",
                    spec.name,
                    spec.max_tokens,
                    vendor.display_name(),
                    ceiling
                )));
            }
        }

        match vendor {
            Vendor::SiliconFlow | Vendor::Alibaba | Vendor::OpenAiCompatible => Ok(Box::new(
                ChatCompletionsProvider::new(spec, vendor, api_key, timeout)?,
            )),
        }
    }

    /// Create gateways for every selected spec.
    ///
    /// A spec with a missing credential or invalid limits is reported and
    /// skipped; an empty result is a configuration error.
    pub fn create_providers(
        specs: &[&ProviderSpec],
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Vec<Box<dyn Provider>>> {
        let mut providers = Vec::new();

        for spec in specs {
            let Some(api_key) = credentials.get(&spec.name) else {
                warn!(
                    "Skipping provider {}: no API key (set {})",
                    spec.name,
                    spec.credential_env()
                );
                continue;
            };

            match Self::create_provider(spec, api_key, timeout) {
                Ok(provider) => {
                    info!("Provider ready: {} ({})", provider.name(), provider.model());
                    providers.push(provider);
                }
                Err(e) => warn!("Skipping provider {}: {}", spec.name, e),
            }
        }

        if providers.is_empty() {
            return Err(AppError::Config(
                "No available providers. Check enabled providers and API keys.".to_string(),
            ));
        }

        Ok(providers)
    }
}
