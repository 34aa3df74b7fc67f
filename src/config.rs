use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Placeholder the prompt template must contain
pub const CONTENT_PLACEHOLDER: &str = "{content}";

fn default_enabled() -> bool {
    true
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_max_chunk_size() -> usize {
    12000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_include_title() -> bool {
    true
}

fn default_input_extension() -> String {
    "srt".to_string()
}

fn default_output_extension() -> String {
    "txt".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Providers in fallback priority order
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
    pub rate_limit: RateLimitConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSpec {
    /// Provider name; also selects vendor-specific behavior
    pub name: String,
    /// Base URL of the OpenAI-compatible API (without /chat/completions)
    pub base_url: String,
    /// Model identifier sent with each request
    pub model: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Upper bound for max_tokens sent to this provider
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Proxy URL. Absent: system proxy settings. Empty string: direct connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Environment variable holding the API key (default: <NAME>_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Vendor-specific request body overrides
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra_params: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProxySetting<'a> {
    System,
    Direct,
    Url(&'a str),
}

impl ProviderSpec {
    pub fn credential_env(&self) -> String {
        match &self.api_key_env {
            Some(var) => var.clone(),
            None => format!("{}_API_KEY", self.name.to_uppercase().replace('-', "_")),
        }
    }

    pub fn proxy_setting(&self) -> ProxySetting<'_> {
        match self.proxy.as_deref() {
            None => ProxySetting::System,
            Some(url) if url.trim().is_empty() => ProxySetting::Direct,
            Some(url) => ProxySetting::Url(url),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Request budget; chunk and file dispatches are spaced 60/rpm seconds apart
    pub requests_per_minute: u32,
    /// Attempts per provider before falling back to the next one
    pub max_retries: u32,
    /// Seconds to wait between attempts on the same provider
    pub retry_delay: u64,
    /// Seconds a single provider call may take
    pub timeout: u64,
}

impl RateLimitConfig {
    pub fn request_interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.requests_per_minute.max(1) as f64)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Prompt template; `{content}` is replaced by the subtitle text
    pub prompt: String,
    /// Character count above which a document is split into chunks
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Requested output budget; each provider clamps it to its own max_tokens
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Write `# <file stem>` as the first line of each output
    #[serde(default = "default_include_title")]
    pub include_filename_as_title: bool,
    #[serde(default = "default_input_extension")]
    pub input_extension: String,
    #[serde(default = "default_output_extension")]
    pub output_extension: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderSpec {
                    name: "siliconflow".to_string(),
                    base_url: "https://api.siliconflow.cn/v1".to_string(),
                    model: "Qwen/Qwen2.5-72B-Instruct".to_string(),
                    enabled: true,
                    max_tokens: 4000,
                    proxy: None,
                    api_key_env: None,
                    extra_params: HashMap::new(),
                },
                ProviderSpec {
                    name: "alibaba".to_string(),
                    base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
                    model: "qwen-plus".to_string(),
                    enabled: true,
                    max_tokens: 4000,
                    proxy: Some(String::new()),
                    api_key_env: Some("DASHSCOPE_API_KEY".to_string()),
                    extra_params: HashMap::from([(
                        "enable_thinking".to_string(),
                        serde_json::Value::Bool(false),
                    )]),
                },
            ],
            rate_limit: RateLimitConfig {
                requests_per_minute: 10,
                max_retries: 3,
                retry_delay: 5,
                timeout: 60,
            },
            processing: ProcessingConfig {
                prompt: "The following text was extracted from video subtitles. \
                         Fix punctuation and grammar, merge broken sentences and split it into \
                         paragraphs. Do not add, drop or summarize content. \
                         Return only the cleaned text.\n\n{content}"
                    .to_string(),
                max_chunk_size: default_max_chunk_size(),
                temperature: default_temperature(),
                max_output_tokens: default_max_output_tokens(),
                include_filename_as_title: true,
                input_extension: default_input_extension(),
                output_extension: default_output_extension(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        std::fs::write(path, content)
            .map_err(|e| AppError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject settings that would make every run fail or misbehave
    pub fn validate(&self) -> Result<()> {
        if !self.processing.prompt.contains(CONTENT_PLACEHOLDER) {
            return Err(AppError::Config(format!(
                "processing.prompt must contain the {} placeholder",
                CONTENT_PLACEHOLDER
            )));
        }
        if self.processing.max_chunk_size == 0 {
            return Err(AppError::Config("processing.max_chunk_size must be greater than 0".to_string()));
        }
        if self.rate_limit.requests_per_minute == 0 {
            return Err(AppError::Config("rate_limit.requests_per_minute must be greater than 0".to_string()));
        }
        if self.rate_limit.timeout == 0 {
            return Err(AppError::Config("rate_limit.timeout must be at least 1 second".to_string()));
        }
        if self.rate_limit.max_retries == 0 {
            return Err(AppError::Config("rate_limit.max_retries must be at least 1".to_string()));
        }

        let mut seen = HashSet::new();
        for spec in &self.providers {
            if !seen.insert(spec.name.as_str()) {
                return Err(AppError::Config(format!("Duplicate provider name: {}", spec.name)));
            }
        }

        Ok(())
    }

    /// Enabled providers in priority order, optionally narrowed to one name
    pub fn select_providers(&self, only: Option<&str>) -> Result<Vec<&ProviderSpec>> {
        let enabled: Vec<&ProviderSpec> = self.providers.iter().filter(|p| p.enabled).collect();

        match only {
            None => Ok(enabled),
            Some(name) => {
                let selected: Vec<&ProviderSpec> =
                    enabled.iter().copied().filter(|p| p.name == name).collect();
                if selected.is_empty() {
                    let available = enabled.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
                    return Err(AppError::Config(format!(
                        "Provider '{}' is not configured or not enabled (enabled: {})",
                        name,
                        if available.is_empty() { "none".to_string() } else { available.join(", ") }
                    )));
                }
                Ok(selected)
            }
        }
    }
}

/// API keys resolved per provider name
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    keys: HashMap<String, String>,
}

impl Credentials {
    /// Look up each provider's key from the environment
    pub fn from_env(config: &Config) -> Self {
        let keys = config
            .providers
            .iter()
            .filter_map(|spec| {
                std::env::var(spec.credential_env())
                    .ok()
                    .filter(|key| !key.trim().is_empty())
                    .map(|key| (spec.name.clone(), key))
            })
            .collect();
        Self { keys }
    }

    pub fn get(&self, provider: &str) -> Option<&str> {
        self.keys.get(provider).map(String::as_str)
    }
}

impl FromIterator<(String, String)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}
