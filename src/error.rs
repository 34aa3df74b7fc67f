use thiserror::Error;

/// Why a single provider call failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderFailure {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("empty response")]
    EmptyResponse,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("provider already released")]
    Released,
}

/// A provider call failure, tagged with the provider that produced it
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{provider}: {failure}")]
pub struct ProviderError {
    pub provider: String,
    pub failure: ProviderFailure,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, failure: ProviderFailure) -> Self {
        Self {
            provider: provider.into(),
            failure,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Subtitle extraction error: {0}")]
    Extraction(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("All providers failed: {}", describe_attempts(.0))]
    AllProvidersFailed(Vec<ProviderError>),

    #[error("Chunk {} of {total} failed: {source}", .index + 1)]
    ChunkFailed {
        index: usize,
        total: usize,
        #[source]
        source: Box<AppError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to release provider {provider}: {message}")]
    ResourceRelease { provider: String, message: String },

    #[error("File not found: {0}")]
    FileNotFound(String),
}

fn describe_attempts(attempts: &[ProviderError]) -> String {
    if attempts.is_empty() {
        return "no providers were tried".to_string();
    }
    attempts
        .iter()
        .map(|e| format!("[{}]", e))
        .collect::<Vec<_>>()
        .join(", ")
}

impl AppError {
    /// Names of the providers recorded in an `AllProvidersFailed` error
    pub fn failed_providers(&self) -> Vec<&str> {
        match self {
            AppError::AllProvidersFailed(attempts) => {
                attempts.iter().map(|e| e.provider.as_str()).collect()
            }
            AppError::ChunkFailed { source, .. } => source.failed_providers(),
            _ => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
