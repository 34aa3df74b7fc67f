use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::chunk::split_into_chunks;
use crate::config::{CONTENT_PLACEHOLDER, Config};
use crate::dispatch::{FallbackDispatcher, GenerationParams, ProcessingResult, RetryPolicy};
use crate::error::{AppError, Result};
use crate::pacing::{Pacer, TokioPacer};
use crate::provider::Provider;

/// Separator between processed chunk results in the final document
pub const CHUNK_JOIN: &str = "\n\n";

/// Prompt text with a `{content}` placeholder
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(CONTENT_PLACEHOLDER) {
            return Err(AppError::Config(format!(
                "prompt template must contain {}",
                CONTENT_PLACEHOLDER
            )));
        }
        Ok(Self(template))
    }

    pub fn render(&self, content: &str) -> String {
        self.0.replace(CONTENT_PLACEHOLDER, content)
    }
}

/// Runs one document through the providers, chunking it when too long
pub struct ChunkedProcessor {
    dispatcher: FallbackDispatcher,
    template: PromptTemplate,
    max_chunk_size: usize,
    request_interval: Duration,
    params: GenerationParams,
    pacer: Arc<dyn Pacer>,
}

impl ChunkedProcessor {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_pacer(config, Arc::new(TokioPacer))
    }

    pub fn with_pacer(config: &Config, pacer: Arc<dyn Pacer>) -> Result<Self> {
        if config.processing.max_chunk_size == 0 {
            return Err(AppError::Config("max_chunk_size must be greater than 0".to_string()));
        }

        Ok(Self {
            dispatcher: FallbackDispatcher::with_pacer(
                RetryPolicy::from(&config.rate_limit),
                Arc::clone(&pacer),
            ),
            template: PromptTemplate::new(config.processing.prompt.clone())?,
            max_chunk_size: config.processing.max_chunk_size,
            request_interval: config.rate_limit.request_interval(),
            params: GenerationParams::from(config),
            pacer,
        })
    }

    /// Clean `raw_text` and return the joined result.
    ///
    /// Text within `max_chunk_size` characters is sent as one prompt.
    /// Longer text is split at sentence boundaries; chunks are dispatched in
    /// order with a rate-limit pause between them, and their results are
    /// joined with a blank line. The returned provider is the one that
    /// handled the last chunk. Any chunk failing fails the whole document.
    /// Blank text is rejected without contacting any provider.
    pub async fn process(&self, providers: &[Box<dyn Provider>], raw_text: &str) -> Result<ProcessingResult> {
        if raw_text.trim().is_empty() {
            return Err(AppError::Extraction("no text content to process".to_string()));
        }

        let length = raw_text.chars().count();

        if length <= self.max_chunk_size {
            debug!("Processing {} characters in a single request", length);
            let prompt = self.template.render(raw_text);
            return self.dispatcher.dispatch(providers, &prompt, &self.params).await;
        }

        let chunks = split_into_chunks(raw_text, self.max_chunk_size);
        let total = chunks.len();
        info!(
            "Text has {} characters (limit {}), processing in {} chunks",
            length, self.max_chunk_size, total
        );

        let mut results: Vec<ProcessingResult> = Vec::with_capacity(total);
        for chunk in &chunks {
            info!("  Chunk {}/{} ({} characters)", chunk.index + 1, total, chunk.char_len());

            let prompt = self.template.render(&chunk.text);
            let result = self
                .dispatcher
                .dispatch(providers, &prompt, &self.params)
                .await
                .map_err(|e| AppError::ChunkFailed {
                    index: chunk.index,
                    total,
                    source: Box::new(e),
                })?;
            debug!("  Chunk {}/{} done via {}", chunk.index + 1, total, result.provider);
            results.push(result);

            if chunk.index + 1 < total {
                self.pacer.pause(self.request_interval).await;
            }
        }

        let provider = results
            .last()
            .map(|r| r.provider.clone())
            .unwrap_or_default();
        let text = results
            .into_iter()
            .map(|r| r.text)
            .collect::<Vec<_>>()
            .join(CHUNK_JOIN);

        Ok(ProcessingResult { text, provider })
    }
}
