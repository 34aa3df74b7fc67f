//! Scripted provider for tests.
//!
//! - `MockProvider::working(name, reply)` always succeeds
//! - `MockProvider::failing(name)` always fails with a transport error
//! - `MockProvider::scripted(name, replies)` plays back a fixed sequence

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ProviderError, ProviderFailure};
use super::Provider;

type Reply = std::result::Result<String, ProviderFailure>;

#[derive(Debug, Clone)]
enum Behavior {
    Working(String),
    /// Echo the prompt back, prefixed with the given marker
    Echo(String),
    Failing,
    Scripted(Arc<Mutex<VecDeque<Reply>>>),
}

/// Counters shared with the test after the provider is boxed
#[derive(Debug, Default)]
pub struct MockStats {
    pub submits: AtomicUsize,
    pub releases: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub max_tokens_seen: Mutex<Vec<u32>>,
}

impl MockStats {
    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[derive(Debug)]
pub struct MockProvider {
    name: String,
    behavior: Behavior,
    ceiling: u32,
    released: bool,
    release_error: Option<String>,
    stats: Arc<MockStats>,
}

impl MockProvider {
    fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            ceiling: 4000,
            released: false,
            release_error: None,
            stats: Arc::new(MockStats::default()),
        }
    }

    pub fn working(name: &str, reply: &str) -> Self {
        Self::new(name, Behavior::Working(reply.to_string()))
    }

    pub fn echo(name: &str, marker: &str) -> Self {
        Self::new(name, Behavior::Echo(marker.to_string()))
    }

    pub fn failing(name: &str) -> Self {
        Self::new(name, Behavior::Failing)
    }

    pub fn scripted(name: &str, replies: Vec<Reply>) -> Self {
        Self::new(name, Behavior::Scripted(Arc::new(Mutex::new(replies.into()))))
    }

    pub fn with_ceiling(mut self, ceiling: u32) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Make the first `release` call fail
    pub fn with_release_error(mut self, message: &str) -> Self {
        self.release_error = Some(message.to_string());
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }

    pub fn boxed(self) -> Box<dyn Provider> {
        Box::new(self)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn max_tokens_ceiling(&self) -> u32 {
        self.ceiling
    }

    async fn submit(
        &self,
        prompt: &str,
        _temperature: f32,
        max_output_tokens: u32,
    ) -> std::result::Result<String, ProviderError> {
        self.stats.submits.fetch_add(1, Ordering::SeqCst);
        self.stats.prompts.lock().unwrap().push(prompt.to_string());
        self.stats
            .max_tokens_seen
            .lock()
            .unwrap()
            .push(super::clamp_max_tokens(max_output_tokens, self.ceiling));

        if self.released {
            return Err(ProviderError::new(&self.name, ProviderFailure::Released));
        }

        let reply = match &self.behavior {
            Behavior::Working(text) => Ok(text.clone()),
            Behavior::Echo(marker) => Ok(format!("{}{}", marker, prompt)),
            Behavior::Failing => Err(ProviderFailure::Transport("connection refused".to_string())),
            Behavior::Scripted(replies) => replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderFailure::EmptyResponse)),
        };
        reply.map_err(|failure| ProviderError::new(&self.name, failure))
    }

    async fn release(&mut self) -> std::result::Result<(), ProviderError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.stats.releases.fetch_add(1, Ordering::SeqCst);

        match self.release_error.take() {
            Some(message) => Err(ProviderError::new(&self.name, ProviderFailure::Transport(message))),
            None => Ok(()),
        }
    }
}
