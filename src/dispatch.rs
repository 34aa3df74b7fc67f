use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, RateLimitConfig};
use crate::error::{AppError, ProviderError, ProviderFailure, Result};
use crate::pacing::{Pacer, TokioPacer};
use crate::provider::Provider;

/// Retry and timeout settings applied to every provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per provider, at least one
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&RateLimitConfig> for RetryPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
            timeout: config.timeout(),
        }
    }
}

/// Sampling settings sent with each prompt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 4000,
        }
    }
}

impl From<&Config> for GenerationParams {
    fn from(config: &Config) -> Self {
        Self {
            temperature: config.processing.temperature,
            max_output_tokens: config.processing.max_output_tokens,
        }
    }
}

/// Text produced for one prompt and the provider that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    pub text: String,
    pub provider: String,
}

/// Tries providers in priority order until one answers
pub struct FallbackDispatcher {
    policy: RetryPolicy,
    pacer: Arc<dyn Pacer>,
}

impl FallbackDispatcher {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_pacer(policy, Arc::new(TokioPacer))
    }

    pub fn with_pacer(policy: RetryPolicy, pacer: Arc<dyn Pacer>) -> Self {
        Self { policy, pacer }
    }

    /// Send `prompt` to each provider in order.
    ///
    /// Each provider gets `max_retries` attempts with `retry_delay` between
    /// them; earlier providers are never revisited. Fails with
    /// `AllProvidersFailed` carrying each provider's last error.
    pub async fn dispatch(
        &self,
        providers: &[Box<dyn Provider>],
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProcessingResult> {
        let max_retries = self.policy.max_retries.max(1);
        let mut failures = Vec::with_capacity(providers.len());

        for provider in providers {
            let mut last_error = None;

            for attempt in 1..=max_retries {
                info!(
                    "Trying {} ({}) attempt {}/{}",
                    provider.name(),
                    provider.model(),
                    attempt,
                    max_retries
                );

                match self.attempt(provider.as_ref(), prompt, params).await {
                    Ok(text) => {
                        return Ok(ProcessingResult {
                            text,
                            provider: provider.name().to_string(),
                        });
                    }
                    Err(e) => {
                        warn!("Error with {}: {}", provider.name(), e.failure);
                        last_error = Some(e);
                    }
                }

                if attempt < max_retries {
                    self.pacer.pause(self.policy.retry_delay).await;
                }
            }

            if let Some(e) = last_error {
                failures.push(e);
            }
        }

        Err(AppError::AllProvidersFailed(failures))
    }

    async fn attempt(
        &self,
        provider: &dyn Provider,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<String, ProviderError> {
        let call = provider.submit(prompt, params.temperature, params.max_output_tokens);
        match tokio::time::timeout(self.policy.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::new(provider.name(), ProviderFailure::Timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::MockPacer;
    use crate::provider::mock::MockProvider;
    use mockall::predicate::eq;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            retry_delay: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
        }
    }

    fn pacer_expecting(pauses: usize) -> Arc<dyn Pacer> {
        let mut pacer = MockPacer::new();
        pacer
            .expect_pause()
            .with(eq(Duration::from_secs(5)))
            .times(pauses)
            .return_const(());
        Arc::new(pacer)
    }

    #[tokio::test]
    async fn test_first_provider_success_skips_the_rest() {
        let a = MockProvider::working("a", "from a");
        let b = MockProvider::working("b", "from b");
        let (a_stats, b_stats) = (a.stats(), b.stats());
        let providers = vec![a.boxed(), b.boxed()];

        let dispatcher = FallbackDispatcher::with_pacer(policy(3), pacer_expecting(0));
        let result = dispatcher.dispatch(&providers, "prompt", &GenerationParams::default()).await.unwrap();

        assert_eq!(result, ProcessingResult { text: "from a".into(), provider: "a".into() });
        assert_eq!(a_stats.submits(), 1);
        assert_eq!(b_stats.submits(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_after_exhausting_retries() {
        let a = MockProvider::failing("a");
        let b = MockProvider::working("b", "from b");
        let (a_stats, b_stats) = (a.stats(), b.stats());
        let providers = vec![a.boxed(), b.boxed()];

        // Two pauses between a's three attempts, none after the last one
        let dispatcher = FallbackDispatcher::with_pacer(policy(3), pacer_expecting(2));
        let result = dispatcher.dispatch(&providers, "prompt", &GenerationParams::default()).await.unwrap();

        assert_eq!(result.provider, "b");
        assert_eq!(result.text, "from b");
        assert_eq!(a_stats.submits(), 3);
        assert_eq!(b_stats.submits(), 1);
    }

    #[tokio::test]
    async fn test_retry_on_same_provider_recovers() {
        let a = MockProvider::scripted(
            "a",
            vec![
                Err(ProviderFailure::RateLimited("429".into())),
                Ok("second try".into()),
            ],
        );
        let b = MockProvider::working("b", "from b");
        let (a_stats, b_stats) = (a.stats(), b.stats());
        let providers = vec![a.boxed(), b.boxed()];

        let dispatcher = FallbackDispatcher::with_pacer(policy(3), pacer_expecting(1));
        let result = dispatcher.dispatch(&providers, "prompt", &GenerationParams::default()).await.unwrap();

        assert_eq!(result, ProcessingResult { text: "second try".into(), provider: "a".into() });
        assert_eq!(a_stats.submits(), 2);
        assert_eq!(b_stats.submits(), 0);
    }

    #[tokio::test]
    async fn test_all_failing_names_every_provider() {
        let a = MockProvider::failing("a");
        let b = MockProvider::scripted(
            "b",
            vec![Err(ProviderFailure::Timeout), Err(ProviderFailure::EmptyResponse)],
        );
        let (a_stats, b_stats) = (a.stats(), b.stats());
        let providers = vec![a.boxed(), b.boxed()];

        let dispatcher = FallbackDispatcher::with_pacer(policy(2), pacer_expecting(2));
        let err = dispatcher
            .dispatch(&providers, "prompt", &GenerationParams::default())
            .await
            .unwrap_err();

        match &err {
            AppError::AllProvidersFailed(failures) => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].provider, "a");
                assert_eq!(failures[1].provider, "b");
                // Last error per provider, not the first
                assert_eq!(failures[1].failure, ProviderFailure::EmptyResponse);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.failed_providers(), vec!["a", "b"]);
        assert_eq!(a_stats.submits(), 2);
        assert_eq!(b_stats.submits(), 2);
    }

    #[tokio::test]
    async fn test_empty_provider_list_fails() {
        let dispatcher = FallbackDispatcher::with_pacer(policy(3), pacer_expecting(0));
        let err = dispatcher.dispatch(&[], "prompt", &GenerationParams::default()).await.unwrap_err();
        assert!(matches!(err, AppError::AllProvidersFailed(ref f) if f.is_empty()));
    }

    #[tokio::test]
    async fn test_max_tokens_clamped_per_provider() {
        let a = MockProvider::working("a", "ok").with_ceiling(1024);
        let a_stats = a.stats();
        let providers = vec![a.boxed()];

        let params = GenerationParams { temperature: 0.2, max_output_tokens: 8192 };
        let dispatcher = FallbackDispatcher::with_pacer(policy(1), pacer_expecting(0));
        dispatcher.dispatch(&providers, "prompt", &params).await.unwrap();

        assert_eq!(*a_stats.max_tokens_seen.lock().unwrap(), vec![1024]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_and_falls_back() {
        struct Stalled;

        #[async_trait::async_trait]
        impl Provider for Stalled {
            fn name(&self) -> &str {
                "stalled"
            }
            fn model(&self) -> &str {
                "slow"
            }
            fn max_tokens_ceiling(&self) -> u32 {
                4000
            }
            async fn submit(&self, _prompt: &str, _temperature: f32, _max_tokens: u32) -> std::result::Result<String, ProviderError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("too late".into())
            }
            async fn release(&mut self) -> std::result::Result<(), ProviderError> {
                Ok(())
            }
        }

        let providers: Vec<Box<dyn Provider>> = vec![Box::new(Stalled), MockProvider::working("b", "fast").boxed()];
        let dispatcher = FallbackDispatcher::new(RetryPolicy {
            max_retries: 1,
            retry_delay: Duration::ZERO,
            timeout: Duration::from_secs(60),
        });

        let result = dispatcher.dispatch(&providers, "prompt", &GenerationParams::default()).await.unwrap();
        assert_eq!(result.provider, "b");
    }

    #[test]
    fn test_policy_from_rate_limit_config() {
        let config = Config::default();
        let policy = RetryPolicy::from(&config.rate_limit);
        assert_eq!(policy, RetryPolicy::default());
    }
}
