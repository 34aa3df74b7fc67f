use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{Credentials, ProviderSpec};
use crate::error::{AppError, Result};
use crate::provider::{Provider, ProviderFactory};

/// Live provider gateways for one run.
///
/// Owners must call `release_all` before exiting; dropping an unreleased
/// session only logs a warning.
pub struct ProviderSession {
    providers: Vec<Box<dyn Provider>>,
    released: bool,
}

impl ProviderSession {
    pub fn new(providers: Vec<Box<dyn Provider>>) -> Self {
        Self {
            providers,
            released: false,
        }
    }

    /// Build gateways for the selected specs
    pub fn open(specs: &[&ProviderSpec], credentials: &Credentials, timeout: Duration) -> Result<Self> {
        Ok(Self::new(ProviderFactory::create_providers(specs, credentials, timeout)?))
    }

    pub fn providers(&self) -> &[Box<dyn Provider>] {
        &self.providers
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Release every gateway, continuing past failures.
    ///
    /// Errors are logged and returned; none stops the remaining releases.
    pub async fn release_all(&mut self) -> Vec<AppError> {
        let mut errors = Vec::new();

        for provider in self.providers.iter_mut() {
            match provider.release().await {
                Ok(()) => debug!("Released {}", provider.name()),
                Err(e) => {
                    warn!("Failed to release provider {}: {}", e.provider, e.failure);
                    errors.push(AppError::ResourceRelease {
                        provider: e.provider,
                        message: e.failure.to_string(),
                    });
                }
            }
        }

        self.released = true;
        errors
    }
}

impl Drop for ProviderSession {
    fn drop(&mut self) {
        if !self.released && !self.providers.is_empty() {
            warn!(
                "Provider session dropped without release_all ({} providers)",
                self.providers.len()
            );
        }
    }
}
