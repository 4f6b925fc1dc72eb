//! Retry wrapper around a model client.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::ModelClient;
use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::normalizer::NormalizedImage;

/// Fixed-delay retry policy, no backoff growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made after the first failure
    pub retries: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retries: config.model_retries,
            delay: config.model_retry_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Model access point shared by the classifier and both caches.
#[derive(Clone)]
pub struct ModelGateway {
    client: Arc<dyn ModelClient>,
    policy: RetryPolicy,
}

impl ModelGateway {
    pub fn new(client: Arc<dyn ModelClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Calls the model with `prompt` and an optional image.
    ///
    /// A blank prompt fails with [`ServiceError::InvalidRequest`] before any
    /// network activity. Failed attempts are retried per the policy; once the
    /// budget is spent the last error is returned. The reply is trimmed.
    pub async fn call_model(&self, prompt: &str, image: Option<&NormalizedImage>) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("prompt is empty".to_string()));
        }

        let attempts = self.policy.max_attempts();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.client.complete(prompt, image).await {
                Ok(text) => {
                    debug!(attempt, chars = text.len(), "model call succeeded");
                    return Ok(text.trim().to_string());
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "model call failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ServiceError::Upstream("model call was not attempted".to_string())))
    }
}
