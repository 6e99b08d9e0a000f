//! Resilient calls: bounded sequential retries with per-attempt timeouts.
//!
//! Each completion attempt races the provider call against a timer. A lost
//! race is a `Timeout`; the in-flight call is dropped and its result, if any,
//! is discarded. Every failure kind is retried immediately while attempts
//! remain, and the last concrete failure is returned unchanged.

use memochat_config::AppConfig;
use memochat_core::error::ProviderError;
use memochat_core::provider::*;
use std::time::Duration;
use tracing::{info, warn};

/// Retry and timeout settings for chat completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never below 1.
    attempts: u32,
    /// Deadline for each attempt.
    timeout: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, timeout: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.completion.retries,
            Duration::from_millis(config.completion.timeout_ms),
        )
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a completion with this policy.
    pub async fn complete(
        &self,
        provider: &dyn Provider,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let retries_left = self.attempts - attempt;

            let error = match tokio::time::timeout(self.timeout, provider.complete(request.clone()))
                .await
            {
                Ok(Ok(response)) => {
                    if attempt > 1 {
                        info!(provider = %provider.name(), attempt, "Completion succeeded after retry");
                    }
                    return Ok(response);
                }
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout { timeout_ms },
            };

            log_failure(provider.name(), &error, attempt, retries_left);

            if retries_left == 0 {
                return Err(error);
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(300))
    }
}

fn log_failure(provider: &str, error: &ProviderError, attempt: u32, retries_left: u32) {
    match error {
        ProviderError::Timeout { timeout_ms } => warn!(
            provider,
            attempt,
            retries_left,
            timeout_ms,
            "Completion timed out"
        ),
        ProviderError::ApiRejection {
            status,
            code,
            message,
            error_type,
        } => warn!(
            provider,
            attempt,
            retries_left,
            status,
            code = code.as_deref().unwrap_or("-"),
            error_type = error_type.as_deref().unwrap_or("-"),
            message = %message,
            "Completion rejected by API"
        ),
        ProviderError::Unknown(reason) => warn!(
            provider,
            attempt,
            retries_left,
            reason = %reason,
            "Completion failed"
        ),
    }
}

/// Transcribe audio, retrying on any failure up to `attempts` total calls.
///
/// There is no timeout race here; each call runs to completion.
pub async fn transcribe_with_retry(
    provider: &dyn Provider,
    request: TranscriptionRequest,
    attempts: u32,
) -> std::result::Result<Transcription, ProviderError> {
    let attempts = attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match provider.transcribe(request.clone()).await {
            Ok(transcription) => return Ok(transcription),
            Err(e) => {
                let retries_left = attempts - attempt;
                warn!(
                    provider = %provider.name(),
                    attempt,
                    retries_left,
                    error = %e,
                    "Transcription failed"
                );
                if retries_left == 0 {
                    return Err(e);
                }
            }
        }
    }
}
