//! Provider gateway for scoring calls against OpenRouter chat completions.

pub mod error;
pub mod openrouter;

use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};

pub use error::GatewayError;
pub use openrouter::OpenRouterGateway;

/// Outcome metadata attached to every completed scoring call.
#[derive(Debug, Clone, Serialize)]
pub struct CallMetadata {
    pub success: bool,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
}

impl CallMetadata {
    pub fn failed(model: impl Into<String>) -> Self {
        Self {
            success: false,
            model: model.into(),
            input_tokens: 0,
            output_tokens: 0,
            latency_ms: 0,
        }
    }
}

/// Abstraction over the LLM provider used for anchor scoring.
///
/// Implementations are injected wherever scoring happens; nothing in the
/// crate talks to a provider directly. Tests substitute an in-process fake.
#[async_trait::async_trait]
pub trait ScoringGateway: Send + Sync {
    /// Send one scoring prompt and return the raw response text plus call
    /// metadata.
    async fn execute_call(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<(String, CallMetadata), GatewayError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

/// Retry wrapper around any [`ScoringGateway`].
///
/// Retries only errors the inner gateway marks retryable, with exponential
/// backoff from `retry_base_delay`.
pub struct RetryingGateway<G> {
    inner: G,
    config: GatewayConfig,
}

impl<G: ScoringGateway> RetryingGateway<G> {
    pub fn new(inner: G) -> Self {
        Self::with_config(inner, GatewayConfig::default())
    }

    pub fn with_config(inner: G, config: GatewayConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait::async_trait]
impl<G: ScoringGateway> ScoringGateway for RetryingGateway<G> {
    async fn execute_call(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<(String, CallMetadata), GatewayError> {
        let mut last_error: Option<GatewayError> = None;

        for attempt in 0..=self.config.max_retries {
            match self.inner.execute_call(model, prompt).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_retryable() || attempt == self.config.max_retries {
                        return Err(err);
                    }
                    let delay = backoff_delay(self.config.retry_base_delay, attempt);
                    warn!(
                        target: "discernus::gateway",
                        model,
                        attempt,
                        code = err.code(),
                        delay_ms = delay.as_millis() as u64,
                        "scoring call failed, retrying"
                    );
                    last_error = Some(err);
                    sleep(delay).await;
                }
            }
        }

        debug!(target: "discernus::gateway", model, "retry budget exhausted");
        Err(last_error
            .unwrap_or_else(|| GatewayError::provider("unknown gateway failure", false)))
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u64.pow(attempt.min(5));
    base * multiplier as u32
}
