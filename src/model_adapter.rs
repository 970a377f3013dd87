// =============================================================================
// ModelAdapter (capability) — spec.md §4.3, §9
// =============================================================================
//
// "A model is anything that, given the structured round payload, eventually
// yields a validated DecisionBundle." Modeled as a minimal async trait rather
// than a class hierarchy — concrete providers are opaque struct values
// carrying their own timeout, retry, and rate-limit state, exactly per the
// teacher's capability-based style (`ExchangeFacade` in `market_data/
// exchange.rs`) generalized from one fixed exchange to an arbitrary model
// provider.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{instrument, warn};

use crate::decision::DecisionBundle;
use crate::error::AdapterError;
use crate::market_data::rate_limiter::RateLimiter;
use crate::validator::ResponseValidator;

/// The shared-plus-personalized input handed to every model's `decide()`
/// call in one round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundPayload {
    pub elapsed_minutes: f64,
    pub round: u64,
    pub symbols: Vec<String>,
    pub snapshot: serde_json::Value,
    pub account: serde_json::Value,
}

#[async_trait]
pub trait ModelAdapter: Send + Sync {
    async fn decide(&self, payload: &RoundPayload) -> Result<DecisionBundle, AdapterError>;
}

/// Generic JSON-over-HTTP adapter: POSTs the round payload as a prompt,
/// passes the provider's raw text reply through `ResponseValidator`. Owns a
/// private rate limiter (separate bucket from the exchange's) and retries
/// only retryable error kinds with exponential backoff, per §4.3.
pub struct HttpModelAdapter {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
    limiter: RateLimiter,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpModelAdapter {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        max_requests_per_minute: usize,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            endpoint: endpoint.into(),
            api_key,
            client,
            limiter: RateLimiter::new(max_requests_per_minute, Duration::from_secs(60)),
            max_retries,
            retry_delay,
        }
    }

    async fn call_once(&self, payload: &RoundPayload) -> Result<String, AdapterError> {
        self.limiter.acquire().await;

        let mut req = self.client.post(&self.endpoint).json(payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout
            } else {
                AdapterError::Transport(e.to_string())
            }
        })?;

        if resp.status().as_u16() == 429 {
            return Err(AdapterError::RateLimited);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(AdapterError::Transport(format!("provider returned {status}")));
        }

        resp.text()
            .await
            .map_err(|e| AdapterError::BadResponse(e.to_string()))
    }
}

#[async_trait]
impl ModelAdapter for HttpModelAdapter {
    #[instrument(skip(self, payload), name = "model_adapter::decide")]
    async fn decide(&self, payload: &RoundPayload) -> Result<DecisionBundle, AdapterError> {
        let mut attempt = 0;
        loop {
            match self.call_once(payload).await {
                Ok(text) => {
                    return ResponseValidator::validate(&text)
                        .map_err(|e| AdapterError::ValidationFailed(e.0));
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = self.retry_delay * 2u32.pow(attempt);
                    warn!(attempt, ?backoff, error = %e, "retrying model adapter call");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for HttpModelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpModelAdapter")
            .field("endpoint", &self.endpoint)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}
