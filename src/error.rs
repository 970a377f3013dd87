// =============================================================================
// Error taxonomy
// =============================================================================
//
// Each component gets a concrete, matchable error enum rather than a bare
// `anyhow::Error` string, so callers upstream (the broker, the scheduler) can
// branch on kind — e.g. "is this retryable" — without string-sniffing.
// `anyhow::Context` remains the idiom at I/O boundaries with no matchable
// kind (config save, persistence writes) where the caller only logs and
// continues; `Config::load` gets its own typed variants below since startup
// needs to tell a missing file apart from a malformed one.
// =============================================================================

use thiserror::Error;

/// Errors from `MarketDataSource` and its collaborators (rate limiter,
/// cache, exchange facade).
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("unsupported timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("transient market data error: {0}")]
    Transient(String),

    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Errors from a `ModelAdapter::decide` call.
#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    #[error("adapter timed out")]
    Timeout,

    #[error("adapter rate-limited")]
    RateLimited,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

impl AdapterError {
    /// Whether the adapter's own retry loop should retry this kind.
    /// Per `spec.md` §4.3: only `Timeout` and `RateLimited` are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited)
    }
}

/// Errors from `ResponseValidator::validate`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("validation failed: {0}")]
pub struct ValidationError(pub String);

/// Errors from `PaperLedger::execute`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("circuit breaker tripped")]
    CircuitBreakerTripped,

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("insufficient funds")]
    InsufficientFunds,
}

/// Fatal errors raised at startup; these propagate to the outer wrapper and
/// abort the process (never surfaced per-round).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration from {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no models enabled")]
    NoEnabledModels,
}
