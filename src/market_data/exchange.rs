// =============================================================================
// ExchangeFacade — the external collaborator MarketDataSource is built on
// =============================================================================
//
// `spec.md` §6 fixes this interface: `fetchOHLCV(symbol, timeframe, since,
// limit) -> [[tMillis,o,h,l,c,v]]` oldest-first, `fetchTicker(symbol) ->
// {last}`, `close()`. Modeled as a trait so MarketDataSource is testable
// without a network — the teacher keeps transport (`binance/client.rs`)
// separate from the code that consumes klines; this generalizes that split
// to an arbitrary exchange rather than one hardcoded vendor.
//
// `RestExchange` is the one concrete implementation: a public-endpoint-only
// HTTP client (no request signing — this engine never places real orders).
// Response parsing mirrors `binance::client::get_klines`'s handling of the
// array-of-arrays kline format.
// =============================================================================

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::error::MarketDataError;

/// One raw OHLCV row as the exchange returns it: `[t, o, h, l, c, v]`.
pub type RawCandleRow = [f64; 6];

#[async_trait]
pub trait ExchangeFacade: Send + Sync {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        since_millis: i64,
        limit: u32,
    ) -> Result<Vec<RawCandleRow>, MarketDataError>;

    async fn fetch_ticker(&self, symbol: &str) -> Result<f64, MarketDataError>;

    fn close(&self) {}
}

/// Public-endpoint REST exchange client.
pub struct RestExchange {
    base_url: String,
    client: reqwest::Client,
}

impl RestExchange {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn parse_str_f64(val: &serde_json::Value) -> Result<f64, MarketDataError> {
        if let Some(s) = val.as_str() {
            s.parse::<f64>()
                .map_err(|e| MarketDataError::Transient(format!("malformed numeric field '{s}': {e}")))
        } else if let Some(n) = val.as_f64() {
            Ok(n)
        } else {
            Err(MarketDataError::Transient(format!("expected string or number, got {val}")))
        }
    }
}

#[async_trait]
impl ExchangeFacade for RestExchange {
    #[instrument(skip(self), name = "exchange::fetch_ohlcv")]
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        since_millis: i64,
        limit: u32,
    ) -> Result<Vec<RawCandleRow>, MarketDataError> {
        let url = format!(
            "{}/ohlcv?symbol={}&interval={}&since={}&limit={}",
            self.base_url, symbol, timeframe, since_millis, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketDataError::Transient(format!("OHLCV request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(MarketDataError::Transient(format!("exchange returned {status}")));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| MarketDataError::Transient(format!("failed to parse OHLCV response: {e}")))?;

        let raw = body
            .as_array()
            .ok_or_else(|| MarketDataError::DataCorruption("OHLCV response is not an array".into()))?;

        let mut rows = Vec::with_capacity(raw.len());
        for entry in raw {
            let arr = entry
                .as_array()
                .ok_or_else(|| MarketDataError::DataCorruption("kline entry is not an array".into()))?;
            if arr.len() < 6 {
                warn!(len = arr.len(), "skipping malformed kline entry");
                continue;
            }
            let t = Self::parse_str_f64(&arr[0])?;
            let o = Self::parse_str_f64(&arr[1])?;
            let h = Self::parse_str_f64(&arr[2])?;
            let l = Self::parse_str_f64(&arr[3])?;
            let c = Self::parse_str_f64(&arr[4])?;
            let v = Self::parse_str_f64(&arr[5])?;
            rows.push([t, o, h, l, c, v]);
        }

        debug!(symbol, timeframe, count = rows.len(), "ohlcv fetched");
        Ok(rows)
    }

    #[instrument(skip(self), name = "exchange::fetch_ticker")]
    async fn fetch_ticker(&self, symbol: &str) -> Result<f64, MarketDataError> {
        let url = format!("{}/ticker?symbol={}", self.base_url, symbol);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketDataError::Transient(format!("ticker request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(MarketDataError::Transient(format!("exchange returned {status}")));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| MarketDataError::Transient(format!("failed to parse ticker response: {e}")))?;

        let last = body
            .get("last")
            .ok_or_else(|| MarketDataError::DataCorruption("ticker response missing 'last'".into()))?;
        Self::parse_str_f64(last)
    }
}

impl std::fmt::Debug for RestExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestExchange")
            .field("base_url", &self.base_url)
            .finish()
    }
}
