// =============================================================================
// Candle / Series — the market-data unit and its ordered sequence
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::MarketDataError;

/// A single time-bucketed OHLCV observation.
///
/// Invariant: `l <= min(o,c) && h >= max(o,c) && l <= h`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time, milliseconds since epoch.
    pub t: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: f64,
}

impl Candle {
    pub fn is_ohlc_valid(&self) -> bool {
        self.l <= self.o.min(self.c) && self.h >= self.o.max(self.c) && self.l <= self.h
    }
}

/// An ordered, oldest-to-newest sequence of candles for one
/// `(symbol, timeframe)` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Series {
    pub candles: Vec<Candle>,
}

impl Series {
    /// Build a `Series`, verifying the oldest->newest and OHLC invariants.
    /// Fails `DataCorruption` without constructing anything on violation.
    pub fn new(candles: Vec<Candle>) -> Result<Self, MarketDataError> {
        if candles.is_empty() {
            return Err(MarketDataError::DataCorruption("empty candle series".into()));
        }
        for c in &candles {
            if !c.is_ohlc_valid() {
                return Err(MarketDataError::DataCorruption(format!(
                    "OHLC invariant violated at t={}",
                    c.t
                )));
            }
        }
        for w in candles.windows(2) {
            if w[1].t <= w[0].t {
                return Err(MarketDataError::DataCorruption(format!(
                    "non-monotonic candle ordering: {} then {}",
                    w[0].t, w[1].t
                )));
            }
        }
        Ok(Self { candles })
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.c).collect()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Keep only the most recent `n` candles.
    pub fn trim_to_recent(mut self, n: usize) -> Self {
        if self.candles.len() > n {
            let drop = self.candles.len() - n;
            self.candles.drain(0..drop);
        }
        self
    }
}
