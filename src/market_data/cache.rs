// =============================================================================
// TTL-keyed Series cache — lazy eviction, bulk clear on close()
// =============================================================================
//
// Time-keyed map `(symbol, timeframe, lookback) -> (storedAt, Series)`.
// No background eviction thread; a stale entry is only noticed (and dropped)
// the next time it is looked up, matching the teacher's preference for
// lazy-on-access bookkeeping over timers (`market_data/candle_buffer.rs`).
// =============================================================================

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::market_data::candle::Series;
use crate::timeframe::Timeframe;

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct CacheKey {
    symbol: String,
    timeframe: Timeframe,
    lookback: usize,
}

struct Entry {
    stored_at: Instant,
    series: Series,
}

pub struct SeriesCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl SeriesCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return a cached series if present and not yet stale; lazily evicts a
    /// stale hit.
    pub fn get(&self, symbol: &str, timeframe: Timeframe, lookback: usize) -> Option<Series> {
        let key = CacheKey {
            symbol: symbol.to_string(),
            timeframe,
            lookback,
        };
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(e) if e.stored_at.elapsed() < self.ttl => Some(e.series.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, symbol: &str, timeframe: Timeframe, lookback: usize, series: Series) {
        let key = CacheKey {
            symbol: symbol.to_string(),
            timeframe,
            lookback,
        };
        self.entries.lock().insert(
            key,
            Entry {
                stored_at: Instant::now(),
                series,
            },
        );
    }

    /// Bulk clear, called from `MarketDataSource::close`.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
