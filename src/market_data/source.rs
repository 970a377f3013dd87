// =============================================================================
// MarketDataSource — spec.md §4.1
// =============================================================================

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::future::try_join_all;
use tracing::{debug, warn};

use crate::error::MarketDataError;
use crate::market_data::cache::SeriesCache;
use crate::market_data::candle::{Candle, Series};
use crate::market_data::exchange::ExchangeFacade;
use crate::market_data::rate_limiter::RateLimiter;
use crate::timeframe::Timeframe;

const EXCHANGE_MAX_CANDLES: u32 = 1000;

pub struct MarketDataSource {
    exchange: Arc<dyn ExchangeFacade>,
    limiter: RateLimiter,
    cache: SeriesCache,
}

impl MarketDataSource {
    pub fn new(
        exchange: Arc<dyn ExchangeFacade>,
        max_requests_per_minute: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            exchange,
            limiter: RateLimiter::new(max_requests_per_minute, Duration::from_secs(60)),
            cache: SeriesCache::new(cache_ttl),
        }
    }

    /// `fetchSingle(symbol, timeframe, lookback) -> Series`.
    pub async fn fetch_single(
        &self,
        symbol: &str,
        timeframe: &str,
        lookback: usize,
    ) -> Result<Series, MarketDataError> {
        let tf = Timeframe::from_str(timeframe)?;

        if let Some(cached) = self.cache.get(symbol, tf, lookback) {
            return Ok(cached);
        }

        self.limiter.acquire().await;

        let now_millis = now_millis();
        let since = now_millis - (1.2 * lookback as f64 * tf.millis() as f64) as i64;
        let request_limit = (2 * lookback as u32).min(EXCHANGE_MAX_CANDLES);

        let rows = self
            .exchange
            .fetch_ohlcv(symbol, tf.as_str(), since, request_limit)
            .await?;

        let candles: Vec<Candle> = rows
            .into_iter()
            .map(|[t, o, h, l, c, v]| Candle { t: t as i64, o, h, l, c, v })
            .collect();

        let series = Series::new(candles)?.trim_to_recent(lookback);

        self.cache.put(symbol, tf, lookback, series.clone());
        debug!(symbol, timeframe, lookback, len = series.len(), "fetched fresh series");
        Ok(series)
    }

    /// `fetchMulti(symbol, [timeframe], lookback) -> map[timeframe]Series`.
    /// Fails atomically: one inner failure fails the whole call, no partial
    /// maps are ever returned.
    pub async fn fetch_multi(
        &self,
        symbol: &str,
        timeframes: &[&str],
        lookback: usize,
    ) -> Result<Vec<(String, Series)>, MarketDataError> {
        let futures = timeframes.iter().map(|&tf| {
            let tf = tf.to_string();
            async move {
                let series = self.fetch_single(symbol, &tf, lookback).await?;
                Ok::<_, MarketDataError>((tf, series))
            }
        });
        try_join_all(futures).await
    }

    pub async fn current_price(&self, symbol: &str) -> Result<f64, MarketDataError> {
        self.exchange.fetch_ticker(symbol).await
    }

    /// Release the exchange facade and clear the cache.
    pub fn close(&self) {
        self.exchange.close();
        self.cache.clear();
        warn!("market data source closed");
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeExchange {
        call_count: AtomicUsize,
        rows: Mutex<Vec<super::super::exchange::RawCandleRow>>,
        fail_next: std::sync::atomic::AtomicBool,
    }

    impl FakeExchange {
        fn with_rows(rows: Vec<super::super::exchange::RawCandleRow>) -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                rows: Mutex::new(rows),
                fail_next: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ExchangeFacade for FakeExchange {
        async fn fetch_ohlcv(
            &self,
            _symbol: &str,
            _timeframe: &str,
            _since_millis: i64,
            _limit: u32,
        ) -> Result<Vec<super::super::exchange::RawCandleRow>, MarketDataError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(MarketDataError::Transient("simulated failure".into()));
            }
            Ok(self.rows.lock().clone())
        }

        async fn fetch_ticker(&self, _symbol: &str) -> Result<f64, MarketDataError> {
            Ok(100.0)
        }
    }

    fn good_rows(n: usize) -> Vec<super::super::exchange::RawCandleRow> {
        (0..n)
            .map(|i| [1000.0 + i as f64 * 60_000.0, 100.0, 101.0, 99.0, 100.5, 10.0])
            .collect()
    }

    #[tokio::test]
    async fn fetch_single_rejects_invalid_timeframe() {
        let ex = Arc::new(FakeExchange::with_rows(good_rows(5)));
        let source = MarketDataSource::new(ex, 100, Duration::from_secs(5));
        let err = source.fetch_single("BTC/USDT", "7m", 3).await.unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidTimeframe(_)));
    }

    #[tokio::test]
    async fn fetch_single_trims_to_lookback() {
        let ex = Arc::new(FakeExchange::with_rows(good_rows(20)));
        let source = MarketDataSource::new(ex, 100, Duration::from_secs(5));
        let series = source.fetch_single("BTC/USDT", "1m", 5).await.unwrap();
        assert_eq!(series.len(), 5);
    }

    #[tokio::test]
    async fn fetch_single_caches_second_call() {
        let ex = Arc::new(FakeExchange::with_rows(good_rows(10)));
        let source = MarketDataSource::new(ex.clone(), 100, Duration::from_secs(5));
        source.fetch_single("BTC/USDT", "1m", 5).await.unwrap();
        source.fetch_single("BTC/USDT", "1m", 5).await.unwrap();
        assert_eq!(ex.call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_single_rejects_non_monotonic_data_without_caching() {
        let bad_rows = vec![
            [2000.0, 100.0, 101.0, 99.0, 100.0, 1.0],
            [1000.0, 100.0, 101.0, 99.0, 100.0, 1.0],
        ];
        let ex = Arc::new(FakeExchange::with_rows(bad_rows));
        let source = MarketDataSource::new(ex, 100, Duration::from_secs(5));
        let err = source.fetch_single("BTC/USDT", "1m", 2).await.unwrap_err();
        assert!(matches!(err, MarketDataError::DataCorruption(_)));
        // Not cached: a follow-up call should still hit the exchange.
        assert!(source.cache.get("BTC/USDT", Timeframe::M1, 2).is_none());
    }

    #[tokio::test]
    async fn fetch_multi_fails_atomically_on_one_bad_timeframe() {
        let ex = Arc::new(FakeExchange::with_rows(good_rows(10)));
        ex.fail_next.store(true, Ordering::SeqCst);
        let source = MarketDataSource::new(ex, 100, Duration::from_secs(5));
        let err = source
            .fetch_multi("BTC/USDT", &["1m", "5m"], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::Transient(_)));
    }

    #[tokio::test]
    async fn close_clears_the_cache() {
        let ex = Arc::new(FakeExchange::with_rows(good_rows(10)));
        let source = MarketDataSource::new(ex.clone(), 100, Duration::from_secs(5));
        source.fetch_single("BTC/USDT", "1m", 5).await.unwrap();
        source.close();
        source.fetch_single("BTC/USDT", "1m", 5).await.unwrap();
        assert_eq!(ex.call_count.load(Ordering::SeqCst), 2);
    }
}
