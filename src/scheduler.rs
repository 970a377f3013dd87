// =============================================================================
// CompetitionScheduler — spec.md §4.8
// =============================================================================
//
// Owns the session lifecycle: `created -> initialize -> ready -> run ->
// running <-> paused -> stop/deadline/shutdown -> stopped`. Generalizes the
// teacher's "construct everything explicitly, spawn a handful of cooperating
// loops, shut down cleanly on Ctrl-C" shape (`main.rs`) to the single
// round-loop this spec describes.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::decision::Action;
use crate::decision_broker::DecisionBroker;
use crate::error::ConfigError;
use crate::indicators::pipeline::compute_from_candles;
use crate::ledger::{ExecutionMeta, ExecutionParams, PaperLedger};
use crate::leaderboard;
use crate::market_data::{ExchangeFacade, MarketDataSource};
use crate::model_adapter::{ModelAdapter, RoundPayload};
use crate::observer::{ArenaEvent, Observer};
use crate::persistence::{self, SessionConfigSnapshot, SessionReport};
use crate::types::{LeaderboardRow, ModelRuntime, RoundRecord};

/// Hard cap on the fraction of cash a single BUY may commit, per spec.md
/// §4.8. Placed here (the scheduler), not the ledger — a policy choice §9
/// pins explicitly: the ledger stays mechanism, not policy.
const BUY_CAP: f64 = 0.05;

/// The timeframe set fetched per symbol each round. `spec.md` leaves the
/// exact set unpinned ("the configured timeframe set"); the primary
/// timeframe (first element) is the one indicators and the price series are
/// computed from. Recorded as an Open-Question resolution in DESIGN.md.
const TIMEFRAMES: [&str; 2] = ["1h", "15m"];
const LOOKBACK: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Created,
    Ready,
    Running,
    Paused,
    Stopped,
}

pub struct RunLimits {
    pub duration: Option<Duration>,
    pub max_rounds: Option<u64>,
}

struct SymbolSnapshot {
    latest_price: f64,
    indicators: crate::indicators::pipeline::IndicatorSet,
    price_series: Vec<f64>,
    indicator_series: crate::indicators::pipeline::IndicatorSeries,
}

pub struct CompetitionScheduler {
    config: Config,
    market_data: MarketDataSource,
    models: Vec<ModelRuntime>,
    observer: Arc<dyn Observer>,
    session_id: String,
    started_at: chrono::DateTime<Utc>,
    round: AtomicU64,
    shutdown: Arc<AtomicBool>,
    state: parking_lot::Mutex<SchedulerState>,
    round_log: parking_lot::Mutex<Vec<RoundRecord>>,
}

impl std::fmt::Debug for CompetitionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompetitionScheduler")
            .field("session_id", &self.session_id)
            .field("started_at", &self.started_at)
            .field("round", &self.round)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl CompetitionScheduler {
    /// `initialize()`: constructs `MarketDataSource`, and for each enabled
    /// configured model creates a `ModelRuntime` with its adapter and a
    /// fresh `PaperLedger`. Fails hard if no model initializes.
    pub fn initialize(
        config: Config,
        exchange: Arc<dyn ExchangeFacade>,
        adapters: Vec<(String, Arc<dyn ModelAdapter>)>,
        observer: Arc<dyn Observer>,
    ) -> Result<Self, ConfigError> {
        let market_data = MarketDataSource::new(
            exchange,
            config.data.rate_limit.max_requests_per_minute,
            Duration::from_secs(config.data.cache.ttl_seconds),
        );

        let exec_params = ExecutionParams {
            slippage: config.trading.execution.slippage_simulation,
            commission_rate: config.trading.execution.commission_rate,
            min_order_usd: config.trading.execution.min_order_size_usd,
            max_daily_loss: config.trading.risk.max_daily_loss,
        };

        let mut models = Vec::new();
        for (id, adapter) in adapters {
            let Some(model_cfg) = config.models.get(&id) else { continue };
            if !model_cfg.enabled {
                continue;
            }
            let ledger = PaperLedger::new(config.trading.capital_per_model, exec_params);
            models.push(ModelRuntime::new(id, model_cfg.priority, adapter, ledger, true));
        }

        if models.is_empty() {
            return Err(ConfigError::NoEnabledModels);
        }

        let started_at = Utc::now();
        let session_id = persistence::session_id_for(chrono::Local::now());

        Ok(Self {
            config,
            market_data,
            models,
            observer,
            session_id,
            started_at,
            round: AtomicU64::new(0),
            shutdown: Arc::new(AtomicBool::new(false)),
            state: parking_lot::Mutex::new(SchedulerState::Ready),
            round_log: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// `run({duration?, maxRounds?})`: runs rounds until the first of
    /// shutdown, wall-clock exceeding `startedAt+duration`, or
    /// `round >= maxRounds`. Sleeps `decisionInterval` between rounds,
    /// guaranteeing `cleanup()` runs on every exit path.
    pub async fn run(&self, limits: RunLimits) {
        *self.state.lock() = SchedulerState::Running;
        self.observer.on_event(ArenaEvent::Started);

        loop {
            if self.is_shutdown() {
                break;
            }
            if let Some(max) = limits.max_rounds {
                if self.round.load(Ordering::SeqCst) >= max {
                    break;
                }
            }
            if let Some(duration) = limits.duration {
                if Utc::now().signed_duration_since(self.started_at).num_seconds() as u64
                    >= duration.as_secs()
                {
                    break;
                }
            }

            self.run_round().await;

            let interval = Duration::from_secs(self.config.arena.decision_interval_seconds);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = wait_for_shutdown(&self.shutdown) => {
                    break;
                }
            }
        }

        self.cleanup();
        *self.state.lock() = SchedulerState::Stopped;
    }

    /// The unit of work: snapshot -> decide -> execute -> log.
    pub async fn run_round(&self) {
        let round = self.round.fetch_add(1, Ordering::SeqCst) + 1;
        self.observer.on_event(ArenaEvent::RoundStart(round));

        let snapshot = self.build_market_snapshot().await;
        if snapshot.is_empty() {
            warn!(round, "round abandoned: empty market snapshot");
            self.observer.on_event(ArenaEvent::Error {
                round,
                message: "empty market snapshot".into(),
            });
            return;
        }

        let payload_snapshot = json!(snapshot
            .iter()
            .map(|(symbol, s)| {
                (
                    symbol.clone(),
                    json!({
                        "latestPrice": s.latest_price,
                        "indicators": s.indicators,
                        "priceSeries": s.price_series,
                        "indicatorSeries": s.indicator_series,
                    }),
                )
            })
            .collect::<HashMap<_, _>>());

        let symbols: Vec<String> = snapshot.keys().cloned().collect();
        let elapsed_minutes =
            Utc::now().signed_duration_since(self.started_at).num_seconds() as f64 / 60.0;

        let prices: HashMap<String, f64> =
            snapshot.iter().map(|(s, v)| (s.clone(), v.latest_price)).collect();

        let model_adapters: Vec<(String, Arc<dyn ModelAdapter>)> = self
            .models
            .iter()
            .map(|m| (m.id.clone(), m.adapter.clone()))
            .collect();

        let prices_for_payload = prices.clone();
        let payload_for = move |model_id: &str| {
            let account = self
                .models
                .iter()
                .find(|m| m.id == model_id)
                .map(|m| serde_json::to_value(m.ledger.state(&prices_for_payload)).unwrap_or(json!({})))
                .unwrap_or(json!({}));
            RoundPayload {
                elapsed_minutes,
                round,
                symbols: symbols.clone(),
                snapshot: payload_snapshot.clone(),
                account,
            }
        };

        let deadline = Duration::from_secs(self.config.arena.decision_interval_seconds.min(60));
        let decisions = DecisionBroker::collect(&model_adapters, payload_for, deadline).await;

        let mut action_counts: HashMap<String, HashMap<String, u32>> = HashMap::new();
        let mut executions: HashMap<String, u32> = HashMap::new();

        for model in &self.models {
            let Some(maybe_collected) = decisions.get(&model.id) else { continue };
            let Some(collected) = maybe_collected else {
                model.record_error("no decision collected this round");
                continue;
            };
            let bundle = &collected.bundle;
            model.record_decision(collected.latency_ms);

            let counts = action_counts.entry(model.id.clone()).or_default();
            let mut exec_count = 0u32;

            for decision in &bundle.decisions {
                *counts.entry(decision.action.to_string()).or_insert(0) += 1;

                let Some(px) = prices.get(&decision.symbol).copied() else {
                    model.record_error(format!("no market data for {}", decision.symbol));
                    continue;
                };

                let meta = ExecutionMeta {
                    model: model.id.clone(),
                    confidence: decision.confidence,
                    reasoning: decision.reasoning.clone(),
                };

                let result = match decision.action {
                    Action::Hold => continue,
                    Action::Buy => {
                        let account = model.ledger.state(&prices);
                        let notional = account.cash * decision.position_size.min(BUY_CAP);
                        let size = if px > 0.0 { notional / px } else { 0.0 };
                        model.ledger.execute(&decision.symbol, Action::Buy, size, px, meta)
                    }
                    Action::Sell => {
                        let account = model.ledger.state(&prices);
                        let position = account.positions.iter().find(|p| p.symbol == decision.symbol);
                        match position {
                            Some(p) => {
                                let size = p.size * decision.position_size;
                                model.ledger.execute(&decision.symbol, Action::Sell, size, px, meta)
                            }
                            None => {
                                model.record_error(format!("cannot sell: no position in {}", decision.symbol));
                                continue;
                            }
                        }
                    }
                };

                match result {
                    Ok(_) => {
                        model.record_trade();
                        exec_count += 1;
                    }
                    Err(e) => model.record_error(e.to_string()),
                }
            }
            executions.insert(model.id.clone(), exec_count);
        }

        let leaderboard_rows: Vec<LeaderboardRow> = leaderboard::derive(&self.models, &prices);

        let record = RoundRecord {
            round,
            at: Utc::now(),
            prices,
            action_counts,
            executions,
            leaderboard: leaderboard_rows.clone(),
        };
        self.round_log.lock().push(record);

        self.observer.on_event(ArenaEvent::RoundComplete(round, leaderboard_rows));
    }

    async fn build_market_snapshot(&self) -> HashMap<String, SymbolSnapshot> {
        let tasks = self.config.exchange.symbols.iter().map(|symbol| async move {
            let result = self.market_data.fetch_multi(symbol, &TIMEFRAMES, LOOKBACK).await;
            (symbol.clone(), result)
        });

        let results = join_all(tasks).await;
        let mut snapshot = HashMap::with_capacity(results.len());
        for (symbol, result) in results {
            match result {
                Ok(series_by_timeframe) => {
                    let Some((_, primary)) = series_by_timeframe.first() else { continue };
                    if primary.is_empty() {
                        continue;
                    }
                    let (indicators, indicator_series) = compute_from_candles(primary, TIMEFRAMES[0]);
                    let latest_price = primary.latest().map(|c| c.c).unwrap_or(0.0);
                    snapshot.insert(
                        symbol,
                        SymbolSnapshot {
                            latest_price,
                            indicators,
                            price_series: primary.closes(),
                            indicator_series,
                        },
                    );
                }
                Err(e) => {
                    warn!(symbol, error = %e, "dropping symbol from round snapshot");
                }
            }
        }
        snapshot
    }

    /// Runs on every exit path: writes results, releases the exchange
    /// facade.
    fn cleanup(&self) {
        let round_log = self.round_log.lock();
        let final_leaderboard = round_log
            .last()
            .map(|r| r.leaderboard.clone())
            .unwrap_or_else(|| leaderboard::derive(&self.models, &HashMap::new()));

        let report = SessionReport {
            session_id: self.session_id.clone(),
            session_start: self.started_at,
            session_end: Some(Utc::now()),
            symbols: self.config.exchange.symbols.clone(),
            total_rounds: self.round.load(Ordering::SeqCst),
            config: SessionConfigSnapshot {
                decision_interval: self.config.arena.decision_interval_seconds,
                capital_per_model: self.config.trading.capital_per_model,
            },
            final_leaderboard: final_leaderboard.clone(),
            round_results: round_log.clone(),
            summary: format!("{} rounds completed", self.round.load(Ordering::SeqCst)),
        };
        drop(round_log);

        let results_dir = std::path::Path::new(persistence::RESULTS_DIR);
        persistence::write_session_json(results_dir, &report);
        persistence::write_leaderboard_csv(results_dir, &self.session_id, &final_leaderboard);

        self.market_data.close();

        self.observer.on_event(ArenaEvent::CompetitionFinished {
            session_id: self.session_id.clone(),
            total_rounds: self.round.load(Ordering::SeqCst),
        });
        info!(session_id = %self.session_id, "cleanup complete");
    }
}

async fn wait_for_shutdown(flag: &AtomicBool) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::decision::DecisionBundle;
    use crate::error::{AdapterError, MarketDataError};
    use crate::market_data::RawCandleRow;
    use async_trait::async_trait;

    struct FakeExchange;
    #[async_trait]
    impl ExchangeFacade for FakeExchange {
        async fn fetch_ohlcv(
            &self,
            _symbol: &str,
            _timeframe: &str,
            _since_millis: i64,
            _limit: u32,
        ) -> Result<Vec<RawCandleRow>, MarketDataError> {
            Ok((0..50)
                .map(|i| [1000.0 + i as f64 * 60_000.0, 100.0, 101.0, 99.0, 100.0 + i as f64 * 0.1, 10.0])
                .collect())
        }
        async fn fetch_ticker(&self, _symbol: &str) -> Result<f64, MarketDataError> {
            Ok(100.0)
        }
    }

    struct AlwaysHold;
    #[async_trait]
    impl ModelAdapter for AlwaysHold {
        async fn decide(&self, _payload: &RoundPayload) -> Result<DecisionBundle, AdapterError> {
            Ok(DecisionBundle::default())
        }
    }

    fn test_config() -> Config {
        let mut cfg = Config::default();
        cfg.exchange.symbols = vec!["BTC/USDT".into()];
        cfg.arena.decision_interval_seconds = 0;
        cfg.models.insert("m1".into(), ModelConfig { enabled: true, priority: 1, ..Default::default() });
        cfg
    }

    #[tokio::test]
    async fn initialize_fails_hard_with_no_enabled_models() {
        let cfg = Config::default(); // no models configured
        let err = CompetitionScheduler::initialize(cfg, Arc::new(FakeExchange), vec![], Arc::new(crate::observer::LoggingObserver))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoEnabledModels));
    }

    #[tokio::test]
    async fn run_round_produces_a_round_record_and_leaderboard() {
        let cfg = test_config();
        let adapters: Vec<(String, Arc<dyn ModelAdapter>)> = vec![("m1".into(), Arc::new(AlwaysHold))];
        let scheduler = CompetitionScheduler::initialize(
            cfg,
            Arc::new(FakeExchange),
            adapters,
            Arc::new(crate::observer::LoggingObserver),
        )
        .unwrap();

        scheduler.run_round().await;
        let log = scheduler.round_log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].round, 1);
        assert_eq!(log[0].leaderboard.len(), 1);
    }

    #[tokio::test]
    async fn run_stops_after_max_rounds() {
        let cfg = test_config();
        let adapters: Vec<(String, Arc<dyn ModelAdapter>)> = vec![("m1".into(), Arc::new(AlwaysHold))];
        let scheduler = CompetitionScheduler::initialize(
            cfg,
            Arc::new(FakeExchange),
            adapters,
            Arc::new(crate::observer::LoggingObserver),
        )
        .unwrap();

        scheduler.run(RunLimits { duration: None, max_rounds: Some(2) }).await;
        assert_eq!(scheduler.round.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stop_during_sleep_ends_the_run_loop_promptly() {
        let mut cfg = test_config();
        cfg.arena.decision_interval_seconds = 3600;
        let adapters: Vec<(String, Arc<dyn ModelAdapter>)> = vec![("m1".into(), Arc::new(AlwaysHold))];
        let scheduler = Arc::new(
            CompetitionScheduler::initialize(
                cfg,
                Arc::new(FakeExchange),
                adapters,
                Arc::new(crate::observer::LoggingObserver),
            )
            .unwrap(),
        );

        let scheduler_clone = scheduler.clone();
        let handle = tokio::spawn(async move {
            scheduler_clone.run(RunLimits { duration: None, max_rounds: None }).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.stop();
        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(result.is_ok(), "scheduler did not exit promptly after stop()");
    }
}
