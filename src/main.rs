// =============================================================================
// LLM Trading Arena — Main Entry Point
// =============================================================================
//
// Loads `config/arena.json`, builds one `HttpModelAdapter` per enabled model,
// and runs the competition to completion (or until Ctrl-C). No globals: every
// collaborator is constructed here and handed down explicitly, the way the
// teacher builds its `AppState` once in `main` and threads it through.
// =============================================================================

mod config;
mod decision;
mod decision_broker;
mod error;
mod indicators;
mod ledger;
mod leaderboard;
mod market_data;
mod model_adapter;
mod observer;
mod persistence;
mod scheduler;
mod timeframe;
mod types;
mod validator;

use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::market_data::{ExchangeFacade, RestExchange};
use crate::model_adapter::{HttpModelAdapter, ModelAdapter};
use crate::observer::LoggingObserver;
use crate::scheduler::{CompetitionScheduler, RunLimits};

struct CliArgs {
    duration: Option<Duration>,
    max_rounds: Option<u64>,
}

fn parse_args() -> CliArgs {
    let mut duration = None;
    let mut max_rounds = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--duration" => {
                if let Some(v) = args.next().and_then(|s| s.parse::<u64>().ok()) {
                    duration = Some(Duration::from_secs(v * 60));
                }
            }
            "--rounds" => {
                if let Some(v) = args.next().and_then(|s| s.parse::<u64>().ok()) {
                    max_rounds = Some(v);
                }
            }
            "--test" => max_rounds = Some(5),
            other => {
                eprintln!("ignoring unrecognized argument: {other}");
            }
        }
    }

    CliArgs { duration, max_rounds }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("LLM trading arena starting up");

    let cli = parse_args();

    let config = match Config::load(config::DEFAULT_CONFIG_PATH) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load configuration, falling back to defaults");
            Config::default()
        }
    };

    let enabled = config.enabled_models();
    if enabled.is_empty() {
        error!("no models enabled in configuration — nothing to run");
        return ExitCode::FAILURE;
    }

    let exchange: Arc<dyn ExchangeFacade> = Arc::new(RestExchange::new(config.exchange.base_url.clone()));

    let adapters: Vec<(String, Arc<dyn ModelAdapter>)> = enabled
        .iter()
        .map(|(id, model_cfg)| {
            let adapter: Arc<dyn ModelAdapter> = Arc::new(HttpModelAdapter::new(
                model_cfg.endpoint.clone(),
                model_cfg.api_key.clone(),
                Duration::from_secs(model_cfg.parameters.timeout_seconds),
                model_cfg.parameters.max_requests_per_minute,
                model_cfg.parameters.max_retries,
                Duration::from_millis(model_cfg.parameters.retry_delay_ms),
            ));
            ((*id).clone(), adapter)
        })
        .collect();

    let scheduler = match CompetitionScheduler::initialize(
        config,
        exchange,
        adapters,
        Arc::new(LoggingObserver),
    ) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to initialize competition scheduler");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = scheduler.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received, finishing current round and exiting");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    scheduler
        .run(RunLimits { duration: cli.duration, max_rounds: cli.max_rounds })
        .await;

    info!("arena run complete");
    ExitCode::SUCCESS
}
