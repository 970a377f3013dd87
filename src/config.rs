// =============================================================================
// Config — hot-editable JSON configuration, spec.md §6
// =============================================================================
//
// Atomic tmp+rename load/save, every field `#[serde(default)]`-backed so
// older config files keep loading as fields are added. Grounded directly on
// the teacher's `runtime_config.rs::{load,save}`, with the fields replaced by
// the ones `spec.md` §6 enumerates.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config/arena.json";

fn default_mode() -> TradingMode {
    TradingMode::Paper
}

fn default_capital_per_model() -> f64 {
    1000.0
}

fn default_max_daily_loss() -> f64 {
    0.05
}

fn default_slippage() -> f64 {
    0.001
}

fn default_commission_rate() -> f64 {
    0.001
}

fn default_min_order_size_usd() -> f64 {
    10.0
}

fn default_symbols() -> Vec<String> {
    vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()]
}

fn default_max_requests_per_minute() -> usize {
    60
}

fn default_cache_ttl_seconds() -> u64 {
    30
}

fn default_decision_interval_seconds() -> u64 {
    300
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f64 {
    0.3
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_model_max_requests_per_minute() -> usize {
    20
}

fn default_priority() -> u32 {
    0
}

fn default_true() -> bool {
    true
}

/// `trading.mode ∈ {paper, live}`; this core only honors `paper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Paper,
    Live,
}

impl Default for TradingMode {
    fn default() -> Self {
        TradingMode::Paper
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "paper"),
            Self::Live => write!(f, "live"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self { max_daily_loss: default_max_daily_loss() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_slippage")]
    pub slippage_simulation: f64,
    #[serde(default = "default_commission_rate")]
    pub commission_rate: f64,
    #[serde(default = "default_min_order_size_usd")]
    pub min_order_size_usd: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            slippage_simulation: default_slippage(),
            commission_rate: default_commission_rate(),
            min_order_size_usd: default_min_order_size_usd(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_mode")]
    pub mode: TradingMode,
    #[serde(default = "default_capital_per_model")]
    pub capital_per_model: f64,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            capital_per_model: default_capital_per_model(),
            risk: RiskConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub base_url: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self { symbols: default_symbols(), base_url: String::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_requests_per_minute: default_max_requests_per_minute() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: default_cache_ttl_seconds() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { rate_limit: RateLimitConfig::default(), cache: CacheConfig::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    #[serde(default = "default_decision_interval_seconds")]
    pub decision_interval_seconds: u64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self { decision_interval_seconds: default_decision_interval_seconds() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_model_max_requests_per_minute")]
    pub max_requests_per_minute: usize,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_requests_per_minute: default_model_max_requests_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub parameters: ModelParameters,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: default_priority(),
            endpoint: String::new(),
            api_key: None,
            parameters: ModelParameters::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), symbols = ?config.exchange.symbols, "config loaded");
        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        let tmp_path = path.with_extension("json.tmp");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config directory {}", parent.display()))?;
        }
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;
        info!(path = %path.display(), "config saved (atomic)");
        Ok(())
    }

    /// The set of enabled model ids, sorted by descending priority.
    pub fn enabled_models(&self) -> Vec<(&String, &ModelConfig)> {
        let mut models: Vec<_> = self.models.iter().filter(|(_, m)| m.enabled).collect();
        models.sort_by(|a, b| b.1.priority.cmp(&a.1.priority));
        models
    }
}
