// =============================================================================
// Shared types used across the trading arena engine
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::ledger::PaperLedger;
use crate::model_adapter::ModelAdapter;

/// `{id, priority, adapter, ledger, decisionsMade, tradesExecuted, errors,
/// errorMsg?, lastLatency, totalLatency, enabled}` — spec.md §3.
///
/// Counters are atomics rather than behind the ledger's mutex: they are
/// touched by both the broker task and the scheduler task, matching the
/// teacher's use of `AtomicU64` for cross-task counters in `risk.rs`/
/// `app_state.rs`.
pub struct ModelRuntime {
    pub id: String,
    pub priority: u32,
    pub adapter: std::sync::Arc<dyn ModelAdapter>,
    pub ledger: PaperLedger,
    pub decisions_made: AtomicU64,
    pub trades_executed: AtomicU64,
    pub errors: AtomicU64,
    pub error_msg: parking_lot::Mutex<Option<String>>,
    pub last_latency_ms: AtomicU64,
    pub total_latency_ms: AtomicU64,
    pub enabled: bool,
}

impl ModelRuntime {
    pub fn new(
        id: impl Into<String>,
        priority: u32,
        adapter: std::sync::Arc<dyn ModelAdapter>,
        ledger: PaperLedger,
        enabled: bool,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            adapter,
            ledger,
            decisions_made: AtomicU64::new(0),
            trades_executed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            error_msg: parking_lot::Mutex::new(None),
            last_latency_ms: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            enabled,
        }
    }

    pub fn record_decision(&self, latency_ms: u64) {
        self.decisions_made.fetch_add(1, Ordering::SeqCst);
        self.last_latency_ms.store(latency_ms, Ordering::SeqCst);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::SeqCst);
    }

    pub fn record_trade(&self) {
        self.trades_executed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_error(&self, message: impl Into<String>) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        *self.error_msg.lock() = Some(message.into());
    }
}

/// The per-round record the scheduler appends to the session round log —
/// the concrete shape `spec.md` §4.8 step 5 requires but leaves unshaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u64,
    pub at: chrono::DateTime<chrono::Utc>,
    pub prices: std::collections::HashMap<String, f64>,
    pub action_counts: std::collections::HashMap<String, std::collections::HashMap<String, u32>>,
    pub executions: std::collections::HashMap<String, u32>,
    pub leaderboard: Vec<LeaderboardRow>,
}

/// The derived projection `Leaderboard` (spec.md §4.9) emits; field order
/// fixes the CSV column order at §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub model_id: String,
    pub total_return_pct: f64,
    pub total_value: f64,
    pub cash: f64,
    pub trades: usize,
    pub win_rate: f64,
    pub errors: u64,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_runtime_counters_accumulate() {
        use crate::decision::DecisionBundle;
        use crate::error::AdapterError;
        use crate::ledger::ExecutionParams;
        use async_trait::async_trait;

        struct Noop;
        #[async_trait]
        impl ModelAdapter for Noop {
            async fn decide(
                &self,
                _payload: &crate::model_adapter::RoundPayload,
            ) -> Result<DecisionBundle, AdapterError> {
                Ok(DecisionBundle::default())
            }
        }

        let runtime = ModelRuntime::new(
            "m1",
            1,
            std::sync::Arc::new(Noop),
            PaperLedger::new(
                1000.0,
                ExecutionParams { slippage: 0.001, commission_rate: 0.001, min_order_usd: 10.0, max_daily_loss: 0.05 },
            ),
            true,
        );
        runtime.record_decision(42);
        runtime.record_decision(8);
        runtime.record_trade();
        runtime.record_error("timed out");

        assert_eq!(runtime.decisions_made.load(Ordering::SeqCst), 2);
        assert_eq!(runtime.trades_executed.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.errors.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.total_latency_ms.load(Ordering::SeqCst), 50);
        assert_eq!(runtime.error_msg.lock().as_deref(), Some("timed out"));
    }
}
