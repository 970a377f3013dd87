// =============================================================================
// Leaderboard — spec.md §4.9, §8
// =============================================================================
//
// Pure derivation over `ModelRuntime`s sorted by `totalReturnPct` descending,
// stable by `modelId` on ties. Models with no trades appear with `return = 0`.
// =============================================================================

use std::collections::HashMap;

use crate::types::{LeaderboardRow, ModelRuntime};

pub fn derive(runtimes: &[ModelRuntime], prices: &HashMap<String, f64>) -> Vec<LeaderboardRow> {
    let mut rows: Vec<LeaderboardRow> = runtimes
        .iter()
        .map(|r| {
            let view = r.ledger.state(prices);
            LeaderboardRow {
                model_id: r.id.clone(),
                total_return_pct: view.total_return_pct,
                total_value: view.total_value,
                cash: view.cash,
                trades: view.trade_count,
                win_rate: view.win_rate,
                errors: r.errors.load(std::sync::atomic::Ordering::SeqCst),
                enabled: r.enabled,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_return_pct
            .partial_cmp(&a.total_return_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.model_id.cmp(&b.model_id))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionBundle;
    use crate::error::AdapterError;
    use crate::ledger::{ExecutionParams, PaperLedger};
    use async_trait::async_trait;
    use std::sync::Arc;

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

    use crate::model_adapter::ModelAdapter;

    fn runtime(id: &str, capital: f64) -> ModelRuntime {
        ModelRuntime::new(
            id,
            0,
            Arc::new(Noop),
            PaperLedger::new(
                capital,
                ExecutionParams { slippage: 0.001, commission_rate: 0.001, min_order_usd: 10.0, max_daily_loss: 0.05 },
            ),
            true,
        )
    }

    #[test]
    fn sorted_by_return_descending() {
        let runtimes = vec![runtime("a", 1000.0), runtime("b", 2000.0)];
        let prices = HashMap::new();
        let rows = derive(&runtimes, &prices);
        // Both start flat with return 0 — tie broken by modelId ascending.
        assert_eq!(rows[0].model_id, "a");
        assert_eq!(rows[1].model_id, "b");
    }

    #[test]
    fn models_with_no_trades_have_zero_return() {
        let runtimes = vec![runtime("a", 1000.0)];
        let prices = HashMap::new();
        let rows = derive(&runtimes, &prices);
        assert_eq!(rows[0].total_return_pct, 0.0);
        assert_eq!(rows[0].trades, 0);
    }

    #[test]
    fn winning_trade_pushes_model_to_top() {
        let winner = runtime("winner", 1000.0);
        winner
            .ledger
            .execute(
                "BTC/USDT",
                crate::decision::Action::Buy,
                4.0,
                100.0,
                crate::ledger::ExecutionMeta { model: "winner".into(), confidence: 0.5, reasoning: "x".into() },
            )
            .unwrap();
        winner
            .ledger
            .execute(
                "BTC/USDT",
                crate::decision::Action::Sell,
                4.0,
                150.0,
                crate::ledger::ExecutionMeta { model: "winner".into(), confidence: 0.5, reasoning: "x".into() },
            )
            .unwrap();
        let loser = runtime("loser", 1000.0);

        let runtimes = vec![loser, winner];
        let prices = HashMap::new();
        let rows = derive(&runtimes, &prices);
        assert_eq!(rows[0].model_id, "winner");
        assert!(rows[0].total_return_pct > 0.0);
    }
}
