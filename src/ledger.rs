// =============================================================================
// PaperLedger / RiskGuard — spec.md §4.5, §4.6
// =============================================================================
//
// One instance per model; every operation is synchronous with respect to
// that ledger (serialized via an internal mutex — the teacher's pattern of a
// per-resource `parking_lot::Mutex` never held across an `.await`, as seen in
// `execution.rs`/`position_engine.rs`, generalized here to the single,
// simpler position model this spec requires: no TP1/TP2 partial closes, no
// trailing stop, just size-weighted averaging on BUY and size reduction on
// SELL). `RiskGuard` (§4.6) is not a separate type: the breaker is a single
// bool embedded in `LedgerState`, checked first in `execute` and cleared only
// by `reset_daily`, reduced from the teacher's four-breaker `RiskEngine`
// (`risk.rs`) down to the one breaker this spec names.
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::Action;
use crate::error::LedgerError;

/// Win counts as "sell beats round-trip commission by a margin"; the factor
/// approximates `(1+κ)/(1−κ)` for small κ.
const WIN_MARGIN_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub symbol: String,
    pub action: Action,
    pub requested_size: f64,
    pub requested_price: f64,
    pub executed_price: Option<f64>,
    pub executed_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub model: String,
    pub confidence: f64,
    pub reasoning: String,
    pub commission: f64,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub size: f64,
    pub avg_entry_price: f64,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub action: Action,
    pub size: f64,
    pub executed_price: f64,
    pub commission: f64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ExecutionMeta {
    pub model: String,
    pub confidence: f64,
    pub reasoning: String,
}

/// Configured execution parameters: slippage (σ), commission rate (κ), the
/// minimum notional a fill must clear, and the daily-loss fraction that trips
/// the breaker.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionParams {
    pub slippage: f64,
    pub commission_rate: f64,
    pub min_order_usd: f64,
    pub max_daily_loss: f64,
}

struct LedgerState {
    cash: f64,
    positions: HashMap<String, Position>,
    orders: Vec<Order>,
    trades: Vec<Trade>,
    daily_pnl: f64,
    breaker_tripped: bool,
    initial_capital: f64,
}

pub struct PaperLedger {
    params: ExecutionParams,
    state: Mutex<LedgerState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionView {
    pub symbol: String,
    pub size: f64,
    pub avg_entry_price: f64,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    pub cash: f64,
    pub position_value: f64,
    pub total_value: f64,
    pub total_return_pct: f64,
    pub daily_pnl: f64,
    pub breaker_tripped: bool,
    pub positions: Vec<PositionView>,
    pub win_rate: f64,
    pub trade_count: usize,
}

impl PaperLedger {
    pub fn new(initial_capital: f64, params: ExecutionParams) -> Self {
        Self {
            params,
            state: Mutex::new(LedgerState {
                cash: initial_capital,
                positions: HashMap::new(),
                orders: Vec::new(),
                trades: Vec::new(),
                daily_pnl: 0.0,
                breaker_tripped: false,
                initial_capital,
            }),
        }
    }

    /// `execute(symbol, action, requestedSize, refPrice, meta) -> Order`.
    /// `action` must be `Buy` or `Sell` (`Hold` never reaches the ledger).
    pub fn execute(
        &self,
        symbol: &str,
        action: Action,
        requested_size: f64,
        ref_price: f64,
        meta: ExecutionMeta,
    ) -> Result<Order, LedgerError> {
        let mut state = self.state.lock();

        if state.breaker_tripped {
            return Err(LedgerError::CircuitBreakerTripped);
        }

        if !matches!(action, Action::Buy | Action::Sell) {
            return Err(LedgerError::InvalidOrder("action must be BUY or SELL".into()));
        }
        if requested_size <= 0.0 {
            return Err(LedgerError::InvalidOrder("requestedSize must be positive".into()));
        }
        if ref_price <= 0.0 {
            return Err(LedgerError::InvalidOrder("refPrice must be positive".into()));
        }

        let notional_at_ref = requested_size * ref_price;
        if notional_at_ref < self.params.min_order_usd {
            return Self::reject(&mut state, symbol, action, requested_size, ref_price, meta,
                "below minimum order size".into());
        }

        let sigma = self.params.slippage;
        let executed_price = match action {
            Action::Buy => ref_price * (1.0 + sigma),
            Action::Sell => ref_price * (1.0 - sigma),
            Action::Hold => unreachable!(),
        };

        let notional = executed_price * requested_size;
        let commission = notional * self.params.commission_rate;

        match action {
            Action::Buy => {
                let total_cost = notional + commission;
                if total_cost > state.cash {
                    return Self::reject(&mut state, symbol, action, requested_size, ref_price, meta,
                        "insufficient funds".into());
                }
                state.cash -= total_cost;
                state
                    .positions
                    .entry(symbol.to_string())
                    .and_modify(|p| {
                        let new_size = p.size + requested_size;
                        p.avg_entry_price =
                            (p.avg_entry_price * p.size + executed_price * requested_size) / new_size;
                        p.size = new_size;
                    })
                    .or_insert_with(|| Position {
                        symbol: symbol.to_string(),
                        size: requested_size,
                        avg_entry_price: executed_price,
                        opened_at: Utc::now(),
                    });
            }
            Action::Sell => {
                let has_enough = state
                    .positions
                    .get(symbol)
                    .map(|p| p.size >= requested_size)
                    .unwrap_or(false);
                if !has_enough {
                    return Self::reject(&mut state, symbol, action, requested_size, ref_price, meta,
                        "no position or insufficient size to sell".into());
                }
                let avg_entry = state.positions[symbol].avg_entry_price;
                state.cash += notional - commission;
                state.daily_pnl += (executed_price - avg_entry) * requested_size - commission;

                if state.daily_pnl < -self.params.max_daily_loss * state.initial_capital {
                    state.breaker_tripped = true;
                }

                let position = state.positions.get_mut(symbol).expect("checked above");
                position.size -= requested_size;
                if position.size <= 0.0 {
                    state.positions.remove(symbol);
                }
            }
            Action::Hold => unreachable!(),
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            action,
            requested_size,
            requested_price: ref_price,
            executed_price: Some(executed_price),
            executed_at: Some(now),
            status: OrderStatus::Filled,
            model: meta.model,
            confidence: meta.confidence,
            reasoning: meta.reasoning,
            commission,
            rejection_reason: None,
        };
        state.orders.push(order.clone());
        state.trades.push(Trade {
            symbol: symbol.to_string(),
            action,
            size: requested_size,
            executed_price,
            commission,
            at: now,
        });
        Ok(order)
    }

    fn reject(
        state: &mut LedgerState,
        symbol: &str,
        action: Action,
        requested_size: f64,
        ref_price: f64,
        meta: ExecutionMeta,
        reason: String,
    ) -> Result<Order, LedgerError> {
        let order = Order {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            action,
            requested_size,
            requested_price: ref_price,
            executed_price: None,
            executed_at: None,
            status: OrderStatus::Rejected,
            model: meta.model,
            confidence: meta.confidence,
            reasoning: meta.reasoning,
            commission: 0.0,
            rejection_reason: Some(reason.clone()),
        };
        state.orders.push(order.clone());
        Err(LedgerError::InvalidOrder(reason))
    }

    pub fn state(&self, px_map: &HashMap<String, f64>) -> AccountView {
        let state = self.state.lock();

        let mut position_value = 0.0;
        let mut positions = Vec::with_capacity(state.positions.len());
        for p in state.positions.values() {
            let px = px_map.get(&p.symbol).copied().unwrap_or(p.avg_entry_price);
            let value = p.size * px;
            position_value += value;
            positions.push(PositionView {
                symbol: p.symbol.clone(),
                size: p.size,
                avg_entry_price: p.avg_entry_price,
                unrealized_pnl: (px - p.avg_entry_price) * p.size,
            });
        }
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let total_value = state.cash + position_value;
        let total_return_pct = if state.initial_capital > 0.0 {
            (total_value - state.initial_capital) / state.initial_capital * 100.0
        } else {
            0.0
        };

        let (wins, closed) = Self::replay_win_rate(&state.trades, self.params.commission_rate);
        let win_rate = if closed > 0 {
            wins as f64 / closed as f64 * 100.0
        } else {
            0.0
        };

        AccountView {
            cash: state.cash,
            position_value,
            total_value,
            total_return_pct,
            daily_pnl: state.daily_pnl,
            breaker_tripped: state.breaker_tripped,
            positions,
            win_rate,
            trade_count: state.trades.len(),
        }
    }

    /// Replay trades in order, maintaining a per-symbol weighted-average BUY
    /// price that is **not** reset by a full SELL. Each SELL counts as one
    /// closed trade, winning iff `sellPrice > avgBuyPrice * (1 + 2κ)`.
    fn replay_win_rate(trades: &[Trade], commission_rate: f64) -> (u32, u32) {
        let mut avg_buy: HashMap<&str, (f64, f64)> = HashMap::new(); // symbol -> (avg_price, cumulative_size)
        let mut wins = 0;
        let mut closed = 0;

        for t in trades {
            match t.action {
                Action::Buy => {
                    let entry = avg_buy.entry(t.symbol.as_str()).or_insert((0.0, 0.0));
                    let new_size = entry.1 + t.size;
                    entry.0 = (entry.0 * entry.1 + t.executed_price * t.size) / new_size;
                    entry.1 = new_size;
                }
                Action::Sell => {
                    if let Some((avg_price, _)) = avg_buy.get(t.symbol.as_str()) {
                        closed += 1;
                        if t.executed_price > avg_price * (1.0 + WIN_MARGIN_MULTIPLIER * commission_rate) {
                            wins += 1;
                        }
                    }
                }
                Action::Hold => {}
            }
        }
        (wins, closed)
    }

    pub fn reset_daily(&self) {
        let mut state = self.state.lock();
        state.daily_pnl = 0.0;
        state.breaker_tripped = false;
    }

    #[cfg(test)]
    fn cash(&self) -> f64 {
        self.state.lock().cash
    }

    #[cfg(test)]
    fn position_size(&self, symbol: &str) -> f64 {
        self.state.lock().positions.get(symbol).map(|p| p.size).unwrap_or(0.0)
    }
}
