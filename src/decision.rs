// =============================================================================
// Decision / DecisionBundle — spec.md §3, §9
// =============================================================================

use serde::{Deserialize, Serialize};

/// `{symbol, action, confidence, reasoning, positionSize, stopLoss?,
/// takeProfit?}`. Invariants (enforced by `ResponseValidator`, not here —
/// this type is a plain data carrier): `HOLD ⇒ positionSize = 0`;
/// `BUY ∧ stopLoss ∧ takeProfit ⇒ stopLoss < takeProfit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub symbol: String,
    pub action: Action,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(rename = "positionSize")]
    pub position_size: f64,
    #[serde(rename = "stopLoss", default)]
    pub stop_loss: Option<f64>,
    #[serde(rename = "takeProfit", default)]
    pub take_profit: Option<f64>,
}

impl Decision {
    pub fn is_internally_consistent(&self) -> bool {
        if self.action == Action::Hold && self.position_size != 0.0 {
            return false;
        }
        if let (Action::Buy, Some(stop), Some(take)) =
            (self.action, self.stop_loss, self.take_profit)
        {
            if stop >= take {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            "HOLD" => Ok(Self::Hold),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

/// An ordered sequence of `Decision`s for one model in one round, unique by
/// `symbol`. Construction through `ResponseValidator` is the only supported
/// path to guarantee uniqueness; this type itself does not re-check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionBundle {
    pub decisions: Vec<Decision>,
}

impl DecisionBundle {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self { decisions }
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }
}

/// The wire-level shape a model may return before validation: either a single
/// decision (single-asset mode) or an array (multi-asset mode). The validator
/// normalizes both into a `DecisionBundle`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawDecision {
    Multi(Vec<Decision>),
    Single(Decision),
}

impl RawDecision {
    pub fn into_decisions(self) -> Vec<Decision> {
        match self {
            Self::Single(d) => vec![d],
            Self::Multi(ds) => ds,
        }
    }
}
