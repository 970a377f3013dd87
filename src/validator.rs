// =============================================================================
// ResponseValidator — spec.md §4.4
// =============================================================================
//
// Raw model text in, a constrained `DecisionBundle` out. Sanitize -> parse ->
// coerce -> constrain, failing `ValidationError` with a human-readable reason
// at the first violation.
// =============================================================================

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;

use crate::decision::{Decision, DecisionBundle, RawDecision};
use crate::error::ValidationError;

const MIN_REASONING_LEN: usize = 10;
const MAX_REASONING_LEN: usize = 2000;

pub struct ResponseValidator;

impl ResponseValidator {
    /// Run the full sanitize/parse/coerce/constrain pipeline over one model's
    /// raw reply text.
    pub fn validate(raw_text: &str) -> Result<DecisionBundle, ValidationError> {
        let sanitized = Self::sanitize(raw_text);
        let value = Self::parse(&sanitized)?;
        let value = Self::coerce(value);
        let decisions = Self::to_decisions(value)?;
        Self::constrain(&decisions)?;
        Ok(DecisionBundle::new(decisions))
    }

    /// Step 1: extract the structured payload out of free model text.
    fn sanitize(text: &str) -> String {
        let text = extract_fenced_block(text).unwrap_or_else(|| text.to_string());
        let text = extract_outer_container(&text).unwrap_or(text);
        text.trim().to_string()
    }

    /// Step 2: parse as JSON (object for single-decision mode, array for
    /// multi-asset mode).
    fn parse(text: &str) -> Result<Value, ValidationError> {
        serde_json::from_str(text)
            .map_err(|e| ValidationError(format!("malformed JSON response: {e}")))
    }

    /// Step 3: coerce `action` upper-case; force `positionSize=0` on HOLD.
    fn coerce(value: Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(items.into_iter().map(coerce_one).collect()),
            other => coerce_one(other),
        }
    }

    fn to_decisions(value: Value) -> Result<Vec<Decision>, ValidationError> {
        serde_json::from_value::<RawDecision>(value)
            .map(RawDecision::into_decisions)
            .map_err(|e| ValidationError(format!("response did not match decision shape: {e}")))
    }

    /// Step 4: bounds, cross-checks, uniqueness, reasoning length.
    fn constrain(decisions: &[Decision]) -> Result<(), ValidationError> {
        if decisions.is_empty() {
            return Err(ValidationError("empty decision bundle".into()));
        }

        let mut seen = HashSet::new();
        for d in decisions {
            if !seen.insert(d.symbol.clone()) {
                return Err(ValidationError(format!("duplicate symbol in bundle: {}", d.symbol)));
            }
            if !(0.0..=1.0).contains(&d.confidence) {
                return Err(ValidationError(format!(
                    "confidence {} out of [0,1] for {}",
                    d.confidence, d.symbol
                )));
            }
            if !(0.0..=1.0).contains(&d.position_size) {
                return Err(ValidationError(format!(
                    "positionSize {} out of [0,1] for {}",
                    d.position_size, d.symbol
                )));
            }
            let len = d.reasoning.chars().count();
            if !(MIN_REASONING_LEN..=MAX_REASONING_LEN).contains(&len) {
                return Err(ValidationError(format!(
                    "reasoning length {len} out of [{MIN_REASONING_LEN},{MAX_REASONING_LEN}] for {}",
                    d.symbol
                )));
            }
            if !d.is_internally_consistent() {
                return Err(ValidationError(format!(
                    "internally inconsistent decision for {}",
                    d.symbol
                )));
            }
        }
        Ok(())
    }
}

fn coerce_one(value: Value) -> Value {
    let Value::Object(mut obj) = value else {
        return value;
    };

    let is_hold = match obj.get("action") {
        Some(Value::String(s)) => {
            let upper = s.to_ascii_uppercase();
            obj.insert("action".into(), Value::String(upper.clone()));
            upper == "HOLD"
        }
        _ => false,
    };

    if is_hold {
        if let Some(size) = obj.get("positionSize") {
            if size.as_f64() != Some(0.0) {
                warn!("forcing positionSize to 0 for HOLD decision");
            }
        }
        obj.insert("positionSize".into(), Value::from(0.0));
    }

    Value::Object(obj)
}

/// If `text` contains a fenced code block (\`\`\`...\`\`\`), return only its
/// content (optionally skipping a leading language tag on the opening fence).
fn extract_fenced_block(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_open = start + 3;
    let rest = &text[after_open..];
    let first_newline = rest.find('\n').unwrap_or(0);
    let body_start = after_open + first_newline + 1;
    let close_rel = text[body_start..].find("```")?;
    Some(text[body_start..body_start + close_rel].to_string())
}

/// Keep the substring from the first opening brace/bracket to the last
/// matching closing brace/bracket of the outer container.
fn extract_outer_container(text: &str) -> Option<String> {
    let first_obj = text.find('{');
    let first_arr = text.find('[');

    let (open_ch, close_ch, start) = match (first_obj, first_arr) {
        (Some(o), Some(a)) if a < o => ('[', ']', a),
        (Some(o), _) => ('{', '}', o),
        (None, Some(a)) => ('[', ']', a),
        (None, None) => return None,
    };

    let last_close = text.rfind(close_ch)?;
    if last_close < start {
        return None;
    }
    let _ = open_ch;
    Some(text[start..=last_close].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Action;

    const REASON: &str = "solid setup with confirmed trend";

    #[test]
    fn validates_plain_single_object() {
        let text = format!(
            r#"{{"symbol":"BTC/USDT","action":"buy","confidence":0.7,"reasoning":"{REASON}","positionSize":0.3}}"#
        );
        let bundle = ResponseValidator::validate(&text).unwrap();
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle.decisions[0].action, Action::Buy);
    }

    #[test]
    fn strips_fenced_code_block_wrapper() {
        let text = format!(
            "Here is my decision:\n```json\n{{\"symbol\":\"BTC/USDT\",\"action\":\"hold\",\"confidence\":0.4,\"reasoning\":\"{REASON}\",\"positionSize\":0.9}}\n```\nthanks"
        );
        let bundle = ResponseValidator::validate(&text).unwrap();
        assert_eq!(bundle.decisions[0].action, Action::Hold);
        // HOLD forces positionSize to 0 regardless of what the model said.
        assert_eq!(bundle.decisions[0].position_size, 0.0);
    }

    #[test]
    fn extracts_outer_array_from_surrounding_prose() {
        let text = format!(
            r#"sure, here: [{{"symbol":"BTC/USDT","action":"HOLD","confidence":0.5,"reasoning":"{REASON}","positionSize":0}}] done"#
        );
        let bundle = ResponseValidator::validate(&text).unwrap();
        assert_eq!(bundle.len(), 1);
    }

    #[test]
    fn rejects_duplicate_symbol_in_bundle() {
        let text = format!(
            r#"[{{"symbol":"BTC/USDT","action":"BUY","confidence":0.5,"reasoning":"{REASON}","positionSize":0.1}},
                {{"symbol":"BTC/USDT","action":"SELL","confidence":0.5,"reasoning":"{REASON}","positionSize":0.1}}]"#
        );
        let err = ResponseValidator::validate(&text).unwrap_err();
        assert!(err.0.contains("duplicate symbol"));
    }

    #[test]
    fn rejects_position_size_above_one() {
        let text = format!(
            r#"{{"symbol":"BTC/USDT","action":"BUY","confidence":0.5,"reasoning":"{REASON}","positionSize":1.5}}"#
        );
        let err = ResponseValidator::validate(&text).unwrap_err();
        assert!(err.0.contains("positionSize"));
    }

    #[test]
    fn rejects_reasoning_too_short() {
        let text = r#"{"symbol":"BTC/USDT","action":"BUY","confidence":0.5,"reasoning":"short","positionSize":0.1}"#;
        let err = ResponseValidator::validate(text).unwrap_err();
        assert!(err.0.contains("reasoning length"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ResponseValidator::validate("not json at all").unwrap_err();
        assert!(err.0.contains("malformed JSON"));
    }

    #[test]
    fn rejects_buy_with_stop_above_take() {
        let text = format!(
            r#"{{"symbol":"BTC/USDT","action":"BUY","confidence":0.5,"reasoning":"{REASON}","positionSize":0.1,"stopLoss":50,"takeProfit":10}}"#
        );
        let err = ResponseValidator::validate(&text).unwrap_err();
        assert!(err.0.contains("inconsistent"));
    }
}
