// =============================================================================
// Exponential Moving Average
// =============================================================================
//
// Unlike a simple moving average, EMA weights recent closes more heavily, so
// it reacts faster to new price action. Each point folds the previous EMA
// together with the new close under a fixed smoothing weight:
//
//   weight   = 2 / (period + 1)
//   ema[t]   = close[t] * weight + ema[t-1] * (1 - weight)
//
// The series has to start somewhere, so the first output value is just the
// plain average (SMA) of the first `period` closes.
// =============================================================================

/// Build the EMA series for `closes` at the given look-back `period`.
///
/// The first output lines up with `closes[period - 1]`; everything before
/// that is warm-up data with no EMA defined yet, so it's dropped.
///
/// Returns an empty vector whenever there isn't enough history to seed the
/// average, or when `period` is zero (that would divide by zero below).
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let weight = 2.0 / (period + 1) as f64;

    let seed: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let mut series = Vec::with_capacity(closes.len() - period + 1);
    series.push(seed);

    let mut running = seed;
    for &price in &closes[period..] {
        let next = price * weight + running * (1.0 - weight);
        if !next.is_finite() {
            // Once the series goes non-finite there's nothing trustworthy to
            // keep computing from, so stop rather than propagate garbage.
            break;
        }
        series.push(next);
        running = next;
    }

    series
}

/// Same computation as `calculate_ema`, but the output is padded back out to
/// `closes.len()` so callers can index it in lockstep with the raw price
/// series. Positions before the EMA seed is available hold the raw close at
/// that index, per the pipeline's pre-warm convention.
pub fn calculate_ema_aligned(closes: &[f64], period: usize) -> Vec<f64> {
    if closes.is_empty() {
        return Vec::new();
    }
    let core = calculate_ema(closes, period);
    if core.is_empty() {
        return closes.to_vec();
    }
    let prefix_len = closes.len() - core.len();
    let mut out = Vec::with_capacity(closes.len());
    out.extend_from_slice(&closes[..prefix_len]);
    out.extend_from_slice(&core);
    out
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn empty_series_yields_empty_output() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(calculate_ema(&[10.0, 20.0, 30.0], 0).is_empty());
    }

    #[test]
    fn shorter_than_period_yields_empty_output() {
        assert!(calculate_ema(&[10.0, 20.0], 6).is_empty());
    }

    #[test]
    fn period_matching_series_length_gives_single_sma_seed() {
        let prices = vec![10.0, 20.0, 30.0];
        let out = calculate_ema(&prices, 3);
        assert_eq!(out.len(), 1);
        assert!((out[0] - 20.0).abs() < 1e-10);
    }

    #[test]
    fn matches_hand_rolled_recurrence_over_a_ramp() {
        let prices = ramp(10);
        let out = calculate_ema(&prices, 5);
        assert_eq!(out.len(), 6);

        // Reconstruct the recurrence independently to cross-check the result.
        let w = 2.0 / 6.0;
        let mut reference = Vec::with_capacity(6);
        let mut acc = 3.0; // SMA of [1,2,3,4,5]
        reference.push(acc);
        for &price in &prices[5..] {
            acc = price * w + acc * (1.0 - w);
            reference.push(acc);
        }

        for (computed, want) in out.iter().zip(reference.iter()) {
            assert!((computed - want).abs() < 1e-10, "computed {computed}, want {want}");
        }
    }

    #[test]
    fn series_truncates_after_a_nan_value() {
        let prices = vec![5.0, 6.0, 7.0, f64::NAN, 9.0];
        let out = calculate_ema(&prices, 3);
        // Seed covers [5,6,7]; the next fold hits NaN and the loop bails out.
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn aligned_pads_prewarm_with_raw_close() {
        let prices = ramp(10);
        let out = calculate_ema_aligned(&prices, 5);
        assert_eq!(out.len(), prices.len());
        assert_eq!(out[..4], prices[..4]);
    }

    #[test]
    fn aligned_on_too_short_series_returns_raw_closes() {
        let prices = vec![3.0, 4.0];
        let out = calculate_ema_aligned(&prices, 30);
        assert_eq!(out, prices);
    }
}
