// =============================================================================
// Relative Strength Index — Wilder's smoothing
// =============================================================================
//
// RSI scores recent price momentum on a 0-100 scale so the caller can judge
// whether an asset looks overbought or oversold.
//
// The algorithm in four steps:
//   1. Turn closes into per-step deltas (up moves and down moves).
//   2. Seed an average up-move and average down-move from the first `period`
//      deltas (a plain SMA).
//   3. Roll those averages forward with Wilder's smoothing, which is an EMA
//      with weight `1/period` instead of the usual `2/(period+1)`:
//        avg_up[t]   = (avg_up[t-1]   * (period-1) + up[t])   / period
//        avg_down[t] = (avg_down[t-1] * (period-1) + down[t]) / period
//   4. Fold the two averages into a 0-100 score:
//        rs  = avg_up / avg_down
//        rsi = 100 - 100 / (1 + rs)
// =============================================================================

/// Compute the RSI series for `closes` over `period` trailing candles.
///
/// Output index 0 lines up with `closes[period]` — the first delta window
/// that has a full `period` of history behind it to seed the averages.
///
/// Returns an empty vector when `period` is zero or there aren't at least
/// `period + 1` closes (so at least `period` deltas exist to seed from).
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let steps: Vec<f64> = closes.windows(2).map(|pair| pair[1] - pair[0]).collect();

    let n = period as f64;
    let (up_total, down_total) = steps[..period].iter().fold((0.0_f64, 0.0_f64), |(up, down), &step| {
        if step > 0.0 {
            (up + step, down)
        } else {
            (up, down - step)
        }
    });

    let mut avg_up = up_total / n;
    let mut avg_down = down_total / n;

    let Some(seed) = rsi_from_averages(avg_up, avg_down) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(steps.len() - period + 1);
    out.push(seed);

    for &step in &steps[period..] {
        let up_move = step.max(0.0);
        let down_move = (-step).max(0.0);

        avg_up = (avg_up * (n - 1.0) + up_move) / n;
        avg_down = (avg_down * (n - 1.0) + down_move) / n;

        match rsi_from_averages(avg_up, avg_down) {
            Some(value) => out.push(value),
            None => break,
        }
    }

    out
}

/// `calculate_rsi`, padded back out to `closes.len()`: positions before the
/// first real RSI reading hold the neutral value `50.0`, matching the
/// pipeline's documented fallback for indicators with no history yet.
pub fn calculate_rsi_aligned(closes: &[f64], period: usize) -> Vec<f64> {
    if closes.is_empty() {
        return Vec::new();
    }
    let core = calculate_rsi(closes, period);
    if core.is_empty() {
        return vec![50.0; closes.len()];
    }
    let prefix_len = closes.len() - core.len();
    let mut out = Vec::with_capacity(closes.len());
    out.resize(prefix_len, 50.0);
    out.extend_from_slice(&core);
    out
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Turn an average up-move and average down-move into a 0-100 RSI reading.
///
/// No movement at all reads as neutral (50). Pure up-moves (average down is
/// zero) saturate at 100 rather than dividing by zero. `None` signals the
/// inputs produced a non-finite score.
fn rsi_from_averages(avg_up: f64, avg_down: f64) -> Option<f64> {
    let score = if avg_up == 0.0 && avg_down == 0.0 {
        50.0
    } else if avg_down == 0.0 {
        100.0
    } else {
        let relative_strength = avg_up / avg_down;
        100.0 - 100.0 / (1.0 + relative_strength)
    };

    score.is_finite().then_some(score)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_up(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    fn ramp_down(n: usize) -> Vec<f64> {
        (1..=n).rev().map(|i| i as f64).collect()
    }

    #[test]
    fn no_closes_gives_no_series() {
        assert!(calculate_rsi(&[], 14).is_empty());
    }

    #[test]
    fn zero_period_gives_no_series() {
        assert!(calculate_rsi(&[10.0, 11.0, 12.0], 0).is_empty());
    }

    #[test]
    fn needs_at_least_period_plus_one_closes() {
        // 14 closes => 13 deltas, one short of the 14 needed to seed.
        let closes = ramp_up(14);
        assert!(calculate_rsi(&closes, 14).is_empty());
    }

    #[test]
    fn relentless_uptrend_saturates_at_one_hundred() {
        let closes = ramp_up(30);
        let series = calculate_rsi(&closes, 14);
        assert!(!series.is_empty());
        assert!(series.iter().all(|&v| (v - 100.0).abs() < 1e-10));
    }

    #[test]
    fn relentless_downtrend_bottoms_at_zero() {
        let closes = ramp_down(30);
        let series = calculate_rsi(&closes, 14);
        assert!(!series.is_empty());
        assert!(series.iter().all(|&v| v.abs() < 1e-10));
    }

    #[test]
    fn unchanging_price_reads_as_neutral_fifty() {
        let closes = vec![42.0; 30];
        let series = calculate_rsi(&closes, 14);
        assert!(!series.is_empty());
        assert!(series.iter().all(|&v| (v - 50.0).abs() < 1e-10));
    }

    #[test]
    fn output_always_stays_within_bounds() {
        let closes = vec![
            51.2, 50.8, 51.5, 49.9, 50.3, 51.9, 52.4, 51.7, 53.0, 52.6, 51.1, 50.4, 49.6, 48.8,
            49.2, 50.0, 51.3, 52.1,
        ];
        let series = calculate_rsi(&closes, 14);
        for &v in &series {
            assert!((0.0..=100.0).contains(&v), "rsi {v} escaped [0,100]");
        }
    }

    #[test]
    fn aligned_output_starts_neutral_before_first_real_reading() {
        let closes = ramp_up(30);
        let out = calculate_rsi_aligned(&closes, 14);
        assert_eq!(out.len(), closes.len());
        assert_eq!(out[0], 50.0);
    }

    #[test]
    fn aligned_on_short_history_is_entirely_neutral() {
        let closes = vec![1.0, 2.0, 3.0];
        let out = calculate_rsi_aligned(&closes, 14);
        assert_eq!(out, vec![50.0; 3]);
    }
}
