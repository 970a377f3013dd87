// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
// macd_line  = EMA(12) - EMA(26)
// signal     = EMA(9) of macd_line
// histogram  = macd_line - signal
//
// Both EMA legs are index-aligned with `closes` (pre-warm padded with the raw
// close, per `ema::calculate_ema_aligned`); the histogram itself pre-warm
// pads with `0.0`.
// =============================================================================

use super::ema::calculate_ema_aligned;

const FAST_PERIOD: usize = 12;
const SLOW_PERIOD: usize = 26;
const SIGNAL_PERIOD: usize = 9;

/// Full MACD histogram series, aligned 1:1 with `closes`.
///
/// Returns an all-zero series when there isn't enough history for the slow
/// EMA leg to produce a single warm value.
pub fn calculate_macd(closes: &[f64]) -> Vec<f64> {
    if closes.len() < SLOW_PERIOD {
        return vec![0.0; closes.len()];
    }

    let ema_fast = calculate_ema_aligned(closes, FAST_PERIOD);
    let ema_slow = calculate_ema_aligned(closes, SLOW_PERIOD);

    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    // The signal line is only meaningful once the slow EMA has warmed up;
    // compute it over the warm tail only, then pad the rest with zero.
    let warm_start = SLOW_PERIOD - 1;
    let warm_macd = &macd_line[warm_start..];
    let signal_warm = calculate_ema_aligned(warm_macd, SIGNAL_PERIOD);

    let mut histogram = vec![0.0; warm_start];
    for (m, s) in warm_macd.iter().zip(signal_warm.iter()) {
        histogram.push(m - s);
    }
    histogram
}

/// Return the latest MACD histogram value, or `0.0` if there isn't enough
/// history — matches `IndicatorPipeline`'s documented default.
pub fn current_macd(closes: &[f64]) -> f64 {
    calculate_macd(closes).last().copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_empty_input() {
        assert!(calculate_macd(&[]).is_empty());
    }

    #[test]
    fn macd_insufficient_data_is_all_zero() {
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let out = calculate_macd(&closes);
        assert_eq!(out.len(), closes.len());
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn macd_aligned_length_matches_input() {
        let closes: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        let out = calculate_macd(&closes);
        assert_eq!(out.len(), closes.len());
    }

    #[test]
    fn macd_steady_uptrend_is_positive() {
        // A persistent uptrend: fast EMA pulls ahead of slow EMA, so the
        // macd line (and eventually the histogram) should be positive.
        let closes: Vec<f64> = (1..=200).map(|x| x as f64).collect();
        let out = calculate_macd(&closes);
        let tail_avg: f64 = out[out.len() - 20..].iter().sum::<f64>() / 20.0;
        assert!(tail_avg > 0.0, "expected positive histogram tail, got {tail_avg}");
    }

    #[test]
    fn macd_flat_series_is_near_zero() {
        let closes = vec![100.0; 100];
        let out = calculate_macd(&closes);
        for &v in out.iter().skip(30) {
            assert!(v.abs() < 1e-9, "expected ~0.0, got {v}");
        }
    }

    #[test]
    fn current_macd_on_short_series_is_zero() {
        assert_eq!(current_macd(&[1.0, 2.0, 3.0]), 0.0);
    }
}
