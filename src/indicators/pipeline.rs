// =============================================================================
// IndicatorPipeline — spec.md §4.2
// =============================================================================
//
// Pure function: candles in, a scalar+series bundle out. No I/O, no errors —
// an empty `Series` (or one shorter than an indicator's warm-up period) falls
// back to the documented defaults rather than failing the round.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::{ema, macd, rsi};
use crate::market_data::candle::Series;

const EMA_PERIOD: usize = 20;
const RSI14_PERIOD: usize = 14;
const RSI7_PERIOD: usize = 7;
const TAIL_LEN: usize = 20;

const DEFAULT_RSI: f64 = 50.0;
const DEFAULT_MACD: f64 = 0.0;

/// Per-symbol scalar snapshot — the last computable value of each indicator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub ema20: f64,
    pub rsi14: f64,
    pub rsi7: f64,
    pub macd: f64,
    pub volume: f64,
}

/// Per-symbol aligned series, trimmed to the most recent `TAIL_LEN` points
/// (or fewer, if fewer are available).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub ema20: Vec<f64>,
    pub rsi14: Vec<f64>,
    pub rsi7: Vec<f64>,
    pub macd: Vec<f64>,
}

/// `computeFromCandles(candles, timeframe) -> {scalars, serieses}`.
///
/// `timeframe` is accepted for interface parity with `spec.md` §4.2 but the
/// indicator math itself is timeframe-agnostic (it operates purely on the
/// close/volume columns already bucketed by the caller).
pub fn compute_from_candles(series: &Series, _timeframe: &str) -> (IndicatorSet, IndicatorSeries) {
    if series.is_empty() {
        return (
            IndicatorSet {
                ema20: 0.0,
                rsi14: DEFAULT_RSI,
                rsi7: DEFAULT_RSI,
                macd: DEFAULT_MACD,
                volume: 0.0,
            },
            IndicatorSeries::default(),
        );
    }

    let closes = series.closes();
    let last_close = *closes.last().expect("non-empty series has a last close");
    let last_volume = series.latest().expect("non-empty series has a latest candle").v;

    let ema20_aligned = ema::calculate_ema_aligned(&closes, EMA_PERIOD);
    let rsi14_aligned = rsi::calculate_rsi_aligned(&closes, RSI14_PERIOD);
    let rsi7_aligned = rsi::calculate_rsi_aligned(&closes, RSI7_PERIOD);
    let macd_aligned = macd::calculate_macd(&closes);

    let ema20_scalar = ema20_aligned.last().copied().unwrap_or(last_close);
    let rsi14_scalar = rsi14_aligned.last().copied().unwrap_or(DEFAULT_RSI);
    let rsi7_scalar = rsi7_aligned.last().copied().unwrap_or(DEFAULT_RSI);
    let macd_scalar = macd_aligned.last().copied().unwrap_or(DEFAULT_MACD);

    let scalars = IndicatorSet {
        ema20: ema20_scalar,
        rsi14: rsi14_scalar,
        rsi7: rsi7_scalar,
        macd: macd_scalar,
        volume: last_volume,
    };

    let serieses = IndicatorSeries {
        ema20: tail(&ema20_aligned),
        rsi14: tail(&rsi14_aligned),
        rsi7: tail(&rsi7_aligned),
        macd: tail(&macd_aligned),
    };

    (scalars, serieses)
}

fn tail(values: &[f64]) -> Vec<f64> {
    if values.len() <= TAIL_LEN {
        values.to_vec()
    } else {
        values[values.len() - TAIL_LEN..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::candle::Candle;

    fn candle(t: i64, c: f64, v: f64) -> Candle {
        Candle { t, o: c, h: c + 0.5, l: c - 0.5, c, v }
    }

    fn series_of(closes: &[f64]) -> Series {
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| candle(i as i64 + 1, c, 10.0 + i as f64))
            .collect();
        Series::new(candles).unwrap()
    }

    #[test]
    fn empty_series_returns_all_defaults() {
        let series = Series::default();
        let (scalars, serieses) = compute_from_candles(&series, "1m");
        assert_eq!(scalars.rsi14, DEFAULT_RSI);
        assert_eq!(scalars.macd, DEFAULT_MACD);
        assert_eq!(scalars.volume, 0.0);
        assert!(serieses.ema20.is_empty());
        assert!(serieses.rsi14.is_empty());
        assert!(serieses.macd.is_empty());
    }

    #[test]
    fn short_series_falls_back_to_last_close_and_neutral_rsi() {
        let closes = vec![10.0, 11.0, 12.0];
        let series = series_of(&closes);
        let (scalars, _) = compute_from_candles(&series, "1m");
        assert_eq!(scalars.ema20, 12.0);
        assert_eq!(scalars.rsi14, DEFAULT_RSI);
        assert_eq!(scalars.rsi7, DEFAULT_RSI);
        assert_eq!(scalars.macd, DEFAULT_MACD);
        assert_eq!(scalars.volume, 12.0);
    }

    #[test]
    fn long_series_tail_is_capped_at_twenty() {
        let closes: Vec<f64> = (1..=200).map(|x| x as f64).collect();
        let series = series_of(&closes);
        let (_, serieses) = compute_from_candles(&series, "1m");
        assert_eq!(serieses.ema20.len(), TAIL_LEN);
        assert_eq!(serieses.rsi14.len(), TAIL_LEN);
        assert_eq!(serieses.rsi7.len(), TAIL_LEN);
        assert_eq!(serieses.macd.len(), TAIL_LEN);
    }

    #[test]
    fn scalars_match_last_element_of_aligned_series() {
        let closes: Vec<f64> = (1..=50).map(|x| x as f64).collect();
        let series = series_of(&closes);
        let (scalars, serieses) = compute_from_candles(&series, "1m");
        assert_eq!(scalars.ema20, *serieses.ema20.last().unwrap());
        assert_eq!(scalars.rsi14, *serieses.rsi14.last().unwrap());
        assert_eq!(scalars.rsi7, *serieses.rsi7.last().unwrap());
        assert_eq!(scalars.macd, *serieses.macd.last().unwrap());
    }
}
