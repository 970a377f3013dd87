// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the core technical indicators used
// by the trading engine, plus the `pipeline` that assembles them into the
// scalar+series bundle a round's market snapshot carries per symbol.

pub mod ema;
pub mod rsi;
pub mod macd;
pub mod pipeline;

pub use pipeline::{IndicatorSeries, IndicatorSet, compute_from_candles};
