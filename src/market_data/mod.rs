pub mod candle;
pub mod cache;
pub mod exchange;
pub mod rate_limiter;
pub mod source;

pub use candle::{Candle, Series};
pub use cache::SeriesCache;
pub use exchange::{ExchangeFacade, RawCandleRow, RestExchange};
pub use rate_limiter::RateLimiter;
pub use source::MarketDataSource;
