//! Price Source Adapter.
//!
//! Wraps the upstream quote providers behind [`PriceSource`]:
//!
//! - `coinbase` - plain ticker provider (Coinbase Exchange REST)
//! - `coingecko` - rich quote provider (CoinGecko simple price)
//! - `source` - fallback ordering, timeouts, conversion to [`Unavailable`]
//! - `mock` - scriptable source for tests

pub mod coinbase;
pub mod coingecko;
pub mod error;
pub mod mock;
pub mod provider;
pub mod source;

pub use coinbase::CoinbaseTicker;
pub use coingecko::CoinGeckoQuotes;
pub use error::{FeedError, Unavailable};
pub use mock::MockPriceSource;
pub use provider::{QuoteProvider, TickerProvider};
pub use source::{FallbackPriceSource, PriceSource, DEFAULT_FETCH_TIMEOUT};
