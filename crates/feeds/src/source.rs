//! Price Source Adapter: a single "fetch current price" capability over
//! the upstream providers, with rich-then-plain fallback for quotes.

use crate::coinbase::CoinbaseTicker;
use crate::coingecko::CoinGeckoQuotes;
use crate::error::{FeedError, Unavailable};
use crate::provider::{QuoteProvider, TickerProvider};
use async_trait::async_trait;
use pricebot_core::{DetailedQuote, PriceTick, SymbolInfo};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on a single upstream call.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Capability consumed by the alert engine, valuator and command handlers.
///
/// Implementations never fail with anything but [`Unavailable`] and never retry.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current price of a symbol.
    async fn fetch_price(&self, symbol: &SymbolInfo) -> Result<PriceTick, Unavailable>;

    /// Detailed quote, degraded to price-only when the rich provider fails.
    async fn fetch_detailed_quote(&self, symbol: &SymbolInfo)
        -> Result<DetailedQuote, Unavailable>;
}

/// Price source that tries a rich quote provider first and falls back to a
/// plain ticker provider. Every upstream call is bounded by `timeout`.
pub struct FallbackPriceSource {
    ticker: Box<dyn TickerProvider>,
    quotes: Box<dyn QuoteProvider>,
    timeout: Duration,
}

impl FallbackPriceSource {
    pub fn new(
        ticker: Box<dyn TickerProvider>,
        quotes: Box<dyn QuoteProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            ticker,
            quotes,
            timeout,
        }
    }

    /// Coinbase tickers with CoinGecko quotes over a shared HTTP client.
    pub fn live(timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(
            Box::new(CoinbaseTicker::new(client.clone())),
            Box::new(CoinGeckoQuotes::new(client)),
            timeout,
        ))
    }

    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, FeedError>> + Send,
    ) -> Result<T, FeedError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Timeout(format!(
                "{} after {:?}",
                what, self.timeout
            ))),
        }
    }

    async fn plain_tick(&self, symbol: &SymbolInfo) -> Result<PriceTick, FeedError> {
        self.bounded(self.ticker.name(), self.ticker.ticker(symbol))
            .await
    }
}

#[async_trait]
impl PriceSource for FallbackPriceSource {
    async fn fetch_price(&self, symbol: &SymbolInfo) -> Result<PriceTick, Unavailable> {
        self.plain_tick(symbol).await.map_err(|e| {
            log_failure(self.ticker.name(), symbol, &e);
            Unavailable::new(symbol.symbol.clone(), e)
        })
    }

    async fn fetch_detailed_quote(
        &self,
        symbol: &SymbolInfo,
    ) -> Result<DetailedQuote, Unavailable> {
        let rich = self
            .bounded(self.quotes.name(), self.quotes.quote(symbol))
            .await;

        let rich_error = match rich {
            Ok(quote) => return Ok(quote),
            Err(e) => e,
        };
        debug!(
            symbol = %symbol.symbol,
            provider = self.quotes.name(),
            error = %rich_error,
            "Detailed quote failed, falling back to ticker"
        );

        match self.plain_tick(symbol).await {
            Ok(tick) => Ok(DetailedQuote::from_tick(symbol, &tick)),
            Err(e) => {
                log_failure(self.ticker.name(), symbol, &e);
                Err(Unavailable::new(symbol.symbol.clone(), e))
            }
        }
    }
}

/// Transient failures log at debug, permanent ones at warn.
fn log_failure(provider: &str, symbol: &SymbolInfo, error: &FeedError) {
    if error.is_transient() {
        debug!(symbol = %symbol.symbol, provider, error = %error, "Ticker fetch failed");
    } else {
        warn!(symbol = %symbol.symbol, provider, error = %error, "Ticker fetch failed");
    }
}
