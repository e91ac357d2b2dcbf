//! Upstream quote provider interfaces.

use crate::error::FeedError;
use async_trait::async_trait;
use pricebot_core::{DetailedQuote, PriceTick, SymbolInfo};
use reqwest::StatusCode;

/// Provider of plain last-trade tickers.
#[async_trait]
pub trait TickerProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Fetch the current ticker for a symbol.
    async fn ticker(&self, symbol: &SymbolInfo) -> Result<PriceTick, FeedError>;
}

/// Provider of rich quotes (24h change, market cap, volume).
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Fetch a detailed quote for a symbol.
    async fn quote(&self, symbol: &SymbolInfo) -> Result<DetailedQuote, FeedError>;
}

/// Map a non-success HTTP status to a feed error.
pub(crate) fn check_status(status: StatusCode) -> Result<(), FeedError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Err(FeedError::RateLimitExceeded)
    } else {
        Err(FeedError::HttpStatus(status.as_u16()))
    }
}

/// Parse a price field, rejecting negative and non-finite values.
pub(crate) fn parse_price(field: &str, value: f64) -> Result<f64, FeedError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(FeedError::ParseError(format!("Invalid {}: {}", field, value)))
    }
}
