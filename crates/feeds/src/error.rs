//! Error types for quote fetching.

use pricebot_core::Symbol;
use thiserror::Error;

/// Errors that can occur while talking to a quote provider.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Symbol not supported by provider: {0}")]
    UnsupportedSymbol(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::ParseError(err.to_string())
        } else if let Some(status) = err.status() {
            FeedError::HttpStatus(status.as_u16())
        } else {
            FeedError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl FeedError {
    /// Returns true if this error is transient and likely to succeed on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FeedError::ConnectionFailed(_)
                | FeedError::Timeout(_)
                | FeedError::RateLimitExceeded
                | FeedError::HttpStatus(500..=599)
        )
    }
}

/// No quote could be obtained for a symbol this time.
///
/// This is the only failure a [`crate::PriceSource`] reports; callers decide
/// the user-facing message.
#[derive(Debug, Error)]
#[error("{symbol} quote unavailable: {reason}")]
pub struct Unavailable {
    pub symbol: Symbol,
    pub reason: FeedError,
}

impl Unavailable {
    pub fn new(symbol: Symbol, reason: FeedError) -> Self {
        Self { symbol, reason }
    }
}
