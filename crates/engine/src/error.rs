//! Error types for the store, persistence, valuation and notification.

use pricebot_core::Symbol;
use thiserror::Error;

/// Rejected user-store mutation. State is unchanged when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(f64),

    #[error("Invalid target price: {0}")]
    InvalidPrice(f64),

    #[error("Alert already exists: {symbol} at {target_price}")]
    DuplicateAlert { symbol: Symbol, target_price: f64 },

    #[error("No alert #{index} (have {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unsupported symbol: {0}")]
    UnknownSymbol(String),
}

impl StoreError {
    /// Malformed user-supplied quantity, price, index or symbol.
    pub fn is_invalid_input(&self) -> bool {
        !matches!(self, StoreError::DuplicateAlert { .. })
    }
}

/// Failure reading or writing the durable snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Portfolio could not be valued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValuationError {
    #[error("No holdings set")]
    EmptyPortfolio,
}

/// Message delivery failed.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Transport(String),

    #[error("Recipient unreachable: {0}")]
    Unreachable(i64),
}
