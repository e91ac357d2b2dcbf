//! Price observations and quotes.

use crate::{Symbol, SymbolInfo};
use serde::{Deserialize, Serialize};

/// One polled price observation for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: Symbol,
    /// Last trade price in USD
    pub price: f64,
    /// 24h volume in base units, as reported by the ticker
    pub volume: f64,
    /// Observation time in milliseconds
    pub timestamp_ms: i64,
}

impl PriceTick {
    /// Create a tick stamped with the current time.
    pub fn new(symbol: Symbol, price: f64, volume: f64) -> Self {
        Self {
            symbol,
            price,
            volume,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Rich quote for a symbol. Change and market cap are absent when the quote
/// was derived from a plain ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedQuote {
    pub symbol: Symbol,
    pub name: String,
    pub price: f64,
    /// 24h change in percent
    pub change_24h: Option<f64>,
    pub market_cap: Option<f64>,
    /// 24h volume in USD
    pub volume_24h: Option<f64>,
}

impl DetailedQuote {
    /// Degraded quote built from a plain ticker.
    pub fn from_tick(info: &SymbolInfo, tick: &PriceTick) -> Self {
        Self {
            symbol: info.symbol.clone(),
            name: info.name.to_string(),
            price: tick.price,
            change_24h: None,
            market_cap: None,
            // Ticker volume is in base units; convert to USD at the tick price.
            volume_24h: Some(tick.volume * tick.price),
        }
    }

    /// True when change and market cap are missing.
    pub fn is_degraded(&self) -> bool {
        self.change_24h.is_none() && self.market_cap.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compact_str::CompactString;

    #[test]
    fn test_price_tick_new() {
        let tick = PriceTick::new(CompactString::new("BTC"), 50_000.0, 12.5);
        assert_eq!(tick.symbol.as_str(), "BTC");
        assert_eq!(tick.price, 50_000.0);
        assert!(tick.timestamp_ms > 0);
    }

    #[test]
    fn test_detailed_quote_from_tick() {
        let info = SymbolInfo::new("ETH", "Ethereum", "ethereum");
        let tick = PriceTick::new(info.symbol.clone(), 2_000.0, 10.0);
        let quote = DetailedQuote::from_tick(&info, &tick);

        assert_eq!(quote.name, "Ethereum");
        assert_eq!(quote.price, 2_000.0);
        assert_eq!(quote.volume_24h, Some(20_000.0));
        assert!(quote.is_degraded());
    }
}
