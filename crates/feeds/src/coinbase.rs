//! Coinbase Exchange ticker provider.

use crate::error::FeedError;
use crate::provider::{check_status, parse_price, TickerProvider};
use async_trait::async_trait;
use pricebot_core::{PriceTick, SymbolInfo};
use serde::Deserialize;

/// Ticker response: `{"price":"50000.00","volume":"1234.5",...}`
#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: String,
    #[serde(default)]
    volume: Option<String>,
}

/// Coinbase Exchange REST ticker fetcher.
#[derive(Debug, Clone)]
pub struct CoinbaseTicker {
    client: reqwest::Client,
    base_url: String,
}

impl CoinbaseTicker {
    const BASE_URL: &'static str = "https://api.exchange.coinbase.com";

    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, Self::BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Parse a ticker body into a tick for the given symbol.
    pub fn parse_ticker(symbol: &SymbolInfo, body: &str) -> Result<PriceTick, FeedError> {
        let response: TickerResponse = serde_json::from_str(body)?;

        let price = response
            .price
            .trim()
            .parse::<f64>()
            .map_err(|_| FeedError::ParseError(format!("Invalid price: {}", response.price)))?;
        let price = parse_price("price", price)?;

        let volume = response
            .volume
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(0.0);

        Ok(PriceTick::new(symbol.symbol.clone(), price, volume))
    }
}

#[async_trait]
impl TickerProvider for CoinbaseTicker {
    fn name(&self) -> &'static str {
        "coinbase"
    }

    async fn ticker(&self, symbol: &SymbolInfo) -> Result<PriceTick, FeedError> {
        let url = format!("{}/products/{}/ticker", self.base_url, symbol.coinbase_id);

        let response = self.client.get(&url).send().await?;
        check_status(response.status())?;

        let body = response.text().await?;
        Self::parse_ticker(symbol, &body)
    }
}
