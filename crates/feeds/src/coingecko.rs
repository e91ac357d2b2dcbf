//! CoinGecko simple-price quote provider.

use crate::error::FeedError;
use crate::provider::{check_status, parse_price, QuoteProvider};
use async_trait::async_trait;
use pricebot_core::{DetailedQuote, SymbolInfo};

/// CoinGecko REST quote fetcher.
#[derive(Debug, Clone)]
pub struct CoinGeckoQuotes {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoQuotes {
    const BASE_URL: &'static str = "https://api.coingecko.com/api/v3";

    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, Self::BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Parse a `/simple/price` body for the given symbol.
    ///
    /// Response shape:
    /// `{"bitcoin":{"usd":50000,"usd_24h_change":1.2,"usd_market_cap":9.8e11,"usd_24h_vol":3.1e10}}`
    pub fn parse_simple_price(symbol: &SymbolInfo, body: &str) -> Result<DetailedQuote, FeedError> {
        let json: serde_json::Value = serde_json::from_str(body)?;
        let data = json
            .get(symbol.gecko_id.as_str())
            .filter(|d| d.is_object())
            .ok_or_else(|| FeedError::UnsupportedSymbol(symbol.gecko_id.to_string()))?;

        let price = data["usd"]
            .as_f64()
            .ok_or_else(|| FeedError::ParseError("Missing usd price".to_string()))?;
        let price = parse_price("usd", price)?;

        let optional = |key: &str| data[key].as_f64().filter(|v| v.is_finite());

        Ok(DetailedQuote {
            symbol: symbol.symbol.clone(),
            name: symbol.name.to_string(),
            price,
            change_24h: optional("usd_24h_change"),
            market_cap: optional("usd_market_cap"),
            volume_24h: optional("usd_24h_vol"),
        })
    }
}

#[async_trait]
impl QuoteProvider for CoinGeckoQuotes {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn quote(&self, symbol: &SymbolInfo) -> Result<DetailedQuote, FeedError> {
        let url = format!("{}/simple/price", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("ids", symbol.gecko_id.as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
                ("include_market_cap", "true"),
                ("include_24hr_vol", "true"),
            ])
            .send()
            .await?;
        check_status(response.status())?;

        let body = response.text().await?;
        Self::parse_simple_price(symbol, &body)
    }
}
