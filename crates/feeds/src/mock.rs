//! Scriptable price source for tests and offline runs.

use crate::error::{FeedError, Unavailable};
use crate::source::PriceSource;
use async_trait::async_trait;
use dashmap::DashMap;
use pricebot_core::{DetailedQuote, PriceTick, Symbol, SymbolInfo};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Mock price source. Symbols without a scripted price are unavailable.
#[derive(Debug, Default)]
pub struct MockPriceSource {
    prices: DashMap<Symbol, f64>,
    quotes: DashMap<Symbol, DetailedQuote>,
    fetches: AtomicUsize,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the price returned for a symbol.
    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.insert(Symbol::new(symbol), price);
    }

    /// Make a symbol unavailable (both ticker and quote).
    pub fn set_unavailable(&self, symbol: &str) {
        self.prices.remove(symbol);
        self.quotes.remove(symbol);
    }

    /// Set a full detailed quote. Without one, detailed quotes are derived
    /// from the scripted price with no change/market cap.
    pub fn set_quote(&self, quote: DetailedQuote) {
        self.prices.insert(quote.symbol.clone(), quote.price);
        self.quotes.insert(quote.symbol.clone(), quote);
    }

    /// Number of fetches served so far (ticker and quote).
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn unavailable(symbol: &SymbolInfo) -> Unavailable {
        Unavailable::new(
            symbol.symbol.clone(),
            FeedError::ConnectionFailed("mock: no price scripted".to_string()),
        )
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn fetch_price(&self, symbol: &SymbolInfo) -> Result<PriceTick, Unavailable> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.prices
            .get(&symbol.symbol)
            .map(|p| PriceTick::new(symbol.symbol.clone(), *p, 0.0))
            .ok_or_else(|| Self::unavailable(symbol))
    }

    async fn fetch_detailed_quote(
        &self,
        symbol: &SymbolInfo,
    ) -> Result<DetailedQuote, Unavailable> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(quote) = self.quotes.get(&symbol.symbol) {
            return Ok(quote.clone());
        }
        self.prices
            .get(&symbol.symbol)
            .map(|p| {
                DetailedQuote::from_tick(symbol, &PriceTick::new(symbol.symbol.clone(), *p, 0.0))
            })
            .ok_or_else(|| Self::unavailable(symbol))
    }
}
