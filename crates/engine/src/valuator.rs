//! Portfolio valuation against live quotes.

use crate::error::ValuationError;
use crate::store::UserStore;
use futures_util::future::join_all;
use pricebot_core::{Symbol, SymbolTable, UserId};
use pricebot_feeds::PriceSource;
use std::sync::Arc;
use tracing::debug;

/// One valued holding.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: Symbol,
    pub name: String,
    pub quantity: f64,
    pub price: f64,
    /// 24h change in percent, absent when only a plain ticker was available.
    pub change_24h: Option<f64>,
    pub value: f64,
}

/// Valued holdings of one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Valuation {
    pub positions: Vec<Position>,
    pub total_value: f64,
    /// Held symbols left out because no quote was available.
    pub skipped: Vec<Symbol>,
}

impl Valuation {
    /// True when every held symbol was skipped.
    pub fn is_unpriced(&self) -> bool {
        self.positions.is_empty()
    }
}

pub struct PortfolioValuator {
    symbols: Arc<SymbolTable>,
    source: Arc<dyn PriceSource>,
    store: Arc<UserStore>,
}

impl PortfolioValuator {
    pub fn new(
        symbols: Arc<SymbolTable>,
        source: Arc<dyn PriceSource>,
        store: Arc<UserStore>,
    ) -> Self {
        Self {
            symbols,
            source,
            store,
        }
    }

    /// Value every positive holding of `user_id`.
    ///
    /// Holdings are read once up front; quotes are fetched without touching
    /// the store. A symbol whose quote is unavailable is left out of both the
    /// positions and the total.
    pub async fn valuate(&self, user_id: UserId) -> Result<Valuation, ValuationError> {
        let holdings: Vec<(Symbol, f64)> = match self.store.profile(user_id) {
            Some(profile) if profile.has_positive_holdings() => profile
                .positive_holdings()
                .map(|(symbol, qty)| (symbol.clone(), qty))
                .collect(),
            _ => return Err(ValuationError::EmptyPortfolio),
        };

        let mut valuation = Valuation::default();
        let mut requests = Vec::with_capacity(holdings.len());
        for (symbol, quantity) in holdings {
            match self.symbols.get(&symbol) {
                Some(info) => requests.push((info, quantity)),
                None => valuation.skipped.push(symbol),
            }
        }

        let quotes = join_all(
            requests
                .iter()
                .map(|(info, _)| self.source.fetch_detailed_quote(info)),
        )
        .await;

        for ((info, quantity), quote) in requests.into_iter().zip(quotes) {
            match quote {
                Ok(quote) => {
                    let value = quantity * quote.price;
                    valuation.total_value += value;
                    valuation.positions.push(Position {
                        symbol: info.symbol.clone(),
                        name: info.name.to_string(),
                        quantity,
                        price: quote.price,
                        change_24h: quote.change_24h,
                        value,
                    });
                }
                Err(e) => {
                    debug!(user_id, error = %e, "Skipping holding without quote");
                    valuation.skipped.push(info.symbol.clone());
                }
            }
        }

        Ok(valuation)
    }
}
