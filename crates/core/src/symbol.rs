//! Supported coin symbols and their provider identifiers.

use compact_str::{format_compact, CompactString};
use serde::{Deserialize, Serialize};

/// Ticker code of a supported coin (e.g., "BTC"). Always upper-case.
pub type Symbol = CompactString;

/// A supported coin and the identifiers each quote provider knows it by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Ticker code (e.g., "BTC")
    pub symbol: Symbol,
    /// Display name (e.g., "Bitcoin")
    pub name: CompactString,
    /// Coinbase Exchange product id (e.g., "BTC-USD")
    pub coinbase_id: CompactString,
    /// CoinGecko coin id (e.g., "bitcoin")
    pub gecko_id: CompactString,
}

impl SymbolInfo {
    /// Create a USD-quoted symbol entry.
    pub fn new(symbol: &str, name: &str, gecko_id: &str) -> Self {
        let symbol = CompactString::new(symbol.to_ascii_uppercase());
        Self {
            coinbase_id: format_compact!("{}-USD", symbol),
            symbol,
            name: CompactString::new(name),
            gecko_id: CompactString::new(gecko_id),
        }
    }

    /// "Bitcoin (BTC)"
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.symbol)
    }
}

/// Fixed set of coins the bot supports, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    entries: Vec<SymbolInfo>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new(vec![
            SymbolInfo::new("BTC", "Bitcoin", "bitcoin"),
            SymbolInfo::new("ETH", "Ethereum", "ethereum"),
            SymbolInfo::new("LTC", "Litecoin", "litecoin"),
            SymbolInfo::new("ADA", "Cardano", "cardano"),
            SymbolInfo::new("DOT", "Polkadot", "polkadot"),
            SymbolInfo::new("LINK", "Chainlink", "chainlink"),
            SymbolInfo::new("XRP", "Ripple", "ripple"),
        ])
    }
}

impl SymbolTable {
    /// Create a table from explicit entries. Later duplicates of a code are dropped.
    pub fn new(entries: Vec<SymbolInfo>) -> Self {
        let mut unique: Vec<SymbolInfo> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !unique.iter().any(|e| e.symbol == entry.symbol) {
                unique.push(entry);
            }
        }
        Self { entries: unique }
    }

    /// Look up a symbol, ignoring case and surrounding whitespace.
    pub fn get(&self, code: &str) -> Option<&SymbolInfo> {
        let code = code.trim();
        self.entries
            .iter()
            .find(|e| e.symbol.eq_ignore_ascii_case(code))
    }

    /// Check whether a code is supported.
    #[inline]
    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolInfo> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Comma-separated list of supported codes, for user-facing messages.
    pub fn codes(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.symbol.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
