//! Per-user profile: holdings, price alerts and report settings.
//!
//! Field names on the wire follow the bot's data file
//! (`username`, `portfolio`, `alerts[].price`, `settings.dailyReport`).

use crate::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable chat/user identifier from the chat platform.
pub type UserId = i64;

/// Default daily report time shown to users.
pub const DEFAULT_REPORT_TIME: &str = "09:00";

/// One-shot price-crossing alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub symbol: Symbol,
    /// Target price in USD, always positive
    #[serde(rename = "price")]
    pub target_price: f64,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(symbol: Symbol, target_price: f64) -> Self {
        Self {
            symbol,
            target_price,
            created_at: Utc::now(),
        }
    }

    /// Same (symbol, target) pair as another alert.
    #[inline]
    pub fn same_target(&self, symbol: &str, target_price: f64) -> bool {
        self.symbol == symbol && self.target_price == target_price
    }
}

/// Daily report preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSettings {
    #[serde(rename = "dailyReport", default)]
    pub daily_report_enabled: bool,
    #[serde(default = "default_report_time")]
    pub report_time: String,
}

fn default_report_time() -> String {
    DEFAULT_REPORT_TIME.to_string()
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            daily_report_enabled: false,
            report_time: default_report_time(),
        }
    }
}

/// Everything the bot remembers about one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Informational only, recorded at creation
    #[serde(rename = "username", default)]
    pub display_name: String,
    /// Symbol -> quantity held. Absent means zero.
    #[serde(rename = "portfolio", default)]
    pub holdings: BTreeMap<Symbol, f64>,
    /// Insertion order is display and removal order
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub settings: ReportSettings,
}

impl UserProfile {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            holdings: BTreeMap::new(),
            alerts: Vec::new(),
            settings: ReportSettings::default(),
        }
    }

    /// Quantity held for a symbol (zero when absent).
    pub fn holding(&self, symbol: &str) -> f64 {
        self.holdings.get(symbol).copied().unwrap_or(0.0)
    }

    /// Holdings with a strictly positive quantity.
    pub fn positive_holdings(&self) -> impl Iterator<Item = (&Symbol, f64)> {
        self.holdings
            .iter()
            .filter(|(_, qty)| **qty > 0.0)
            .map(|(symbol, qty)| (symbol, *qty))
    }

    pub fn has_positive_holdings(&self) -> bool {
        self.positive_holdings().next().is_some()
    }

    pub fn has_alert(&self, symbol: &str, target_price: f64) -> bool {
        self.alerts.iter().any(|a| a.same_target(symbol, target_price))
    }
}
