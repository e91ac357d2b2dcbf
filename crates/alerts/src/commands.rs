//! Chat command handlers.
//!
//! Every handler returns the reply text; the transport decides how to send
//! it. Validation failures are rendered as replies and leave holdings and
//! alerts untouched.

use crate::digest::{render_overview, MarketSummary};
use chrono::{Local, NaiveTime};
use pricebot_core::{
    format_market_cap, format_percentage, format_price, SymbolInfo, SymbolTable, UserId,
    UserProfile,
};
use pricebot_engine::{PortfolioValuator, StoreError, UserStore, ValuationError};
use pricebot_feeds::PriceSource;
use std::sync::Arc;
use tracing::debug;

/// Symbol used by `/price` without an argument.
pub const DEFAULT_PRICE_SYMBOL: &str = "BTC";

/// A parsed inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    pub user_id: UserId,
    pub display_name: String,
    /// Command name without the leading slash, lowercase.
    pub command: String,
    pub args: String,
}

impl CommandEvent {
    pub fn new(
        user_id: UserId,
        display_name: impl Into<String>,
        command: impl Into<String>,
        args: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            command: command.into(),
            args: args.into(),
        }
    }
}

pub struct CommandHandler {
    symbols: Arc<SymbolTable>,
    source: Arc<dyn PriceSource>,
    store: Arc<UserStore>,
    valuator: PortfolioValuator,
    market: Arc<MarketSummary>,
    digest_time: NaiveTime,
}

impl CommandHandler {
    pub fn new(
        symbols: Arc<SymbolTable>,
        source: Arc<dyn PriceSource>,
        store: Arc<UserStore>,
        market: Arc<MarketSummary>,
        digest_time: NaiveTime,
    ) -> Self {
        let valuator = PortfolioValuator::new(symbols.clone(), source.clone(), store.clone());
        Self {
            symbols,
            source,
            store,
            valuator,
            market,
            digest_time,
        }
    }

    /// Route an event to its handler by command name.
    pub async fn handle(&self, event: &CommandEvent) -> String {
        debug!(
            user_id = event.user_id,
            command = %event.command,
            "Handling command"
        );
        let user_id = event.user_id;
        let name = event.display_name.as_str();
        let args = event.args.trim();

        match event.command.to_ascii_lowercase().as_str() {
            "start" => self.start(user_id, name).await,
            "help" => self.help(),
            "price" => self.price(args).await,
            "set" => self.set(user_id, name, args).await,
            "portfolio" => self.portfolio(user_id).await,
            "alert" => self.alert(user_id, name, args).await,
            "alerts" => self.alerts(user_id),
            "removealert" => self.remove_alert(user_id, args).await,
            "daily" => self.daily(user_id, name).await,
            "market" => self.market().await,
            "settings" => self.settings(user_id, name),
            _ => "❓ Unknown command. Use /help to see available commands.".to_string(),
        }
    }

    pub async fn start(&self, user_id: UserId, display_name: &str) -> String {
        self.store.get_or_create(user_id, display_name).await;
        format!(
            "🎉 Welcome to the crypto price alert bot!\n\n\
             🪙 Supported coins: {}\n\n\
             📊 Main features:\n\
             /price [coin] - Show price (e.g. /price BTC)\n\
             /portfolio - Show your portfolio\n\
             /set [coin] [amount] - Set a holding\n\
             /alert [coin] [price] - Set a price alert\n\
             /market - Market overview\n\
             /daily - Toggle the daily report\n\
             /help - Show all commands",
            self.symbols.codes()
        )
    }

    pub fn help(&self) -> String {
        format!(
            "📋 Commands:\n\n\
             💰 Prices:\n\
             /price [coin] - Live price and 24h change\n   \
             e.g. /price BTC or /price\n\n\
             📊 Portfolio:\n\
             /portfolio - Show your portfolio\n\
             /set [coin] [amount] - Set a holding (0 clears it)\n   \
             e.g. /set BTC 0.5\n\n\
             🔔 Price alerts:\n\
             /alert [coin] [price] - Set a price alert\n   \
             e.g. /alert BTC 50000\n\
             /alerts - List your alerts\n\
             /removealert [number] - Delete an alert\n\n\
             📈 Market:\n\
             /market - Market overview\n\n\
             ⚙️ Settings:\n\
             /daily - Toggle the daily report\n\
             /settings - Show your settings\n\n\
             Supported coins: {}",
            self.symbols.codes()
        )
    }

    pub async fn price(&self, args: &str) -> String {
        let code = args.split_whitespace().next().unwrap_or(DEFAULT_PRICE_SYMBOL);
        let Some(info) = self.symbols.get(code) else {
            return self.unsupported(code);
        };

        match self.source.fetch_detailed_quote(info).await {
            Ok(quote) => format!(
                "📊 {} price:\n\n\
                 💰 Current price: {}\n\
                 📈 24h change: {}\n\
                 📊 Market cap: {}\n\
                 💱 24h volume: {}\n\n\
                 🕐 Updated: {}",
                info.label(),
                format_price(quote.price),
                format_percentage(quote.change_24h),
                format_market_cap(quote.market_cap),
                format_market_cap(quote.volume_24h),
                Local::now().format("%H:%M:%S")
            ),
            Err(e) => {
                debug!(error = %e, "Price command without quote");
                "❌ Failed to fetch the price, please try again later".to_string()
            }
        }
    }

    pub async fn set(&self, user_id: UserId, display_name: &str, args: &str) -> String {
        const USAGE: &str = "Usage: /set [coin] [amount]\nExample: /set BTC 0.5";
        let Some((code, amount)) = two_args(args) else {
            return USAGE.to_string();
        };
        let Some(info) = self.symbols.get(code) else {
            return self.unsupported(code);
        };
        let Ok(quantity) = amount.parse::<f64>() else {
            return "❌ Please enter a valid amount\nExample: /set BTC 0.5".to_string();
        };

        self.store.get_or_create(user_id, display_name).await;
        match self.store.set_holding(user_id, &info.symbol, quantity).await {
            Ok(quantity) => format!(
                "✅ Set {} holding: {} {}",
                info.label(),
                quantity,
                info.symbol
            ),
            Err(e) => self.store_error(&e),
        }
    }

    pub async fn portfolio(&self, user_id: UserId) -> String {
        let valuation = match self.valuator.valuate(user_id).await {
            Ok(valuation) => valuation,
            Err(ValuationError::EmptyPortfolio) => {
                return "❌ You have not set any holdings yet\n\
                        Use /set [coin] [amount] to add one\n\
                        Example: /set BTC 0.5"
                    .to_string();
            }
        };
        if valuation.is_unpriced() {
            return "❌ Failed to fetch portfolio data, please try again later".to_string();
        }

        let mut text = String::from("💰 Your portfolio:\n\n");
        for position in &valuation.positions {
            text.push_str(&format!("{} ({}):\n", position.name, position.symbol));
            text.push_str(&format!(
                "  💎 Holding: {} {}\n",
                position.quantity, position.symbol
            ));
            text.push_str(&format!(
                "  💰 Current price: {}\n",
                format_price(position.price)
            ));
            text.push_str(&format!(
                "  📈 24h change: {}\n",
                format_percentage(position.change_24h)
            ));
            text.push_str(&format!("  💵 Value: {}\n\n", format_price(position.value)));
        }
        if !valuation.skipped.is_empty() {
            let skipped: Vec<&str> = valuation.skipped.iter().map(|s| s.as_str()).collect();
            text.push_str(&format!("⚠️ No quote for: {}\n\n", skipped.join(", ")));
        }
        text.push_str(&format!(
            "🏆 Total value: {}",
            format_price(valuation.total_value)
        ));
        text
    }

    pub async fn alert(&self, user_id: UserId, display_name: &str, args: &str) -> String {
        const USAGE: &str = "Usage: /alert [coin] [price]\nExample: /alert BTC 50000";
        let Some((code, price)) = two_args(args) else {
            return USAGE.to_string();
        };
        let Some(info) = self.symbols.get(code) else {
            return self.unsupported(code);
        };
        let Ok(target_price) = price.parse::<f64>() else {
            return "❌ Please enter a valid price\nExample: /alert BTC 50000".to_string();
        };

        self.store.get_or_create(user_id, display_name).await;
        match self.store.add_alert(user_id, &info.symbol, target_price).await {
            Ok(alert) => format!(
                "🔔 {} price alert set: {}",
                info.label(),
                format_price(alert.target_price)
            ),
            Err(e) => self.store_error(&e),
        }
    }

    pub fn alerts(&self, user_id: UserId) -> String {
        let alerts = self.store.list_alerts(user_id);
        if alerts.is_empty() {
            return "❌ You have no price alerts\nUse /alert [coin] [price] to add one".to_string();
        }

        let lines: Vec<String> = alerts
            .iter()
            .enumerate()
            .map(|(i, alert)| {
                format!(
                    "{}. {}: {}",
                    i + 1,
                    self.describe(&alert.symbol),
                    format_price(alert.target_price)
                )
            })
            .collect();
        format!(
            "🔔 Your price alerts:\n\n{}\n\nUse /removealert [number] to delete an alert",
            lines.join("\n")
        )
    }

    pub async fn remove_alert(&self, user_id: UserId, args: &str) -> String {
        let Ok(index) = args.trim().parse::<usize>() else {
            return "Usage: /removealert [number]\nExample: /removealert 1".to_string();
        };
        match self.store.remove_alert(user_id, index).await {
            Ok(alert) => format!(
                "🗑️ Removed {} price alert: {}",
                self.describe(&alert.symbol),
                format_price(alert.target_price)
            ),
            Err(e) => self.store_error(&e),
        }
    }

    pub async fn daily(&self, user_id: UserId, display_name: &str) -> String {
        self.store.get_or_create(user_id, display_name).await;
        if self.store.toggle_daily_report(user_id).await {
            format!(
                "✅ Daily report enabled! A market summary will be sent every day at {}",
                self.digest_time.format("%H:%M")
            )
        } else {
            "❌ Daily report disabled".to_string()
        }
    }

    pub async fn market(&self) -> String {
        let quotes = self.market.quotes().await;
        if quotes.is_empty() {
            return "❌ Failed to fetch market data, please try again later".to_string();
        }
        render_overview(&quotes, Local::now().time())
    }

    pub fn settings(&self, user_id: UserId, display_name: &str) -> String {
        let profile = self
            .store
            .profile(user_id)
            .unwrap_or_else(|| UserProfile::new(display_name));
        let daily = if profile.settings.daily_report_enabled {
            "On"
        } else {
            "Off"
        };
        format!(
            "⚙️ Your settings:\n\n\
             📅 Daily report: {}\n\
             🕐 Report time: {}\n\
             💎 Holdings: {}\n\
             🔔 Alerts: {}",
            daily,
            profile.settings.report_time,
            profile.positive_holdings().count(),
            profile.alerts.len()
        )
    }

    fn unsupported(&self, code: &str) -> String {
        format!(
            "❌ Unsupported coin: {}\nSupported coins: {}",
            code.to_uppercase(),
            self.symbols.codes()
        )
    }

    fn describe(&self, symbol: &str) -> String {
        self.symbols
            .get(symbol)
            .map(SymbolInfo::label)
            .unwrap_or_else(|| symbol.to_string())
    }

    fn store_error(&self, error: &StoreError) -> String {
        debug!(
            error = %error,
            invalid_input = error.is_invalid_input(),
            "Command rejected by store"
        );
        match error {
            StoreError::InvalidQuantity(_) => {
                "❌ Please enter a valid amount\nExample: /set BTC 0.5".to_string()
            }
            StoreError::InvalidPrice(_) => {
                "❌ Please enter a valid price\nExample: /alert BTC 50000".to_string()
            }
            StoreError::DuplicateAlert {
                symbol,
                target_price,
            } => format!(
                "❌ You already have a {} {} price alert",
                symbol,
                format_price(*target_price)
            ),
            StoreError::IndexOutOfRange { index, .. } => {
                format!("❌ No alert #{}. Use /alerts to see your list", index)
            }
            StoreError::UnknownSymbol(code) => self.unsupported(code),
        }
    }
}

/// Split "BTC 0.5" into its two whitespace-separated arguments.
fn two_args(args: &str) -> Option<(&str, &str)> {
    let mut parts = args.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(first), Some(second), None) => Some((first, second)),
        _ => None,
    }
}
