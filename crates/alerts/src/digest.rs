//! Market summaries for the watch-list: the `/market` overview and the
//! daily digest broadcast.

use chrono::{NaiveDate, NaiveTime};
use futures_util::future::join_all;
use pricebot_core::{
    format_market_cap, format_percentage, format_price, DetailedQuote, Symbol, SymbolTable,
};
use pricebot_engine::{Notifier, UserStore};
use pricebot_feeds::PriceSource;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetches detailed quotes for a fixed watch-list.
pub struct MarketSummary {
    symbols: Arc<SymbolTable>,
    source: Arc<dyn PriceSource>,
    watch_list: Vec<Symbol>,
}

impl MarketSummary {
    pub fn new(
        symbols: Arc<SymbolTable>,
        source: Arc<dyn PriceSource>,
        watch_list: Vec<Symbol>,
    ) -> Self {
        Self {
            symbols,
            source,
            watch_list,
        }
    }

    /// Quotes in watch-list order. Unavailable and unsupported symbols are omitted.
    pub async fn quotes(&self) -> Vec<DetailedQuote> {
        let infos: Vec<_> = self
            .watch_list
            .iter()
            .filter_map(|symbol| self.symbols.get(symbol))
            .collect();
        let results = join_all(
            infos
                .iter()
                .map(|info| self.source.fetch_detailed_quote(info)),
        )
        .await;

        results
            .into_iter()
            .filter_map(|result| match result {
                Ok(quote) => Some(quote),
                Err(e) => {
                    debug!(error = %e, "Watch-list quote unavailable");
                    None
                }
            })
            .collect()
    }
}

/// Text for the `/market` command.
pub fn render_overview(quotes: &[DetailedQuote], updated_at: NaiveTime) -> String {
    let mut text = String::from("📈 Crypto market overview:\n\n");
    for quote in quotes {
        text.push_str(&format!("{} ({}):\n", quote.name, quote.symbol));
        text.push_str(&format!("  💰 {}\n", format_price(quote.price)));
        text.push_str(&format!("  {}\n", format_percentage(quote.change_24h)));
        text.push_str(&format!(
            "  📊 Market cap: {}\n\n",
            format_market_cap(quote.market_cap)
        ));
    }
    text.push_str(&format!("🕐 Updated: {}", updated_at.format("%H:%M:%S")));
    text
}

/// Text for the daily digest.
pub fn render_digest(quotes: &[DetailedQuote], date: NaiveDate) -> String {
    let mut text = String::from("📊 Daily market report:\n\n");
    for quote in quotes {
        text.push_str(&format!("{} ({}):\n", quote.name, quote.symbol));
        text.push_str(&format!("  💰 {}\n", format_price(quote.price)));
        text.push_str(&format!("  {}\n\n", format_percentage(quote.change_24h)));
    }
    text.push_str(&format!("📅 {}", date.format("%Y-%m-%d")));
    text
}

/// Outcome of one digest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestReport {
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Nothing was sent: no subscribers, or no quote was available.
    pub skipped: bool,
}

/// Daily digest broadcast to every subscribed user.
pub struct DigestJob {
    summary: Arc<MarketSummary>,
    store: Arc<UserStore>,
    notifier: Arc<dyn Notifier>,
}

impl DigestJob {
    pub fn new(
        summary: Arc<MarketSummary>,
        store: Arc<UserStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            summary,
            store,
            notifier,
        }
    }

    /// Compose the digest once and deliver it to each subscriber independently.
    pub async fn run(&self, date: NaiveDate) -> DigestReport {
        let recipients = self.store.daily_report_users();
        if recipients.is_empty() {
            debug!("No daily report subscribers");
            return DigestReport {
                skipped: true,
                ..Default::default()
            };
        }

        let quotes = self.summary.quotes().await;
        if quotes.is_empty() {
            warn!(
                recipients = recipients.len(),
                "No watch-list quotes available, skipping daily report"
            );
            return DigestReport {
                recipients: recipients.len(),
                skipped: true,
                ..Default::default()
            };
        }

        let text = render_digest(&quotes, date);
        let mut report = DigestReport {
            recipients: recipients.len(),
            ..Default::default()
        };
        for user_id in recipients {
            match self.notifier.send(user_id, &text).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(user_id, error = %e, "Failed to send daily report");
                    report.failed += 1;
                }
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failed,
            "Daily report sent"
        );
        report
    }
}
