//! Alert Engine.
//!
//! Keeps the last observed price per symbol and, once per scheduler tick,
//! fires every alert whose target lies in the closed interval between the
//! previous and the current price. Fired alerts are retired through the
//! [`UserStore`] before their notifications go out, so an alert fires at most
//! once. A symbol has no baseline until its first successful tick, and no
//! alert on it can trigger before then.

use crate::notifier::Notifier;
use crate::store::{FiredAlert, UserStore};
use dashmap::DashMap;
use futures_util::future::join_all;
use pricebot_core::{format_price, Symbol, SymbolInfo, SymbolTable};
use pricebot_feeds::PriceSource;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// True when `target` lies in the closed interval between two consecutive ticks.
#[inline]
pub fn crosses(last: f64, current: f64, target: f64) -> bool {
    (last <= target && current >= target) || (last >= target && current <= target)
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Symbols that produced a tick this sweep.
    pub ticked: Vec<Symbol>,
    /// Symbols skipped because no price was available.
    pub unavailable: Vec<Symbol>,
    /// Alerts retired this sweep.
    pub fired: Vec<FiredAlert>,
    /// Fired alerts whose notification could not be delivered.
    pub failed_notifications: usize,
    /// The sweep did not run because another sweep was in progress.
    pub skipped: bool,
}

/// Edge-triggered alert engine.
pub struct AlertEngine {
    symbols: Arc<SymbolTable>,
    source: Arc<dyn PriceSource>,
    store: Arc<UserStore>,
    notifier: Arc<dyn Notifier>,
    last_prices: DashMap<Symbol, f64>,
    sweep_lock: tokio::sync::Mutex<()>,
}

impl AlertEngine {
    pub fn new(
        symbols: Arc<SymbolTable>,
        source: Arc<dyn PriceSource>,
        store: Arc<UserStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            symbols,
            source,
            store,
            notifier,
            last_prices: DashMap::new(),
            sweep_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Last successfully observed price of a symbol.
    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_prices.get(symbol).map(|p| *p)
    }

    /// Run one sweep over every supported symbol.
    ///
    /// A sweep never overlaps another; a call made while one is running
    /// returns immediately with `skipped` set.
    pub async fn sweep(&self) -> SweepReport {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            debug!("Previous sweep still running, skipping tick");
            return SweepReport {
                skipped: true,
                ..Default::default()
            };
        };

        let fetches = self.symbols.iter().map(|info| async move {
            let result = self.source.fetch_price(info).await;
            (info, result)
        });
        let results = join_all(fetches).await;

        let mut report = SweepReport::default();
        for (info, result) in results {
            let tick = match result {
                Ok(tick) => tick,
                Err(e) => {
                    debug!(symbol = %info.symbol, error = %e, "No tick this sweep");
                    report.unavailable.push(info.symbol.clone());
                    continue;
                }
            };
            let current = tick.price;
            trace!(
                symbol = %info.symbol,
                price = current,
                timestamp_ms = tick.timestamp_ms,
                "Tick"
            );

            if let Some(last) = self.last_price(&info.symbol) {
                let fired = self
                    .store
                    .retire_matching(&info.symbol, |alert| {
                        crosses(last, current, alert.target_price)
                    });
                for fired_alert in fired {
                    if !self.notify(info, &fired_alert, current).await {
                        report.failed_notifications += 1;
                    }
                    report.fired.push(fired_alert);
                }
            }

            self.last_prices.insert(info.symbol.clone(), current);
            report.ticked.push(info.symbol.clone());
        }

        self.store.persist().await;

        if !report.fired.is_empty() {
            info!(
                fired = report.fired.len(),
                failed = report.failed_notifications,
                "Price alerts fired"
            );
        }
        report
    }

    async fn notify(&self, info: &SymbolInfo, fired: &FiredAlert, current: f64) -> bool {
        let text = format_alert_message(info, fired.alert.target_price, current);
        match self.notifier.send(fired.user_id, &text).await {
            Ok(()) => {
                info!(
                    user_id = fired.user_id,
                    symbol = %info.symbol,
                    target = fired.alert.target_price,
                    price = current,
                    "Alert sent"
                );
                true
            }
            Err(e) => {
                warn!(
                    user_id = fired.user_id,
                    symbol = %info.symbol,
                    error = %e,
                    "Failed to send alert"
                );
                false
            }
        }
    }
}

/// Format a triggered alert as a chat message.
pub fn format_alert_message(info: &SymbolInfo, target_price: f64, current_price: f64) -> String {
    format!(
        "🚨 {} price alert!\nTarget price: {}\nCurrent price: {}",
        info.label(),
        format_price(target_price),
        format_price(current_price)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::RecordingNotifier;
    use crate::snapshot::MemorySnapshotStore;
    use pretty_assertions::assert_eq;
    use pricebot_core::UserId;
    use pricebot_feeds::MockPriceSource;

    struct Harness {
        engine: AlertEngine,
        source: Arc<MockPriceSource>,
        store: Arc<UserStore>,
        notifier: Arc<RecordingNotifier>,
        persistence: Arc<MemorySnapshotStore>,
    }

    fn harness() -> Harness {
        let symbols = Arc::new(SymbolTable::default());
        let source = Arc::new(MockPriceSource::new());
        let persistence = Arc::new(MemorySnapshotStore::new());
        let store = Arc::new(UserStore::new(symbols.clone(), persistence.clone()));
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = AlertEngine::new(symbols, source.clone(), store.clone(), notifier.clone());
        Harness {
            engine,
            source,
            store,
            notifier,
            persistence,
        }
    }

    fn fired_targets(report: &SweepReport) -> Vec<(UserId, f64)> {
        report
            .fired
            .iter()
            .map(|f| (f.user_id, f.alert.target_price))
            .collect()
    }

    #[test]
    fn test_crosses_upward_and_downward() {
        assert!(crosses(49_000.0, 51_000.0, 50_000.0));
        assert!(crosses(51_000.0, 49_000.0, 50_000.0));
        assert!(!crosses(49_000.0, 49_500.0, 50_000.0));
        assert!(!crosses(51_000.0, 50_500.0, 50_000.0));
    }

    #[test]
    fn test_crosses_touch_at_endpoints() {
        assert!(crosses(50_000.0, 51_000.0, 50_000.0));
        assert!(crosses(49_000.0, 50_000.0, 50_000.0));
        assert!(crosses(50_000.0, 50_000.0, 50_000.0));
    }

    #[tokio::test]
    async fn test_first_sweep_records_baseline_without_firing() {
        let h = harness();
        h.store.add_alert(1, "BTC", 50_000.0).await.unwrap();
        h.source.set_price("BTC", 50_000.0);

        let report = h.engine.sweep().await;

        assert!(report.fired.is_empty());
        assert_eq!(h.engine.last_price("BTC"), Some(50_000.0));
        assert_eq!(h.store.list_alerts(1).len(), 1);
    }

    #[tokio::test]
    async fn test_crossing_fires_once_and_retires() {
        let h = harness();
        h.store.add_alert(1, "BTC", 50_000.0).await.unwrap();

        h.source.set_price("BTC", 49_000.0);
        h.engine.sweep().await;

        h.source.set_price("BTC", 51_000.0);
        let report = h.engine.sweep().await;
        assert_eq!(fired_targets(&report), vec![(1, 50_000.0)]);
        assert!(h.store.list_alerts(1).is_empty());

        let messages = h.notifier.sent_to(1);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Bitcoin (BTC)"));
        assert!(messages[0].contains("$50,000.00"));
        assert!(messages[0].contains("$51,000.00"));

        // Oscillating back through the target must not re-fire.
        h.source.set_price("BTC", 49_000.0);
        assert!(h.engine.sweep().await.fired.is_empty());
        h.source.set_price("BTC", 52_000.0);
        assert!(h.engine.sweep().await.fired.is_empty());
        assert_eq!(h.notifier.sent_to(1).len(), 1);
    }

    #[tokio::test]
    async fn test_no_refire_while_beyond_threshold() {
        let h = harness();
        h.store.add_alert(1, "BTC", 50_000.0).await.unwrap();
        h.source.set_price("BTC", 49_000.0);
        h.engine.sweep().await;
        h.source.set_price("BTC", 51_000.0);
        h.engine.sweep().await;

        h.source.set_price("BTC", 52_000.0);
        let report = h.engine.sweep().await;
        assert!(report.fired.is_empty());
        assert_eq!(h.engine.last_price("BTC"), Some(52_000.0));
    }

    #[tokio::test]
    async fn test_downward_crossing_fires() {
        let h = harness();
        h.store.add_alert(1, "ETH", 3_000.0).await.unwrap();
        h.source.set_price("ETH", 3_100.0);
        h.engine.sweep().await;

        h.source.set_price("ETH", 2_950.0);
        let report = h.engine.sweep().await;
        assert_eq!(fired_targets(&report), vec![(1, 3_000.0)]);
    }

    #[tokio::test]
    async fn test_baseline_updates_every_tick() {
        let h = harness();
        h.store.add_alert(1, "BTC", 50_000.0).await.unwrap();

        // 45k -> 48k -> 49k never brackets 50k.
        for price in [45_000.0, 48_000.0, 49_000.0] {
            h.source.set_price("BTC", price);
            assert!(h.engine.sweep().await.fired.is_empty());
        }
        assert_eq!(h.engine.last_price("BTC"), Some(49_000.0));

        h.source.set_price("BTC", 50_000.0);
        assert_eq!(h.engine.sweep().await.fired.len(), 1);
    }

    #[tokio::test]
    async fn test_symbol_without_tick_never_triggers() {
        let h = harness();
        h.store.add_alert(1, "LTC", 80.0).await.unwrap();
        h.source.set_price("BTC", 50_000.0);

        for _ in 0..5 {
            let report = h.engine.sweep().await;
            assert!(report.fired.is_empty());
            assert!(report.unavailable.contains(&Symbol::new("LTC")));
        }
        assert_eq!(h.engine.last_price("LTC"), None);
        assert_eq!(h.store.list_alerts(1).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_tick_is_not_zero() {
        let h = harness();
        h.store.add_alert(1, "BTC", 100.0).await.unwrap();
        h.source.set_price("BTC", 50_000.0);
        h.engine.sweep().await;

        // An outage must not look like a drop to zero.
        h.source.set_unavailable("BTC");
        let report = h.engine.sweep().await;
        assert!(report.fired.is_empty());
        assert_eq!(h.engine.last_price("BTC"), Some(50_000.0));

        h.source.set_price("BTC", 50_500.0);
        assert!(h.engine.sweep().await.fired.is_empty());
        assert_eq!(h.store.list_alerts(1).len(), 1);
    }

    #[tokio::test]
    async fn test_fires_for_all_matching_users_only() {
        let h = harness();
        h.store.add_alert(1, "BTC", 50_000.0).await.unwrap();
        h.store.add_alert(2, "BTC", 50_000.0).await.unwrap();
        h.store.add_alert(2, "BTC", 70_000.0).await.unwrap();
        h.store.add_alert(3, "ETH", 50_000.0).await.unwrap();
        h.source.set_price("BTC", 49_000.0);
        h.source.set_price("ETH", 3_000.0);
        h.engine.sweep().await;

        h.source.set_price("BTC", 51_000.0);
        let report = h.engine.sweep().await;

        assert_eq!(fired_targets(&report), vec![(1, 50_000.0), (2, 50_000.0)]);
        assert_eq!(h.store.list_alerts(2).len(), 1);
        assert_eq!(h.store.list_alerts(3).len(), 1);
    }

    #[tokio::test]
    async fn test_notification_failure_still_retires() {
        let h = harness();
        h.notifier.fail_for(1);
        h.store.add_alert(1, "BTC", 50_000.0).await.unwrap();
        h.store.add_alert(2, "BTC", 50_000.0).await.unwrap();
        h.source.set_price("BTC", 49_000.0);
        h.engine.sweep().await;

        h.source.set_price("BTC", 51_000.0);
        let report = h.engine.sweep().await;

        assert_eq!(report.fired.len(), 2);
        assert_eq!(report.failed_notifications, 1);
        assert!(h.store.list_alerts(1).is_empty());
        assert_eq!(h.notifier.sent_to(2).len(), 1);
    }

    #[tokio::test]
    async fn test_alert_added_between_sweeps_is_picked_up() {
        let h = harness();
        h.source.set_price("BTC", 49_000.0);
        h.engine.sweep().await;

        h.store.add_alert(1, "BTC", 50_000.0).await.unwrap();
        h.source.set_price("BTC", 51_000.0);
        assert_eq!(h.engine.sweep().await.fired.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_persists_once() {
        let h = harness();
        h.store.add_alert(1, "BTC", 50_000.0).await.unwrap();
        h.store.add_alert(2, "BTC", 50_000.0).await.unwrap();
        h.source.set_price("BTC", 49_000.0);
        h.engine.sweep().await;
        let before = h.persistence.save_count();

        h.source.set_price("BTC", 51_000.0);
        h.engine.sweep().await;

        assert_eq!(h.persistence.save_count(), before + 1);
        let saved: crate::store::Snapshot =
            serde_json::from_slice(&h.persistence.bytes().unwrap()).unwrap();
        assert!(saved.values().all(|p| p.alerts.is_empty()));
    }

    #[tokio::test]
    async fn test_overlapping_sweep_is_skipped() {
        let h = harness();
        let _running = h.engine.sweep_lock.lock().await;

        let report = h.engine.sweep().await;
        assert!(report.skipped);
        assert_eq!(h.source.fetch_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_commands_interleaved_with_sweeps() {
        let h = harness();
        let engine = Arc::new(AlertEngine::new(
            Arc::new(SymbolTable::default()),
            h.source.clone(),
            h.store.clone(),
            h.notifier.clone(),
        ));

        // Every sweep after the first moves BTC across 50,000..50,025.
        let sweeper = {
            let engine = engine.clone();
            let source = h.source.clone();
            tokio::spawn(async move {
                let mut fired = Vec::new();
                for round in 0..60 {
                    let price = if round % 2 == 0 { 48_000.0 } else { 52_000.0 };
                    source.set_price("BTC", price);
                    fired.extend(engine.sweep().await.fired);
                    tokio::task::yield_now().await;
                }
                fired
            })
        };

        let writers: Vec<_> = (1..=4)
            .map(|user_id: UserId| {
                let store = h.store.clone();
                tokio::spawn(async move {
                    let mut added = Vec::new();
                    let mut removed = Vec::new();
                    for i in 0..25 {
                        let target = 50_000.0 + f64::from(i);
                        let alert = store.add_alert(user_id, "BTC", target).await.unwrap();
                        added.push(alert.target_price);
                        if i % 5 == 4 {
                            if let Ok(alert) = store.remove_alert(user_id, 1).await {
                                removed.push(alert.target_price);
                            }
                        }
                        tokio::task::yield_now().await;
                    }
                    (user_id, added, removed)
                })
            })
            .collect();

        let fired = sweeper.await.unwrap();
        for writer in writers {
            let (user_id, added, removed) = writer.await.unwrap();
            let remaining: Vec<f64> = h
                .store
                .list_alerts(user_id)
                .iter()
                .map(|a| a.target_price)
                .collect();

            for target in added {
                let times_fired = fired
                    .iter()
                    .filter(|f| f.user_id == user_id && f.alert.target_price == target)
                    .count();
                let times_removed = removed.iter().filter(|t| **t == target).count();
                let times_remaining = remaining.iter().filter(|t| **t == target).count();

                assert!(times_fired <= 1, "user {user_id} alert {target} fired twice");
                assert_eq!(
                    times_fired + times_removed + times_remaining,
                    1,
                    "user {user_id} alert {target} lost or duplicated"
                );
            }
        }

        let fired_messages: usize = (1..=4).map(|id| h.notifier.sent_to(id).len()).sum();
        assert_eq!(fired_messages, fired.len());

        let saved: crate::store::Snapshot =
            serde_json::from_slice(&h.persistence.bytes().unwrap()).unwrap();
        assert_eq!(saved, h.store.snapshot());
    }
}
