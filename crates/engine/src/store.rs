//! User Store: owns every [`UserProfile`] and is the only component that
//! mutates holdings or alerts.
//!
//! Mutations happen under a short synchronous lock that is never held across
//! an await point. Every user-facing mutation persists a full snapshot before
//! returning; a failed persist is logged and the in-memory change stands.

use crate::error::{SnapshotError, StoreError};
use crate::snapshot::SnapshotStore;
use pricebot_core::{Alert, Symbol, SymbolTable, UserId, UserProfile};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Complete store contents, keyed by user id.
pub type Snapshot = BTreeMap<UserId, UserProfile>;

/// An alert that was retired because it triggered.
#[derive(Debug, Clone, PartialEq)]
pub struct FiredAlert {
    pub user_id: UserId,
    pub alert: Alert,
}

/// In-memory user map backed by snapshot persistence.
pub struct UserStore {
    symbols: Arc<SymbolTable>,
    users: RwLock<Snapshot>,
    persistence: Arc<dyn SnapshotStore>,
    /// Serializes snapshot writes so a newer snapshot is never overwritten by an older one.
    persist_lock: tokio::sync::Mutex<()>,
}

impl UserStore {
    /// Create an empty store.
    pub fn new(symbols: Arc<SymbolTable>, persistence: Arc<dyn SnapshotStore>) -> Self {
        Self::with_snapshot(symbols, persistence, Snapshot::new())
    }

    fn with_snapshot(
        symbols: Arc<SymbolTable>,
        persistence: Arc<dyn SnapshotStore>,
        snapshot: Snapshot,
    ) -> Self {
        Self {
            symbols,
            users: RwLock::new(snapshot),
            persistence,
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Load the store from its snapshot. A missing or unreadable snapshot
    /// yields an empty store.
    pub async fn load(symbols: Arc<SymbolTable>, persistence: Arc<dyn SnapshotStore>) -> Self {
        let snapshot = match persistence.load().await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Snapshot>(&bytes) {
                Ok(snapshot) => {
                    info!(users = snapshot.len(), "Loaded user data");
                    snapshot
                }
                Err(e) => {
                    warn!(error = %e, "User data is corrupt, starting empty");
                    Snapshot::new()
                }
            },
            Ok(None) => {
                info!("No user data yet, starting empty");
                Snapshot::new()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read user data, starting empty");
                Snapshot::new()
            }
        };
        Self::with_snapshot(symbols, persistence, snapshot)
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.users.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.users.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, symbol: &str) -> Result<Symbol, StoreError> {
        self.symbols
            .get(symbol)
            .map(|info| info.symbol.clone())
            .ok_or_else(|| StoreError::UnknownSymbol(symbol.trim().to_uppercase()))
    }

    /// Write the full snapshot. Failures are logged, never returned.
    pub async fn persist(&self) {
        if let Err(e) = self.try_persist().await {
            warn!(error = %e, "Failed to persist user data");
        }
    }

    async fn try_persist(&self) -> Result<(), SnapshotError> {
        let _guard = self.persist_lock.lock().await;
        let bytes = {
            let users = self.read();
            serde_json::to_vec_pretty(&*users)?
        };
        self.persistence.save(bytes).await
    }

    /// Return the user's profile, creating it on first interaction.
    /// An existing profile is returned unchanged, whatever `display_name` is.
    pub async fn get_or_create(&self, user_id: UserId, display_name: &str) -> UserProfile {
        let mut created = false;
        let profile = {
            let mut users = self.write();
            users
                .entry(user_id)
                .or_insert_with(|| {
                    created = true;
                    UserProfile::new(display_name)
                })
                .clone()
        };
        if created {
            debug!(user_id, "Created user profile");
            self.persist().await;
        }
        profile
    }

    /// Copy of a profile, if the user exists.
    pub fn profile(&self, user_id: UserId) -> Option<UserProfile> {
        self.read().get(&user_id).cloned()
    }

    /// Copy of the whole store.
    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    pub fn user_count(&self) -> usize {
        self.read().len()
    }

    /// Set the quantity held for a symbol. Zero is stored as an explicit zero.
    pub async fn set_holding(
        &self,
        user_id: UserId,
        symbol: &str,
        quantity: f64,
    ) -> Result<f64, StoreError> {
        let symbol = self.resolve(symbol)?;
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(StoreError::InvalidQuantity(quantity));
        }
        // -0.0 passes the sign check above
        let quantity = if quantity == 0.0 { 0.0 } else { quantity };
        {
            let mut users = self.write();
            let profile = users.entry(user_id).or_insert_with(|| UserProfile::new(""));
            profile.holdings.insert(symbol, quantity);
        }
        self.persist().await;
        Ok(quantity)
    }

    /// Append an alert. Rejects non-positive targets and duplicate (symbol, target) pairs.
    pub async fn add_alert(
        &self,
        user_id: UserId,
        symbol: &str,
        target_price: f64,
    ) -> Result<Alert, StoreError> {
        let symbol = self.resolve(symbol)?;
        if !target_price.is_finite() || target_price <= 0.0 {
            return Err(StoreError::InvalidPrice(target_price));
        }
        let alert = {
            let mut users = self.write();
            let profile = users.entry(user_id).or_insert_with(|| UserProfile::new(""));
            if profile.has_alert(&symbol, target_price) {
                return Err(StoreError::DuplicateAlert {
                    symbol,
                    target_price,
                });
            }
            let alert = Alert::new(symbol, target_price);
            profile.alerts.push(alert.clone());
            alert
        };
        self.persist().await;
        Ok(alert)
    }

    /// Remove the alert at a 1-based position.
    pub async fn remove_alert(&self, user_id: UserId, index: usize) -> Result<Alert, StoreError> {
        let removed = {
            let mut users = self.write();
            let len = users.get(&user_id).map_or(0, |p| p.alerts.len());
            if index == 0 || index > len {
                return Err(StoreError::IndexOutOfRange { index, len });
            }
            match users.get_mut(&user_id) {
                Some(profile) => profile.alerts.remove(index - 1),
                None => return Err(StoreError::IndexOutOfRange { index, len }),
            }
        };
        self.persist().await;
        Ok(removed)
    }

    /// The user's alerts in insertion order.
    pub fn list_alerts(&self, user_id: UserId) -> Vec<Alert> {
        self.read()
            .get(&user_id)
            .map(|p| p.alerts.clone())
            .unwrap_or_default()
    }

    /// Flip the daily report flag and return the new state.
    pub async fn toggle_daily_report(&self, user_id: UserId) -> bool {
        let enabled = {
            let mut users = self.write();
            let profile = users.entry(user_id).or_insert_with(|| UserProfile::new(""));
            profile.settings.daily_report_enabled = !profile.settings.daily_report_enabled;
            profile.settings.daily_report_enabled
        };
        self.persist().await;
        enabled
    }

    /// Users who want the daily digest.
    pub fn daily_report_users(&self) -> Vec<UserId> {
        self.read()
            .iter()
            .filter(|(_, p)| p.settings.daily_report_enabled)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Atomically remove and return every alert on `symbol`, across all users,
    /// for which `triggered` holds. Does not persist; the caller persists once
    /// after its batch of retirements.
    pub fn retire_matching(
        &self,
        symbol: &str,
        mut triggered: impl FnMut(&Alert) -> bool,
    ) -> Vec<FiredAlert> {
        let mut fired = Vec::new();
        let mut users = self.write();
        for (user_id, profile) in users.iter_mut() {
            profile.alerts.retain(|alert| {
                if alert.symbol == symbol && triggered(alert) {
                    fired.push(FiredAlert {
                        user_id: *user_id,
                        alert: alert.clone(),
                    });
                    false
                } else {
                    true
                }
            });
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemorySnapshotStore;
    use pretty_assertions::assert_eq;

    fn store() -> (UserStore, Arc<MemorySnapshotStore>) {
        let persistence = Arc::new(MemorySnapshotStore::new());
        let store = UserStore::new(Arc::new(SymbolTable::default()), persistence.clone());
        (store, persistence)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (store, persistence) = store();

        let created = store.get_or_create(1, "alice").await;
        assert_eq!(created.display_name, "alice");
        assert_eq!(persistence.save_count(), 1);

        store.set_holding(1, "BTC", 1.0).await.unwrap();
        let again = store.get_or_create(1, "renamed").await;
        assert_eq!(again.display_name, "alice");
        assert_eq!(again.holding("BTC"), 1.0);
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_set_holding() {
        let (store, persistence) = store();

        assert_eq!(store.set_holding(1, "btc", 0.5).await, Ok(0.5));
        let profile = store.profile(1).unwrap();
        assert_eq!(profile.holding("BTC"), 0.5);
        assert_eq!(persistence.save_count(), 1);

        store.set_holding(1, "BTC", 0.0).await.unwrap();
        assert_eq!(store.profile(1).unwrap().holdings.get("BTC"), Some(&0.0));
    }

    #[tokio::test]
    async fn test_set_holding_rejects_negative_and_non_finite() {
        let (store, persistence) = store();
        store.set_holding(1, "BTC", 2.0).await.unwrap();

        assert_eq!(
            store.set_holding(1, "BTC", -1.0).await,
            Err(StoreError::InvalidQuantity(-1.0))
        );
        assert!(matches!(
            store.set_holding(1, "BTC", f64::NAN).await,
            Err(StoreError::InvalidQuantity(_))
        ));
        assert!(matches!(
            store.set_holding(1, "BTC", f64::INFINITY).await,
            Err(StoreError::InvalidQuantity(_))
        ));

        assert_eq!(store.profile(1).unwrap().holding("BTC"), 2.0);
        assert_eq!(persistence.save_count(), 1);
    }

    #[tokio::test]
    async fn test_set_holding_negative_zero_stored_as_zero() {
        let (store, persistence) = store();

        assert_eq!(store.set_holding(1, "BTC", -0.0).await, Ok(0.0));

        let stored = store.profile(1).unwrap().holding("BTC");
        assert!(stored.is_sign_positive());
        let saved = String::from_utf8(persistence.bytes().unwrap()).unwrap();
        assert!(!saved.contains("-0.0"));
    }

    #[tokio::test]
    async fn test_set_holding_unknown_symbol() {
        let (store, _) = store();
        assert_eq!(
            store.set_holding(1, "doge", 1.0).await,
            Err(StoreError::UnknownSymbol("DOGE".to_string()))
        );
        assert!(store.profile(1).is_none());
    }

    #[tokio::test]
    async fn test_add_alert() {
        let (store, _) = store();

        let alert = store.add_alert(1, "eth", 3000.0).await.unwrap();
        assert_eq!(alert.symbol.as_str(), "ETH");
        assert_eq!(alert.target_price, 3000.0);
        assert_eq!(store.list_alerts(1).len(), 1);
    }

    #[tokio::test]
    async fn test_add_alert_rejects_duplicate() {
        let (store, persistence) = store();
        store.add_alert(1, "BTC", 50_000.0).await.unwrap();

        let result = store.add_alert(1, "BTC", 50_000.0).await;
        assert_eq!(
            result,
            Err(StoreError::DuplicateAlert {
                symbol: "BTC".into(),
                target_price: 50_000.0
            })
        );
        assert_eq!(store.list_alerts(1).len(), 1);
        assert_eq!(persistence.save_count(), 1);

        // Same target on another symbol or for another user is fine.
        store.add_alert(1, "ETH", 50_000.0).await.unwrap();
        store.add_alert(2, "BTC", 50_000.0).await.unwrap();
        assert_eq!(store.list_alerts(1).len(), 2);
    }

    #[tokio::test]
    async fn test_add_alert_rejects_non_positive_price() {
        let (store, _) = store();
        assert_eq!(
            store.add_alert(1, "BTC", 0.0).await,
            Err(StoreError::InvalidPrice(0.0))
        );
        assert_eq!(
            store.add_alert(1, "BTC", -5.0).await,
            Err(StoreError::InvalidPrice(-5.0))
        );
        assert!(store.list_alerts(1).is_empty());
    }

    #[tokio::test]
    async fn test_remove_alert_by_position() {
        let (store, _) = store();
        store.add_alert(1, "BTC", 1.0).await.unwrap();
        store.add_alert(1, "BTC", 2.0).await.unwrap();
        store.add_alert(1, "BTC", 3.0).await.unwrap();

        let removed = store.remove_alert(1, 2).await.unwrap();
        assert_eq!(removed.target_price, 2.0);

        let remaining: Vec<f64> = store.list_alerts(1).iter().map(|a| a.target_price).collect();
        assert_eq!(remaining, vec![1.0, 3.0]);
    }

    #[tokio::test]
    async fn test_remove_alert_out_of_range() {
        let (store, _) = store();
        store.add_alert(1, "BTC", 1.0).await.unwrap();

        assert_eq!(
            store.remove_alert(1, 0).await,
            Err(StoreError::IndexOutOfRange { index: 0, len: 1 })
        );
        assert_eq!(
            store.remove_alert(1, 2).await,
            Err(StoreError::IndexOutOfRange { index: 2, len: 1 })
        );
        assert_eq!(
            store.remove_alert(99, 1).await,
            Err(StoreError::IndexOutOfRange { index: 1, len: 0 })
        );
        assert_eq!(store.list_alerts(1).len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_daily_report() {
        let (store, _) = store();
        store.get_or_create(1, "alice").await;
        store.get_or_create(2, "bob").await;

        assert!(store.toggle_daily_report(1).await);
        assert_eq!(store.daily_report_users(), vec![1]);

        assert!(!store.toggle_daily_report(1).await);
        assert!(store.daily_report_users().is_empty());
    }

    #[tokio::test]
    async fn test_retire_matching_removes_across_users() {
        let (store, persistence) = store();
        store.add_alert(1, "BTC", 50_000.0).await.unwrap();
        store.add_alert(1, "BTC", 60_000.0).await.unwrap();
        store.add_alert(2, "BTC", 50_000.0).await.unwrap();
        store.add_alert(2, "ETH", 50_000.0).await.unwrap();
        let saves = persistence.save_count();

        let fired = store.retire_matching("BTC", |a| a.target_price == 50_000.0);

        let owners: Vec<UserId> = fired.iter().map(|f| f.user_id).collect();
        assert_eq!(owners, vec![1, 2]);
        assert_eq!(store.list_alerts(1).len(), 1);
        assert_eq!(store.list_alerts(2)[0].symbol.as_str(), "ETH");
        assert_eq!(persistence.save_count(), saves);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_in_memory_change() {
        let (store, persistence) = store();
        persistence.set_fail_saves(true);

        store.add_alert(1, "BTC", 42.0).await.unwrap();
        assert_eq!(store.list_alerts(1).len(), 1);
        assert!(persistence.bytes().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let (store, persistence) = store();
        store.get_or_create(7, "alice").await;
        store.set_holding(7, "BTC", 0.5).await.unwrap();
        store.set_holding(7, "ETH", 0.0).await.unwrap();
        store.add_alert(7, "BTC", 50_000.0).await.unwrap();
        store.add_alert(7, "XRP", 0.5).await.unwrap();
        store.toggle_daily_report(7).await;
        store.get_or_create(-100123, "group").await;

        let reloaded = UserStore::load(Arc::new(SymbolTable::default()), persistence.clone()).await;
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }

    #[tokio::test]
    async fn test_snapshot_keyed_by_stringified_user_id() {
        let (store, persistence) = store();
        store.get_or_create(12345, "alice").await;

        let json: serde_json::Value =
            serde_json::from_slice(&persistence.bytes().unwrap()).unwrap();
        assert_eq!(json["12345"]["username"], serde_json::json!("alice"));
    }

    #[tokio::test]
    async fn test_load_corrupt_snapshot_starts_empty() {
        let persistence = Arc::new(MemorySnapshotStore::with_bytes(b"not json".to_vec()));
        let store = UserStore::load(Arc::new(SymbolTable::default()), persistence).await;
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn test_load_existing_data_file() {
        let json = br#"{
            "123": {
                "username": "alice",
                "portfolio": {"BTC": 0.5},
                "alerts": [{"symbol": "BTC", "price": 50000, "createdAt": "2024-05-01T09:30:00.000Z"}],
                "settings": {"dailyReport": true, "reportTime": "09:00"}
            }
        }"#;
        let persistence = Arc::new(MemorySnapshotStore::with_bytes(json.to_vec()));
        let store = UserStore::load(Arc::new(SymbolTable::default()), persistence).await;

        let profile = store.profile(123).unwrap();
        assert_eq!(profile.holding("BTC"), 0.5);
        assert_eq!(profile.alerts[0].target_price, 50_000.0);
        assert_eq!(store.daily_report_users(), vec![123]);
    }
}
