//! Outbound message delivery.

use crate::error::NotifyError;
use async_trait::async_trait;
use dashmap::DashSet;
use pricebot_core::UserId;
use std::sync::Mutex;

/// Delivers formatted text to a user. Fire-and-forget: callers log failures
/// and never retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), NotifyError>;
}

/// Notifier that records messages instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, String)>>,
    unreachable: DashSet<UserId>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to a user fail.
    pub fn fail_for(&self, user_id: UserId) {
        self.unreachable.insert(user_id);
    }

    /// Every delivered message in order.
    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Delivered messages for one user.
    pub fn sent_to(&self, user_id: UserId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), NotifyError> {
        if self.unreachable.contains(&user_id) {
            return Err(NotifyError::Unreachable(user_id));
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((user_id, text.to_string()));
        Ok(())
    }
}
