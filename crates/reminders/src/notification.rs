use async_trait::async_trait;
use hearth_scheduler_domain::EventCategory;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What gets handed to a notification channel when a reminder fires.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    pub event_id: String,
    pub title: String,
    pub body: String,
    pub category: EventCategory,
    /// When this reminder was due, millis since epoch
    pub fire_ts: i64,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Notification channel rejected the payload: {0}")]
    Rejected(String),
    #[error("Notification channel is unavailable")]
    Unavailable,
}

/// Outbound notification channel (push service, webhook, ...).
/// Implementations must be cheap to clone behind an `Arc` and safe to
/// call from spawned tasks.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn deliver(&self, payload: ReminderPayload) -> Result<(), DeliveryError>;
}
