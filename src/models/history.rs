use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub old_status: DeliveryStatus,
    pub new_status: DeliveryStatus,
    pub actor: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    /// Status the caller validated against. A mismatch means someone else moved
    /// the delivery first, and the change is rejected.
    pub expected: Option<DeliveryStatus>,
    pub status: DeliveryStatus,
    pub actor: Option<String>,
    pub note: Option<String>,
}
