use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub reference_id: Option<Uuid>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Admin page a click on this notification should open.
    pub fn target_path(&self) -> String {
        match (self.kind.as_str(), self.reference_id) {
            ("new_delivery" | "delivery_status", Some(id)) => format!("/deliveries/{id}"),
            ("new_delivery" | "delivery_status", None) => "/deliveries".to_string(),
            ("driver_registered", Some(id)) => format!("/drivers/{id}"),
            ("driver_registered", None) => "/drivers".to_string(),
            ("incident", _) => "/incidents".to_string(),
            _ => "/notifications".to_string(),
        }
    }
}
