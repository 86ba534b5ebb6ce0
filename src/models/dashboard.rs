use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_deliveries: usize,
    pub active_deliveries: usize,
    pub pending_deliveries: usize,
    pub completed_deliveries: usize,
    pub cancelled_deliveries: usize,
    pub drivers_online: usize,
    pub open_incidents: usize,
    pub unread_notifications: usize,
    pub revenue: f64,
    pub generated_at: DateTime<Utc>,
}
