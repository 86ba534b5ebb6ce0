pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::dashboard::DashboardStats;
use crate::models::delivery::{Delivery, DeliveryFilter};
use crate::models::driver::Driver;
use crate::models::history::{StatusChange, StatusHistoryEntry};
use crate::models::incident::{Incident, IncidentStatus};
use crate::models::notification::Notification;
use crate::models::pricing::PricingSettings;

pub use memory::MemoryBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Deliveries,
    Drivers,
    Notifications,
    Incidents,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Deliveries,
        Table::Drivers,
        Table::Notifications,
        Table::Incidents,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record_id: Uuid,
}

#[async_trait]
pub trait Backend: Send + Sync {
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;

    async fn list_deliveries(&self, filter: &DeliveryFilter) -> Result<Vec<Delivery>, AppError>;

    async fn get_delivery(&self, id: Uuid) -> Result<Delivery, AppError>;

    async fn insert_delivery(&self, delivery: Delivery) -> Result<Delivery, AppError>;

    async fn update_delivery_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<Delivery, AppError>;

    async fn status_history(&self, delivery_id: Uuid) -> Result<Vec<StatusHistoryEntry>, AppError>;

    async fn list_drivers(&self) -> Result<Vec<Driver>, AppError>;

    async fn upsert_driver(&self, driver: Driver) -> Result<Driver, AppError>;

    async fn list_notifications(&self, unread_only: bool) -> Result<Vec<Notification>, AppError>;

    async fn insert_notification(
        &self,
        notification: Notification,
    ) -> Result<Notification, AppError>;

    /// Returns the record and whether this call flipped it from unread to read.
    async fn mark_notification_read(&self, id: Uuid) -> Result<(Notification, bool), AppError>;

    /// Returns how many records were flipped.
    async fn mark_all_notifications_read(&self) -> Result<usize, AppError>;

    async fn unread_notification_count(&self) -> Result<usize, AppError>;

    async fn list_incidents(&self) -> Result<Vec<Incident>, AppError>;

    async fn get_incident(&self, id: Uuid) -> Result<Incident, AppError>;

    async fn insert_incident(&self, incident: Incident) -> Result<Incident, AppError>;

    async fn update_incident_status(
        &self,
        id: Uuid,
        status: IncidentStatus,
    ) -> Result<Incident, AppError>;

    async fn pricing(&self) -> Result<PricingSettings, AppError>;

    async fn update_pricing(&self, pricing: PricingSettings) -> Result<PricingSettings, AppError>;

    async fn dashboard_stats(&self) -> Result<DashboardStats, AppError>;
}
