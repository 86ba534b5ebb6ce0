use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::backend::{Backend, ChangeEvent, ChangeKind, Table};
use crate::engine::timeline::StatusBucket;
use crate::error::AppError;
use crate::models::dashboard::DashboardStats;
use crate::models::delivery::{Delivery, DeliveryFilter};
use crate::models::driver::{Driver, DriverStatus};
use crate::models::history::{StatusChange, StatusHistoryEntry};
use crate::models::incident::{Incident, IncidentStatus};
use crate::models::notification::Notification;
use crate::models::pricing::PricingSettings;

/// In-process stand-in for the hosted backend. Status changes are a compare-and-set
/// on the expected old status; the status graph itself is not policed here.
pub struct MemoryBackend {
    deliveries: DashMap<Uuid, Delivery>,
    history: DashMap<Uuid, Vec<StatusHistoryEntry>>,
    drivers: DashMap<Uuid, Driver>,
    notifications: DashMap<Uuid, Notification>,
    incidents: DashMap<Uuid, Incident>,
    pricing: RwLock<PricingSettings>,
    changes_tx: broadcast::Sender<ChangeEvent>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    pub fn new(event_buffer_size: usize) -> Self {
        let (changes_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            deliveries: DashMap::new(),
            history: DashMap::new(),
            drivers: DashMap::new(),
            notifications: DashMap::new(),
            incidents: DashMap::new(),
            pricing: RwLock::new(PricingSettings::default()),
            changes_tx,
            unavailable: AtomicBool::new(false),
        }
    }

    /// While set, every query fails as if the platform were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Backend("backend is unreachable".to_string()));
        }
        Ok(())
    }

    fn publish(&self, table: Table, kind: ChangeKind, record_id: Uuid) {
        let event = ChangeEvent {
            table,
            kind,
            record_id,
        };
        // no receivers is fine: nobody is watching yet
        if self.changes_tx.send(event).is_err() {
            debug!(?table, %record_id, "change published without listeners");
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes_tx.subscribe()
    }

    async fn list_deliveries(&self, filter: &DeliveryFilter) -> Result<Vec<Delivery>, AppError> {
        self.check_available()?;

        let mut deliveries: Vec<Delivery> = self
            .deliveries
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        deliveries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(deliveries.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_delivery(&self, id: Uuid) -> Result<Delivery, AppError> {
        self.check_available()?;

        self.deliveries
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))
    }

    async fn insert_delivery(&self, delivery: Delivery) -> Result<Delivery, AppError> {
        self.check_available()?;

        self.deliveries.insert(delivery.id, delivery.clone());
        self.publish(Table::Deliveries, ChangeKind::Insert, delivery.id);
        Ok(delivery)
    }

    async fn update_delivery_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<Delivery, AppError> {
        self.check_available()?;

        let (updated, entry) = {
            let mut delivery = self
                .deliveries
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

            if let Some(expected) = change.expected {
                if delivery.status != expected {
                    return Err(AppError::InvalidTransition {
                        from: delivery.status.to_string(),
                        to: change.status.to_string(),
                    });
                }
            }

            let now = Utc::now();
            let entry = StatusHistoryEntry {
                id: Uuid::new_v4(),
                delivery_id: id,
                old_status: delivery.status,
                new_status: change.status,
                actor: change.actor,
                note: change.note,
                created_at: now,
            };

            delivery.status = change.status;
            delivery.updated_at = now;
            (delivery.clone(), entry)
        };

        self.history.entry(id).or_default().push(entry);
        self.publish(Table::Deliveries, ChangeKind::Update, id);
        Ok(updated)
    }

    async fn status_history(&self, delivery_id: Uuid) -> Result<Vec<StatusHistoryEntry>, AppError> {
        self.check_available()?;

        Ok(self
            .history
            .get(&delivery_id)
            .map(|entries| entries.value().clone())
            .unwrap_or_default())
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, AppError> {
        self.check_available()?;

        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(drivers)
    }

    async fn upsert_driver(&self, driver: Driver) -> Result<Driver, AppError> {
        self.check_available()?;

        let kind = if self.drivers.insert(driver.id, driver.clone()).is_some() {
            ChangeKind::Update
        } else {
            ChangeKind::Insert
        };
        self.publish(Table::Drivers, kind, driver.id);
        Ok(driver)
    }

    async fn list_notifications(&self, unread_only: bool) -> Result<Vec<Notification>, AppError> {
        self.check_available()?;

        let mut notifications: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|entry| !unread_only || !entry.value().is_read)
            .map(|entry| entry.value().clone())
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn insert_notification(
        &self,
        notification: Notification,
    ) -> Result<Notification, AppError> {
        self.check_available()?;

        self.notifications
            .insert(notification.id, notification.clone());
        self.publish(Table::Notifications, ChangeKind::Insert, notification.id);
        Ok(notification)
    }

    async fn mark_notification_read(&self, id: Uuid) -> Result<(Notification, bool), AppError> {
        self.check_available()?;

        let (notification, flipped) = {
            let mut notification = self
                .notifications
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("notification {id} not found")))?;

            let flipped = !notification.is_read;
            if flipped {
                notification.is_read = true;
                notification.read_at = Some(Utc::now());
            }
            (notification.clone(), flipped)
        };

        if flipped {
            self.publish(Table::Notifications, ChangeKind::Update, id);
        }
        Ok((notification, flipped))
    }

    async fn mark_all_notifications_read(&self) -> Result<usize, AppError> {
        self.check_available()?;

        let now = Utc::now();
        let mut flipped = Vec::new();
        for mut entry in self.notifications.iter_mut() {
            if !entry.is_read {
                entry.is_read = true;
                entry.read_at = Some(now);
                flipped.push(entry.id);
            }
        }

        for id in &flipped {
            self.publish(Table::Notifications, ChangeKind::Update, *id);
        }
        Ok(flipped.len())
    }

    async fn unread_notification_count(&self) -> Result<usize, AppError> {
        self.check_available()?;

        Ok(self
            .notifications
            .iter()
            .filter(|entry| !entry.value().is_read)
            .count())
    }

    async fn list_incidents(&self) -> Result<Vec<Incident>, AppError> {
        self.check_available()?;

        let mut incidents: Vec<Incident> = self
            .incidents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(incidents)
    }

    async fn get_incident(&self, id: Uuid) -> Result<Incident, AppError> {
        self.check_available()?;

        self.incidents
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("incident {id} not found")))
    }

    async fn insert_incident(&self, incident: Incident) -> Result<Incident, AppError> {
        self.check_available()?;

        self.incidents.insert(incident.id, incident.clone());
        self.publish(Table::Incidents, ChangeKind::Insert, incident.id);
        Ok(incident)
    }

    async fn update_incident_status(
        &self,
        id: Uuid,
        status: IncidentStatus,
    ) -> Result<Incident, AppError> {
        self.check_available()?;

        let updated = {
            let mut incident = self
                .incidents
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("incident {id} not found")))?;
            incident.status = status;
            incident.updated_at = Utc::now();
            incident.clone()
        };

        self.publish(Table::Incidents, ChangeKind::Update, id);
        Ok(updated)
    }

    async fn pricing(&self) -> Result<PricingSettings, AppError> {
        self.check_available()?;

        self.pricing
            .read()
            .map(|pricing| pricing.clone())
            .map_err(|err| AppError::Internal(format!("pricing lock poisoned: {err}")))
    }

    async fn update_pricing(&self, pricing: PricingSettings) -> Result<PricingSettings, AppError> {
        self.check_available()?;

        let mut current = self
            .pricing
            .write()
            .map_err(|err| AppError::Internal(format!("pricing lock poisoned: {err}")))?;
        *current = pricing.clone();
        Ok(pricing)
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, AppError> {
        self.check_available()?;

        let mut stats = DashboardStats {
            total_deliveries: 0,
            active_deliveries: 0,
            pending_deliveries: 0,
            completed_deliveries: 0,
            cancelled_deliveries: 0,
            drivers_online: 0,
            open_incidents: 0,
            unread_notifications: 0,
            revenue: 0.0,
            generated_at: Utc::now(),
        };

        for entry in self.deliveries.iter() {
            let delivery = entry.value();
            stats.total_deliveries += 1;
            match StatusBucket::classify(delivery.status) {
                StatusBucket::Pending => stats.pending_deliveries += 1,
                StatusBucket::InProgress => stats.active_deliveries += 1,
                StatusBucket::Completed => {
                    stats.completed_deliveries += 1;
                    stats.revenue += delivery.price;
                }
                StatusBucket::Cancelled => stats.cancelled_deliveries += 1,
            }
        }

        stats.drivers_online = self
            .drivers
            .iter()
            .filter(|entry| entry.value().status != DriverStatus::Offline)
            .count();
        stats.open_incidents = self
            .incidents
            .iter()
            .filter(|entry| {
                matches!(
                    entry.value().status,
                    IncidentStatus::Open | IncidentStatus::Investigating
                )
            })
            .count();
        stats.unread_notifications = self
            .notifications
            .iter()
            .filter(|entry| !entry.value().is_read)
            .count();

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::MemoryBackend;
    use crate::backend::Backend;
    use crate::error::AppError;
    use crate::models::delivery::{Delivery, DeliveryStatus};
    use crate::models::history::StatusChange;

    async fn seeded(status: DeliveryStatus) -> (MemoryBackend, Uuid) {
        let backend = MemoryBackend::new(16);
        let id = Uuid::new_v4();
        let now = Utc::now();
        backend
            .insert_delivery(Delivery {
                id,
                tracking_code: Delivery::tracking_code_for(id),
                status,
                customer_name: "Ann Lee".to_string(),
                customer_phone: "+1 555 0100".to_string(),
                pickup_address: "12 Main St".to_string(),
                dropoff_address: "9 Elm Rd".to_string(),
                driver_id: None,
                price: 350.0,
                notes: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        (backend, id)
    }

    fn change(expected: Option<DeliveryStatus>, status: DeliveryStatus) -> StatusChange {
        StatusChange {
            expected,
            status,
            actor: Some("admin-1".to_string()),
            note: None,
        }
    }

    #[tokio::test]
    async fn stale_expected_status_is_rejected_without_history() {
        let (backend, id) = seeded(DeliveryStatus::Arriving).await;

        backend
            .update_delivery_status(
                id,
                change(Some(DeliveryStatus::Arriving), DeliveryStatus::Delivered),
            )
            .await
            .unwrap();

        let err = backend
            .update_delivery_status(
                id,
                change(Some(DeliveryStatus::Arriving), DeliveryStatus::Failed),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition { .. }));
        let delivery = backend.get_delivery(id).await.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Delivered);
        assert_eq!(backend.status_history(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unconditional_change_is_applied() {
        let (backend, id) = seeded(DeliveryStatus::Pending).await;

        let updated = backend
            .update_delivery_status(id, change(None, DeliveryStatus::Completed))
            .await
            .unwrap();

        assert_eq!(updated.status, DeliveryStatus::Completed);
        let history = backend.status_history(id).await.unwrap();
        assert_eq!(history[0].old_status, DeliveryStatus::Pending);
    }
}
