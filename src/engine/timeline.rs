use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;
use crate::models::history::StatusHistoryEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
    Completed,
    InProgress,
    Cancelled,
    Pending,
}

impl StatusBucket {
    pub fn classify(status: DeliveryStatus) -> Self {
        match status {
            DeliveryStatus::Delivered | DeliveryStatus::Completed => StatusBucket::Completed,
            DeliveryStatus::Cancelled | DeliveryStatus::Failed | DeliveryStatus::Returned => {
                StatusBucket::Cancelled
            }
            DeliveryStatus::Pending | DeliveryStatus::Searching => StatusBucket::Pending,
            DeliveryStatus::Assigned
            | DeliveryStatus::Accepted
            | DeliveryStatus::PickingUp
            | DeliveryStatus::PickedUp
            | DeliveryStatus::InTransit
            | DeliveryStatus::Arriving => StatusBucket::InProgress,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            StatusBucket::Completed => "#16a34a",
            StatusBucket::InProgress => "#2563eb",
            StatusBucket::Cancelled => "#dc2626",
            StatusBucket::Pending => "#6b7280",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineItem {
    pub id: Uuid,
    pub old_status: DeliveryStatus,
    pub new_status: DeliveryStatus,
    pub bucket: StatusBucket,
    pub color: &'static str,
    pub actor: Option<String>,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Timeline {
    pub entries: Vec<TimelineItem>,
    pub error: Option<String>,
}

impl Timeline {
    pub fn build(mut history: Vec<StatusHistoryEntry>) -> Self {
        // stable: entries sharing a timestamp keep backend order
        history.sort_by_key(|entry| entry.created_at);

        let entries = history
            .into_iter()
            .map(|entry| {
                let bucket = StatusBucket::classify(entry.new_status);
                TimelineItem {
                    id: entry.id,
                    old_status: entry.old_status,
                    new_status: entry.new_status,
                    bucket,
                    color: bucket.color(),
                    actor: entry.actor,
                    note: entry.note,
                    at: entry.created_at,
                }
            })
            .collect();

        Self {
            entries,
            error: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{StatusBucket, Timeline};
    use crate::models::delivery::DeliveryStatus;
    use crate::models::history::StatusHistoryEntry;

    fn entry(
        old_status: DeliveryStatus,
        new_status: DeliveryStatus,
        at: chrono::DateTime<Utc>,
    ) -> StatusHistoryEntry {
        StatusHistoryEntry {
            id: Uuid::new_v4(),
            delivery_id: Uuid::from_u128(1),
            old_status,
            new_status,
            actor: None,
            note: None,
            created_at: at,
        }
    }

    #[test]
    fn entries_render_in_ascending_time_order() {
        let t1 = Utc::now() - Duration::minutes(10);
        let t2 = Utc::now();

        let history = vec![
            entry(DeliveryStatus::Assigned, DeliveryStatus::InTransit, t2),
            entry(DeliveryStatus::Pending, DeliveryStatus::Assigned, t1),
        ];

        let timeline = Timeline::build(history);
        assert_eq!(timeline.entries.len(), 2);
        assert_eq!(timeline.entries[0].at, t1);
        assert_eq!(timeline.entries[0].new_status, DeliveryStatus::Assigned);
        assert_eq!(timeline.entries[1].at, t2);
        assert_eq!(timeline.entries[1].new_status, DeliveryStatus::InTransit);
        assert!(timeline.error.is_none());
    }

    #[test]
    fn items_are_colored_by_target_bucket() {
        let now = Utc::now();
        let timeline = Timeline::build(vec![
            entry(DeliveryStatus::Pending, DeliveryStatus::Cancelled, now),
            entry(DeliveryStatus::Cancelled, DeliveryStatus::Completed, now),
        ]);

        assert_eq!(timeline.entries[0].bucket, StatusBucket::Cancelled);
        assert_eq!(timeline.entries[0].color, StatusBucket::Cancelled.color());
        assert_eq!(timeline.entries[1].bucket, StatusBucket::Completed);
    }

    #[test]
    fn every_status_lands_in_a_bucket() {
        assert_eq!(StatusBucket::classify(DeliveryStatus::Searching), StatusBucket::Pending);
        assert_eq!(StatusBucket::classify(DeliveryStatus::Arriving), StatusBucket::InProgress);
        assert_eq!(StatusBucket::classify(DeliveryStatus::Returned), StatusBucket::Cancelled);
        assert_eq!(StatusBucket::classify(DeliveryStatus::Delivered), StatusBucket::Completed);
    }

    #[test]
    fn unavailable_timeline_is_empty_with_message() {
        let timeline = Timeline::unavailable("history service timed out");
        assert!(timeline.entries.is_empty());
        assert_eq!(timeline.error.as_deref(), Some("history service timed out"));
    }
}
