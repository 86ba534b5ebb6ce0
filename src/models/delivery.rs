use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Searching,
    Assigned,
    Accepted,
    PickingUp,
    PickedUp,
    InTransit,
    Arriving,
    Delivered,
    Failed,
    Cancelled,
    Returned,
    Completed,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 13] = [
        DeliveryStatus::Pending,
        DeliveryStatus::Searching,
        DeliveryStatus::Assigned,
        DeliveryStatus::Accepted,
        DeliveryStatus::PickingUp,
        DeliveryStatus::PickedUp,
        DeliveryStatus::InTransit,
        DeliveryStatus::Arriving,
        DeliveryStatus::Delivered,
        DeliveryStatus::Failed,
        DeliveryStatus::Cancelled,
        DeliveryStatus::Returned,
        DeliveryStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Searching => "searching",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::Accepted => "accepted",
            DeliveryStatus::PickingUp => "picking_up",
            DeliveryStatus::PickedUp => "picked_up",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Arriving => "arriving",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Cancelled => "cancelled",
            DeliveryStatus::Returned => "returned",
            DeliveryStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        DeliveryStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| format!("unknown delivery status: {raw}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub tracking_code: String,
    pub status: DeliveryStatus,
    pub customer_name: String,
    pub customer_phone: String,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub driver_id: Option<Uuid>,
    pub price: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    pub fn tracking_code_for(id: Uuid) -> String {
        let hex = id.simple().to_string().to_uppercase();
        format!("DLV-{}", &hex[..8])
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
    pub search: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl DeliveryFilter {
    pub fn matches(&self, delivery: &Delivery) -> bool {
        if let Some(status) = self.status {
            if delivery.status != status {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                [
                    &delivery.tracking_code,
                    &delivery.customer_name,
                    &delivery.customer_phone,
                    &delivery.pickup_address,
                    &delivery.dropoff_address,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{Delivery, DeliveryStatus};

    #[test]
    fn status_strings_round_trip_through_parse() {
        for status in DeliveryStatus::ALL {
            assert_eq!(status.as_str().parse::<DeliveryStatus>(), Ok(status));
        }
        assert!("lost".parse::<DeliveryStatus>().is_err());
    }

    #[test]
    fn tracking_code_is_prefixed_and_uppercase() {
        let id = Uuid::from_u128(0xabcdef12_3456_7890_abcd_ef1234567890);
        assert_eq!(Delivery::tracking_code_for(id), "DLV-ABCDEF12");
    }
}
