use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::session::AdminSession;
use crate::engine::autosave::DraftKey;
use crate::engine::timeline::Timeline;
use crate::engine::transitions::{options_for, Lifecycle, Transition};
use crate::error::{AppError, FieldErrors};
use crate::models::delivery::{Delivery, DeliveryFilter, DeliveryStatus};
use crate::models::history::StatusChange;
use crate::state::AppState;

pub const DELIVERY_FORM: &str = "delivery_form";

const MAX_PRICE: f64 = 1_000_000.0;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", get(list_deliveries).post(create_delivery))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/transitions", get(list_transitions))
        .route("/deliveries/:id/status", patch(update_status))
        .route("/deliveries/:id/history", get(status_history))
}

#[derive(Deserialize)]
pub struct CreateDeliveryRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub price: f64,
    pub notes: Option<String>,
}

impl CreateDeliveryRequest {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();

        for (field, value) in [
            ("customer_name", &self.customer_name),
            ("customer_phone", &self.customer_phone),
            ("pickup_address", &self.pickup_address),
            ("dropoff_address", &self.dropoff_address),
        ] {
            if value.trim().is_empty() {
                errors.insert(field, "is required".to_string());
            }
        }

        if !self.price.is_finite() || self.price < 0.0 || self.price > MAX_PRICE {
            errors.insert("price", format!("must be between 0 and {MAX_PRICE}"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DeliveryStatus,
    pub note: Option<String>,
}

#[derive(Serialize)]
pub struct TransitionsResponse {
    pub status: DeliveryStatus,
    pub terminal: bool,
    pub options: &'static [Transition<DeliveryStatus>],
}

async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<DeliveryFilter>,
) -> Result<Json<Vec<Delivery>>, AppError> {
    let deliveries = state.backend.list_deliveries(&filter).await.map_err(|err| {
        warn!(error = %err, "failed to list deliveries");
        err
    })?;

    Ok(Json(deliveries))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    Ok(Json(state.backend.get_delivery(id).await?))
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    session: AdminSession,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<Json<Delivery>, AppError> {
    payload.validate()?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    let delivery = Delivery {
        id,
        tracking_code: Delivery::tracking_code_for(id),
        status: DeliveryStatus::Pending,
        customer_name: payload.customer_name.trim().to_string(),
        customer_phone: payload.customer_phone.trim().to_string(),
        pickup_address: payload.pickup_address.trim().to_string(),
        dropoff_address: payload.dropoff_address.trim().to_string(),
        driver_id: None,
        price: payload.price,
        notes: payload.notes.filter(|notes| !notes.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };

    let delivery = state.backend.insert_delivery(delivery).await.map_err(|err| {
        warn!(error = %err, "failed to create delivery");
        err
    })?;

    state
        .autosave
        .discard(&DraftKey::new(session.admin_id, DELIVERY_FORM));

    info!(delivery_id = %delivery.id, tracking_code = %delivery.tracking_code, "delivery created");
    Ok(Json(delivery))
}

async fn list_transitions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionsResponse>, AppError> {
    let delivery = state.backend.get_delivery(id).await?;

    Ok(Json(TransitionsResponse {
        status: delivery.status,
        terminal: delivery.status.is_terminal(),
        options: options_for(delivery.status.as_str()),
    }))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    session: AdminSession,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Delivery>, AppError> {
    let current = state.backend.get_delivery(id).await?;

    if !current.status.can_transition_to(payload.status) {
        state
            .metrics
            .status_transitions_total
            .with_label_values(&["rejected"])
            .inc();
        warn!(
            delivery_id = %id,
            from = %current.status,
            to = %payload.status,
            "status transition rejected"
        );
        return Err(AppError::InvalidTransition {
            from: current.status.to_string(),
            to: payload.status.to_string(),
        });
    }

    let change = StatusChange {
        expected: Some(current.status),
        status: payload.status,
        actor: Some(session.admin_id),
        note: payload.note.filter(|note| !note.trim().is_empty()),
    };

    match state.backend.update_delivery_status(id, change).await {
        Ok(delivery) => {
            state
                .metrics
                .status_transitions_total
                .with_label_values(&["applied"])
                .inc();
            info!(
                delivery_id = %id,
                from = %current.status,
                to = %delivery.status,
                "delivery status changed"
            );
            Ok(Json(delivery))
        }
        Err(err) => {
            state
                .metrics
                .status_transitions_total
                .with_label_values(&["failed"])
                .inc();
            warn!(delivery_id = %id, error = %err, "failed to change delivery status");
            Err(err)
        }
    }
}

async fn status_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Timeline> {
    match state.backend.status_history(id).await {
        Ok(history) => Json(Timeline::build(history)),
        Err(err) => {
            warn!(delivery_id = %id, error = %err, "failed to load status history");
            Json(Timeline::unavailable(format!(
                "status history is unavailable: {err}"
            )))
        }
    }
}
