use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::transitions::{Lifecycle, Transition};
use crate::error::AppError;
use crate::models::incident::{Incident, IncidentStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/incidents", get(list_incidents))
        .route("/incidents/:id/transitions", get(list_transitions))
        .route("/incidents/:id/status", patch(update_status))
}

#[derive(Deserialize)]
pub struct UpdateIncidentStatusRequest {
    pub status: IncidentStatus,
}

#[derive(Serialize)]
pub struct IncidentTransitions {
    pub status: IncidentStatus,
    pub terminal: bool,
    pub options: &'static [Transition<IncidentStatus>],
}

async fn list_incidents(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Incident>>, AppError> {
    let incidents = state.backend.list_incidents().await.map_err(|err| {
        warn!(error = %err, "failed to list incidents");
        err
    })?;
    Ok(Json(incidents))
}

async fn list_transitions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<IncidentTransitions>, AppError> {
    let incident = state.backend.get_incident(id).await?;

    Ok(Json(IncidentTransitions {
        status: incident.status,
        terminal: incident.status.is_terminal(),
        options: incident.status.transitions(),
    }))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateIncidentStatusRequest>,
) -> Result<Json<Incident>, AppError> {
    let current = state.backend.get_incident(id).await?;

    if !current.status.can_transition_to(payload.status) {
        warn!(incident_id = %id, from = %current.status, to = %payload.status, "incident transition rejected");
        return Err(AppError::InvalidTransition {
            from: current.status.to_string(),
            to: payload.status.to_string(),
        });
    }

    let incident = state.backend.update_incident_status(id, payload.status).await?;
    info!(incident_id = %id, status = %incident.status, "incident status changed");
    Ok(Json(incident))
}
