use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::session::AdminSession;
use crate::engine::autosave::{Draft, DraftKey};
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/drafts/:form",
            put(record_draft).get(draft_status).delete(discard_draft),
        )
        .route("/drafts/:form/restore", post(restore_draft))
}

#[derive(Deserialize)]
pub struct RecordDraftRequest {
    pub open: bool,
    #[serde(default)]
    pub data: Value,
}

#[derive(Serialize)]
pub struct DraftStatus {
    pub form: String,
    pub has_draft: bool,
    pub saved_at: Option<DateTime<Utc>>,
}

fn key(session: AdminSession, form: String) -> Result<DraftKey, AppError> {
    if form.trim().is_empty() {
        return Err(AppError::BadRequest("form name cannot be empty".to_string()));
    }
    Ok(DraftKey::new(session.admin_id, form))
}

async fn record_draft(
    State(state): State<Arc<AppState>>,
    Path(form): Path<String>,
    session: AdminSession,
    Json(payload): Json<RecordDraftRequest>,
) -> Result<StatusCode, AppError> {
    let key = key(session, form)?;
    state.autosave.record(key, payload.data, payload.open);
    Ok(StatusCode::ACCEPTED)
}

async fn draft_status(
    State(state): State<Arc<AppState>>,
    Path(form): Path<String>,
    session: AdminSession,
) -> Result<Json<DraftStatus>, AppError> {
    let key = key(session, form)?;
    let saved_at = state.autosave.saved_at(&key);

    Ok(Json(DraftStatus {
        form: key.form,
        has_draft: saved_at.is_some(),
        saved_at,
    }))
}

async fn restore_draft(
    State(state): State<Arc<AppState>>,
    Path(form): Path<String>,
    session: AdminSession,
) -> Result<Json<Draft>, AppError> {
    let key = key(session, form)?;
    state
        .autosave
        .restore(&key)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no draft for form {}", key.form)))
}

async fn discard_draft(
    State(state): State<Arc<AppState>>,
    Path(form): Path<String>,
    session: AdminSession,
) -> Result<StatusCode, AppError> {
    let key = key(session, form)?;
    state.autosave.discard(&key);
    Ok(StatusCode::NO_CONTENT)
}
