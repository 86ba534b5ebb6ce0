use std::sync::Arc;

use axum::extract::State;
use axum::routing::put;
use axum::Json;
use axum::Router;
use tracing::{info, warn};

use crate::api::session::AdminSession;
use crate::engine::autosave::DraftKey;
use crate::error::AppError;
use crate::models::pricing::PricingSettings;
use crate::state::AppState;

pub const PRICING_FORM: &str = "pricing";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/pricing", put(update_pricing).get(get_pricing))
}

async fn get_pricing(State(state): State<Arc<AppState>>) -> Result<Json<PricingSettings>, AppError> {
    Ok(Json(state.backend.pricing().await?))
}

async fn update_pricing(
    State(state): State<Arc<AppState>>,
    session: AdminSession,
    Json(payload): Json<PricingSettings>,
) -> Result<Json<PricingSettings>, AppError> {
    payload.validate()?;

    let pricing = state.backend.update_pricing(payload).await.map_err(|err| {
        warn!(error = %err, "failed to save pricing");
        err
    })?;

    state
        .autosave
        .discard(&DraftKey::new(session.admin_id, PRICING_FORM));
    info!("pricing updated");

    Ok(Json(pricing))
}
