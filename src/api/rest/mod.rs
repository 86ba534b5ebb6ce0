pub mod deliveries;
pub mod drafts;
pub mod export;
pub mod incidents;
pub mod notifications;
pub mod pricing;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::error::AppError;
use crate::models::dashboard::DashboardStats;
use crate::state::AppState;

pub fn router(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        .merge(deliveries::router())
        .merge(notifications::router())
        .merge(incidents::router())
        .merge(export::router())
        .merge(drafts::router())
        .merge(pricing::router())
        .route("/dashboard", get(dashboard))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .fallback_service(ServeDir::new(static_dir))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    views: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        views: state.dispatcher.subscriber_count(),
    })
}

async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Json<DashboardStats>, AppError> {
    if let Some(stats) = state.dashboard.snapshot() {
        return Ok(Json(stats));
    }

    state.dashboard.reload().await;
    state
        .dashboard
        .snapshot()
        .map(Json)
        .ok_or_else(|| AppError::Backend("dashboard stats are unavailable".to_string()))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
