use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::Utc;
use tracing::{info, warn};

use crate::engine::export::to_csv;
use crate::error::AppError;
use crate::models::delivery::DeliveryFilter;
use crate::models::driver::Driver;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", get(list_drivers))
        .route("/export/deliveries.csv", get(export_deliveries))
        .route("/export/drivers.csv", get(export_drivers))
}

fn attachment(kind: &str, body: Vec<u8>) -> Response {
    let filename = format!("{kind}-{}.csv", Utc::now().format("%Y-%m-%d"));

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Driver>>, AppError> {
    let drivers = state.backend.list_drivers().await.map_err(|err| {
        warn!(error = %err, "failed to list drivers");
        err
    })?;
    Ok(Json(drivers))
}

async fn export_deliveries(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<DeliveryFilter>,
) -> Result<Response, AppError> {
    let deliveries = state.backend.list_deliveries(&filter).await.map_err(|err| {
        warn!(error = %err, "failed to load deliveries for export");
        err
    })?;

    let body = to_csv(&deliveries)?;
    state
        .metrics
        .csv_exports_total
        .with_label_values(&["deliveries"])
        .inc();
    info!(rows = deliveries.len(), "deliveries exported");

    Ok(attachment("deliveries", body))
}

async fn export_drivers(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let drivers = state.backend.list_drivers().await.map_err(|err| {
        warn!(error = %err, "failed to load drivers for export");
        err
    })?;

    let body = to_csv(&drivers)?;
    state
        .metrics
        .csv_exports_total
        .with_label_values(&["drivers"])
        .inc();
    info!(rows = drivers.len(), "drivers exported");

    Ok(attachment("drivers", body))
}
