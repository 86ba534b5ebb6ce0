use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::Notification;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
}

#[derive(Deserialize, Default)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Serialize)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub target: String,
}

impl From<Notification> for NotificationView {
    fn from(notification: Notification) -> Self {
        let target = notification.target_path();
        Self {
            notification,
            target,
        }
    }
}

#[derive(Serialize)]
pub struct UnreadCount {
    pub unread_count: usize,
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub notification: NotificationView,
    pub unread_count: usize,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<NotificationView>>, AppError> {
    let notifications = state
        .backend
        .list_notifications(query.unread_only)
        .await
        .map_err(|err| {
            warn!(error = %err, "failed to list notifications");
            err
        })?;

    Ok(Json(notifications.into_iter().map(Into::into).collect()))
}

async fn unread_count(State(state): State<Arc<AppState>>) -> Result<Json<UnreadCount>, AppError> {
    let unread_count = state.backend.unread_notification_count().await?;
    Ok(Json(UnreadCount { unread_count }))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, AppError> {
    let (notification, flipped) = state.backend.mark_notification_read(id).await.map_err(|err| {
        warn!(notification_id = %id, error = %err, "failed to mark notification read");
        err
    })?;
    debug!(notification_id = %id, flipped, "notification marked read");

    let unread_count = state.backend.unread_notification_count().await?;

    Ok(Json(MarkReadResponse {
        notification: notification.into(),
        unread_count,
    }))
}

async fn mark_all_read(State(state): State<Arc<AppState>>) -> Result<Json<UnreadCount>, AppError> {
    let flipped = state.backend.mark_all_notifications_read().await.map_err(|err| {
        warn!(error = %err, "failed to mark all notifications read");
        err
    })?;
    debug!(flipped, "all notifications marked read");

    let unread_count = state.backend.unread_notification_count().await?;
    Ok(Json(UnreadCount { unread_count }))
}
