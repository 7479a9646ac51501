//! Notification handlers.

use axum::extract::{Json, Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_core::error::AppError;

use crate::middleware::OrgContext;
use crate::models::Notification;
use crate::startup::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Notification list filters.
#[derive(Debug, Deserialize, Default)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// Notification response.
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub notification_id: Uuid,
    pub organization_id: Uuid,
    pub kind: String,
    pub message: String,
    pub detail: Option<serde_json::Value>,
    pub read_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            notification_id: notification.notification_id,
            organization_id: notification.organization_id,
            kind: notification.kind,
            message: notification.message,
            detail: notification.detail,
            read_utc: notification.read_utc,
            created_utc: notification.created_utc,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// List notifications, newest first.
///
/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    org: OrgContext,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<NotificationResponse>>, AppError> {
    let notifications = state
        .db
        .list_notifications(org.organization_id, query.unread_only)
        .await?;

    Ok(Json(
        notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
    ))
}

/// Mark a notification as read. Idempotent; the first read timestamp wins.
///
/// POST /api/notifications/:notification_id/read
pub async fn mark_read(
    State(state): State<AppState>,
    org: OrgContext,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<NotificationResponse>, AppError> {
    let notification = state
        .db
        .mark_notification_read(org.organization_id, notification_id)
        .await?;

    Ok(Json(NotificationResponse::from(notification)))
}
