//! Label handlers.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use hearth_core::error::AppError;

use crate::middleware::OrgContext;
use crate::models::Label;
use crate::startup::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create a label.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLabelRequest {
    #[validate(length(min = 1, message = "Label name is required"))]
    pub name: String,
    pub color: Option<String>,
}

/// Label response.
#[derive(Debug, Serialize)]
pub struct LabelResponse {
    pub label_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl From<Label> for LabelResponse {
    fn from(label: Label) -> Self {
        Self {
            label_id: label.label_id,
            organization_id: label.organization_id,
            name: label.name,
            color: label.color,
            created_utc: label.created_utc,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a label. Names are unique per organization.
///
/// POST /api/labels
pub async fn create_label(
    State(state): State<AppState>,
    org: OrgContext,
    Json(req): Json<CreateLabelRequest>,
) -> Result<(StatusCode, Json<LabelResponse>), AppError> {
    req.validate()?;

    let label = state
        .db
        .create_label(org.organization_id, &req.name, req.color.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(LabelResponse::from(label))))
}

/// List labels by name.
///
/// GET /api/labels
pub async fn list_labels(
    State(state): State<AppState>,
    org: OrgContext,
) -> Result<Json<Vec<LabelResponse>>, AppError> {
    let labels = state.db.list_labels(org.organization_id).await?;

    Ok(Json(labels.into_iter().map(LabelResponse::from).collect()))
}

/// Delete a label; its transaction assignments cascade.
///
/// DELETE /api/labels/:label_id
pub async fn delete_label(
    State(state): State<AppState>,
    org: OrgContext,
    Path(label_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_label(org.organization_id, label_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
