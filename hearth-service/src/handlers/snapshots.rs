//! Net-worth snapshot handlers.

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use hearth_core::error::AppError;

use crate::middleware::OrgContext;
use crate::models::NetWorthSnapshot;
use crate::startup::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Net-worth snapshot response.
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub snapshot_id: Uuid,
    pub organization_id: Uuid,
    pub captured_utc: DateTime<Utc>,
    pub assets: Decimal,
    pub liabilities: Decimal,
    pub net_worth: Decimal,
    pub detail: Option<serde_json::Value>,
}

impl From<NetWorthSnapshot> for SnapshotResponse {
    fn from(snapshot: NetWorthSnapshot) -> Self {
        Self {
            snapshot_id: snapshot.snapshot_id,
            organization_id: snapshot.organization_id,
            captured_utc: snapshot.captured_utc,
            assets: snapshot.assets,
            liabilities: snapshot.liabilities,
            net_worth: snapshot.net_worth,
            detail: snapshot.detail,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Capture a net-worth snapshot from current active account balances.
///
/// POST /api/snapshots
pub async fn create_snapshot(
    State(state): State<AppState>,
    org: OrgContext,
) -> Result<(StatusCode, Json<SnapshotResponse>), AppError> {
    let snapshot = state.db.create_snapshot(org.organization_id).await?;

    Ok((StatusCode::CREATED, Json(SnapshotResponse::from(snapshot))))
}

/// List snapshots, newest first.
///
/// GET /api/snapshots
pub async fn list_snapshots(
    State(state): State<AppState>,
    org: OrgContext,
) -> Result<Json<Vec<SnapshotResponse>>, AppError> {
    let snapshots = state.db.list_snapshots(org.organization_id).await?;

    Ok(Json(
        snapshots.into_iter().map(SnapshotResponse::from).collect(),
    ))
}
