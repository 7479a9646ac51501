//! Net worth snapshot model for hearth-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A point-in-time capture of assets, liabilities and net worth.
/// `detail` holds per-account-type totals as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NetWorthSnapshot {
    pub snapshot_id: Uuid,
    pub organization_id: Uuid,
    pub captured_utc: DateTime<Utc>,
    pub assets: Decimal,
    pub liabilities: Decimal,
    pub net_worth: Decimal,
    pub detail: Option<serde_json::Value>,
}
