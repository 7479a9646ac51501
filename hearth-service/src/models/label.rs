//! Label models for hearth-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A free-form tag an organization attaches to transactions. Assignments
/// live in the `transaction_labels` join table; `applied_by_rule_id` there
/// records which rule attached the label (NULL means manual).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Label {
    pub label_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub created_utc: DateTime<Utc>,
}
