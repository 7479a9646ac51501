//! Notification model for hearth-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BudgetExceeded,
    GoalReached,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BudgetExceeded => "budget_exceeded",
            NotificationKind::GoalReached => "goal_reached",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "budget_exceeded" => Some(NotificationKind::BudgetExceeded),
            "goal_reached" => Some(NotificationKind::GoalReached),
            _ => None,
        }
    }
}

/// An in-app notification. `dedup_key` prevents repeats of the same event,
/// e.g. one budget alert per category per month.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub notification_id: Uuid,
    pub organization_id: Uuid,
    pub kind: String,
    pub message: String,
    pub detail: Option<serde_json::Value>,
    pub dedup_key: Option<String>,
    pub read_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}
