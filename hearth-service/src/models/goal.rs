//! Savings goal model for hearth-service.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A savings target. Progress is computed, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavingsGoal {
    pub goal_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub target_date: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl SavingsGoal {
    pub fn is_reached(&self) -> bool {
        self.current_amount >= self.target_amount
    }

    /// Percent of target saved, capped at 100.
    pub fn progress_percent(&self) -> Decimal {
        if self.target_amount <= Decimal::ZERO {
            return Decimal::ONE_HUNDRED;
        }
        let pct = (self.current_amount / self.target_amount * Decimal::ONE_HUNDRED).round_dp(1);
        pct.min(Decimal::ONE_HUNDRED)
    }

    /// Amount to save each month to hit the target by target_date.
    /// None when there is no target date, the goal is already reached,
    /// or the date is not in the future.
    pub fn required_monthly(&self, today: NaiveDate) -> Option<Decimal> {
        let target_date = self.target_date?;
        if self.is_reached() || target_date <= today {
            return None;
        }
        let months = months_between(today, target_date).max(1);
        let outstanding = self.target_amount - self.current_amount;
        Some((outstanding / Decimal::from(months)).round_dp(2))
    }
}

/// Whole months from `from` to `to`, rounding partial months up.
fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let mut months =
        i64::from(to.year() - from.year()) * 12 + i64::from(to.month() as i32 - from.month() as i32);
    if to.day() > from.day() {
        months += 1;
    }
    months.max(0)
}
