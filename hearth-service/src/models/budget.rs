//! Budget model for hearth-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A recurring monthly spending envelope for one category. Spending is
/// computed on demand from the month's transactions, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Budget {
    pub budget_id: Uuid,
    pub organization_id: Uuid,
    pub category: String,
    pub amount: Decimal,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Spend aggregated per category for one month.
#[derive(Debug, Clone, FromRow)]
pub struct CategorySpend {
    pub category: String,
    pub spent: Decimal,
}

/// Computed status of one budget for one month.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub budget_id: Uuid,
    pub category: String,
    pub budgeted: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub percent_used: Decimal,
}

impl BudgetStatus {
    pub fn compute(budget: &Budget, spent: Decimal) -> Self {
        let remaining = budget.amount - spent;
        let percent_used = if budget.amount > Decimal::ZERO {
            (spent / budget.amount * Decimal::ONE_HUNDRED).round_dp(1)
        } else {
            Decimal::ZERO
        };
        Self {
            budget_id: budget.budget_id,
            category: budget.category.clone(),
            budgeted: budget.amount,
            spent,
            remaining,
            percent_used,
        }
    }

    pub fn is_exceeded(&self) -> bool {
        self.spent > self.budgeted
    }
}
