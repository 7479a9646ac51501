//! Budget handlers: CRUD, monthly summary and exceeded-budget alerts.

use std::collections::HashMap;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use hearth_core::error::AppError;

use crate::middleware::OrgContext;
use crate::models::{Budget, BudgetStatus, NotificationKind};
use crate::startup::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create a budget.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBudgetRequest {
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub amount: Decimal,
}

/// Request to patch a budget.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBudgetRequest {
    #[validate(length(min = 1, message = "Category cannot be empty"))]
    pub category: Option<String>,
    pub amount: Option<Decimal>,
}

/// Month selector, defaults to the current month.
#[derive(Debug, Deserialize, Default)]
pub struct SummaryQuery {
    /// YYYY-MM
    pub month: Option<String>,
}

/// Budget response.
#[derive(Debug, Serialize)]
pub struct BudgetResponse {
    pub budget_id: Uuid,
    pub organization_id: Uuid,
    pub category: String,
    pub amount: Decimal,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<Budget> for BudgetResponse {
    fn from(budget: Budget) -> Self {
        Self {
            budget_id: budget.budget_id,
            organization_id: budget.organization_id,
            category: budget.category,
            amount: budget.amount,
            created_utc: budget.created_utc,
            updated_utc: budget.updated_utc,
        }
    }
}

/// Per-category status plus totals for one month.
#[derive(Debug, Serialize)]
pub struct BudgetSummaryResponse {
    pub month: String,
    pub budgets: Vec<BudgetStatus>,
    pub total_budgeted: Decimal,
    pub total_spent: Decimal,
    pub total_remaining: Decimal,
}

/// Result of an alert run.
#[derive(Debug, Serialize)]
pub struct RunAlertsResponse {
    pub created: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a budget. One budget per category per organization.
///
/// POST /api/budgets
pub async fn create_budget(
    State(state): State<AppState>,
    org: OrgContext,
    Json(req): Json<CreateBudgetRequest>,
) -> Result<(StatusCode, Json<BudgetResponse>), AppError> {
    req.validate()?;

    if req.amount < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "amount cannot be negative"
        )));
    }

    let budget = state
        .db
        .create_budget(org.organization_id, &req.category, req.amount)
        .await?;

    Ok((StatusCode::CREATED, Json(BudgetResponse::from(budget))))
}

/// List budgets by category.
///
/// GET /api/budgets
pub async fn list_budgets(
    State(state): State<AppState>,
    org: OrgContext,
) -> Result<Json<Vec<BudgetResponse>>, AppError> {
    let budgets = state.db.list_budgets(org.organization_id).await?;

    Ok(Json(budgets.into_iter().map(BudgetResponse::from).collect()))
}

/// Patch a budget.
///
/// PATCH /api/budgets/:budget_id
pub async fn update_budget(
    State(state): State<AppState>,
    org: OrgContext,
    Path(budget_id): Path<Uuid>,
    Json(req): Json<UpdateBudgetRequest>,
) -> Result<Json<BudgetResponse>, AppError> {
    req.validate()?;

    if let Some(amount) = req.amount {
        if amount < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "amount cannot be negative"
            )));
        }
    }

    let budget = state
        .db
        .update_budget(
            org.organization_id,
            budget_id,
            req.category.as_deref(),
            req.amount,
        )
        .await?;

    Ok(Json(BudgetResponse::from(budget)))
}

/// Delete a budget.
///
/// DELETE /api/budgets/:budget_id
pub async fn delete_budget(
    State(state): State<AppState>,
    org: OrgContext,
    Path(budget_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_budget(org.organization_id, budget_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Per-category budgeted / spent / remaining for one month. Categories
/// without a budget are not reported; budgets without spend report zero.
///
/// GET /api/budgets/summary
pub async fn budget_summary(
    State(state): State<AppState>,
    org: OrgContext,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<BudgetSummaryResponse>, AppError> {
    let (month, from_date, to_date) = resolve_month(query.month.as_deref())?;

    let budgets = state.db.list_budgets(org.organization_id).await?;
    let spend: HashMap<String, Decimal> = state
        .db
        .category_spend(org.organization_id, from_date, to_date)
        .await?
        .into_iter()
        .map(|s| (s.category, s.spent))
        .collect();

    let statuses: Vec<BudgetStatus> = budgets
        .iter()
        .map(|budget| {
            let spent = spend.get(&budget.category).copied().unwrap_or(Decimal::ZERO);
            BudgetStatus::compute(budget, spent)
        })
        .collect();

    let total_budgeted: Decimal = statuses.iter().map(|s| s.budgeted).sum();
    let total_spent: Decimal = statuses.iter().map(|s| s.spent).sum();

    Ok(Json(BudgetSummaryResponse {
        month,
        budgets: statuses,
        total_budgeted,
        total_spent,
        total_remaining: total_budgeted - total_spent,
    }))
}

/// Create budget_exceeded notifications for categories over their limit
/// this month. Deduplicated per category and month, so re-running is safe.
///
/// POST /api/budgets/alerts/run
pub async fn run_alerts(
    State(state): State<AppState>,
    org: OrgContext,
) -> Result<Json<RunAlertsResponse>, AppError> {
    let (month, from_date, to_date) = resolve_month(None)?;

    let budgets = state.db.list_budgets(org.organization_id).await?;
    let spend: HashMap<String, Decimal> = state
        .db
        .category_spend(org.organization_id, from_date, to_date)
        .await?
        .into_iter()
        .map(|s| (s.category, s.spent))
        .collect();

    let mut created = 0u64;
    for budget in &budgets {
        let spent = spend.get(&budget.category).copied().unwrap_or(Decimal::ZERO);
        let status = BudgetStatus::compute(budget, spent);
        if !status.is_exceeded() {
            continue;
        }

        let dedup_key = format!("budget_exceeded:{}:{}", budget.category, month);
        let message = format!(
            "Budget '{}' exceeded: spent {} of {}",
            budget.category, status.spent, status.budgeted
        );
        let detail = serde_json::json!({
            "category": budget.category,
            "month": month,
            "budgeted": status.budgeted,
            "spent": status.spent,
        });

        let notification = state
            .db
            .create_notification(
                org.organization_id,
                NotificationKind::BudgetExceeded,
                &message,
                Some(detail),
                Some(&dedup_key),
            )
            .await?;
        if notification.is_some() {
            created += 1;
        }
    }

    Ok(Json(RunAlertsResponse { created }))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolve an optional YYYY-MM selector into (label, first day, last day).
fn resolve_month(month: Option<&str>) -> Result<(String, NaiveDate, NaiveDate), AppError> {
    let first = match month {
        Some(raw) => NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d")
            .map_err(|_| AppError::BadRequest(anyhow::anyhow!("month must be YYYY-MM")))?,
        None => {
            let today = Utc::now().date_naive();
            NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
                .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Invalid current date")))?
        }
    };

    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("month out of range")))?;

    Ok((first.format("%Y-%m").to_string(), first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_an_explicit_month_to_its_bounds() {
        let (label, first, last) = resolve_month(Some("2025-02")).unwrap();
        assert_eq!(label, "2025-02");
        assert_eq!(first, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());

        let (_, _, last) = resolve_month(Some("2024-02")).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, _, last) = resolve_month(Some("2025-12")).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn rejects_malformed_months() {
        assert!(resolve_month(Some("2025")).is_err());
        assert!(resolve_month(Some("2025-13")).is_err());
        assert!(resolve_month(Some("February")).is_err());
    }

    #[test]
    fn defaults_to_the_current_month() {
        let (label, first, _) = resolve_month(None).unwrap();
        let today = Utc::now().date_naive();
        assert_eq!(label, today.format("%Y-%m").to_string());
        assert_eq!(first.day(), 1);
        assert_eq!(first.month(), today.month());
    }
}
