//! Debt overview and payoff planning handlers.

use axum::extract::{Json, Query, State};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;

use hearth_core::error::AppError;

use crate::middleware::OrgContext;
use crate::models::DebtAccount;
use crate::services::metrics::PAYOFF_PLANS_TOTAL;
use crate::services::payoff::{self, StrategyComparison};
use crate::startup::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Payoff plan parameters.
#[derive(Debug, Deserialize, Default)]
pub struct PayoffPlanQuery {
    /// Extra amount put toward debts each month on top of the minimums.
    pub extra_payment: Option<Decimal>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List active debt-type accounts as the payoff planner sees them.
///
/// GET /api/debts
pub async fn list_debts(
    State(state): State<AppState>,
    org: OrgContext,
) -> Result<Json<Vec<DebtAccount>>, AppError> {
    let accounts = state.db.list_debt_accounts(org.organization_id).await?;

    Ok(Json(
        accounts
            .iter()
            .filter_map(DebtAccount::from_account)
            .collect(),
    ))
}

/// Compare snowball, avalanche and current-pace payoff strategies for the
/// organization's active debts.
///
/// GET /api/debts/payoff-plan
pub async fn payoff_plan(
    State(state): State<AppState>,
    org: OrgContext,
    Query(query): Query<PayoffPlanQuery>,
) -> Result<Json<StrategyComparison>, AppError> {
    let extra_payment = query.extra_payment.unwrap_or(Decimal::ZERO);
    if extra_payment < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "extra_payment cannot be negative"
        )));
    }

    let accounts = state.db.list_debt_accounts(org.organization_id).await?;
    let debts: Vec<DebtAccount> = accounts
        .iter()
        .filter_map(DebtAccount::from_account)
        .collect();

    let today = Utc::now().date_naive();
    let comparison = payoff::compare_strategies(&debts, extra_payment, today);

    for strategy in ["snowball", "avalanche", "current_pace"] {
        PAYOFF_PLANS_TOTAL.with_label_values(&[strategy]).inc();
    }

    Ok(Json(comparison))
}
