//! Investment holding handlers.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use hearth_core::error::AppError;

use crate::middleware::OrgContext;
use crate::models::Holding;
use crate::startup::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create a holding.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateHoldingRequest {
    pub account_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Symbol is required"))]
    pub symbol: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub last_price: Decimal,
}

/// Request to patch a holding. The symbol is immutable.
#[derive(Debug, Deserialize)]
pub struct UpdateHoldingRequest {
    pub quantity: Option<Decimal>,
    pub average_cost: Option<Decimal>,
    pub last_price: Option<Decimal>,
}

/// Holding response.
#[derive(Debug, Serialize)]
pub struct HoldingResponse {
    pub holding_id: Uuid,
    pub organization_id: Uuid,
    pub account_id: Option<Uuid>,
    pub symbol: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub last_price: Decimal,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<Holding> for HoldingResponse {
    fn from(holding: Holding) -> Self {
        Self {
            holding_id: holding.holding_id,
            organization_id: holding.organization_id,
            account_id: holding.account_id,
            symbol: holding.symbol,
            quantity: holding.quantity,
            average_cost: holding.average_cost,
            last_price: holding.last_price,
            created_utc: holding.created_utc,
            updated_utc: holding.updated_utc,
        }
    }
}

/// Holding with derived valuation figures, used by the portfolio summary.
#[derive(Debug, Serialize)]
pub struct HoldingValuationResponse {
    #[serde(flatten)]
    pub holding: HoldingResponse,
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub unrealized_gain: Decimal,
    pub gain_percent: Decimal,
}

/// Portfolio-wide valuation.
#[derive(Debug, Serialize)]
pub struct PortfolioSummaryResponse {
    pub holdings: Vec<HoldingValuationResponse>,
    pub total_market_value: Decimal,
    pub total_cost_basis: Decimal,
    pub total_unrealized_gain: Decimal,
    pub total_gain_percent: Decimal,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a holding. One row per symbol per organization; the optional
/// account link must point at an investment account.
///
/// POST /api/holdings
pub async fn create_holding(
    State(state): State<AppState>,
    org: OrgContext,
    Json(req): Json<CreateHoldingRequest>,
) -> Result<(StatusCode, Json<HoldingResponse>), AppError> {
    req.validate()?;
    validate_figures(Some(req.quantity), Some(req.average_cost), Some(req.last_price))?;

    let holding = state
        .db
        .create_holding(
            org.organization_id,
            req.account_id,
            &req.symbol,
            req.quantity,
            req.average_cost,
            req.last_price,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(HoldingResponse::from(holding))))
}

/// List holdings by symbol.
///
/// GET /api/holdings
pub async fn list_holdings(
    State(state): State<AppState>,
    org: OrgContext,
) -> Result<Json<Vec<HoldingResponse>>, AppError> {
    let holdings = state.db.list_holdings(org.organization_id).await?;

    Ok(Json(
        holdings.into_iter().map(HoldingResponse::from).collect(),
    ))
}

/// Patch a holding's quantity or prices.
///
/// PATCH /api/holdings/:holding_id
pub async fn update_holding(
    State(state): State<AppState>,
    org: OrgContext,
    Path(holding_id): Path<Uuid>,
    Json(req): Json<UpdateHoldingRequest>,
) -> Result<Json<HoldingResponse>, AppError> {
    validate_figures(req.quantity, req.average_cost, req.last_price)?;

    let holding = state
        .db
        .update_holding(
            org.organization_id,
            holding_id,
            req.quantity,
            req.average_cost,
            req.last_price,
        )
        .await?;

    Ok(Json(HoldingResponse::from(holding)))
}

/// Delete a holding.
///
/// DELETE /api/holdings/:holding_id
pub async fn delete_holding(
    State(state): State<AppState>,
    org: OrgContext,
    Path(holding_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .db
        .delete_holding(org.organization_id, holding_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Portfolio valuation: per-holding market value, cost basis and gain,
/// plus portfolio totals.
///
/// GET /api/holdings/summary
pub async fn portfolio_summary(
    State(state): State<AppState>,
    org: OrgContext,
) -> Result<Json<PortfolioSummaryResponse>, AppError> {
    let holdings = state.db.list_holdings(org.organization_id).await?;

    let valuations: Vec<HoldingValuationResponse> = holdings
        .into_iter()
        .map(|holding| HoldingValuationResponse {
            market_value: holding.market_value(),
            cost_basis: holding.cost_basis(),
            unrealized_gain: holding.unrealized_gain(),
            gain_percent: holding.gain_percent(),
            holding: HoldingResponse::from(holding),
        })
        .collect();

    let total_market_value: Decimal = valuations.iter().map(|v| v.market_value).sum();
    let total_cost_basis: Decimal = valuations.iter().map(|v| v.cost_basis).sum();
    let total_unrealized_gain = total_market_value - total_cost_basis;
    let total_gain_percent = if total_cost_basis.is_zero() {
        Decimal::ZERO
    } else {
        (total_unrealized_gain / total_cost_basis * Decimal::from(100)).round_dp(2)
    };

    Ok(Json(PortfolioSummaryResponse {
        holdings: valuations,
        total_market_value,
        total_cost_basis,
        total_unrealized_gain,
        total_gain_percent,
    }))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn validate_figures(
    quantity: Option<Decimal>,
    average_cost: Option<Decimal>,
    last_price: Option<Decimal>,
) -> Result<(), AppError> {
    for (field, value) in [
        ("quantity", quantity),
        ("average_cost", average_cost),
        ("last_price", last_price),
    ] {
        if let Some(figure) = value {
            if figure < Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "{} cannot be negative",
                    field
                )));
            }
        }
    }
    Ok(())
}
