//! Savings goal handlers.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use hearth_core::error::AppError;

use crate::middleware::OrgContext;
use crate::models::{NotificationKind, SavingsGoal};
use crate::startup::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create a savings goal.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGoalRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub target_amount: Decimal,
    pub target_date: Option<NaiveDate>,
}

/// Request to patch a savings goal.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGoalRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub target_amount: Option<Decimal>,
    pub current_amount: Option<Decimal>,
    pub target_date: Option<NaiveDate>,
}

/// Request to record a contribution.
#[derive(Debug, Deserialize)]
pub struct ContributeRequest {
    pub amount: Decimal,
}

/// Savings goal response with derived progress figures.
#[derive(Debug, Serialize)]
pub struct GoalResponse {
    pub goal_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub target_date: Option<NaiveDate>,
    pub progress_percent: Decimal,
    pub required_monthly: Option<Decimal>,
    pub is_reached: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<SavingsGoal> for GoalResponse {
    fn from(goal: SavingsGoal) -> Self {
        let today = Utc::now().date_naive();
        Self {
            progress_percent: goal.progress_percent(),
            required_monthly: goal.required_monthly(today),
            is_reached: goal.is_reached(),
            goal_id: goal.goal_id,
            organization_id: goal.organization_id,
            name: goal.name,
            target_amount: goal.target_amount,
            current_amount: goal.current_amount,
            target_date: goal.target_date,
            created_utc: goal.created_utc,
            updated_utc: goal.updated_utc,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a savings goal.
///
/// POST /api/goals
pub async fn create_goal(
    State(state): State<AppState>,
    org: OrgContext,
    Json(req): Json<CreateGoalRequest>,
) -> Result<(StatusCode, Json<GoalResponse>), AppError> {
    req.validate()?;

    if req.target_amount < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "target_amount cannot be negative"
        )));
    }

    let goal = state
        .db
        .create_goal(
            org.organization_id,
            &req.name,
            req.target_amount,
            req.target_date,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(GoalResponse::from(goal))))
}

/// List savings goals.
///
/// GET /api/goals
pub async fn list_goals(
    State(state): State<AppState>,
    org: OrgContext,
) -> Result<Json<Vec<GoalResponse>>, AppError> {
    let goals = state.db.list_goals(org.organization_id).await?;

    Ok(Json(goals.into_iter().map(GoalResponse::from).collect()))
}

/// Get a single savings goal.
///
/// GET /api/goals/:goal_id
pub async fn get_goal(
    State(state): State<AppState>,
    org: OrgContext,
    Path(goal_id): Path<Uuid>,
) -> Result<Json<GoalResponse>, AppError> {
    let goal = state.db.get_goal(org.organization_id, goal_id).await?;

    Ok(Json(GoalResponse::from(goal)))
}

/// Patch a savings goal.
///
/// PATCH /api/goals/:goal_id
pub async fn update_goal(
    State(state): State<AppState>,
    org: OrgContext,
    Path(goal_id): Path<Uuid>,
    Json(req): Json<UpdateGoalRequest>,
) -> Result<Json<GoalResponse>, AppError> {
    req.validate()?;

    for (field, value) in [
        ("target_amount", req.target_amount),
        ("current_amount", req.current_amount),
    ] {
        if let Some(amount) = value {
            if amount < Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "{} cannot be negative",
                    field
                )));
            }
        }
    }

    let goal = state
        .db
        .update_goal(
            org.organization_id,
            goal_id,
            req.name.as_deref(),
            req.target_amount,
            req.current_amount,
            req.target_date,
        )
        .await?;

    Ok(Json(GoalResponse::from(goal)))
}

/// Delete a savings goal.
///
/// DELETE /api/goals/:goal_id
pub async fn delete_goal(
    State(state): State<AppState>,
    org: OrgContext,
    Path(goal_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_goal(org.organization_id, goal_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Add a contribution to a goal. Emits a goal_reached notification the
/// first time the target is crossed.
///
/// POST /api/goals/:goal_id/contributions
pub async fn add_contribution(
    State(state): State<AppState>,
    org: OrgContext,
    Path(goal_id): Path<Uuid>,
    Json(req): Json<ContributeRequest>,
) -> Result<Json<GoalResponse>, AppError> {
    if req.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "amount must be positive"
        )));
    }

    let (goal, newly_reached) = state
        .db
        .add_goal_contribution(org.organization_id, goal_id, req.amount)
        .await?;

    if newly_reached {
        let dedup_key = format!("goal_reached:{}", goal.goal_id);
        let message = format!("Savings goal '{}' reached", goal.name);
        let detail = serde_json::json!({
            "goal_id": goal.goal_id,
            "name": goal.name,
            "target_amount": goal.target_amount,
        });
        state
            .db
            .create_notification(
                org.organization_id,
                NotificationKind::GoalReached,
                &message,
                Some(detail),
                Some(&dedup_key),
            )
            .await?;
    }

    Ok(Json(GoalResponse::from(goal)))
}
