//! Account handlers.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use hearth_core::error::AppError;

use crate::middleware::OrgContext;
use crate::models::{Account, AccountType, CreateAccount, UpdateAccount};
use crate::startup::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create an account.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, message = "Account name is required"))]
    pub name: String,
    pub account_type: String,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub interest_rate: Option<Decimal>,
    pub minimum_payment: Option<Decimal>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Request to update an account.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, message = "Account name cannot be empty"))]
    pub name: Option<String>,
    pub balance: Option<Decimal>,
    pub interest_rate: Option<Decimal>,
    pub minimum_payment: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// List filter.
#[derive(Debug, Deserialize)]
pub struct ListAccountsQuery {
    pub account_type: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

/// Account response.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub account_type: String,
    pub balance: Decimal,
    pub currency: String,
    pub interest_rate: Option<Decimal>,
    pub minimum_payment: Option<Decimal>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            account_id: account.account_id,
            organization_id: account.organization_id,
            name: account.name,
            account_type: account.account_type,
            balance: account.balance,
            currency: account.currency,
            interest_rate: account.interest_rate,
            minimum_payment: account.minimum_payment,
            is_active: account.is_active,
            created_utc: account.created_utc,
            updated_utc: account.updated_utc,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new account.
///
/// POST /api/accounts
pub async fn create_account(
    State(state): State<AppState>,
    org: OrgContext,
    Json(req): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    req.validate()?;

    if AccountType::from_str(&req.account_type).is_none() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Unknown account_type '{}'",
            req.account_type
        )));
    }
    if let Some(rate) = req.interest_rate {
        if rate < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "interest_rate cannot be negative"
            )));
        }
    }
    if let Some(minimum) = req.minimum_payment {
        if minimum < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "minimum_payment cannot be negative"
            )));
        }
    }

    let account = state
        .db
        .create_account(&CreateAccount {
            organization_id: org.organization_id,
            name: req.name,
            account_type: req.account_type,
            balance: req.balance,
            currency: req.currency,
            interest_rate: req.interest_rate,
            minimum_payment: req.minimum_payment,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(AccountResponse::from(account))))
}

/// List accounts, optionally filtered by type; inactive accounts are
/// hidden unless asked for.
///
/// GET /api/accounts
pub async fn list_accounts(
    State(state): State<AppState>,
    org: OrgContext,
    Query(query): Query<ListAccountsQuery>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    if let Some(account_type) = &query.account_type {
        if AccountType::from_str(account_type).is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Unknown account_type '{}'",
                account_type
            )));
        }
    }

    let accounts = state
        .db
        .list_accounts(
            org.organization_id,
            query.account_type.as_deref(),
            query.include_inactive,
        )
        .await?;

    Ok(Json(accounts.into_iter().map(AccountResponse::from).collect()))
}

/// Get account by ID.
///
/// GET /api/accounts/:account_id
pub async fn get_account(
    State(state): State<AppState>,
    org: OrgContext,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = state.db.get_account(org.organization_id, account_id).await?;

    Ok(Json(AccountResponse::from(account)))
}

/// Patch an account.
///
/// PATCH /api/accounts/:account_id
pub async fn update_account(
    State(state): State<AppState>,
    org: OrgContext,
    Path(account_id): Path<Uuid>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    req.validate()?;

    if let Some(rate) = req.interest_rate {
        if rate < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "interest_rate cannot be negative"
            )));
        }
    }
    if let Some(minimum) = req.minimum_payment {
        if minimum < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "minimum_payment cannot be negative"
            )));
        }
    }

    let account = state
        .db
        .update_account(
            org.organization_id,
            account_id,
            &UpdateAccount {
                name: req.name,
                balance: req.balance,
                interest_rate: req.interest_rate,
                minimum_payment: req.minimum_payment,
                is_active: req.is_active,
            },
        )
        .await?;

    Ok(Json(AccountResponse::from(account)))
}

/// Delete an account. 409 while transactions or holdings still reference
/// it; deactivate via PATCH instead.
///
/// DELETE /api/accounts/:account_id
pub async fn delete_account(
    State(state): State<AppState>,
    org: OrgContext,
    Path(account_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .db
        .delete_account(org.organization_id, account_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
