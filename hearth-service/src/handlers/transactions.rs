//! Transaction handlers: CRUD, bulk import and manual label assignment.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use hearth_core::error::AppError;

use crate::handlers::labels::LabelResponse;
use crate::handlers::rules::RuleRunResponse;
use crate::middleware::OrgContext;
use crate::models::{
    CreateTransaction, ImportRecord, ListTransactionsFilter, Transaction, UpdateTransaction,
};
use crate::services::metrics::{RULES_APPLIED_TOTAL, TRANSACTIONS_IMPORTED_TOTAL};
use crate::startup::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create a transaction. Negative amounts are expenses,
/// positive amounts income.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub account_id: Uuid,
    pub posted_date: NaiveDate,
    pub amount: Decimal,
    pub merchant_name: Option<String>,
    pub description: Option<String>,
    pub category_primary: Option<String>,
    pub category_detailed: Option<String>,
    pub import_hash: Option<String>,
}

/// One record in a bulk import batch.
#[derive(Debug, Deserialize, Serialize)]
pub struct ImportRecordRequest {
    pub account_id: Uuid,
    pub posted_date: NaiveDate,
    pub amount: Decimal,
    pub merchant_name: Option<String>,
    pub description: Option<String>,
    pub category_primary: Option<String>,
    pub import_hash: Option<String>,
}

/// Request to bulk-import already-parsed transactions.
#[derive(Debug, Deserialize, Validate)]
pub struct ImportTransactionsRequest {
    #[validate(length(min = 1, message = "transactions list is empty"))]
    pub transactions: Vec<ImportRecordRequest>,
}

/// Request to patch a transaction.
#[derive(Debug, Deserialize)]
pub struct UpdateTransactionRequest {
    pub posted_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub merchant_name: Option<String>,
    pub description: Option<String>,
    pub category_primary: Option<String>,
    pub category_detailed: Option<String>,
}

/// List filters; all optional and combinable.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub account_id: Option<Uuid>,
    pub category: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub search: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

fn default_page_size() -> i32 {
    50
}

/// Transaction response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction_id: Uuid,
    pub organization_id: Uuid,
    pub account_id: Uuid,
    pub posted_date: NaiveDate,
    pub amount: Decimal,
    pub merchant_name: Option<String>,
    pub description: Option<String>,
    pub category_primary: Option<String>,
    pub category_detailed: Option<String>,
    pub import_hash: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(txn: Transaction) -> Self {
        Self {
            transaction_id: txn.transaction_id,
            organization_id: txn.organization_id,
            account_id: txn.account_id,
            posted_date: txn.posted_date,
            amount: txn.amount,
            merchant_name: txn.merchant_name,
            description: txn.description,
            category_primary: txn.category_primary,
            category_detailed: txn.category_detailed,
            import_hash: txn.import_hash,
            created_utc: txn.created_utc,
            updated_utc: txn.updated_utc,
        }
    }
}

/// Transaction with its labels.
#[derive(Debug, Serialize)]
pub struct TransactionWithLabelsResponse {
    #[serde(flatten)]
    pub transaction: TransactionResponse,
    pub labels: Vec<LabelResponse>,
}

/// Paginated transaction list.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    pub transactions: Vec<TransactionResponse>,
    pub next_page_token: Option<Uuid>,
}

/// Bulk import result.
#[derive(Debug, Serialize)]
pub struct ImportTransactionsResponse {
    pub imported: u64,
    pub skipped: u64,
    pub rules: RuleRunResponse,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a transaction. Active new-scope rules run against it before the
/// commit, so the response already carries their categorization.
///
/// POST /api/transactions
pub async fn create_transaction(
    State(state): State<AppState>,
    org: OrgContext,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    let rules = state.db.list_rules(org.organization_id).await?;

    let (transaction, outcome) = state
        .db
        .create_transaction_with_rules(
            &CreateTransaction {
                organization_id: org.organization_id,
                account_id: req.account_id,
                posted_date: req.posted_date,
                amount: req.amount,
                merchant_name: req.merchant_name,
                description: req.description,
                category_primary: req.category_primary,
                category_detailed: req.category_detailed,
                import_hash: req.import_hash,
            },
            &rules,
        )
        .await?;

    if outcome.matched() > 0 {
        RULES_APPLIED_TOTAL
            .with_label_values(&["applied"])
            .inc_by(outcome.matched() as f64);
    }

    Ok((
        StatusCode::CREATED,
        Json(TransactionResponse::from(transaction)),
    ))
}

/// Bulk-import transactions. Duplicates by (organization, import_hash)
/// are skipped, not errored; new-scope rules run over the inserted batch.
///
/// POST /api/transactions/import
pub async fn import_transactions(
    State(state): State<AppState>,
    org: OrgContext,
    Json(req): Json<ImportTransactionsRequest>,
) -> Result<Json<ImportTransactionsResponse>, AppError> {
    req.validate()?;

    let records: Vec<ImportRecord> = req
        .transactions
        .into_iter()
        .map(|r| ImportRecord {
            account_id: r.account_id,
            posted_date: r.posted_date,
            amount: r.amount,
            merchant_name: r.merchant_name,
            description: r.description,
            category_primary: r.category_primary,
            import_hash: r.import_hash,
        })
        .collect();

    let rules = state.db.list_rules(org.organization_id).await?;
    let (inserted, skipped, outcome) = state
        .db
        .import_transactions(org.organization_id, &records, &rules)
        .await?;

    TRANSACTIONS_IMPORTED_TOTAL
        .with_label_values(&["imported"])
        .inc_by(inserted.len() as f64);
    TRANSACTIONS_IMPORTED_TOTAL
        .with_label_values(&["skipped"])
        .inc_by(skipped as f64);
    if outcome.matched() > 0 {
        RULES_APPLIED_TOTAL
            .with_label_values(&["applied"])
            .inc_by(outcome.matched() as f64);
    }

    Ok(Json(ImportTransactionsResponse {
        imported: inserted.len() as u64,
        skipped,
        rules: RuleRunResponse::from_outcome(&outcome),
    }))
}

/// List transactions, newest first, with keyset pagination.
///
/// GET /api/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    org: OrgContext,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, AppError> {
    let (transactions, next_page_token) = state
        .db
        .list_transactions(
            org.organization_id,
            &ListTransactionsFilter {
                account_id: query.account_id,
                category: query.category,
                from_date: query.from_date,
                to_date: query.to_date,
                search: query.search,
                page_size: query.page_size,
                page_token: query.page_token,
            },
        )
        .await?;

    Ok(Json(ListTransactionsResponse {
        transactions: transactions
            .into_iter()
            .map(TransactionResponse::from)
            .collect(),
        next_page_token,
    }))
}

/// Get a transaction with its labels.
///
/// GET /api/transactions/:transaction_id
pub async fn get_transaction(
    State(state): State<AppState>,
    org: OrgContext,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionWithLabelsResponse>, AppError> {
    let transaction = state
        .db
        .get_transaction(org.organization_id, transaction_id)
        .await?;
    let labels = state
        .db
        .list_transaction_labels(org.organization_id, transaction_id)
        .await?;

    Ok(Json(TransactionWithLabelsResponse {
        transaction: TransactionResponse::from(transaction),
        labels: labels.into_iter().map(LabelResponse::from).collect(),
    }))
}

/// Patch a transaction.
///
/// PATCH /api/transactions/:transaction_id
pub async fn update_transaction(
    State(state): State<AppState>,
    org: OrgContext,
    Path(transaction_id): Path<Uuid>,
    Json(req): Json<UpdateTransactionRequest>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction = state
        .db
        .update_transaction(
            org.organization_id,
            transaction_id,
            &UpdateTransaction {
                posted_date: req.posted_date,
                amount: req.amount,
                merchant_name: req.merchant_name,
                description: req.description,
                category_primary: req.category_primary,
                category_detailed: req.category_detailed,
            },
        )
        .await?;

    Ok(Json(TransactionResponse::from(transaction)))
}

/// Delete a transaction; its label assignments cascade.
///
/// DELETE /api/transactions/:transaction_id
pub async fn delete_transaction(
    State(state): State<AppState>,
    org: OrgContext,
    Path(transaction_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .db
        .delete_transaction(org.organization_id, transaction_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Manually attach a label. Idempotent.
///
/// PUT /api/transactions/:transaction_id/labels/:label_id
pub async fn add_transaction_label(
    State(state): State<AppState>,
    org: OrgContext,
    Path((transaction_id, label_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .db
        .add_transaction_label(org.organization_id, transaction_id, label_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Detach a label. Idempotent.
///
/// DELETE /api/transactions/:transaction_id/labels/:label_id
pub async fn remove_transaction_label(
    State(state): State<AppState>,
    org: OrgContext,
    Path((transaction_id, label_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .db
        .remove_transaction_label(org.organization_id, transaction_id, label_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
