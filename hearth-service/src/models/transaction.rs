//! Transaction model for hearth-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::AccountType;

/// A posted transaction. Negative amounts are expenses, positive are income.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
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

/// The slice of a transaction the rule engine evaluates conditions against.
/// Kept separate from the row type so the engine stays free of sqlx.
#[derive(Debug, Clone)]
pub struct TransactionView {
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub account_type: Option<AccountType>,
    pub posted_date: NaiveDate,
    pub amount: Decimal,
    pub merchant_name: Option<String>,
    pub description: Option<String>,
    pub category_primary: Option<String>,
}

impl TransactionView {
    pub fn from_transaction(txn: &Transaction, account_type: Option<AccountType>) -> Self {
        Self {
            transaction_id: txn.transaction_id,
            account_id: txn.account_id,
            account_type,
            posted_date: txn.posted_date,
            amount: txn.amount,
            merchant_name: txn.merchant_name.clone(),
            description: txn.description.clone(),
            category_primary: txn.category_primary.clone(),
        }
    }
}

/// Input for creating a single transaction.
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub organization_id: Uuid,
    pub account_id: Uuid,
    pub posted_date: NaiveDate,
    pub amount: Decimal,
    pub merchant_name: Option<String>,
    pub description: Option<String>,
    pub category_primary: Option<String>,
    pub category_detailed: Option<String>,
    pub import_hash: Option<String>,
}

/// Patch input for updating a transaction. None leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateTransaction {
    pub posted_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub merchant_name: Option<String>,
    pub description: Option<String>,
    pub category_primary: Option<String>,
    pub category_detailed: Option<String>,
}

/// One already-parsed record in a bulk import batch.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub account_id: Uuid,
    pub posted_date: NaiveDate,
    pub amount: Decimal,
    pub merchant_name: Option<String>,
    pub description: Option<String>,
    pub category_primary: Option<String>,
    pub import_hash: Option<String>,
}

/// Filter parameters for listing transactions.
#[derive(Debug, Clone, Default)]
pub struct ListTransactionsFilter {
    pub account_id: Option<Uuid>,
    pub category: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub search: Option<String>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
