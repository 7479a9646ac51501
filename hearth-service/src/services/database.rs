//! Database access layer for hearth-service.
//!
//! Every query is scoped by `organization_id`; callers get it from the JWT
//! claims, never from request bodies. Rule application and bulk import are
//! the two multi-statement writes and both run in a single transaction.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use hearth_core::error::AppError;

use crate::models::{
    Account, AccountType, Budget, CategorySpend, CreateAccount, CreateRule, CreateTransaction,
    Holding, ImportRecord, Label, ListTransactionsFilter, NetWorthSnapshot, Notification,
    NotificationKind, Rule, RuleAction, RuleCondition, RuleScope, RuleWithParts, SavingsGoal,
    Transaction, TransactionView, UpdateAccount, UpdateRule, UpdateTransaction,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::rules::{self, EngineOutcome};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "hearth-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // =========================================================================
    // Account Operations
    // =========================================================================

    #[instrument(skip(self, input), fields(organization_id = %input.organization_id, name = %input.name))]
    pub async fn create_account(&self, input: &CreateAccount) -> Result<Account, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_account"])
            .start_timer();

        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (account_id, organization_id, name, account_type, balance, currency, interest_rate, minimum_payment)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING account_id, organization_id, name, account_type, balance, currency, interest_rate, minimum_payment, is_active, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.organization_id)
        .bind(&input.name)
        .bind(&input.account_type)
        .bind(input.balance)
        .bind(&input.currency)
        .bind(input.interest_rate)
        .bind(input.minimum_payment)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create account: {}", e)))?;

        timer.observe_duration();
        info!(account_id = %account.account_id, "Account created");

        Ok(account)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, account_id = %account_id))]
    pub async fn get_account(
        &self,
        organization_id: Uuid,
        account_id: Uuid,
    ) -> Result<Account, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_account"])
            .start_timer();

        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, organization_id, name, account_type, balance, currency, interest_rate, minimum_payment, is_active, created_utc, updated_utc
            FROM accounts
            WHERE organization_id = $1 AND account_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get account: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Account not found")))?;

        timer.observe_duration();

        Ok(account)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_accounts(
        &self,
        organization_id: Uuid,
        account_type: Option<&str>,
        include_inactive: bool,
    ) -> Result<Vec<Account>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_accounts"])
            .start_timer();

        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, organization_id, name, account_type, balance, currency, interest_rate, minimum_payment, is_active, created_utc, updated_utc
            FROM accounts
            WHERE organization_id = $1
              AND ($2::varchar IS NULL OR account_type = $2)
              AND ($3 OR is_active = TRUE)
            ORDER BY name
            "#,
        )
        .bind(organization_id)
        .bind(account_type)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list accounts: {}", e)))?;

        timer.observe_duration();

        Ok(accounts)
    }

    #[instrument(skip(self, input), fields(organization_id = %organization_id, account_id = %account_id))]
    pub async fn update_account(
        &self,
        organization_id: Uuid,
        account_id: Uuid,
        input: &UpdateAccount,
    ) -> Result<Account, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_account"])
            .start_timer();

        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET name = COALESCE($3, name),
                balance = COALESCE($4, balance),
                interest_rate = COALESCE($5, interest_rate),
                minimum_payment = COALESCE($6, minimum_payment),
                is_active = COALESCE($7, is_active),
                updated_utc = NOW()
            WHERE organization_id = $1 AND account_id = $2
            RETURNING account_id, organization_id, name, account_type, balance, currency, interest_rate, minimum_payment, is_active, created_utc, updated_utc
            "#,
        )
        .bind(organization_id)
        .bind(account_id)
        .bind(&input.name)
        .bind(input.balance)
        .bind(input.interest_rate)
        .bind(input.minimum_payment)
        .bind(input.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update account: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Account not found")))?;

        timer.observe_duration();
        info!(account_id = %account.account_id, "Account updated");

        Ok(account)
    }

    /// Delete an account. Refused while transactions or holdings still
    /// reference it; deactivate instead in that case.
    #[instrument(skip(self), fields(organization_id = %organization_id, account_id = %account_id))]
    pub async fn delete_account(
        &self,
        organization_id: Uuid,
        account_id: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_account"])
            .start_timer();

        let transaction_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM transactions WHERE organization_id = $1 AND account_id = $2",
        )
        .bind(organization_id)
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to count transactions: {}", e))
        })?;

        if transaction_count > 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Account has {} transactions; deactivate it instead",
                transaction_count
            )));
        }

        let holding_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM holdings WHERE organization_id = $1 AND account_id = $2",
        )
        .bind(organization_id)
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count holdings: {}", e)))?;

        if holding_count > 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Account has {} holdings; deactivate it instead",
                holding_count
            )));
        }

        let result = sqlx::query("DELETE FROM accounts WHERE organization_id = $1 AND account_id = $2")
            .bind(organization_id)
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete account: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Account not found")));
        }

        timer.observe_duration();
        info!(account_id = %account_id, "Account deleted");

        Ok(())
    }

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    /// Insert a transaction and run new-scope rules against it, applying
    /// the categorization and labels in the same database transaction.
    #[instrument(skip(self, input, rules), fields(organization_id = %input.organization_id, account_id = %input.account_id))]
    pub async fn create_transaction_with_rules(
        &self,
        input: &CreateTransaction,
        rules: &[RuleWithParts],
    ) -> Result<(Transaction, EngineOutcome), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_transaction"])
            .start_timer();

        let account_type = sqlx::query_scalar::<_, String>(
            "SELECT account_type FROM accounts WHERE organization_id = $1 AND account_id = $2",
        )
        .bind(input.organization_id)
        .bind(input.account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get account: {}", e)))?
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown account_id")))?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let inserted = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (transaction_id, organization_id, account_id, posted_date, amount, merchant_name, description, category_primary, category_detailed, import_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING transaction_id, organization_id, account_id, posted_date, amount, merchant_name, description, category_primary, category_detailed, import_hash, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.organization_id)
        .bind(input.account_id)
        .bind(input.posted_date)
        .bind(input.amount)
        .bind(&input.merchant_name)
        .bind(&input.description)
        .bind(&input.category_primary)
        .bind(&input.category_detailed)
        .bind(&input.import_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Transaction with this import_hash already exists"
                ))
            }
            e => AppError::DatabaseError(anyhow::anyhow!("Failed to create transaction: {}", e)),
        })?;

        let view =
            TransactionView::from_transaction(&inserted, AccountType::from_str(&account_type));
        let outcome = rules::evaluate(rules, std::slice::from_ref(&view), RuleScope::New);

        let transaction = if outcome.matched() > 0 {
            apply_outcome(&mut tx, input.organization_id, &outcome)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to apply rules: {}", e))
                })?;
            sqlx::query_as::<_, Transaction>(
                r#"
                SELECT transaction_id, organization_id, account_id, posted_date, amount, merchant_name, description, category_primary, category_detailed, import_hash, created_utc, updated_utc
                FROM transactions
                WHERE transaction_id = $1
                "#,
            )
            .bind(inserted.transaction_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to reload transaction: {}", e))
            })?
        } else {
            inserted
        };

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            transaction_id = %transaction.transaction_id,
            rules_matched = outcome.matched(),
            "Transaction created"
        );

        Ok((transaction, outcome))
    }

    /// Bulk-insert already-parsed records, skipping duplicates by
    /// (organization, import_hash), then run new-scope rules over the
    /// inserted batch. All-or-nothing per batch.
    #[instrument(skip(self, records, rules), fields(organization_id = %organization_id, count = %records.len()))]
    pub async fn import_transactions(
        &self,
        organization_id: Uuid,
        records: &[ImportRecord],
        rules: &[RuleWithParts],
    ) -> Result<(Vec<Transaction>, u64, EngineOutcome), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["import_transactions"])
            .start_timer();

        let account_types: HashMap<Uuid, String> = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT account_id, account_type FROM accounts WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list accounts: {}", e)))?
        .into_iter()
        .collect();

        for record in records {
            if !account_types.contains_key(&record.account_id) {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Unknown account_id {}",
                    record.account_id
                )));
            }
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let mut inserted = Vec::with_capacity(records.len());
        let mut skipped = 0u64;

        for record in records {
            let row = sqlx::query_as::<_, Transaction>(
                r#"
                INSERT INTO transactions (transaction_id, organization_id, account_id, posted_date, amount, merchant_name, description, category_primary, import_hash)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (organization_id, import_hash) WHERE import_hash IS NOT NULL DO NOTHING
                RETURNING transaction_id, organization_id, account_id, posted_date, amount, merchant_name, description, category_primary, category_detailed, import_hash, created_utc, updated_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(organization_id)
            .bind(record.account_id)
            .bind(record.posted_date)
            .bind(record.amount)
            .bind(&record.merchant_name)
            .bind(&record.description)
            .bind(&record.category_primary)
            .bind(&record.import_hash)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to import transaction: {}", e))
            })?;

            match row {
                Some(txn) => inserted.push(txn),
                None => skipped += 1,
            }
        }

        let views: Vec<TransactionView> = inserted
            .iter()
            .map(|txn| {
                let account_type = account_types
                    .get(&txn.account_id)
                    .and_then(|s| AccountType::from_str(s));
                TransactionView::from_transaction(txn, account_type)
            })
            .collect();
        let outcome = rules::evaluate(rules, &views, RuleScope::New);

        if outcome.matched() > 0 {
            apply_outcome(&mut tx, organization_id, &outcome)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to apply rules: {}", e))
                })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            imported = inserted.len(),
            skipped = skipped,
            rules_matched = outcome.matched(),
            "Transactions imported"
        );

        Ok((inserted, skipped, outcome))
    }

    /// Keyset-paginated listing, newest first. The page token is the last
    /// transaction id of the previous page.
    #[instrument(skip(self, filter), fields(organization_id = %organization_id))]
    pub async fn list_transactions(
        &self,
        organization_id: Uuid,
        filter: &ListTransactionsFilter,
    ) -> Result<(Vec<Transaction>, Option<Uuid>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_transactions"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let transactions = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Transaction>(
                r#"
                SELECT transaction_id, organization_id, account_id, posted_date, amount, merchant_name, description, category_primary, category_detailed, import_hash, created_utc, updated_utc
                FROM transactions
                WHERE organization_id = $1
                  AND ($2::uuid IS NULL OR account_id = $2)
                  AND ($3::varchar IS NULL OR category_primary = $3)
                  AND ($4::date IS NULL OR posted_date >= $4)
                  AND ($5::date IS NULL OR posted_date <= $5)
                  AND ($6::text IS NULL OR merchant_name ILIKE '%' || $6 || '%' OR description ILIKE '%' || $6 || '%')
                  AND (posted_date, created_utc, transaction_id) < (
                      SELECT posted_date, created_utc, transaction_id
                      FROM transactions
                      WHERE organization_id = $1 AND transaction_id = $7
                  )
                ORDER BY posted_date DESC, created_utc DESC, transaction_id DESC
                LIMIT $8
                "#,
            )
            .bind(organization_id)
            .bind(filter.account_id)
            .bind(&filter.category)
            .bind(filter.from_date)
            .bind(filter.to_date)
            .bind(&filter.search)
            .bind(cursor)
            .bind(limit + 1)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Transaction>(
                r#"
                SELECT transaction_id, organization_id, account_id, posted_date, amount, merchant_name, description, category_primary, category_detailed, import_hash, created_utc, updated_utc
                FROM transactions
                WHERE organization_id = $1
                  AND ($2::uuid IS NULL OR account_id = $2)
                  AND ($3::varchar IS NULL OR category_primary = $3)
                  AND ($4::date IS NULL OR posted_date >= $4)
                  AND ($5::date IS NULL OR posted_date <= $5)
                  AND ($6::text IS NULL OR merchant_name ILIKE '%' || $6 || '%' OR description ILIKE '%' || $6 || '%')
                ORDER BY posted_date DESC, created_utc DESC, transaction_id DESC
                LIMIT $7
                "#,
            )
            .bind(organization_id)
            .bind(filter.account_id)
            .bind(&filter.category)
            .bind(filter.from_date)
            .bind(filter.to_date)
            .bind(&filter.search)
            .bind(limit + 1)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list transactions: {}", e))
        })?;

        timer.observe_duration();

        let has_more = transactions.len() > limit as usize;
        let mut transactions = transactions;
        if has_more {
            transactions.pop();
        }
        let next_token = if has_more {
            transactions.last().map(|t| t.transaction_id)
        } else {
            None
        };

        Ok((transactions, next_token))
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, transaction_id = %transaction_id))]
    pub async fn get_transaction(
        &self,
        organization_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Transaction, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_transaction"])
            .start_timer();

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT transaction_id, organization_id, account_id, posted_date, amount, merchant_name, description, category_primary, category_detailed, import_hash, created_utc, updated_utc
            FROM transactions
            WHERE organization_id = $1 AND transaction_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get transaction: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

        timer.observe_duration();

        Ok(transaction)
    }

    #[instrument(skip(self, input), fields(organization_id = %organization_id, transaction_id = %transaction_id))]
    pub async fn update_transaction(
        &self,
        organization_id: Uuid,
        transaction_id: Uuid,
        input: &UpdateTransaction,
    ) -> Result<Transaction, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_transaction"])
            .start_timer();

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET posted_date = COALESCE($3, posted_date),
                amount = COALESCE($4, amount),
                merchant_name = COALESCE($5, merchant_name),
                description = COALESCE($6, description),
                category_primary = COALESCE($7, category_primary),
                category_detailed = COALESCE($8, category_detailed),
                updated_utc = NOW()
            WHERE organization_id = $1 AND transaction_id = $2
            RETURNING transaction_id, organization_id, account_id, posted_date, amount, merchant_name, description, category_primary, category_detailed, import_hash, created_utc, updated_utc
            "#,
        )
        .bind(organization_id)
        .bind(transaction_id)
        .bind(input.posted_date)
        .bind(input.amount)
        .bind(&input.merchant_name)
        .bind(&input.description)
        .bind(&input.category_primary)
        .bind(&input.category_detailed)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update transaction: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

        timer.observe_duration();
        info!(transaction_id = %transaction.transaction_id, "Transaction updated");

        Ok(transaction)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, transaction_id = %transaction_id))]
    pub async fn delete_transaction(
        &self,
        organization_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_transaction"])
            .start_timer();

        let result = sqlx::query(
            "DELETE FROM transactions WHERE organization_id = $1 AND transaction_id = $2",
        )
        .bind(organization_id)
        .bind(transaction_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete transaction: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Transaction not found")));
        }

        timer.observe_duration();
        info!(transaction_id = %transaction_id, "Transaction deleted");

        Ok(())
    }

    /// Load engine views of transactions for a rule run, joined with their
    /// account type. Filters narrow the batch; `transaction_id` targets a
    /// single row.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_rule_targets(
        &self,
        organization_id: Uuid,
        account_id: Option<Uuid>,
        transaction_id: Option<Uuid>,
        uncategorized_only: bool,
    ) -> Result<Vec<TransactionView>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_rule_targets"])
            .start_timer();

        let rows = sqlx::query_as::<_, RuleTargetRow>(
            r#"
            SELECT t.transaction_id, t.account_id, a.account_type, t.posted_date, t.amount,
                   t.merchant_name, t.description, t.category_primary
            FROM transactions t
            JOIN accounts a ON a.account_id = t.account_id
            WHERE t.organization_id = $1
              AND ($2::uuid IS NULL OR t.account_id = $2)
              AND ($3::uuid IS NULL OR t.transaction_id = $3)
              AND (NOT $4 OR t.category_primary IS NULL)
            ORDER BY t.posted_date DESC, t.created_utc DESC, t.transaction_id DESC
            "#,
        )
        .bind(organization_id)
        .bind(account_id)
        .bind(transaction_id)
        .bind(uncategorized_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load rule targets: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows.into_iter().map(RuleTargetRow::into_view).collect())
    }

    // =========================================================================
    // Label Operations
    // =========================================================================

    #[instrument(skip(self), fields(organization_id = %organization_id, name = %name))]
    pub async fn create_label(
        &self,
        organization_id: Uuid,
        name: &str,
        color: Option<&str>,
    ) -> Result<Label, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_label"])
            .start_timer();

        let label = sqlx::query_as::<_, Label>(
            r#"
            INSERT INTO labels (label_id, organization_id, name, color)
            VALUES ($1, $2, $3, $4)
            RETURNING label_id, organization_id, name, color, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(name)
        .bind(color)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Label with this name already exists"))
            }
            e => AppError::DatabaseError(anyhow::anyhow!("Failed to create label: {}", e)),
        })?;

        timer.observe_duration();
        info!(label_id = %label.label_id, "Label created");

        Ok(label)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_labels(&self, organization_id: Uuid) -> Result<Vec<Label>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_labels"])
            .start_timer();

        let labels = sqlx::query_as::<_, Label>(
            "SELECT label_id, organization_id, name, color, created_utc FROM labels WHERE organization_id = $1 ORDER BY name",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list labels: {}", e)))?;

        timer.observe_duration();

        Ok(labels)
    }

    /// Delete a label; its transaction assignments cascade.
    #[instrument(skip(self), fields(organization_id = %organization_id, label_id = %label_id))]
    pub async fn delete_label(
        &self,
        organization_id: Uuid,
        label_id: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_label"])
            .start_timer();

        let result = sqlx::query("DELETE FROM labels WHERE organization_id = $1 AND label_id = $2")
            .bind(organization_id)
            .bind(label_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete label: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Label not found")));
        }

        timer.observe_duration();
        info!(label_id = %label_id, "Label deleted");

        Ok(())
    }

    /// Manually attach a label to a transaction (applied_by_rule_id stays
    /// NULL). Idempotent.
    #[instrument(skip(self), fields(organization_id = %organization_id, transaction_id = %transaction_id, label_id = %label_id))]
    pub async fn add_transaction_label(
        &self,
        organization_id: Uuid,
        transaction_id: Uuid,
        label_id: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_transaction_label"])
            .start_timer();

        self.get_transaction(organization_id, transaction_id).await?;

        let label_exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM labels WHERE organization_id = $1 AND label_id = $2",
        )
        .bind(organization_id)
        .bind(label_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to check label: {}", e)))?;

        if label_exists == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Label not found")));
        }

        sqlx::query(
            r#"
            INSERT INTO transaction_labels (transaction_id, label_id, applied_by_rule_id)
            VALUES ($1, $2, NULL)
            ON CONFLICT (transaction_id, label_id) DO NOTHING
            "#,
        )
        .bind(transaction_id)
        .bind(label_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to add label: {}", e)))?;

        timer.observe_duration();

        Ok(())
    }

    /// Detach a label from a transaction. Idempotent.
    #[instrument(skip(self), fields(organization_id = %organization_id, transaction_id = %transaction_id, label_id = %label_id))]
    pub async fn remove_transaction_label(
        &self,
        organization_id: Uuid,
        transaction_id: Uuid,
        label_id: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_transaction_label"])
            .start_timer();

        sqlx::query(
            r#"
            DELETE FROM transaction_labels
            WHERE transaction_id = $2 AND label_id = $3
              AND EXISTS (
                  SELECT 1 FROM transactions
                  WHERE organization_id = $1 AND transaction_id = $2
              )
            "#,
        )
        .bind(organization_id)
        .bind(transaction_id)
        .bind(label_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to remove label: {}", e)))?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, transaction_id = %transaction_id))]
    pub async fn list_transaction_labels(
        &self,
        organization_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Vec<Label>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_transaction_labels"])
            .start_timer();

        let labels = sqlx::query_as::<_, Label>(
            r#"
            SELECT l.label_id, l.organization_id, l.name, l.color, l.created_utc
            FROM labels l
            JOIN transaction_labels tl ON tl.label_id = l.label_id
            JOIN transactions t ON t.transaction_id = tl.transaction_id
            WHERE t.organization_id = $1 AND tl.transaction_id = $2
            ORDER BY l.name
            "#,
        )
        .bind(organization_id)
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list transaction labels: {}", e))
        })?;

        timer.observe_duration();

        Ok(labels)
    }

    // =========================================================================
    // Rule Operations
    // =========================================================================

    #[instrument(skip(self, input), fields(organization_id = %input.organization_id, name = %input.name))]
    pub async fn create_rule(&self, input: &CreateRule) -> Result<RuleWithParts, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_rule"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let rule = sqlx::query_as::<_, Rule>(
            r#"
            INSERT INTO rules (rule_id, organization_id, name, match_type, apply_to, priority, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING rule_id, organization_id, name, match_type, apply_to, priority, is_active, times_applied, last_applied_utc, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.organization_id)
        .bind(&input.name)
        .bind(&input.match_type)
        .bind(&input.apply_to)
        .bind(input.priority)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create rule: {}", e)))?;

        let mut conditions = Vec::with_capacity(input.conditions.len());
        for (position, condition) in input.conditions.iter().enumerate() {
            let row = sqlx::query_as::<_, RuleCondition>(
                r#"
                INSERT INTO rule_conditions (condition_id, rule_id, field, operator, value, value_max, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING condition_id, rule_id, field, operator, value, value_max, position
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(rule.rule_id)
            .bind(&condition.field)
            .bind(&condition.operator)
            .bind(&condition.value)
            .bind(&condition.value_max)
            .bind(position as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create rule condition: {}", e))
            })?;
            conditions.push(row);
        }

        let mut actions = Vec::with_capacity(input.actions.len());
        for (position, action) in input.actions.iter().enumerate() {
            let row = sqlx::query_as::<_, RuleAction>(
                r#"
                INSERT INTO rule_actions (action_id, rule_id, action_type, action_value, position)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING action_id, rule_id, action_type, action_value, position
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(rule.rule_id)
            .bind(&action.action_type)
            .bind(&action.action_value)
            .bind(position as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create rule action: {}", e))
            })?;
            actions.push(row);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(rule_id = %rule.rule_id, "Rule created");

        Ok(RuleWithParts {
            rule,
            conditions,
            actions,
        })
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, rule_id = %rule_id))]
    pub async fn get_rule(
        &self,
        organization_id: Uuid,
        rule_id: Uuid,
    ) -> Result<RuleWithParts, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_rule"])
            .start_timer();

        let rule = sqlx::query_as::<_, Rule>(
            r#"
            SELECT rule_id, organization_id, name, match_type, apply_to, priority, is_active, times_applied, last_applied_utc, created_utc, updated_utc
            FROM rules
            WHERE organization_id = $1 AND rule_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get rule: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Rule not found")))?;

        let conditions = sqlx::query_as::<_, RuleCondition>(
            "SELECT condition_id, rule_id, field, operator, value, value_max, position FROM rule_conditions WHERE rule_id = $1 ORDER BY position",
        )
        .bind(rule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get rule conditions: {}", e))
        })?;

        let actions = sqlx::query_as::<_, RuleAction>(
            "SELECT action_id, rule_id, action_type, action_value, position FROM rule_actions WHERE rule_id = $1 ORDER BY position",
        )
        .bind(rule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get rule actions: {}", e))
        })?;

        timer.observe_duration();

        Ok(RuleWithParts {
            rule,
            conditions,
            actions,
        })
    }

    /// Load all rules with their parts in engine order: priority DESC,
    /// then created_utc, then rule_id.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_rules(&self, organization_id: Uuid) -> Result<Vec<RuleWithParts>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_rules"])
            .start_timer();

        let rules = sqlx::query_as::<_, Rule>(
            r#"
            SELECT rule_id, organization_id, name, match_type, apply_to, priority, is_active, times_applied, last_applied_utc, created_utc, updated_utc
            FROM rules
            WHERE organization_id = $1
            ORDER BY priority DESC, created_utc ASC, rule_id ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list rules: {}", e)))?;

        let conditions = sqlx::query_as::<_, RuleCondition>(
            r#"
            SELECT rc.condition_id, rc.rule_id, rc.field, rc.operator, rc.value, rc.value_max, rc.position
            FROM rule_conditions rc
            JOIN rules r ON r.rule_id = rc.rule_id
            WHERE r.organization_id = $1
            ORDER BY rc.rule_id, rc.position
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list rule conditions: {}", e))
        })?;

        let actions = sqlx::query_as::<_, RuleAction>(
            r#"
            SELECT ra.action_id, ra.rule_id, ra.action_type, ra.action_value, ra.position
            FROM rule_actions ra
            JOIN rules r ON r.rule_id = ra.rule_id
            WHERE r.organization_id = $1
            ORDER BY ra.rule_id, ra.position
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list rule actions: {}", e))
        })?;

        let mut result: Vec<RuleWithParts> = rules
            .into_iter()
            .map(|rule| RuleWithParts {
                rule,
                conditions: Vec::new(),
                actions: Vec::new(),
            })
            .collect();
        for condition in conditions {
            if let Some(entry) = result.iter_mut().find(|r| r.rule.rule_id == condition.rule_id) {
                entry.conditions.push(condition);
            }
        }
        for action in actions {
            if let Some(entry) = result.iter_mut().find(|r| r.rule.rule_id == action.rule_id) {
                entry.actions.push(action);
            }
        }

        timer.observe_duration();

        Ok(result)
    }

    /// Patch a rule; Some conditions/actions replace the existing parts.
    #[instrument(skip(self, input), fields(organization_id = %organization_id, rule_id = %rule_id))]
    pub async fn update_rule(
        &self,
        organization_id: Uuid,
        rule_id: Uuid,
        input: &UpdateRule,
    ) -> Result<RuleWithParts, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_rule"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let rule = sqlx::query_as::<_, Rule>(
            r#"
            UPDATE rules
            SET name = COALESCE($3, name),
                match_type = COALESCE($4, match_type),
                apply_to = COALESCE($5, apply_to),
                priority = COALESCE($6, priority),
                is_active = COALESCE($7, is_active),
                updated_utc = NOW()
            WHERE organization_id = $1 AND rule_id = $2
            RETURNING rule_id, organization_id, name, match_type, apply_to, priority, is_active, times_applied, last_applied_utc, created_utc, updated_utc
            "#,
        )
        .bind(organization_id)
        .bind(rule_id)
        .bind(&input.name)
        .bind(&input.match_type)
        .bind(&input.apply_to)
        .bind(input.priority)
        .bind(input.is_active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update rule: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Rule not found")))?;

        if let Some(conditions) = &input.conditions {
            sqlx::query("DELETE FROM rule_conditions WHERE rule_id = $1")
                .bind(rule_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to replace conditions: {}", e))
                })?;
            for (position, condition) in conditions.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO rule_conditions (condition_id, rule_id, field, operator, value, value_max, position)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(rule_id)
                .bind(&condition.field)
                .bind(&condition.operator)
                .bind(&condition.value)
                .bind(&condition.value_max)
                .bind(position as i32)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to replace conditions: {}", e))
                })?;
            }
        }

        if let Some(actions) = &input.actions {
            sqlx::query("DELETE FROM rule_actions WHERE rule_id = $1")
                .bind(rule_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to replace actions: {}", e))
                })?;
            for (position, action) in actions.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO rule_actions (action_id, rule_id, action_type, action_value, position)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(rule_id)
                .bind(&action.action_type)
                .bind(&action.action_value)
                .bind(position as i32)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to replace actions: {}", e))
                })?;
            }
        }

        let conditions = sqlx::query_as::<_, RuleCondition>(
            "SELECT condition_id, rule_id, field, operator, value, value_max, position FROM rule_conditions WHERE rule_id = $1 ORDER BY position",
        )
        .bind(rule_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get rule conditions: {}", e))
        })?;

        let actions = sqlx::query_as::<_, RuleAction>(
            "SELECT action_id, rule_id, action_type, action_value, position FROM rule_actions WHERE rule_id = $1 ORDER BY position",
        )
        .bind(rule_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get rule actions: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(rule_id = %rule.rule_id, "Rule updated");

        Ok(RuleWithParts {
            rule,
            conditions,
            actions,
        })
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, rule_id = %rule_id))]
    pub async fn delete_rule(&self, organization_id: Uuid, rule_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_rule"])
            .start_timer();

        let result = sqlx::query("DELETE FROM rules WHERE organization_id = $1 AND rule_id = $2")
            .bind(organization_id)
            .bind(rule_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete rule: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Rule not found")));
        }

        timer.observe_duration();
        info!(rule_id = %rule_id, "Rule deleted");

        Ok(())
    }

    /// Persist an engine outcome: transaction patches, label changes and
    /// rule statistics, all in one database transaction.
    #[instrument(skip(self, outcome), fields(organization_id = %organization_id, matched = %outcome.matched()))]
    pub async fn apply_rule_outcome(
        &self,
        organization_id: Uuid,
        outcome: &EngineOutcome,
    ) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_rule_outcome"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        apply_outcome(&mut tx, organization_id, outcome)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to apply rule outcome: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            evaluated = outcome.evaluated,
            matched = outcome.matched(),
            "Rule outcome applied"
        );

        Ok(outcome.matched())
    }

    // =========================================================================
    // Budget Operations
    // =========================================================================

    #[instrument(skip(self), fields(organization_id = %organization_id, category = %category))]
    pub async fn create_budget(
        &self,
        organization_id: Uuid,
        category: &str,
        amount: Decimal,
    ) -> Result<Budget, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_budget"])
            .start_timer();

        let budget = sqlx::query_as::<_, Budget>(
            r#"
            INSERT INTO budgets (budget_id, organization_id, category, amount)
            VALUES ($1, $2, $3, $4)
            RETURNING budget_id, organization_id, category, amount, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(category)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Budget for this category already exists"))
            }
            e => AppError::DatabaseError(anyhow::anyhow!("Failed to create budget: {}", e)),
        })?;

        timer.observe_duration();
        info!(budget_id = %budget.budget_id, "Budget created");

        Ok(budget)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_budgets(&self, organization_id: Uuid) -> Result<Vec<Budget>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_budgets"])
            .start_timer();

        let budgets = sqlx::query_as::<_, Budget>(
            "SELECT budget_id, organization_id, category, amount, created_utc, updated_utc FROM budgets WHERE organization_id = $1 ORDER BY category",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list budgets: {}", e)))?;

        timer.observe_duration();

        Ok(budgets)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, budget_id = %budget_id))]
    pub async fn update_budget(
        &self,
        organization_id: Uuid,
        budget_id: Uuid,
        category: Option<&str>,
        amount: Option<Decimal>,
    ) -> Result<Budget, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_budget"])
            .start_timer();

        let budget = sqlx::query_as::<_, Budget>(
            r#"
            UPDATE budgets
            SET category = COALESCE($3, category),
                amount = COALESCE($4, amount),
                updated_utc = NOW()
            WHERE organization_id = $1 AND budget_id = $2
            RETURNING budget_id, organization_id, category, amount, created_utc, updated_utc
            "#,
        )
        .bind(organization_id)
        .bind(budget_id)
        .bind(category)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Budget for this category already exists"))
            }
            e => AppError::DatabaseError(anyhow::anyhow!("Failed to update budget: {}", e)),
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Budget not found")))?;

        timer.observe_duration();
        info!(budget_id = %budget.budget_id, "Budget updated");

        Ok(budget)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, budget_id = %budget_id))]
    pub async fn delete_budget(
        &self,
        organization_id: Uuid,
        budget_id: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_budget"])
            .start_timer();

        let result =
            sqlx::query("DELETE FROM budgets WHERE organization_id = $1 AND budget_id = $2")
                .bind(organization_id)
                .bind(budget_id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to delete budget: {}", e))
                })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Budget not found")));
        }

        timer.observe_duration();
        info!(budget_id = %budget_id, "Budget deleted");

        Ok(())
    }

    /// Sum spending per category over a date window. Only expenses count:
    /// negative amounts, reported as positive spend.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn category_spend(
        &self,
        organization_id: Uuid,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<CategorySpend>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["category_spend"])
            .start_timer();

        let spend = sqlx::query_as::<_, CategorySpend>(
            r#"
            SELECT category_primary AS category, SUM(-amount) AS spent
            FROM transactions
            WHERE organization_id = $1
              AND amount < 0
              AND category_primary IS NOT NULL
              AND posted_date >= $2
              AND posted_date <= $3
            GROUP BY category_primary
            "#,
        )
        .bind(organization_id)
        .bind(from_date)
        .bind(to_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to compute category spend: {}", e))
        })?;

        timer.observe_duration();

        Ok(spend)
    }

    // =========================================================================
    // Savings Goal Operations
    // =========================================================================

    #[instrument(skip(self), fields(organization_id = %organization_id, name = %name))]
    pub async fn create_goal(
        &self,
        organization_id: Uuid,
        name: &str,
        target_amount: Decimal,
        target_date: Option<NaiveDate>,
    ) -> Result<SavingsGoal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_goal"])
            .start_timer();

        let goal = sqlx::query_as::<_, SavingsGoal>(
            r#"
            INSERT INTO savings_goals (goal_id, organization_id, name, target_amount, current_amount, target_date)
            VALUES ($1, $2, $3, $4, 0, $5)
            RETURNING goal_id, organization_id, name, target_amount, current_amount, target_date, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(name)
        .bind(target_amount)
        .bind(target_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create goal: {}", e)))?;

        timer.observe_duration();
        info!(goal_id = %goal.goal_id, "Savings goal created");

        Ok(goal)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_goals(&self, organization_id: Uuid) -> Result<Vec<SavingsGoal>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_goals"])
            .start_timer();

        let goals = sqlx::query_as::<_, SavingsGoal>(
            "SELECT goal_id, organization_id, name, target_amount, current_amount, target_date, created_utc, updated_utc FROM savings_goals WHERE organization_id = $1 ORDER BY created_utc",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list goals: {}", e)))?;

        timer.observe_duration();

        Ok(goals)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, goal_id = %goal_id))]
    pub async fn get_goal(
        &self,
        organization_id: Uuid,
        goal_id: Uuid,
    ) -> Result<SavingsGoal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_goal"])
            .start_timer();

        let goal = sqlx::query_as::<_, SavingsGoal>(
            "SELECT goal_id, organization_id, name, target_amount, current_amount, target_date, created_utc, updated_utc FROM savings_goals WHERE organization_id = $1 AND goal_id = $2",
        )
        .bind(organization_id)
        .bind(goal_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get goal: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Savings goal not found")))?;

        timer.observe_duration();

        Ok(goal)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, goal_id = %goal_id))]
    pub async fn update_goal(
        &self,
        organization_id: Uuid,
        goal_id: Uuid,
        name: Option<&str>,
        target_amount: Option<Decimal>,
        current_amount: Option<Decimal>,
        target_date: Option<NaiveDate>,
    ) -> Result<SavingsGoal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_goal"])
            .start_timer();

        let goal = sqlx::query_as::<_, SavingsGoal>(
            r#"
            UPDATE savings_goals
            SET name = COALESCE($3, name),
                target_amount = COALESCE($4, target_amount),
                current_amount = COALESCE($5, current_amount),
                target_date = COALESCE($6, target_date),
                updated_utc = NOW()
            WHERE organization_id = $1 AND goal_id = $2
            RETURNING goal_id, organization_id, name, target_amount, current_amount, target_date, created_utc, updated_utc
            "#,
        )
        .bind(organization_id)
        .bind(goal_id)
        .bind(name)
        .bind(target_amount)
        .bind(current_amount)
        .bind(target_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update goal: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Savings goal not found")))?;

        timer.observe_duration();
        info!(goal_id = %goal.goal_id, "Savings goal updated");

        Ok(goal)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, goal_id = %goal_id))]
    pub async fn delete_goal(&self, organization_id: Uuid, goal_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_goal"])
            .start_timer();

        let result =
            sqlx::query("DELETE FROM savings_goals WHERE organization_id = $1 AND goal_id = $2")
                .bind(organization_id)
                .bind(goal_id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to delete goal: {}", e))
                })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Savings goal not found")));
        }

        timer.observe_duration();
        info!(goal_id = %goal_id, "Savings goal deleted");

        Ok(())
    }

    /// Add a contribution. The second return value is true when this
    /// contribution pushed the goal over its target for the first time.
    #[instrument(skip(self), fields(organization_id = %organization_id, goal_id = %goal_id, amount = %amount))]
    pub async fn add_goal_contribution(
        &self,
        organization_id: Uuid,
        goal_id: Uuid,
        amount: Decimal,
    ) -> Result<(SavingsGoal, bool), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_goal_contribution"])
            .start_timer();

        let goal = sqlx::query_as::<_, SavingsGoal>(
            r#"
            UPDATE savings_goals
            SET current_amount = current_amount + $3, updated_utc = NOW()
            WHERE organization_id = $1 AND goal_id = $2
            RETURNING goal_id, organization_id, name, target_amount, current_amount, target_date, created_utc, updated_utc
            "#,
        )
        .bind(organization_id)
        .bind(goal_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to add contribution: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Savings goal not found")))?;

        let newly_reached =
            goal.current_amount - amount < goal.target_amount && goal.is_reached();

        timer.observe_duration();
        info!(
            goal_id = %goal.goal_id,
            current_amount = %goal.current_amount,
            "Contribution added"
        );

        Ok((goal, newly_reached))
    }

    // =========================================================================
    // Holding Operations
    // =========================================================================

    #[instrument(skip(self), fields(organization_id = %organization_id, symbol = %symbol))]
    pub async fn create_holding(
        &self,
        organization_id: Uuid,
        account_id: Option<Uuid>,
        symbol: &str,
        quantity: Decimal,
        average_cost: Decimal,
        last_price: Decimal,
    ) -> Result<Holding, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_holding"])
            .start_timer();

        if let Some(account_id) = account_id {
            let account = self.get_account(organization_id, account_id).await?;
            if account.account_type != AccountType::Investment.as_str() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Holdings can only be attached to investment accounts"
                )));
            }
        }

        let holding = sqlx::query_as::<_, Holding>(
            r#"
            INSERT INTO holdings (holding_id, organization_id, account_id, symbol, quantity, average_cost, last_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING holding_id, organization_id, account_id, symbol, quantity, average_cost, last_price, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(account_id)
        .bind(symbol)
        .bind(quantity)
        .bind(average_cost)
        .bind(last_price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Holding for this symbol already exists"))
            }
            e => AppError::DatabaseError(anyhow::anyhow!("Failed to create holding: {}", e)),
        })?;

        timer.observe_duration();
        info!(holding_id = %holding.holding_id, "Holding created");

        Ok(holding)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_holdings(&self, organization_id: Uuid) -> Result<Vec<Holding>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_holdings"])
            .start_timer();

        let holdings = sqlx::query_as::<_, Holding>(
            "SELECT holding_id, organization_id, account_id, symbol, quantity, average_cost, last_price, created_utc, updated_utc FROM holdings WHERE organization_id = $1 ORDER BY symbol",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list holdings: {}", e)))?;

        timer.observe_duration();

        Ok(holdings)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, holding_id = %holding_id))]
    pub async fn update_holding(
        &self,
        organization_id: Uuid,
        holding_id: Uuid,
        quantity: Option<Decimal>,
        average_cost: Option<Decimal>,
        last_price: Option<Decimal>,
    ) -> Result<Holding, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_holding"])
            .start_timer();

        let holding = sqlx::query_as::<_, Holding>(
            r#"
            UPDATE holdings
            SET quantity = COALESCE($3, quantity),
                average_cost = COALESCE($4, average_cost),
                last_price = COALESCE($5, last_price),
                updated_utc = NOW()
            WHERE organization_id = $1 AND holding_id = $2
            RETURNING holding_id, organization_id, account_id, symbol, quantity, average_cost, last_price, created_utc, updated_utc
            "#,
        )
        .bind(organization_id)
        .bind(holding_id)
        .bind(quantity)
        .bind(average_cost)
        .bind(last_price)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update holding: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Holding not found")))?;

        timer.observe_duration();
        info!(holding_id = %holding.holding_id, "Holding updated");

        Ok(holding)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, holding_id = %holding_id))]
    pub async fn delete_holding(
        &self,
        organization_id: Uuid,
        holding_id: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_holding"])
            .start_timer();

        let result =
            sqlx::query("DELETE FROM holdings WHERE organization_id = $1 AND holding_id = $2")
                .bind(organization_id)
                .bind(holding_id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to delete holding: {}", e))
                })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Holding not found")));
        }

        timer.observe_duration();
        info!(holding_id = %holding_id, "Holding deleted");

        Ok(())
    }

    // =========================================================================
    // Net Worth Snapshot Operations
    // =========================================================================

    /// Capture net worth from current active account balances: assets from
    /// asset-type accounts (signed), liabilities from debt-type accounts
    /// (magnitude), with a per-type breakdown stored alongside.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn create_snapshot(
        &self,
        organization_id: Uuid,
    ) -> Result<NetWorthSnapshot, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_snapshot"])
            .start_timer();

        let totals = sqlx::query_as::<_, (String, Decimal)>(
            r#"
            SELECT account_type, COALESCE(SUM(balance), 0)
            FROM accounts
            WHERE organization_id = $1 AND is_active = TRUE
            GROUP BY account_type
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum account balances: {}", e))
        })?;

        let mut assets = Decimal::ZERO;
        let mut liabilities = Decimal::ZERO;
        let mut detail = serde_json::Map::new();
        for (type_str, total) in totals {
            let is_debt = AccountType::from_str(&type_str)
                .map(|t| t.is_debt())
                .unwrap_or(false);
            if is_debt {
                liabilities += total.abs();
            } else {
                assets += total;
            }
            detail.insert(type_str, serde_json::json!(total));
        }
        let net_worth = assets - liabilities;

        let snapshot = sqlx::query_as::<_, NetWorthSnapshot>(
            r#"
            INSERT INTO net_worth_snapshots (snapshot_id, organization_id, assets, liabilities, net_worth, detail)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING snapshot_id, organization_id, captured_utc, assets, liabilities, net_worth, detail
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(assets)
        .bind(liabilities)
        .bind(net_worth)
        .bind(serde_json::Value::Object(detail))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create snapshot: {}", e))
        })?;

        timer.observe_duration();
        info!(
            snapshot_id = %snapshot.snapshot_id,
            net_worth = %snapshot.net_worth,
            "Net worth snapshot captured"
        );

        Ok(snapshot)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_snapshots(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<NetWorthSnapshot>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_snapshots"])
            .start_timer();

        let snapshots = sqlx::query_as::<_, NetWorthSnapshot>(
            r#"
            SELECT snapshot_id, organization_id, captured_utc, assets, liabilities, net_worth, detail
            FROM net_worth_snapshots
            WHERE organization_id = $1
            ORDER BY captured_utc DESC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list snapshots: {}", e)))?;

        timer.observe_duration();

        Ok(snapshots)
    }

    // =========================================================================
    // Notification Operations
    // =========================================================================

    /// Create a notification unless its dedup key already exists; returns
    /// None when deduplicated.
    #[instrument(skip(self, detail), fields(organization_id = %organization_id, kind = %kind.as_str()))]
    pub async fn create_notification(
        &self,
        organization_id: Uuid,
        kind: NotificationKind,
        message: &str,
        detail: Option<serde_json::Value>,
        dedup_key: Option<&str>,
    ) -> Result<Option<Notification>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_notification"])
            .start_timer();

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (notification_id, organization_id, kind, message, detail, dedup_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (organization_id, dedup_key) WHERE dedup_key IS NOT NULL DO NOTHING
            RETURNING notification_id, organization_id, kind, message, detail, dedup_key, read_utc, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(kind.as_str())
        .bind(message)
        .bind(detail)
        .bind(dedup_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create notification: {}", e))
        })?;

        timer.observe_duration();
        if let Some(notification) = &notification {
            info!(notification_id = %notification.notification_id, "Notification created");
        }

        Ok(notification)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_notifications(
        &self,
        organization_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_notifications"])
            .start_timer();

        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT notification_id, organization_id, kind, message, detail, dedup_key, read_utc, created_utc
            FROM notifications
            WHERE organization_id = $1 AND (NOT $2 OR read_utc IS NULL)
            ORDER BY created_utc DESC
            "#,
        )
        .bind(organization_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list notifications: {}", e))
        })?;

        timer.observe_duration();

        Ok(notifications)
    }

    /// Mark as read; repeat calls keep the original read timestamp.
    #[instrument(skip(self), fields(organization_id = %organization_id, notification_id = %notification_id))]
    pub async fn mark_notification_read(
        &self,
        organization_id: Uuid,
        notification_id: Uuid,
    ) -> Result<Notification, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_notification_read"])
            .start_timer();

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET read_utc = COALESCE(read_utc, NOW())
            WHERE organization_id = $1 AND notification_id = $2
            RETURNING notification_id, organization_id, kind, message, detail, dedup_key, read_utc, created_utc
            "#,
        )
        .bind(organization_id)
        .bind(notification_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark notification read: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Notification not found")))?;

        timer.observe_duration();

        Ok(notification)
    }

    // =========================================================================
    // Debt Operations
    // =========================================================================

    /// Active accounts with a debt account_type, for the payoff planner.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_debt_accounts(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Account>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_debt_accounts"])
            .start_timer();

        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, organization_id, name, account_type, balance, currency, interest_rate, minimum_payment, is_active, created_utc, updated_utc
            FROM accounts
            WHERE organization_id = $1
              AND is_active = TRUE
              AND account_type IN ('credit_card', 'loan', 'student_loan', 'mortgage')
            ORDER BY name
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list debt accounts: {}", e))
        })?;

        timer.observe_duration();

        Ok(accounts)
    }
}

/// Row shape for rule-target loading: a transaction joined with its
/// account's type.
#[derive(FromRow)]
struct RuleTargetRow {
    transaction_id: Uuid,
    account_id: Uuid,
    account_type: String,
    posted_date: NaiveDate,
    amount: Decimal,
    merchant_name: Option<String>,
    description: Option<String>,
    category_primary: Option<String>,
}

impl RuleTargetRow {
    fn into_view(self) -> TransactionView {
        TransactionView {
            transaction_id: self.transaction_id,
            account_id: self.account_id,
            account_type: AccountType::from_str(&self.account_type),
            posted_date: self.posted_date,
            amount: self.amount,
            merchant_name: self.merchant_name,
            description: self.description,
            category_primary: self.category_primary,
        }
    }
}

/// Apply patches, label changes and rule statistics inside the caller's
/// transaction. Label inserts go through a SELECT on labels so a patch can
/// never attach another organization's label.
async fn apply_outcome(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    organization_id: Uuid,
    outcome: &EngineOutcome,
) -> Result<(), sqlx::Error> {
    for patch in &outcome.patches {
        if patch.category.is_some() || patch.merchant_name.is_some() {
            sqlx::query(
                r#"
                UPDATE transactions
                SET category_primary = COALESCE($3, category_primary),
                    merchant_name = COALESCE($4, merchant_name),
                    updated_utc = NOW()
                WHERE organization_id = $1 AND transaction_id = $2
                "#,
            )
            .bind(organization_id)
            .bind(patch.transaction_id)
            .bind(&patch.category)
            .bind(&patch.merchant_name)
            .execute(&mut **tx)
            .await?;
        }

        for label_id in &patch.add_labels {
            sqlx::query(
                r#"
                INSERT INTO transaction_labels (transaction_id, label_id, applied_by_rule_id)
                SELECT $1, label_id, $3 FROM labels
                WHERE label_id = $2 AND organization_id = $4
                ON CONFLICT (transaction_id, label_id) DO NOTHING
                "#,
            )
            .bind(patch.transaction_id)
            .bind(label_id)
            .bind(patch.rule_id)
            .bind(organization_id)
            .execute(&mut **tx)
            .await?;
        }

        for label_id in &patch.remove_labels {
            sqlx::query(
                "DELETE FROM transaction_labels WHERE transaction_id = $1 AND label_id = $2",
            )
            .bind(patch.transaction_id)
            .bind(label_id)
            .execute(&mut **tx)
            .await?;
        }
    }

    for hit in outcome.rule_hits.iter().filter(|h| h.matched > 0) {
        sqlx::query(
            r#"
            UPDATE rules
            SET times_applied = times_applied + $3, last_applied_utc = NOW(), updated_utc = NOW()
            WHERE organization_id = $1 AND rule_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(hit.rule_id)
        .bind(hit.matched as i64)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
