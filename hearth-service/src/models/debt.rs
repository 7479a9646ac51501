//! Debt projection view for hearth-service.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Account, AccountType};

/// Read-only projection of a debt-type account as the payoff planner sees
/// it: balance as a positive magnitude, rate and minimum defaulted to zero
/// when unset. Recomputed per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtAccount {
    pub account_id: Uuid,
    pub name: String,
    pub account_type: String,
    pub balance: Decimal,
    pub interest_rate: Decimal,
    pub minimum_payment: Decimal,
}

impl DebtAccount {
    /// Project an account into the debt view. Non-debt account types
    /// return None.
    pub fn from_account(account: &Account) -> Option<Self> {
        let account_type = AccountType::from_str(&account.account_type)?;
        if !account_type.is_debt() {
            return None;
        }
        Some(Self {
            account_id: account.account_id,
            name: account.name.clone(),
            account_type: account.account_type.clone(),
            balance: account.balance.abs(),
            interest_rate: account.interest_rate.unwrap_or(Decimal::ZERO),
            minimum_payment: account.minimum_payment.unwrap_or(Decimal::ZERO),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn account(account_type: &str, balance: &str) -> Account {
        Account {
            account_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "test".to_string(),
            account_type: account_type.to_string(),
            balance: Decimal::from_str(balance).unwrap(),
            currency: "USD".to_string(),
            interest_rate: None,
            minimum_payment: None,
            is_active: true,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[test]
    fn only_debt_types_project() {
        assert!(DebtAccount::from_account(&account("credit_card", "500")).is_some());
        assert!(DebtAccount::from_account(&account("mortgage", "250000")).is_some());
        assert!(DebtAccount::from_account(&account("checking", "500")).is_none());
        assert!(DebtAccount::from_account(&account("bogus", "500")).is_none());
    }

    #[test]
    fn balance_is_taken_as_magnitude_and_nulls_default_to_zero() {
        let debt = DebtAccount::from_account(&account("loan", "-1200.50")).unwrap();
        assert_eq!(debt.balance, Decimal::from_str("1200.50").unwrap());
        assert_eq!(debt.interest_rate, Decimal::ZERO);
        assert_eq!(debt.minimum_payment, Decimal::ZERO);
    }
}
