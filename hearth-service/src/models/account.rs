//! Account model for hearth-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of financial account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
    Cash,
    Investment,
    CreditCard,
    Loan,
    StudentLoan,
    Mortgage,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::Cash => "cash",
            AccountType::Investment => "investment",
            AccountType::CreditCard => "credit_card",
            AccountType::Loan => "loan",
            AccountType::StudentLoan => "student_loan",
            AccountType::Mortgage => "mortgage",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "checking" => Some(AccountType::Checking),
            "savings" => Some(AccountType::Savings),
            "cash" => Some(AccountType::Cash),
            "investment" => Some(AccountType::Investment),
            "credit_card" => Some(AccountType::CreditCard),
            "loan" => Some(AccountType::Loan),
            "student_loan" => Some(AccountType::StudentLoan),
            "mortgage" => Some(AccountType::Mortgage),
            _ => None,
        }
    }

    /// Whether balances of this type count as liabilities.
    pub fn is_debt(&self) -> bool {
        matches!(
            self,
            AccountType::CreditCard
                | AccountType::Loan
                | AccountType::StudentLoan
                | AccountType::Mortgage
        )
    }
}

/// A bank, cash, investment or debt account belonging to an organization.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
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

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub organization_id: Uuid,
    pub name: String,
    pub account_type: String,
    pub balance: Decimal,
    pub currency: String,
    pub interest_rate: Option<Decimal>,
    pub minimum_payment: Option<Decimal>,
}

/// Input for updating an account. None fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateAccount {
    pub name: Option<String>,
    pub balance: Option<Decimal>,
    pub interest_rate: Option<Decimal>,
    pub minimum_payment: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_type_round_trips_through_strings() {
        for s in [
            "checking",
            "savings",
            "cash",
            "investment",
            "credit_card",
            "loan",
            "student_loan",
            "mortgage",
        ] {
            let parsed = AccountType::from_str(s).expect("known type");
            assert_eq!(parsed.as_str(), s);
        }
        assert!(AccountType::from_str("brokerage").is_none());
    }

    #[test]
    fn debt_types_are_the_four_liability_kinds() {
        assert!(AccountType::CreditCard.is_debt());
        assert!(AccountType::Loan.is_debt());
        assert!(AccountType::StudentLoan.is_debt());
        assert!(AccountType::Mortgage.is_debt());
        assert!(!AccountType::Checking.is_debt());
        assert!(!AccountType::Savings.is_debt());
        assert!(!AccountType::Investment.is_debt());
        assert!(!AccountType::Cash.is_debt());
    }
}
