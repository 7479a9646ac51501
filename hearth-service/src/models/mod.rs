//! Domain models for hearth-service.

mod account;
mod budget;
mod debt;
mod goal;
mod holding;
mod label;
mod notification;
mod rule;
mod snapshot;
mod transaction;

pub use account::{Account, AccountType, CreateAccount, UpdateAccount};
pub use budget::{Budget, BudgetStatus, CategorySpend};
pub use debt::DebtAccount;
pub use goal::SavingsGoal;
pub use holding::Holding;
pub use label::Label;
pub use notification::{Notification, NotificationKind};
pub use rule::{
    ActionKind, ConditionField, ConditionOperator, CreateRule, MatchType, Rule, RuleAction,
    RuleActionInput, RuleCondition, RuleConditionInput, RuleScope, RuleWithParts, UpdateRule,
};
pub use snapshot::NetWorthSnapshot;
pub use transaction::{
    CreateTransaction, ImportRecord, ListTransactionsFilter, Transaction, TransactionView,
    UpdateTransaction,
};
