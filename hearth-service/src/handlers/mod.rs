//! HTTP handlers for hearth-service.

pub mod accounts;
pub mod budgets;
pub mod debts;
pub mod goals;
pub mod holdings;
pub mod labels;
pub mod notifications;
pub mod rules;
pub mod snapshots;
pub mod transactions;

pub use accounts::*;
pub use budgets::*;
pub use debts::*;
pub use goals::*;
pub use holdings::*;
pub use labels::*;
pub use notifications::*;
pub use rules::*;
pub use snapshots::*;
pub use transactions::*;
