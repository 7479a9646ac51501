//! Services module for hearth-service.

pub mod database;
pub mod metrics;
pub mod payoff;
pub mod rules;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
