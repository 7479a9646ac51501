//! Hearth Service - Household finance backend: accounts, budgets, goals,
//! debt payoff planning and rule-based transaction categorization.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
