//! hearth-core: Shared infrastructure for the hearth finance backend.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
