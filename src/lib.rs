//! Valin - validator income harvester
//!
//! Periodically withdraws staking rewards and validator commission on
//! Cosmos SDK networks through an authz grant, records the resulting
//! per-denomination income, and serves the records over HTTP.

pub mod api;
pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod harvest;
pub mod income;
pub mod ledger;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
