//! Income accounting
//!
//! Income is the difference between the granter's balance right after and
//! right before a withdrawal, kept per denomination and in smallest units.

pub mod calculator;
pub mod record;

pub use calculator::{calculate_income, Income};
pub use record::IncomeRecord;
