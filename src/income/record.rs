//! Persisted income record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::balance::Balance;
use crate::income::calculator::{calculate_income, Income};

/// Income measured by one harvest cycle on one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeRecord {
    pub chain_id: String,
    pub granter: String,
    pub old_balance: Balance,
    pub income: Income,
    pub new_balance: Balance,
    pub date: DateTime<Utc>,
}

impl IncomeRecord {
    /// Build a record from the snapshots around a withdrawal
    pub fn new(
        chain_id: impl Into<String>,
        granter: impl Into<String>,
        old_balance: Balance,
        new_balance: Balance,
        date: DateTime<Utc>,
    ) -> Self {
        let income = calculate_income(&old_balance, &new_balance);
        Self {
            chain_id: chain_id.into(),
            granter: granter.into(),
            old_balance,
            income,
            new_balance,
            date,
        }
    }
}
