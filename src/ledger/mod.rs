//! Income ledger - append-only storage of income records
//!
//! Records are written once per successful harvest and never updated.
//! Reads return records ordered by date ascending (insertion order breaks ties).

use async_trait::async_trait;

use crate::error::Result;
use crate::income::IncomeRecord;

pub mod sqlite;

pub use sqlite::SqliteLedger;

#[async_trait]
pub trait IncomeLedger: Send + Sync {
    /// Insert one record; a failed insert writes nothing
    async fn append(&self, record: &IncomeRecord) -> Result<()>;

    /// Every record, oldest first. An empty ledger yields an empty vec.
    async fn list_all(&self) -> Result<Vec<IncomeRecord>>;

    /// Records for one network, oldest first
    async fn list_by_chain(&self, chain_id: &str) -> Result<Vec<IncomeRecord>>;
}
