//! Chain access - balance queries and authz withdrawal transactions
//!
//! The rest of the crate only talks to a chain through [`ChainClient`]:
//!
//! ```text
//! ChainRegistry (chain_id -> ChainClient)
//!        │
//!        ├── query_balance        → LcdClient (REST)
//!        └── broadcast_withdrawal → CliBroadcaster (chain binary signs + broadcasts)
//! ```
//!
//! Signing and the wire protocol stay with the chain's own tooling.

use async_trait::async_trait;

use crate::error::Result;

pub mod address;
pub mod authz;
pub mod balance;
pub mod broadcast;
pub mod client;
pub mod lcd;
pub mod registry;

pub use authz::{build_withdrawal, WithdrawalTx};
pub use balance::{Balance, Coin};
pub use broadcast::{CliBroadcaster, WithdrawalResult};
pub use client::CosmosClient;
pub use lcd::LcdClient;
pub use registry::ChainRegistry;

/// Capability a harvest cycle needs from one network
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Full multi-denomination balance of `address`
    async fn query_balance(&self, address: &str) -> Result<Balance>;

    /// Sign and broadcast an already validated withdrawal transaction
    async fn broadcast_withdrawal(&self, tx: &WithdrawalTx) -> Result<WithdrawalResult>;
}
