//! Production chain client: LCD for queries, chain binary for transactions
//!
//! A withdrawal only counts once it is in a block: the broadcast is followed
//! by LCD lookups of its hash until inclusion or `rpc.broadcast_timeout_ms`.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::chain::authz::WithdrawalTx;
use crate::chain::balance::Balance;
use crate::chain::broadcast::{CliBroadcaster, WithdrawalResult};
use crate::chain::lcd::{LcdClient, TX_POLL_INTERVAL};
use crate::chain::ChainClient;
use crate::config::{KeyringConfig, NetworkConfig, RpcConfig};
use crate::error::{Error, Result};

/// Client for one Cosmos SDK network
pub struct CosmosClient {
    chain_id: String,
    lcd: LcdClient,
    broadcaster: CliBroadcaster,
    inclusion_timeout: Duration,
    poll_interval: Duration,
}

impl CosmosClient {
    pub fn new(network: &NetworkConfig, keyring: &KeyringConfig, rpc: &RpcConfig) -> Result<Self> {
        let lcd = LcdClient::new(&network.lcd, Duration::from_millis(rpc.timeout_ms))?;

        let broadcaster = CliBroadcaster {
            binary: network.binary.clone(),
            chain_id: network.chain_id.clone(),
            node: network.node.clone(),
            key_name: network.key_name(),
            keyring_backend: keyring.backend.clone(),
            keyring_dir: PathBuf::from(&keyring.dir),
            timeout: Duration::from_millis(rpc.broadcast_timeout_ms),
        };

        Ok(Self {
            chain_id: network.chain_id.clone(),
            lcd,
            broadcaster,
            inclusion_timeout: Duration::from_millis(rpc.broadcast_timeout_ms),
            poll_interval: TX_POLL_INTERVAL,
        })
    }

    /// Override the pause between inclusion lookups
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl ChainClient for CosmosClient {
    async fn query_balance(&self, address: &str) -> Result<Balance> {
        self.lcd.balances(address).await
    }

    async fn broadcast_withdrawal(&self, tx: &WithdrawalTx) -> Result<WithdrawalResult> {
        if tx.chain_id != self.chain_id {
            return Err(Error::Broadcast(format!(
                "Withdrawal for {} sent to the {} client",
                tx.chain_id, self.chain_id
            )));
        }
        let submitted = self.broadcaster.broadcast(tx).await?;
        let included = self
            .lcd
            .wait_for_tx(&submitted.tx_hash, self.inclusion_timeout, self.poll_interval)
            .await?;
        info!(
            "Withdrawal included on {}: tx {} (height {}, gas {})",
            self.chain_id, included.tx_hash, included.height, included.gas_used
        );
        Ok(included)
    }
}
