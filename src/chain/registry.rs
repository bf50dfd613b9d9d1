//! Immutable chain_id → client mapping built once at startup

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::chain::client::CosmosClient;
use crate::chain::ChainClient;
use crate::config::Config;
use crate::error::{Error, Result};

/// Clients for every configured network, keyed by chain id
#[derive(Clone, Default)]
pub struct ChainRegistry {
    clients: BTreeMap<String, Arc<dyn ChainClient>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a [`CosmosClient`] for every network in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();
        for network in &config.networks {
            let client = CosmosClient::new(network, &config.keyring, &config.rpc)?;
            registry = registry.with_client(&network.chain_id, Arc::new(client));
            info!(
                "Initialized client for {} ({}) using key '{}'",
                network.chain_name,
                network.chain_id,
                network.key_name()
            );
        }
        Ok(registry)
    }

    /// Add or replace the client for `chain_id`
    pub fn with_client(mut self, chain_id: &str, client: Arc<dyn ChainClient>) -> Self {
        self.clients.insert(chain_id.to_string(), client);
        self
    }

    pub fn get(&self, chain_id: &str) -> Result<Arc<dyn ChainClient>> {
        self.clients
            .get(chain_id)
            .cloned()
            .ok_or_else(|| Error::UnknownNetwork(chain_id.to_string()))
    }

    pub fn chain_ids(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
