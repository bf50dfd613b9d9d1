//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bech32::{Bech32, Hrp};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use valin::chain::{Balance, ChainClient, WithdrawalResult, WithdrawalTx};
use valin::config::NetworkConfig;
use valin::{Error, Result};

pub fn address(prefix: &str, seed: u8) -> String {
    let hrp = Hrp::parse(prefix).unwrap();
    bech32::encode::<Bech32>(hrp, &[seed; 20]).unwrap()
}

pub fn network(chain_id: &str, prefix: &str) -> NetworkConfig {
    NetworkConfig {
        chain_name: chain_id.to_string(),
        chain_id: chain_id.to_string(),
        granter: address(prefix, 1),
        grantee: address(prefix, 2),
        fee_payer: address(prefix, 3),
        validator: address(&format!("{}valoper", prefix), 1),
        node: "https://rpc.example.com:443".to_string(),
        lcd: "https://rest.example.com".to_string(),
        account_prefix: prefix.to_string(),
        key_name: None,
        binary: "gaiad".to_string(),
        fees: "200uatom".to_string(),
        gas: 300_000,
    }
}

pub fn balance(coins: &[(&str, u128)]) -> Balance {
    coins.iter().map(|(d, a)| (*d, *a)).collect()
}

/// Chain client that answers balance queries from a script
pub struct ScriptedChain {
    balances: Mutex<VecDeque<Result<Balance>>>,
    pub broadcasts: AtomicUsize,
    pub queries: AtomicUsize,
}

impl ScriptedChain {
    pub fn new(balances: Vec<Result<Balance>>) -> Self {
        Self {
            balances: Mutex::new(balances.into()),
            broadcasts: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    /// Pre and post snapshots of a successful cycle
    pub fn rewarding(before: Balance, after: Balance) -> Self {
        Self::new(vec![Ok(before), Ok(after)])
    }

    pub fn unreachable() -> Self {
        Self::new(vec![Err(Error::Query("connection refused".into()))])
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn query_balance(&self, _address: &str) -> Result<Balance> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.balances
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Query("script exhausted".into())))
    }

    async fn broadcast_withdrawal(&self, tx: &WithdrawalTx) -> Result<WithdrawalResult> {
        self.broadcasts.fetch_add(1, Ordering::SeqCst);
        Ok(WithdrawalResult {
            tx_hash: format!("HASH-{}", tx.chain_id),
            code: 0,
            raw_log: "[]".to_string(),
            height: 100,
            gas_used: 120_000,
        })
    }
}
