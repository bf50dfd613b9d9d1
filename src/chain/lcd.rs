//! LCD (REST) client for bank balance queries and transaction lookups

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::chain::balance::{Balance, Coin};
use crate::chain::broadcast::{string_or_number, WithdrawalResult};
use crate::error::{Error, Result};

/// Upper bound on pages followed for one balance query
const MAX_PAGES: usize = 100;

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    balances: Vec<Coin>,
    #[serde(default)]
    pagination: Option<PageResponse>,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    next_key: Option<String>,
}

/// Pause between transaction inclusion lookups
pub const TX_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct GetTxResponse {
    tx_response: TxResult,
}

/// Execution result of a transaction as reported by `GetTx`
#[derive(Debug, Deserialize)]
struct TxResult {
    txhash: String,
    #[serde(default, deserialize_with = "string_or_number")]
    height: u64,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    codespace: String,
    #[serde(default)]
    raw_log: String,
    #[serde(default, deserialize_with = "string_or_number")]
    gas_used: u64,
}

/// REST client bound to one network's LCD endpoint
#[derive(Debug, Clone)]
pub struct LcdClient {
    client: Client,
    base: Url,
}

impl LcdClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("Invalid LCD endpoint '{}': {}", endpoint, e)))?;
        // Url::join replaces the last path segment unless the base ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base })
    }

    /// Query every denomination held by `address`, following pagination
    pub async fn balances(&self, address: &str) -> Result<Balance> {
        let url = self
            .base
            .join(&format!("cosmos/bank/v1beta1/balances/{}", address))
            .map_err(|e| Error::Query(format!("Invalid balance URL for {}: {}", address, e)))?;

        let mut coins = Vec::new();
        let mut page_key: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut request = self.client.get(url.clone());
            if let Some(key) = &page_key {
                request = request.query(&[("pagination.key", key.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Query(format!("HTTP request to {} failed: {}", url, e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Query(format!(
                    "LCD returned {} for {}: {}",
                    status,
                    address,
                    body.trim()
                )));
            }

            let parsed: BalancesResponse = response
                .json()
                .await
                .map_err(|e| Error::Query(format!("Failed to parse balance response: {}", e)))?;

            debug!(
                "Balance page {} for {}: {} coins",
                page,
                address,
                parsed.balances.len()
            );
            coins.extend(parsed.balances);

            match parsed.pagination.and_then(|p| p.next_key) {
                Some(next) if !next.is_empty() && page_key.as_deref() != Some(next.as_str()) => {
                    page_key = Some(next);
                }
                _ => {
                    return Balance::from_coins(&coins).map_err(|e| Error::Query(e.to_string()));
                }
            }
        }

        Err(Error::Query(format!(
            "Balance of {} spans more than {} pages",
            address, MAX_PAGES
        )))
    }

    /// Wait until `tx_hash` is included in a block.
    ///
    /// Lookups that fail or find nothing are retried every `interval` until
    /// `timeout` elapses. A transaction that executed with a non-zero code
    /// (for example a missing authz grant) is a broadcast failure.
    pub async fn wait_for_tx(
        &self,
        tx_hash: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<WithdrawalResult> {
        let url = self
            .base
            .join(&format!("cosmos/tx/v1beta1/txs/{}", tx_hash))
            .map_err(|e| Error::Broadcast(format!("Invalid tx URL for {}: {}", tx_hash, e)))?;
        let deadline = Instant::now() + timeout;
        let mut last_status = String::from("not found");

        loop {
            match tokio::time::timeout_at(deadline, self.fetch_tx(&url)).await {
                Ok(Ok(tx)) if tx.height > 0 => return included(tx),
                Ok(Ok(_)) => last_status = "pending".to_string(),
                Ok(Err(status)) => last_status = status,
                Err(_) => break,
            }

            debug!("Transaction {} not included yet: {}", tx_hash, last_status);
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }

        Err(Error::Broadcast(format!(
            "Transaction {} not included within {:?} (last lookup: {})",
            tx_hash, timeout, last_status
        )))
    }

    async fn fetch_tx(&self, url: &Url) -> std::result::Result<TxResult, String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("{} {}", status, body.trim()));
        }

        response
            .json::<GetTxResponse>()
            .await
            .map(|r| r.tx_response)
            .map_err(|e| format!("unparseable response: {}", e))
    }
}

fn included(tx: TxResult) -> Result<WithdrawalResult> {
    if tx.code != 0 {
        return Err(Error::Broadcast(format!(
            "Transaction {} failed in block {} with code {} ({}): {}",
            tx.txhash, tx.height, tx.code, tx.codespace, tx.raw_log
        )));
    }
    Ok(WithdrawalResult {
        tx_hash: tx.txhash,
        code: tx.code,
        raw_log: tx.raw_log,
        height: tx.height,
        gas_used: tx.gas_used,
    })
}
