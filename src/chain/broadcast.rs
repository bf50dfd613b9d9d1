//! Signing and broadcasting through the chain's CLI binary
//!
//! The binary owns the keyring, so keys never pass through this process.
//! Flow: write unsigned tx → `tx sign` as the grantee → `tx broadcast`.

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::chain::authz::WithdrawalTx;
use crate::error::{Error, Result};

/// Outcome of a withdrawal transaction.
///
/// `height` is zero until the transaction is included in a block.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct WithdrawalResult {
    pub tx_hash: String,
    pub code: u32,
    pub raw_log: String,
    pub height: u64,
    pub gas_used: u64,
}

impl WithdrawalResult {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Subset of the SDK `TxResponse` JSON we care about
#[derive(Debug, Deserialize)]
struct TxResponse {
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    codespace: String,
    #[serde(default)]
    raw_log: String,
    #[serde(default, deserialize_with = "string_or_number")]
    height: u64,
    #[serde(default, deserialize_with = "string_or_number")]
    gas_used: u64,
}

/// The SDK encodes int64 fields as strings in JSON, older versions as numbers
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) if s.is_empty() => Ok(0),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Parse `tx broadcast --output json` output into a result.
///
/// The default sync mode only reports the mempool check: a non-zero code is
/// a broadcast failure, a zero code says nothing about execution.
pub fn parse_tx_response(output: &[u8]) -> Result<WithdrawalResult> {
    let text = String::from_utf8_lossy(output);
    // Some binaries print gas estimates before the JSON document
    let start = text
        .find('{')
        .ok_or_else(|| Error::Broadcast(format!("No JSON in broadcast output: {}", text.trim())))?;

    let response: TxResponse = serde_json::from_str(text[start..].trim())
        .map_err(|e| Error::Broadcast(format!("Failed to parse broadcast output: {}", e)))?;

    if response.code != 0 {
        return Err(Error::Broadcast(format!(
            "Transaction {} rejected with code {} ({}): {}",
            response.txhash, response.code, response.codespace, response.raw_log
        )));
    }

    Ok(WithdrawalResult {
        tx_hash: response.txhash,
        code: response.code,
        raw_log: response.raw_log,
        height: response.height,
        gas_used: response.gas_used,
    })
}

/// Broadcaster that shells out to a chain binary such as `gaiad`
#[derive(Debug, Clone)]
pub struct CliBroadcaster {
    pub binary: String,
    pub chain_id: String,
    pub node: String,
    pub key_name: String,
    pub keyring_backend: String,
    pub keyring_dir: PathBuf,
    pub timeout: Duration,
}

impl CliBroadcaster {
    /// Arguments for `tx sign`, signing as the grantee key
    pub fn sign_args(&self, unsigned: &Path, signed: &Path) -> Vec<String> {
        vec![
            "tx".into(),
            "sign".into(),
            unsigned.display().to_string(),
            "--from".into(),
            self.key_name.clone(),
            "--chain-id".into(),
            self.chain_id.clone(),
            "--node".into(),
            self.node.clone(),
            "--keyring-backend".into(),
            self.keyring_backend.clone(),
            "--keyring-dir".into(),
            self.keyring_dir.display().to_string(),
            "--output-document".into(),
            signed.display().to_string(),
        ]
    }

    /// Arguments for `tx broadcast`
    pub fn broadcast_args(&self, signed: &Path) -> Vec<String> {
        vec![
            "tx".into(),
            "broadcast".into(),
            signed.display().to_string(),
            "--node".into(),
            self.node.clone(),
            "--output".into(),
            "json".into(),
        ]
    }

    /// Sign and broadcast `withdrawal`
    pub async fn broadcast(&self, withdrawal: &WithdrawalTx) -> Result<WithdrawalResult> {
        let workdir = tempfile::tempdir()
            .map_err(|e| Error::Broadcast(format!("Failed to create temp dir: {}", e)))?;
        let unsigned = workdir.path().join("unsigned.json");
        let signed = workdir.path().join("signed.json");

        tokio::fs::write(&unsigned, withdrawal.to_json()?)
            .await
            .map_err(|e| Error::Broadcast(format!("Failed to write unsigned tx: {}", e)))?;

        debug!("Signing withdrawal for {} as {}", withdrawal.chain_id, self.key_name);
        self.run(&self.sign_args(&unsigned, &signed)).await?;

        debug!("Broadcasting withdrawal for {} via {}", withdrawal.chain_id, self.node);
        let output = self.run(&self.broadcast_args(&signed)).await?;
        let result = parse_tx_response(&output)?;

        info!(
            "Withdrawal accepted into the {} mempool: tx {}",
            withdrawal.chain_id, result.tx_hash
        );
        Ok(result)
    }

    async fn run(&self, args: &[String]) -> Result<Vec<u8>> {
        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                Error::Broadcast(format!(
                    "{} {} timed out after {:?}",
                    self.binary,
                    args.get(1).map(String::as_str).unwrap_or_default(),
                    self.timeout
                ))
            })?
            .map_err(|e| Error::Broadcast(format!("Failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Broadcast(format!(
                "{} {} exited with {}: {}",
                self.binary,
                args.get(1).map(String::as_str).unwrap_or_default(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}
