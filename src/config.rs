//! Configuration loading and validation

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;

use crate::chain::address::{self, AddressRole};
use crate::chain::authz::parse_fee;
use crate::harvest::scheduler::parse_schedule;
use crate::ledger::sqlite::validate_table_name;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Cron expression for harvest sweeps
    #[serde(default = "default_schedule", alias = "cronJobTime", alias = "cronjobtime")]
    pub schedule: String,
    #[serde(default, alias = "db")]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub keyring: KeyringConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

/// One network to harvest
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub chain_name: String,
    #[serde(alias = "chainId", alias = "chainid")]
    pub chain_id: String,
    /// Account whose rewards and commission are withdrawn
    pub granter: String,
    /// Account executing the withdrawal under the granter's authz grant
    pub grantee: String,
    /// Account paying fees through a fee grant
    #[serde(alias = "feepayer")]
    pub fee_payer: String,
    /// Operator (valoper) address
    pub validator: String,
    /// Tendermint RPC endpoint used to sign and broadcast
    pub node: String,
    /// REST endpoint used for balance queries
    pub lcd: String,
    /// Bech32 account prefix, e.g. "cosmos"
    pub account_prefix: String,
    /// Keyring entry for the grantee; derived from chain_name when unset
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_fees")]
    pub fees: String,
    #[serde(default = "default_gas")]
    pub gas: u64,
}

impl NetworkConfig {
    /// Keyring entry used for signing
    pub fn key_name(&self) -> String {
        match &self.key_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => sanitize_key_name(&self.chain_name),
        }
    }
}

/// Strip every non-alphanumeric character ("Cosmos Hub" -> "CosmosHub")
pub fn sanitize_key_name(chain_name: &str) -> String {
    chain_name.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path", alias = "sqlUrl", alias = "sqlurl")]
    pub path: String,
    #[serde(default = "default_db_table")]
    pub table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            table: default_db_table(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind")]
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyringConfig {
    #[serde(default = "default_keyring_backend")]
    pub backend: String,
    #[serde(default = "default_keyring_dir")]
    pub dir: String,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            backend: default_keyring_backend(),
            dir: default_keyring_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// Timeout for LCD requests
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Timeout for each sign/broadcast invocation of the chain binary
    #[serde(default = "default_broadcast_timeout_ms")]
    pub broadcast_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            broadcast_timeout_ms: default_broadcast_timeout_ms(),
        }
    }
}

/// First day of every month at midnight UTC
fn default_schedule() -> String {
    "0 0 0 1 * *".to_string()
}

fn default_db_path() -> String {
    "income.db".to_string()
}

fn default_db_table() -> String {
    "income".to_string()
}

fn default_http_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_keyring_backend() -> String {
    "test".to_string()
}

fn default_keyring_dir() -> String {
    "./keys".to_string()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_broadcast_timeout_ms() -> u64 {
    120_000
}

fn default_binary() -> String {
    "gaiad".to_string()
}

fn default_fees() -> String {
    "200uatom".to_string()
}

fn default_gas() -> u64 {
    300_000
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults; aliased keys (schedule, database) default in serde
            .set_default("http.bind", default_http_bind())?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (VALIN_SCHEDULE, VALIN_DATABASE__PATH)
            .add_source(
                config::Environment::with_prefix("VALIN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        parse_schedule(&self.schedule)
            .with_context(|| format!("Invalid schedule '{}'", self.schedule))?;

        validate_table_name(&self.database.table)
            .with_context(|| format!("Invalid database table '{}'", self.database.table))?;

        self.http
            .bind
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid http.bind address: {}", self.http.bind))?;

        if self.rpc.timeout_ms == 0 || self.rpc.broadcast_timeout_ms == 0 {
            anyhow::bail!("rpc timeouts must be positive");
        }

        if self.networks.is_empty() {
            anyhow::bail!("At least one network must be configured");
        }

        let mut seen = HashSet::new();
        for network in &self.networks {
            if network.chain_id.trim().is_empty() {
                anyhow::bail!("Network '{}' has an empty chain_id", network.chain_name);
            }
            if !seen.insert(network.chain_id.as_str()) {
                anyhow::bail!("Duplicate chain_id: {}", network.chain_id);
            }
            validate_network(network)
                .with_context(|| format!("Invalid network {}", network.chain_id))?;
        }

        Ok(())
    }

    /// Look up a configured network by chain id
    pub fn network(&self, chain_id: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.chain_id == chain_id)
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let mut out = format!(
            r#"Configuration:
  Schedule: {}
  Database:
    path: {}
    table: {}
  HTTP:
    bind: {}
  Keyring:
    backend: {}
    dir: {}
  RPC:
    timeout: {}ms
    broadcast_timeout: {}ms
  Networks ({}):
"#,
            self.schedule,
            self.database.path,
            self.database.table,
            self.http.bind,
            self.keyring.backend,
            self.keyring.dir,
            self.rpc.timeout_ms,
            self.rpc.broadcast_timeout_ms,
            self.networks.len(),
        );

        for network in &self.networks {
            out.push_str(&format!(
                r#"    - {} ({})
      granter: {}
      grantee: {} (key '{}')
      fee_payer: {}
      validator: {}
      node: {}
      lcd: {}
      binary: {}, fees: {}, gas: {}
"#,
                network.chain_name,
                network.chain_id,
                network.granter,
                network.grantee,
                network.key_name(),
                network.fee_payer,
                network.validator,
                mask_url(&network.node),
                mask_url(&network.lcd),
                network.binary,
                network.fees,
                network.gas,
            ));
        }

        out
    }
}

fn validate_network(network: &NetworkConfig) -> Result<()> {
    let prefix_re = Regex::new(r"^[a-z][a-z0-9]*$")?;
    if !prefix_re.is_match(&network.account_prefix) {
        anyhow::bail!("Invalid account_prefix: '{}'", network.account_prefix);
    }

    for (addr, role) in [
        (&network.granter, AddressRole::Granter),
        (&network.grantee, AddressRole::Grantee),
        (&network.fee_payer, AddressRole::FeePayer),
        (&network.validator, AddressRole::Validator),
    ] {
        address::validate_role(addr, role, &network.account_prefix)?;
    }

    for (name, endpoint) in [("node", &network.node), ("lcd", &network.lcd)] {
        url::Url::parse(endpoint)
            .with_context(|| format!("Invalid {} endpoint: {}", name, endpoint))?;
    }

    parse_fee(&network.fees)?;

    if network.gas == 0 {
        anyhow::bail!("gas must be positive");
    }

    if network.key_name().is_empty() {
        anyhow::bail!("Cannot derive a key name from chain_name '{}'", network.chain_name);
    }

    if network.binary.trim().is_empty() {
        anyhow::bail!("binary must not be empty");
    }

    Ok(())
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{config_with, network};
    use super::*;
    use std::io::Write;

    #[test]
    fn test_valid_config() {
        let config = config_with(vec![network("cosmoshub-4", "cosmos"), network("osmosis-1", "osmo")]);
        assert!(config.validate().is_ok());
        assert!(config.network("osmosis-1").is_some());
        assert!(config.network("juno-1").is_none());
    }

    #[test]
    fn test_requires_networks() {
        assert!(config_with(vec![]).validate().is_err());
    }

    #[test]
    fn test_duplicate_chain_id() {
        let config = config_with(vec![network("cosmoshub-4", "cosmos"), network("cosmoshub-4", "cosmos")]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate chain_id"));
    }

    #[test]
    fn test_invalid_address_rejected_at_startup() {
        let mut net = network("cosmoshub-4", "cosmos");
        net.granter = "cosmos1invalid".to_string();
        assert!(config_with(vec![net]).validate().is_err());
    }

    #[test]
    fn test_invalid_schedule_and_table() {
        let mut config = config_with(vec![network("cosmoshub-4", "cosmos")]);
        config.schedule = "every now and then".to_string();
        assert!(config.validate().is_err());

        let mut config = config_with(vec![network("cosmoshub-4", "cosmos")]);
        config.database.table = "income; DROP TABLE income".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_key_name_derivation() {
        let mut net = network("cosmoshub-4", "cosmos");
        net.chain_name = "Cosmos Hub-4".to_string();
        assert_eq!(net.key_name(), "CosmosHub4");

        net.key_name = Some("harvester".to_string());
        assert_eq!(net.key_name(), "harvester");
    }

    #[test]
    fn test_load_json_file_with_legacy_keys() {
        let net = network("cosmoshub-4", "cosmos");
        let json = serde_json::json!({
            "cronJobTime": "0 0 12 * * *",
            "db": { "table": "income" },
            "networks": [{
                "chain_name": "cosmoshub",
                "chainId": "cosmoshub-4",
                "granter": net.granter,
                "grantee": net.grantee,
                "feepayer": net.fee_payer,
                "validator": net.validator,
                "node": net.node,
                "lcd": net.lcd,
                "account_prefix": "cosmos"
            }]
        });

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(json.to_string().as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.schedule, "0 0 12 * * *");
        assert_eq!(config.networks.len(), 1);
        assert_eq!(config.networks[0].chain_id, "cosmoshub-4");
        assert_eq!(config.networks[0].fee_payer, net.fee_payer);
        assert_eq!(config.networks[0].fees, "200uatom");
        assert_eq!(config.database.path, "income.db");
    }

    #[test]
    fn test_masked_display_hides_query_secrets() {
        let mut net = network("cosmoshub-4", "cosmos");
        net.lcd = "https://rest.example.com?apikey=secret".to_string();
        let shown = config_with(vec![net]).masked_display();
        assert!(shown.contains("https://rest.example.com?***"));
        assert!(!shown.contains("secret"));
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://api.example.com?key=secret"),
            "https://api.example.com?***"
        );
        assert_eq!(
            mask_url("https://api.example.com"),
            "https://api.example.com"
        );
    }
}
