//! Loading configuration files from disk

mod common;

use std::io::Write;

use common::address;
use valin::config::Config;

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

fn network_toml(chain_id: &str, prefix: &str) -> String {
    format!(
        r#"
[[networks]]
chain_name = "{chain_id}"
chain_id = "{chain_id}"
granter = "{granter}"
grantee = "{grantee}"
fee_payer = "{fee_payer}"
validator = "{validator}"
node = "https://rpc.{prefix}.example.com:443"
lcd = "https://rest.{prefix}.example.com"
account_prefix = "{prefix}"
"#,
        granter = address(prefix, 1),
        grantee = address(prefix, 2),
        fee_payer = address(prefix, 3),
        validator = address(&format!("{}valoper", prefix), 1),
    )
}

#[test]
fn test_load_toml_with_defaults() {
    let body = format!(
        "schedule = \"0 0 12 * * *\"\n{}{}",
        network_toml("cosmoshub-4", "cosmos"),
        network_toml("osmosis-1", "osmo")
    );
    let file = write_config(&body);

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.schedule, "0 0 12 * * *");
    assert_eq!(config.networks.len(), 2);
    assert_eq!(config.database.table, "income");
    assert_eq!(config.http.bind, "0.0.0.0:8080");

    let osmo = config.network("osmosis-1").unwrap();
    assert_eq!(osmo.binary, "gaiad");
    assert_eq!(osmo.gas, 300_000);
    assert_eq!(osmo.key_name(), "osmosis1");
}

#[test]
fn test_duplicate_chain_id_is_rejected() {
    let body = format!(
        "{}{}",
        network_toml("cosmoshub-4", "cosmos"),
        network_toml("cosmoshub-4", "cosmos")
    );
    let file = write_config(&body);

    let err = Config::load(file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("Duplicate chain_id"));
}

#[test]
fn test_bad_schedule_is_rejected() {
    let body = format!(
        "schedule = \"every month\"\n{}",
        network_toml("cosmoshub-4", "cosmos")
    );
    let file = write_config(&body);

    assert!(Config::load(file.path()).is_err());
}
