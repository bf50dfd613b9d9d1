//! End-to-end harvest cycles against scripted chains and a real SQLite ledger

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use common::{balance, network, ScriptedChain};
use valin::api;
use valin::chain::ChainRegistry;
use valin::harvest::{HarvestOutcome, Harvester};
use valin::income::IncomeRecord;
use valin::ledger::{IncomeLedger, SqliteLedger};
use valin::Error;

/// Ledger whose inserts fail for one network
struct RejectingLedger {
    inner: SqliteLedger,
    reject: &'static str,
}

#[async_trait]
impl IncomeLedger for RejectingLedger {
    async fn append(&self, record: &IncomeRecord) -> valin::Result<()> {
        if record.chain_id == self.reject {
            return Err(Error::Persistence("database is locked".into()));
        }
        self.inner.append(record).await
    }

    async fn list_all(&self) -> valin::Result<Vec<IncomeRecord>> {
        self.inner.list_all().await
    }

    async fn list_by_chain(&self, chain_id: &str) -> valin::Result<Vec<IncomeRecord>> {
        self.inner.list_by_chain(chain_id).await
    }
}

async fn get_income(ledger: Arc<dyn IncomeLedger>, query: &str) -> Vec<IncomeRecord> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(api::serve_on(listener, ledger, shutdown.clone()));

    let records = reqwest::get(format!("http://{}/income{}", addr, query))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    shutdown.cancel();
    tokio_test::assert_ok!(server.await.unwrap());
    records
}

#[tokio::test]
async fn test_single_denom_reward_is_served() {
    let chain = Arc::new(ScriptedChain::rewarding(
        balance(&[("uatom", 1000)]),
        balance(&[("uatom", 1180)]),
    ));
    let registry = ChainRegistry::new().with_client("cosmoshub-4", chain.clone());
    let ledger = Arc::new(SqliteLedger::open_in_memory("income").unwrap());

    let harvester = Harvester::new(
        vec![network("cosmoshub-4", "cosmos")],
        Arc::new(registry),
        ledger.clone(),
    );
    let report = harvester.sweep().await;
    assert_eq!(report.recorded(), 1);
    assert_eq!(chain.broadcasts.load(Ordering::SeqCst), 1);

    let served = get_income(ledger, "").await;
    assert_eq!(served.len(), 1);
    assert_eq!(served[0].chain_id, "cosmoshub-4");
    assert_eq!(served[0].old_balance, balance(&[("uatom", 1000)]));
    assert_eq!(served[0].new_balance, balance(&[("uatom", 1180)]));
    assert_eq!(served[0].income.delta_of("uatom"), 180);
    assert_eq!(served[0].income.len(), 1);
}

#[tokio::test]
async fn test_vanished_denom_is_negative_income() {
    let chain = Arc::new(ScriptedChain::rewarding(
        balance(&[("uatom", 1000), ("uosmo", 50)]),
        balance(&[("uatom", 1150)]),
    ));
    let registry = ChainRegistry::new().with_client("cosmoshub-4", chain);
    let ledger = Arc::new(SqliteLedger::open_in_memory("income").unwrap());

    let harvester = Harvester::new(
        vec![network("cosmoshub-4", "cosmos")],
        Arc::new(registry),
        ledger.clone(),
    );
    harvester.sweep().await;

    let served = get_income(ledger, "?chain_id=cosmoshub-4").await;
    assert_eq!(served.len(), 1);
    assert_eq!(served[0].income.delta_of("uatom"), 150);
    assert_eq!(served[0].income.delta_of("uosmo"), -50);
}

#[tokio::test]
async fn test_one_failing_network_does_not_stop_the_sweep() {
    let chains = [
        ("cosmoshub-4", "cosmos"),
        ("osmosis-1", "osmo"),
        ("juno-1", "juno"),
        ("stargaze-1", "stars"),
    ];
    let failing = "osmosis-1";

    let mut registry = ChainRegistry::new();
    let mut clients = Vec::new();
    for (chain_id, _) in chains {
        let client = if chain_id == failing {
            Arc::new(ScriptedChain::unreachable())
        } else {
            Arc::new(ScriptedChain::rewarding(
                balance(&[("uatom", 10)]),
                balance(&[("uatom", 25)]),
            ))
        };
        registry = registry.with_client(chain_id, client.clone());
        clients.push((chain_id, client));
    }

    let ledger = Arc::new(SqliteLedger::open_in_memory("income").unwrap());
    let harvester = Harvester::new(
        chains.iter().map(|(id, prefix)| network(id, prefix)).collect(),
        Arc::new(registry),
        ledger.clone(),
    );

    let report = harvester.sweep().await;
    assert_eq!(report.networks.len(), 4);
    assert_eq!(report.recorded(), 3);
    assert_eq!(report.failed(), 1);
    assert!(matches!(
        report.outcome(failing),
        Some(HarvestOutcome::Failed { stage: "query", .. })
    ));

    for (chain_id, client) in &clients {
        let expected = if *chain_id == failing { 0 } else { 1 };
        assert_eq!(client.broadcasts.load(Ordering::SeqCst), expected, "{}", chain_id);
    }

    let stored = ledger.list_all().await.unwrap();
    let mut ids: Vec<&str> = stored.iter().map(|r| r.chain_id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["cosmoshub-4", "juno-1", "stargaze-1"]);
}

#[tokio::test]
async fn test_post_snapshot_failure_records_nothing() {
    let chain = Arc::new(ScriptedChain::new(vec![
        Ok(balance(&[("uatom", 1000)])),
        Err(Error::Query("timeout".into())),
    ]));
    let registry = ChainRegistry::new().with_client("cosmoshub-4", chain.clone());
    let ledger = Arc::new(SqliteLedger::open_in_memory("income").unwrap());

    let harvester = Harvester::new(
        vec![network("cosmoshub-4", "cosmos")],
        Arc::new(registry),
        ledger.clone(),
    );
    let outcome = harvester.harvest_network("cosmoshub-4").await.unwrap();

    assert!(matches!(outcome, HarvestOutcome::Failed { stage: "query", .. }));
    assert_eq!(chain.broadcasts.load(Ordering::SeqCst), 1);
    assert_eq!(chain.queries.load(Ordering::SeqCst), 2);
    assert!(ledger.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_repeated_sweeps_accumulate_in_order() {
    let chain = Arc::new(ScriptedChain::new(vec![
        Ok(balance(&[("uatom", 100)])),
        Ok(balance(&[("uatom", 130)])),
        Ok(balance(&[("uatom", 130)])),
        Ok(balance(&[("uatom", 175)])),
    ]));
    let registry = ChainRegistry::new().with_client("cosmoshub-4", chain);
    let ledger = Arc::new(SqliteLedger::open_in_memory("income").unwrap());
    let harvester = Harvester::new(
        vec![network("cosmoshub-4", "cosmos")],
        Arc::new(registry),
        ledger.clone(),
    );

    harvester.sweep().await;
    harvester.sweep().await;

    let first = ledger.list_all().await.unwrap();
    let second = ledger.list_all().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert!(first[0].date <= first[1].date);
    assert_eq!(first[0].income.delta_of("uatom"), 30);
    assert_eq!(first[1].income.delta_of("uatom"), 45);
}

#[tokio::test]
async fn test_store_failure_after_withdrawal_is_unrecorded() {
    let hub = Arc::new(ScriptedChain::rewarding(
        balance(&[("uatom", 1000)]),
        balance(&[("uatom", 1180)]),
    ));
    let osmo = Arc::new(ScriptedChain::rewarding(
        balance(&[("uosmo", 500)]),
        balance(&[("uosmo", 520)]),
    ));
    let registry = ChainRegistry::new()
        .with_client("cosmoshub-4", hub.clone())
        .with_client("osmosis-1", osmo.clone());
    let ledger = Arc::new(RejectingLedger {
        inner: SqliteLedger::open_in_memory("income").unwrap(),
        reject: "cosmoshub-4",
    });

    let harvester = Harvester::new(
        vec![network("cosmoshub-4", "cosmos"), network("osmosis-1", "osmo")],
        Arc::new(registry),
        ledger.clone(),
    );
    let report = harvester.sweep().await;

    assert_eq!(report.unrecorded(), 1);
    assert_eq!(report.recorded(), 1);
    match report.outcome("cosmoshub-4") {
        Some(HarvestOutcome::Unrecorded { record, tx_hash, error }) => {
            assert_eq!(tx_hash, "HASH-cosmoshub-4");
            assert_eq!(record.income.delta_of("uatom"), 180);
            assert!(error.contains("database is locked"));
        }
        other => panic!("expected unrecorded outcome, got {:?}", other),
    }
    assert_eq!(hub.broadcasts.load(Ordering::SeqCst), 1);
    assert!(report.outcome("osmosis-1").unwrap().is_recorded());

    let stored = ledger.list_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].chain_id, "osmosis-1");
}
