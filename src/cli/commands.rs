//! CLI command implementations

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api;
use crate::chain::authz::build_withdrawal;
use crate::chain::lcd::LcdClient;
use crate::chain::ChainRegistry;
use crate::config::Config;
use crate::harvest::{HarvestOutcome, Harvester, Scheduler, SweepReport};
use crate::ledger::{IncomeLedger, SqliteLedger};

fn open_ledger(config: &Config) -> Result<Arc<SqliteLedger>> {
    let ledger = SqliteLedger::open(&config.database.path, &config.database.table)
        .with_context(|| format!("Failed to open income database {}", config.database.path))?;
    Ok(Arc::new(ledger))
}

fn build_harvester(config: &Config, ledger: Arc<dyn IncomeLedger>) -> Result<Harvester> {
    let registry = ChainRegistry::from_config(config).context("Failed to initialize chain clients")?;
    Ok(Harvester::new(
        config.networks.clone(),
        Arc::new(registry),
        ledger,
    ))
}

/// Start the HTTP server and the scheduled harvester
pub async fn start(config: &Config, run_now: bool) -> Result<()> {
    info!("Starting income harvester...");
    info!(
        "Schedule: '{}', networks: {}",
        config.schedule,
        config.networks.len()
    );

    let ledger = open_ledger(config)?;
    let harvester = build_harvester(config, ledger.clone())?;
    let scheduler = Scheduler::new(&config.schedule)?;

    let addr: SocketAddr = config
        .http
        .bind
        .parse()
        .with_context(|| format!("Invalid http.bind address: {}", config.http.bind))?;

    // Bind before harvesting so a taken port fails startup
    let listener = api::bind(addr).await?;

    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        let result = api::serve_on(listener, ledger, server_shutdown.clone()).await;
        if let Err(e) = &result {
            error!("HTTP server stopped: {}", e);
            server_shutdown.cancel();
        }
        result
    });

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let harvester = &harvester;
    if run_now {
        info!("Running initial sweep before scheduling");
        scheduler
            .try_run_now(move || async move {
                harvester.sweep().await;
            })
            .await;
    }

    let runs = scheduler
        .run(shutdown.clone(), move || async move {
            harvester.sweep().await;
        })
        .await?;
    info!("Scheduler stopped after {} sweeps", runs);

    // Scheduler also returns when the schedule is exhausted
    shutdown.cancel();
    server.await.context("HTTP server task panicked")??;

    info!("Shutdown complete");
    Ok(())
}

/// Run one sweep, or one network, and exit
pub async fn run_once(config: &Config, chain_id: Option<&str>) -> Result<()> {
    let ledger = open_ledger(config)?;
    let harvester = build_harvester(config, ledger)?;

    let report = match chain_id {
        Some(id) => {
            let started_at = chrono::Utc::now();
            let outcome = harvester.harvest_network(id).await?;
            SweepReport {
                started_at,
                finished_at: chrono::Utc::now(),
                networks: vec![crate::harvest::NetworkReport {
                    chain_id: id.to_string(),
                    outcome,
                }],
            }
        }
        None => harvester.sweep().await,
    };

    print_report(&report);

    if report.unrecorded() > 0 {
        anyhow::bail!(
            "{} withdrawals were not recorded; see logs for transaction hashes",
            report.unrecorded()
        );
    }
    if report.recorded() == 0 && report.failed() > 0 {
        anyhow::bail!("Every network failed");
    }
    Ok(())
}

fn print_report(report: &SweepReport) {
    println!("\n=== HARVEST REPORT ===\n");
    for network in &report.networks {
        match &network.outcome {
            HarvestOutcome::Recorded(record) => {
                println!("{:<20} RECORDED  income: {}", network.chain_id, record.income)
            }
            HarvestOutcome::Failed { stage, error } => {
                println!("{:<20} FAILED    [{}] {}", network.chain_id, stage, error)
            }
            HarvestOutcome::Unrecorded { tx_hash, error, .. } => println!(
                "{:<20} UNRECORDED tx {} ({})",
                network.chain_id, tx_hash, error
            ),
        }
    }
    println!(
        "\nRecorded: {}  Failed: {}  Unrecorded: {}",
        report.recorded(),
        report.failed(),
        report.unrecorded()
    );
}

/// Print stored income records as JSON
pub async fn income(config: &Config, chain_id: Option<&str>) -> Result<()> {
    let ledger = open_ledger(config)?;
    let records = match chain_id {
        Some(id) => ledger.list_by_chain(id).await?,
        None => ledger.list_all().await?,
    };
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Validate every network and print its withdrawal message without broadcasting
pub async fn check(config: &Config) -> Result<()> {
    println!("\n=== NETWORK CHECK ===\n");

    let mut all_ok = true;
    for network in &config.networks {
        println!("--- {} ({}) ---", network.chain_name, network.chain_id);

        match build_withdrawal(network).and_then(|tx| tx.to_json()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                println!("Withdrawal message... FAILED: {}", e);
                all_ok = false;
            }
        }

        print!("LCD balance query... ");
        let timeout = Duration::from_millis(config.rpc.timeout_ms);
        match check_lcd(&network.lcd, &network.granter, timeout).await {
            Ok((latency, balance)) => println!("OK ({}ms) balance: {}", latency, balance),
            Err(e) => {
                println!("FAILED: {}", e);
                all_ok = false;
            }
        }
        println!();
    }

    if all_ok {
        println!("All networks ready.");
    } else {
        warn!("Some networks failed the check");
        println!("Some networks are not ready. Check the errors above.");
    }
    Ok(())
}

async fn check_lcd(endpoint: &str, address: &str, timeout: Duration) -> Result<(u64, String)> {
    let client = LcdClient::new(endpoint, timeout)?;
    let start = Instant::now();
    let balance = client.balances(address).await?;
    Ok((start.elapsed().as_millis() as u64, balance.to_string()))
}
