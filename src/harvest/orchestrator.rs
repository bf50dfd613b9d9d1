//! Harvest orchestration
//!
//! One sweep walks the configured networks in order. Each network runs the
//! cycle pre-snapshot → withdrawal → post-snapshot → income → persist, and a
//! failure ends only that network's cycle.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::chain::authz::build_withdrawal;
use crate::chain::{ChainClient, ChainRegistry, WithdrawalResult};
use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::income::IncomeRecord;
use crate::ledger::IncomeLedger;

/// What happened to one network during a sweep
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HarvestOutcome {
    /// Withdrawal landed and income was stored
    Recorded(IncomeRecord),
    /// The cycle stopped before or at the withdrawal; nothing to reconcile
    Failed { stage: &'static str, error: String },
    /// Withdrawal landed on chain but the record could not be stored
    Unrecorded {
        record: IncomeRecord,
        tx_hash: String,
        error: String,
    },
}

impl HarvestOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, HarvestOutcome::Recorded(_))
    }

    pub fn record(&self) -> Option<&IncomeRecord> {
        match self {
            HarvestOutcome::Recorded(record) | HarvestOutcome::Unrecorded { record, .. } => {
                Some(record)
            }
            HarvestOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkReport {
    pub chain_id: String,
    pub outcome: HarvestOutcome,
}

/// Summary of one sweep across every configured network
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub networks: Vec<NetworkReport>,
}

impl SweepReport {
    pub fn recorded(&self) -> usize {
        self.count(|o| matches!(o, HarvestOutcome::Recorded(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, HarvestOutcome::Failed { .. }))
    }

    pub fn unrecorded(&self) -> usize {
        self.count(|o| matches!(o, HarvestOutcome::Unrecorded { .. }))
    }

    pub fn outcome(&self, chain_id: &str) -> Option<&HarvestOutcome> {
        self.networks
            .iter()
            .find(|n| n.chain_id == chain_id)
            .map(|n| &n.outcome)
    }

    fn count(&self, pred: impl Fn(&HarvestOutcome) -> bool) -> usize {
        self.networks.iter().filter(|n| pred(&n.outcome)).count()
    }
}

/// Runs harvest cycles against the registry's clients and the ledger
pub struct Harvester {
    networks: Vec<NetworkConfig>,
    registry: Arc<ChainRegistry>,
    ledger: Arc<dyn IncomeLedger>,
}

impl Harvester {
    pub fn new(
        networks: Vec<NetworkConfig>,
        registry: Arc<ChainRegistry>,
        ledger: Arc<dyn IncomeLedger>,
    ) -> Self {
        Self {
            networks,
            registry,
            ledger,
        }
    }

    pub fn networks(&self) -> &[NetworkConfig] {
        &self.networks
    }

    /// Harvest every network sequentially
    pub async fn sweep(&self) -> SweepReport {
        let started_at = Utc::now();
        info!("Starting harvest sweep over {} networks", self.networks.len());

        let mut networks = Vec::with_capacity(self.networks.len());
        for network in &self.networks {
            let outcome = self.run_cycle(network).await;
            networks.push(NetworkReport {
                chain_id: network.chain_id.clone(),
                outcome,
            });
        }

        let report = SweepReport {
            started_at,
            finished_at: Utc::now(),
            networks,
        };

        info!(
            "Harvest sweep finished: {} recorded, {} failed, {} unrecorded",
            report.recorded(),
            report.failed(),
            report.unrecorded()
        );
        if report.unrecorded() > 0 {
            error!(
                "{} withdrawals landed on chain without an income record; reconcile manually",
                report.unrecorded()
            );
        }

        report
    }

    /// Harvest a single configured network
    pub async fn harvest_network(&self, chain_id: &str) -> Result<HarvestOutcome> {
        let network = self
            .networks
            .iter()
            .find(|n| n.chain_id == chain_id)
            .ok_or_else(|| Error::UnknownNetwork(chain_id.to_string()))?;
        Ok(self.run_cycle(network).await)
    }

    async fn run_cycle(&self, network: &NetworkConfig) -> HarvestOutcome {
        let chain_id = network.chain_id.as_str();
        info!(chain_id, "Processing network {}", network.chain_name);

        let (record, withdrawal) = match self.withdraw_and_measure(network).await {
            Ok(measured) => measured,
            Err(e) => {
                warn!(chain_id, stage = e.stage(), "Harvest aborted: {}", e);
                return HarvestOutcome::Failed {
                    stage: e.stage(),
                    error: e.to_string(),
                };
            }
        };

        info!(chain_id, "Income: {}", record.income);

        match self.ledger.append(&record).await {
            Ok(()) => HarvestOutcome::Recorded(record),
            Err(e) => {
                error!(
                    chain_id,
                    tx_hash = %withdrawal.tx_hash,
                    income = %record.income,
                    "Withdrawal succeeded but income was not recorded: {}",
                    e
                );
                HarvestOutcome::Unrecorded {
                    record,
                    tx_hash: withdrawal.tx_hash,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Steps up to and including the income calculation
    async fn withdraw_and_measure(
        &self,
        network: &NetworkConfig,
    ) -> Result<(IncomeRecord, WithdrawalResult)> {
        let client: Arc<dyn ChainClient> = self.registry.get(&network.chain_id)?;

        let before = client.query_balance(&network.granter).await?;
        info!(chain_id = %network.chain_id, "Initial balance: {}", before);

        let withdrawal = build_withdrawal(network)?;
        let result = client.broadcast_withdrawal(&withdrawal).await?;
        if !result.is_success() {
            return Err(Error::Broadcast(format!(
                "Transaction {} returned code {}: {}",
                result.tx_hash, result.code, result.raw_log
            )));
        }
        info!(chain_id = %network.chain_id, "Withdrawal included: tx {}", result.tx_hash);

        let after = client.query_balance(&network.granter).await?;
        info!(chain_id = %network.chain_id, "New balance: {}", after);

        let record = IncomeRecord::new(&network.chain_id, &network.granter, before, after, Utc::now());
        Ok((record, result))
    }
}
