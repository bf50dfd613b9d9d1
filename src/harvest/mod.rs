//! Harvest cycle and its schedule

pub mod orchestrator;
pub mod scheduler;

pub use orchestrator::{HarvestOutcome, Harvester, NetworkReport, SweepReport};
pub use scheduler::{parse_schedule, Scheduler, SchedulerState};
