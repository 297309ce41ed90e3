//! Concurrent verification of the DCB append protocol.
//!
//! This crate provides:
//! - [`fixture`]: seeded random queries and event batches
//! - [`consistency`]: append-condition soundness under racing appenders
//! - [`monotonic`]: monotonic position visibility for concurrent readers
//! - [`VerifierConfig`]: run parameters from the environment

use std::sync::Arc;

use event_store::InMemoryEventStore;

pub mod appender;
pub mod config;
pub mod consistency;
pub mod error;
pub mod fixture;
pub mod monotonic;

pub use appender::AppendStats;
pub use config::VerifierConfig;
pub use consistency::{ConsistencyReport, ConsistencyViolation, run_consistency_check};
pub use error::{Result, VerifierError};
pub use fixture::{BatchMetadata, DcbOptions, Fixture, Range};
pub use monotonic::{
    MonotonicReport, MonotonicViolation, PositionLog, PositionRecorder, position_log,
    run_monotonic_check, verify_position_batches,
};

/// Outcome of both checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub consistency: ConsistencyReport,
    pub monotonic: MonotonicReport,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.consistency.is_consistent() && self.monotonic.is_monotonic()
    }
}

/// Runs both checks, each against a fresh in-memory store.
pub async fn run(config: &VerifierConfig) -> Result<VerificationReport> {
    let consistency = run_consistency_check(Arc::new(InMemoryEventStore::new()), config).await?;
    let monotonic = run_monotonic_check(Arc::new(InMemoryEventStore::new()), config).await?;

    Ok(VerificationReport {
        consistency,
        monotonic,
    })
}
