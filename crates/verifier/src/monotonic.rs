//! Monotonic position visibility check.
//!
//! While appenders run, readers repeatedly record the tail positions of the
//! log into a [`PositionLog`]. Consecutive batches overlap, and wherever
//! they do they must agree: a reader must never see the log move backwards
//! or be renumbered.

use std::sync::Arc;
use std::time::Duration;

use event_store::{EventStore, Position, Query, ReadOptions};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::appender::{AppendStats, run_appenders};
use crate::config::VerifierConfig;
use crate::error::{Result, VerifierError};
use crate::fixture::DcbOptions;

/// Creates an ordered buffer of position batches and its writer handle.
pub fn position_log() -> (PositionRecorder, PositionLog) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PositionRecorder { tx }, PositionLog { rx })
}

/// Writer side of a [`PositionLog`]. Cloned into every reader.
#[derive(Debug, Clone)]
pub struct PositionRecorder {
    tx: mpsc::UnboundedSender<Vec<Position>>,
}

impl PositionRecorder {
    /// Appends a batch. Returns false if the log was dropped.
    pub fn record(&self, batch: Vec<Position>) -> bool {
        self.tx.send(batch).is_ok()
    }
}

/// Batches in the order they were recorded across all readers.
#[derive(Debug)]
pub struct PositionLog {
    rx: mpsc::UnboundedReceiver<Vec<Position>>,
}

impl PositionLog {
    /// Waits until every recorder is dropped and returns all batches.
    pub async fn collect(mut self) -> Vec<Vec<Position>> {
        let mut batches = Vec::new();
        while let Some(batch) = self.rx.recv().await {
            batches.push(batch);
        }
        batches
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonotonicViolation {
    /// A batch started below the previous batch.
    Regression {
        batch: usize,
        previous_min: Position,
        min: Position,
    },
    /// The overlap of two consecutive batches differs.
    Mismatch {
        batch: usize,
        previous: Vec<Position>,
        current: Vec<Position>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonotonicReport {
    pub appends: AppendStats,
    pub batches: usize,
    /// Consecutive batch pairs whose overlap was compared.
    pub compared: u64,
    pub violations: Vec<MonotonicViolation>,
}

impl MonotonicReport {
    pub fn is_monotonic(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Returns up to `count` of the most recent positions, newest first.
pub async fn read_tail_positions<S>(store: &S, count: usize) -> Result<Vec<Position>>
where
    S: EventStore + ?Sized,
{
    let options = ReadOptions::backwards().limit(count.max(1));
    Ok(store.read(&Query::all(), options).await?.positions())
}

/// Checks each recorded batch against the one before it.
///
/// Batches are newest first, as recorded. A batch whose lowest position is
/// below the previous batch's lowest is a regression. Otherwise, if the
/// current batch starts inside the previous one, the shared window must be
/// identical.
pub fn verify_position_batches(batches: &[Vec<Position>]) -> MonotonicReport {
    let mut report = MonotonicReport {
        batches: batches.len(),
        ..MonotonicReport::default()
    };
    let mut previous: Vec<Position> = Vec::new();

    for (index, batch) in batches.iter().enumerate() {
        let current: Vec<Position> = batch.iter().rev().copied().collect();
        let (Some(&min), Some(&previous_min)) = (current.iter().min(), previous.iter().min())
        else {
            previous = current;
            continue;
        };

        if min < previous_min {
            tracing::warn!(batch = index, %min, %previous_min, "Positions moved backwards");
            report.violations.push(MonotonicViolation::Regression {
                batch: index,
                previous_min,
                min,
            });
            previous = current;
            continue;
        }

        let Some(start) = previous.iter().position(|p| *p == current[0]) else {
            previous = current;
            continue;
        };

        let overlap = previous.len() - start;
        let expected = &previous[start..];
        let actual = &current[..overlap.min(current.len())];
        report.compared += 1;
        metrics::counter!("dcb_consistency_count").increment(1);
        if expected != actual {
            tracing::warn!(
                batch = index,
                ?expected,
                ?actual,
                "Overlapping position windows disagree"
            );
            report.violations.push(MonotonicViolation::Mismatch {
                batch: index,
                previous: previous.clone(),
                current: current.clone(),
            });
        }
        previous = current;
    }

    report
}

/// Runs `readers` tasks recording tail positions until `duration` elapses.
/// Returns the number of batches recorded.
#[tracing::instrument(skip(store, recorder))]
pub async fn run_readers<S>(
    store: Arc<S>,
    recorder: PositionRecorder,
    readers: usize,
    duration: Duration,
    batch_size: usize,
) -> Result<u64>
where
    S: EventStore + 'static,
{
    let deadline = Instant::now() + duration;
    // Reading and recording under one lock keeps the log in read order.
    let ordering = Arc::new(Mutex::new(()));
    let mut tasks = JoinSet::new();

    for _ in 0..readers {
        let store = Arc::clone(&store);
        let recorder = recorder.clone();
        let ordering = Arc::clone(&ordering);
        tasks.spawn(async move {
            let mut recorded = 0u64;
            while Instant::now() < deadline {
                {
                    let _guard = ordering.lock().await;
                    let batch = read_tail_positions(store.as_ref(), batch_size).await?;
                    if !recorder.record(batch) {
                        break;
                    }
                }
                recorded += 1;
                tokio::task::yield_now().await;
            }
            Ok::<_, VerifierError>(recorded)
        });
    }
    drop(recorder);

    let mut recorded = 0;
    while let Some(joined) = tasks.join_next().await {
        recorded += joined??;
    }
    Ok(recorded)
}

/// Runs appenders and position readers side by side, then verifies the
/// recorded batches.
#[tracing::instrument(skip_all)]
pub async fn run_monotonic_check<S>(
    store: Arc<S>,
    config: &VerifierConfig,
) -> Result<MonotonicReport>
where
    S: EventStore + 'static,
{
    let seed = config.resolve_seed();
    tracing::info!(
        seed,
        appenders = config.appenders,
        readers = config.readers,
        "Starting monotonic check"
    );

    let (recorder, log) = position_log();
    let (appends, _) = tokio::try_join!(
        run_appenders(
            Arc::clone(&store),
            DcbOptions::monotonic(),
            config.appenders,
            config.duration,
            seed,
        ),
        run_readers(
            store,
            recorder,
            config.readers,
            config.duration,
            config.position_batch_size,
        ),
    )?;

    let batches = log.collect().await;
    let report = MonotonicReport {
        appends,
        ..verify_position_batches(&batches)
    };
    if report.is_monotonic() {
        tracing::info!(
            batches = report.batches,
            compared = report.compared,
            "Positions increase monotonically"
        );
    } else {
        tracing::warn!(
            batches = report.batches,
            violations = report.violations.len(),
            "Positions did not increase monotonically"
        );
    }
    Ok(report)
}
