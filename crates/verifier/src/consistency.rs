//! Append-condition soundness check.
//!
//! Appenders race condition-guarded appends. Each batch records, in its
//! first event, the query it was guarded by and the last matching position
//! it observed. Once appending stops, verifiers recompute that position
//! from the log: a successful append must not have missed any matching
//! event committed before it.

use std::sync::Arc;

use event_store::{EventStore, Position, Query, ReadOptions, SequencedEvent};
use tokio::task::JoinSet;

use crate::appender::{AppendStats, run_appenders};
use crate::config::VerifierConfig;
use crate::error::{Result, VerifierError};
use crate::fixture::{BatchMetadata, DcbOptions};

/// A batch whose recorded last matching position disagrees with the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyViolation {
    /// Position of the first event of the batch.
    pub position: Position,
    /// Last matching position the appender observed.
    pub recorded: Position,
    /// Last matching position strictly before the batch, per the log.
    pub actual: Position,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub appends: AppendStats,
    /// Batch-start events whose metadata was verified.
    pub checked: u64,
    pub violations: Vec<ConsistencyViolation>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Returns the position of the last event matching `query` strictly before
/// `before`, or the initial position if there is none.
pub async fn last_matching_before<S>(store: &S, query: &Query, before: Position) -> Result<Position>
where
    S: EventStore + ?Sized,
{
    if before.as_u64() <= 1 {
        return Ok(Position::initial());
    }
    let options = ReadOptions::backwards()
        .from(Position::new(before.as_u64() - 1))
        .limit(1);
    let last = store.read(query, options).await?.last_position();
    Ok(last.unwrap_or(Position::initial()))
}

/// Verifies one event. Events that do not start a batch yield `Ok(None)`
/// without being counted.
pub async fn verify_event<S>(
    store: &S,
    event: &SequencedEvent,
) -> Result<Option<std::result::Result<(), ConsistencyViolation>>>
where
    S: EventStore + ?Sized,
{
    let metadata: BatchMetadata =
        event
            .event
            .data_as()
            .map_err(|e| VerifierError::MalformedBatch {
                position: event.position,
                reason: e.to_string(),
            })?;
    if !metadata.is_batch_start() {
        return Ok(None);
    }

    let (Some(query), Some(recorded)) = (metadata.query, metadata.last_matching_event_position)
    else {
        return Err(VerifierError::MalformedBatch {
            position: event.position,
            reason: "batch start without query or last matching position".to_string(),
        });
    };

    let actual = last_matching_before(store, &query, event.position).await?;
    metrics::counter!("dcb_consistency_count").increment(1);

    if actual == recorded {
        return Ok(Some(Ok(())));
    }
    tracing::warn!(
        position = %event.position,
        %recorded,
        %actual,
        "Event position mismatch"
    );
    Ok(Some(Err(ConsistencyViolation {
        position: event.position,
        recorded,
        actual,
    })))
}

/// Checks the events at positions `1..=iterations`, shared among
/// `verifiers` tasks.
#[tracing::instrument(skip(store))]
pub async fn verify_consistency<S>(
    store: Arc<S>,
    verifiers: usize,
    iterations: usize,
) -> Result<(u64, Vec<ConsistencyViolation>)>
where
    S: EventStore + 'static,
{
    let verifiers = verifiers.max(1);
    let mut tasks = JoinSet::new();

    for worker in 0..verifiers {
        let store = Arc::clone(&store);
        tasks.spawn(async move {
            let mut checked = 0u64;
            let mut violations = Vec::new();
            for position in (1..=iterations as u64).skip(worker).step_by(verifiers) {
                let options = ReadOptions::forward().from(Position::new(position)).limit(1);
                let Some(event) = store.read(&Query::all(), options).await?.into_iter().next()
                else {
                    break;
                };
                match verify_event(store.as_ref(), &event).await? {
                    None => {}
                    Some(Ok(())) => checked += 1,
                    Some(Err(violation)) => {
                        checked += 1;
                        violations.push(violation);
                    }
                }
            }
            Ok::<_, VerifierError>((checked, violations))
        });
    }

    let mut checked = 0;
    let mut violations = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (worker_checked, worker_violations) = joined??;
        checked += worker_checked;
        violations.extend(worker_violations);
    }
    violations.sort_by_key(|v| v.position);

    Ok((checked, violations))
}

/// Runs appenders for the configured duration, then verifies the log.
#[tracing::instrument(skip_all)]
pub async fn run_consistency_check<S>(
    store: Arc<S>,
    config: &VerifierConfig,
) -> Result<ConsistencyReport>
where
    S: EventStore + 'static,
{
    let seed = config.resolve_seed();
    tracing::info!(seed, appenders = config.appenders, "Starting consistency check");

    let appends = run_appenders(
        Arc::clone(&store),
        DcbOptions::consistency(),
        config.appenders,
        config.duration,
        seed,
    )
    .await?;
    let (checked, violations) =
        verify_consistency(store, config.verifiers, config.verify_iterations).await?;

    let report = ConsistencyReport {
        appends,
        checked,
        violations,
    };
    if report.is_consistent() {
        tracing::info!(checked, "Append condition is met");
    } else {
        tracing::warn!(
            checked,
            violations = report.violations.len(),
            "Append condition violated"
        );
    }
    Ok(report)
}
