//! Condition-guarded append traffic shared by both checks.

use std::sync::Arc;
use std::time::Duration;

use event_store::{AppendCondition, EventStore, EventStoreError, EventStoreExt, Position};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::error::{Result, VerifierError};
use crate::fixture::{DcbOptions, Fixture};

/// Counts of appends issued by the appender tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendStats {
    pub appends: u64,
    pub failed: u64,
}

impl AppendStats {
    pub fn succeeded(&self) -> u64 {
        self.appends - self.failed
    }

    fn record(&mut self, condition_failed: bool) {
        self.appends += 1;
        if condition_failed {
            self.failed += 1;
        }
    }

    fn merge(&mut self, other: AppendStats) {
        self.appends += other.appends;
        self.failed += other.failed;
    }
}

/// Reads the last event matching a fresh query and appends a batch guarded
/// by it. Returns true if the append condition failed.
pub async fn append_once<S>(store: &S, fixture: &mut Fixture) -> Result<bool>
where
    S: EventStore + ?Sized,
{
    let query = fixture.create_query();
    let last_matching = store
        .read_last_event(&query)
        .await?
        .map_or(Position::initial(), |event| event.position);

    let events = fixture
        .create_events(&query, last_matching)
        .map_err(EventStoreError::from)?;
    let condition = AppendCondition::fail_if_events_match(query).after(last_matching);
    let outcome = store.try_append(events, Some(condition)).await?;

    metrics::counter!("dcb_append_count").increment(1);
    if outcome.append_condition_failed {
        metrics::counter!("dcb_append_error_rate").increment(1);
    }
    metrics::histogram!("dcb_append_duration_seconds")
        .record(outcome.duration_in_microseconds as f64 / 1_000_000.0);

    Ok(outcome.append_condition_failed)
}

/// Runs `workers` appender tasks against `store` until `duration` elapses.
///
/// Worker `i` draws from a fixture seeded with `seed + i`.
#[tracing::instrument(skip(store, options))]
pub async fn run_appenders<S>(
    store: Arc<S>,
    options: DcbOptions,
    workers: usize,
    duration: Duration,
    seed: u64,
) -> Result<AppendStats>
where
    S: EventStore + 'static,
{
    let deadline = Instant::now() + duration;
    let mut tasks = JoinSet::new();

    for worker in 0..workers {
        let store = Arc::clone(&store);
        let mut fixture = Fixture::new(options, seed.wrapping_add(worker as u64));
        tasks.spawn(async move {
            let mut stats = AppendStats::default();
            while Instant::now() < deadline {
                let failed = append_once(store.as_ref(), &mut fixture).await?;
                stats.record(failed);
                tokio::task::yield_now().await;
            }
            Ok::<_, VerifierError>(stats)
        });
    }

    let mut total = AppendStats::default();
    while let Some(joined) = tasks.join_next().await {
        total.merge(joined??);
    }

    tracing::info!(appends = total.appends, failed = total.failed, "Appenders finished");
    Ok(total)
}
