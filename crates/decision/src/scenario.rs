//! Given/when/then scenarios for command handlers.
//!
//! Each scenario starts from an empty store, appends its `given` events,
//! dispatches its command and compares what happened against the
//! expectation.

use async_trait::async_trait;
use event_store::{Event, EventStore, InMemoryEventStore, Query, ReadOptions};
use serde_json::Value;

/// Dispatches commands of type `C` to their handlers.
#[async_trait]
pub trait CommandDispatcher<C: Send + 'static>: Send + Sync {
    type Error: std::fmt::Display + Send;

    async fn dispatch(&self, command: C) -> Result<(), Self::Error>;
}

/// A single given/when/then case.
#[derive(Debug, Clone)]
pub struct Scenario<C> {
    pub description: String,
    pub given: Vec<Event>,
    pub when: C,
    /// Partially matched against the first event the command appended.
    pub expected_event: Option<Event>,
    /// Compared verbatim against the error message.
    pub expected_error: Option<String>,
}

impl<C> Scenario<C> {
    pub fn new(description: impl Into<String>, when: impl Into<C>) -> Self {
        Self {
            description: description.into(),
            given: Vec::new(),
            when: when.into(),
            expected_event: None,
            expected_error: None,
        }
    }

    pub fn given(mut self, events: impl IntoIterator<Item = Event>) -> Self {
        self.given.extend(events);
        self
    }

    pub fn then_event(mut self, event: Event) -> Self {
        self.expected_event = Some(event);
        self
    }

    pub fn then_error(mut self, message: impl Into<String>) -> Self {
        self.expected_error = Some(message.into());
        self
    }
}

/// Outcome of one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub description: String,
    pub passed: bool,
    /// Why the scenario failed.
    pub message: Option<String>,
}

impl ScenarioReport {
    fn pass(description: &str) -> Self {
        Self {
            description: description.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(description: &str, message: String) -> Self {
        Self {
            description: description.to_string(),
            passed: false,
            message: Some(message),
        }
    }
}

/// Runs every scenario in order against `store`, which is reset before each.
///
/// `dispatcher` must write to the same store.
pub async fn run_scenarios<C, D>(
    store: &InMemoryEventStore,
    dispatcher: &D,
    scenarios: Vec<Scenario<C>>,
) -> event_store::Result<Vec<ScenarioReport>>
where
    C: Send + 'static,
    D: CommandDispatcher<C>,
{
    let mut reports = Vec::with_capacity(scenarios.len());

    for scenario in scenarios {
        store.reset().await;
        let report = run_scenario(store, dispatcher, scenario).await?;
        if report.passed {
            tracing::info!(scenario = %report.description, "Scenario passed");
        } else {
            tracing::warn!(
                scenario = %report.description,
                reason = report.message.as_deref().unwrap_or_default(),
                "Scenario failed"
            );
        }
        reports.push(report);
    }

    Ok(reports)
}

async fn run_scenario<C, D>(
    store: &InMemoryEventStore,
    dispatcher: &D,
    scenario: Scenario<C>,
) -> event_store::Result<ScenarioReport>
where
    C: Send + 'static,
    D: CommandDispatcher<C>,
{
    let Scenario {
        description,
        given,
        when,
        expected_event,
        expected_error,
    } = scenario;

    let last_given = if given.is_empty() {
        None
    } else {
        Some(store.append(given, None).await?)
    };

    if let Err(e) = dispatcher.dispatch(when).await {
        let message = e.to_string();
        return Ok(match expected_error {
            None => ScenarioReport::fail(
                &description,
                format!("expected no error, but got '{message}'"),
            ),
            Some(expected) if expected != message => ScenarioReport::fail(
                &description,
                format!("expected error '{expected}' but got '{message}'"),
            ),
            Some(_) => ScenarioReport::pass(&description),
        });
    }

    if let Some(expected) = expected_event {
        let options = match last_given {
            Some(position) => ReadOptions::forward().from(position.next()),
            None => ReadOptions::forward(),
        };
        let new_events = store.read(&Query::all(), options).await?;
        let actual = new_events.first().map(|e| e.event.clone());

        let expected_json = serde_json::to_value(&expected)?;
        let actual_json = serde_json::to_value(&actual)?;
        if !partial_deep_eq(&expected_json, &actual_json) {
            return Ok(ScenarioReport::fail(
                &description,
                format!("expected event {expected_json} but got {actual_json}"),
            ));
        }
    }

    Ok(match expected_error {
        Some(expected) => ScenarioReport::fail(
            &description,
            format!("expected error '{expected}' but none was thrown"),
        ),
        None => ScenarioReport::pass(&description),
    })
}

/// Returns true if every field present in `expected` is present and equal in
/// `actual`. Array elements are compared by index; extra elements in `actual`
/// are ignored.
pub fn partial_deep_eq(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => expected
            .iter()
            .all(|(key, value)| actual.get(key).is_some_and(|a| partial_deep_eq(value, a))),
        (Value::Array(expected), Value::Array(actual)) => {
            expected.len() <= actual.len()
                && expected
                    .iter()
                    .zip(actual)
                    .all(|(e, a)| partial_deep_eq(e, a))
        }
        _ => expected == actual,
    }
}
