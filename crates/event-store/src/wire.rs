//! JSON shapes exchanged with remote event stores.
//!
//! Transport is left to the adapter; these helpers only encode requests and
//! validate responses, turning anything that does not conform into
//! [`EventStoreError::MalformedResponse`].

use serde::Serialize;

use crate::{
    AppendCondition, Event, EventStoreError, Result, SequencedEvent, store::AppendOutcome,
};

#[derive(Serialize)]
struct AppendRequest<'a> {
    events: &'a [Event],
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<&'a AppendCondition>,
}

/// Encodes the body of an append request: `{events, condition?}`.
pub fn encode_append_request(
    events: &[Event],
    condition: Option<&AppendCondition>,
) -> Result<String> {
    Ok(serde_json::to_string(&AppendRequest { events, condition })?)
}

/// Decodes and validates a read response: an array of sequenced events.
pub fn decode_read_response(body: &str) -> Result<Vec<SequencedEvent>> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| EventStoreError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let items = value
        .as_array()
        .ok_or_else(|| malformed("expected an array of events", &value))?;

    for item in items {
        let well_formed = item.get("type").is_some_and(|t| t.is_string())
            && item.get("tags").is_some_and(|t| t.is_array())
            && item.get("position").is_some_and(|p| p.is_u64());
        if !well_formed {
            return Err(malformed("invalid event", item));
        }
    }

    serde_json::from_value(value.clone()).map_err(|e| malformed(&e.to_string(), &value))
}

/// Decodes and validates an append response.
pub fn decode_append_response(body: &str) -> Result<AppendOutcome> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| EventStoreError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let well_formed = value.is_object()
        && value
            .get("durationInMicroseconds")
            .is_some_and(|d| d.is_number())
        && value
            .get("appendConditionFailed")
            .is_some_and(|f| f.is_boolean());
    if !well_formed {
        return Err(malformed("invalid append response", &value));
    }

    let duration = value["durationInMicroseconds"]
        .as_f64()
        .ok_or_else(|| malformed("invalid duration", &value))?;
    Ok(AppendOutcome {
        append_condition_failed: value["appendConditionFailed"].as_bool().unwrap_or_default(),
        duration_in_microseconds: duration.max(0.0) as u64,
    })
}

fn malformed(reason: &str, value: &serde_json::Value) -> EventStoreError {
    EventStoreError::MalformedResponse(format!("{reason}: {value}"))
}
