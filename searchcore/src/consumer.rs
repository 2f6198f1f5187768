//! Normalization of heterogeneous event payloads.
//!
//! Two payload shapes are accepted:
//! - a raw entity or array of entities, where the action is the trailing
//!   dotted segment of the event name (`product.created` → `created`);
//! - an enveloped message `{"body": {"metadata": {"action": ..}, "data": ..}}`
//!   whose envelope carries both the action and the entities.

use crate::errors::SearchError;
use searchcore_types::{CanonicalEvent, EventAction, SchemaObjectEntityRepresentation};
use serde_json::Value;

fn entries(data: Value) -> Vec<Value> {
    match data {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        single => vec![single],
    }
}

fn trailing_segment(event_name: &str) -> &str {
    event_name.rsplit('.').next().unwrap_or_default()
}

/// Bring `payload` into the canonical `{action, ids, data}` shape.
///
/// Entries without a string `id` are rejected when the action is known.
/// Payloads of unknown actions are passed through so the caller can drop
/// them without failing.
pub fn normalize(
    entity: &SchemaObjectEntityRepresentation,
    payload: Value,
    event_name: &str,
) -> Result<CanonicalEvent, SearchError> {
    let (action, data) = match payload {
        Value::Object(mut message) if message.get("body").is_some_and(|b| !b.is_null()) => {
            let mut body = message.remove("body").unwrap_or_default();
            let action = body
                .pointer("/metadata/action")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let data = body.get_mut("data").map(Value::take).unwrap_or_default();
            (action, entries(data))
        }
        raw => (trailing_segment(event_name).to_string(), entries(raw)),
    };

    let known = EventAction::parse(&action).is_some();
    let mut ids = Vec::with_capacity(data.len());
    for (position, entry) in data.iter().enumerate() {
        match entry.get("id").and_then(Value::as_str) {
            Some(id) => ids.push(id.to_string()),
            None if known => {
                return Err(SearchError::InvalidPayload {
                    entity: entity.entity.to_string(),
                    detail: format!("entry {position} of a {action} event has no string id"),
                });
            }
            None => {}
        }
    }

    Ok(CanonicalEvent { action, ids, data })
}
