//! Raw API responses and their flattened attribute view.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Response fields that describe the call rather than the device.
pub const DISCARD: [&str; 5] = ["code", "msg", "requestId", "success", "dataList"];

const DATA_LIST: &str = "dataList";
const DEVICE_STATE: &str = "deviceState";

/// Flattened `name -> value` view of a response's `dataList`.
pub type AttributeMap = Map<String, Value>;

/// A decoded station or device response.
///
/// The field set is defined by the server, so the body is kept as a loosely
/// typed JSON object instead of a fixed record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawResponse(Map<String, Value>);

impl RawResponse {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// `deviceState` of a device response, `0` when absent.
    pub fn device_state(&self) -> Value {
        self.0
            .get(DEVICE_STATE)
            .cloned()
            .unwrap_or_else(|| Value::from(0))
    }

    pub fn is_online(&self) -> bool {
        self.device_state().as_f64() == Some(1.0)
    }

    /// Reports `success: false` responses together with the server message.
    pub fn failure_message(&self) -> Option<&str> {
        match self.0.get("success") {
            Some(Value::Bool(false)) => Some(
                self.0
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or("no message"),
            ),
            _ => None,
        }
    }

    /// Top-level fields worth publishing: everything that is not null and
    /// not part of [`DISCARD`].
    pub fn publishable(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0
            .iter()
            .filter(|(key, value)| !value.is_null() && !DISCARD.contains(&key.as_str()))
            .map(|(key, value)| (key.as_str(), value))
    }
}

/// Flattens the `dataList` of `{key, name, value}` triples into a map keyed
/// by the entry name, with spaces replaced by underscores.
///
/// `key` is dropped and values are copied untouched. Entries without a
/// string `name` are skipped. A missing or empty list yields an empty map.
pub fn restructure(raw: &RawResponse) -> AttributeMap {
    let Some(Value::Array(entries)) = raw.get(DATA_LIST) else {
        return AttributeMap::new();
    };

    let mut attributes = AttributeMap::new();
    for entry in entries {
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            log::debug!("skipping dataList entry without a name: {entry}");
            continue;
        };
        let value = entry.get("value").cloned().unwrap_or(Value::Null);
        attributes.insert(name.replace(' ', "_"), value);
    }
    attributes
}
