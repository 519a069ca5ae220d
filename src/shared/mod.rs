//! Building blocks shared by several entity mappers.

pub mod alert_channels;
pub mod custom_payload;
pub mod severity;
pub mod tags;
pub mod threshold;

pub use alert_channels::AlertChannelsState;
pub use custom_payload::{CustomPayloadField, CustomPayloadFieldState};
pub use severity::Severity;
pub use threshold::{RuleWithThreshold, ThresholdRule, ThresholdsState};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ProviderError;

/// Read a typed model out of a state or configuration document.
///
/// Shape mismatches are reported as invalid configuration.
pub fn from_state<T: DeserializeOwned>(state: &Value) -> Result<T, ProviderError> {
    T::deserialize(state).map_err(|e| ProviderError::InvalidConfig(e.to_string()))
}

/// Render a typed model as a state document.
pub fn to_state<T: Serialize>(model: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(model)?)
}

/// `deserialize_with` helper reading an explicit `null` as the default value.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Encode a `{name: value}` header map as `["name: value", ...]`, sorted by name.
pub fn headers_to_list(headers: &std::collections::BTreeMap<String, String>) -> Vec<String> {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect()
}

/// Decode `["name: value", ...]` into a header map. Entries without a colon
/// map to an empty value.
pub fn headers_from_list(headers: &[String]) -> std::collections::BTreeMap<String, String> {
    headers
        .iter()
        .map(|header| match header.split_once(':') {
            Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
            None => (header.trim().to_string(), String::new()),
        })
        .collect()
}
