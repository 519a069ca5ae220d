//! Lenient decoding of free-form tag lists.
//!
//! The API returns `tags` as `null`, a list of strings, or a list of mixed
//! scalars. All three decode to an optional list of strings.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `deserialize_with` helper for `Option<Vec<String>>` tag fields.
pub fn deserialize_tags<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(raw.map(|values| values.iter().filter_map(tag_to_string).collect()))
}

fn tag_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn split_csv(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
