//! Schema-version upgrades of persisted state.
//!
//! An upgrader is a pure function from one version's untyped state to the
//! next version's. Upgraders never perform I/O.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ProviderError;

/// Migration of state persisted at `from_version` to `from_version + 1`.
#[derive(Debug, Clone, Copy)]
pub struct StateUpgrader {
    /// Version of the state this upgrader accepts.
    pub from_version: u64,
    /// The transformation.
    pub upgrade: fn(Value) -> Result<Value, ProviderError>,
}

impl StateUpgrader {
    /// Create an upgrader from `from_version`.
    pub fn new(from_version: u64, upgrade: fn(Value) -> Result<Value, ProviderError>) -> Self {
        Self {
            from_version,
            upgrade,
        }
    }

    /// An upgrader that only bumps the version.
    pub fn pass_through(from_version: u64) -> Self {
        Self::new(from_version, Ok)
    }
}

/// Bring `state` from `version` up to `current` by running every registered
/// upgrader in ascending order. Versions without an upgrader pass through.
pub fn upgrade_state(
    resource: &str,
    upgraders: &[StateUpgrader],
    version: u64,
    current: u64,
    state: Value,
) -> Result<Value, ProviderError> {
    if version > current {
        return Err(ProviderError::Validation(format!(
            "state of {} has schema version {}, newer than the supported version {}",
            resource, version, current
        )));
    }

    let mut upgraders: Vec<&StateUpgrader> = upgraders
        .iter()
        .filter(|u| u.from_version >= version && u.from_version < current)
        .collect();
    upgraders.sort_by_key(|u| u.from_version);

    let mut state = state;
    for upgrader in upgraders {
        debug!(
            resource = resource,
            from_version = upgrader.from_version,
            "Upgrading state"
        );
        state = (upgrader.upgrade)(state)?;
    }
    Ok(state)
}

// ============================================================================
// Shape helpers
// ============================================================================

/// Replace one-element lists under `fields` by their element and empty lists
/// by null. Older state encoded single nested blocks as lists.
pub fn unwrap_single_blocks(state: Value, fields: &[&str]) -> Result<Value, ProviderError> {
    let mut map = into_object(state)?;
    for field in fields {
        if let Some(value) = map.get_mut(*field) {
            if let Value::Array(items) = value {
                *value = match items.len() {
                    0 => Value::Null,
                    1 => items.remove(0),
                    n => {
                        return Err(ProviderError::Validation(format!(
                            "cannot upgrade {}: expected at most one block, found {}",
                            field, n
                        )))
                    },
                };
            }
        }
    }
    Ok(Value::Object(map))
}

/// Move the value of attribute `from` to `to`, unless `to` is already set.
pub fn rename_attribute(state: Value, from: &str, to: &str) -> Result<Value, ProviderError> {
    let mut map = into_object(state)?;
    if let Some(value) = map.remove(from) {
        let target_set = map.get(to).is_some_and(|v| !v.is_null());
        if !target_set {
            map.insert(to.to_string(), value);
        }
    }
    Ok(Value::Object(map))
}

fn into_object(state: Value) -> Result<Map<String, Value>, ProviderError> {
    match state {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ProviderError::Validation(format!(
            "expected state to be an object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_marker(state: Value) -> Result<Value, ProviderError> {
        let mut map = into_object(state)?;
        let count = map.get("marker").and_then(Value::as_i64).unwrap_or(0);
        map.insert("marker".to_string(), json!(count + 1));
        Ok(Value::Object(map))
    }

    #[test]
    fn test_upgraders_run_in_order_from_stored_version() {
        let upgraders = [
            StateUpgrader::new(1, |s| rename_attribute(s, "label", "name")),
            StateUpgrader::new(0, add_marker),
        ];

        let state = upgrade_state("thing", &upgraders, 0, 2, json!({"label": "x"})).unwrap();
        assert_eq!(state, json!({"name": "x", "marker": 1}));

        let state = upgrade_state("thing", &upgraders, 1, 2, json!({"label": "x"})).unwrap();
        assert_eq!(state, json!({"name": "x"}));
    }

    #[test]
    fn test_current_version_is_unchanged() {
        let upgraders = [StateUpgrader::new(0, add_marker)];
        let state = json!({"name": "x"});
        assert_eq!(
            upgrade_state("thing", &upgraders, 1, 1, state.clone()).unwrap(),
            state
        );
    }

    #[test]
    fn test_newer_state_rejected() {
        let err = upgrade_state("thing", &[], 3, 1, json!({})).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_unwrap_single_blocks() {
        let state = json!({
            "name": "ops",
            "email": [{"emails": ["a@b.c"]}],
            "slack": [],
            "webhook": null
        });
        let upgraded = unwrap_single_blocks(state, &["email", "slack", "webhook"]).unwrap();
        assert_eq!(
            upgraded,
            json!({
                "name": "ops",
                "email": {"emails": ["a@b.c"]},
                "slack": null,
                "webhook": null
            })
        );

        let err = unwrap_single_blocks(json!({"email": [{}, {}]}), &["email"]).unwrap_err();
        assert!(err.message().contains("email"));
    }

    #[test]
    fn test_rename_attribute_keeps_existing_target() {
        let state = rename_attribute(json!({"full_name": "a", "name": "b"}), "full_name", "name")
            .unwrap();
        assert_eq!(state, json!({"name": "b"}));

        let state = rename_attribute(json!({"full_name": "a"}), "full_name", "name").unwrap();
        assert_eq!(state, json!({"name": "a"}));
    }

    #[test]
    fn test_pass_through() {
        let upgrader = StateUpgrader::pass_through(0);
        assert_eq!((upgrader.upgrade)(json!({"a": 1})).unwrap(), json!({"a": 1}));
    }
}
