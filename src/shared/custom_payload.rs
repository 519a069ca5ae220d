//! Custom payload fields attached to alert configurations.
//!
//! In state a field is `{key, value}` for a literal string or
//! `{key, dynamic_value: {tag_name, key?}}` for a tag reference. On the wire
//! the same field is `{type: "staticString", key, value: "..."}` or
//! `{type: "dynamic", key, value: {tagName, key?}}`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock};

/// State attribute holding the custom payload fields.
pub const CUSTOM_PAYLOAD_FIELD: &str = "custom_payload_field";

/// A custom payload field as stored in state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPayloadFieldState {
    /// Field key, unique within one list.
    pub key: String,
    /// Literal value of a static field.
    #[serde(default)]
    pub value: Option<String>,
    /// Tag reference of a dynamic field.
    #[serde(default)]
    pub dynamic_value: Option<DynamicValueState>,
}

/// Tag reference of a dynamic field, in state form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicValueState {
    /// Name of the referenced tag.
    pub tag_name: String,
    /// Key of a key/value tag.
    #[serde(default)]
    pub key: Option<String>,
}

/// A custom payload field as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CustomPayloadField {
    /// A literal string value.
    #[serde(rename = "staticString")]
    Static {
        /// Field key.
        key: String,
        /// Literal value.
        value: String,
    },
    /// A value resolved from a tag at alert time.
    #[serde(rename = "dynamic")]
    Dynamic {
        /// Field key.
        key: String,
        /// Referenced tag.
        value: DynamicValue,
    },
}

impl CustomPayloadField {
    /// The field key.
    pub fn key(&self) -> &str {
        match self {
            Self::Static { key, .. } | Self::Dynamic { key, .. } => key,
        }
    }
}

/// Tag reference of a dynamic field, in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicValue {
    /// Name of the referenced tag.
    pub tag_name: String,
    /// Key of a key/value tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Convert state fields to wire fields, preserving order.
pub fn to_wire(fields: &[CustomPayloadFieldState]) -> Result<Vec<CustomPayloadField>, ProviderError> {
    ensure_unique_keys(fields.iter().map(|f| f.key.as_str()))?;

    fields
        .iter()
        .enumerate()
        .map(|(index, field)| match (&field.value, &field.dynamic_value) {
            (None, Some(dynamic)) => {
                if dynamic.tag_name.is_empty() {
                    return Err(ProviderError::InvalidConfig(format!(
                        "{}.{}.dynamic_value.tag_name must not be empty",
                        CUSTOM_PAYLOAD_FIELD, index
                    )));
                }
                Ok(CustomPayloadField::Dynamic {
                    key: field.key.clone(),
                    value: DynamicValue {
                        tag_name: dynamic.tag_name.clone(),
                        key: dynamic.key.clone().filter(|k| !k.is_empty()),
                    },
                })
            },
            (Some(value), None) => Ok(CustomPayloadField::Static {
                key: field.key.clone(),
                value: value.clone(),
            }),
            (Some(_), Some(_)) => Err(ProviderError::InvalidConfig(format!(
                "{}.{}: value and dynamic_value are mutually exclusive",
                CUSTOM_PAYLOAD_FIELD, index
            ))),
            (None, None) => Err(ProviderError::InvalidConfig(format!(
                "{}.{}: either value or dynamic_value must be set",
                CUSTOM_PAYLOAD_FIELD, index
            ))),
        })
        .collect()
}

/// Convert wire fields to state fields, preserving order.
pub fn to_state(fields: &[CustomPayloadField]) -> Result<Vec<CustomPayloadFieldState>, ProviderError> {
    ensure_unique_keys(fields.iter().map(CustomPayloadField::key))?;

    Ok(fields
        .iter()
        .map(|field| match field {
            CustomPayloadField::Static { key, value } => CustomPayloadFieldState {
                key: key.clone(),
                value: Some(value.clone()),
                dynamic_value: None,
            },
            CustomPayloadField::Dynamic { key, value } => CustomPayloadFieldState {
                key: key.clone(),
                value: None,
                dynamic_value: Some(DynamicValueState {
                    tag_name: value.tag_name.clone(),
                    key: value.key.clone(),
                }),
            },
        })
        .collect())
}

fn ensure_unique_keys<'a>(keys: impl Iterator<Item = &'a str>) -> Result<(), ProviderError> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(ProviderError::InvalidConfig(format!(
                "duplicate custom payload field key '{}'",
                key
            )));
        }
    }
    Ok(())
}

/// Schema block of the custom payload field list.
///
/// The list is a set: ordering does not produce a diff.
pub fn schema_block() -> NestedBlock {
    NestedBlock::set(
        Block::new()
            .with_description("Custom payload fields attached to alerts")
            .with_attribute(
                "key",
                Attribute::required_string().with_description("The key of the custom payload field"),
            )
            .with_attribute(
                "value",
                Attribute::optional_string().with_description("The literal value of a static field"),
            )
            .with_block(
                "dynamic_value",
                NestedBlock::single(
                    Block::new()
                        .with_attribute(
                            "tag_name",
                            Attribute::required_string()
                                .with_description("The name of the tag resolved at alert time"),
                        )
                        .with_attribute(
                            "key",
                            Attribute::optional_string()
                                .with_description("The key of a key/value tag"),
                        ),
                ),
            )
            .with_exactly_one_of(["value", "dynamic_value"]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn static_field(key: &str, value: &str) -> CustomPayloadFieldState {
        CustomPayloadFieldState {
            key: key.to_string(),
            value: Some(value.to_string()),
            dynamic_value: None,
        }
    }

    fn dynamic_field(key: &str, tag_name: &str, tag_key: Option<&str>) -> CustomPayloadFieldState {
        CustomPayloadFieldState {
            key: key.to_string(),
            value: None,
            dynamic_value: Some(DynamicValueState {
                tag_name: tag_name.to_string(),
                key: tag_key.map(str::to_string),
            }),
        }
    }

    #[test]
    fn test_to_wire_preserves_order_and_shape() {
        let wire = to_wire(&[
            static_field("test1", "foo"),
            dynamic_field("test2", "dynamic-value-tag-name", Some("dynamic-value-key")),
        ])
        .unwrap();

        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!([
                {"type": "staticString", "key": "test1", "value": "foo"},
                {
                    "type": "dynamic",
                    "key": "test2",
                    "value": {"tagName": "dynamic-value-tag-name", "key": "dynamic-value-key"}
                }
            ])
        );
    }

    #[test]
    fn test_to_state_from_server_payload() {
        let wire: Vec<CustomPayloadField> = serde_json::from_value(json!([
            {"type": "dynamic", "key": "b", "value": {"tagName": "host.name"}},
            {"type": "staticString", "key": "a", "value": "x"}
        ]))
        .unwrap();

        let state = to_state(&wire).unwrap();
        assert_eq!(state, vec![dynamic_field("b", "host.name", None), static_field("a", "x")]);
    }

    #[test]
    fn test_empty_dynamic_key_is_dropped() {
        let wire = to_wire(&[dynamic_field("k", "tag", Some(""))]).unwrap();
        assert_eq!(
            wire[0],
            CustomPayloadField::Dynamic {
                key: "k".to_string(),
                value: DynamicValue {
                    tag_name: "tag".to_string(),
                    key: None
                }
            }
        );
    }

    #[test]
    fn test_duplicate_keys_rejected_both_ways() {
        let err = to_wire(&[static_field("a", "1"), static_field("a", "2")]).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig(_)));
        assert!(err.message().contains("'a'"));

        let wire = vec![
            CustomPayloadField::Static {
                key: "a".to_string(),
                value: "1".to_string(),
            },
            CustomPayloadField::Static {
                key: "a".to_string(),
                value: "2".to_string(),
            },
        ];
        assert!(matches!(to_state(&wire), Err(ProviderError::InvalidConfig(_))));
    }

    #[test]
    fn test_value_shapes_rejected() {
        let mut both = static_field("a", "1");
        both.dynamic_value = Some(DynamicValueState {
            tag_name: "t".to_string(),
            key: None,
        });
        assert!(to_wire(&[both]).is_err());

        let neither = CustomPayloadFieldState {
            key: "a".to_string(),
            value: None,
            dynamic_value: None,
        };
        assert!(to_wire(&[neither]).is_err());

        assert!(to_wire(&[dynamic_field("a", "", None)]).is_err());
    }

    #[test]
    fn test_schema_block_validates_variants() {
        use crate::schema::Schema;
        use crate::validation::validate;

        let schema = Schema::v0().with_block(CUSTOM_PAYLOAD_FIELD, schema_block());
        assert!(validate(
            &schema,
            &json!({CUSTOM_PAYLOAD_FIELD: [{"key": "a", "value": "x"}]})
        )
        .is_empty());
        assert_eq!(
            validate(&schema, &json!({CUSTOM_PAYLOAD_FIELD: [{"key": "a"}]})).len(),
            1
        );
    }
}
