//! Built-in event specification lookup by name and plugin.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::datasource::{merge_into, required_string, DataSourceMetadata, LookupHandle, LookupKey};
use crate::error::ProviderError;
use crate::restapi::{WireModel, BUILTIN_EVENT_SPECIFICATIONS_PATH};
use crate::schema::{Attribute, Schema};
use crate::shared::Severity;

/// Data source name of built-in events.
pub const DATA_SOURCE_NAME: &str = "builtin_event";

/// A built-in event specification as listed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltinEventSpecification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub short_plugin_id: String,
    pub severity: i64,
    #[serde(default)]
    pub triggering: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl WireModel for BuiltinEventSpecification {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

fn data_source_schema() -> Schema {
    Schema::v0()
        .with_description("Looks up a built-in event specification")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute(
            "short_plugin_id",
            Attribute::required_string().with_description("The plugin the event belongs to"),
        )
        .with_attribute("description", Attribute::computed_string())
        .with_attribute(
            "severity",
            Attribute::computed_string().with_description("warning or critical"),
        )
        .with_attribute("severity_code", Attribute::computed_int64())
        .with_attribute("triggering", Attribute::computed_bool())
        .with_attribute("enabled", Attribute::computed_bool())
}

/// Lookup handle of built-in events.
pub struct BuiltinEventDataSource {
    metadata: DataSourceMetadata,
}

impl BuiltinEventDataSource {
    pub fn new() -> Self {
        Self {
            metadata: DataSourceMetadata::new(
                DATA_SOURCE_NAME,
                data_source_schema(),
                BUILTIN_EVENT_SPECIFICATIONS_PATH,
            ),
        }
    }
}

impl Default for BuiltinEventDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupHandle for BuiltinEventDataSource {
    type Wire = BuiltinEventSpecification;

    fn metadata(&self) -> &DataSourceMetadata {
        &self.metadata
    }

    fn lookup_key(&self, config: &Value) -> Result<LookupKey, ProviderError> {
        Ok(LookupKey::new()
            .exact("name", required_string(config, "name")?)
            .exact("short_plugin_id", required_string(config, "short_plugin_id")?))
    }

    fn candidate<'a>(&self, wire: &'a BuiltinEventSpecification, part: &str) -> Option<&'a str> {
        match part {
            "name" => Some(wire.name.as_str()),
            "short_plugin_id" => Some(wire.short_plugin_id.as_str()),
            _ => None,
        }
    }

    fn map_wire_to_state(
        &self,
        config: &Value,
        wire: &BuiltinEventSpecification,
    ) -> Result<Value, ProviderError> {
        let severity = Severity::from_code(wire.severity)?;
        Ok(merge_into(
            config,
            json!({
                "id": wire.id,
                "description": wire.description,
                "severity": severity.as_str(),
                "severity_code": wire.severity,
                "triggering": wire.triggering,
                "enabled": wire.enabled,
            }),
        ))
    }
}
