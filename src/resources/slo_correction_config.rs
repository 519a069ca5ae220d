//! SLO correction windows: periods excluded from SLO evaluation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, SLO_CORRECTION_CONFIGS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::{from_state, nullable, to_state};

/// Resource name of SLO correction configurations.
pub const RESOURCE_NAME: &str = "slo_correction_config";

/// Duration units as written in configuration. The API expects them upper-cased.
pub const DURATION_UNITS: [&str; 7] = [
    "millisecond",
    "second",
    "minute",
    "hour",
    "day",
    "week",
    "month",
];

const MAX_NAME_LENGTH: usize = 256;

/// An SLO correction configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloCorrectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub active: bool,
    pub scheduling: Scheduling,
    #[serde(default, deserialize_with = "nullable")]
    pub slo_ids: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
}

impl WireModel for SloCorrectionConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    pub start_time: i64,
    pub duration: i64,
    pub duration_unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrent_rule: Option<String>,
    #[serde(default)]
    pub recurrent: bool,
}

/// Host state of an SLO correction configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SloCorrectionConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub active: bool,
    pub scheduling: SchedulingState,
    #[serde(default)]
    pub slo_ids: Vec<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingState {
    pub start_time: i64,
    pub duration: i64,
    pub duration_unit: String,
    #[serde(default)]
    pub recurrent_rule: Option<String>,
    #[serde(default)]
    pub recurrent: Option<bool>,
}

pub fn state_to_wire(state: &SloCorrectionConfigState) -> SloCorrectionConfig {
    let scheduling = &state.scheduling;
    SloCorrectionConfig {
        id: state.id.clone(),
        name: state.name.clone(),
        description: state.description.clone(),
        active: state.active,
        scheduling: Scheduling {
            start_time: scheduling.start_time,
            duration: scheduling.duration,
            duration_unit: scheduling.duration_unit.to_uppercase(),
            recurrent_rule: scheduling.recurrent_rule.clone(),
            recurrent: scheduling.recurrent.unwrap_or(false),
        },
        slo_ids: state.slo_ids.clone(),
        tags: state.tags.clone().unwrap_or_default(),
    }
}

pub fn wire_to_state(wire: &SloCorrectionConfig) -> SloCorrectionConfigState {
    let scheduling = &wire.scheduling;
    SloCorrectionConfigState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        description: wire.description.clone(),
        active: wire.active,
        scheduling: SchedulingState {
            start_time: scheduling.start_time,
            duration: scheduling.duration,
            duration_unit: scheduling.duration_unit.to_lowercase(),
            recurrent_rule: scheduling.recurrent_rule.clone().filter(|r| !r.is_empty()),
            recurrent: Some(scheduling.recurrent),
        },
        slo_ids: wire.slo_ids.clone(),
        tags: (!wire.tags.is_empty()).then(|| wire.tags.clone()),
    }
}

fn resource_schema() -> Schema {
    let scheduling = Block::new()
        .with_attribute(
            "start_time",
            Attribute::required_int64().with_description("Start of the window in epoch milliseconds"),
        )
        .with_attribute("duration", Attribute::required_int64())
        .with_attribute(
            "duration_unit",
            Attribute::required_string().with_allowed_values(DURATION_UNITS),
        )
        .with_attribute("recurrent_rule", Attribute::optional_string())
        .with_attribute(
            "recurrent",
            Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed()),
        );

    Schema::v0()
        .with_description("SLO correction configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("description", Attribute::required_string())
        .with_attribute("active", Attribute::required_bool())
        .with_attribute(
            "slo_ids",
            Attribute::new(
                AttributeType::set(AttributeType::String),
                AttributeFlags::required(),
            )
            .with_description("SLOs the correction applies to"),
        )
        .with_attribute("tags", Attribute::optional_string_set())
        .with_block("scheduling", NestedBlock::single(scheduling).with_min_items(1))
}

/// Resource handle of SLO correction configurations.
pub struct SloCorrectionConfigResource {
    metadata: ResourceMetadata,
}

impl SloCorrectionConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                SLO_CORRECTION_CONFIGS_PATH,
                WriteMode::PostPut,
            ),
        }
    }
}

impl Default for SloCorrectionConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for SloCorrectionConfigResource {
    type Wire = SloCorrectionConfig;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if let Some(name) = config.get("name").and_then(Value::as_str) {
            if name.chars().count() > MAX_NAME_LENGTH {
                diagnostics.push(
                    Diagnostic::error("Name too long")
                        .with_detail(format!("at most {} characters are allowed", MAX_NAME_LENGTH))
                        .with_attribute("name"),
                );
            }
        }
        let duration = config
            .get("scheduling")
            .and_then(|s| s.get("duration"))
            .and_then(Value::as_i64);
        if duration.is_some_and(|d| d <= 0) {
            diagnostics.push(
                Diagnostic::error("Invalid duration")
                    .with_detail("the correction window must have a positive duration")
                    .with_attribute("scheduling.duration"),
            );
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<SloCorrectionConfig, ProviderError> {
        Ok(state_to_wire(&from_state(state)?))
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &SloCorrectionConfig,
    ) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resourcehandle::{ManagedResource, Resource};
    use crate::restapi::{ClientConfig, RestClient};
    use crate::testing::MockInstanaServer;
    use serde_json::json;

    fn planned() -> Value {
        json!({
            "name": "release freeze",
            "description": "planned downtime",
            "active": true,
            "slo_ids": ["slo1", "slo2"],
            "tags": null,
            "scheduling": {
                "start_time": 1700000000000i64,
                "duration": 2,
                "duration_unit": "hour",
                "recurrent_rule": null,
                "recurrent": null
            }
        })
    }

    #[test]
    fn test_duration_unit_case() {
        let wire = SloCorrectionConfigResource::new()
            .map_state_to_wire(&planned())
            .unwrap();
        assert_eq!(wire.scheduling.duration_unit, "HOUR");
        assert!(!wire.scheduling.recurrent);
        let json = serde_json::to_value(&wire).unwrap();
        assert!(json["scheduling"].get("recurrentRule").is_none());
        assert_eq!(json["sloIds"], json!(["slo1", "slo2"]));

        let state = SloCorrectionConfigResource::new()
            .map_wire_to_state(None, &wire)
            .unwrap();
        assert_eq!(state["scheduling"]["duration_unit"], "hour");
        assert_eq!(state["scheduling"]["recurrent"], false);
    }

    #[test]
    fn test_wire_to_state_tolerates_nulls() {
        let wire: SloCorrectionConfig = serde_json::from_value(json!({
            "id": "c1",
            "name": "weekly",
            "description": "weekly maintenance",
            "active": false,
            "scheduling": {
                "startTime": 1,
                "duration": 30,
                "durationUnit": "MINUTE",
                "recurrentRule": "FREQ=WEEKLY",
                "recurrent": true
            },
            "sloIds": null,
            "tags": null
        }))
        .unwrap();
        let state = wire_to_state(&wire);
        assert!(state.slo_ids.is_empty());
        assert_eq!(state.tags, None);
        assert_eq!(state.scheduling.recurrent_rule.as_deref(), Some("FREQ=WEEKLY"));
    }

    #[test]
    fn test_validate_name_and_duration() {
        let resource = SloCorrectionConfigResource::new();
        let mut config = planned();
        config["name"] = json!("x".repeat(257));
        config["scheduling"]["duration"] = json!(0);
        let attributes: Vec<_> = resource
            .validate(&config)
            .into_iter()
            .filter_map(|d| d.attribute)
            .collect();
        assert_eq!(attributes, vec!["name", "scheduling.duration"]);
        assert!(resource.validate(&planned()).is_empty());
    }

    #[tokio::test]
    async fn test_update_puts_to_id() {
        let server = MockInstanaServer::start().await;
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let resource = ManagedResource::new(SloCorrectionConfigResource::new());
        let path = format!("{}/c1", SLO_CORRECTION_CONFIGS_PATH);
        server.respond("PUT", &path, 200, Value::Null);

        let mut prior = planned();
        prior["id"] = json!("c1");
        let updated = resource.update(&client, prior, planned()).await.unwrap();
        assert_eq!(updated["id"], "c1");
        assert_eq!(updated["scheduling"]["duration_unit"], "hour");
        let sent = server.requests_to("PUT", &path)[0].json();
        assert_eq!(sent["scheduling"]["durationUnit"], "HOUR");
    }
}
