//! Event based alerting configurations: which events are sent to which
//! alerting channels.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata, StateUpgrader};
use crate::restapi::{WireModel, WriteMode, ALERTING_CONFIGS_PATH};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::shared::custom_payload::{self, CustomPayloadField, CustomPayloadFieldState};
use crate::shared::{from_state, nullable, to_state};

/// Resource name of alerting configurations.
pub const RESOURCE_NAME: &str = "alerting_config";

/// Event types an alerting configuration can subscribe to.
pub const SUPPORTED_EVENT_TYPES: [&str; 8] = [
    "incident",
    "critical",
    "warning",
    "change",
    "online",
    "offline",
    "agent_monitoring_issue",
    "none",
];

const MAX_NAME_LENGTH: usize = 256;
const MAX_QUERY_LENGTH: usize = 2048;

/// An alerting configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub alert_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub integration_ids: Vec<String>,
    #[serde(default)]
    pub event_filtering_configuration: EventFilteringConfiguration,
    #[serde(default, deserialize_with = "nullable")]
    pub custom_payload_fields: Vec<CustomPayloadField>,
}

impl WireModel for AlertingConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Selection of the events that trigger the alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilteringConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub rule_ids: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub event_types: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub application_alert_config_ids: Vec<String>,
}

/// Host state of an alerting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertingConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub alert_name: String,
    #[serde(default)]
    pub integration_ids: Option<Vec<String>>,
    #[serde(default)]
    pub event_filter_query: Option<String>,
    #[serde(default)]
    pub event_filter_event_types: Option<Vec<String>>,
    #[serde(default)]
    pub event_filter_rule_ids: Option<Vec<String>>,
    #[serde(default)]
    pub event_filter_application_alert_ids: Option<Vec<String>>,
    #[serde(default)]
    pub custom_payload_field: Option<Vec<CustomPayloadFieldState>>,
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

fn lower_case(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// Encode state as the wire object. Event types are sent in lower case.
pub fn state_to_wire(state: &AlertingConfigState) -> Result<AlertingConfig, ProviderError> {
    Ok(AlertingConfig {
        id: state.id.clone(),
        alert_name: state.alert_name.clone(),
        integration_ids: state.integration_ids.clone().unwrap_or_default(),
        event_filtering_configuration: EventFilteringConfiguration {
            query: state.event_filter_query.clone(),
            rule_ids: state.event_filter_rule_ids.clone().unwrap_or_default(),
            event_types: lower_case(state.event_filter_event_types.as_deref().unwrap_or_default()),
            application_alert_config_ids: state
                .event_filter_application_alert_ids
                .clone()
                .unwrap_or_default(),
        },
        custom_payload_fields: custom_payload::to_wire(
            state.custom_payload_field.as_deref().unwrap_or_default(),
        )?,
    })
}

/// Decode the wire object.
pub fn wire_to_state(wire: &AlertingConfig) -> Result<AlertingConfigState, ProviderError> {
    let filter = &wire.event_filtering_configuration;
    let custom_payload_field = custom_payload::to_state(&wire.custom_payload_fields)?;
    Ok(AlertingConfigState {
        id: wire.id.clone(),
        alert_name: wire.alert_name.clone(),
        integration_ids: Some(wire.integration_ids.clone()),
        event_filter_query: filter.query.clone().filter(|q| !q.is_empty()),
        event_filter_event_types: non_empty(&lower_case(&filter.event_types)),
        event_filter_rule_ids: non_empty(&filter.rule_ids),
        event_filter_application_alert_ids: non_empty(&filter.application_alert_config_ids),
        custom_payload_field: Some(custom_payload_field).filter(|f| !f.is_empty()),
    })
}

fn resource_schema() -> Schema {
    Schema::new(1)
        .with_description("Event based alerting configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "alert_name",
            Attribute::required_string().with_description("The name of the alerting configuration"),
        )
        .with_attribute(
            "integration_ids",
            Attribute::optional_string_set().with_description("Alerting channel ids"),
        )
        .with_attribute(
            "event_filter_query",
            Attribute::optional_string()
                .with_description("Dynamic focus query limiting the entities of the events"),
        )
        .with_attribute(
            "event_filter_event_types",
            Attribute::optional_string_set()
                .with_description("Event types triggering an alert")
                .with_force_new(),
        )
        .with_attribute(
            "event_filter_rule_ids",
            Attribute::optional_string_set()
                .with_description("Event specification ids triggering an alert")
                .with_force_new(),
        )
        .with_attribute(
            "event_filter_application_alert_ids",
            Attribute::optional_string_set().with_description("Application alert configuration ids"),
        )
        .with_block(custom_payload::CUSTOM_PAYLOAD_FIELD, custom_payload::schema_block())
}

fn upgrade_v0(mut state: Value) -> Result<Value, ProviderError> {
    if let Value::Object(map) = &mut state {
        map.remove("full_alert_name");
    }
    Ok(state)
}

/// Resource handle of alerting configurations.
pub struct AlertingConfigResource {
    metadata: ResourceMetadata,
}

impl AlertingConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                ALERTING_CONFIGS_PATH,
                WriteMode::PutPut,
            )
            .with_id_generation(),
        }
    }
}

impl Default for AlertingConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for AlertingConfigResource {
    type Wire = AlertingConfig;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let name_length = config
            .get("alert_name")
            .and_then(Value::as_str)
            .map_or(0, |n| n.chars().count());
        if name_length > MAX_NAME_LENGTH {
            diagnostics.push(
                Diagnostic::error("Alert name too long")
                    .with_detail(format!("at most {} characters are allowed", MAX_NAME_LENGTH))
                    .with_attribute("alert_name"),
            );
        }
        let query_length = config
            .get("event_filter_query")
            .and_then(Value::as_str)
            .map_or(0, |q| q.chars().count());
        if query_length > MAX_QUERY_LENGTH {
            diagnostics.push(
                Diagnostic::error("Event filter query too long")
                    .with_detail(format!("at most {} characters are allowed", MAX_QUERY_LENGTH))
                    .with_attribute("event_filter_query"),
            );
        }
        let event_types = config
            .get("event_filter_event_types")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str);
        for event_type in event_types {
            if !SUPPORTED_EVENT_TYPES.contains(&event_type.to_lowercase().as_str()) {
                diagnostics.push(
                    Diagnostic::error("Unsupported event type")
                        .with_detail(format!(
                            "'{}' is not one of {}",
                            event_type,
                            SUPPORTED_EVENT_TYPES.join(", ")
                        ))
                        .with_attribute("event_filter_event_types"),
                );
            }
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<AlertingConfig, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &AlertingConfig,
    ) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire)?)
    }

    fn state_upgraders(&self) -> Vec<StateUpgrader> {
        vec![StateUpgrader::new(0, upgrade_v0)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resourcehandle::{ManagedResource, Resource};
    use crate::restapi::{ClientConfig, RestClient};
    use crate::testing::MockInstanaServer;
    use serde_json::json;

    #[test]
    fn test_wire_to_state() {
        let wire: AlertingConfig = serde_json::from_value(json!({
            "id": "ac1",
            "alertName": "critical events",
            "integrationIds": ["ch1"],
            "eventFilteringConfiguration": {
                "query": "",
                "ruleIds": null,
                "eventTypes": ["CRITICAL", "warning"]
            },
            "customPayloadFields": null
        }))
        .unwrap();

        let state = AlertingConfigResource::new()
            .map_wire_to_state(None, &wire)
            .unwrap();
        assert_eq!(state["alert_name"], "critical events");
        assert_eq!(state["integration_ids"], json!(["ch1"]));
        assert_eq!(state["event_filter_event_types"], json!(["critical", "warning"]));
        assert_eq!(state["event_filter_query"], Value::Null);
        assert_eq!(state["event_filter_rule_ids"], Value::Null);
        assert_eq!(state["custom_payload_field"], Value::Null);
    }

    #[test]
    fn test_state_to_wire() {
        let wire = AlertingConfigResource::new()
            .map_state_to_wire(&json!({
                "id": "ac1",
                "alert_name": "rules",
                "integration_ids": ["ch1", "ch2"],
                "event_filter_query": "entity.zone:eu",
                "event_filter_event_types": ["Incident"],
                "event_filter_rule_ids": ["r1"],
                "custom_payload_field": [{"key": "team", "value": "sre"}]
            }))
            .unwrap();
        let json = serde_json::to_value(&wire).unwrap();
        let filter = &json["eventFilteringConfiguration"];
        assert_eq!(filter["query"], "entity.zone:eu");
        assert_eq!(filter["eventTypes"], json!(["incident"]));
        assert_eq!(filter["ruleIds"], json!(["r1"]));
        assert!(filter.get("applicationAlertConfigIds").is_none());
        assert_eq!(json["customPayloadFields"][0]["type"], "staticString");
    }

    #[test]
    fn test_validate_event_types_and_lengths() {
        let diagnostics = AlertingConfigResource::new().validate(&json!({
            "alert_name": "x".repeat(MAX_NAME_LENGTH + 1),
            "integration_ids": [],
            "event_filter_event_types": ["WARNING", "fatal"]
        }));
        let attributes: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert_eq!(attributes, vec!["alert_name", "event_filter_event_types"]);
        assert!(diagnostics[1].detail.as_deref().unwrap_or_default().contains("fatal"));
    }

    #[test]
    fn test_event_filters_force_replacement() {
        let schema = resource_schema();
        let attributes = &schema.block.attributes;
        assert!(attributes["event_filter_event_types"].force_new);
        assert!(attributes["event_filter_rule_ids"].force_new);
        assert!(!attributes["event_filter_application_alert_ids"].force_new);
        assert!(!attributes["alert_name"].force_new);
    }

    #[test]
    fn test_upgrade_drops_full_alert_name() {
        let resource = ManagedResource::new(AlertingConfigResource::new());
        let state = resource
            .upgrade_state(0, json!({"id": "ac1", "alert_name": "a", "full_alert_name": "prefix a"}))
            .unwrap();
        assert!(state.get("full_alert_name").is_none());
        assert_eq!(state["alert_name"], "a");
    }

    #[tokio::test]
    async fn test_create_puts_to_generated_id() {
        let server = MockInstanaServer::start().await;
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let resource = ManagedResource::new(AlertingConfigResource::new());

        let mut plan = json!({
            "alert_name": "critical events",
            "integration_ids": ["ch1"],
            "event_filter_event_types": ["critical"]
        });
        resource.prepare_plan(None, &mut plan).unwrap();
        let id = plan["id"].as_str().unwrap().to_string();
        let path = format!("{}/{}", ALERTING_CONFIGS_PATH, id);
        server.respond("PUT", &path, 200, Value::Null);

        let state = resource.create(&client, plan).await.unwrap();
        assert_eq!(state["id"], id.as_str());
        let sent = server.requests_to("PUT", &path)[0].json();
        assert_eq!(sent["alertName"], "critical events");
        assert_eq!(sent["eventFilteringConfiguration"]["eventTypes"], json!(["critical"]));
    }
}
