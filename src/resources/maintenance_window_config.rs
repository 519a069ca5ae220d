//! Maintenance windows muting alerts for a scope and a schedule.
//!
//! The API creates and updates with `PUT path/{id}`, so the identifier is
//! assigned client-side at plan time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, MAINTENANCE_WINDOWS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::{from_state, to_state};
use crate::tagfilter;

/// Resource name of maintenance windows.
pub const RESOURCE_NAME: &str = "maintenance_window_config";

/// Scheduling types.
pub const SCHEDULING_TYPES: [&str; 2] = ["ONE_TIME", "RECURRENT"];

/// Duration units.
pub const DURATION_UNITS: [&str; 3] = ["MINUTES", "HOURS", "DAYS"];

const RECURRENT: &str = "RECURRENT";

/// A maintenance window as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindowConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub query: String,
    pub scheduling: Scheduling,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrigger_open_alerts_enabled: Option<bool>,
    #[serde(default, skip_serializing)]
    pub state: Option<String>,
    #[serde(default, skip_serializing)]
    pub last_updated: Option<i64>,
}

impl WireModel for MaintenanceWindowConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// When and how often the window applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    pub start: i64,
    pub duration: WindowDuration,
    #[serde(rename = "type")]
    pub scheduling_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rrule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDuration {
    pub amount: i64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingState {
    pub start: i64,
    pub duration: WindowDuration,
    #[serde(rename = "type")]
    pub scheduling_type: String,
    #[serde(default)]
    pub rrule: Option<String>,
    #[serde(default)]
    pub timezone_id: Option<String>,
}

/// Host state of a maintenance window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceWindowState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub query: Option<String>,
    pub scheduling: SchedulingState,
    #[serde(default)]
    pub tag_filter_expression_enabled: Option<bool>,
    #[serde(default)]
    pub tag_filter_expression: Option<String>,
    #[serde(default)]
    pub paused: Option<bool>,
    #[serde(default)]
    pub retrigger_open_alerts_enabled: Option<bool>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Encode state as the wire object.
pub fn state_to_wire(state: &MaintenanceWindowState) -> Result<MaintenanceWindowConfig, ProviderError> {
    let tag_filter_expression = match state.tag_filter_expression.as_deref() {
        Some(text) => tagfilter::text_to_wire(text)?,
        None => None,
    };
    Ok(MaintenanceWindowConfig {
        id: state.id.clone(),
        name: state.name.clone(),
        query: state.query.clone().unwrap_or_default(),
        scheduling: Scheduling {
            start: state.scheduling.start,
            duration: state.scheduling.duration.clone(),
            scheduling_type: state.scheduling.scheduling_type.clone(),
            rrule: state.scheduling.rrule.clone(),
            timezone_id: state.scheduling.timezone_id.clone(),
        },
        tag_filter_expression_enabled: Some(
            state
                .tag_filter_expression_enabled
                .unwrap_or(tag_filter_expression.is_some()),
        ),
        tag_filter_expression,
        paused: state.paused,
        retrigger_open_alerts_enabled: state.retrigger_open_alerts_enabled,
        state: None,
        last_updated: None,
    })
}

/// Decode the wire object.
pub fn wire_to_state(wire: &MaintenanceWindowConfig) -> Result<MaintenanceWindowState, ProviderError> {
    let tag_filter_expression = match &wire.tag_filter_expression {
        Some(filter) => tagfilter::wire_to_text(filter)?,
        None => None,
    };
    Ok(MaintenanceWindowState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        query: Some(wire.query.clone()).filter(|q| !q.is_empty()),
        scheduling: SchedulingState {
            start: wire.scheduling.start,
            duration: wire.scheduling.duration.clone(),
            scheduling_type: wire.scheduling.scheduling_type.clone(),
            rrule: wire.scheduling.rrule.clone(),
            timezone_id: wire.scheduling.timezone_id.clone(),
        },
        tag_filter_expression_enabled: wire.tag_filter_expression_enabled,
        tag_filter_expression,
        paused: wire.paused,
        retrigger_open_alerts_enabled: wire.retrigger_open_alerts_enabled,
        state: wire.state.clone(),
    })
}

fn resource_schema() -> Schema {
    let scheduling = Block::new()
        .with_description("Time scheduling of the maintenance window")
        .with_attribute(
            "start",
            Attribute::required_int64().with_description("Start time in milliseconds from epoch"),
        )
        .with_attribute(
            "type",
            Attribute::required_string().with_allowed_values(SCHEDULING_TYPES),
        )
        .with_attribute(
            "rrule",
            Attribute::optional_string().with_description("iCalendar RRULE of recurrent windows"),
        )
        .with_attribute("timezone_id", Attribute::optional_string())
        .with_block(
            "duration",
            NestedBlock::single(
                Block::new()
                    .with_attribute("amount", Attribute::required_int64())
                    .with_attribute(
                        "unit",
                        Attribute::required_string().with_allowed_values(DURATION_UNITS),
                    ),
            )
            .with_min_items(1),
        );

    Schema::v0()
        .with_description("Maintenance window configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute(
            "query",
            Attribute::optional_string().with_description("Dynamic focus query scoping the window"),
        )
        .with_attribute(
            "tag_filter_expression_enabled",
            Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed()),
        )
        .with_attribute(
            "tag_filter_expression",
            Attribute::tag_filter_expression(AttributeFlags::optional()),
        )
        .with_attribute("paused", Attribute::optional_bool())
        .with_attribute("retrigger_open_alerts_enabled", Attribute::optional_bool())
        .with_attribute("state", Attribute::computed_string())
        .with_block("scheduling", NestedBlock::single(scheduling).with_min_items(1))
}

/// Resource handle of maintenance windows.
pub struct MaintenanceWindowResource {
    metadata: ResourceMetadata,
}

impl MaintenanceWindowResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                MAINTENANCE_WINDOWS_PATH,
                WriteMode::PutPut,
            )
            .with_id_generation(),
        }
    }
}

impl Default for MaintenanceWindowResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for MaintenanceWindowResource {
    type Wire = MaintenanceWindowConfig;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn set_computed_fields(&self, plan: &mut Value) -> Result<(), ProviderError> {
        let Value::Object(map) = plan else {
            return Ok(());
        };
        if map
            .get("tag_filter_expression_enabled")
            .is_some_and(|v| !v.is_null())
        {
            return Ok(());
        }
        let enabled = map
            .get("tag_filter_expression")
            .and_then(Value::as_str)
            .is_some_and(|text| !text.trim().is_empty());
        map.insert(
            "tag_filter_expression_enabled".to_string(),
            Value::Bool(enabled),
        );
        Ok(())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if let Some(text) = config.get("tag_filter_expression").and_then(Value::as_str) {
            if let Err(e) = tagfilter::normalize(text) {
                diagnostics.push(
                    Diagnostic::error("Invalid tag filter expression")
                        .with_detail(e.message())
                        .with_attribute("tag_filter_expression"),
                );
            }
        }
        let scheduling = config.get("scheduling");
        let recurrent = scheduling
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
            == Some(RECURRENT);
        let has_rrule = scheduling
            .and_then(|s| s.get("rrule"))
            .and_then(Value::as_str)
            .is_some_and(|r| !r.is_empty());
        if recurrent && !has_rrule {
            diagnostics.push(
                Diagnostic::error("Missing recurrence rule")
                    .with_detail("rrule is required for RECURRENT maintenance windows")
                    .with_attribute("scheduling.rrule"),
            );
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<MaintenanceWindowConfig, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &MaintenanceWindowConfig,
    ) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire)?)
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
            "name": "patch night",
            "query": "entity.zone:eu",
            "tag_filter_expression": "host.name EQUALS 'db1'",
            "scheduling": {
                "start": 1700000000000i64,
                "type": "RECURRENT",
                "rrule": "FREQ=WEEKLY;BYDAY=SU",
                "duration": {"amount": 2, "unit": "HOURS"}
            }
        })
    }

    #[tokio::test]
    async fn test_create_puts_to_generated_id() {
        let server = MockInstanaServer::start().await;
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let resource = ManagedResource::new(MaintenanceWindowResource::new());

        let mut plan = planned();
        resource.prepare_plan(None, &mut plan).unwrap();
        let id = plan["id"].as_str().unwrap().to_string();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_eq!(plan["tag_filter_expression_enabled"], true);

        let path = format!("{}/{}", MAINTENANCE_WINDOWS_PATH, id);
        server.respond("PUT", &path, 200, Value::Null);

        let state = resource.create(&client, plan).await.unwrap();
        let requests = server.requests_to("PUT", &path);
        assert_eq!(requests.len(), 1);
        let sent = requests[0].json();
        assert_eq!(sent["id"], id.as_str());
        assert_eq!(sent["scheduling"]["rrule"], "FREQ=WEEKLY;BYDAY=SU");
        assert_eq!(sent["tagFilterExpression"]["type"], "TAG_FILTER");
        assert_eq!(sent["tagFilterExpressionEnabled"], true);

        assert_eq!(state["id"], id.as_str());
        assert_eq!(state["tag_filter_expression"], "host.name EQUALS 'db1'");
    }

    #[test]
    fn test_read_maps_server_state() {
        let wire: MaintenanceWindowConfig = serde_json::from_value(json!({
            "id": "mw1",
            "name": "once",
            "query": "",
            "scheduling": {
                "start": 1,
                "type": "ONE_TIME",
                "duration": {"amount": 30, "unit": "MINUTES"}
            },
            "state": "SCHEDULED",
            "lastUpdated": 42
        }))
        .unwrap();
        let state = MaintenanceWindowResource::new()
            .map_wire_to_state(None, &wire)
            .unwrap();
        assert_eq!(state["state"], "SCHEDULED");
        assert_eq!(state["query"], Value::Null);
        assert_eq!(state["scheduling"]["duration"]["unit"], "MINUTES");
        assert_eq!(state["tag_filter_expression"], Value::Null);

        let back = serde_json::to_value(state_to_wire(&from_state(&state).unwrap()).unwrap())
            .unwrap();
        assert!(back.get("state").is_none());
        assert!(back.get("lastUpdated").is_none());
    }

    #[test]
    fn test_validate_recurrent_needs_rrule() {
        let mut config = planned();
        config["scheduling"]["rrule"] = Value::Null;
        let diagnostics = MaintenanceWindowResource::new().validate(&config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("scheduling.rrule"));
    }

    #[test]
    fn test_explicit_enabled_flag_is_kept() {
        let mut plan = planned();
        plan["tag_filter_expression_enabled"] = json!(false);
        MaintenanceWindowResource::new()
            .set_computed_fields(&mut plan)
            .unwrap();
        assert_eq!(plan["tag_filter_expression_enabled"], false);
    }
}
