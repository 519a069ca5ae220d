//! Automation policies: which automation actions run when an event or smart
//! alert fires, manually or automatically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, AUTOMATION_POLICIES_PATH};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::tags::deserialize_tags;
use crate::shared::{from_state, nullable, to_state};

/// Resource name of automation policies.
pub const RESOURCE_NAME: &str = "automation_policy";

/// Events and smart alerts a policy can be triggered by.
pub const TRIGGER_TYPES: [&str; 11] = [
    "customEvent",
    "builtinEvent",
    "applicationSmartAlert",
    "globalApplicationSmartAlert",
    "websiteSmartAlert",
    "infraSmartAlert",
    "mobileAppSmartAlert",
    "syntheticsSmartAlert",
    "logSmartAlert",
    "sloSmartAlert",
    "schedule",
];

/// Policy modes.
pub const POLICY_TYPES: [&str; 2] = ["manual", "automatic"];

/// Units of a scheduled trigger's duration.
pub const DURATION_UNITS: [&str; 3] = ["MINUTE", "HOUR", "DAY"];

const RUNNABLE_TYPE: &str = "action";
const SCHEDULE_TRIGGER: &str = "schedule";

// ============================================================================
// Wire model
// ============================================================================

/// An automation policy as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "deserialize_tags",
        skip_serializing_if = "Option::is_none"
    )]
    pub tags: Option<Vec<String>>,
    pub trigger: Trigger,
    #[serde(default, deserialize_with = "nullable")]
    pub type_configurations: Vec<TypeConfiguration>,
}

impl WireModel for AutomationPolicy {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub id: String,
    #[serde(rename = "type")]
    pub trigger_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling: Option<TriggerScheduling>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerScheduling {
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrent_rule: Option<String>,
    #[serde(default)]
    pub recurrent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeConfiguration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    pub runnable: Runnable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runnable {
    pub id: String,
    #[serde(rename = "type")]
    pub runnable_type: String,
    pub run_configuration: RunConfiguration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    #[serde(default, deserialize_with = "nullable")]
    pub actions: Vec<ActionConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfiguration {
    pub action: ActionReference,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub input_parameter_values: Vec<InputParameterValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReference {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputParameterValue {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

// ============================================================================
// State model
// ============================================================================

/// Host state of an automation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationPolicyState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub trigger: TriggerState,
    #[serde(default)]
    pub type_configuration: Option<Vec<TypeConfigurationState>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerState {
    pub id: String,
    #[serde(rename = "type")]
    pub trigger_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scheduling: Option<SchedulingState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingState {
    pub start_time: i64,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub duration_unit: Option<String>,
    #[serde(default)]
    pub recurrent_rule: Option<String>,
    #[serde(default)]
    pub recurrent: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeConfigurationState {
    pub name: String,
    #[serde(default)]
    pub condition: Option<ConditionState>,
    #[serde(default)]
    pub action: Option<Vec<PolicyActionState>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionState {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyActionState {
    pub action_id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub input_parameters: Option<BTreeMap<String, String>>,
}

// ============================================================================
// Mapping
// ============================================================================

/// Encode state as the wire object. Every type configuration must run at
/// least one action.
pub fn state_to_wire(state: &AutomationPolicyState) -> Result<AutomationPolicy, ProviderError> {
    let type_configurations = state
        .type_configuration
        .iter()
        .flatten()
        .enumerate()
        .map(|(index, config)| type_configuration_to_wire(index, config))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AutomationPolicy {
        id: state.id.clone(),
        name: state.name.clone(),
        description: state.description.clone().unwrap_or_default(),
        tags: state.tags.clone(),
        trigger: Trigger {
            id: state.trigger.id.clone(),
            trigger_type: state.trigger.trigger_type.clone(),
            name: state.trigger.name.clone(),
            description: state.trigger.description.clone(),
            scheduling: state.trigger.scheduling.as_ref().map(|s| TriggerScheduling {
                start_time: s.start_time,
                duration: s.duration.unwrap_or_default(),
                duration_unit: s.duration_unit.clone(),
                recurrent_rule: s.recurrent_rule.clone(),
                recurrent: s.recurrent.unwrap_or(false),
            }),
        },
        type_configurations,
    })
}

fn type_configuration_to_wire(
    index: usize,
    config: &TypeConfigurationState,
) -> Result<TypeConfiguration, ProviderError> {
    let actions: Vec<ActionConfiguration> = config
        .action
        .iter()
        .flatten()
        .map(|action| ActionConfiguration {
            action: ActionReference {
                id: action.action_id.clone(),
            },
            agent_id: action.agent_id.clone().unwrap_or_default(),
            input_parameter_values: action
                .input_parameters
                .iter()
                .flatten()
                .map(|(name, value)| InputParameterValue {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        })
        .collect();

    let runnable_id = actions.first().map(|a| a.action.id.clone()).ok_or_else(|| {
        ProviderError::InvalidConfig(format!(
            "type_configuration.{}.action: at least one action is required",
            index
        ))
    })?;

    Ok(TypeConfiguration {
        name: config.name.clone(),
        condition: config.condition.as_ref().map(|c| Condition {
            query: c.query.clone(),
        }),
        runnable: Runnable {
            id: runnable_id,
            runnable_type: RUNNABLE_TYPE.to_string(),
            run_configuration: RunConfiguration { actions },
        },
    })
}

/// Decode the wire object.
pub fn wire_to_state(wire: &AutomationPolicy) -> AutomationPolicyState {
    let type_configuration: Vec<TypeConfigurationState> = wire
        .type_configurations
        .iter()
        .map(|config| TypeConfigurationState {
            name: config.name.clone(),
            condition: config
                .condition
                .as_ref()
                .filter(|c| !c.query.is_empty())
                .map(|c| ConditionState {
                    query: c.query.clone(),
                }),
            action: Some(
                config
                    .runnable
                    .run_configuration
                    .actions
                    .iter()
                    .map(|action| PolicyActionState {
                        action_id: action.action.id.clone(),
                        agent_id: Some(action.agent_id.clone()).filter(|a| !a.is_empty()),
                        input_parameters: Some(
                            action
                                .input_parameter_values
                                .iter()
                                .map(|p| (p.name.clone(), p.value.clone()))
                                .collect::<BTreeMap<_, _>>(),
                        )
                        .filter(|p| !p.is_empty()),
                    })
                    .collect(),
            ),
        })
        .collect();

    AutomationPolicyState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        description: Some(wire.description.clone()).filter(|d| !d.is_empty()),
        tags: wire.tags.clone().filter(|t| !t.is_empty()),
        trigger: TriggerState {
            id: wire.trigger.id.clone(),
            trigger_type: wire.trigger.trigger_type.clone(),
            name: wire.trigger.name.clone().filter(|n| !n.is_empty()),
            description: wire.trigger.description.clone().filter(|d| !d.is_empty()),
            scheduling: wire
                .trigger
                .scheduling
                .as_ref()
                .filter(|s| s.start_time != 0)
                .map(|s| SchedulingState {
                    start_time: s.start_time,
                    duration: Some(s.duration),
                    duration_unit: s.duration_unit.clone().filter(|u| !u.is_empty()),
                    recurrent_rule: s.recurrent_rule.clone().filter(|r| !r.is_empty()),
                    recurrent: Some(s.recurrent),
                }),
        },
        type_configuration: (!type_configuration.is_empty()).then_some(type_configuration),
    }
}

fn resource_schema() -> Schema {
    let scheduling = Block::new()
        .with_attribute("start_time", Attribute::required_int64())
        .with_attribute("duration", Attribute::optional_int64())
        .with_attribute(
            "duration_unit",
            Attribute::optional_string().with_allowed_values(DURATION_UNITS),
        )
        .with_attribute("recurrent_rule", Attribute::optional_string())
        .with_attribute("recurrent", Attribute::optional_bool());

    let trigger = Block::new()
        .with_description("The event or smart alert triggering the policy")
        .with_attribute("id", Attribute::required_string())
        .with_attribute(
            "type",
            Attribute::required_string().with_allowed_values(TRIGGER_TYPES),
        )
        .with_attribute("name", Attribute::optional_string())
        .with_attribute("description", Attribute::optional_string())
        .with_block("scheduling", NestedBlock::single(scheduling));

    let action = Block::new()
        .with_attribute(
            "action_id",
            Attribute::required_string().with_description("The automation action to run"),
        )
        .with_attribute(
            "agent_id",
            Attribute::optional_string().with_description("The agent host running the action"),
        )
        .with_attribute("input_parameters", Attribute::optional_string_map());

    let type_configuration = Block::new()
        .with_attribute(
            "name",
            Attribute::required_string().with_allowed_values(POLICY_TYPES),
        )
        .with_block(
            "condition",
            NestedBlock::single(
                Block::new().with_attribute(
                    "query",
                    Attribute::required_string()
                        .with_description("Dynamic focus query selecting the entities"),
                ),
            ),
        )
        .with_block("action", NestedBlock::list(action).with_min_items(1));

    Schema::v0()
        .with_description("Automation policy")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("description", Attribute::required_string())
        .with_attribute("tags", Attribute::optional_string_list())
        .with_block("trigger", NestedBlock::single(trigger).with_min_items(1))
        .with_block(
            "type_configuration",
            NestedBlock::list(type_configuration).with_min_items(1),
        )
}

/// Resource handle of automation policies.
pub struct AutomationPolicyResource {
    metadata: ResourceMetadata,
}

impl AutomationPolicyResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                AUTOMATION_POLICIES_PATH,
                WriteMode::PostPut,
            ),
        }
    }
}

impl Default for AutomationPolicyResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for AutomationPolicyResource {
    type Wire = AutomationPolicy;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let trigger = config.get("trigger");
        let scheduled = trigger.and_then(|t| t.get("type")).and_then(Value::as_str)
            == Some(SCHEDULE_TRIGGER);
        let has_scheduling = trigger
            .and_then(|t| t.get("scheduling"))
            .is_some_and(|s| !s.is_null());
        if scheduled && !has_scheduling {
            diagnostics.push(
                Diagnostic::error("Missing trigger scheduling")
                    .with_detail("schedule triggers require a scheduling block")
                    .with_attribute("trigger.scheduling"),
            );
        }

        let configs = config
            .get("type_configuration")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();
        for (index, type_config) in configs.enumerate() {
            let manual = type_config.get("name").and_then(Value::as_str) == Some("manual");
            let has_condition = type_config.get("condition").is_some_and(|c| !c.is_null());
            if manual && has_condition {
                diagnostics.push(
                    Diagnostic::warning("Condition ignored")
                        .with_detail("conditions are only evaluated for automatic policies")
                        .with_attribute(format!("type_configuration.{}.condition", index)),
                );
            }
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<AutomationPolicy, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &AutomationPolicy,
    ) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire))
    }
}
