//! Custom event specifications: rules over entities and metrics that raise
//! events with a severity.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, CUSTOM_EVENT_SPECIFICATIONS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::{from_state, nullable, to_state, Severity};
use crate::tagfilter;

/// Resource name of custom event specifications.
pub const RESOURCE_NAME: &str = "custom_event_specification";

/// How the rules of a specification combine.
pub const LOGICAL_OPERATORS: [&str; 2] = ["AND", "OR"];

/// Aggregations of threshold rules.
pub const THRESHOLD_AGGREGATIONS: [&str; 4] = ["sum", "avg", "min", "max"];

const ENTITY_COUNT: &str = "entity_count";
const ENTITY_COUNT_VERIFICATION: &str = "entity_count_verification";
const ENTITY_VERIFICATION: &str = "entity_verification";
const HOST_AVAILABILITY: &str = "host_availability";
const SYSTEM: &str = "system";
const THRESHOLD: &str = "threshold";

const RULE_KINDS: [&str; 6] = [
    ENTITY_COUNT,
    ENTITY_COUNT_VERIFICATION,
    ENTITY_VERIFICATION,
    HOST_AVAILABILITY,
    SYSTEM,
    THRESHOLD,
];

/// A custom event specification as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEventSpecification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub triggering: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_logical_operator")]
    pub rule_logical_operator: String,
    #[serde(default, deserialize_with = "nullable")]
    pub rules: Vec<RuleSpecification>,
}

fn default_logical_operator() -> String {
    LOGICAL_OPERATORS[0].to_string()
}

impl WireModel for CustomEventSpecification {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// One rule, discriminated by `dType`. Fields not used by a kind are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpecification {
    #[serde(rename = "dType")]
    pub d_type: String,
    pub severity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_entity_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_after: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollup: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_pattern: Option<MetricPattern>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPattern {
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postfix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub operator: String,
}

/// Host state of a custom event specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomEventSpecificationState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub triggering: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expiration_time: Option<i64>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub rule_logical_operator: Option<String>,
    #[serde(default)]
    pub rules: Option<RulesState>,
}

/// At most one rule of each kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesState {
    #[serde(default)]
    pub entity_count: Option<EntityCountRuleState>,
    #[serde(default)]
    pub entity_count_verification: Option<EntityCountVerificationRuleState>,
    #[serde(default)]
    pub entity_verification: Option<EntityVerificationRuleState>,
    #[serde(default)]
    pub host_availability: Option<HostAvailabilityRuleState>,
    #[serde(default)]
    pub system: Option<SystemRuleState>,
    #[serde(default)]
    pub threshold: Option<ThresholdRuleState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCountRuleState {
    pub severity: String,
    pub condition_operator: String,
    pub condition_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCountVerificationRuleState {
    pub severity: String,
    pub condition_operator: String,
    pub condition_value: f64,
    pub matching_entity_type: String,
    pub matching_operator: String,
    pub matching_entity_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityVerificationRuleState {
    pub severity: String,
    pub matching_entity_type: String,
    pub matching_operator: String,
    pub matching_entity_label: String,
    pub offline_duration: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAvailabilityRuleState {
    pub severity: String,
    pub offline_duration: i64,
    #[serde(default)]
    pub close_after: Option<i64>,
    #[serde(default)]
    pub tag_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemRuleState {
    pub severity: String,
    pub system_rule_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRuleState {
    pub severity: String,
    pub metric_name: String,
    pub rollup: i64,
    pub window: i64,
    pub aggregation: String,
    pub condition_operator: String,
    #[serde(default)]
    pub condition_value: Option<f64>,
    #[serde(default)]
    pub metric_pattern: Option<MetricPatternState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPatternState {
    pub prefix: String,
    #[serde(default)]
    pub postfix: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

fn rule(kind: &str, severity: &str) -> Result<RuleSpecification, ProviderError> {
    Ok(RuleSpecification {
        d_type: kind.to_string(),
        severity: Severity::parse(severity)?.code(),
        ..RuleSpecification::default()
    })
}

fn rules_to_wire(rules: &RulesState) -> Result<Vec<RuleSpecification>, ProviderError> {
    let mut wire = Vec::new();
    if let Some(r) = &rules.entity_count {
        wire.push(RuleSpecification {
            condition_operator: Some(r.condition_operator.clone()),
            condition_value: Some(r.condition_value),
            ..rule(ENTITY_COUNT, &r.severity)?
        });
    }
    if let Some(r) = &rules.entity_count_verification {
        wire.push(RuleSpecification {
            condition_operator: Some(r.condition_operator.clone()),
            condition_value: Some(r.condition_value),
            matching_entity_type: Some(r.matching_entity_type.clone()),
            matching_operator: Some(r.matching_operator.clone()),
            matching_entity_label: Some(r.matching_entity_label.clone()),
            ..rule(ENTITY_COUNT_VERIFICATION, &r.severity)?
        });
    }
    if let Some(r) = &rules.entity_verification {
        wire.push(RuleSpecification {
            matching_entity_type: Some(r.matching_entity_type.clone()),
            matching_operator: Some(r.matching_operator.clone()),
            matching_entity_label: Some(r.matching_entity_label.clone()),
            offline_duration: Some(r.offline_duration),
            ..rule(ENTITY_VERIFICATION, &r.severity)?
        });
    }
    if let Some(r) = &rules.host_availability {
        let tag_filter = match non_empty(&r.tag_filter) {
            Some(text) => tagfilter::text_to_wire(&text)?,
            None => None,
        };
        wire.push(RuleSpecification {
            offline_duration: Some(r.offline_duration),
            close_after: r.close_after,
            tag_filter,
            ..rule(HOST_AVAILABILITY, &r.severity)?
        });
    }
    if let Some(r) = &rules.system {
        wire.push(RuleSpecification {
            system_rule_id: Some(r.system_rule_id.clone()),
            ..rule(SYSTEM, &r.severity)?
        });
    }
    if let Some(r) = &rules.threshold {
        wire.push(RuleSpecification {
            metric_name: Some(r.metric_name.clone()),
            rollup: Some(r.rollup),
            window: Some(r.window),
            aggregation: Some(r.aggregation.clone()),
            condition_operator: Some(r.condition_operator.clone()),
            condition_value: r.condition_value,
            metric_pattern: r.metric_pattern.as_ref().map(|p| MetricPattern {
                prefix: p.prefix.clone(),
                postfix: non_empty(&p.postfix),
                placeholder: non_empty(&p.placeholder),
                operator: p
                    .operator
                    .clone()
                    .unwrap_or_else(|| tagfilter::Operator::Equals.as_str().to_string()),
            }),
            ..rule(THRESHOLD, &r.severity)?
        });
    }
    Ok(wire)
}

fn rules_to_state(rules: &[RuleSpecification]) -> Result<RulesState, ProviderError> {
    let mut state = RulesState::default();
    for rule in rules {
        let severity = Severity::from_code(rule.severity)?.as_str().to_string();
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        match rule.d_type.as_str() {
            ENTITY_COUNT => {
                state.entity_count = Some(EntityCountRuleState {
                    severity,
                    condition_operator: text(&rule.condition_operator),
                    condition_value: rule.condition_value.unwrap_or_default(),
                })
            },
            ENTITY_COUNT_VERIFICATION => {
                state.entity_count_verification = Some(EntityCountVerificationRuleState {
                    severity,
                    condition_operator: text(&rule.condition_operator),
                    condition_value: rule.condition_value.unwrap_or_default(),
                    matching_entity_type: text(&rule.matching_entity_type),
                    matching_operator: text(&rule.matching_operator),
                    matching_entity_label: text(&rule.matching_entity_label),
                })
            },
            ENTITY_VERIFICATION => {
                state.entity_verification = Some(EntityVerificationRuleState {
                    severity,
                    matching_entity_type: text(&rule.matching_entity_type),
                    matching_operator: text(&rule.matching_operator),
                    matching_entity_label: text(&rule.matching_entity_label),
                    offline_duration: rule.offline_duration.unwrap_or_default(),
                })
            },
            HOST_AVAILABILITY => {
                let tag_filter = match &rule.tag_filter {
                    Some(filter) => tagfilter::wire_to_text(filter)?,
                    None => None,
                };
                state.host_availability = Some(HostAvailabilityRuleState {
                    severity,
                    offline_duration: rule.offline_duration.unwrap_or_default(),
                    close_after: rule.close_after,
                    tag_filter,
                })
            },
            SYSTEM => {
                state.system = Some(SystemRuleState {
                    severity,
                    system_rule_id: text(&rule.system_rule_id),
                })
            },
            THRESHOLD => {
                state.threshold = Some(ThresholdRuleState {
                    severity,
                    metric_name: text(&rule.metric_name),
                    rollup: rule.rollup.unwrap_or_default(),
                    window: rule.window.unwrap_or_default(),
                    aggregation: text(&rule.aggregation),
                    condition_operator: text(&rule.condition_operator),
                    condition_value: rule.condition_value,
                    metric_pattern: rule.metric_pattern.as_ref().map(|p| MetricPatternState {
                        prefix: p.prefix.clone(),
                        postfix: p.postfix.clone(),
                        placeholder: p.placeholder.clone(),
                        operator: Some(p.operator.clone()),
                    }),
                })
            },
            other => {
                return Err(ProviderError::Decode(format!(
                    "unsupported custom event rule type '{}'",
                    other
                )))
            },
        }
    }
    Ok(state)
}

pub fn state_to_wire(
    state: &CustomEventSpecificationState,
) -> Result<CustomEventSpecification, ProviderError> {
    Ok(CustomEventSpecification {
        id: state.id.clone(),
        name: state.name.clone(),
        entity_type: state.entity_type.clone(),
        query: non_empty(&state.query),
        triggering: state.triggering.unwrap_or(false),
        description: non_empty(&state.description),
        expiration_time: state.expiration_time,
        enabled: state.enabled.unwrap_or(true),
        rule_logical_operator: state
            .rule_logical_operator
            .clone()
            .unwrap_or_else(default_logical_operator),
        rules: state
            .rules
            .as_ref()
            .map(rules_to_wire)
            .transpose()?
            .unwrap_or_default(),
    })
}

pub fn wire_to_state(
    wire: &CustomEventSpecification,
) -> Result<CustomEventSpecificationState, ProviderError> {
    Ok(CustomEventSpecificationState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        entity_type: wire.entity_type.clone(),
        query: wire.query.clone(),
        triggering: Some(wire.triggering),
        description: wire.description.clone(),
        expiration_time: wire.expiration_time,
        enabled: Some(wire.enabled),
        rule_logical_operator: Some(wire.rule_logical_operator.clone()),
        rules: if wire.rules.is_empty() {
            None
        } else {
            Some(rules_to_state(&wire.rules)?)
        },
    })
}

fn severity_attribute() -> Attribute {
    Attribute::required_string().with_allowed_values(Severity::names())
}

fn resource_schema() -> Schema {
    let matching = |block: Block| {
        block
            .with_attribute("matching_entity_type", Attribute::required_string())
            .with_attribute("matching_operator", Attribute::required_string())
            .with_attribute("matching_entity_label", Attribute::required_string())
    };
    let condition = |block: Block| {
        block
            .with_attribute("condition_operator", Attribute::required_string())
            .with_attribute("condition_value", Attribute::required_float64())
    };
    let base = || Block::new().with_attribute("severity", severity_attribute());

    let metric_pattern = Block::new()
        .with_attribute("prefix", Attribute::required_string())
        .with_attribute("postfix", Attribute::optional_string())
        .with_attribute("placeholder", Attribute::optional_string())
        .with_attribute(
            "operator",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                .with_default(Value::from(tagfilter::Operator::Equals.as_str())),
        );
    let threshold = base()
        .with_attribute("metric_name", Attribute::required_string())
        .with_attribute(
            "rollup",
            Attribute::required_int64().with_description("Rollup of the metric in milliseconds"),
        )
        .with_attribute(
            "window",
            Attribute::required_int64().with_description("Evaluation window in milliseconds"),
        )
        .with_attribute(
            "aggregation",
            Attribute::required_string().with_allowed_values(THRESHOLD_AGGREGATIONS),
        )
        .with_attribute("condition_operator", Attribute::required_string())
        .with_attribute("condition_value", Attribute::optional_float64())
        .with_block("metric_pattern", NestedBlock::single(metric_pattern));

    let rules = Block::new()
        .with_description("Rules of the specification, at most one of each kind")
        .with_block(ENTITY_COUNT, NestedBlock::single(condition(base())))
        .with_block(
            ENTITY_COUNT_VERIFICATION,
            NestedBlock::single(matching(condition(base()))),
        )
        .with_block(
            ENTITY_VERIFICATION,
            NestedBlock::single(
                matching(base()).with_attribute("offline_duration", Attribute::required_int64()),
            ),
        )
        .with_block(
            HOST_AVAILABILITY,
            NestedBlock::single(
                base()
                    .with_attribute("offline_duration", Attribute::required_int64())
                    .with_attribute("close_after", Attribute::optional_int64())
                    .with_attribute(
                        "tag_filter",
                        Attribute::tag_filter_expression(AttributeFlags::optional()),
                    ),
            ),
        )
        .with_block(
            SYSTEM,
            NestedBlock::single(base().with_attribute("system_rule_id", Attribute::required_string())),
        )
        .with_block(THRESHOLD, NestedBlock::single(threshold));

    Schema::v0()
        .with_description("Custom event specification")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("entity_type", Attribute::required_string())
        .with_attribute("query", Attribute::optional_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute(
            "expiration_time",
            Attribute::optional_int64().with_description("Milliseconds after which an open event expires"),
        )
        .with_attribute(
            "triggering",
            Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                .with_default(Value::Bool(false)),
        )
        .with_attribute(
            "enabled",
            Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                .with_default(Value::Bool(true)),
        )
        .with_attribute(
            "rule_logical_operator",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                .with_default(Value::from(LOGICAL_OPERATORS[0]))
                .with_allowed_values(LOGICAL_OPERATORS),
        )
        .with_block("rules", NestedBlock::single(rules))
}

/// Resource handle of custom event specifications. Identifiers are
/// generated before create.
pub struct CustomEventSpecificationResource {
    metadata: ResourceMetadata,
}

impl CustomEventSpecificationResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                CUSTOM_EVENT_SPECIFICATIONS_PATH,
                WriteMode::PutPut,
            )
            .with_id_generation(),
        }
    }
}

impl Default for CustomEventSpecificationResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for CustomEventSpecificationResource {
    type Wire = CustomEventSpecification;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let Some(rules) = config.get("rules").filter(|r| r.is_object()) else {
            return diagnostics;
        };

        let configured = RULE_KINDS
            .iter()
            .filter(|kind| rules.get(**kind).is_some_and(|r| !r.is_null()))
            .count();
        if configured == 0 {
            diagnostics.push(
                Diagnostic::error("Empty rules")
                    .with_detail(format!("configure at least one of {}", RULE_KINDS.join(", ")))
                    .with_attribute("rules"),
            );
        }

        let tag_filter = rules
            .get(HOST_AVAILABILITY)
            .and_then(|r| r.get("tag_filter"))
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty());
        if let Some(Err(e)) = tag_filter.map(tagfilter::normalize) {
            diagnostics.push(
                Diagnostic::error("Invalid tag filter expression")
                    .with_detail(e.message())
                    .with_attribute("rules.host_availability.tag_filter"),
            );
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<CustomEventSpecification, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &CustomEventSpecification,
    ) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire)?)
    }
}
