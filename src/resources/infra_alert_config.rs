//! Infrastructure smart alerts: metric rules over a tag filtered set of
//! entities, with per-severity thresholds and notification channels.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{rename_attribute, ResourceHandle, ResourceMetadata, StateUpgrader};
use crate::restapi::{WireModel, WriteMode, INFRA_ALERT_CONFIGS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::alert_channels::{self, AlertChannelsState};
use crate::shared::custom_payload::{self, CustomPayloadField, CustomPayloadFieldState};
use crate::shared::threshold::{
    check_threshold_operator, threshold_operator_attribute, thresholds_block, thresholds_to_state,
    thresholds_to_wire, RuleWithThreshold, ThresholdsState,
};
use crate::shared::{from_state, to_state, Severity};
use crate::tagfilter;

/// Resource name of infrastructure alert configurations.
pub const RESOURCE_NAME: &str = "infra_alert_config";

/// Evaluation types.
pub const EVALUATION_TYPES: [&str; 2] = ["PER_ENTITY", "CUSTOM"];

/// Accepted granularities in milliseconds.
pub const GRANULARITIES: [i64; 6] = [60_000, 300_000, 600_000, 900_000, 1_200_000, 1_800_000];

/// Metric aggregations.
pub const AGGREGATIONS: [&str; 5] = ["SUM", "MEAN", "MAX", "MIN", "PER_SECOND"];

const GENERIC_RULE: &str = "genericRule";
const VIOLATIONS_IN_SEQUENCE: &str = "violationsInSequence";

/// An infrastructure alert configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraAlertConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<Value>,
    #[serde(default)]
    pub group_by: Vec<String>,
    pub granularity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_threshold: Option<InfraTimeThreshold>,
    #[serde(default)]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default)]
    pub rules: Vec<RuleWithThreshold<InfraAlertRule>>,
    #[serde(default)]
    pub alert_channels: BTreeMap<Severity, Vec<String>>,
    pub evaluation_type: String,
}

impl WireModel for InfraAlertConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// How long a rule must be violated before an alert opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraTimeThreshold {
    #[serde(rename = "type")]
    pub threshold_type: String,
    pub time_window: i64,
}

/// A metric rule of an infrastructure alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraAlertRule {
    pub alert_type: String,
    pub metric_name: String,
    pub entity_type: String,
    pub aggregation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_series_aggregation: Option<String>,
    #[serde(default)]
    pub regex: bool,
}

// ============================================================================
// State model
// ============================================================================

/// Host state of an infrastructure alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfraAlertConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tag_filter: Option<String>,
    #[serde(default)]
    pub group_by: Option<Vec<String>>,
    pub granularity: i64,
    #[serde(default)]
    pub evaluation_type: Option<String>,
    #[serde(default)]
    pub alert_channels: Option<AlertChannelsState>,
    #[serde(default)]
    pub time_threshold: Option<TimeThresholdState>,
    #[serde(default)]
    pub custom_payload_field: Option<Vec<CustomPayloadFieldState>>,
    #[serde(default)]
    pub rules: Option<RulesState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeThresholdState {
    #[serde(default)]
    pub violations_in_sequence: Option<ViolationsInSequenceState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationsInSequenceState {
    pub time_window: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesState {
    #[serde(default)]
    pub generic_rule: Option<GenericRuleState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericRuleState {
    pub metric_name: String,
    pub entity_type: String,
    pub aggregation: String,
    #[serde(default)]
    pub cross_series_aggregation: Option<String>,
    #[serde(default)]
    pub regex: Option<bool>,
    pub threshold_operator: String,
    pub threshold: ThresholdsState,
}

// ============================================================================
// Mapping
// ============================================================================

/// Encode state as the wire object.
pub fn state_to_wire(state: &InfraAlertConfigState) -> Result<InfraAlertConfig, ProviderError> {
    let tag_filter_expression = match state.tag_filter.as_deref() {
        Some(text) => tagfilter::text_to_wire(text)?,
        None => None,
    };

    let time_threshold = state
        .time_threshold
        .as_ref()
        .and_then(|t| t.violations_in_sequence.as_ref())
        .map(|v| InfraTimeThreshold {
            threshold_type: VIOLATIONS_IN_SEQUENCE.to_string(),
            time_window: v.time_window,
        });

    let mut rules = Vec::new();
    if let Some(generic) = state.rules.as_ref().and_then(|r| r.generic_rule.as_ref()) {
        check_threshold_operator(
            &generic.threshold_operator,
            "rules.generic_rule.threshold_operator",
        )?;
        rules.push(RuleWithThreshold {
            threshold_operator: generic.threshold_operator.clone(),
            rule: InfraAlertRule {
                alert_type: GENERIC_RULE.to_string(),
                metric_name: generic.metric_name.clone(),
                entity_type: generic.entity_type.clone(),
                aggregation: generic.aggregation.clone(),
                cross_series_aggregation: generic.cross_series_aggregation.clone(),
                regex: generic.regex.unwrap_or(false),
            },
            thresholds: thresholds_to_wire(&generic.threshold, "rules.generic_rule.threshold")?,
        });
    }

    Ok(InfraAlertConfig {
        id: state.id.clone(),
        name: state.name.clone(),
        description: state.description.clone().unwrap_or_default(),
        tag_filter_expression,
        group_by: state.group_by.clone().unwrap_or_default(),
        granularity: state.granularity,
        time_threshold,
        custom_payload_fields: custom_payload::to_wire(
            state.custom_payload_field.as_deref().unwrap_or_default(),
        )?,
        rules,
        alert_channels: alert_channels::to_wire(state.alert_channels.as_ref()),
        evaluation_type: state
            .evaluation_type
            .clone()
            .unwrap_or_else(|| EVALUATION_TYPES[0].to_string()),
    })
}

/// Decode the wire object. Rules other than generic rules are not
/// representable and are dropped.
pub fn wire_to_state(wire: &InfraAlertConfig) -> Result<InfraAlertConfigState, ProviderError> {
    let tag_filter = match &wire.tag_filter_expression {
        Some(filter) => tagfilter::wire_to_text(filter)?,
        None => None,
    };

    let generic_rule = wire
        .rules
        .iter()
        .find(|r| r.rule.alert_type == GENERIC_RULE)
        .map(|r| GenericRuleState {
            metric_name: r.rule.metric_name.clone(),
            entity_type: r.rule.entity_type.clone(),
            aggregation: r.rule.aggregation.clone(),
            cross_series_aggregation: r.rule.cross_series_aggregation.clone(),
            regex: Some(r.rule.regex),
            threshold_operator: r.threshold_operator.clone(),
            threshold: thresholds_to_state(&r.thresholds),
        });

    let custom_payload_field = custom_payload::to_state(&wire.custom_payload_fields)?;

    Ok(InfraAlertConfigState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        description: Some(wire.description.clone()).filter(|d| !d.is_empty()),
        tag_filter,
        group_by: Some(wire.group_by.clone()).filter(|g| !g.is_empty()),
        granularity: wire.granularity,
        evaluation_type: Some(wire.evaluation_type.clone()),
        alert_channels: alert_channels::to_state(&wire.alert_channels),
        time_threshold: wire
            .time_threshold
            .as_ref()
            .filter(|t| t.threshold_type == VIOLATIONS_IN_SEQUENCE)
            .map(|t| TimeThresholdState {
                violations_in_sequence: Some(ViolationsInSequenceState {
                    time_window: t.time_window,
                }),
            }),
        custom_payload_field: Some(custom_payload_field).filter(|f| !f.is_empty()),
        rules: generic_rule.map(|g| RulesState {
            generic_rule: Some(g),
        }),
    })
}

fn resource_schema() -> Schema {
    let generic_rule = Block::new()
        .with_attribute("metric_name", Attribute::required_string())
        .with_attribute("entity_type", Attribute::required_string())
        .with_attribute(
            "aggregation",
            Attribute::required_string().with_allowed_values(AGGREGATIONS),
        )
        .with_attribute(
            "cross_series_aggregation",
            Attribute::optional_string().with_allowed_values(AGGREGATIONS),
        )
        .with_attribute(
            "regex",
            Attribute::optional_bool().with_description("Whether metric_name is a regular expression"),
        )
        .with_attribute("threshold_operator", threshold_operator_attribute())
        .with_block("threshold", thresholds_block());

    Schema::new(1)
        .with_description("Infrastructure alert configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute(
            "tag_filter",
            Attribute::tag_filter_expression(AttributeFlags::optional()),
        )
        .with_attribute(
            "group_by",
            Attribute::optional_string_list().with_description("The list of tags to group by"),
        )
        .with_attribute(
            "granularity",
            Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed())
                .with_default(Value::from(GRANULARITIES[3])),
        )
        .with_attribute(
            "evaluation_type",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                .with_allowed_values(EVALUATION_TYPES),
        )
        .with_block(alert_channels::ALERT_CHANNELS, alert_channels::schema_block())
        .with_block(
            "time_threshold",
            NestedBlock::single(
                Block::new().with_block(
                    "violations_in_sequence",
                    NestedBlock::single(
                        Block::new().with_attribute("time_window", Attribute::required_int64()),
                    ),
                ),
            ),
        )
        .with_block(custom_payload::CUSTOM_PAYLOAD_FIELD, custom_payload::schema_block())
        .with_block(
            "rules",
            NestedBlock::single(
                Block::new().with_block("generic_rule", NestedBlock::single(generic_rule)),
            ),
        )
}

fn upgrade_v0(state: Value) -> Result<Value, ProviderError> {
    rename_attribute(state, "full_name", "name")
}

/// Resource handle of infrastructure alert configurations.
pub struct InfraAlertConfigResource {
    metadata: ResourceMetadata,
}

impl InfraAlertConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                INFRA_ALERT_CONFIGS_PATH,
                WriteMode::PostPost,
            ),
        }
    }
}

impl Default for InfraAlertConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for InfraAlertConfigResource {
    type Wire = InfraAlertConfig;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if let Some(text) = config.get("tag_filter").and_then(Value::as_str) {
            if let Err(e) = tagfilter::normalize(text) {
                diagnostics.push(
                    Diagnostic::error("Invalid tag filter expression")
                        .with_detail(e.message())
                        .with_attribute("tag_filter"),
                );
            }
        }
        if let Some(granularity) = config.get("granularity").and_then(Value::as_i64) {
            if !GRANULARITIES.contains(&granularity) {
                diagnostics.push(
                    Diagnostic::error("Unsupported granularity")
                        .with_detail(format!(
                            "granularity {} is not one of {:?}",
                            granularity, GRANULARITIES
                        ))
                        .with_attribute("granularity"),
                );
            }
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<InfraAlertConfig, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &InfraAlertConfig,
    ) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire)?)
    }

    fn state_upgraders(&self) -> Vec<StateUpgrader> {
        vec![StateUpgrader::new(0, upgrade_v0)]
    }
}
