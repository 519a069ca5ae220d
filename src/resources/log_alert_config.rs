//! Log smart alerts: a log count rule over a tag filtered log stream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, LOG_ALERT_CONFIGS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::alert_channels::{self, AlertChannelsState, ALERT_CHANNELS};
use crate::shared::custom_payload::{self, CustomPayloadField, CustomPayloadFieldState};
use crate::shared::threshold::{
    check_threshold_operator, threshold_operator_attribute, thresholds_block, thresholds_to_state,
    thresholds_to_wire, RuleWithThreshold, ThresholdRule, ThresholdsState,
};
use crate::shared::{from_state, nullable, to_state, Severity};
use crate::tagfilter;

use super::infra_alert_config::GRANULARITIES;

/// Resource name of log alert configurations.
pub const RESOURCE_NAME: &str = "log_alert_config";

/// Alert type of log count rules, as configured.
pub const LOG_COUNT: &str = "log.count";

const LOG_COUNT_WIRE: &str = "logCount";
const SUM: &str = "SUM";
const VIOLATIONS_IN_SEQUENCE: &str = "violationsInSequence";
const MAX_NAME_LENGTH: usize = 256;
const MAX_DESCRIPTION_LENGTH: usize = 65536;

/// A log alert configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogAlertConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tag_filter_expression: Option<Value>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub alert_channels: BTreeMap<Severity, Vec<String>>,
    pub granularity: i64,
    pub time_threshold: LogTimeThreshold,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default, deserialize_with = "nullable")]
    pub rules: Vec<RuleWithThreshold<LogAlertRule>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<GroupByTag>,
}

impl WireModel for LogAlertConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogAlertRule {
    pub alert_type: String,
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogTimeThreshold {
    #[serde(rename = "type")]
    pub threshold_type: String,
    pub time_window: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupByTag {
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Host state of a log alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogAlertConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tag_filter: String,
    pub granularity: i64,
    #[serde(default)]
    pub grace_period: Option<i64>,
    #[serde(default)]
    pub alert_channels: Option<AlertChannelsState>,
    #[serde(default)]
    pub group_by: Option<Vec<GroupByState>>,
    #[serde(default)]
    pub custom_payload_field: Option<Vec<CustomPayloadFieldState>>,
    pub rules: LogRuleState,
    pub time_threshold: LogTimeThresholdState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupByState {
    pub tag_name: String,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRuleState {
    #[serde(default = "log_count")]
    pub alert_type: String,
    pub metric_name: String,
    #[serde(default)]
    pub aggregation: Option<String>,
    pub threshold_operator: String,
    pub threshold: ThresholdsState,
}

fn log_count() -> String {
    LOG_COUNT.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTimeThresholdState {
    pub violations_in_sequence: LogViolationsInSequenceState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogViolationsInSequenceState {
    pub time_window: i64,
}

fn rule_to_wire(rule: &LogRuleState) -> Result<RuleWithThreshold<LogAlertRule>, ProviderError> {
    check_threshold_operator(&rule.threshold_operator, "rules.threshold_operator")?;
    let thresholds = thresholds_to_wire(&rule.threshold, "rules.threshold")?;
    if thresholds.values().any(|t| !matches!(t, ThresholdRule::Static { .. })) {
        return Err(ProviderError::InvalidConfig(
            "rules.threshold: log alerts only support static thresholds".to_string(),
        ));
    }
    let alert_type = match rule.alert_type.as_str() {
        LOG_COUNT => LOG_COUNT_WIRE.to_string(),
        other => other.to_string(),
    };
    Ok(RuleWithThreshold {
        threshold_operator: rule.threshold_operator.clone(),
        rule: LogAlertRule {
            alert_type,
            metric_name: rule.metric_name.clone(),
            aggregation: rule.aggregation.clone(),
        },
        thresholds,
    })
}

pub fn state_to_wire(state: &LogAlertConfigState) -> Result<LogAlertConfig, ProviderError> {
    let group_by = state
        .group_by
        .iter()
        .flatten()
        .map(|tag| GroupByTag {
            tag_name: tag.tag_name.clone(),
            key: tag.key.clone().filter(|key| !key.is_empty()),
        })
        .collect();

    Ok(LogAlertConfig {
        id: state.id.clone(),
        name: state.name.clone(),
        description: state.description.clone(),
        tag_filter_expression: tagfilter::text_to_wire(&state.tag_filter)?,
        alert_channels: alert_channels::to_wire(state.alert_channels.as_ref()),
        granularity: state.granularity,
        time_threshold: LogTimeThreshold {
            threshold_type: VIOLATIONS_IN_SEQUENCE.to_string(),
            time_window: state.time_threshold.violations_in_sequence.time_window,
        },
        grace_period: state.grace_period.filter(|period| *period > 0),
        custom_payload_fields: custom_payload::to_wire(
            state.custom_payload_field.as_deref().unwrap_or_default(),
        )?,
        rules: vec![rule_to_wire(&state.rules)?],
        group_by,
    })
}

pub fn wire_to_state(wire: &LogAlertConfig) -> Result<LogAlertConfigState, ProviderError> {
    // The API returns a list; configurations carry exactly one rule.
    let rule = wire
        .rules
        .first()
        .ok_or_else(|| ProviderError::Decode("log alert config without rules".to_string()))?;
    let tag_filter = match &wire.tag_filter_expression {
        Some(filter) => tagfilter::wire_to_text(filter)?.unwrap_or_default(),
        None => String::new(),
    };
    if wire.time_threshold.threshold_type != VIOLATIONS_IN_SEQUENCE {
        return Err(ProviderError::Decode(format!(
            "unsupported log time threshold type '{}'",
            wire.time_threshold.threshold_type
        )));
    }
    let group_by: Vec<_> = wire
        .group_by
        .iter()
        .map(|tag| GroupByState {
            tag_name: tag.tag_name.clone(),
            key: tag.key.clone(),
        })
        .collect();
    let custom_payload_field = custom_payload::to_state(&wire.custom_payload_fields)?;

    Ok(LogAlertConfigState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        description: wire.description.clone(),
        tag_filter,
        granularity: wire.granularity,
        grace_period: wire.grace_period.filter(|period| *period > 0),
        alert_channels: alert_channels::to_state(&wire.alert_channels),
        group_by: (!group_by.is_empty()).then_some(group_by),
        custom_payload_field: (!custom_payload_field.is_empty()).then_some(custom_payload_field),
        rules: LogRuleState {
            alert_type: match rule.rule.alert_type.as_str() {
                LOG_COUNT_WIRE => log_count(),
                other => other.to_string(),
            },
            metric_name: rule.rule.metric_name.clone(),
            aggregation: rule.rule.aggregation.clone(),
            threshold_operator: rule.threshold_operator.clone(),
            threshold: thresholds_to_state(&rule.thresholds),
        },
        time_threshold: LogTimeThresholdState {
            violations_in_sequence: LogViolationsInSequenceState {
                time_window: wire.time_threshold.time_window,
            },
        },
    })
}

fn resource_schema() -> Schema {
    let rules = Block::new()
        .with_attribute("metric_name", Attribute::required_string())
        .with_attribute(
            "alert_type",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                .with_default(Value::from(LOG_COUNT))
                .with_allowed_values([LOG_COUNT]),
        )
        .with_attribute(
            "aggregation",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                .with_default(Value::from(SUM))
                .with_allowed_values([SUM]),
        )
        .with_attribute("threshold_operator", threshold_operator_attribute())
        .with_block("threshold", thresholds_block());
    let time_threshold = Block::new().with_block(
        "violations_in_sequence",
        NestedBlock::single(
            Block::new().with_attribute(
                "time_window",
                Attribute::required_int64().with_description("The time window in milliseconds"),
            ),
        )
        .with_min_items(1),
    );
    let group_by = Block::new()
        .with_attribute("tag_name", Attribute::required_string())
        .with_attribute("key", Attribute::optional_string());

    Schema::v0()
        .with_description("Log alert configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("description", Attribute::required_string())
        .with_attribute(
            "tag_filter",
            Attribute::tag_filter_expression(AttributeFlags::required()),
        )
        .with_attribute(
            "granularity",
            Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed())
                .with_default(Value::from(GRANULARITIES[2])),
        )
        .with_attribute(
            "grace_period",
            Attribute::optional_int64()
                .with_description("Milliseconds an alert stays open after the violation ends"),
        )
        .with_block(ALERT_CHANNELS, alert_channels::schema_block())
        .with_block("group_by", NestedBlock::list(group_by))
        .with_block(custom_payload::CUSTOM_PAYLOAD_FIELD, custom_payload::schema_block())
        .with_block("rules", NestedBlock::single(rules).with_min_items(1))
        .with_block("time_threshold", NestedBlock::single(time_threshold).with_min_items(1))
}

/// Resource handle of log alert configurations.
pub struct LogAlertConfigResource {
    metadata: ResourceMetadata,
}

impl LogAlertConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                LOG_ALERT_CONFIGS_PATH,
                WriteMode::PostPost,
            ),
        }
    }
}

impl Default for LogAlertConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for LogAlertConfigResource {
    type Wire = LogAlertConfig;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (field, max) in [("name", MAX_NAME_LENGTH), ("description", MAX_DESCRIPTION_LENGTH)] {
            let length = config.get(field).and_then(Value::as_str).map(|s| s.chars().count());
            if length.is_some_and(|n| n > max) {
                diagnostics.push(
                    Diagnostic::error("Value too long")
                        .with_detail(format!("{} must not exceed {} characters", field, max))
                        .with_attribute(field),
                );
            }
        }
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

    fn map_state_to_wire(&self, state: &Value) -> Result<LogAlertConfig, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        prior: Option<&Value>,
        wire: &LogAlertConfig,
    ) -> Result<Value, ProviderError> {
        let mut state = wire_to_state(wire)?;
        let prior_filter = prior
            .and_then(|p| p.get("tag_filter"))
            .and_then(Value::as_str);
        if let Some(prior_filter) = prior_filter {
            if tagfilter::equivalent(prior_filter, &state.tag_filter) {
                state.tag_filter = prior_filter.to_string();
            }
        }
        to_state(&state)
    }
}
