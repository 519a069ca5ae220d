//! Mobile app smart alerts: beacon metric rules with thresholds for one app.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, MOBILE_ALERT_CONFIGS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::alert_channels::{self, AlertChannelsState, ALERT_CHANNELS};
use crate::shared::custom_payload::{self, CustomPayloadField, CustomPayloadFieldState};
use crate::shared::threshold::{
    check_threshold_operator, threshold_operator_attribute, thresholds_block, thresholds_to_state,
    thresholds_to_wire, RuleWithThreshold, ThresholdsState,
};
use crate::shared::{from_state, nullable, to_state, Severity};
use crate::tagfilter;

use super::application_alert_config::{ViolationsInPeriodState, ViolationsInSequenceState};
use super::infra_alert_config::GRANULARITIES;

/// Resource name of mobile app alert configurations.
pub const RESOURCE_NAME: &str = "mobile_alert_config";

/// Aggregations of mobile beacon metrics.
pub const AGGREGATIONS: [&str; 11] = [
    "SUM", "MEAN", "MAX", "MIN", "P25", "P50", "P75", "P90", "P95", "P98", "P99",
];

/// Operators matching the rule value.
pub const RULE_OPERATORS: [&str; 2] = ["STARTS_WITH", "EQUALS"];

const CUSTOM_EVENT: &str = "customEvent";
const USER_IMPACT: &str = "userImpactOfViolationsInSequence";
const VIOLATIONS_IN_PERIOD: &str = "violationsInPeriod";
const VIOLATIONS_IN_SEQUENCE: &str = "violationsInSequence";
const MAX_NAME_LENGTH: usize = 256;
const MAX_DESCRIPTION_LENGTH: usize = 65536;
const MAX_APP_ID_LENGTH: usize = 64;

/// A mobile app alert configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileAlertConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub mobile_app_id: String,
    #[serde(default)]
    pub triggering: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub tag_filter_expression: Option<Value>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub alert_channels: BTreeMap<Severity, Vec<String>>,
    pub granularity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleWithThreshold<MobileAlertRule>>,
    #[serde(default)]
    pub time_threshold: Option<MobileTimeThreshold>,
}

impl WireModel for MobileAlertConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileAlertRule {
    pub alert_type: String,
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_event_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileTimeThreshold {
    #[serde(rename = "type")]
    pub threshold_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_percentage: Option<f64>,
}

/// Host state of a mobile app alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileAlertConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub mobile_app_id: String,
    pub granularity: i64,
    #[serde(default)]
    pub triggering: Option<bool>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub tag_filter: Option<String>,
    #[serde(default)]
    pub grace_period: Option<i64>,
    #[serde(default)]
    pub alert_channels: Option<AlertChannelsState>,
    #[serde(default)]
    pub custom_payload_field: Option<Vec<CustomPayloadFieldState>>,
    #[serde(default)]
    pub rules: Option<Vec<MobileRuleWithThresholdState>>,
    pub time_threshold: MobileTimeThresholdState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileRuleWithThresholdState {
    pub threshold_operator: String,
    pub rule: MobileRuleState,
    pub threshold: ThresholdsState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileRuleState {
    pub alert_type: String,
    pub metric_name: String,
    #[serde(default)]
    pub aggregation: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub custom_event_name: Option<String>,
}

/// Exactly one kind is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MobileTimeThresholdState {
    #[serde(default)]
    pub user_impact_of_violations_in_sequence: Option<MobileUserImpactState>,
    #[serde(default)]
    pub violations_in_period: Option<ViolationsInPeriodState>,
    #[serde(default)]
    pub violations_in_sequence: Option<ViolationsInSequenceState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileUserImpactState {
    pub time_window: i64,
    #[serde(default)]
    pub users: Option<i64>,
    #[serde(default)]
    pub percentage: Option<f64>,
}

fn time_threshold_to_wire(threshold: &MobileTimeThresholdState) -> Result<MobileTimeThreshold, ProviderError> {
    let base = |threshold_type: &str, time_window: i64| MobileTimeThreshold {
        threshold_type: threshold_type.to_string(),
        time_window: Some(time_window),
        violations: None,
        users: None,
        user_percentage: None,
    };
    let candidates = [
        threshold
            .user_impact_of_violations_in_sequence
            .as_ref()
            .map(|t| MobileTimeThreshold {
                users: t.users,
                user_percentage: t.percentage,
                ..base(USER_IMPACT, t.time_window)
            }),
        threshold
            .violations_in_period
            .as_ref()
            .map(|t| MobileTimeThreshold {
                violations: Some(t.violations),
                ..base(VIOLATIONS_IN_PERIOD, t.time_window)
            }),
        threshold
            .violations_in_sequence
            .as_ref()
            .map(|t| base(VIOLATIONS_IN_SEQUENCE, t.time_window)),
    ];
    let mut set = candidates.into_iter().flatten();
    match (set.next(), set.next()) {
        (Some(threshold), None) => Ok(threshold),
        _ => Err(ProviderError::InvalidConfig(
            "time_threshold: exactly one of user_impact_of_violations_in_sequence, violations_in_period or violations_in_sequence must be set"
                .to_string(),
        )),
    }
}

fn time_threshold_to_state(threshold: &MobileTimeThreshold) -> Result<MobileTimeThresholdState, ProviderError> {
    let time_window = threshold.time_window.unwrap_or(GRANULARITIES[2]);
    let mut state = MobileTimeThresholdState::default();
    match threshold.threshold_type.as_str() {
        USER_IMPACT => {
            state.user_impact_of_violations_in_sequence = Some(MobileUserImpactState {
                time_window,
                users: threshold.users,
                percentage: threshold.user_percentage,
            })
        },
        VIOLATIONS_IN_PERIOD => {
            state.violations_in_period = Some(ViolationsInPeriodState {
                time_window,
                violations: threshold.violations.unwrap_or_default(),
            })
        },
        VIOLATIONS_IN_SEQUENCE => {
            state.violations_in_sequence = Some(ViolationsInSequenceState { time_window })
        },
        other => {
            return Err(ProviderError::Decode(format!(
                "unsupported mobile time threshold type '{}'",
                other
            )))
        },
    }
    Ok(state)
}

pub fn state_to_wire(state: &MobileAlertConfigState) -> Result<MobileAlertConfig, ProviderError> {
    let tag_filter_expression = match state.tag_filter.as_deref() {
        Some(text) => tagfilter::text_to_wire(text)?,
        None => None,
    };
    let rules = state
        .rules
        .iter()
        .flatten()
        .enumerate()
        .map(|(index, rule)| {
            let path = format!("rules.{}", index);
            check_threshold_operator(&rule.threshold_operator, &format!("{}.threshold_operator", path))?;
            Ok(RuleWithThreshold {
                threshold_operator: rule.threshold_operator.clone(),
                rule: MobileAlertRule {
                    alert_type: rule.rule.alert_type.clone(),
                    metric_name: rule.rule.metric_name.clone(),
                    aggregation: rule.rule.aggregation.clone(),
                    operator: rule.rule.operator.clone(),
                    value: rule.rule.value.clone(),
                    custom_event_name: rule.rule.custom_event_name.clone(),
                },
                thresholds: thresholds_to_wire(&rule.threshold, &format!("{}.threshold", path))?,
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;

    Ok(MobileAlertConfig {
        id: state.id.clone(),
        name: state.name.clone(),
        description: state.description.clone(),
        mobile_app_id: state.mobile_app_id.clone(),
        triggering: state.triggering.unwrap_or(false),
        enabled: state.enabled,
        tag_filter_expression,
        alert_channels: alert_channels::to_wire(state.alert_channels.as_ref()),
        granularity: state.granularity,
        grace_period: state.grace_period,
        custom_payload_fields: custom_payload::to_wire(
            state.custom_payload_field.as_deref().unwrap_or_default(),
        )?,
        rules,
        time_threshold: Some(time_threshold_to_wire(&state.time_threshold)?),
    })
}

pub fn wire_to_state(wire: &MobileAlertConfig) -> Result<MobileAlertConfigState, ProviderError> {
    let tag_filter = match &wire.tag_filter_expression {
        Some(filter) => tagfilter::wire_to_text(filter)?,
        None => None,
    };
    let rules: Vec<_> = wire
        .rules
        .iter()
        .map(|rule| MobileRuleWithThresholdState {
            threshold_operator: rule.threshold_operator.clone(),
            rule: MobileRuleState {
                alert_type: rule.rule.alert_type.clone(),
                metric_name: rule.rule.metric_name.clone(),
                aggregation: rule.rule.aggregation.clone(),
                operator: rule.rule.operator.clone(),
                value: rule.rule.value.clone(),
                custom_event_name: rule.rule.custom_event_name.clone(),
            },
            threshold: thresholds_to_state(&rule.thresholds),
        })
        .collect();
    let custom_payload_field = custom_payload::to_state(&wire.custom_payload_fields)?;
    let time_threshold = wire
        .time_threshold
        .as_ref()
        .ok_or_else(|| ProviderError::Decode("mobile alert config without time threshold".to_string()))?;

    Ok(MobileAlertConfigState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        description: wire.description.clone(),
        mobile_app_id: wire.mobile_app_id.clone(),
        granularity: wire.granularity,
        triggering: Some(wire.triggering),
        enabled: Some(wire.enabled.unwrap_or(true)),
        tag_filter,
        grace_period: wire.grace_period,
        alert_channels: alert_channels::to_state(&wire.alert_channels),
        custom_payload_field: (!custom_payload_field.is_empty()).then_some(custom_payload_field),
        rules: (!rules.is_empty()).then_some(rules),
        time_threshold: time_threshold_to_state(time_threshold)?,
    })
}

fn resource_schema() -> Schema {
    let rule = Block::new()
        .with_attribute(
            "alert_type",
            Attribute::required_string().with_description("For example slowness, crash or customEvent"),
        )
        .with_attribute("metric_name", Attribute::required_string())
        .with_attribute(
            "aggregation",
            Attribute::optional_string().with_allowed_values(AGGREGATIONS),
        )
        .with_attribute(
            "operator",
            Attribute::optional_string().with_allowed_values(RULE_OPERATORS),
        )
        .with_attribute("value", Attribute::optional_string())
        .with_attribute(
            "custom_event_name",
            Attribute::optional_string().with_description("Required for customEvent rules"),
        );
    let rules = Block::new()
        .with_attribute("threshold_operator", threshold_operator_attribute())
        .with_block("rule", NestedBlock::single(rule).with_min_items(1))
        .with_block("threshold", thresholds_block());

    let time_window = || {
        Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed())
            .with_default(Value::from(GRANULARITIES[2]))
            .with_description("The time window in milliseconds")
    };
    let time_threshold = Block::new()
        .with_block(
            "user_impact_of_violations_in_sequence",
            NestedBlock::single(
                Block::new()
                    .with_attribute("time_window", time_window())
                    .with_attribute("users", Attribute::optional_int64())
                    .with_attribute(
                        "percentage",
                        Attribute::optional_float64()
                            .with_description("Share of impacted users, between 0 and 1"),
                    ),
            ),
        )
        .with_block(
            "violations_in_period",
            NestedBlock::single(
                Block::new()
                    .with_attribute("time_window", time_window())
                    .with_attribute("violations", Attribute::required_int64()),
            ),
        )
        .with_block(
            "violations_in_sequence",
            NestedBlock::single(Block::new().with_attribute("time_window", time_window())),
        )
        .with_exactly_one_of([
            "user_impact_of_violations_in_sequence",
            "violations_in_period",
            "violations_in_sequence",
        ]);

    let flag = |default: bool| {
        Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
            .with_default(Value::Bool(default))
    };

    Schema::v0()
        .with_description("Mobile app alert configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("description", Attribute::required_string())
        .with_attribute("mobile_app_id", Attribute::required_string())
        .with_attribute(
            "granularity",
            Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed())
                .with_default(Value::from(GRANULARITIES[2])),
        )
        .with_attribute("triggering", flag(false))
        .with_attribute("enabled", flag(true))
        .with_attribute(
            "tag_filter",
            Attribute::tag_filter_expression(AttributeFlags::optional()),
        )
        .with_attribute(
            "grace_period",
            Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed())
                .with_description("Milliseconds an alert stays open after the violation ends"),
        )
        .with_block(ALERT_CHANNELS, alert_channels::schema_block())
        .with_block(custom_payload::CUSTOM_PAYLOAD_FIELD, custom_payload::schema_block())
        .with_block("rules", NestedBlock::list(rules))
        .with_block("time_threshold", NestedBlock::single(time_threshold).with_min_items(1))
}

/// Resource handle of mobile app alert configurations.
pub struct MobileAlertConfigResource {
    metadata: ResourceMetadata,
}

impl MobileAlertConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                MOBILE_ALERT_CONFIGS_PATH,
                WriteMode::PostPost,
            ),
        }
    }
}

impl Default for MobileAlertConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for MobileAlertConfigResource {
    type Wire = MobileAlertConfig;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (field, max) in [
            ("name", MAX_NAME_LENGTH),
            ("description", MAX_DESCRIPTION_LENGTH),
            ("mobile_app_id", MAX_APP_ID_LENGTH),
        ] {
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

        let rules = config
            .get("rules")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();
        for (index, rule) in rules.enumerate() {
            let rule = rule.get("rule");
            let custom_event = rule
                .and_then(|r| r.get("alert_type"))
                .and_then(Value::as_str)
                == Some(CUSTOM_EVENT);
            let named = rule
                .and_then(|r| r.get("custom_event_name"))
                .and_then(Value::as_str)
                .is_some_and(|name| !name.is_empty());
            if custom_event && !named {
                diagnostics.push(
                    Diagnostic::error("Missing custom event name")
                        .with_detail("customEvent rules require custom_event_name")
                        .with_attribute(format!("rules.{}.rule.custom_event_name", index)),
                );
            }
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<MobileAlertConfig, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &MobileAlertConfig,
    ) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire)?)
    }
}
