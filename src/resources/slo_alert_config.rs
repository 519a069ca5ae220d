//! SLO smart alerts: status, error budget and burn rate alerts on a set of
//! SLO configurations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, SLO_ALERT_CONFIGS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::custom_payload::{self, CustomPayloadField, CustomPayloadFieldState};
use crate::shared::{from_state, nullable, to_state, Severity};

/// Resource name of SLO alert configurations.
pub const RESOURCE_NAME: &str = "slo_alert_config";

/// Alert types in configuration.
pub const ALERT_TYPES: [&str; 3] = ["status", "error_budget", "burn_rate_v2"];

/// Operators comparing the SLO metric with the threshold.
pub const OPERATORS: [&str; 5] = [">", ">=", "=", "<=", "<"];

const STATIC_THRESHOLD: &str = "staticThreshold";
const MAX_NAME_LENGTH: usize = 256;

/// Wire `alertType` and `metric` of each configured alert type.
const RULES: [(&str, &str, &str); 3] = [
    ("status", "SERVICE_LEVELS_OBJECTIVE", "STATUS"),
    ("error_budget", "ERROR_BUDGET", "BURNED_PERCENTAGE"),
    ("burn_rate_v2", "ERROR_BUDGET", "BURN_RATE_V2"),
];

/// An SLO alert configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloAlertConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub severity: i64,
    #[serde(default)]
    pub triggering: bool,
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub rule: SloAlertRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<SloThreshold>,
    pub time_threshold: SloTimeThreshold,
    #[serde(default, deserialize_with = "nullable")]
    pub slo_ids: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub alert_channel_ids: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default, deserialize_with = "nullable")]
    pub burn_rate_configs: Vec<BurnRateConfig>,
}

fn enabled() -> bool {
    true
}

impl WireModel for SloAlertConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloAlertRule {
    pub alert_type: String,
    pub metric: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloThreshold {
    #[serde(rename = "type")]
    pub threshold_type: String,
    pub operator: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloTimeThreshold {
    pub time_window: i64,
    #[serde(default)]
    pub expiry: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnRateConfig {
    pub alert_window_type: String,
    pub duration: i64,
    pub duration_unit_type: String,
    pub threshold: BurnRateThreshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnRateThreshold {
    pub operator: String,
    pub value: f64,
}

/// Host state of an SLO alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloAlertConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub severity: String,
    #[serde(default)]
    pub triggering: Option<bool>,
    pub alert_type: String,
    pub slo_ids: Vec<String>,
    #[serde(default)]
    pub alert_channel_ids: Option<Vec<String>>,
    #[serde(default)]
    pub threshold: Option<SloThresholdState>,
    pub time_threshold: SloTimeThresholdState,
    #[serde(default)]
    pub burn_rate_config: Option<Vec<BurnRateConfigState>>,
    #[serde(default)]
    pub custom_payload_field: Option<Vec<CustomPayloadFieldState>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloThresholdState {
    #[serde(rename = "type", default = "static_threshold")]
    pub threshold_type: String,
    pub operator: String,
    pub value: f64,
}

fn static_threshold() -> String {
    STATIC_THRESHOLD.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SloTimeThresholdState {
    pub warm_up: i64,
    #[serde(default)]
    pub cool_down: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnRateConfigState {
    pub alert_window_type: String,
    pub duration: i64,
    pub duration_unit_type: String,
    pub threshold_operator: String,
    pub threshold_value: f64,
}

/// Canonical alert type of a configured spelling. Camel case spellings are
/// accepted as aliases.
fn canonical_alert_type(alert_type: &str) -> Option<&'static str> {
    match alert_type {
        "errorBudget" | "error-budget" => Some("error_budget"),
        "burnRateV2" | "burn_rate" | "burnRate" => Some("burn_rate_v2"),
        other => ALERT_TYPES.iter().copied().find(|t| *t == other),
    }
}

fn rule_to_wire(alert_type: &str) -> Result<SloAlertRule, ProviderError> {
    let canonical = canonical_alert_type(alert_type).ok_or_else(|| {
        ProviderError::InvalidConfig(format!(
            "alert_type: unsupported alert type '{}', expected one of {}",
            alert_type,
            ALERT_TYPES.join(", ")
        ))
    })?;
    let (_, wire_type, metric) = RULES
        .iter()
        .find(|(name, _, _)| *name == canonical)
        .copied()
        .unwrap_or(RULES[0]);
    Ok(SloAlertRule {
        alert_type: wire_type.to_string(),
        metric: metric.to_string(),
    })
}

fn rule_to_state(rule: &SloAlertRule) -> Result<&'static str, ProviderError> {
    // Older configurations report the first generation burn rate metric.
    let metric = match rule.metric.as_str() {
        "BURN_RATE" => "BURNED_PERCENTAGE",
        other => other,
    };
    RULES
        .iter()
        .find(|(_, wire_type, wire_metric)| *wire_type == rule.alert_type && *wire_metric == metric)
        .map(|(name, _, _)| *name)
        .ok_or_else(|| {
            ProviderError::Decode(format!(
                "unsupported SLO alert rule {}/{}",
                rule.alert_type, rule.metric
            ))
        })
}

pub fn state_to_wire(state: &SloAlertConfigState) -> Result<SloAlertConfig, ProviderError> {
    let rule = rule_to_wire(&state.alert_type)?;
    let burn_rate = rule.metric == RULES[2].2;
    let burn_rate_configs = if burn_rate {
        state
            .burn_rate_config
            .iter()
            .flatten()
            .map(|config| BurnRateConfig {
                alert_window_type: config.alert_window_type.clone(),
                duration: config.duration,
                duration_unit_type: config.duration_unit_type.clone(),
                threshold: BurnRateThreshold {
                    operator: config.threshold_operator.clone(),
                    value: config.threshold_value,
                },
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(SloAlertConfig {
        id: state.id.clone(),
        name: state.name.clone(),
        description: state.description.clone(),
        severity: Severity::parse(&state.severity)?.code(),
        triggering: state.triggering.unwrap_or(false),
        enabled: true,
        rule,
        threshold: state.threshold.as_ref().map(|threshold| SloThreshold {
            threshold_type: threshold.threshold_type.clone(),
            operator: threshold.operator.clone(),
            value: threshold.value,
        }),
        time_threshold: SloTimeThreshold {
            time_window: state.time_threshold.warm_up,
            expiry: state.time_threshold.cool_down.unwrap_or_default(),
        },
        slo_ids: state.slo_ids.clone(),
        alert_channel_ids: state.alert_channel_ids.clone().unwrap_or_default(),
        custom_payload_fields: custom_payload::to_wire(
            state.custom_payload_field.as_deref().unwrap_or_default(),
        )?,
        burn_rate_configs,
    })
}

pub fn wire_to_state(wire: &SloAlertConfig) -> Result<SloAlertConfigState, ProviderError> {
    let burn_rate_config: Vec<_> = wire
        .burn_rate_configs
        .iter()
        .map(|config| BurnRateConfigState {
            alert_window_type: config.alert_window_type.clone(),
            duration: config.duration,
            duration_unit_type: config.duration_unit_type.clone(),
            threshold_operator: config.threshold.operator.clone(),
            threshold_value: config.threshold.value,
        })
        .collect();
    let custom_payload_field = custom_payload::to_state(&wire.custom_payload_fields)?;

    Ok(SloAlertConfigState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        description: wire.description.clone(),
        severity: Severity::from_code(wire.severity)?.as_str().to_string(),
        triggering: Some(wire.triggering),
        alert_type: rule_to_state(&wire.rule)?.to_string(),
        slo_ids: wire.slo_ids.clone(),
        alert_channel_ids: (!wire.alert_channel_ids.is_empty()).then(|| wire.alert_channel_ids.clone()),
        threshold: wire.threshold.as_ref().map(|threshold| SloThresholdState {
            threshold_type: match threshold.threshold_type.as_str() {
                "static" => static_threshold(),
                other => other.to_string(),
            },
            operator: threshold.operator.clone(),
            value: threshold.value,
        }),
        time_threshold: SloTimeThresholdState {
            warm_up: wire.time_threshold.time_window,
            cool_down: Some(wire.time_threshold.expiry).filter(|expiry| *expiry > 0),
        },
        burn_rate_config: (!burn_rate_config.is_empty()).then_some(burn_rate_config),
        custom_payload_field: (!custom_payload_field.is_empty()).then_some(custom_payload_field),
    })
}

fn resource_schema() -> Schema {
    let operator = || Attribute::required_string().with_allowed_values(OPERATORS);
    let threshold = Block::new()
        .with_attribute(
            "type",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                .with_default(Value::from(STATIC_THRESHOLD))
                .with_allowed_values([STATIC_THRESHOLD]),
        )
        .with_attribute("operator", operator())
        .with_attribute("value", Attribute::required_float64());
    let time_threshold = Block::new()
        .with_attribute(
            "warm_up",
            Attribute::required_int64().with_description("Milliseconds a violation lasts before alerting"),
        )
        .with_attribute(
            "cool_down",
            Attribute::optional_int64().with_description("Milliseconds before an alert closes"),
        );
    let burn_rate = Block::new()
        .with_attribute("alert_window_type", Attribute::required_string())
        .with_attribute("duration", Attribute::required_int64())
        .with_attribute("duration_unit_type", Attribute::required_string())
        .with_attribute("threshold_operator", operator())
        .with_attribute("threshold_value", Attribute::required_float64());

    Schema::v0()
        .with_description("SLO alert configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("description", Attribute::required_string())
        .with_attribute(
            "severity",
            Attribute::required_string().with_allowed_values(Severity::names()),
        )
        .with_attribute(
            "triggering",
            Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                .with_default(Value::Bool(false)),
        )
        .with_attribute(
            "alert_type",
            Attribute::required_string().with_allowed_values(ALERT_TYPES),
        )
        .with_attribute(
            "slo_ids",
            Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::required()),
        )
        .with_attribute(
            "alert_channel_ids",
            Attribute::optional_string_set().with_description("Alerting channel ids"),
        )
        .with_block("threshold", NestedBlock::single(threshold))
        .with_block("time_threshold", NestedBlock::single(time_threshold).with_min_items(1))
        .with_block("burn_rate_config", NestedBlock::list(burn_rate))
        .with_block(custom_payload::CUSTOM_PAYLOAD_FIELD, custom_payload::schema_block())
}

/// Resource handle of SLO alert configurations.
pub struct SloAlertConfigResource {
    metadata: ResourceMetadata,
}

impl SloAlertConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                SLO_ALERT_CONFIGS_PATH,
                WriteMode::PostPost,
            ),
        }
    }
}

impl Default for SloAlertConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for SloAlertConfigResource {
    type Wire = SloAlertConfig;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let name_length = config
            .get("name")
            .and_then(Value::as_str)
            .map(|name| name.chars().count());
        if name_length.is_some_and(|n| n > MAX_NAME_LENGTH) {
            diagnostics.push(
                Diagnostic::error("Invalid name")
                    .with_detail(format!("name must not exceed {} characters", MAX_NAME_LENGTH))
                    .with_attribute("name"),
            );
        }

        let alert_type = config
            .get("alert_type")
            .and_then(Value::as_str)
            .and_then(canonical_alert_type);
        let present = |field: &str| {
            config
                .get(field)
                .is_some_and(|v| !v.is_null() && v.as_array().map_or(true, |a| !a.is_empty()))
        };
        match alert_type {
            Some("burn_rate_v2") if !present("burn_rate_config") => diagnostics.push(
                Diagnostic::error("Missing burn rate configuration")
                    .with_detail("burn_rate_v2 alerts require at least one burn_rate_config")
                    .with_attribute("burn_rate_config"),
            ),
            Some("status" | "error_budget") if !present("threshold") => diagnostics.push(
                Diagnostic::error("Missing threshold")
                    .with_detail("status and error_budget alerts require a threshold")
                    .with_attribute("threshold"),
            ),
            _ => {},
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<SloAlertConfig, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &SloAlertConfig,
    ) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire)?)
    }
}
