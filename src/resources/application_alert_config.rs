//! Application smart alerts, per application perspective or global across
//! applications: call metric rules with thresholds over a scoped selection
//! of applications, services and endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{rename_attribute, ResourceHandle, ResourceMetadata, StateUpgrader};
use crate::restapi::{
    WireModel, WriteMode, APPLICATION_ALERT_CONFIGS_PATH, GLOBAL_APPLICATION_ALERT_CONFIGS_PATH,
};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::alert_channels::{self, AlertChannelsState};
use crate::shared::custom_payload::{self, CustomPayloadField, CustomPayloadFieldState};
use crate::shared::threshold::{
    check_threshold_operator, threshold_operator_attribute, thresholds_block, thresholds_to_state,
    thresholds_to_wire, RuleWithThreshold, ThresholdsState,
};
use crate::shared::{from_state, to_state, Severity};
use crate::tagfilter::{self, Operator};

use super::infra_alert_config::GRANULARITIES;

/// Resource name of application alert configurations.
pub const RESOURCE_NAME: &str = "application_alert_config";

/// Resource name of global application alert configurations.
pub const GLOBAL_RESOURCE_NAME: &str = "global_application_alert_config";

/// Which calls of the selected applications are evaluated.
pub const BOUNDARY_SCOPES: [&str; 2] = ["ALL", "INBOUND"];

/// Evaluation per application, per service or per endpoint.
pub const EVALUATION_TYPES: [&str; 3] = ["PER_AP", "PER_AP_SERVICE", "PER_AP_ENDPOINT"];

/// Metric aggregations.
pub const AGGREGATIONS: [&str; 11] = [
    "SUM", "MEAN", "MAX", "MIN", "P25", "P50", "P75", "P90", "P95", "P98", "P99",
];

/// Log levels of log rules.
pub const LOG_LEVELS: [&str; 3] = ["WARN", "ERROR", "ANY"];

const MAX_NAME_LENGTH: usize = 256;
const MAX_DESCRIPTION_LENGTH: usize = 65536;
const MAX_VIOLATIONS_IN_PERIOD: i64 = 12;

const REQUEST_IMPACT: &str = "requestImpact";
const VIOLATIONS_IN_PERIOD: &str = "violationsInPeriod";
const VIOLATIONS_IN_SEQUENCE: &str = "violationsInSequence";

/// Rule kinds in state, each with its wire alert type.
const RULE_KINDS: [(&str, &str); 6] = [
    ("error_rate", "errorRate"),
    ("errors", "errors"),
    ("logs", "logs"),
    ("slowness", "slowness"),
    ("status_code", "statusCode"),
    ("throughput", "throughput"),
];

// ============================================================================
// Wire model
// ============================================================================

/// An application alert configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationAlertConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub triggering: bool,
    #[serde(default)]
    pub applications: BTreeMap<String, IncludedApplication>,
    pub boundary_scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<Value>,
    #[serde(default)]
    pub include_internal: bool,
    #[serde(default)]
    pub include_synthetic: bool,
    pub evaluation_type: String,
    #[serde(default)]
    pub alert_channels: BTreeMap<Severity, Vec<String>>,
    pub granularity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<i64>,
    #[serde(default)]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default)]
    pub rules: Vec<RuleWithThreshold<ApplicationAlertRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_threshold: Option<ApplicationTimeThreshold>,
}

impl WireModel for ApplicationAlertConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludedApplication {
    pub application_id: String,
    pub inclusive: bool,
    #[serde(default)]
    pub services: BTreeMap<String, IncludedService>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludedService {
    pub service_id: String,
    pub inclusive: bool,
    #[serde(default)]
    pub endpoints: BTreeMap<String, IncludedEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludedEndpoint {
    pub endpoint_id: String,
    pub inclusive: bool,
}

/// A call metric rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationAlertRule {
    pub alert_type: String,
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code_start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code_end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationTimeThreshold {
    #[serde(rename = "type")]
    pub threshold_type: String,
    pub time_window: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<i64>,
}

// ============================================================================
// State model
// ============================================================================

/// Host state of an application alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationAlertConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub boundary_scope: String,
    pub evaluation_type: String,
    pub granularity: i64,
    #[serde(default)]
    pub grace_period: Option<i64>,
    #[serde(default)]
    pub include_internal: Option<bool>,
    #[serde(default)]
    pub include_synthetic: Option<bool>,
    #[serde(default)]
    pub triggering: Option<bool>,
    #[serde(default)]
    pub tag_filter: Option<String>,
    #[serde(default)]
    pub alert_channels: Option<AlertChannelsState>,
    #[serde(default)]
    pub application: Option<Vec<ApplicationState>>,
    #[serde(default)]
    pub custom_payload_field: Option<Vec<CustomPayloadFieldState>>,
    #[serde(default)]
    pub rules: Option<Vec<RuleWithThresholdState>>,
    #[serde(default)]
    pub time_threshold: Option<TimeThresholdState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationState {
    pub application_id: String,
    pub inclusive: bool,
    #[serde(default)]
    pub service: Option<Vec<ServiceState>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    pub service_id: String,
    pub inclusive: bool,
    #[serde(default)]
    pub endpoint: Option<Vec<EndpointState>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointState {
    pub endpoint_id: String,
    pub inclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleWithThresholdState {
    pub threshold_operator: String,
    pub rule: RuleState,
    pub threshold: ThresholdsState,
}

/// Exactly one rule kind is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleState {
    #[serde(default)]
    pub error_rate: Option<MetricRuleState>,
    #[serde(default)]
    pub errors: Option<MetricRuleState>,
    #[serde(default)]
    pub logs: Option<LogsRuleState>,
    #[serde(default)]
    pub slowness: Option<MetricRuleState>,
    #[serde(default)]
    pub status_code: Option<StatusCodeRuleState>,
    #[serde(default)]
    pub throughput: Option<MetricRuleState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRuleState {
    pub metric_name: String,
    #[serde(default)]
    pub aggregation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsRuleState {
    pub metric_name: String,
    #[serde(default)]
    pub aggregation: Option<String>,
    pub level: String,
    #[serde(default)]
    pub message: Option<String>,
    pub operator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCodeRuleState {
    pub metric_name: String,
    #[serde(default)]
    pub aggregation: Option<String>,
    #[serde(default)]
    pub status_code_start: Option<i64>,
    #[serde(default)]
    pub status_code_end: Option<i64>,
}

/// Exactly one kind is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeThresholdState {
    #[serde(default)]
    pub request_impact: Option<RequestImpactState>,
    #[serde(default)]
    pub violations_in_period: Option<ViolationsInPeriodState>,
    #[serde(default)]
    pub violations_in_sequence: Option<ViolationsInSequenceState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestImpactState {
    pub time_window: i64,
    pub requests: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationsInPeriodState {
    pub time_window: i64,
    pub violations: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationsInSequenceState {
    pub time_window: i64,
}

// ============================================================================
// Mapping
// ============================================================================

fn metric_rule(alert_type: &str, metric_name: &str, aggregation: &Option<String>) -> ApplicationAlertRule {
    ApplicationAlertRule {
        alert_type: alert_type.to_string(),
        metric_name: metric_name.to_string(),
        aggregation: aggregation.clone(),
        level: None,
        message: None,
        operator: None,
        status_code_start: None,
        status_code_end: None,
    }
}

fn rule_to_wire(rule: &RuleState, path: &str) -> Result<ApplicationAlertRule, ProviderError> {
    let metric = |alert_type: &str, r: &MetricRuleState| metric_rule(alert_type, &r.metric_name, &r.aggregation);
    let mut rules = Vec::new();
    if let Some(r) = &rule.error_rate {
        rules.push(metric("errorRate", r));
    }
    if let Some(r) = &rule.errors {
        rules.push(metric("errors", r));
    }
    if let Some(r) = &rule.logs {
        let operator = Operator::parse(&r.operator).ok_or_else(|| {
            ProviderError::InvalidConfig(format!(
                "{}.logs.operator: unsupported operator '{}'",
                path, r.operator
            ))
        })?;
        rules.push(ApplicationAlertRule {
            level: Some(r.level.clone()),
            message: r.message.clone(),
            operator: Some(operator.as_str().to_string()),
            ..metric_rule("logs", &r.metric_name, &r.aggregation)
        });
    }
    if let Some(r) = &rule.slowness {
        rules.push(metric("slowness", r));
    }
    if let Some(r) = &rule.status_code {
        rules.push(ApplicationAlertRule {
            status_code_start: r.status_code_start,
            status_code_end: r.status_code_end,
            ..metric_rule("statusCode", &r.metric_name, &r.aggregation)
        });
    }
    if let Some(r) = &rule.throughput {
        rules.push(metric("throughput", r));
    }

    match rules.len() {
        1 => Ok(rules.remove(0)),
        _ => Err(ProviderError::InvalidConfig(format!(
            "{}: exactly one of {} must be set",
            path,
            RULE_KINDS.map(|(kind, _)| kind).join(", ")
        ))),
    }
}

fn rule_to_state(rule: &ApplicationAlertRule) -> Result<RuleState, ProviderError> {
    let metric = || MetricRuleState {
        metric_name: rule.metric_name.clone(),
        aggregation: rule.aggregation.clone(),
    };
    let mut state = RuleState::default();
    match rule.alert_type.as_str() {
        "errorRate" => state.error_rate = Some(metric()),
        "errors" => state.errors = Some(metric()),
        "slowness" => state.slowness = Some(metric()),
        "throughput" => state.throughput = Some(metric()),
        "logs" => {
            state.logs = Some(LogsRuleState {
                metric_name: rule.metric_name.clone(),
                aggregation: rule.aggregation.clone(),
                level: rule.level.clone().unwrap_or_default(),
                message: rule.message.clone().filter(|m| !m.is_empty()),
                operator: rule.operator.clone().unwrap_or_default(),
            })
        },
        "statusCode" => {
            state.status_code = Some(StatusCodeRuleState {
                metric_name: rule.metric_name.clone(),
                aggregation: rule.aggregation.clone(),
                status_code_start: rule.status_code_start,
                status_code_end: rule.status_code_end,
            })
        },
        other => {
            return Err(ProviderError::Decode(format!(
                "unsupported application alert rule type '{}'",
                other
            )))
        },
    }
    Ok(state)
}

fn time_threshold_to_wire(
    threshold: &TimeThresholdState,
) -> Result<ApplicationTimeThreshold, ProviderError> {
    let candidates = [
        threshold.request_impact.as_ref().map(|t| ApplicationTimeThreshold {
            threshold_type: REQUEST_IMPACT.to_string(),
            time_window: t.time_window,
            requests: Some(t.requests),
            violations: None,
        }),
        threshold
            .violations_in_period
            .as_ref()
            .map(|t| ApplicationTimeThreshold {
                threshold_type: VIOLATIONS_IN_PERIOD.to_string(),
                time_window: t.time_window,
                requests: None,
                violations: Some(t.violations),
            }),
        threshold
            .violations_in_sequence
            .as_ref()
            .map(|t| ApplicationTimeThreshold {
                threshold_type: VIOLATIONS_IN_SEQUENCE.to_string(),
                time_window: t.time_window,
                requests: None,
                violations: None,
            }),
    ];
    let mut set = candidates.into_iter().flatten();
    match (set.next(), set.next()) {
        (Some(threshold), None) => Ok(threshold),
        _ => Err(ProviderError::InvalidConfig(
            "time_threshold: exactly one of request_impact, violations_in_period or violations_in_sequence must be set"
                .to_string(),
        )),
    }
}

fn time_threshold_to_state(threshold: &ApplicationTimeThreshold) -> Option<TimeThresholdState> {
    let mut state = TimeThresholdState::default();
    match threshold.threshold_type.as_str() {
        REQUEST_IMPACT => {
            state.request_impact = Some(RequestImpactState {
                time_window: threshold.time_window,
                requests: threshold.requests.unwrap_or_default(),
            })
        },
        VIOLATIONS_IN_PERIOD => {
            state.violations_in_period = Some(ViolationsInPeriodState {
                time_window: threshold.time_window,
                violations: threshold.violations.unwrap_or_default(),
            })
        },
        VIOLATIONS_IN_SEQUENCE => {
            state.violations_in_sequence = Some(ViolationsInSequenceState {
                time_window: threshold.time_window,
            })
        },
        _ => return None,
    }
    Some(state)
}

fn applications_to_wire(applications: &[ApplicationState]) -> BTreeMap<String, IncludedApplication> {
    applications
        .iter()
        .map(|app| {
            let services = app
                .service
                .iter()
                .flatten()
                .map(|svc| {
                    let endpoints = svc
                        .endpoint
                        .iter()
                        .flatten()
                        .map(|ep| {
                            (
                                ep.endpoint_id.clone(),
                                IncludedEndpoint {
                                    endpoint_id: ep.endpoint_id.clone(),
                                    inclusive: ep.inclusive,
                                },
                            )
                        })
                        .collect();
                    (
                        svc.service_id.clone(),
                        IncludedService {
                            service_id: svc.service_id.clone(),
                            inclusive: svc.inclusive,
                            endpoints,
                        },
                    )
                })
                .collect();
            (
                app.application_id.clone(),
                IncludedApplication {
                    application_id: app.application_id.clone(),
                    inclusive: app.inclusive,
                    services,
                },
            )
        })
        .collect()
}

fn applications_to_state(applications: &BTreeMap<String, IncludedApplication>) -> Vec<ApplicationState> {
    applications
        .values()
        .map(|app| ApplicationState {
            application_id: app.application_id.clone(),
            inclusive: app.inclusive,
            service: (!app.services.is_empty()).then(|| {
                app.services
                    .values()
                    .map(|svc| ServiceState {
                        service_id: svc.service_id.clone(),
                        inclusive: svc.inclusive,
                        endpoint: (!svc.endpoints.is_empty()).then(|| {
                            svc.endpoints
                                .values()
                                .map(|ep| EndpointState {
                                    endpoint_id: ep.endpoint_id.clone(),
                                    inclusive: ep.inclusive,
                                })
                                .collect()
                        }),
                    })
                    .collect()
            }),
        })
        .collect()
}

/// Encode state as the wire object.
pub fn state_to_wire(
    state: &ApplicationAlertConfigState,
) -> Result<ApplicationAlertConfig, ProviderError> {
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
                rule: rule_to_wire(&rule.rule, &format!("{}.rule", path))?,
                thresholds: thresholds_to_wire(&rule.threshold, &format!("{}.threshold", path))?,
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;

    Ok(ApplicationAlertConfig {
        id: state.id.clone(),
        name: state.name.clone(),
        description: state.description.clone(),
        triggering: state.triggering.unwrap_or(false),
        applications: applications_to_wire(state.application.as_deref().unwrap_or_default()),
        boundary_scope: state.boundary_scope.clone(),
        tag_filter_expression,
        include_internal: state.include_internal.unwrap_or(false),
        include_synthetic: state.include_synthetic.unwrap_or(false),
        evaluation_type: state.evaluation_type.clone(),
        alert_channels: alert_channels::to_wire(state.alert_channels.as_ref()),
        granularity: state.granularity,
        grace_period: state.grace_period,
        custom_payload_fields: custom_payload::to_wire(
            state.custom_payload_field.as_deref().unwrap_or_default(),
        )?,
        rules,
        time_threshold: state
            .time_threshold
            .as_ref()
            .map(time_threshold_to_wire)
            .transpose()?,
    })
}

/// Decode the wire object.
pub fn wire_to_state(
    wire: &ApplicationAlertConfig,
) -> Result<ApplicationAlertConfigState, ProviderError> {
    let tag_filter = match &wire.tag_filter_expression {
        Some(filter) => tagfilter::wire_to_text(filter)?,
        None => None,
    };

    let rules = wire
        .rules
        .iter()
        .map(|rule| {
            Ok(RuleWithThresholdState {
                threshold_operator: rule.threshold_operator.clone(),
                rule: rule_to_state(&rule.rule)?,
                threshold: thresholds_to_state(&rule.thresholds),
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;
    let applications = applications_to_state(&wire.applications);
    let custom_payload_field = custom_payload::to_state(&wire.custom_payload_fields)?;

    Ok(ApplicationAlertConfigState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        description: wire.description.clone(),
        boundary_scope: wire.boundary_scope.clone(),
        evaluation_type: wire.evaluation_type.clone(),
        granularity: wire.granularity,
        grace_period: wire.grace_period,
        include_internal: Some(wire.include_internal),
        include_synthetic: Some(wire.include_synthetic),
        triggering: Some(wire.triggering),
        tag_filter,
        alert_channels: alert_channels::to_state(&wire.alert_channels),
        application: (!applications.is_empty()).then_some(applications),
        custom_payload_field: (!custom_payload_field.is_empty()).then_some(custom_payload_field),
        rules: (!rules.is_empty()).then_some(rules),
        time_threshold: wire.time_threshold.as_ref().and_then(time_threshold_to_state),
    })
}

fn resource_schema() -> Schema {
    let metric_block = || {
        Block::new()
            .with_attribute("metric_name", Attribute::required_string())
            .with_attribute(
                "aggregation",
                Attribute::optional_string().with_allowed_values(AGGREGATIONS),
            )
    };
    let logs_rule = metric_block()
        .with_attribute("level", Attribute::required_string().with_allowed_values(LOG_LEVELS))
        .with_attribute("message", Attribute::optional_string())
        .with_attribute(
            "operator",
            Attribute::required_string().with_allowed_values(Operator::ALL.map(Operator::as_str)),
        );
    let status_code_rule = metric_block()
        .with_attribute("status_code_start", Attribute::optional_int64())
        .with_attribute("status_code_end", Attribute::optional_int64());

    let rule = Block::new()
        .with_block("error_rate", NestedBlock::single(metric_block()))
        .with_block("errors", NestedBlock::single(metric_block()))
        .with_block("logs", NestedBlock::single(logs_rule))
        .with_block("slowness", NestedBlock::single(metric_block()))
        .with_block("status_code", NestedBlock::single(status_code_rule))
        .with_block("throughput", NestedBlock::single(metric_block()))
        .with_exactly_one_of(RULE_KINDS.map(|(kind, _)| kind));

    let rules = Block::new()
        .with_attribute("threshold_operator", threshold_operator_attribute())
        .with_block("rule", NestedBlock::single(rule).with_min_items(1))
        .with_block("threshold", thresholds_block());

    let time_window = || Attribute::required_int64().with_description("The time window in milliseconds");
    let time_threshold = Block::new()
        .with_description("How long the rules must be violated before an alert opens")
        .with_block(
            "request_impact",
            NestedBlock::single(
                Block::new()
                    .with_attribute("time_window", time_window())
                    .with_attribute("requests", Attribute::required_int64()),
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
        .with_exactly_one_of(["request_impact", "violations_in_period", "violations_in_sequence"]);

    let inclusive = || {
        Attribute::required_bool()
            .with_description("Whether the node and its children are included or excluded")
    };
    let endpoint = Block::new()
        .with_attribute("endpoint_id", Attribute::required_string())
        .with_attribute("inclusive", inclusive());
    let service = Block::new()
        .with_attribute("service_id", Attribute::required_string())
        .with_attribute("inclusive", inclusive())
        .with_block("endpoint", NestedBlock::set(endpoint));
    let application = Block::new()
        .with_attribute("application_id", Attribute::required_string())
        .with_attribute("inclusive", inclusive())
        .with_block("service", NestedBlock::set(service));

    let flag = || {
        Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
            .with_default(Value::Bool(false))
    };

    Schema::new(1)
        .with_description("Application alert configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("description", Attribute::required_string())
        .with_attribute(
            "boundary_scope",
            Attribute::required_string().with_allowed_values(BOUNDARY_SCOPES),
        )
        .with_attribute(
            "evaluation_type",
            Attribute::required_string().with_allowed_values(EVALUATION_TYPES),
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
        .with_attribute("include_internal", flag())
        .with_attribute("include_synthetic", flag())
        .with_attribute("triggering", flag())
        .with_attribute(
            "tag_filter",
            Attribute::tag_filter_expression(AttributeFlags::optional()),
        )
        .with_block(alert_channels::ALERT_CHANNELS, alert_channels::schema_block())
        .with_block("application", NestedBlock::set(application))
        .with_block(custom_payload::CUSTOM_PAYLOAD_FIELD, custom_payload::schema_block())
        .with_block("rules", NestedBlock::list(rules).with_min_items(1))
        .with_block("time_threshold", NestedBlock::single(time_threshold))
}

fn upgrade_v0(state: Value) -> Result<Value, ProviderError> {
    rename_attribute(state, "full_name", "name")
}

/// Resource handle of application alert configurations. The global variant
/// shares the model and lives under its own path.
pub struct ApplicationAlertConfigResource {
    metadata: ResourceMetadata,
}

impl ApplicationAlertConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                APPLICATION_ALERT_CONFIGS_PATH,
                WriteMode::PostPost,
            ),
        }
    }

    pub fn global() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                GLOBAL_RESOURCE_NAME,
                resource_schema().with_description("Global application alert configuration"),
                GLOBAL_APPLICATION_ALERT_CONFIGS_PATH,
                WriteMode::PostPost,
            ),
        }
    }
}

impl Default for ApplicationAlertConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for ApplicationAlertConfigResource {
    type Wire = ApplicationAlertConfig;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let too_long = |attribute: &str, max: usize| {
            config
                .get(attribute)
                .and_then(Value::as_str)
                .filter(|text| text.chars().count() > max)
                .map(|_| {
                    Diagnostic::error("Value too long")
                        .with_detail(format!("at most {} characters are allowed", max))
                        .with_attribute(attribute)
                })
        };
        diagnostics.extend(too_long("name", MAX_NAME_LENGTH));
        diagnostics.extend(too_long("description", MAX_DESCRIPTION_LENGTH));

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
        let violations = config
            .get("time_threshold")
            .and_then(|t| t.get("violations_in_period"))
            .and_then(|t| t.get("violations"))
            .and_then(Value::as_i64);
        if violations.is_some_and(|v| !(1..=MAX_VIOLATIONS_IN_PERIOD).contains(&v)) {
            diagnostics.push(
                Diagnostic::error("Invalid violation count")
                    .with_detail(format!("violations must be between 1 and {}", MAX_VIOLATIONS_IN_PERIOD))
                    .with_attribute("time_threshold.violations_in_period.violations"),
            );
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<ApplicationAlertConfig, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &ApplicationAlertConfig,
    ) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire)?)
    }

    fn state_upgraders(&self) -> Vec<StateUpgrader> {
        vec![StateUpgrader::new(0, upgrade_v0)]
    }
}
