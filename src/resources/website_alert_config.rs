//! Website smart alerts: beacon metric rules with thresholds for one website.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{rename_attribute, ResourceHandle, ResourceMetadata, StateUpgrader};
use crate::restapi::{WireModel, WriteMode, WEBSITE_ALERT_CONFIGS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::custom_payload::{self, CustomPayloadField, CustomPayloadFieldState};
use crate::shared::threshold::{
    check_threshold_operator, threshold_operator_attribute, thresholds_block, thresholds_to_state,
    thresholds_to_wire, RuleWithThreshold, ThresholdsState,
};
use crate::shared::{from_state, nullable, to_state};
use crate::tagfilter;

use super::application_alert_config::{
    ViolationsInPeriodState, ViolationsInSequenceState, AGGREGATIONS,
};
use super::infra_alert_config::GRANULARITIES;

/// Resource name of website alert configurations.
pub const RESOURCE_NAME: &str = "website_alert_config";

/// Operators of status code and JavaScript error rules.
pub const RULE_OPERATORS: [&str; 4] = ["EQUALS", "DOES_NOT_EQUAL", "CONTAINS", "DOES_NOT_CONTAIN"];

/// How impacted users are counted.
pub const IMPACT_MEASUREMENT_METHODS: [&str; 2] = ["AGGREGATED", "PER_WINDOW"];

const USER_IMPACT: &str = "userImpactOfViolationsInSequence";
const VIOLATIONS_IN_PERIOD: &str = "violationsInPeriod";
const VIOLATIONS_IN_SEQUENCE: &str = "violationsInSequence";

const RULE_KINDS: [&str; 4] = ["slowness", "specific_js_error", "status_code", "throughput"];

/// A website alert configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteAlertConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub triggering: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    pub website_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub alert_channel_ids: Vec<String>,
    pub granularity: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default, deserialize_with = "nullable")]
    pub rules: Vec<RuleWithThreshold<WebsiteAlertRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_threshold: Option<WebsiteTimeThreshold>,
}

impl WireModel for WebsiteAlertConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteAlertRule {
    pub alert_type: String,
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteTimeThreshold {
    #[serde(rename = "type")]
    pub threshold_type: String,
    pub time_window: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_measurement_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<i64>,
}

/// Host state of a website alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteAlertConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub website_id: String,
    pub granularity: i64,
    #[serde(default)]
    pub triggering: Option<bool>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub tag_filter: Option<String>,
    #[serde(default)]
    pub alert_channel_ids: Option<Vec<String>>,
    #[serde(default)]
    pub custom_payload_field: Option<Vec<CustomPayloadFieldState>>,
    #[serde(default)]
    pub rules: Option<Vec<WebsiteRuleWithThresholdState>>,
    #[serde(default)]
    pub time_threshold: Option<WebsiteTimeThresholdState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteRuleWithThresholdState {
    pub threshold_operator: String,
    pub rule: WebsiteRuleState,
    pub threshold: ThresholdsState,
}

/// Exactly one rule kind is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteRuleState {
    #[serde(default)]
    pub slowness: Option<WebsiteMetricRuleState>,
    #[serde(default)]
    pub specific_js_error: Option<WebsiteMatchRuleState>,
    #[serde(default)]
    pub status_code: Option<WebsiteMatchRuleState>,
    #[serde(default)]
    pub throughput: Option<WebsiteMetricRuleState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteMetricRuleState {
    pub metric_name: String,
    #[serde(default)]
    pub aggregation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteMatchRuleState {
    pub metric_name: String,
    #[serde(default)]
    pub aggregation: Option<String>,
    pub operator: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Exactly one kind is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebsiteTimeThresholdState {
    #[serde(default)]
    pub user_impact_of_violations_in_sequence: Option<UserImpactState>,
    #[serde(default)]
    pub violations_in_period: Option<ViolationsInPeriodState>,
    #[serde(default)]
    pub violations_in_sequence: Option<ViolationsInSequenceState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserImpactState {
    pub time_window: i64,
    pub impact_measurement_method: String,
    #[serde(default)]
    pub user_percentage: Option<f64>,
    #[serde(default)]
    pub users: Option<i64>,
}

fn rule_to_wire(rule: &WebsiteRuleState, path: &str) -> Result<WebsiteAlertRule, ProviderError> {
    let metric = |alert_type: &str, r: &WebsiteMetricRuleState| WebsiteAlertRule {
        alert_type: alert_type.to_string(),
        metric_name: r.metric_name.clone(),
        aggregation: r.aggregation.clone(),
        operator: None,
        value: None,
    };
    let matching = |alert_type: &str, r: &WebsiteMatchRuleState| WebsiteAlertRule {
        alert_type: alert_type.to_string(),
        metric_name: r.metric_name.clone(),
        aggregation: r.aggregation.clone(),
        operator: Some(r.operator.clone()),
        value: r.value.clone(),
    };

    let candidates = [
        rule.slowness.as_ref().map(|r| metric("slowness", r)),
        rule.specific_js_error
            .as_ref()
            .map(|r| matching("specificJsError", r)),
        rule.status_code.as_ref().map(|r| matching("statusCode", r)),
        rule.throughput.as_ref().map(|r| metric("throughput", r)),
    ];
    let mut set = candidates.into_iter().flatten();
    match (set.next(), set.next()) {
        (Some(rule), None) => Ok(rule),
        _ => Err(ProviderError::InvalidConfig(format!(
            "{}: exactly one of {} must be set",
            path,
            RULE_KINDS.join(", ")
        ))),
    }
}

fn rule_to_state(rule: &WebsiteAlertRule) -> Result<WebsiteRuleState, ProviderError> {
    let metric = || WebsiteMetricRuleState {
        metric_name: rule.metric_name.clone(),
        aggregation: rule.aggregation.clone(),
    };
    let matching = || WebsiteMatchRuleState {
        metric_name: rule.metric_name.clone(),
        aggregation: rule.aggregation.clone(),
        operator: rule.operator.clone().unwrap_or_default(),
        value: rule.value.clone(),
    };
    let mut state = WebsiteRuleState::default();
    match rule.alert_type.as_str() {
        "slowness" => state.slowness = Some(metric()),
        "specificJsError" => state.specific_js_error = Some(matching()),
        "statusCode" => state.status_code = Some(matching()),
        "throughput" => state.throughput = Some(metric()),
        other => {
            return Err(ProviderError::Decode(format!(
                "unsupported website alert rule type '{}'",
                other
            )))
        },
    }
    Ok(state)
}

fn time_threshold_to_wire(
    threshold: &WebsiteTimeThresholdState,
) -> Result<WebsiteTimeThreshold, ProviderError> {
    let base = |threshold_type: &str, time_window: i64| WebsiteTimeThreshold {
        threshold_type: threshold_type.to_string(),
        time_window,
        violations: None,
        impact_measurement_method: None,
        user_percentage: None,
        users: None,
    };
    let candidates = [
        threshold
            .user_impact_of_violations_in_sequence
            .as_ref()
            .map(|t| WebsiteTimeThreshold {
                impact_measurement_method: Some(t.impact_measurement_method.clone()),
                user_percentage: t.user_percentage,
                users: t.users,
                ..base(USER_IMPACT, t.time_window)
            }),
        threshold
            .violations_in_period
            .as_ref()
            .map(|t| WebsiteTimeThreshold {
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

fn time_threshold_to_state(threshold: &WebsiteTimeThreshold) -> Option<WebsiteTimeThresholdState> {
    let mut state = WebsiteTimeThresholdState::default();
    match threshold.threshold_type.as_str() {
        USER_IMPACT => {
            state.user_impact_of_violations_in_sequence = Some(UserImpactState {
                time_window: threshold.time_window,
                impact_measurement_method: threshold
                    .impact_measurement_method
                    .clone()
                    .unwrap_or_default(),
                user_percentage: threshold.user_percentage,
                users: threshold.users,
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

pub fn state_to_wire(state: &WebsiteAlertConfigState) -> Result<WebsiteAlertConfig, ProviderError> {
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

    Ok(WebsiteAlertConfig {
        id: state.id.clone(),
        name: state.name.clone(),
        description: state.description.clone(),
        triggering: state.triggering.unwrap_or(false),
        enabled: state.enabled,
        website_id: state.website_id.clone(),
        tag_filter_expression,
        alert_channel_ids: state.alert_channel_ids.clone().unwrap_or_default(),
        granularity: state.granularity,
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

pub fn wire_to_state(wire: &WebsiteAlertConfig) -> Result<WebsiteAlertConfigState, ProviderError> {
    let tag_filter = match &wire.tag_filter_expression {
        Some(filter) => tagfilter::wire_to_text(filter)?,
        None => None,
    };
    let rules = wire
        .rules
        .iter()
        .map(|rule| {
            Ok(WebsiteRuleWithThresholdState {
                threshold_operator: rule.threshold_operator.clone(),
                rule: rule_to_state(&rule.rule)?,
                threshold: thresholds_to_state(&rule.thresholds),
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;
    let custom_payload_field = custom_payload::to_state(&wire.custom_payload_fields)?;

    Ok(WebsiteAlertConfigState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        description: wire.description.clone(),
        website_id: wire.website_id.clone(),
        granularity: wire.granularity,
        triggering: Some(wire.triggering),
        enabled: Some(wire.enabled.unwrap_or(true)),
        tag_filter,
        alert_channel_ids: (!wire.alert_channel_ids.is_empty()).then(|| wire.alert_channel_ids.clone()),
        custom_payload_field: (!custom_payload_field.is_empty()).then_some(custom_payload_field),
        rules: (!rules.is_empty()).then_some(rules),
        time_threshold: wire.time_threshold.as_ref().and_then(time_threshold_to_state),
    })
}

fn resource_schema() -> Schema {
    let aggregation = || Attribute::optional_string().with_allowed_values(AGGREGATIONS);
    let metric = || {
        Block::new()
            .with_attribute("metric_name", Attribute::required_string())
            .with_attribute("aggregation", aggregation())
    };
    let matching = || {
        metric()
            .with_attribute(
                "operator",
                Attribute::required_string().with_allowed_values(RULE_OPERATORS),
            )
            .with_attribute("value", Attribute::optional_string())
    };
    let rule = Block::new()
        .with_block("slowness", NestedBlock::single(metric()))
        .with_block("specific_js_error", NestedBlock::single(matching()))
        .with_block("status_code", NestedBlock::single(matching()))
        .with_block("throughput", NestedBlock::single(metric()))
        .with_exactly_one_of(RULE_KINDS);
    let rules = Block::new()
        .with_attribute("threshold_operator", threshold_operator_attribute())
        .with_block("rule", NestedBlock::single(rule).with_min_items(1))
        .with_block("threshold", thresholds_block());

    let time_window = || Attribute::required_int64().with_description("The time window in milliseconds");
    let time_threshold = Block::new()
        .with_block(
            "user_impact_of_violations_in_sequence",
            NestedBlock::single(
                Block::new()
                    .with_attribute("time_window", time_window())
                    .with_attribute(
                        "impact_measurement_method",
                        Attribute::required_string().with_allowed_values(IMPACT_MEASUREMENT_METHODS),
                    )
                    .with_attribute(
                        "user_percentage",
                        Attribute::optional_float64()
                            .with_description("Share of impacted users, between 0 and 1"),
                    )
                    .with_attribute("users", Attribute::optional_int64()),
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

    Schema::new(1)
        .with_description("Website alert configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("description", Attribute::required_string())
        .with_attribute("website_id", Attribute::required_string().with_force_new())
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
            "alert_channel_ids",
            Attribute::optional_string_set().with_description("Alerting channel ids"),
        )
        .with_block(custom_payload::CUSTOM_PAYLOAD_FIELD, custom_payload::schema_block())
        .with_block("rules", NestedBlock::list(rules).with_min_items(1))
        .with_block("time_threshold", NestedBlock::single(time_threshold))
}

fn upgrade_v0(state: Value) -> Result<Value, ProviderError> {
    rename_attribute(state, "full_name", "name")
}

/// Resource handle of website alert configurations.
pub struct WebsiteAlertConfigResource {
    metadata: ResourceMetadata,
}

impl WebsiteAlertConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                WEBSITE_ALERT_CONFIGS_PATH,
                WriteMode::PostPost,
            ),
        }
    }
}

impl Default for WebsiteAlertConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for WebsiteAlertConfigResource {
    type Wire = WebsiteAlertConfig;

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

        let user_percentage = config
            .get("time_threshold")
            .and_then(|t| t.get("user_impact_of_violations_in_sequence"))
            .and_then(|t| t.get("user_percentage"))
            .and_then(Value::as_f64);
        if user_percentage.is_some_and(|p| !(0.0..=1.0).contains(&p)) {
            diagnostics.push(
                Diagnostic::error("Invalid user percentage")
                    .with_detail("user_percentage must be between 0 and 1")
                    .with_attribute("time_threshold.user_impact_of_violations_in_sequence.user_percentage"),
            );
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<WebsiteAlertConfig, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &WebsiteAlertConfig,
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

    fn planned() -> Value {
        json!({
            "name": "js errors",
            "description": "checkout errors",
            "website_id": "web1",
            "granularity": 600000,
            "alert_channel_ids": ["ch1"],
            "rules": [{
                "threshold_operator": ">",
                "rule": {
                    "specific_js_error": {
                        "metric_name": "errors",
                        "aggregation": "SUM",
                        "operator": "CONTAINS",
                        "value": "TypeError"
                    }
                },
                "threshold": {"critical": {"static": {"value": 10.0}}}
            }],
            "time_threshold": {
                "user_impact_of_violations_in_sequence": {
                    "time_window": 600000,
                    "impact_measurement_method": "AGGREGATED",
                    "user_percentage": 0.5
                }
            }
        })
    }

    #[test]
    fn test_state_to_wire() {
        let wire = WebsiteAlertConfigResource::new()
            .map_state_to_wire(&planned())
            .unwrap();
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(
            json["rules"][0]["rule"],
            json!({
                "alertType": "specificJsError",
                "metricName": "errors",
                "aggregation": "SUM",
                "operator": "CONTAINS",
                "value": "TypeError"
            })
        );
        assert_eq!(
            json["timeThreshold"],
            json!({
                "type": "userImpactOfViolationsInSequence",
                "timeWindow": 600000,
                "impactMeasurementMethod": "AGGREGATED",
                "userPercentage": 0.5
            })
        );
        assert_eq!(json["alertChannelIds"], json!(["ch1"]));
        assert_eq!(json["customPayloadFields"], json!([]));
    }

    #[test]
    fn test_wire_to_state_defaults_enabled() {
        let wire: WebsiteAlertConfig = serde_json::from_value(json!({
            "id": "w1",
            "name": "slow pages",
            "description": "",
            "websiteId": "web1",
            "alertChannelIds": null,
            "granularity": 300000,
            "customPayloadFields": null,
            "rules": [{
                "rule": {"alertType": "slowness", "metricName": "onLoadTime", "aggregation": "P90"},
                "thresholdOperator": ">=",
                "thresholds": {"WARNING": {"type": "staticThreshold", "value": 3000.0}}
            }],
            "timeThreshold": {"type": "violationsInSequence", "timeWindow": 300000}
        }))
        .unwrap();
        let state = wire_to_state(&wire).unwrap();
        assert_eq!(state.enabled, Some(true));
        assert_eq!(state.alert_channel_ids, None);
        let rules = state.rules.unwrap();
        assert_eq!(rules[0].rule.slowness.as_ref().unwrap().aggregation.as_deref(), Some("P90"));
        assert_eq!(
            state.time_threshold.unwrap().violations_in_sequence,
            Some(ViolationsInSequenceState { time_window: 300000 })
        );
    }

    #[test]
    fn test_exactly_one_rule_kind() {
        let both = WebsiteRuleState {
            slowness: Some(WebsiteMetricRuleState {
                metric_name: "onLoadTime".to_string(),
                aggregation: None,
            }),
            throughput: Some(WebsiteMetricRuleState {
                metric_name: "pageViews".to_string(),
                aggregation: None,
            }),
            ..WebsiteRuleState::default()
        };
        let err = rule_to_wire(&both, "rules.0.rule").unwrap_err();
        assert!(err.message().contains("exactly one of slowness"));
    }

    #[test]
    fn test_validate() {
        let resource = WebsiteAlertConfigResource::new();
        assert!(resource.validate(&planned()).is_empty());

        let mut config = planned();
        config["granularity"] = json!(1);
        config["time_threshold"]["user_impact_of_violations_in_sequence"]["user_percentage"] = json!(1.5);
        let attributes: Vec<_> = resource
            .validate(&config)
            .into_iter()
            .filter_map(|d| d.attribute)
            .collect();
        assert_eq!(
            attributes,
            vec![
                "granularity",
                "time_threshold.user_impact_of_violations_in_sequence.user_percentage"
            ]
        );
    }

    #[tokio::test]
    async fn test_update_posts_to_id() {
        let server = MockInstanaServer::start().await;
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let path = format!("{}/w1", WEBSITE_ALERT_CONFIGS_PATH);
        server.respond("POST", &path, 200, Value::Null);

        let mut prior = planned();
        prior["id"] = json!("w1");
        let mut changed = planned();
        changed["name"] = json!("renamed");
        let state = ManagedResource::new(WebsiteAlertConfigResource::new())
            .update(&client, prior, changed)
            .await
            .unwrap();
        assert_eq!(state["id"], "w1");
        assert_eq!(state["name"], "renamed");
        assert_eq!(server.requests_to("POST", &path)[0].json()["websiteId"], "web1");
    }
}
