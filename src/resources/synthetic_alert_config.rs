//! Synthetic smart alerts: failures of a set of synthetic tests.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, SYNTHETIC_ALERT_CONFIGS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::custom_payload::{self, CustomPayloadField, CustomPayloadFieldState};
use crate::shared::{from_state, nullable, to_state, Severity};
use crate::tagfilter;

/// Resource name of synthetic alert configurations.
pub const RESOURCE_NAME: &str = "synthetic_alert_config";

/// Aggregations of the synthetic metric.
pub const AGGREGATIONS: [&str; 17] = [
    "SUM",
    "MEAN",
    "MAX",
    "MIN",
    "P25",
    "P50",
    "P75",
    "P90",
    "P95",
    "P98",
    "P99",
    "P99_9",
    "P99_99",
    "DISTINCT_COUNT",
    "SUM_POSITIVE",
    "PER_SECOND",
    "INCREASE",
];

const ALERT_TYPE: &str = "failure";
const TIME_THRESHOLD_TYPE: &str = "violationsInSequence";
const MAX_NAME_LENGTH: usize = 256;
const MAX_DESCRIPTION_LENGTH: usize = 1024;
const MAX_VIOLATIONS: i64 = 12;

/// A synthetic alert configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticAlertConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub synthetic_test_ids: Vec<String>,
    pub severity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<Value>,
    pub rule: SyntheticAlertRule,
    #[serde(default, deserialize_with = "nullable")]
    pub alert_channel_ids: Vec<String>,
    pub time_threshold: SyntheticTimeThreshold,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<i64>,
}

impl WireModel for SyntheticAlertConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticAlertRule {
    pub alert_type: String,
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aggregation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticTimeThreshold {
    #[serde(rename = "type")]
    pub threshold_type: String,
    pub violations_count: i64,
}

/// Host state of a synthetic alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticAlertConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub synthetic_test_ids: Vec<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub tag_filter: Option<String>,
    #[serde(default)]
    pub alert_channel_ids: Option<Vec<String>>,
    #[serde(default)]
    pub grace_period: Option<i64>,
    pub rule: SyntheticAlertRuleState,
    pub time_threshold: SyntheticTimeThresholdState,
    #[serde(default)]
    pub custom_payload_field: Option<Vec<CustomPayloadFieldState>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticAlertRuleState {
    pub alert_type: String,
    pub metric_name: String,
    #[serde(default)]
    pub aggregation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticTimeThresholdState {
    #[serde(rename = "type", default = "default_time_threshold_type")]
    pub threshold_type: String,
    pub violations_count: i64,
}

fn default_time_threshold_type() -> String {
    TIME_THRESHOLD_TYPE.to_string()
}

/// The empty filter sent when none is configured.
fn match_all_filter() -> Value {
    json!({"type": "EXPRESSION", "logicalOperator": "AND", "elements": []})
}

pub fn state_to_wire(state: &SyntheticAlertConfigState) -> Result<SyntheticAlertConfig, ProviderError> {
    let tag_filter_expression = match state.tag_filter.as_deref() {
        Some(text) => tagfilter::text_to_wire(text)?,
        None => None,
    }
    .unwrap_or_else(match_all_filter);
    let severity = match state.severity.as_deref() {
        Some(name) => Severity::parse(name)?,
        None => Severity::Warning,
    };

    Ok(SyntheticAlertConfig {
        id: state.id.clone(),
        name: state.name.clone(),
        description: state.description.clone().unwrap_or_default(),
        synthetic_test_ids: state.synthetic_test_ids.clone(),
        severity: severity.code(),
        tag_filter_expression: Some(tag_filter_expression),
        rule: SyntheticAlertRule {
            alert_type: state.rule.alert_type.clone(),
            metric_name: state.rule.metric_name.clone(),
            aggregation: state.rule.aggregation.clone().unwrap_or_default(),
        },
        alert_channel_ids: state.alert_channel_ids.clone().unwrap_or_default(),
        time_threshold: SyntheticTimeThreshold {
            threshold_type: state.time_threshold.threshold_type.clone(),
            violations_count: state.time_threshold.violations_count,
        },
        custom_payload_fields: custom_payload::to_wire(
            state.custom_payload_field.as_deref().unwrap_or_default(),
        )?,
        grace_period: state.grace_period.filter(|period| *period > 0),
    })
}

/// Decode the wire object. A prior tag filter equivalent to the server's is
/// kept verbatim.
pub fn wire_to_state(
    prior: Option<&SyntheticAlertConfigState>,
    wire: &SyntheticAlertConfig,
) -> Result<SyntheticAlertConfigState, ProviderError> {
    let server_filter = match &wire.tag_filter_expression {
        Some(filter) => tagfilter::wire_to_text(filter)?,
        None => None,
    };
    let tag_filter = match (prior.and_then(|p| p.tag_filter.as_deref()), server_filter) {
        (Some(prior), Some(server)) if tagfilter::equivalent(prior, &server) => {
            Some(prior.to_string())
        },
        (_, server) => server,
    };
    let custom_payload_field = custom_payload::to_state(&wire.custom_payload_fields)?;

    Ok(SyntheticAlertConfigState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        description: Some(wire.description.clone()).filter(|d| !d.is_empty()),
        synthetic_test_ids: wire.synthetic_test_ids.clone(),
        severity: Some(Severity::from_code(wire.severity)?.as_str().to_string()),
        tag_filter,
        alert_channel_ids: (!wire.alert_channel_ids.is_empty()).then(|| wire.alert_channel_ids.clone()),
        grace_period: wire.grace_period.filter(|period| *period > 0),
        rule: SyntheticAlertRuleState {
            alert_type: wire.rule.alert_type.clone(),
            metric_name: wire.rule.metric_name.clone(),
            aggregation: Some(wire.rule.aggregation.clone()).filter(|a| !a.is_empty()),
        },
        time_threshold: SyntheticTimeThresholdState {
            threshold_type: wire.time_threshold.threshold_type.clone(),
            violations_count: wire.time_threshold.violations_count,
        },
        custom_payload_field: (!custom_payload_field.is_empty()).then_some(custom_payload_field),
    })
}

fn resource_schema() -> Schema {
    let rule = Block::new()
        .with_attribute(
            "alert_type",
            Attribute::required_string().with_allowed_values([ALERT_TYPE]),
        )
        .with_attribute("metric_name", Attribute::required_string())
        .with_attribute(
            "aggregation",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                .with_allowed_values(AGGREGATIONS),
        );
    let time_threshold = Block::new()
        .with_attribute(
            "type",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                .with_default(Value::from(TIME_THRESHOLD_TYPE))
                .with_allowed_values([TIME_THRESHOLD_TYPE]),
        )
        .with_attribute(
            "violations_count",
            Attribute::required_int64().with_description("Between 1 and 12"),
        );

    Schema::v0()
        .with_description("Synthetic alert configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute(
            "synthetic_test_ids",
            Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::required()),
        )
        .with_attribute(
            "severity",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                .with_allowed_values(Severity::names()),
        )
        .with_attribute(
            "tag_filter",
            Attribute::tag_filter_expression(AttributeFlags::optional()),
        )
        .with_attribute(
            "alert_channel_ids",
            Attribute::optional_string_set().with_description("Alerting channel ids"),
        )
        .with_attribute(
            "grace_period",
            Attribute::optional_int64()
                .with_description("Milliseconds an alert stays open after the violation ends"),
        )
        .with_block("rule", NestedBlock::single(rule).with_min_items(1))
        .with_block("time_threshold", NestedBlock::single(time_threshold).with_min_items(1))
        .with_block(custom_payload::CUSTOM_PAYLOAD_FIELD, custom_payload::schema_block())
}

/// Resource handle of synthetic alert configurations.
pub struct SyntheticAlertConfigResource {
    metadata: ResourceMetadata,
}

impl SyntheticAlertConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                SYNTHETIC_ALERT_CONFIGS_PATH,
                WriteMode::PostPost,
            ),
        }
    }
}

impl Default for SyntheticAlertConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for SyntheticAlertConfigResource {
    type Wire = SyntheticAlertConfig;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let length = |field: &str| {
            config
                .get(field)
                .and_then(Value::as_str)
                .map(|text| text.chars().count())
        };
        if length("name").is_some_and(|n| n == 0 || n > MAX_NAME_LENGTH) {
            diagnostics.push(
                Diagnostic::error("Invalid name")
                    .with_detail(format!("name must have 1 to {} characters", MAX_NAME_LENGTH))
                    .with_attribute("name"),
            );
        }
        if length("description").is_some_and(|n| n > MAX_DESCRIPTION_LENGTH) {
            diagnostics.push(
                Diagnostic::error("Invalid description")
                    .with_detail(format!(
                        "description must not exceed {} characters",
                        MAX_DESCRIPTION_LENGTH
                    ))
                    .with_attribute("description"),
            );
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
        let violations = config
            .get("time_threshold")
            .and_then(|t| t.get("violations_count"))
            .and_then(Value::as_i64);
        if violations.is_some_and(|v| !(1..=MAX_VIOLATIONS).contains(&v)) {
            diagnostics.push(
                Diagnostic::error("Invalid violations count")
                    .with_detail(format!("violations_count must be between 1 and {}", MAX_VIOLATIONS))
                    .with_attribute("time_threshold.violations_count"),
            );
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<SyntheticAlertConfig, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        prior: Option<&Value>,
        wire: &SyntheticAlertConfig,
    ) -> Result<Value, ProviderError> {
        let prior: Option<SyntheticAlertConfigState> = prior.map(from_state).transpose()?;
        to_state(&wire_to_state(prior.as_ref(), wire)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resourcehandle::{ManagedResource, Resource};
    use crate::restapi::{ClientConfig, RestClient};
    use crate::testing::MockInstanaServer;

    fn planned() -> Value {
        json!({
            "name": "checkout failing",
            "synthetic_test_ids": ["t1", "t2"],
            "severity": "critical",
            "tag_filter": "synthetic.locationLabel@na EQUALS 'eu-west'",
            "alert_channel_ids": ["ch1"],
            "grace_period": 300000,
            "rule": {"alert_type": "failure", "metric_name": "status", "aggregation": "SUM"},
            "time_threshold": {"type": "violationsInSequence", "violations_count": 2}
        })
    }

    #[test]
    fn test_state_to_wire() {
        let wire = SyntheticAlertConfigResource::new()
            .map_state_to_wire(&planned())
            .unwrap();
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["severity"], 5);
        assert_eq!(json["syntheticTestIds"], json!(["t1", "t2"]));
        assert_eq!(json["gracePeriod"], 300000);
        assert_eq!(
            json["rule"],
            json!({"alertType": "failure", "metricName": "status", "aggregation": "SUM"})
        );
        assert_eq!(
            json["timeThreshold"],
            json!({"type": "violationsInSequence", "violationsCount": 2})
        );
        assert_eq!(json["tagFilterExpression"]["type"], "TAG_FILTER");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_missing_filter_matches_everything() {
        let mut state = planned();
        state.as_object_mut().unwrap().remove("tag_filter");
        state.as_object_mut().unwrap().remove("severity");
        let wire = SyntheticAlertConfigResource::new()
            .map_state_to_wire(&state)
            .unwrap();
        assert_eq!(wire.tag_filter_expression, Some(match_all_filter()));
        assert_eq!(wire.severity, Severity::Warning.code());

        let back = wire_to_state(None, &wire).unwrap();
        assert_eq!(back.tag_filter, None);
        assert_eq!(back.severity.as_deref(), Some("warning"));
    }

    #[test]
    fn test_equivalent_prior_filter_is_kept() {
        let resource = SyntheticAlertConfigResource::new();
        let mut prior = planned();
        prior["tag_filter"] = json!("synthetic.locationLabel@na  EQUALS   'eu-west'");
        let wire = resource.map_state_to_wire(&prior).unwrap();

        let state = resource.map_wire_to_state(Some(&prior), &wire).unwrap();
        assert_eq!(state["tag_filter"], prior["tag_filter"]);

        let imported = resource.map_wire_to_state(None, &wire).unwrap();
        assert_eq!(imported["tag_filter"], "synthetic.locationLabel EQUALS 'eu-west'");
        assert_eq!(imported["severity"], "critical");
        assert_eq!(imported["rule"]["aggregation"], "SUM");
    }

    #[test]
    fn test_validate() {
        let resource = SyntheticAlertConfigResource::new();
        assert!(resource.validate(&planned()).is_empty());

        let mut config = planned();
        config["name"] = json!("");
        config["tag_filter"] = json!("synthetic.name EQUALS");
        config["time_threshold"]["violations_count"] = json!(13);
        let attributes: Vec<_> = resource
            .validate(&config)
            .into_iter()
            .filter_map(|d| d.attribute)
            .collect();
        assert_eq!(
            attributes,
            vec!["name", "tag_filter", "time_threshold.violations_count"]
        );
    }

    #[tokio::test]
    async fn test_update_posts_to_id() {
        let server = MockInstanaServer::start().await;
        let path = format!("{}/s1", SYNTHETIC_ALERT_CONFIGS_PATH);
        server.respond("POST", &path, 200, Value::Null);
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();

        let mut prior = planned();
        prior["id"] = json!("s1");
        let mut changed = prior.clone();
        changed["grace_period"] = Value::Null;
        let state = ManagedResource::new(SyntheticAlertConfigResource::new())
            .update(&client, prior, changed)
            .await
            .unwrap();
        assert_eq!(state["grace_period"], Value::Null);

        let sent = server.requests_to("POST", &path)[0].json();
        assert!(sent.get("gracePeriod").is_none());
        assert_eq!(sent["id"], "s1");
    }
}
