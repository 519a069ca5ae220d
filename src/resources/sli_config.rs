//! Service level indicators. Configurations cannot be changed once created;
//! every attribute forces replacement.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, SLI_CONFIGS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::{from_state, to_state};
use crate::tagfilter;

/// Resource name of SLI configurations.
pub const RESOURCE_NAME: &str = "sli_config";

/// Aggregations of the SLI metric.
pub const AGGREGATIONS: [&str; 17] = [
    "SUM", "MEAN", "MAX", "MIN", "P25", "P50", "P75", "P90", "P95", "P98", "P99", "P99_9",
    "P99_99", "DISTRIBUTION", "DISTINCT_COUNT", "SUM_POSITIVE", "PER_SECOND",
];

/// Boundary scopes of application entities.
pub const BOUNDARY_SCOPES: [&str; 2] = ["ALL", "INBOUND"];

/// Beacon types of website entities.
pub const BEACON_TYPES: [&str; 6] = [
    "pageLoad", "resourceLoad", "httpRequest", "error", "custom", "pageChange",
];

const MAX_NAME_LENGTH: usize = 256;

/// The four entity kinds: state block name and wire `sliType`.
const ENTITY_KINDS: [(&str, &str); 4] = [
    ("application_time_based", "application"),
    ("application_event_based", "availability"),
    ("website_event_based", "websiteEventBased"),
    ("website_time_based", "websiteTimeBased"),
];

/// An SLI configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub sli_name: String,
    #[serde(default)]
    pub initial_evaluation_timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_configuration: Option<MetricConfiguration>,
    pub sli_entity: SliEntity,
}

impl WireModel for SliConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricConfiguration {
    pub metric_name: String,
    pub metric_aggregation: String,
    pub threshold: f64,
}

/// The measured entity. Which fields are set depends on `sli_type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliEntity {
    pub sli_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary_scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_internal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_synthetic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_event_filter_expression: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad_event_filter_expression: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beacon_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<Value>,
}

/// Host state of an SLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub initial_evaluation_timestamp: Option<i64>,
    #[serde(default)]
    pub metric_configuration: Option<MetricConfigurationState>,
    pub sli_entity: SliEntityState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfigurationState {
    pub metric_name: String,
    pub aggregation: String,
    pub threshold: f64,
}

/// Exactly one kind is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SliEntityState {
    #[serde(default)]
    pub application_time_based: Option<ApplicationTimeBasedState>,
    #[serde(default)]
    pub application_event_based: Option<ApplicationEventBasedState>,
    #[serde(default)]
    pub website_event_based: Option<WebsiteEventBasedState>,
    #[serde(default)]
    pub website_time_based: Option<WebsiteTimeBasedState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationTimeBasedState {
    pub application_id: String,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub endpoint_id: Option<String>,
    pub boundary_scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEventBasedState {
    pub application_id: String,
    pub boundary_scope: String,
    pub good_event_filter_expression: String,
    pub bad_event_filter_expression: String,
    #[serde(default)]
    pub include_internal: Option<bool>,
    #[serde(default)]
    pub include_synthetic: Option<bool>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub endpoint_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteEventBasedState {
    pub website_id: String,
    pub good_event_filter_expression: String,
    pub bad_event_filter_expression: String,
    pub beacon_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteTimeBasedState {
    pub website_id: String,
    #[serde(default)]
    pub filter_expression: Option<String>,
    pub beacon_type: String,
}

fn filter_to_wire(text: &str) -> Result<Option<Value>, ProviderError> {
    tagfilter::text_to_wire(text)
}

fn filter_to_state(wire: Option<&Value>) -> Result<Option<String>, ProviderError> {
    match wire {
        Some(filter) => tagfilter::wire_to_text(filter),
        None => Ok(None),
    }
}

fn entity_to_wire(entity: &SliEntityState) -> Result<SliEntity, ProviderError> {
    let kind = |index: usize| ENTITY_KINDS[index].1.to_string();
    let candidates = [
        entity.application_time_based.as_ref().map(|e| -> Result<SliEntity, ProviderError> {
            Ok(SliEntity {
                sli_type: kind(0),
                application_id: Some(e.application_id.clone()),
                service_id: e.service_id.clone(),
                endpoint_id: e.endpoint_id.clone(),
                boundary_scope: Some(e.boundary_scope.clone()),
                ..SliEntity::default()
            })
        }),
        entity.application_event_based.as_ref().map(|e| -> Result<SliEntity, ProviderError> {
            Ok(SliEntity {
                sli_type: kind(1),
                application_id: Some(e.application_id.clone()),
                service_id: e.service_id.clone(),
                endpoint_id: e.endpoint_id.clone(),
                boundary_scope: Some(e.boundary_scope.clone()),
                include_internal: e.include_internal,
                include_synthetic: e.include_synthetic,
                good_event_filter_expression: filter_to_wire(&e.good_event_filter_expression)?,
                bad_event_filter_expression: filter_to_wire(&e.bad_event_filter_expression)?,
                ..SliEntity::default()
            })
        }),
        entity.website_event_based.as_ref().map(|e| -> Result<SliEntity, ProviderError> {
            Ok(SliEntity {
                sli_type: kind(2),
                website_id: Some(e.website_id.clone()),
                beacon_type: Some(e.beacon_type.clone()),
                good_event_filter_expression: filter_to_wire(&e.good_event_filter_expression)?,
                bad_event_filter_expression: filter_to_wire(&e.bad_event_filter_expression)?,
                ..SliEntity::default()
            })
        }),
        entity.website_time_based.as_ref().map(|e| -> Result<SliEntity, ProviderError> {
            Ok(SliEntity {
                sli_type: kind(3),
                website_id: Some(e.website_id.clone()),
                beacon_type: Some(e.beacon_type.clone()),
                filter_expression: match e.filter_expression.as_deref() {
                    Some(text) => filter_to_wire(text)?,
                    None => None,
                },
                ..SliEntity::default()
            })
        }),
    ];
    let mut set = candidates.into_iter().flatten();
    match (set.next(), set.next()) {
        (Some(entity), None) => entity,
        _ => Err(ProviderError::InvalidConfig(format!(
            "sli_entity: exactly one of {} must be set",
            ENTITY_KINDS.map(|(name, _)| name).join(", ")
        ))),
    }
}

fn entity_to_state(entity: &SliEntity) -> Result<SliEntityState, ProviderError> {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let filter = |wire: &Option<Value>| -> Result<String, ProviderError> {
        Ok(filter_to_state(wire.as_ref())?.unwrap_or_default())
    };
    let mut state = SliEntityState::default();
    match entity.sli_type.as_str() {
        "application" => {
            state.application_time_based = Some(ApplicationTimeBasedState {
                application_id: text(&entity.application_id),
                service_id: entity.service_id.clone(),
                endpoint_id: entity.endpoint_id.clone(),
                boundary_scope: text(&entity.boundary_scope),
            })
        },
        "availability" => {
            state.application_event_based = Some(ApplicationEventBasedState {
                application_id: text(&entity.application_id),
                boundary_scope: text(&entity.boundary_scope),
                good_event_filter_expression: filter(&entity.good_event_filter_expression)?,
                bad_event_filter_expression: filter(&entity.bad_event_filter_expression)?,
                include_internal: Some(entity.include_internal.unwrap_or(false)),
                include_synthetic: Some(entity.include_synthetic.unwrap_or(false)),
                service_id: entity.service_id.clone(),
                endpoint_id: entity.endpoint_id.clone(),
            })
        },
        "websiteEventBased" => {
            state.website_event_based = Some(WebsiteEventBasedState {
                website_id: text(&entity.website_id),
                good_event_filter_expression: filter(&entity.good_event_filter_expression)?,
                bad_event_filter_expression: filter(&entity.bad_event_filter_expression)?,
                beacon_type: text(&entity.beacon_type),
            })
        },
        "websiteTimeBased" => {
            state.website_time_based = Some(WebsiteTimeBasedState {
                website_id: text(&entity.website_id),
                filter_expression: filter_to_state(entity.filter_expression.as_ref())?,
                beacon_type: text(&entity.beacon_type),
            })
        },
        other => {
            return Err(ProviderError::Decode(format!(
                "unsupported SLI entity type '{}'",
                other
            )))
        },
    }
    Ok(state)
}

pub fn state_to_wire(state: &SliConfigState) -> Result<SliConfig, ProviderError> {
    Ok(SliConfig {
        id: state.id.clone(),
        sli_name: state.name.clone(),
        initial_evaluation_timestamp: state.initial_evaluation_timestamp.unwrap_or_default(),
        metric_configuration: state.metric_configuration.as_ref().map(|m| MetricConfiguration {
            metric_name: m.metric_name.clone(),
            metric_aggregation: m.aggregation.clone(),
            threshold: m.threshold,
        }),
        sli_entity: entity_to_wire(&state.sli_entity)?,
    })
}

pub fn wire_to_state(wire: &SliConfig) -> Result<SliConfigState, ProviderError> {
    Ok(SliConfigState {
        id: wire.id.clone(),
        name: wire.sli_name.clone(),
        initial_evaluation_timestamp: Some(wire.initial_evaluation_timestamp),
        metric_configuration: wire.metric_configuration.as_ref().map(|m| MetricConfigurationState {
            metric_name: m.metric_name.clone(),
            aggregation: m.metric_aggregation.clone(),
            threshold: m.threshold,
        }),
        sli_entity: entity_to_state(&wire.sli_entity)?,
    })
}

/// Keep configured filter texts the server echoed back in another spelling.
fn keep_equivalent_filters(prior: &Value, state: &mut Value) {
    for (kind, _) in ENTITY_KINDS {
        let Some(entity) = state.pointer_mut(&format!("/sli_entity/{}", kind)) else {
            continue;
        };
        let Some(entity) = entity.as_object_mut() else {
            continue;
        };
        for field in [
            "good_event_filter_expression",
            "bad_event_filter_expression",
            "filter_expression",
        ] {
            let configured = prior
                .pointer(&format!("/sli_entity/{}/{}", kind, field))
                .and_then(Value::as_str);
            let current = entity.get(field).and_then(Value::as_str);
            if let (Some(configured), Some(current)) = (configured, current) {
                if tagfilter::equivalent(configured, current) {
                    entity.insert(field.to_string(), Value::from(configured));
                }
            }
        }
    }
}

fn resource_schema() -> Schema {
    let replace = |attribute: Attribute| attribute.with_force_new();
    let boundary_scope = || replace(Attribute::required_string().with_allowed_values(BOUNDARY_SCOPES));
    let beacon_type = || replace(Attribute::required_string().with_allowed_values(BEACON_TYPES));
    let filter = |flags: AttributeFlags| replace(Attribute::tag_filter_expression(flags));

    let metric = Block::new()
        .with_attribute("metric_name", replace(Attribute::required_string()))
        .with_attribute(
            "aggregation",
            replace(Attribute::required_string().with_allowed_values(AGGREGATIONS)),
        )
        .with_attribute(
            "threshold",
            replace(Attribute::required_float64().with_description("Must be positive")),
        );
    let application_time_based = Block::new()
        .with_attribute("application_id", replace(Attribute::required_string()))
        .with_attribute("service_id", replace(Attribute::optional_string()))
        .with_attribute("endpoint_id", replace(Attribute::optional_string()))
        .with_attribute("boundary_scope", boundary_scope());
    let application_event_based = Block::new()
        .with_attribute("application_id", replace(Attribute::required_string()))
        .with_attribute("boundary_scope", boundary_scope())
        .with_attribute("good_event_filter_expression", filter(AttributeFlags::required()))
        .with_attribute("bad_event_filter_expression", filter(AttributeFlags::required()))
        .with_attribute(
            "include_internal",
            replace(
                Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                    .with_default(Value::Bool(false)),
            ),
        )
        .with_attribute(
            "include_synthetic",
            replace(
                Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                    .with_default(Value::Bool(false)),
            ),
        )
        .with_attribute("service_id", replace(Attribute::optional_string()))
        .with_attribute("endpoint_id", replace(Attribute::optional_string()));
    let website_event_based = Block::new()
        .with_attribute("website_id", replace(Attribute::required_string()))
        .with_attribute("good_event_filter_expression", filter(AttributeFlags::required()))
        .with_attribute("bad_event_filter_expression", filter(AttributeFlags::required()))
        .with_attribute("beacon_type", beacon_type());
    let website_time_based = Block::new()
        .with_attribute("website_id", replace(Attribute::required_string()))
        .with_attribute("filter_expression", filter(AttributeFlags::optional()))
        .with_attribute("beacon_type", beacon_type());
    let entity = ENTITY_KINDS
        .iter()
        .zip([
            application_time_based,
            application_event_based,
            website_event_based,
            website_time_based,
        ])
        .fold(Block::new(), |block, ((name, _), kind)| {
            block.with_block(*name, NestedBlock::single(kind))
        })
        .with_exactly_one_of(ENTITY_KINDS.map(|(name, _)| name));

    Schema::v0()
        .with_description("Service level indicator configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", replace(Attribute::required_string()))
        .with_attribute(
            "initial_evaluation_timestamp",
            replace(Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed())),
        )
        .with_block("metric_configuration", NestedBlock::single(metric))
        .with_block("sli_entity", NestedBlock::single(entity).with_min_items(1))
}

/// Resource handle of SLI configurations.
pub struct SliConfigResource {
    metadata: ResourceMetadata,
}

impl SliConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                SLI_CONFIGS_PATH,
                WriteMode::PostNoUpdate,
            ),
        }
    }
}

impl Default for SliConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for SliConfigResource {
    type Wire = SliConfig;

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
        let threshold = config
            .pointer("/metric_configuration/threshold")
            .and_then(Value::as_f64);
        if threshold.is_some_and(|t| t <= 0.0) {
            diagnostics.push(
                Diagnostic::error("Invalid threshold")
                    .with_detail("threshold must be greater than zero")
                    .with_attribute("metric_configuration.threshold"),
            );
        }
        for (kind, _) in ENTITY_KINDS {
            for field in [
                "good_event_filter_expression",
                "bad_event_filter_expression",
                "filter_expression",
            ] {
                let text = config
                    .pointer(&format!("/sli_entity/{}/{}", kind, field))
                    .and_then(Value::as_str);
                if let Some(Err(e)) = text.map(tagfilter::normalize) {
                    diagnostics.push(
                        Diagnostic::error("Invalid tag filter expression")
                            .with_detail(e.message())
                            .with_attribute(format!("sli_entity.{}.{}", kind, field)),
                    );
                }
            }
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<SliConfig, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(&self, prior: Option<&Value>, wire: &SliConfig) -> Result<Value, ProviderError> {
        let mut state = to_state(&wire_to_state(wire)?)?;
        if let Some(prior) = prior {
            keep_equivalent_filters(prior, &mut state);
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resourcehandle::{ManagedResource, Resource};
    use crate::restapi::{ClientConfig, RestClient};
    use crate::testing::MockInstanaServer;
    use serde_json::json;

    fn application_time_based() -> Value {
        json!({
            "name": "checkout latency",
            "initial_evaluation_timestamp": 0,
            "metric_configuration": {"metric_name": "latency", "aggregation": "P90", "threshold": 250.0},
            "sli_entity": {
                "application_time_based": {
                    "application_id": "app1",
                    "service_id": "svc1",
                    "boundary_scope": "INBOUND"
                }
            }
        })
    }

    #[test]
    fn test_state_to_wire() {
        let wire = SliConfigResource::new()
            .map_state_to_wire(&application_time_based())
            .unwrap();
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({
                "sliName": "checkout latency",
                "initialEvaluationTimestamp": 0,
                "metricConfiguration": {"metricName": "latency", "metricAggregation": "P90", "threshold": 250.0},
                "sliEntity": {
                    "sliType": "application",
                    "applicationId": "app1",
                    "serviceId": "svc1",
                    "boundaryScope": "INBOUND"
                }
            })
        );
    }

    #[test]
    fn test_exactly_one_entity_kind() {
        let resource = SliConfigResource::new();
        let mut state = application_time_based();
        state["sli_entity"]["website_time_based"] =
            json!({"website_id": "w1", "beacon_type": "pageLoad"});
        assert!(resource.map_state_to_wire(&state).is_err());

        state["sli_entity"] = json!({});
        assert!(resource.map_state_to_wire(&state).is_err());
    }

    #[test]
    fn test_validate() {
        let resource = SliConfigResource::new();
        assert!(resource.validate(&application_time_based()).is_empty());

        let config = json!({
            "name": "availability",
            "metric_configuration": {"metric_name": "calls", "aggregation": "SUM", "threshold": 0.0},
            "sli_entity": {
                "website_event_based": {
                    "website_id": "w1",
                    "beacon_type": "pageLoad",
                    "good_event_filter_expression": "beacon.page.name EQUALS",
                    "bad_event_filter_expression": "beacon.page.name EQUALS 'error'"
                }
            }
        });
        let diagnostics = resource.validate(&config);
        let attributes: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert_eq!(
            attributes,
            vec![
                "metric_configuration.threshold",
                "sli_entity.website_event_based.good_event_filter_expression",
            ]
        );
    }

    #[tokio::test]
    async fn test_create_event_based_and_refuse_update() {
        let server = MockInstanaServer::start().await;
        server.respond(
            "POST",
            SLI_CONFIGS_PATH,
            200,
            json!({
                "id": "sli1",
                "sliName": "availability",
                "initialEvaluationTimestamp": 1700000000000_i64,
                "sliEntity": {
                    "sliType": "availability",
                    "applicationId": "app1",
                    "boundaryScope": "ALL",
                    "goodEventFilterExpression": {
                        "type": "TAG_FILTER",
                        "name": "call.http.status",
                        "entity": "NOT_APPLICABLE",
                        "operator": "LESS_THAN",
                        "value": "500"
                    },
                    "badEventFilterExpression": {
                        "type": "TAG_FILTER",
                        "name": "call.erroneous",
                        "entity": "NOT_APPLICABLE",
                        "operator": "EQUALS",
                        "value": "true"
                    }
                }
            }),
        );
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let resource = ManagedResource::new(SliConfigResource::new());

        let planned = json!({
            "name": "availability",
            "sli_entity": {
                "application_event_based": {
                    "application_id": "app1",
                    "boundary_scope": "ALL",
                    "good_event_filter_expression": "call.http.status@na LESS_THAN '500'",
                    "bad_event_filter_expression": "call.erroneous EQUALS 'true'"
                }
            }
        });
        let state = resource.create(&client, planned).await.unwrap();
        let entity = &state["sli_entity"]["application_event_based"];
        assert_eq!(state["id"], "sli1");
        assert_eq!(state["initial_evaluation_timestamp"], 1700000000000_i64);
        assert_eq!(entity["good_event_filter_expression"], "call.http.status@na LESS_THAN '500'");
        assert_eq!(entity["include_internal"], false);
        assert_eq!(state["metric_configuration"], Value::Null);

        let mut renamed = state.clone();
        renamed["name"] = json!("availability v2");
        assert!(resource.update(&client, state, renamed).await.is_err());
        assert_eq!(server.requests().len(), 1);
    }
}
