//! Service level objective configurations.
//!
//! An SLO combines three independent variant groups: the entity it measures
//! (application, website, synthetic, infrastructure), the indicator
//! (identified on the wire by `blueprint` plus measurement `type`) and the
//! time window (rolling or fixed). State holds one block per group.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, SLO_CONFIGS_PATH};
use crate::schema::{Attribute, AttributeFlags, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::tags::deserialize_tags;
use crate::shared::threshold::THRESHOLD_OPERATORS;
use crate::shared::{from_state, to_state};
use crate::tagfilter;

/// Resource name of SLO configurations.
pub const RESOURCE_NAME: &str = "slo_config";

/// Entity blocks in the order they are inspected on write.
pub const ENTITY_BLOCKS: [&str; 4] = ["application", "website", "synthetic", "infrastructure"];

/// Indicator blocks in the order they are inspected on write.
pub const INDICATOR_BLOCKS: [&str; 6] = [
    "time_based_latency",
    "event_based_latency",
    "time_based_availability",
    "event_based_availability",
    "traffic",
    "custom",
];

/// Time window blocks.
pub const TIME_WINDOW_BLOCKS: [&str; 2] = ["rolling", "fixed"];

const BLUEPRINT_LATENCY: &str = "latency";
const BLUEPRINT_AVAILABILITY: &str = "availability";
const BLUEPRINT_TRAFFIC: &str = "traffic";
const BLUEPRINT_CUSTOM: &str = "custom";
const TIME_BASED: &str = "timeBased";
const EVENT_BASED: &str = "eventBased";
const DEFAULT_AGGREGATION: &str = "MEAN";

// ============================================================================
// Wire model
// ============================================================================

/// An SLO configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub target: f64,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Option<Vec<String>>,
    pub entity: SloEntity,
    pub indicator: SloIndicator,
    pub time_window: SloTimeWindow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rbac_tags: Option<Vec<SloRbacTag>>,
}

impl WireModel for SloConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Access control tag of an SLO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloRbacTag {
    pub display_name: String,
    pub id: String,
}

/// Measured entity; `type` selects the meaningful fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary_scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_synthetic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_internal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beacon_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic_test_ids: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra_type: Option<String>,
}

/// Indicator; `blueprint` and `type` together select the kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloIndicator {
    pub blueprint: String,
    #[serde(rename = "type", default)]
    pub measurement_type: String,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_events_filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad_events_filter: Option<Value>,
}

/// Time window; `type` is `rolling` or `fixed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloTimeWindow {
    #[serde(rename = "type")]
    pub window_type: String,
    pub duration: i64,
    pub duration_unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<f64>,
}

// ============================================================================
// State model
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationEntity {
    pub application_id: String,
    pub boundary_scope: String,
    #[serde(default)]
    pub include_internal: Option<bool>,
    #[serde(default)]
    pub include_synthetic: Option<bool>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub endpoint_id: Option<String>,
    #[serde(default)]
    pub filter_expression: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebsiteEntity {
    pub website_id: String,
    pub beacon_type: String,
    #[serde(default)]
    pub filter_expression: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntheticEntity {
    pub synthetic_test_ids: Vec<String>,
    #[serde(default)]
    pub filter_expression: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureEntity {
    pub infra_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    #[serde(default)]
    pub application: Option<ApplicationEntity>,
    #[serde(default)]
    pub website: Option<WebsiteEntity>,
    #[serde(default)]
    pub synthetic: Option<SyntheticEntity>,
    #[serde(default)]
    pub infrastructure: Option<InfrastructureEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBasedIndicator {
    pub threshold: f64,
    pub aggregation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBasedLatencyIndicator {
    pub threshold: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBasedAvailabilityIndicator {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficIndicator {
    pub traffic_type: String,
    pub threshold: f64,
    pub operator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomIndicator {
    pub good_event_filter_expression: String,
    #[serde(default)]
    pub bad_event_filter_expression: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorState {
    #[serde(default)]
    pub time_based_latency: Option<TimeBasedIndicator>,
    #[serde(default)]
    pub event_based_latency: Option<EventBasedLatencyIndicator>,
    #[serde(default)]
    pub time_based_availability: Option<TimeBasedIndicator>,
    #[serde(default)]
    pub event_based_availability: Option<EventBasedAvailabilityIndicator>,
    #[serde(default)]
    pub traffic: Option<TrafficIndicator>,
    #[serde(default)]
    pub custom: Option<CustomIndicator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindow {
    pub duration: i64,
    pub duration_unit: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedWindow {
    pub duration: i64,
    pub duration_unit: String,
    #[serde(default)]
    pub timezone: Option<String>,
    pub start_timestamp: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeWindowState {
    #[serde(default)]
    pub rolling: Option<RollingWindow>,
    #[serde(default)]
    pub fixed: Option<FixedWindow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RbacTagState {
    pub display_name: String,
    pub id: String,
}

/// Host state of an SLO configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SloConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub target: f64,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub entity: EntityState,
    #[serde(default)]
    pub indicator: IndicatorState,
    #[serde(default)]
    pub time_window: TimeWindowState,
    #[serde(default)]
    pub rbac_tags: Option<Vec<RbacTagState>>,
}

// ============================================================================
// Mapping
// ============================================================================

/// Wire filter for optional filter text; unset text becomes an empty
/// conjunction, which the API expects in place of null.
fn filter_to_wire(text: Option<&str>) -> Result<Value, ProviderError> {
    let wire = match text {
        Some(text) => tagfilter::text_to_wire(text)?,
        None => None,
    };
    Ok(wire.unwrap_or_else(|| {
        json!({"type": "EXPRESSION", "logicalOperator": "AND", "elements": []})
    }))
}

fn filter_to_state(wire: Option<&Value>) -> Result<Option<String>, ProviderError> {
    match wire {
        Some(wire) => tagfilter::wire_to_text(wire),
        None => Ok(None),
    }
}

fn entity_to_wire(entity: &EntityState) -> Result<SloEntity, ProviderError> {
    if let Some(app) = &entity.application {
        return Ok(SloEntity {
            entity_type: "application".to_string(),
            application_id: Some(app.application_id.clone()),
            boundary_scope: Some(app.boundary_scope.clone()),
            include_internal: app.include_internal,
            include_synthetic: app.include_synthetic,
            service_id: app.service_id.clone(),
            endpoint_id: app.endpoint_id.clone(),
            tag_filter_expression: Some(filter_to_wire(app.filter_expression.as_deref())?),
            ..SloEntity::default()
        });
    }
    if let Some(website) = &entity.website {
        return Ok(SloEntity {
            entity_type: "website".to_string(),
            website_id: Some(website.website_id.clone()),
            beacon_type: Some(website.beacon_type.clone()),
            tag_filter_expression: Some(filter_to_wire(website.filter_expression.as_deref())?),
            ..SloEntity::default()
        });
    }
    if let Some(synthetic) = &entity.synthetic {
        if synthetic.synthetic_test_ids.is_empty() {
            return Err(ProviderError::InvalidConfig(
                "synthetic_test_ids is required for synthetic entity".to_string(),
            ));
        }
        return Ok(SloEntity {
            entity_type: "synthetic".to_string(),
            synthetic_test_ids: Some(
                synthetic
                    .synthetic_test_ids
                    .iter()
                    .map(|id| Value::String(id.clone()))
                    .collect(),
            ),
            tag_filter_expression: Some(filter_to_wire(synthetic.filter_expression.as_deref())?),
            ..SloEntity::default()
        });
    }
    if let Some(infra) = &entity.infrastructure {
        return Ok(SloEntity {
            entity_type: "infrastructure".to_string(),
            infra_type: Some(infra.infra_type.clone()),
            ..SloEntity::default()
        });
    }
    Err(ProviderError::InvalidConfig(
        "Exactly one entity configuration is required".to_string(),
    ))
}

fn entity_to_state(entity: &SloEntity) -> Result<EntityState, ProviderError> {
    let filter = filter_to_state(entity.tag_filter_expression.as_ref())?;
    let mut state = EntityState::default();
    match entity.entity_type.as_str() {
        "application" => {
            state.application = Some(ApplicationEntity {
                application_id: entity.application_id.clone().unwrap_or_default(),
                boundary_scope: entity.boundary_scope.clone().unwrap_or_default(),
                include_internal: entity.include_internal,
                include_synthetic: entity.include_synthetic,
                service_id: entity.service_id.clone(),
                endpoint_id: entity.endpoint_id.clone(),
                filter_expression: filter,
            })
        },
        "website" => {
            state.website = Some(WebsiteEntity {
                website_id: entity.website_id.clone().unwrap_or_default(),
                beacon_type: entity.beacon_type.clone().unwrap_or_default(),
                filter_expression: filter,
            })
        },
        "synthetic" => {
            state.synthetic = Some(SyntheticEntity {
                synthetic_test_ids: entity
                    .synthetic_test_ids
                    .iter()
                    .flatten()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect(),
                filter_expression: filter,
            })
        },
        "infrastructure" => {
            state.infrastructure = Some(InfrastructureEntity {
                infra_type: entity.infra_type.clone().unwrap_or_default(),
            })
        },
        other => {
            return Err(ProviderError::Decode(format!(
                "Unsupported entity type: {}",
                other
            )))
        },
    }
    Ok(state)
}

fn indicator_to_wire(indicator: &IndicatorState) -> Result<SloIndicator, ProviderError> {
    let default_aggregation = Some(DEFAULT_AGGREGATION.to_string());
    if let Some(latency) = &indicator.time_based_latency {
        return Ok(SloIndicator {
            blueprint: BLUEPRINT_LATENCY.to_string(),
            measurement_type: TIME_BASED.to_string(),
            threshold: latency.threshold,
            aggregation: Some(latency.aggregation.clone()),
            ..SloIndicator::default()
        });
    }
    if let Some(latency) = &indicator.event_based_latency {
        return Ok(SloIndicator {
            blueprint: BLUEPRINT_LATENCY.to_string(),
            measurement_type: EVENT_BASED.to_string(),
            threshold: latency.threshold,
            aggregation: default_aggregation,
            ..SloIndicator::default()
        });
    }
    if let Some(availability) = &indicator.time_based_availability {
        return Ok(SloIndicator {
            blueprint: BLUEPRINT_AVAILABILITY.to_string(),
            measurement_type: TIME_BASED.to_string(),
            threshold: availability.threshold,
            aggregation: Some(availability.aggregation.clone()),
            ..SloIndicator::default()
        });
    }
    if indicator.event_based_availability.is_some() {
        return Ok(SloIndicator {
            blueprint: BLUEPRINT_AVAILABILITY.to_string(),
            measurement_type: EVENT_BASED.to_string(),
            aggregation: default_aggregation,
            ..SloIndicator::default()
        });
    }
    if let Some(traffic) = &indicator.traffic {
        return Ok(SloIndicator {
            blueprint: BLUEPRINT_TRAFFIC.to_string(),
            measurement_type: TIME_BASED.to_string(),
            threshold: traffic.threshold,
            traffic_type: Some(traffic.traffic_type.clone()),
            operator: Some(traffic.operator.clone()),
            aggregation: default_aggregation,
            ..SloIndicator::default()
        });
    }
    if let Some(custom) = &indicator.custom {
        return Ok(SloIndicator {
            blueprint: BLUEPRINT_CUSTOM.to_string(),
            measurement_type: EVENT_BASED.to_string(),
            good_events_filter: Some(filter_to_wire(Some(&custom.good_event_filter_expression))?),
            bad_events_filter: Some(filter_to_wire(custom.bad_event_filter_expression.as_deref())?),
            aggregation: default_aggregation,
            ..SloIndicator::default()
        });
    }
    Err(ProviderError::InvalidConfig(
        "Exactly one indicator configuration is required".to_string(),
    ))
}

fn indicator_to_state(indicator: &SloIndicator) -> Result<IndicatorState, ProviderError> {
    let aggregation = || indicator.aggregation.clone().unwrap_or_default();
    let mut state = IndicatorState::default();
    match (indicator.blueprint.as_str(), indicator.measurement_type.as_str()) {
        (BLUEPRINT_LATENCY, TIME_BASED) => {
            state.time_based_latency = Some(TimeBasedIndicator {
                threshold: indicator.threshold,
                aggregation: aggregation(),
            })
        },
        (BLUEPRINT_LATENCY, EVENT_BASED) => {
            state.event_based_latency = Some(EventBasedLatencyIndicator {
                threshold: indicator.threshold,
            })
        },
        (BLUEPRINT_AVAILABILITY, TIME_BASED) => {
            state.time_based_availability = Some(TimeBasedIndicator {
                threshold: indicator.threshold,
                aggregation: aggregation(),
            })
        },
        (BLUEPRINT_AVAILABILITY, EVENT_BASED) => {
            state.event_based_availability = Some(EventBasedAvailabilityIndicator {})
        },
        (BLUEPRINT_TRAFFIC, _) => {
            state.traffic = Some(TrafficIndicator {
                traffic_type: indicator.traffic_type.clone().unwrap_or_default(),
                threshold: indicator.threshold,
                operator: indicator.operator.clone().unwrap_or_default(),
            })
        },
        (BLUEPRINT_CUSTOM, EVENT_BASED) => {
            state.custom = Some(CustomIndicator {
                good_event_filter_expression: filter_to_state(indicator.good_events_filter.as_ref())?
                    .unwrap_or_default(),
                bad_event_filter_expression: filter_to_state(indicator.bad_events_filter.as_ref())?,
            })
        },
        (blueprint, kind) => {
            return Err(ProviderError::Decode(format!(
                "Unsupported indicator type: {}, blueprint: {}",
                kind, blueprint
            )))
        },
    }
    Ok(state)
}

fn time_window_to_wire(window: &TimeWindowState) -> Result<SloTimeWindow, ProviderError> {
    if let Some(rolling) = &window.rolling {
        return Ok(SloTimeWindow {
            window_type: "rolling".to_string(),
            duration: rolling.duration,
            duration_unit: rolling.duration_unit.clone(),
            timezone: rolling.timezone.clone(),
            start_timestamp: None,
        });
    }
    if let Some(fixed) = &window.fixed {
        return Ok(SloTimeWindow {
            window_type: "fixed".to_string(),
            duration: fixed.duration,
            duration_unit: fixed.duration_unit.clone(),
            timezone: fixed.timezone.clone(),
            start_timestamp: Some(fixed.start_timestamp),
        });
    }
    Err(ProviderError::InvalidConfig(
        "Exactly one time window configuration is required".to_string(),
    ))
}

fn time_window_to_state(window: &SloTimeWindow) -> Result<TimeWindowState, ProviderError> {
    let timezone = window.timezone.clone().filter(|tz| !tz.is_empty());
    match window.window_type.as_str() {
        "rolling" => Ok(TimeWindowState {
            rolling: Some(RollingWindow {
                duration: window.duration,
                duration_unit: window.duration_unit.clone(),
                timezone,
            }),
            fixed: None,
        }),
        "fixed" => Ok(TimeWindowState {
            rolling: None,
            fixed: Some(FixedWindow {
                duration: window.duration,
                duration_unit: window.duration_unit.clone(),
                timezone,
                start_timestamp: window.start_timestamp.unwrap_or_default(),
            }),
        }),
        other => Err(ProviderError::Decode(format!(
            "Unsupported time window type: {}",
            other
        ))),
    }
}

/// Encode state as the wire object.
pub fn state_to_wire(state: &SloConfigState) -> Result<SloConfig, ProviderError> {
    Ok(SloConfig {
        id: state.id.clone(),
        name: state.name.clone(),
        target: state.target,
        tags: Some(state.tags.clone().unwrap_or_default()),
        entity: entity_to_wire(&state.entity)?,
        indicator: indicator_to_wire(&state.indicator)?,
        time_window: time_window_to_wire(&state.time_window)?,
        rbac_tags: state.rbac_tags.as_ref().map(|tags| {
            tags.iter()
                .map(|tag| SloRbacTag {
                    display_name: tag.display_name.clone(),
                    id: tag.id.clone(),
                })
                .collect()
        }),
    })
}

/// Decode the wire object.
pub fn wire_to_state(wire: &SloConfig) -> Result<SloConfigState, ProviderError> {
    Ok(SloConfigState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        target: wire.target,
        tags: wire.tags.clone().filter(|tags| !tags.is_empty()),
        entity: entity_to_state(&wire.entity)?,
        indicator: indicator_to_state(&wire.indicator)?,
        time_window: time_window_to_state(&wire.time_window)?,
        rbac_tags: wire
            .rbac_tags
            .as_ref()
            .filter(|tags| !tags.is_empty())
            .map(|tags| {
                tags.iter()
                    .map(|tag| RbacTagState {
                        display_name: tag.display_name.clone(),
                        id: tag.id.clone(),
                    })
                    .collect()
            }),
    })
}

// ============================================================================
// Schema
// ============================================================================

fn filter_attribute() -> Attribute {
    Attribute::tag_filter_expression(AttributeFlags::optional())
}

fn time_based_indicator(description: &str) -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_description(description)
            .with_attribute("threshold", Attribute::required_float64())
            .with_attribute("aggregation", Attribute::required_string()),
    )
}

fn resource_schema() -> Schema {
    let entity = Block::new()
        .with_description("The entity to use for the SLO configuration")
        .with_block(
            "application",
            NestedBlock::single(
                Block::new()
                    .with_attribute("application_id", Attribute::required_string())
                    .with_attribute(
                        "boundary_scope",
                        Attribute::required_string().with_allowed_values(["ALL", "INBOUND"]),
                    )
                    .with_attribute("include_internal", Attribute::optional_bool())
                    .with_attribute("include_synthetic", Attribute::optional_bool())
                    .with_attribute("service_id", Attribute::optional_string())
                    .with_attribute("endpoint_id", Attribute::optional_string())
                    .with_attribute("filter_expression", filter_attribute()),
            ),
        )
        .with_block(
            "website",
            NestedBlock::single(
                Block::new()
                    .with_attribute("website_id", Attribute::required_string())
                    .with_attribute("beacon_type", Attribute::required_string())
                    .with_attribute("filter_expression", filter_attribute()),
            ),
        )
        .with_block(
            "synthetic",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "synthetic_test_ids",
                        Attribute::optional_string_list().with_description("Synthetic test ids"),
                    )
                    .with_attribute("filter_expression", filter_attribute()),
            ),
        )
        .with_block(
            "infrastructure",
            NestedBlock::single(
                Block::new().with_attribute("infra_type", Attribute::required_string()),
            ),
        )
        .with_exactly_one_of(ENTITY_BLOCKS);

    let indicator = Block::new()
        .with_description("The indicator to use for the SLO configuration")
        .with_block("time_based_latency", time_based_indicator("Time-based latency indicator"))
        .with_block(
            "event_based_latency",
            NestedBlock::single(
                Block::new().with_attribute("threshold", Attribute::required_float64()),
            ),
        )
        .with_block(
            "time_based_availability",
            time_based_indicator("Time-based availability indicator"),
        )
        .with_block("event_based_availability", NestedBlock::single(Block::new()))
        .with_block(
            "traffic",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "traffic_type",
                        Attribute::required_string().with_allowed_values(["all", "erroneous"]),
                    )
                    .with_attribute("threshold", Attribute::required_float64())
                    .with_attribute(
                        "operator",
                        Attribute::required_string().with_allowed_values(THRESHOLD_OPERATORS),
                    ),
            ),
        )
        .with_block(
            "custom",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "good_event_filter_expression",
                        Attribute::tag_filter_expression(AttributeFlags::required()),
                    )
                    .with_attribute("bad_event_filter_expression", filter_attribute()),
            ),
        )
        .with_exactly_one_of(INDICATOR_BLOCKS);

    let time_window = Block::new()
        .with_description("The time window to use for the SLO configuration")
        .with_block(
            "rolling",
            NestedBlock::single(
                Block::new()
                    .with_attribute("duration", Attribute::required_int64())
                    .with_attribute("duration_unit", Attribute::required_string())
                    .with_attribute("timezone", Attribute::optional_string()),
            ),
        )
        .with_block(
            "fixed",
            NestedBlock::single(
                Block::new()
                    .with_attribute("duration", Attribute::required_int64())
                    .with_attribute("duration_unit", Attribute::required_string())
                    .with_attribute("timezone", Attribute::optional_string())
                    .with_attribute("start_timestamp", Attribute::required_float64()),
            ),
        )
        .with_exactly_one_of(TIME_WINDOW_BLOCKS);

    Schema::v0()
        .with_description("SLO configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("target", Attribute::required_float64())
        .with_attribute("tags", Attribute::optional_string_list())
        .with_block("entity", NestedBlock::single(entity).with_min_items(1))
        .with_block("indicator", NestedBlock::single(indicator).with_min_items(1))
        .with_block("time_window", NestedBlock::single(time_window).with_min_items(1))
        .with_block(
            "rbac_tags",
            NestedBlock::set(
                Block::new()
                    .with_attribute("display_name", Attribute::required_string())
                    .with_attribute("id", Attribute::required_string()),
            ),
        )
}

// ============================================================================
// Handle
// ============================================================================

/// Resource handle of SLO configurations.
pub struct SloConfigResource {
    metadata: ResourceMetadata,
}

impl SloConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                SLO_CONFIGS_PATH,
                WriteMode::PostPut,
            ),
        }
    }
}

impl Default for SloConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

fn check_filter(config: &Value, pointer: &str, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    if let Some(text) = config.pointer(pointer).and_then(Value::as_str) {
        if let Err(e) = tagfilter::normalize(text) {
            diagnostics.push(
                Diagnostic::error("Invalid tag filter expression")
                    .with_detail(e.message())
                    .with_attribute(path),
            );
        }
    }
}

impl ResourceHandle for SloConfigResource {
    type Wire = SloConfig;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (pointer, path) in [
            ("/entity/application/filter_expression", "entity.application.filter_expression"),
            ("/entity/website/filter_expression", "entity.website.filter_expression"),
            ("/entity/synthetic/filter_expression", "entity.synthetic.filter_expression"),
            (
                "/indicator/custom/good_event_filter_expression",
                "indicator.custom.good_event_filter_expression",
            ),
            (
                "/indicator/custom/bad_event_filter_expression",
                "indicator.custom.bad_event_filter_expression",
            ),
        ] {
            check_filter(config, pointer, path, &mut diagnostics);
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<SloConfig, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &SloConfig,
    ) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire)?)
    }
}
