//! Application perspectives: a labelled tag filter over calls, with the
//! downstream scope and the access rules granting visibility.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, APPLICATION_CONFIGS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::{from_state, nullable, to_state};
use crate::tagfilter;

use super::custom_dashboard::{AccessRule, AccessRuleState, ACCESS_TYPES, RELATION_TYPES};

/// Resource name of application configurations.
pub const RESOURCE_NAME: &str = "application_config";

/// Downstream services included in the application.
pub const SCOPES: [&str; 3] = [
    "INCLUDE_NO_DOWNSTREAM",
    "INCLUDE_IMMEDIATE_DOWNSTREAM_DATABASE_AND_MESSAGING",
    "INCLUDE_ALL_DOWNSTREAM",
];

/// Which calls count as entering the application.
pub const BOUNDARY_SCOPES: [&str; 3] = ["ALL", "INBOUND", "DEFAULT"];

const MAX_RELATED_ID_LENGTH: usize = 64;

/// An application configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub tag_filter_expression: Option<Value>,
    pub scope: String,
    pub boundary_scope: String,
    #[serde(default, deserialize_with = "nullable")]
    pub access_rules: Vec<AccessRule>,
}

impl WireModel for ApplicationConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Host state of an application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub label: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_boundary_scope")]
    pub boundary_scope: String,
    #[serde(default)]
    pub tag_filter: Option<String>,
    pub access_rules: Vec<AccessRuleState>,
}

fn default_scope() -> String {
    SCOPES[0].to_string()
}

fn default_boundary_scope() -> String {
    BOUNDARY_SCOPES[2].to_string()
}

pub fn state_to_wire(state: &ApplicationConfigState) -> Result<ApplicationConfig, ProviderError> {
    let tag_filter_expression = match state.tag_filter.as_deref() {
        Some(text) => tagfilter::text_to_wire(text)?,
        None => None,
    };
    Ok(ApplicationConfig {
        id: state.id.clone(),
        label: state.label.clone(),
        tag_filter_expression,
        scope: state.scope.clone(),
        boundary_scope: state.boundary_scope.clone(),
        access_rules: state
            .access_rules
            .iter()
            .map(|rule| AccessRule {
                access_type: rule.access_type.clone(),
                related_id: rule.related_id.clone().filter(|id| !id.is_empty()),
                relation_type: rule.relation_type.clone(),
            })
            .collect(),
    })
}

pub fn wire_to_state(wire: &ApplicationConfig) -> Result<ApplicationConfigState, ProviderError> {
    let tag_filter = match &wire.tag_filter_expression {
        Some(filter) => tagfilter::wire_to_text(filter)?,
        None => None,
    };
    Ok(ApplicationConfigState {
        id: wire.id.clone(),
        label: wire.label.clone(),
        scope: wire.scope.clone(),
        boundary_scope: wire.boundary_scope.clone(),
        tag_filter,
        access_rules: wire
            .access_rules
            .iter()
            .map(|rule| AccessRuleState {
                access_type: rule.access_type.clone(),
                related_id: rule.related_id.clone(),
                relation_type: rule.relation_type.clone(),
            })
            .collect(),
    })
}

fn resource_schema() -> Schema {
    let access_rule = Block::new()
        .with_attribute(
            "access_type",
            Attribute::required_string().with_allowed_values(ACCESS_TYPES),
        )
        .with_attribute("related_id", Attribute::optional_string())
        .with_attribute(
            "relation_type",
            Attribute::required_string().with_allowed_values(RELATION_TYPES),
        );
    let defaulted = |default: &str, allowed: &[&str]| {
        Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
            .with_default(Value::from(default))
            .with_allowed_values(allowed.iter().copied())
    };

    Schema::v0()
        .with_description("Application perspective")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("label", Attribute::required_string())
        .with_attribute("scope", defaulted(SCOPES[0], &SCOPES))
        .with_attribute("boundary_scope", defaulted(BOUNDARY_SCOPES[2], &BOUNDARY_SCOPES))
        .with_attribute(
            "tag_filter",
            Attribute::tag_filter_expression(AttributeFlags::optional_computed()),
        )
        .with_block("access_rules", NestedBlock::list(access_rule).with_min_items(1))
}

/// Resource handle of application configurations.
pub struct ApplicationConfigResource {
    metadata: ResourceMetadata,
}

impl ApplicationConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                APPLICATION_CONFIGS_PATH,
                WriteMode::PostPut,
            ),
        }
    }
}

impl Default for ApplicationConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for ApplicationConfigResource {
    type Wire = ApplicationConfig;

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
        let rules = config
            .get("access_rules")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();
        for (index, rule) in rules.enumerate() {
            let too_long = rule
                .get("related_id")
                .and_then(Value::as_str)
                .is_some_and(|id| id.chars().count() > MAX_RELATED_ID_LENGTH);
            if too_long {
                diagnostics.push(
                    Diagnostic::error("Value too long")
                        .with_detail(format!(
                            "related_id must not exceed {} characters",
                            MAX_RELATED_ID_LENGTH
                        ))
                        .with_attribute(format!("access_rules.{}.related_id", index)),
                );
            }
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<ApplicationConfig, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        prior: Option<&Value>,
        wire: &ApplicationConfig,
    ) -> Result<Value, ProviderError> {
        let mut state = wire_to_state(wire)?;
        let prior_filter = prior
            .and_then(|p| p.get("tag_filter"))
            .and_then(Value::as_str);
        if let (Some(prior_filter), Some(current)) = (prior_filter, state.tag_filter.as_deref()) {
            if tagfilter::equivalent(prior_filter, current) {
                state.tag_filter = Some(prior_filter.to_string());
            }
        }
        to_state(&state)
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
            "label": "shop",
            "tag_filter": "service.name@dest EQUALS 'checkout'",
            "access_rules": [{"access_type": "READ_WRITE", "relation_type": "GLOBAL"}]
        })
    }

    #[test]
    fn test_defaults_and_wire_shape() {
        let wire = ApplicationConfigResource::new()
            .map_state_to_wire(&planned())
            .unwrap();
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["scope"], "INCLUDE_NO_DOWNSTREAM");
        assert_eq!(json["boundaryScope"], "DEFAULT");
        assert_eq!(json["accessRules"], json!([{"accessType": "READ_WRITE", "relationType": "GLOBAL"}]));
        assert_eq!(json["tagFilterExpression"]["entity"], "DESTINATION");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_blank_related_id_is_dropped() {
        let mut state = planned();
        state["access_rules"] = json!([{"access_type": "READ", "relation_type": "USER", "related_id": ""}]);
        let wire = ApplicationConfigResource::new()
            .map_state_to_wire(&state)
            .unwrap();
        assert_eq!(wire.access_rules[0].related_id, None);
    }

    #[test]
    fn test_validate() {
        let resource = ApplicationConfigResource::new();
        assert!(resource.validate(&planned()).is_empty());
        let mut config = planned();
        config["access_rules"][0]["related_id"] = json!("x".repeat(65));
        config["tag_filter"] = json!("service.name EQUALS");
        let diagnostics = resource.validate(&config);
        let attributes: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert_eq!(attributes, vec!["tag_filter", "access_rules.0.related_id"]);
    }

    #[tokio::test]
    async fn test_create_post_update_put() {
        let server = MockInstanaServer::start().await;
        let response = json!({
            "id": "app1",
            "label": "shop",
            "tagFilterExpression": {
                "type": "TAG_FILTER",
                "name": "service.name",
                "entity": "DESTINATION",
                "operator": "EQUALS",
                "value": "checkout"
            },
            "scope": "INCLUDE_NO_DOWNSTREAM",
            "boundaryScope": "DEFAULT",
            "accessRules": [{"accessType": "READ_WRITE", "relationType": "GLOBAL", "relatedId": null}]
        });
        server.respond("POST", APPLICATION_CONFIGS_PATH, 200, response.clone());
        let path = format!("{}/app1", APPLICATION_CONFIGS_PATH);
        let mut renamed = response;
        renamed["label"] = json!("store");
        server.respond("PUT", &path, 200, renamed);
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let resource = ManagedResource::new(ApplicationConfigResource::new());

        let mut planned = planned();
        planned["tag_filter"] = json!("service.name@dest  EQUALS 'checkout'");
        let created = resource.create(&client, planned).await.unwrap();
        assert_eq!(created["id"], "app1");
        assert_eq!(created["tag_filter"], "service.name@dest  EQUALS 'checkout'");

        let mut update = created.clone();
        update["label"] = json!("store");
        let updated = resource.update(&client, created, update).await.unwrap();
        assert_eq!(updated["label"], "store");

        let requests = server.requests();
        assert_eq!(requests[1].method, "PUT");
        assert_eq!(requests[1].path, path);
    }
}
