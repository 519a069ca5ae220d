//! Custom dashboards: a title, access rules and the widget layout as JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, CUSTOM_DASHBOARDS_PATH};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::{from_state, nullable, to_state};

/// Resource name of custom dashboards.
pub const RESOURCE_NAME: &str = "custom_dashboard";

/// Access granted by a rule.
pub const ACCESS_TYPES: [&str; 2] = ["READ", "READ_WRITE"];

/// Kinds of principal an access rule refers to.
pub const RELATION_TYPES: [&str; 5] = ["USER", "API_TOKEN", "ROLE", "TEAM", "GLOBAL"];

/// A custom dashboard as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDashboard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub access_rules: Vec<AccessRule>,
    #[serde(default)]
    pub widgets: Value,
}

impl WireModel for CustomDashboard {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    pub access_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    pub relation_type: String,
}

/// Host state of a custom dashboard. Widgets are kept as a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDashboardState {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub access_rule: Option<Vec<AccessRuleState>>,
    pub widgets: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRuleState {
    pub access_type: String,
    #[serde(default)]
    pub related_id: Option<String>,
    pub relation_type: String,
}

fn parse_widgets(widgets: &str) -> Result<Value, String> {
    let value: Value = serde_json::from_str(widgets).map_err(|e| e.to_string())?;
    if !value.is_array() {
        return Err("widgets must be a JSON array".to_string());
    }
    Ok(value)
}

pub fn state_to_wire(state: &CustomDashboardState) -> Result<CustomDashboard, ProviderError> {
    let widgets = parse_widgets(&state.widgets)
        .map_err(|e| ProviderError::InvalidConfig(format!("widgets: {}", e)))?;
    Ok(CustomDashboard {
        id: state.id.clone(),
        title: state.title.clone(),
        access_rules: state
            .access_rule
            .iter()
            .flatten()
            .map(|rule| AccessRule {
                access_type: rule.access_type.clone(),
                related_id: rule.related_id.clone().filter(|id| !id.trim().is_empty()),
                relation_type: rule.relation_type.clone(),
            })
            .collect(),
        widgets,
    })
}

/// Decode the wire object. Widgets keep the prior document text when it is
/// semantically equal to the server's, so formatting never shows as a change.
pub fn wire_to_state(
    prior: Option<&CustomDashboardState>,
    wire: &CustomDashboard,
) -> Result<CustomDashboardState, ProviderError> {
    let unchanged = prior
        .and_then(|p| serde_json::from_str::<Value>(&p.widgets).ok().map(|v| (p, v)))
        .filter(|(_, widgets)| *widgets == wire.widgets);
    let widgets = match unchanged {
        Some((prior, _)) => prior.widgets.clone(),
        None => serde_json::to_string(&wire.widgets)?,
    };

    Ok(CustomDashboardState {
        id: wire.id.clone(),
        title: wire.title.clone(),
        access_rule: (!wire.access_rules.is_empty()).then(|| {
            wire.access_rules
                .iter()
                .map(|rule| AccessRuleState {
                    access_type: rule.access_type.clone(),
                    related_id: rule.related_id.clone(),
                    relation_type: rule.relation_type.clone(),
                })
                .collect()
        }),
        widgets,
    })
}

fn resource_schema() -> Schema {
    let access_rule = Block::new()
        .with_attribute(
            "access_type",
            Attribute::required_string().with_allowed_values(ACCESS_TYPES),
        )
        .with_attribute(
            "related_id",
            Attribute::optional_string()
                .with_description("The user, token, role or team the rule applies to"),
        )
        .with_attribute(
            "relation_type",
            Attribute::required_string().with_allowed_values(RELATION_TYPES),
        );

    Schema::v0()
        .with_description("Custom dashboard")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("title", Attribute::required_string())
        .with_attribute(
            "widgets",
            Attribute::required_string().with_description("JSON array of the dashboard widgets"),
        )
        .with_block("access_rule", NestedBlock::list(access_rule).with_min_items(1))
}

/// Resource handle of custom dashboards.
pub struct CustomDashboardResource {
    metadata: ResourceMetadata,
}

impl CustomDashboardResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                CUSTOM_DASHBOARDS_PATH,
                WriteMode::PostPut,
            ),
        }
    }
}

impl Default for CustomDashboardResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for CustomDashboardResource {
    type Wire = CustomDashboard;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if let Some(Err(e)) = config.get("widgets").and_then(Value::as_str).map(parse_widgets) {
            diagnostics.push(
                Diagnostic::error("Invalid widgets")
                    .with_detail(e)
                    .with_attribute("widgets"),
            );
        }

        let rules = config
            .get("access_rule")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();
        for (index, rule) in rules.enumerate() {
            let global = rule.get("relation_type").and_then(Value::as_str) == Some("GLOBAL");
            let related = rule
                .get("related_id")
                .and_then(Value::as_str)
                .is_some_and(|id| !id.trim().is_empty());
            if !global && !related {
                diagnostics.push(
                    Diagnostic::error("Missing related id")
                        .with_detail("only GLOBAL access rules may omit related_id")
                        .with_attribute(format!("access_rule.{}.related_id", index)),
                );
            }
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<CustomDashboard, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        prior: Option<&Value>,
        wire: &CustomDashboard,
    ) -> Result<Value, ProviderError> {
        let prior: Option<CustomDashboardState> = prior.map(from_state).transpose()?;
        to_state(&wire_to_state(prior.as_ref(), wire)?)
    }
}
