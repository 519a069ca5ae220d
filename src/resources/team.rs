//! RBAC teams: members with roles and the scope of entities they may see.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, TEAMS_PATH};
use crate::schema::{Attribute, AttributeFlags, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::{from_state, to_state};
use crate::tagfilter;

/// Resource name of teams.
pub const RESOURCE_NAME: &str = "team";

/// Downstream scopes of a restricted application filter.
pub const RESTRICTED_APPLICATION_SCOPES: [&str; 3] = [
    "INCLUDE_NO_DOWNSTREAM",
    "INCLUDE_IMMEDIATE_DOWNSTREAM_DATABASE_AND_MESSAGING",
    "INCLUDE_ALL_DOWNSTREAM",
];

/// A team as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<TeamInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<TeamMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<TeamScope>,
}

impl WireModel for Team {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<TeamRole>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRole {
    pub role_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    #[serde(default, rename = "viaIdP", skip_serializing_if = "Option::is_none")]
    pub via_idp: Option<bool>,
}

/// Entities visible to team members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamScope {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kubernetes_clusters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kubernetes_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mobile_apps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub websites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra_dfq_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub business_perspectives: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slo_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synthetic_tests: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synthetic_credentials: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricted_application_filter: Option<RestrictedApplicationFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictedApplicationFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricting_application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<Value>,
}

// ============================================================================
// State model
// ============================================================================

/// Host state of a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamState {
    #[serde(default)]
    pub id: Option<String>,
    pub tag: String,
    #[serde(default)]
    pub info: Option<TeamInfoState>,
    #[serde(default)]
    pub member: Option<Vec<TeamMemberState>>,
    #[serde(default)]
    pub scope: Option<TeamScopeState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfoState {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMemberState {
    pub user_id: String,
    #[serde(default)]
    pub roles: Option<Vec<TeamMemberRoleState>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMemberRoleState {
    pub role_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamScopeState {
    #[serde(default)]
    pub access_permissions: Option<Vec<String>>,
    #[serde(default)]
    pub applications: Option<Vec<String>>,
    #[serde(default)]
    pub kubernetes_clusters: Option<Vec<String>>,
    #[serde(default)]
    pub kubernetes_namespaces: Option<Vec<String>>,
    #[serde(default)]
    pub mobile_apps: Option<Vec<String>>,
    #[serde(default)]
    pub websites: Option<Vec<String>>,
    #[serde(default)]
    pub infra_dfq_filter: Option<String>,
    #[serde(default)]
    pub action_filter: Option<String>,
    #[serde(default)]
    pub log_filter: Option<String>,
    #[serde(default)]
    pub business_perspectives: Option<Vec<String>>,
    #[serde(default)]
    pub slo_ids: Option<Vec<String>>,
    #[serde(default)]
    pub synthetic_tests: Option<Vec<String>>,
    #[serde(default)]
    pub synthetic_credentials: Option<Vec<String>>,
    #[serde(default)]
    pub tag_ids: Option<Vec<String>>,
    #[serde(default)]
    pub restricted_application_filter: Option<RestrictedApplicationFilterState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictedApplicationFilterState {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub tag_filter_expression: Option<String>,
}

fn list(values: &Option<Vec<String>>) -> Vec<String> {
    values.clone().unwrap_or_default()
}

fn optional_list(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

// ============================================================================
// Mapping
// ============================================================================

/// Encode state as the wire object.
pub fn state_to_wire(state: &TeamState) -> Result<Team, ProviderError> {
    let members = state
        .member
        .iter()
        .flatten()
        .map(|m| TeamMember {
            user_id: m.user_id.clone(),
            email: None,
            name: None,
            roles: m
                .roles
                .iter()
                .flatten()
                .map(|r| TeamRole {
                    role_id: r.role_id.clone(),
                    role_name: None,
                    via_idp: None,
                })
                .collect(),
        })
        .collect();

    let scope = match &state.scope {
        Some(scope) => Some(scope_to_wire(scope)?),
        None => None,
    };

    Ok(Team {
        id: state.id.clone(),
        tag: state.tag.clone(),
        info: state.info.as_ref().map(|i| TeamInfo {
            description: i.description.clone(),
        }),
        members,
        scope,
    })
}

fn scope_to_wire(scope: &TeamScopeState) -> Result<TeamScope, ProviderError> {
    let restricted_application_filter = match &scope.restricted_application_filter {
        Some(filter) => {
            let tag_filter_expression = match filter.tag_filter_expression.as_deref() {
                Some(text) => tagfilter::text_to_wire(text)?,
                None => None,
            };
            Some(RestrictedApplicationFilter {
                label: filter.label.clone(),
                restricting_application_id: None,
                scope: filter.scope.clone(),
                tag_filter_expression,
            })
        },
        None => None,
    };

    Ok(TeamScope {
        access_permissions: list(&scope.access_permissions),
        applications: list(&scope.applications),
        kubernetes_clusters: list(&scope.kubernetes_clusters),
        kubernetes_namespaces: list(&scope.kubernetes_namespaces),
        mobile_apps: list(&scope.mobile_apps),
        websites: list(&scope.websites),
        infra_dfq_filter: scope.infra_dfq_filter.clone(),
        action_filter: scope.action_filter.clone(),
        log_filter: scope.log_filter.clone(),
        business_perspectives: list(&scope.business_perspectives),
        slo_ids: list(&scope.slo_ids),
        synthetic_tests: list(&scope.synthetic_tests),
        synthetic_credentials: list(&scope.synthetic_credentials),
        tag_ids: list(&scope.tag_ids),
        restricted_application_filter,
    })
}

/// Decode the wire object. Server-side member details (email, name, role
/// names) are not kept in state.
pub fn wire_to_state(wire: &Team) -> Result<TeamState, ProviderError> {
    let member: Vec<TeamMemberState> = wire
        .members
        .iter()
        .map(|m| TeamMemberState {
            user_id: m.user_id.clone(),
            roles: (!m.roles.is_empty()).then(|| {
                m.roles
                    .iter()
                    .map(|r| TeamMemberRoleState {
                        role_id: r.role_id.clone(),
                    })
                    .collect()
            }),
        })
        .collect();

    let scope = match &wire.scope {
        Some(scope) => Some(scope_to_state(scope)?),
        None => None,
    };

    Ok(TeamState {
        id: wire.id.clone(),
        tag: wire.tag.clone(),
        info: wire
            .info
            .as_ref()
            .filter(|i| i.description.is_some())
            .map(|i| TeamInfoState {
                description: i.description.clone(),
            }),
        member: (!member.is_empty()).then_some(member),
        scope: scope.filter(|s| *s != TeamScopeState::default()),
    })
}

fn scope_to_state(scope: &TeamScope) -> Result<TeamScopeState, ProviderError> {
    let restricted_application_filter = match &scope.restricted_application_filter {
        Some(filter) => {
            let tag_filter_expression = match &filter.tag_filter_expression {
                Some(expression) => tagfilter::wire_to_text(expression)?,
                None => None,
            };
            Some(RestrictedApplicationFilterState {
                label: filter.label.clone(),
                scope: filter.scope.clone(),
                tag_filter_expression,
            })
        },
        None => None,
    };

    Ok(TeamScopeState {
        access_permissions: optional_list(&scope.access_permissions),
        applications: optional_list(&scope.applications),
        kubernetes_clusters: optional_list(&scope.kubernetes_clusters),
        kubernetes_namespaces: optional_list(&scope.kubernetes_namespaces),
        mobile_apps: optional_list(&scope.mobile_apps),
        websites: optional_list(&scope.websites),
        infra_dfq_filter: scope.infra_dfq_filter.clone(),
        action_filter: scope.action_filter.clone(),
        log_filter: scope.log_filter.clone(),
        business_perspectives: optional_list(&scope.business_perspectives),
        slo_ids: optional_list(&scope.slo_ids),
        synthetic_tests: optional_list(&scope.synthetic_tests),
        synthetic_credentials: optional_list(&scope.synthetic_credentials),
        tag_ids: optional_list(&scope.tag_ids),
        restricted_application_filter,
    })
}

fn resource_schema() -> Schema {
    let id_set = |description: &str| {
        Attribute::optional_string_set().with_description(description.to_string())
    };

    let restricted_application_filter = Block::new()
        .with_attribute("label", Attribute::optional_string())
        .with_attribute(
            "scope",
            Attribute::optional_string().with_allowed_values(RESTRICTED_APPLICATION_SCOPES),
        )
        .with_attribute(
            "tag_filter_expression",
            Attribute::tag_filter_expression(AttributeFlags::optional()),
        );

    let scope = Block::new()
        .with_description("The scope of entities visible to the team")
        .with_attribute("access_permissions", id_set("Permissions granted to members"))
        .with_attribute("applications", id_set("Application perspective ids"))
        .with_attribute("kubernetes_clusters", id_set("Kubernetes cluster ids"))
        .with_attribute("kubernetes_namespaces", id_set("Kubernetes namespace ids"))
        .with_attribute("mobile_apps", id_set("Mobile app ids"))
        .with_attribute("websites", id_set("Website ids"))
        .with_attribute(
            "infra_dfq_filter",
            Attribute::optional_string().with_description("Dynamic focus query over infrastructure"),
        )
        .with_attribute("action_filter", Attribute::optional_string())
        .with_attribute("log_filter", Attribute::optional_string())
        .with_attribute("business_perspectives", id_set("Business perspective ids"))
        .with_attribute("slo_ids", id_set("SLO ids"))
        .with_attribute("synthetic_tests", id_set("Synthetic test ids"))
        .with_attribute("synthetic_credentials", id_set("Synthetic credential names"))
        .with_attribute("tag_ids", id_set("Tag ids"))
        .with_block(
            "restricted_application_filter",
            NestedBlock::single(restricted_application_filter),
        );

    let member = Block::new()
        .with_attribute("user_id", Attribute::required_string())
        .with_block(
            "roles",
            NestedBlock::set(Block::new().with_attribute("role_id", Attribute::required_string())),
        );

    Schema::v0()
        .with_description("RBAC team")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "tag",
            Attribute::required_string().with_description("The name of the team"),
        )
        .with_block(
            "info",
            NestedBlock::single(
                Block::new().with_attribute("description", Attribute::optional_string()),
            ),
        )
        .with_block("member", NestedBlock::set(member))
        .with_block("scope", NestedBlock::single(scope))
}

/// Resource handle of teams.
pub struct TeamResource {
    metadata: ResourceMetadata,
}

impl TeamResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(RESOURCE_NAME, resource_schema(), TEAMS_PATH, WriteMode::PostPut),
        }
    }
}

impl Default for TeamResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for TeamResource {
    type Wire = Team;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let filter = config
            .get("scope")
            .and_then(|s| s.get("restricted_application_filter"))
            .and_then(|f| f.get("tag_filter_expression"))
            .and_then(Value::as_str);
        match filter.map(tagfilter::normalize) {
            Some(Err(e)) => vec![Diagnostic::error("Invalid tag filter expression")
                .with_detail(e.message())
                .with_attribute("scope.restricted_application_filter.tag_filter_expression")],
            _ => Vec::new(),
        }
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<Team, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(&self, _prior: Option<&Value>, wire: &Team) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire)?)
    }
}
