//! RBAC groups: members and the permission set granted to them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, GROUPS_PATH};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::{from_state, nullable, to_state};

/// Resource name of groups.
pub const RESOURCE_NAME: &str = "group";

/// Scope role the API expects on an unrestricted infrastructure filter.
const UNRESTRICTED_SCOPE_ROLE: &str = "-1";

/// Permissions a group or role can grant.
pub const PERMISSIONS: [&str; 58] = [
    "CAN_CONFIGURE_APPLICATIONS",
    "CAN_CONFIGURE_EUM_APPLICATIONS",
    "CAN_CONFIGURE_AGENTS",
    "CAN_VIEW_TRACE_DETAILS",
    "CAN_VIEW_LOGS",
    "CAN_CONFIGURE_SESSION_SETTINGS",
    "CAN_CONFIGURE_INTEGRATIONS",
    "CAN_CONFIGURE_GLOBAL_APPLICATION_SMART_ALERTS",
    "CAN_CONFIGURE_GLOBAL_SYNTHETIC_SMART_ALERTS",
    "CAN_CONFIGURE_GLOBAL_INFRA_SMART_ALERTS",
    "CAN_CONFIGURE_GLOBAL_LOG_SMART_ALERTS",
    "CAN_CONFIGURE_GLOBAL_ALERT_PAYLOAD",
    "CAN_CONFIGURE_MOBILE_APP_MONITORING",
    "CAN_CONFIGURE_API_TOKENS",
    "CAN_CONFIGURE_SERVICE_LEVEL_INDICATORS",
    "CAN_CONFIGURE_AUTHENTICATION_METHODS",
    "CAN_CONFIGURE_RELEASES",
    "CAN_VIEW_AUDIT_LOG",
    "CAN_CONFIGURE_EVENTS_AND_ALERTS",
    "CAN_CONFIGURE_MAINTENANCE_WINDOWS",
    "CAN_CONFIGURE_APPLICATION_SMART_ALERTS",
    "CAN_CONFIGURE_WEBSITE_SMART_ALERTS",
    "CAN_CONFIGURE_MOBILE_APP_SMART_ALERTS",
    "CAN_CONFIGURE_AGENT_RUN_MODE",
    "CAN_CONFIGURE_SERVICE_MAPPING",
    "CAN_EDIT_ALL_ACCESSIBLE_CUSTOM_DASHBOARDS",
    "CAN_CONFIGURE_USERS",
    "CAN_INSTALL_NEW_AGENTS",
    "CAN_CONFIGURE_TEAMS",
    "CAN_CREATE_PUBLIC_CUSTOM_DASHBOARDS",
    "CAN_CONFIGURE_LOG_MANAGEMENT",
    "CAN_VIEW_ACCOUNT_AND_BILLING_INFORMATION",
    "CAN_VIEW_SYNTHETIC_TESTS",
    "CAN_VIEW_SYNTHETIC_LOCATIONS",
    "CAN_CREATE_THREAD_DUMP",
    "CAN_CREATE_HEAP_DUMP",
    "CAN_CONFIGURE_DATABASE_MANAGEMENT",
    "CAN_CONFIGURE_LOG_RETENTION_PERIOD",
    "CAN_CONFIGURE_PERSONAL_API_TOKENS",
    "ACCESS_INFRASTRUCTURE_ANALYZE",
    "CAN_VIEW_LOG_VOLUME",
    "CAN_RUN_AUTOMATION_ACTIONS",
    "CAN_VIEW_SYNTHETIC_TEST_RESULTS",
    "CAN_INVOKE_ALERT_CHANNEL",
    "CAN_MANUALLY_CLOSE_ISSUE",
    "CAN_DELETE_LOGS",
    "CAN_CONFIGURE_SYNTHETIC_TESTS",
    "CAN_VIEW_BUSINESS_PROCESS_DETAILS",
    "CAN_VIEW_BIZOPS_ALERTS",
    "CAN_USE_SYNTHETIC_CREDENTIALS",
    "CAN_DELETE_AUTOMATION_ACTION_HISTORY",
    "CAN_CONFIGURE_SYNTHETIC_LOCATIONS",
    "CAN_CONFIGURE_SYNTHETIC_CREDENTIALS",
    "CAN_CONFIGURE_SUBTRACES",
    "CAN_CONFIGURE_LLM",
    "CAN_CONFIGURE_BIZOPS",
    "CAN_CONFIGURE_AUTOMATION_POLICIES",
    "CAN_CONFIGURE_AUTOMATION_ACTIONS",
];

/// A group as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub members: Vec<Member>,
    #[serde(default)]
    pub permission_set: PermissionSet,
}

impl WireModel for Group {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// A user bound to a group or role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeBinding {
    pub scope_id: String,
    #[serde(default)]
    pub scope_role_id: Option<String>,
}

impl ScopeBinding {
    fn scope(scope_id: &str) -> Self {
        Self {
            scope_id: scope_id.to_string(),
            scope_role_id: None,
        }
    }
}

// Scope lists are always sent, empty when unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSet {
    #[serde(default, deserialize_with = "nullable")]
    pub application_ids: Vec<ScopeBinding>,
    #[serde(default)]
    pub infra_dfq_filter: Option<ScopeBinding>,
    #[serde(default, rename = "kubernetesClusterUUIDs", deserialize_with = "nullable")]
    pub kubernetes_cluster_uuids: Vec<ScopeBinding>,
    #[serde(default, rename = "kubernetesNamespaceUIDs", deserialize_with = "nullable")]
    pub kubernetes_namespace_uids: Vec<ScopeBinding>,
    #[serde(default, deserialize_with = "nullable")]
    pub mobile_app_ids: Vec<ScopeBinding>,
    #[serde(default, deserialize_with = "nullable")]
    pub website_ids: Vec<ScopeBinding>,
    #[serde(default, deserialize_with = "nullable")]
    pub permissions: Vec<String>,
}

impl PermissionSet {
    fn infra_filter(&self) -> Option<&str> {
        self.infra_dfq_filter
            .as_ref()
            .map(|binding| binding.scope_id.as_str())
            .filter(|scope| !scope.is_empty())
    }

    fn is_empty(&self) -> bool {
        self.application_ids.is_empty()
            && self.kubernetes_cluster_uuids.is_empty()
            && self.kubernetes_namespace_uids.is_empty()
            && self.mobile_app_ids.is_empty()
            && self.website_ids.is_empty()
            && self.permissions.is_empty()
            && self.infra_filter().is_none()
    }
}

/// Host state of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub member: Option<Vec<MemberState>>,
    #[serde(default)]
    pub permission_set: Option<PermissionSetState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberState {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSetState {
    #[serde(default)]
    pub application_ids: Option<Vec<String>>,
    #[serde(default)]
    pub infra_dfq_filter: Option<String>,
    #[serde(default)]
    pub kubernetes_cluster_uuids: Option<Vec<String>>,
    #[serde(default)]
    pub kubernetes_namespaces_uuids: Option<Vec<String>>,
    #[serde(default)]
    pub mobile_app_ids: Option<Vec<String>>,
    #[serde(default)]
    pub website_ids: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

fn bindings(ids: &Option<Vec<String>>) -> Vec<ScopeBinding> {
    ids.iter().flatten().map(|id| ScopeBinding::scope(id)).collect()
}

fn scope_ids(bindings: &[ScopeBinding]) -> Option<Vec<String>> {
    (!bindings.is_empty()).then(|| bindings.iter().map(|b| b.scope_id.clone()).collect())
}

pub(crate) fn members_to_wire(members: &Option<Vec<MemberState>>) -> Vec<Member> {
    members
        .iter()
        .flatten()
        .map(|member| Member {
            user_id: member.user_id.clone(),
            email: member.email.clone(),
        })
        .collect()
}

pub(crate) fn members_to_state(members: &[Member]) -> Option<Vec<MemberState>> {
    (!members.is_empty()).then(|| {
        members
            .iter()
            .map(|member| MemberState {
                user_id: member.user_id.clone(),
                email: member.email.clone().filter(|e| !e.is_empty()),
            })
            .collect()
    })
}

pub fn state_to_wire(state: &GroupState) -> Group {
    let set = state.permission_set.clone().unwrap_or_default();
    let infra_dfq_filter = match &set.infra_dfq_filter {
        Some(query) => ScopeBinding::scope(query),
        None => ScopeBinding {
            scope_id: String::new(),
            scope_role_id: Some(UNRESTRICTED_SCOPE_ROLE.to_string()),
        },
    };
    Group {
        id: state.id.clone(),
        name: state.name.clone(),
        members: members_to_wire(&state.member),
        permission_set: PermissionSet {
            application_ids: bindings(&set.application_ids),
            infra_dfq_filter: Some(infra_dfq_filter),
            kubernetes_cluster_uuids: bindings(&set.kubernetes_cluster_uuids),
            kubernetes_namespace_uids: bindings(&set.kubernetes_namespaces_uuids),
            mobile_app_ids: bindings(&set.mobile_app_ids),
            website_ids: bindings(&set.website_ids),
            permissions: set.permissions.unwrap_or_default(),
        },
    }
}

pub fn wire_to_state(wire: &Group) -> GroupState {
    let set = &wire.permission_set;
    let permission_set = (!set.is_empty()).then(|| PermissionSetState {
        application_ids: scope_ids(&set.application_ids),
        infra_dfq_filter: set.infra_filter().map(str::to_string),
        kubernetes_cluster_uuids: scope_ids(&set.kubernetes_cluster_uuids),
        kubernetes_namespaces_uuids: scope_ids(&set.kubernetes_namespace_uids),
        mobile_app_ids: scope_ids(&set.mobile_app_ids),
        website_ids: scope_ids(&set.website_ids),
        permissions: (!set.permissions.is_empty()).then(|| set.permissions.clone()),
    });
    GroupState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        member: members_to_state(&wire.members),
        permission_set,
    }
}

/// Diagnostics for permissions outside [`PERMISSIONS`].
pub(crate) fn check_permissions(permissions: Option<&Value>, attribute: &str) -> Vec<Diagnostic> {
    permissions
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter(|permission| !PERMISSIONS.contains(permission))
        .map(|permission| {
            Diagnostic::error("Unsupported permission")
                .with_detail(format!("{} is not a known permission", permission))
                .with_attribute(attribute)
        })
        .collect()
}

fn resource_schema() -> Schema {
    let id_set = |description: &str| {
        Attribute::optional_string_set().with_description(description.to_string())
    };

    let permission_set = Block::new()
        .with_description("The permission set of the group")
        .with_attribute("application_ids", id_set("Application perspectives visible to members"))
        .with_attribute(
            "infra_dfq_filter",
            Attribute::optional_string()
                .with_description("Dynamic focus query restricting infrastructure access"),
        )
        .with_attribute("kubernetes_cluster_uuids", id_set("Kubernetes clusters"))
        .with_attribute("kubernetes_namespaces_uuids", id_set("Kubernetes namespaces"))
        .with_attribute("mobile_app_ids", id_set("Mobile apps"))
        .with_attribute("website_ids", id_set("Websites"))
        .with_attribute("permissions", id_set("Permissions granted to members"));

    let member = Block::new()
        .with_attribute("user_id", Attribute::required_string())
        .with_attribute("email", Attribute::optional_string());

    Schema::v0()
        .with_description("RBAC group")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "name",
            Attribute::required_string().with_description("The name of the group"),
        )
        .with_block("member", NestedBlock::set(member))
        .with_block("permission_set", NestedBlock::single(permission_set))
}

/// Resource handle of groups.
pub struct GroupResource {
    metadata: ResourceMetadata,
}

impl GroupResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                GROUPS_PATH,
                WriteMode::PostPut,
            ),
        }
    }
}

impl Default for GroupResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for GroupResource {
    type Wire = Group;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        check_permissions(
            config
                .get("permission_set")
                .and_then(|set| set.get("permissions")),
            "permission_set.permissions",
        )
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<Group, ProviderError> {
        Ok(state_to_wire(&from_state(state)?))
    }

    fn map_wire_to_state(&self, _prior: Option<&Value>, wire: &Group) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire))
    }
}
