//! RBAC roles: named permission bundles assigned to users.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, ROLES_PATH};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::{from_state, nullable, to_state};

use super::group::{check_permissions, Member};

/// Resource name of roles.
pub const RESOURCE_NAME: &str = "role";

/// A role as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub members: Vec<Member>,
    #[serde(default, deserialize_with = "nullable")]
    pub permissions: Vec<String>,
}

impl WireModel for Role {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Host state of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub member: Option<Vec<RoleMemberState>>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMemberState {
    pub user_id: String,
}

pub fn state_to_wire(state: &RoleState) -> Role {
    Role {
        id: state.id.clone(),
        name: state.name.clone(),
        members: state
            .member
            .iter()
            .flatten()
            .map(|member| Member {
                user_id: member.user_id.clone(),
                email: None,
            })
            .collect(),
        permissions: state.permissions.clone().unwrap_or_default(),
    }
}

pub fn wire_to_state(wire: &Role) -> RoleState {
    RoleState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        member: (!wire.members.is_empty()).then(|| {
            wire.members
                .iter()
                .map(|member| RoleMemberState {
                    user_id: member.user_id.clone(),
                })
                .collect()
        }),
        permissions: (!wire.permissions.is_empty()).then(|| wire.permissions.clone()),
    }
}

fn resource_schema() -> Schema {
    Schema::v0()
        .with_description("RBAC role")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "name",
            Attribute::required_string().with_description("The name of the role"),
        )
        .with_attribute(
            "permissions",
            Attribute::optional_string_set().with_description("The permissions assigned to the role"),
        )
        .with_block(
            "member",
            NestedBlock::set(Block::new().with_attribute("user_id", Attribute::required_string())),
        )
}

/// Resource handle of roles.
pub struct RoleResource {
    metadata: ResourceMetadata,
}

impl RoleResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(RESOURCE_NAME, resource_schema(), ROLES_PATH, WriteMode::PostPut),
        }
    }
}

impl Default for RoleResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for RoleResource {
    type Wire = Role;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        check_permissions(config.get("permissions"), "permissions")
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<Role, ProviderError> {
        Ok(state_to_wire(&from_state(state)?))
    }

    fn map_wire_to_state(&self, _prior: Option<&Value>, wire: &Role) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire))
    }
}
