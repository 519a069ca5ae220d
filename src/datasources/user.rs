//! User lookup by email address.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::datasource::{merge_into, required_string, DataSourceMetadata, LookupHandle, LookupKey};
use crate::error::ProviderError;
use crate::restapi::{WireModel, USERS_PATH};
use crate::schema::{Attribute, Schema};

/// Data source name of users.
pub const DATA_SOURCE_NAME: &str = "user";

/// A user as listed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_logged_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tfa_enabled: Option<bool>,
}

impl WireModel for User {
    fn id(&self) -> Option<&str> {
        Some(self.id.as_str())
    }
}

fn data_source_schema() -> Schema {
    Schema::v0()
        .with_description("Looks up a user by email")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "email",
            Attribute::required_string().with_description("Compared ignoring case"),
        )
        .with_attribute("full_name", Attribute::computed_string())
}

/// Lookup handle of users.
pub struct UserDataSource {
    metadata: DataSourceMetadata,
}

impl UserDataSource {
    pub fn new() -> Self {
        Self {
            metadata: DataSourceMetadata::new(DATA_SOURCE_NAME, data_source_schema(), USERS_PATH),
        }
    }
}

impl Default for UserDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupHandle for UserDataSource {
    type Wire = User;

    fn metadata(&self) -> &DataSourceMetadata {
        &self.metadata
    }

    fn lookup_key(&self, config: &Value) -> Result<LookupKey, ProviderError> {
        Ok(LookupKey::new().case_insensitive("email", required_string(config, "email")?))
    }

    fn candidate<'a>(&self, wire: &'a User, part: &str) -> Option<&'a str> {
        match part {
            "email" => Some(wire.email.as_str()),
            _ => None,
        }
    }

    fn map_wire_to_state(&self, config: &Value, wire: &User) -> Result<Value, ProviderError> {
        Ok(merge_into(
            config,
            json!({"id": wire.id, "full_name": wire.full_name}),
        ))
    }
}
