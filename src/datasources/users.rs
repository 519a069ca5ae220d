//! Users matching a list of email addresses.
//!
//! Emails are compared exactly. Unknown emails are skipped rather than
//! reported, so the result may be shorter than the input.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::user::User;
use crate::datasource::{merge_into, DataSource, DataSourceMetadata};
use crate::error::ProviderError;
use crate::restapi::{RestClient, RestResource, WriteMode, USERS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};

/// Data source name of the user listing.
pub const DATA_SOURCE_NAME: &str = "users";

fn data_source_schema() -> Schema {
    let user = Block::new()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("email", Attribute::computed_string())
        .with_attribute("full_name", Attribute::computed_string());

    Schema::v0()
        .with_description("Lists the users with the given emails")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "emails",
            Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::required()),
        )
        .with_block("users", NestedBlock::list(user))
}

fn requested_emails(config: &Value) -> Result<BTreeSet<String>, ProviderError> {
    let emails = config
        .get("emails")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::InvalidConfig("emails is required".to_string()))?;
    Ok(emails
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

/// Email-filtered listing of users.
pub struct UsersDataSource {
    metadata: DataSourceMetadata,
}

impl UsersDataSource {
    pub fn new() -> Self {
        Self {
            metadata: DataSourceMetadata::new(DATA_SOURCE_NAME, data_source_schema(), USERS_PATH),
        }
    }
}

impl Default for UsersDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for UsersDataSource {
    fn metadata(&self) -> &DataSourceMetadata {
        &self.metadata
    }

    #[instrument(skip_all, fields(data_source = DATA_SOURCE_NAME))]
    async fn read(&self, client: &RestClient, config: Value) -> Result<Value, ProviderError> {
        let emails = requested_emails(&config)?;

        let resource: RestResource<User> =
            RestResource::new(client.clone(), self.metadata.path, WriteMode::ReadOnly);
        let users: Vec<Value> = resource
            .get_all()
            .await?
            .into_iter()
            .filter(|user| emails.contains(&user.email))
            .map(|user| {
                json!({
                    "id": user.id,
                    "email": user.email,
                    "full_name": user.full_name,
                })
            })
            .collect();
        debug!(data_source = DATA_SOURCE_NAME, users = users.len(), "Matched users");

        Ok(merge_into(
            &config,
            json!({
                "id": format!("users-{}", users.len()),
                "users": users,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restapi::ClientConfig;
    use crate::testing::MockInstanaServer;

    #[tokio::test]
    async fn test_filters_by_email() {
        let server = MockInstanaServer::start().await;
        server.respond(
            "GET",
            USERS_PATH,
            200,
            json!([
                {"id": "u1", "email": "a@example.com", "fullName": "A"},
                {"id": "u2", "email": "b@example.com", "fullName": "B"},
                {"id": "u3", "email": "C@example.com", "fullName": "C"}
            ]),
        );
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();

        let config = json!({"emails": ["b@example.com", "c@example.com", "missing@example.com"]});
        let state = UsersDataSource::new().read(&client, config).await.unwrap();
        assert_eq!(state["id"], "users-1");
        assert_eq!(
            state["users"],
            json!([{"id": "u2", "email": "b@example.com", "full_name": "B"}])
        );
        assert_eq!(state["emails"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_emails_required() {
        let server = MockInstanaServer::start().await;
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let err = UsersDataSource::new()
            .read(&client, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig(_)));
        assert!(server.requests().is_empty());
    }
}
