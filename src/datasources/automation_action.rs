//! Automation action lookup by name and type.

use serde_json::{json, Value};

use crate::datasource::{merge_into, required_string, DataSourceMetadata, LookupHandle, LookupKey};
use crate::error::ProviderError;
use crate::resources::automation_action::AutomationAction;
use crate::restapi::AUTOMATION_ACTIONS_PATH;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Data source name of automation actions.
pub const DATA_SOURCE_NAME: &str = "automation_action";

fn data_source_schema() -> Schema {
    Schema::v0()
        .with_description("Looks up an automation action by name and type")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute(
            "type",
            Attribute::required_string()
                .with_description("The action type, compared ignoring case"),
        )
        .with_attribute("description", Attribute::computed_string())
        .with_attribute(
            "tags",
            Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::computed()),
        )
}

/// Lookup handle of automation actions.
pub struct AutomationActionDataSource {
    metadata: DataSourceMetadata,
}

impl AutomationActionDataSource {
    pub fn new() -> Self {
        Self {
            metadata: DataSourceMetadata::new(
                DATA_SOURCE_NAME,
                data_source_schema(),
                AUTOMATION_ACTIONS_PATH,
            ),
        }
    }
}

impl Default for AutomationActionDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupHandle for AutomationActionDataSource {
    type Wire = AutomationAction;

    fn metadata(&self) -> &DataSourceMetadata {
        &self.metadata
    }

    fn lookup_key(&self, config: &Value) -> Result<LookupKey, ProviderError> {
        Ok(LookupKey::new()
            .exact("name", required_string(config, "name")?)
            .case_insensitive("type", required_string(config, "type")?))
    }

    fn candidate<'a>(&self, wire: &'a AutomationAction, part: &str) -> Option<&'a str> {
        match part {
            "name" => Some(wire.name.as_str()),
            "type" => Some(wire.action_type.as_str()),
            _ => None,
        }
    }

    fn map_wire_to_state(&self, config: &Value, wire: &AutomationAction) -> Result<Value, ProviderError> {
        Ok(merge_into(
            config,
            json!({
                "id": wire.id,
                "type": wire.action_type,
                "description": wire.description,
                "tags": wire.tags,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{DataSource, LookupDataSource};
    use crate::restapi::{ClientConfig, RestClient};
    use crate::testing::MockInstanaServer;

    fn actions() -> Value {
        json!([
            {"id": "a1", "name": "restart", "type": "SCRIPT", "fields": []},
            {"id": "a2", "name": "restart", "type": "HTTP", "tags": ["ops", "web"], "fields": []},
            {"id": "a3", "name": "restart", "type": "HTTP", "fields": []}
        ])
    }

    #[tokio::test]
    async fn test_type_is_case_insensitive() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", AUTOMATION_ACTIONS_PATH, 200, actions());
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let data_source = LookupDataSource::new(AutomationActionDataSource::new());

        let state = data_source
            .read(&client, json!({"name": "restart", "type": "http"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "a2");
        assert_eq!(state["type"], "HTTP");
        assert_eq!(state["tags"], json!(["ops", "web"]));
        assert_eq!(state["name"], "restart");
    }

    #[tokio::test]
    async fn test_name_is_case_sensitive() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", AUTOMATION_ACTIONS_PATH, 200, actions());
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let data_source = LookupDataSource::new(AutomationActionDataSource::new());

        let err = data_source
            .read(&client, json!({"name": "Restart", "type": "SCRIPT"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_both_key_parts_required() {
        let err = AutomationActionDataSource::new()
            .lookup_key(&json!({"name": "restart"}))
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig(_)));
    }
}
