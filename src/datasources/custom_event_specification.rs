//! Custom event specification lookup by name and entity type.

use serde_json::{json, Value};

use crate::datasource::{merge_into, required_string, DataSourceMetadata, LookupHandle, LookupKey};
use crate::error::ProviderError;
use crate::resources::custom_event_specification::CustomEventSpecification;
use crate::restapi::CUSTOM_EVENT_SPECIFICATIONS_PATH;
use crate::schema::{Attribute, Schema};

/// Data source name of custom event specifications.
pub const DATA_SOURCE_NAME: &str = "custom_event_specification";

fn data_source_schema() -> Schema {
    Schema::v0()
        .with_description("Looks up a custom event specification")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute(
            "entity_type",
            Attribute::required_string().with_description("The entity type the event applies to"),
        )
        .with_attribute("description", Attribute::computed_string())
        .with_attribute("query", Attribute::computed_string())
        .with_attribute("triggering", Attribute::computed_bool())
        .with_attribute("enabled", Attribute::computed_bool())
        .with_attribute("expiration_time", Attribute::computed_int64())
}

/// Lookup handle of custom event specifications.
pub struct CustomEventSpecificationDataSource {
    metadata: DataSourceMetadata,
}

impl CustomEventSpecificationDataSource {
    pub fn new() -> Self {
        Self {
            metadata: DataSourceMetadata::new(
                DATA_SOURCE_NAME,
                data_source_schema(),
                CUSTOM_EVENT_SPECIFICATIONS_PATH,
            ),
        }
    }
}

impl Default for CustomEventSpecificationDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupHandle for CustomEventSpecificationDataSource {
    type Wire = CustomEventSpecification;

    fn metadata(&self) -> &DataSourceMetadata {
        &self.metadata
    }

    fn lookup_key(&self, config: &Value) -> Result<LookupKey, ProviderError> {
        Ok(LookupKey::new()
            .exact("name", required_string(config, "name")?)
            .exact("entity_type", required_string(config, "entity_type")?))
    }

    fn candidate<'a>(&self, wire: &'a CustomEventSpecification, part: &str) -> Option<&'a str> {
        match part {
            "name" => Some(wire.name.as_str()),
            "entity_type" => Some(wire.entity_type.as_str()),
            _ => None,
        }
    }

    fn map_wire_to_state(
        &self,
        config: &Value,
        wire: &CustomEventSpecification,
    ) -> Result<Value, ProviderError> {
        Ok(merge_into(
            config,
            json!({
                "id": wire.id,
                "description": wire.description,
                "query": wire.query,
                "triggering": wire.triggering,
                "enabled": wire.enabled,
                "expiration_time": wire.expiration_time,
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

    fn specifications() -> Value {
        json!([
            {"id": "c1", "name": "High load", "entityType": "host", "enabled": true,
             "rules": [{"dType": "system", "severity": 5, "systemRuleId": "r1"}]},
            {"id": "c2", "name": "High load", "entityType": "jvm", "triggering": true,
             "description": "JVM load", "expirationTime": 60000, "query": "entity.zone:eu",
             "enabled": false, "ruleLogicalOperator": "OR", "rules": null}
        ])
    }

    #[tokio::test]
    async fn test_name_and_entity_type_must_match() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", CUSTOM_EVENT_SPECIFICATIONS_PATH, 200, specifications());
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let data_source = LookupDataSource::new(CustomEventSpecificationDataSource::new());

        let state = data_source
            .read(&client, json!({"name": "High load", "entity_type": "jvm"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "c2");
        assert_eq!(state["description"], "JVM load");
        assert_eq!(state["query"], "entity.zone:eu");
        assert_eq!(state["expiration_time"], 60000);
        assert_eq!(state["triggering"], true);
        assert_eq!(state["enabled"], false);

        let state = data_source
            .read(&client, json!({"name": "High load", "entity_type": "host"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "c1");
        assert_eq!(state["description"], Value::Null);
        assert_eq!(state["expiration_time"], Value::Null);
    }

    #[tokio::test]
    async fn test_name_is_case_sensitive() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", CUSTOM_EVENT_SPECIFICATIONS_PATH, 200, specifications());
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();

        let err = LookupDataSource::new(CustomEventSpecificationDataSource::new())
            .read(&client, json!({"name": "high load", "entity_type": "host"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
