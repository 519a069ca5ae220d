//! Synthetic location lookup by label, optionally narrowed by location type.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::datasource::{
    merge_into, optional_string, required_string, DataSourceMetadata, LookupHandle, LookupKey,
};
use crate::error::ProviderError;
use crate::restapi::{WireModel, SYNTHETIC_LOCATIONS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Data source name of synthetic locations.
pub const DATA_SOURCE_NAME: &str = "synthetic_location";

/// A synthetic test location as listed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location_type: String,
}

impl WireModel for SyntheticLocation {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

fn data_source_schema() -> Schema {
    Schema::v0()
        .with_description("Looks up a synthetic test location")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("label", Attribute::required_string())
        .with_attribute(
            "location_type",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                .with_allowed_values(["Private", "Public"]),
        )
        .with_attribute("description", Attribute::computed_string())
}

/// Lookup handle of synthetic locations.
pub struct SyntheticLocationDataSource {
    metadata: DataSourceMetadata,
}

impl SyntheticLocationDataSource {
    pub fn new() -> Self {
        Self {
            metadata: DataSourceMetadata::new(
                DATA_SOURCE_NAME,
                data_source_schema(),
                SYNTHETIC_LOCATIONS_PATH,
            ),
        }
    }
}

impl Default for SyntheticLocationDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupHandle for SyntheticLocationDataSource {
    type Wire = SyntheticLocation;

    fn metadata(&self) -> &DataSourceMetadata {
        &self.metadata
    }

    fn lookup_key(&self, config: &Value) -> Result<LookupKey, ProviderError> {
        let key = LookupKey::new().exact("label", required_string(config, "label")?);
        Ok(match optional_string(config, "location_type") {
            Some(location_type) => key.exact("location_type", location_type),
            None => key,
        })
    }

    fn candidate<'a>(&self, wire: &'a SyntheticLocation, part: &str) -> Option<&'a str> {
        match part {
            "label" => Some(wire.label.as_str()),
            "location_type" => Some(wire.location_type.as_str()),
            _ => None,
        }
    }

    fn map_wire_to_state(&self, config: &Value, wire: &SyntheticLocation) -> Result<Value, ProviderError> {
        Ok(merge_into(
            config,
            json!({
                "id": wire.id,
                "label": wire.label,
                "description": wire.description,
                "location_type": wire.location_type,
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

    fn locations() -> Value {
        json!([
            {"id": "l1", "label": "Frankfurt", "locationType": "Public", "description": "eu"},
            {"id": "l2", "label": "Frankfurt", "locationType": "Private", "description": "pop"}
        ])
    }

    #[tokio::test]
    async fn test_label_only_returns_first() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", SYNTHETIC_LOCATIONS_PATH, 200, locations());
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let data_source = LookupDataSource::new(SyntheticLocationDataSource::new());

        let state = data_source
            .read(&client, json!({"label": "Frankfurt"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "l1");
        assert_eq!(state["location_type"], "Public");
    }

    #[tokio::test]
    async fn test_location_type_narrows_match() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", SYNTHETIC_LOCATIONS_PATH, 200, locations());
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let data_source = LookupDataSource::new(SyntheticLocationDataSource::new());

        let state = data_source
            .read(&client, json!({"label": "Frankfurt", "location_type": "Private"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "l2");
        assert_eq!(state["description"], "pop");
    }
}
