//! Host agents matching a dynamic focus query.
//!
//! Unlike the natural key lookups this returns the whole filtered list. The
//! identifier is the read timestamp, so every read yields a fresh result.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::datasource::{merge_into, required_string, DataSource, DataSourceMetadata};
use crate::error::ProviderError;
use crate::restapi::{QueryParams, RestClient, RestResource, WireModel, WriteMode, HOST_AGENTS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::shared::tags::deserialize_tags;

/// Data source name of host agents.
pub const DATA_SOURCE_NAME: &str = "host_agents";

const QUERY_PARAM: &str = "query";

/// A host agent as listed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostAgent {
    pub snapshot_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_tags",
        skip_serializing_if = "Option::is_none"
    )]
    pub tags: Option<Vec<String>>,
}

impl WireModel for HostAgent {
    fn id(&self) -> Option<&str> {
        Some(self.snapshot_id.as_str())
    }
}

fn data_source_schema() -> Schema {
    let item = Block::new()
        .with_attribute("snapshot_id", Attribute::computed_string())
        .with_attribute("label", Attribute::computed_string())
        .with_attribute("host", Attribute::computed_string())
        .with_attribute("plugin", Attribute::computed_string())
        .with_attribute(
            "tags",
            Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::computed()),
        );

    Schema::v0()
        .with_description("Lists the host agents matching a query")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "filter",
            Attribute::required_string().with_description("Dynamic focus query filter"),
        )
        .with_block("items", NestedBlock::list(item))
}

/// Query-based listing of host agents.
pub struct HostAgentsDataSource {
    metadata: DataSourceMetadata,
}

impl HostAgentsDataSource {
    pub fn new() -> Self {
        Self {
            metadata: DataSourceMetadata::new(DATA_SOURCE_NAME, data_source_schema(), HOST_AGENTS_PATH),
        }
    }
}

impl Default for HostAgentsDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for HostAgentsDataSource {
    fn metadata(&self) -> &DataSourceMetadata {
        &self.metadata
    }

    #[instrument(skip_all, fields(data_source = DATA_SOURCE_NAME))]
    async fn read(&self, client: &RestClient, config: Value) -> Result<Value, ProviderError> {
        let filter = required_string(&config, "filter")?;
        let mut query = QueryParams::new();
        query.insert(QUERY_PARAM.to_string(), filter);

        let resource: RestResource<HostAgent> =
            RestResource::new(client.clone(), self.metadata.path, WriteMode::ReadOnly);
        let agents = resource.get_by_query(&query).await?;
        debug!(data_source = DATA_SOURCE_NAME, agents = agents.len(), "Listed host agents");

        let items: Vec<Value> = agents
            .iter()
            .map(|agent| {
                json!({
                    "snapshot_id": agent.snapshot_id,
                    "label": agent.label,
                    "host": agent.host,
                    "plugin": agent.plugin,
                    "tags": agent.tags.clone().unwrap_or_default(),
                })
            })
            .collect();

        Ok(merge_into(
            &config,
            json!({
                "id": Utc::now().to_rfc3339(),
                "items": items,
            }),
        ))
    }
}
