//! Alerting channel lookup by name.

use serde_json::Value;

use crate::datasource::{merge_into, required_string, DataSourceMetadata, LookupHandle, LookupKey};
use crate::error::ProviderError;
use crate::resources::alerting_channel::{wire_to_state, with_channel_blocks, AlertingChannel};
use crate::restapi::ALERTING_CHANNELS_PATH;
use crate::schema::{Attribute, Schema};
use crate::shared::to_state;

/// Data source name of alerting channels.
pub const DATA_SOURCE_NAME: &str = "alerting_channel";

fn data_source_schema() -> Schema {
    let mut schema = with_channel_blocks(
        Schema::v0()
            .with_description("Looks up an alerting channel by name")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string()),
    );
    // The channel blocks are results here, none of them is configured.
    schema.block.exactly_one_of.clear();
    schema
}

/// Lookup handle of alerting channels.
pub struct AlertingChannelDataSource {
    metadata: DataSourceMetadata,
}

impl AlertingChannelDataSource {
    pub fn new() -> Self {
        Self {
            metadata: DataSourceMetadata::new(
                DATA_SOURCE_NAME,
                data_source_schema(),
                ALERTING_CHANNELS_PATH,
            ),
        }
    }
}

impl Default for AlertingChannelDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupHandle for AlertingChannelDataSource {
    type Wire = AlertingChannel;

    fn metadata(&self) -> &DataSourceMetadata {
        &self.metadata
    }

    fn lookup_key(&self, config: &Value) -> Result<LookupKey, ProviderError> {
        Ok(LookupKey::new().exact("name", required_string(config, "name")?))
    }

    fn candidate<'a>(&self, wire: &'a AlertingChannel, part: &str) -> Option<&'a str> {
        match part {
            "name" => Some(wire.name.as_str()),
            _ => None,
        }
    }

    fn map_wire_to_state(&self, config: &Value, wire: &AlertingChannel) -> Result<Value, ProviderError> {
        Ok(merge_into(config, to_state(&wire_to_state(None, wire)?)?))
    }
}
