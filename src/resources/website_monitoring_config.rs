//! Website monitoring configurations. The API takes the name as a query
//! parameter and computes the app name.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, WEBSITE_MONITORING_CONFIGS_PATH};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::shared::{from_state, to_state};

/// Resource name of website monitoring configurations.
pub const RESOURCE_NAME: &str = "website_monitoring_config";

/// A website monitoring configuration as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteMonitoringConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
}

impl WireModel for WebsiteMonitoringConfig {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteMonitoringConfigState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub app_name: Option<String>,
}

fn resource_schema() -> Schema {
    Schema::v0()
        .with_description("Website monitoring configuration")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute(
            "app_name",
            Attribute::computed_string().with_description("App name derived by the server"),
        )
}

/// Resource handle of website monitoring configurations.
pub struct WebsiteMonitoringConfigResource {
    metadata: ResourceMetadata,
}

impl WebsiteMonitoringConfigResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                WEBSITE_MONITORING_CONFIGS_PATH,
                WriteMode::ByQuery,
            ),
        }
    }
}

impl Default for WebsiteMonitoringConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for WebsiteMonitoringConfigResource {
    type Wire = WebsiteMonitoringConfig;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let blank = config
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| name.trim().is_empty());
        if blank {
            return vec![Diagnostic::error("Invalid name")
                .with_detail("name must not be blank")
                .with_attribute("name")];
        }
        Vec::new()
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<WebsiteMonitoringConfig, ProviderError> {
        let state: WebsiteMonitoringConfigState = from_state(state)?;
        Ok(WebsiteMonitoringConfig {
            id: state.id,
            name: state.name,
            app_name: None,
        })
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &WebsiteMonitoringConfig,
    ) -> Result<Value, ProviderError> {
        to_state(&WebsiteMonitoringConfigState {
            id: wire.id.clone(),
            name: wire.name.clone(),
            app_name: wire.app_name.clone().filter(|name| !name.is_empty()),
        })
    }
}
