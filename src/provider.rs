//! The Instana provider as driven by the host runtime.
//!
//! [`InstanaProvider`] owns the resource and data source registries and the
//! REST client built by `configure`. Every entity operation is dispatched by
//! name to the registered handle; planning is done here because it is the
//! same for every resource.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::config::ProviderConfig;
use crate::datasource::DataSource;
use crate::datasources;
use crate::error::ProviderError;
use crate::resourcehandle::Resource;
use crate::resources;
use crate::restapi::RestClient;
use crate::schema::{
    has_errors, Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, ProviderSchema,
};
use crate::service::ProviderService;
use crate::tagfilter;
use crate::types::{AttributeChange, ImportedResource, PlanResult};
use crate::validation;

/// Provider for the Instana configuration API.
pub struct InstanaProvider {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
    client: RwLock<Option<RestClient>>,
}

impl InstanaProvider {
    /// Create an unconfigured provider with every resource and data source
    /// registered.
    pub fn new() -> Self {
        Self {
            resources: resources::registry(),
            data_sources: datasources::registry(),
            client: RwLock::new(None),
        }
    }

    fn resource(&self, resource_type: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources.get(resource_type).ok_or_else(|| {
            ProviderError::UnknownResource(format!("Unknown resource type: {}", resource_type))
        })
    }

    fn data_source(&self, data_source_type: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources.get(data_source_type).ok_or_else(|| {
            ProviderError::UnknownResource(format!(
                "Unknown data source type: {}",
                data_source_type
            ))
        })
    }

    async fn client(&self) -> Result<RestClient, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("Provider has not been configured".to_string())
        })
    }
}

impl Default for InstanaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderService for InstanaProvider {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        let schema = self
            .resources
            .iter()
            .fold(schema, |schema, (name, resource)| {
                schema.with_resource(*name, resource.metadata().schema.clone())
            });
        self.data_sources
            .iter()
            .fold(schema, |schema, (name, data_source)| {
                schema.with_data_source(*name, data_source.metadata().schema.clone())
            })
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(ProviderConfig::from_value(config)?.validate())
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let parsed = ProviderConfig::from_value(config)?;
        let diagnostics = parsed.validate();
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let client = RestClient::new(parsed.to_client_config()?)?;
        let base_url = client.base_url().to_string();
        let previous = self.client.write().await.replace(client);
        if let Some(previous) = previous {
            debug!("Shutting down previous client");
            previous.shutdown().await;
        }

        info!(base_url = %base_url, "Configured Instana provider");
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        let client = self.client.write().await.take();
        if let Some(client) = client {
            client.shutdown().await;
            info!("Stopped Instana provider");
        }
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validation::validate(&resource.metadata().schema, &config);
        diagnostics.extend(resource.validate(&config));
        Ok(diagnostics)
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.resource(resource_type)?.upgrade_state(version, state)
    }

    #[instrument(skip_all, fields(resource = resource_type))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let block = &resource.metadata().schema.block;
        let prior_state = prior_state.filter(|prior| !prior.is_null());

        if proposed_state.is_null() {
            return Ok(match prior_state {
                Some(prior) => PlanResult::with_changes(Value::Null, removals(&prior), false),
                None => PlanResult::no_change(Value::Null),
            });
        }

        let mut planned = proposed_state;
        block.normalize_single_blocks(&mut planned);
        apply_defaults(block, &mut planned);
        if let Some(prior) = &prior_state {
            carry_computed(block, prior, &mut planned);
        }
        resource.prepare_plan(prior_state.as_ref(), &mut planned)?;

        let Some(prior) = prior_state else {
            let changes = additions(&planned);
            debug!(changes = changes.len(), "Planned create");
            return Ok(PlanResult::with_changes(planned, changes, false));
        };

        let mut prior = prior;
        block.normalize_single_blocks(&mut prior);
        let (changes, requires_replace) = diff(block, &prior, &mut planned);
        debug!(changes = changes.len(), requires_replace, "Planned update");
        if changes.is_empty() {
            return Ok(PlanResult::no_change(planned));
        }
        Ok(PlanResult::with_changes(planned, changes, requires_replace))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.create(&client, planned_state).await
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.read(&client, current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.update(&client, prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.delete(&client, current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let state = resource.import(&client, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let mut diagnostics = validation::validate(&data_source.metadata().schema, &config);
        diagnostics.extend(data_source.validate(&config));
        Ok(diagnostics)
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;
        data_source.read(&client, config).await
    }
}

// =========================================================================
// Planning helpers
// =========================================================================

fn apply_defaults(block: &Block, planned: &mut Value) {
    let Value::Object(map) = planned else {
        return;
    };
    for (name, attribute) in &block.attributes {
        let Some(default) = &attribute.default else {
            continue;
        };
        if is_unset(map, name) {
            map.insert(name.clone(), default.clone());
        }
    }
}

/// Keep prior values of computed attributes the configuration leaves unset.
fn carry_computed(block: &Block, prior: &Value, planned: &mut Value) {
    let Value::Object(map) = planned else {
        return;
    };
    for (name, attribute) in &block.attributes {
        if !attribute.flags.computed || !is_unset(map, name) {
            continue;
        }
        if let Some(value) = prior.get(name).filter(|v| !v.is_null()) {
            map.insert(name.clone(), value.clone());
        }
    }
}

fn additions(planned: &Value) -> Vec<AttributeChange> {
    object_entries(planned)
        .filter(|(_, value)| !is_absent(value))
        .map(|(name, value)| AttributeChange::added(name.clone(), value.clone()))
        .collect()
}

fn removals(prior: &Value) -> Vec<AttributeChange> {
    object_entries(prior)
        .filter(|(_, value)| !is_absent(value))
        .map(|(name, value)| AttributeChange::removed(name.clone(), value.clone()))
        .collect()
}

/// Compare prior and planned state attribute by attribute. Values that are
/// equivalent but spelled differently keep their prior form in the plan.
fn diff(block: &Block, prior: &Value, planned: &mut Value) -> (Vec<AttributeChange>, bool) {
    let mut names: BTreeSet<String> = object_entries(prior).map(|(name, _)| name.clone()).collect();
    names.extend(object_entries(planned).map(|(name, _)| name.clone()));

    let mut changes = Vec::new();
    let mut requires_replace = false;
    let Value::Object(planned_map) = planned else {
        return (changes, requires_replace);
    };

    for name in names {
        let before = prior.get(&name).cloned().unwrap_or(Value::Null);
        let after = planned_map.get(&name).cloned().unwrap_or(Value::Null);
        let attribute = block.attributes.get(&name);

        if equivalent(block, attribute, &name, &before, &after) {
            if before != after && !before.is_null() {
                planned_map.insert(name, before);
            }
            continue;
        }

        requires_replace |= attribute.is_some_and(|a| a.force_new);
        changes.push(match (is_absent(&before), is_absent(&after)) {
            (true, _) => AttributeChange::added(name, after),
            (false, true) => AttributeChange::removed(name, before),
            (false, false) => AttributeChange::modified(name, before, after),
        });
    }
    (changes, requires_replace)
}

fn equivalent(
    block: &Block,
    attribute: Option<&Attribute>,
    name: &str,
    before: &Value,
    after: &Value,
) -> bool {
    if is_absent(before) && is_absent(after) {
        return true;
    }
    if let Some(attribute) = attribute {
        if attribute.tag_filter {
            if let (Some(left), Some(right)) = (before.as_str(), after.as_str()) {
                return tagfilter::equivalent(left, right);
            }
        }
        if matches!(attribute.attr_type, AttributeType::Set(_)) {
            return same_elements(before, after);
        }
    }
    let is_set_block = block
        .blocks
        .get(name)
        .is_some_and(|nested| nested.nesting_mode == BlockNestingMode::Set);
    if is_set_block {
        return same_elements(before, after);
    }
    before == after
}

/// Order-insensitive comparison of two arrays.
fn same_elements(before: &Value, after: &Value) -> bool {
    match (before.as_array(), after.as_array()) {
        (Some(left), Some(right)) => {
            let mut left: Vec<String> = left.iter().map(Value::to_string).collect();
            let mut right: Vec<String> = right.iter().map(Value::to_string).collect();
            left.sort();
            right.sort();
            left == right
        },
        _ => before == after,
    }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn is_unset(map: &Map<String, Value>, name: &str) -> bool {
    map.get(name).map_or(true, Value::is_null)
}

fn object_entries(value: &Value) -> impl Iterator<Item = (&String, &Value)> {
    value.as_object().into_iter().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restapi::{ROLES_PATH, TEAMS_PATH, USERS_PATH};
    use crate::testing::{
        assert_plan_changes_attribute, assert_plan_creates, assert_plan_has_changes,
        assert_plan_no_changes, assert_plan_replaces, MockInstanaServer, ProviderTester,
    };
    use serde_json::json;

    async fn configured(server: &MockInstanaServer) -> ProviderTester<InstanaProvider> {
        let tester = ProviderTester::new(InstanaProvider::new());
        tester
            .configure(json!({"api_token": "token", "host": server.url()}))
            .await
            .unwrap();
        tester
    }

    #[test]
    fn test_schema_lists_every_entity() {
        let provider = InstanaProvider::new();
        let schema = provider.schema();
        assert_eq!(schema.resources.len(), resources::registry().len());
        assert!(schema.resources.contains_key("team"));
        assert!(schema.resources.contains_key("infra_alert_config"));
        assert!(schema.data_sources.contains_key("user"));
        assert!(schema.data_sources.contains_key("host_agents"));
        assert!(schema.provider.block.attributes.contains_key("api_token"));

        let metadata = provider.metadata();
        assert_eq!(metadata.data_sources.len(), 8);
    }

    #[tokio::test]
    async fn test_validate_provider_config() {
        let provider = InstanaProvider::new();
        let diagnostics = provider
            .validate_provider_config(json!({"api_token": "token", "host": "tenant.instana.io"}))
            .await
            .unwrap();
        assert!(!has_errors(&diagnostics));

        let diagnostics = provider
            .validate_provider_config(json!({
                "api_token": "token",
                "host": "tenant.instana.io",
                "throttle_rate_writes_per_second": 0,
            }))
            .await
            .unwrap();
        assert!(has_errors(&diagnostics));
    }

    #[tokio::test]
    async fn test_configure_reports_invalid_settings() {
        let provider = InstanaProvider::new();
        let diagnostics = provider
            .configure(json!({"api_token": "token", "host": "tenant.instana.io", "queue_capacity": 0}))
            .await
            .unwrap();
        assert!(has_errors(&diagnostics));
        let err = provider.delete("team", json!({"id": "t1"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_operations_require_configuration() {
        let provider = InstanaProvider::new();
        let err = tokio_test::assert_err!(provider.create("team", json!({"tag": "sre"})).await);
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_names() {
        let provider = InstanaProvider::new();
        let err = provider.read("nope", json!({"id": "x"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
        let err = provider.read_data_source("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_create_and_read_team() {
        let server = MockInstanaServer::start().await;
        let team = json!({"id": "t1", "tag": "sre", "members": [{"userId": "u1"}]});
        server.respond("POST", TEAMS_PATH, 200, team.clone());
        server.respond("GET", &format!("{}/t1", TEAMS_PATH), 200, team);
        let tester = configured(&server).await;

        let state = tester
            .lifecycle_create("team", json!({"tag": "sre", "member": [{"user_id": "u1"}]}))
            .await
            .unwrap();
        assert_eq!(state["id"], "t1");
        assert_eq!(state["tag"], "sre");
        assert_eq!(server.requests_to("POST", TEAMS_PATH).len(), 1);
    }

    #[tokio::test]
    async fn test_import_returns_single_resource() {
        let server = MockInstanaServer::start().await;
        server.respond(
            "GET",
            &format!("{}/t2", TEAMS_PATH),
            200,
            json!({"id": "t2", "tag": "dba"}),
        );
        let tester = configured(&server).await;

        let imported = tokio_test::assert_ok!(tester.import_resource("team", "t2").await);
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, "team");
        assert_eq!(imported[0].state["tag"], "dba");
    }

    #[tokio::test]
    async fn test_read_data_source() {
        let server = MockInstanaServer::start().await;
        server.respond(
            "GET",
            USERS_PATH,
            200,
            json!([{"id": "u1", "email": "ops@example.com", "fullName": "Ops"}]),
        );
        let tester = configured(&server).await;

        let state = tester
            .read_data_source("user", json!({"email": "OPS@example.com"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "u1");
    }

    #[tokio::test]
    async fn test_plan_create_applies_defaults() {
        let tester = ProviderTester::new(InstanaProvider::new());
        let plan = tester
            .plan_create("infra_alert_config", json!({"name": "cpu"}))
            .await
            .unwrap();
        assert_plan_creates(&plan);
        assert_eq!(plan.planned_state["granularity"], 900000);
    }

    #[tokio::test]
    async fn test_plan_ignores_tag_filter_formatting() {
        let tester = ProviderTester::new(InstanaProvider::new());
        let prior = json!({
            "id": "ia1",
            "name": "cpu",
            "granularity": 600000,
            "tag_filter": "a EQUALS 'x' AND b NOT_EMPTY",
        });
        let plan = tester
            .plan_update(
                "infra_alert_config",
                prior,
                json!({
                    "name": "cpu",
                    "granularity": 600000,
                    "tag_filter": "a EQUALS 'x' and (b NOT_EMPTY)",
                }),
            )
            .await
            .unwrap();
        assert_plan_no_changes(&plan);
        assert_eq!(plan.planned_state["tag_filter"], "a EQUALS 'x' AND b NOT_EMPTY");
        assert_eq!(plan.planned_state["id"], "ia1");
    }

    #[tokio::test]
    async fn test_plan_detects_modification() {
        let tester = ProviderTester::new(InstanaProvider::new());
        let plan = tester
            .plan_update(
                "infra_alert_config",
                json!({"id": "ia1", "name": "cpu", "granularity": 600000}),
                json!({"name": "memory", "granularity": 600000}),
            )
            .await
            .unwrap();
        assert_plan_has_changes(&plan);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "name");
        assert!(!plan.requires_replace);
    }

    #[tokio::test]
    async fn test_plan_replaces_on_force_new_change() {
        let tester = ProviderTester::new(InstanaProvider::new());
        let plan = tester
            .plan_update(
                "alerting_config",
                json!({"id": "ac1", "alert_name": "a", "event_filter_event_types": ["incident"]}),
                json!({"alert_name": "a", "event_filter_event_types": ["critical"]}),
            )
            .await
            .unwrap();
        assert_plan_replaces(&plan);
        assert_plan_changes_attribute(&plan, "event_filter_event_types");
    }

    #[tokio::test]
    async fn test_role_lifecycle() {
        let server = MockInstanaServer::start().await;
        let item = format!("{}/r1", ROLES_PATH);
        server.respond("POST", ROLES_PATH, 200, json!({"id": "r1", "name": "readers"}));
        server.respond("PUT", &item, 200, Value::Null);
        server.respond(
            "GET",
            &item,
            200,
            json!({"id": "r1", "name": "readers", "permissions": ["CAN_CONFIGURE_TEAMS"]}),
        );
        server.respond("DELETE", &item, 204, Value::Null);
        let tester = configured(&server).await;

        let state = tester
            .lifecycle_crud(
                "role",
                json!({"name": "readers"}),
                json!({"name": "readers", "permissions": ["CAN_CONFIGURE_TEAMS"]}),
            )
            .await
            .unwrap();
        assert_eq!(state["permissions"], json!(["CAN_CONFIGURE_TEAMS"]));

        let methods: Vec<_> = server.requests().into_iter().map(|r| r.method).collect();
        assert_eq!(methods, vec!["POST", "GET", "PUT", "GET", "DELETE"]);
        assert_eq!(
            server.requests_to("PUT", &item)[0].json(),
            json!({"id": "r1", "name": "readers", "members": [], "permissions": ["CAN_CONFIGURE_TEAMS"]})
        );
    }

    #[tokio::test]
    async fn test_read_existing_reports_missing_entity() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", &format!("{}/gone", ROLES_PATH), 404, Value::Null);
        let tester = configured(&server).await;

        let err = tester
            .read_existing("role", json!({"id": "gone", "name": "x"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_and_delete_lifecycles() {
        let server = MockInstanaServer::start().await;
        let item = format!("{}/t1", TEAMS_PATH);
        server.respond("PUT", &item, 200, Value::Null);
        server.respond("GET", &item, 200, json!({"id": "t1", "tag": "platform"}));
        server.respond("DELETE", &item, 404, Value::Null);
        let tester = configured(&server).await;

        let state = tester
            .lifecycle_update(
                "team",
                json!({"id": "t1", "tag": "sre"}),
                json!({"tag": "platform"}),
            )
            .await
            .unwrap();
        assert_eq!(state["tag"], "platform");
        assert_eq!(server.requests_to("PUT", &item)[0].json()["tag"], "platform");

        tester.lifecycle_delete("team", state).await.unwrap();
        assert_eq!(server.requests_to("DELETE", &item).len(), 1);
    }

    #[tokio::test]
    async fn test_plan_delete() {
        let tester = ProviderTester::new(InstanaProvider::new());
        let plan = tester
            .plan_delete("team", json!({"id": "t1", "tag": "sre"}))
            .await
            .unwrap();
        assert!(plan.planned_state.is_null());
        assert_eq!(plan.changes.len(), 2);
    }

    #[test]
    fn test_same_elements_ignores_order() {
        assert!(same_elements(&json!(["b", "a"]), &json!(["a", "b"])));
        assert!(!same_elements(&json!(["a"]), &json!(["a", "b"])));
    }

    #[tokio::test]
    async fn test_stop_drops_client() {
        let server = MockInstanaServer::start().await;
        let tester = configured(&server).await;
        tester.stop().await.unwrap();
        let err = tester.provider().read("team", json!({"id": "t1"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
