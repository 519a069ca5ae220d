//! Generic CRUD orchestration over typed entities.
//!
//! Every managed entity implements [`ResourceHandle`]: metadata, a typed
//! REST view and the two mapping directions between host state and the wire
//! model. [`ManagedResource`] composes a handle with the REST client into the
//! object-safe [`Resource`] the provider registers by name, so the CRUD
//! algorithm is written once for every entity.

mod upgrade;

pub use upgrade::{rename_attribute, unwrap_single_blocks, upgrade_state, StateUpgrader};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::ProviderError;
use crate::restapi::{RestClient, RestResource, WireModel, WriteMode};
use crate::schema::{Diagnostic, Schema};

/// Default state attribute holding the identifier.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Static description of a managed entity.
#[derive(Debug, Clone)]
pub struct ResourceMetadata {
    /// Stable resource name used by the host.
    pub name: &'static str,
    /// Declarative schema; its version drives state upgrades.
    pub schema: Schema,
    /// REST resource path.
    pub path: &'static str,
    /// How the entity is created and updated.
    pub write_mode: WriteMode,
    /// When false, a random identifier is assigned before create.
    pub skip_id_generation: bool,
    /// State attribute holding the identifier, when not `id`.
    pub resource_id_field: Option<&'static str>,
}

impl ResourceMetadata {
    /// Describe an entity whose identifier is assigned by the server.
    pub fn new(
        name: &'static str,
        schema: Schema,
        path: &'static str,
        write_mode: WriteMode,
    ) -> Self {
        Self {
            name,
            schema,
            path,
            write_mode,
            skip_id_generation: true,
            resource_id_field: None,
        }
    }

    /// Let the framework assign the identifier before create.
    pub fn with_id_generation(mut self) -> Self {
        self.skip_id_generation = false;
        self
    }

    /// Read the identifier from `field` instead of `id`.
    pub fn with_resource_id_field(mut self, field: &'static str) -> Self {
        self.resource_id_field = Some(field);
        self
    }

    /// The state attribute holding the identifier.
    pub fn id_field(&self) -> &'static str {
        self.resource_id_field.unwrap_or(DEFAULT_ID_FIELD)
    }

    /// The current schema version.
    pub fn version(&self) -> u64 {
        self.schema.version
    }
}

/// Entity specific behavior plugged into the generic CRUD orchestration.
pub trait ResourceHandle: Send + Sync + 'static {
    /// Wire model exchanged with the resource path.
    type Wire: WireModel;

    /// Name, schema, version and REST binding of the entity.
    fn metadata(&self) -> &ResourceMetadata;

    /// Typed CRUD view bound to the entity's path.
    fn rest_resource(&self, client: &RestClient) -> RestResource<Self::Wire> {
        let metadata = self.metadata();
        RestResource::new(client.clone(), metadata.path, metadata.write_mode)
    }

    /// Fill computed values that are known before apply.
    fn set_computed_fields(&self, plan: &mut Value) -> Result<(), ProviderError> {
        let _ = plan;
        Ok(())
    }

    /// Entity checks beyond the schema, run at validation time.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Produce the wire object for a planned or current state.
    fn map_state_to_wire(&self, state: &Value) -> Result<Self::Wire, ProviderError>;

    /// Produce state from a wire object. `prior` is the planned or current
    /// state when one exists and supplies values the server never returns.
    fn map_wire_to_state(
        &self,
        prior: Option<&Value>,
        wire: &Self::Wire,
    ) -> Result<Value, ProviderError>;

    /// Migrations from older schema versions.
    fn state_upgraders(&self) -> Vec<StateUpgrader> {
        Vec::new()
    }
}

/// Object-safe view of a managed entity, as registered by the provider.
#[async_trait]
pub trait Resource: Send + Sync {
    // =========================================================================
    // Description
    // =========================================================================

    /// Static description of the entity.
    fn metadata(&self) -> &ResourceMetadata;

    /// Entity checks beyond the schema.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;

    // =========================================================================
    // Planning
    // =========================================================================

    /// Complete a planned state: generated identifier and computed fields.
    fn prepare_plan(&self, prior: Option<&Value>, plan: &mut Value) -> Result<(), ProviderError>;

    /// Bring state persisted at `version` up to the current schema.
    fn upgrade_state(&self, version: u64, state: Value) -> Result<Value, ProviderError>;

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create the entity and return the server-refreshed state.
    async fn create(&self, client: &RestClient, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state. `None` means the entity is gone.
    async fn read(&self, client: &RestClient, state: Value) -> Result<Option<Value>, ProviderError>;

    /// Update the entity and return the server-refreshed state.
    async fn update(
        &self,
        client: &RestClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the entity. An entity that is already gone counts as deleted.
    async fn delete(&self, client: &RestClient, state: Value) -> Result<(), ProviderError>;

    /// Build state for an existing entity from its identifier.
    async fn import(&self, client: &RestClient, id: &str) -> Result<Value, ProviderError>;
}

/// Generic CRUD orchestration for one [`ResourceHandle`].
pub struct ManagedResource<H> {
    handle: H,
}

impl<H: ResourceHandle> ManagedResource<H> {
    /// Wrap a handle.
    pub fn new(handle: H) -> Self {
        Self { handle }
    }

    /// The wrapped handle.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    fn id_of(&self, state: &Value) -> Result<String, ProviderError> {
        let metadata = self.handle.metadata();
        state
            .get(metadata.id_field())
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::InvalidConfig(format!(
                    "Resource ID of {} is missing",
                    metadata.name
                ))
            })
    }

    fn ensure_id(&self, plan: &mut Value) {
        let field = self.handle.metadata().id_field();
        if has_string(plan, field) {
            return;
        }
        if let Value::Object(map) = plan {
            let id = uuid::Uuid::new_v4().to_string();
            debug!(resource = self.handle.metadata().name, id = %id, "Generated identifier");
            map.insert(field.to_string(), Value::String(id));
        }
    }
}

#[async_trait]
impl<H: ResourceHandle> Resource for ManagedResource<H> {
    fn metadata(&self) -> &ResourceMetadata {
        self.handle.metadata()
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        self.handle.validate(config)
    }

    fn prepare_plan(&self, prior: Option<&Value>, plan: &mut Value) -> Result<(), ProviderError> {
        let metadata = self.handle.metadata();
        match prior {
            Some(prior) => carry_identifiers(prior, plan, metadata.id_field()),
            None if !metadata.skip_id_generation => self.ensure_id(plan),
            None => {},
        }
        self.handle.set_computed_fields(plan)
    }

    fn upgrade_state(&self, version: u64, state: Value) -> Result<Value, ProviderError> {
        let metadata = self.handle.metadata();
        upgrade_state(
            metadata.name,
            &self.handle.state_upgraders(),
            version,
            metadata.version(),
            state,
        )
    }

    #[instrument(skip_all, fields(resource = self.handle.metadata().name))]
    async fn create(&self, client: &RestClient, planned: Value) -> Result<Value, ProviderError> {
        let mut planned = planned;
        self.handle
            .metadata()
            .schema
            .block
            .normalize_single_blocks(&mut planned);
        if !self.handle.metadata().skip_id_generation {
            self.ensure_id(&mut planned);
        }
        self.handle.set_computed_fields(&mut planned)?;

        let wire = self.handle.map_state_to_wire(&planned)?;
        let created = self.handle.rest_resource(client).create(&wire).await?;
        let state = self.handle.map_wire_to_state(Some(&planned), &created)?;

        info!(
            resource = self.handle.metadata().name,
            id = created.id().unwrap_or_default(),
            "Created resource"
        );
        Ok(state)
    }

    #[instrument(skip_all, fields(resource = self.handle.metadata().name))]
    async fn read(&self, client: &RestClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let id = self.id_of(&state)?;
        match self.handle.rest_resource(client).get_one(&id).await {
            Ok(wire) => {
                debug!(resource = self.handle.metadata().name, id = %id, "Read resource");
                self.handle.map_wire_to_state(Some(&state), &wire).map(Some)
            },
            Err(err) if err.is_not_found() => {
                info!(
                    resource = self.handle.metadata().name,
                    id = %id,
                    "Resource no longer exists, removing from state"
                );
                Ok(None)
            },
            Err(err) => Err(err),
        }
    }

    #[instrument(skip_all, fields(resource = self.handle.metadata().name))]
    async fn update(
        &self,
        client: &RestClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let mut planned = planned;
        self.handle
            .metadata()
            .schema
            .block
            .normalize_single_blocks(&mut planned);
        carry_identifiers(&prior, &mut planned, self.handle.metadata().id_field());
        let id = self.id_of(&planned)?;

        let wire = self.handle.map_state_to_wire(&planned)?;
        let updated = self.handle.rest_resource(client).update(&wire).await?;
        let state = self.handle.map_wire_to_state(Some(&planned), &updated)?;

        info!(resource = self.handle.metadata().name, id = %id, "Updated resource");
        Ok(state)
    }

    #[instrument(skip_all, fields(resource = self.handle.metadata().name))]
    async fn delete(&self, client: &RestClient, state: Value) -> Result<(), ProviderError> {
        let id = self.id_of(&state)?;
        match self.handle.rest_resource(client).delete_by_id(&id).await {
            Ok(()) => {
                info!(resource = self.handle.metadata().name, id = %id, "Deleted resource");
                Ok(())
            },
            Err(err) if err.is_not_found() => {
                info!(
                    resource = self.handle.metadata().name,
                    id = %id,
                    "Resource already deleted"
                );
                Ok(())
            },
            Err(err) => Err(err),
        }
    }

    #[instrument(skip_all, fields(resource = self.handle.metadata().name, id = id))]
    async fn import(&self, client: &RestClient, id: &str) -> Result<Value, ProviderError> {
        let wire = self.handle.rest_resource(client).get_one(id).await?;
        let state = self.handle.map_wire_to_state(None, &wire)?;
        info!(resource = self.handle.metadata().name, id = id, "Imported resource");
        Ok(state)
    }
}

/// Copy the identifier attributes of `prior` into `plan` where the plan
/// leaves them unset.
fn carry_identifiers(prior: &Value, plan: &mut Value, id_field: &str) {
    let Value::Object(map) = plan else {
        return;
    };
    for field in [DEFAULT_ID_FIELD, id_field] {
        let planned_set = map
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|v| !v.is_empty());
        if planned_set {
            continue;
        }
        if let Some(value) = prior.get(field).filter(|v| !v.is_null()) {
            map.insert(field.to_string(), value.clone());
        }
    }
}

fn has_string(value: &Value, field: &str) -> bool {
    value
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|v| !v.is_empty())
}

/// Read a string attribute of a state, treating blank strings as unset.
pub fn string_attr(state: &Value, field: &str) -> Option<String> {
    state
        .get(field)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restapi::ClientConfig;
    use crate::schema::Attribute;
    use crate::testing::MockInstanaServer;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    const PATH: &str = "/api/settings/rbac/teams";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Team {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        tag: String,
    }

    impl WireModel for Team {
        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }
    }

    struct TeamHandle {
        metadata: ResourceMetadata,
    }

    impl TeamHandle {
        fn new(mode: WriteMode) -> Self {
            Self {
                metadata: ResourceMetadata::new(
                    "team",
                    Schema::new(1)
                        .with_attribute("id", Attribute::computed_string())
                        .with_attribute("tag", Attribute::required_string()),
                    PATH,
                    mode,
                ),
            }
        }
    }

    impl ResourceHandle for TeamHandle {
        type Wire = Team;

        fn metadata(&self) -> &ResourceMetadata {
            &self.metadata
        }

        fn map_state_to_wire(&self, state: &Value) -> Result<Team, ProviderError> {
            Ok(Team {
                id: string_attr(state, "id"),
                tag: string_attr(state, "tag")
                    .ok_or_else(|| ProviderError::InvalidConfig("tag is required".to_string()))?,
            })
        }

        fn map_wire_to_state(&self, _prior: Option<&Value>, wire: &Team) -> Result<Value, ProviderError> {
            Ok(json!({"id": wire.id, "tag": wire.tag}))
        }

        fn state_upgraders(&self) -> Vec<StateUpgrader> {
            vec![StateUpgrader::new(0, |s| rename_attribute(s, "label", "tag"))]
        }
    }

    fn client(server: &MockInstanaServer) -> RestClient {
        RestClient::new(ClientConfig::new("token", server.url())).unwrap()
    }

    #[tokio::test]
    async fn test_create_refreshes_state_from_server() {
        let server = MockInstanaServer::start().await;
        server.respond("POST", PATH, 200, json!({"id": "t1", "tag": "SRE"}));
        let resource = ManagedResource::new(TeamHandle::new(WriteMode::PostPut));

        let state = resource
            .create(&client(&server), json!({"tag": "sre"}))
            .await
            .unwrap();

        assert_eq!(state, json!({"id": "t1", "tag": "SRE"}));
        assert_eq!(server.requests()[0].json(), json!({"tag": "sre"}));
    }

    #[tokio::test]
    async fn test_create_with_generated_id() {
        let server = MockInstanaServer::start().await;
        let mut handle = TeamHandle::new(WriteMode::PutPut);
        handle.metadata = handle.metadata.with_id_generation();
        let resource = ManagedResource::new(handle);

        let mut plan = json!({"tag": "sre"});
        resource.prepare_plan(None, &mut plan).unwrap();
        let id = plan["id"].as_str().unwrap().to_string();
        assert_eq!(id.len(), 36);

        let path = format!("{}/{}", PATH, id);
        server.respond("PUT", &path, 200, json!({"id": id, "tag": "sre"}));

        let state = resource.create(&client(&server), plan).await.unwrap();
        assert_eq!(state["id"], json!(id));
        assert_eq!(server.requests_to("PUT", &path).len(), 1);
    }

    #[tokio::test]
    async fn test_read_not_found_drops_state() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", "/api/settings/rbac/teams/gone", 404, Value::Null);
        let resource = ManagedResource::new(TeamHandle::new(WriteMode::PostPut));

        let state = resource
            .read(&client(&server), json!({"id": "gone", "tag": "sre"}))
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_read_transport_error_is_surfaced() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", "/api/settings/rbac/teams/t1", 500, json!({"errors": ["boom"]}));
        let resource = ManagedResource::new(TeamHandle::new(WriteMode::PostPut));

        let err = resource
            .read(&client(&server), json!({"id": "t1", "tag": "sre"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
        assert!(err.message().contains("boom"));
    }

    #[tokio::test]
    async fn test_read_requires_id() {
        let server = MockInstanaServer::start().await;
        let resource = ManagedResource::new(TeamHandle::new(WriteMode::PostPut));

        let err = resource
            .read(&client(&server), json!({"tag": "sre"}))
            .await
            .unwrap_err();
        assert!(err.message().contains("Resource ID of team is missing"));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_update_carries_prior_id() {
        let server = MockInstanaServer::start().await;
        server.respond("PUT", "/api/settings/rbac/teams/t1", 200, json!({"id": "t1", "tag": "platform"}));
        let resource = ManagedResource::new(TeamHandle::new(WriteMode::PostPut));

        let state = resource
            .update(
                &client(&server),
                json!({"id": "t1", "tag": "sre"}),
                json!({"tag": "platform"}),
            )
            .await
            .unwrap();

        assert_eq!(state, json!({"id": "t1", "tag": "platform"}));
        assert_eq!(
            server.requests()[0].json(),
            json!({"id": "t1", "tag": "platform"})
        );
    }

    #[tokio::test]
    async fn test_delete_absorbs_not_found() {
        let server = MockInstanaServer::start().await;
        server.respond("DELETE", "/api/settings/rbac/teams/t1", 404, Value::Null);
        server.respond("DELETE", "/api/settings/rbac/teams/t2", 500, Value::Null);
        let resource = ManagedResource::new(TeamHandle::new(WriteMode::PostPut));
        let client = client(&server);

        resource
            .delete(&client, json!({"id": "t1", "tag": "sre"}))
            .await
            .unwrap();
        let err = resource
            .delete(&client, json!({"id": "t2", "tag": "sre"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[tokio::test]
    async fn test_import_never_fabricates_state() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", "/api/settings/rbac/teams/t1", 200, json!({"id": "t1", "tag": "sre"}));
        server.respond("GET", "/api/settings/rbac/teams/missing", 404, Value::Null);
        let resource = ManagedResource::new(TeamHandle::new(WriteMode::PostPut));
        let client = client(&server);

        let state = resource.import(&client, "t1").await.unwrap();
        assert_eq!(state, json!({"id": "t1", "tag": "sre"}));

        let err = resource.import(&client, "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_upgrade_state_uses_handle_upgraders() {
        let resource = ManagedResource::new(TeamHandle::new(WriteMode::PostPut));
        let state = resource
            .upgrade_state(0, json!({"id": "t1", "label": "sre"}))
            .unwrap();
        assert_eq!(state, json!({"id": "t1", "tag": "sre"}));
    }

    #[test]
    fn test_prepare_plan_keeps_prior_id() {
        let mut handle = TeamHandle::new(WriteMode::PutPut);
        handle.metadata = handle.metadata.with_id_generation();
        let resource = ManagedResource::new(handle);

        let mut plan = json!({"tag": "sre"});
        resource
            .prepare_plan(Some(&json!({"id": "existing", "tag": "x"})), &mut plan)
            .unwrap();
        assert_eq!(plan["id"], "existing");
    }

    #[test]
    fn test_metadata_id_field() {
        let metadata = ResourceMetadata::new("api_token", Schema::v0(), "/p", WriteMode::PutPut)
            .with_resource_id_field("internal_id");
        assert_eq!(metadata.id_field(), "internal_id");
        assert!(metadata.skip_id_generation);
    }
}
