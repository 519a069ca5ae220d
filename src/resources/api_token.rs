//! API tokens and the permissions they grant.
//!
//! The token is addressed by its client-generated `internal_id`; the
//! access granting token itself is generated client-side as well and is
//! treated as a secret.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, API_TOKENS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Resource name of API tokens.
pub const RESOURCE_NAME: &str = "api_token";

/// State attribute addressing the token.
pub const INTERNAL_ID_FIELD: &str = "internal_id";

const ACCESS_GRANTING_TOKEN_FIELD: &str = "access_granting_token";

/// Permission flags as `(state attribute, wire field)`.
pub const PERMISSIONS: [(&str, &str); 86] = [
    ("can_configure_service_mapping", "canConfigureServiceMapping"),
    ("can_configure_eum_applications", "canConfigureEumApplications"),
    ("can_configure_mobile_app_monitoring", "canConfigureMobileAppMonitoring"),
    ("can_configure_users", "canConfigureUsers"),
    ("can_install_new_agents", "canInstallNewAgents"),
    ("can_configure_integrations", "canConfigureIntegrations"),
    ("can_configure_events_and_alerts", "canConfigureEventsAndAlerts"),
    ("can_configure_maintenance_windows", "canConfigureMaintenanceWindows"),
    ("can_configure_application_smart_alerts", "canConfigureApplicationSmartAlerts"),
    ("can_configure_website_smart_alerts", "canConfigureWebsiteSmartAlerts"),
    ("can_configure_mobile_app_smart_alerts", "canConfigureMobileAppSmartAlerts"),
    ("can_configure_api_tokens", "canConfigureApiTokens"),
    ("can_configure_agent_run_mode", "canConfigureAgentRunMode"),
    ("can_view_audit_log", "canViewAuditLog"),
    ("can_configure_agents", "canConfigureAgents"),
    ("can_configure_authentication_methods", "canConfigureAuthenticationMethods"),
    ("can_configure_applications", "canConfigureApplications"),
    ("can_configure_teams", "canConfigureTeams"),
    ("can_configure_releases", "canConfigureReleases"),
    ("can_configure_log_management", "canConfigureLogManagement"),
    ("can_create_public_custom_dashboards", "canCreatePublicCustomDashboards"),
    ("can_view_logs", "canViewLogs"),
    ("can_view_trace_details", "canViewTraceDetails"),
    ("can_configure_session_settings", "canConfigureSessionSettings"),
    ("can_configure_global_alert_payload", "canConfigureGlobalAlertPayload"),
    ("can_configure_global_application_smart_alerts", "canConfigureGlobalApplicationSmartAlerts"),
    ("can_configure_global_synthetic_smart_alerts", "canConfigureGlobalSyntheticSmartAlerts"),
    ("can_configure_global_infra_smart_alerts", "canConfigureGlobalInfraSmartAlerts"),
    ("can_configure_global_log_smart_alerts", "canConfigureGlobalLogSmartAlerts"),
    ("can_view_account_and_billing_information", "canViewAccountAndBillingInformation"),
    ("can_edit_all_accessible_custom_dashboards", "canEditAllAccessibleCustomDashboards"),
    ("limited_applications_scope", "limitedApplicationsScope"),
    ("limited_biz_ops_scope", "limitedBizOpsScope"),
    ("limited_websites_scope", "limitedWebsitesScope"),
    ("limited_kubernetes_scope", "limitedKubernetesScope"),
    ("limited_mobile_apps_scope", "limitedMobileAppsScope"),
    ("limited_infrastructure_scope", "limitedInfrastructureScope"),
    ("limited_synthetics_scope", "limitedSyntheticsScope"),
    ("limited_vsphere_scope", "limitedVsphereScope"),
    ("limited_phmc_scope", "limitedPhmcScope"),
    ("limited_pvc_scope", "limitedPvcScope"),
    ("limited_zhmc_scope", "limitedZhmcScope"),
    ("limited_pcf_scope", "limitedPcfScope"),
    ("limited_openstack_scope", "limitedOpenstackScope"),
    ("limited_automation_scope", "limitedAutomationScope"),
    ("limited_logs_scope", "limitedLogsScope"),
    ("limited_nutanix_scope", "limitedNutanixScope"),
    ("limited_xen_server_scope", "limitedXenServerScope"),
    ("limited_windows_hypervisor_scope", "limitedWindowsHypervisorScope"),
    ("limited_alert_channels_scope", "limitedAlertChannelsScope"),
    ("limited_linux_kvm_hypervisor_scope", "limitedLinuxKvmHypervisorScope"),
    ("limited_service_level_scope", "limitedServiceLevelScope"),
    ("limited_ai_gateway_scope", "limitedAiGatewayScope"),
    ("limited_gen_ai_scope", "limitedGenAIScope"),
    ("can_configure_personal_api_tokens", "canConfigurePersonalApiTokens"),
    ("can_configure_database_management", "canConfigureDatabaseManagement"),
    ("can_configure_automation_actions", "canConfigureAutomationActions"),
    ("can_configure_automation_policies", "canConfigureAutomationPolicies"),
    ("can_run_automation_actions", "canRunAutomationActions"),
    ("can_delete_automation_action_history", "canDeleteAutomationActionHistory"),
    ("can_configure_synthetic_tests", "canConfigureSyntheticTests"),
    ("can_configure_synthetic_locations", "canConfigureSyntheticLocations"),
    ("can_configure_synthetic_credentials", "canConfigureSyntheticCredentials"),
    ("can_view_synthetic_tests", "canViewSyntheticTests"),
    ("can_view_synthetic_locations", "canViewSyntheticLocations"),
    ("can_view_synthetic_test_results", "canViewSyntheticTestResults"),
    ("can_use_synthetic_credentials", "canUseSyntheticCredentials"),
    ("can_configure_bizops", "canConfigureBizops"),
    ("can_view_business_processes", "canViewBusinessProcesses"),
    ("can_view_business_process_details", "canViewBusinessProcessDetails"),
    ("can_view_business_activities", "canViewBusinessActivities"),
    ("can_view_biz_alerts", "canViewBizAlerts"),
    ("can_delete_logs", "canDeleteLogs"),
    ("can_create_heap_dump", "canCreateHeapDump"),
    ("can_create_thread_dump", "canCreateThreadDump"),
    ("can_manually_close_issue", "canManuallyCloseIssue"),
    ("can_view_log_volume", "canViewLogVolume"),
    ("can_configure_log_retention_period", "canConfigureLogRetentionPeriod"),
    ("can_configure_subtraces", "canConfigureSubtraces"),
    ("can_invoke_alert_channel", "canInvokeAlertChannel"),
    ("can_configure_llm", "canConfigureLLM"),
    ("can_configure_ai_agents", "canConfigureAiAgents"),
    ("can_configure_apdex", "canConfigureApdex"),
    ("can_configure_service_level_correction_windows", "canConfigureServiceLevelCorrectionWindows"),
    ("can_configure_service_level_smart_alerts", "canConfigureServiceLevelSmartAlerts"),
    ("can_configure_service_levels", "canConfigureServiceLevels"),
];

/// An API token as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub access_granting_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    pub name: String,
    /// Permission flags keyed by wire field.
    #[serde(flatten)]
    pub permissions: BTreeMap<String, Value>,
}

impl WireModel for ApiToken {
    fn id(&self) -> Option<&str> {
        self.internal_id.as_deref()
    }
}

fn text(state: &Value, field: &str) -> Option<String> {
    state
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Encode state as the wire object. Unset permissions are sent as `false`.
pub fn state_to_wire(state: &Value) -> Result<ApiToken, ProviderError> {
    let name = text(state, "name")
        .ok_or_else(|| ProviderError::InvalidConfig("name is required".to_string()))?;
    let access_granting_token = text(state, ACCESS_GRANTING_TOKEN_FIELD).ok_or_else(|| {
        ProviderError::InvalidConfig(format!("{} is missing", ACCESS_GRANTING_TOKEN_FIELD))
    })?;

    let permissions = PERMISSIONS
        .iter()
        .map(|(state_name, wire_name)| {
            let granted = state
                .get(*state_name)
                .and_then(Value::as_bool)
                .unwrap_or(false);
            (wire_name.to_string(), Value::Bool(granted))
        })
        .collect();

    Ok(ApiToken {
        id: text(state, "id"),
        access_granting_token,
        internal_id: text(state, INTERNAL_ID_FIELD),
        name,
        permissions,
    })
}

/// Decode the wire object. The access granting token of `prior` is kept
/// when the API omits it.
pub fn wire_to_state(prior: Option<&Value>, wire: &ApiToken) -> Value {
    let mut state = Map::new();
    state.insert("id".to_string(), wire.id.clone().map_or(Value::Null, Value::String));
    state.insert(
        INTERNAL_ID_FIELD.to_string(),
        wire.internal_id.clone().map_or(Value::Null, Value::String),
    );
    state.insert("name".to_string(), Value::String(wire.name.clone()));

    let access_granting_token = Some(wire.access_granting_token.clone())
        .filter(|t| !t.is_empty())
        .or_else(|| prior.and_then(|p| text(p, ACCESS_GRANTING_TOKEN_FIELD)));
    state.insert(
        ACCESS_GRANTING_TOKEN_FIELD.to_string(),
        access_granting_token.map_or(Value::Null, Value::String),
    );

    for (state_name, wire_name) in PERMISSIONS {
        let granted = wire
            .permissions
            .get(wire_name)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        state.insert(state_name.to_string(), Value::Bool(granted));
    }
    Value::Object(state)
}

fn resource_schema() -> Schema {
    let schema = Schema::v0()
        .with_description("API token")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            INTERNAL_ID_FIELD,
            Attribute::computed_string().with_description("The identifier addressing the token"),
        )
        .with_attribute(
            ACCESS_GRANTING_TOKEN_FIELD,
            Attribute::computed_string()
                .with_description("The token used to authenticate against the API")
                .sensitive(),
        )
        .with_attribute(
            "name",
            Attribute::required_string().with_description("The name of the API token"),
        );
    PERMISSIONS.iter().fold(schema, |schema, (state_name, _)| {
        schema.with_attribute(
            *state_name,
            Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                .with_default(Value::Bool(false)),
        )
    })
}

/// Resource handle of API tokens.
pub struct ApiTokenResource {
    metadata: ResourceMetadata,
}

impl ApiTokenResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                API_TOKENS_PATH,
                WriteMode::PostPut,
            )
            .with_id_generation()
            .with_resource_id_field(INTERNAL_ID_FIELD),
        }
    }
}

impl Default for ApiTokenResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for ApiTokenResource {
    type Wire = ApiToken;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn set_computed_fields(&self, plan: &mut Value) -> Result<(), ProviderError> {
        let Value::Object(map) = plan else {
            return Ok(());
        };
        let has_token = map
            .get(ACCESS_GRANTING_TOKEN_FIELD)
            .and_then(Value::as_str)
            .is_some_and(|t| !t.is_empty());
        if !has_token {
            map.insert(
                ACCESS_GRANTING_TOKEN_FIELD.to_string(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }
        Ok(())
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<ApiToken, ProviderError> {
        state_to_wire(state)
    }

    fn map_wire_to_state(&self, prior: Option<&Value>, wire: &ApiToken) -> Result<Value, ProviderError> {
        Ok(wire_to_state(prior, wire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resourcehandle::{ManagedResource, Resource};
    use crate::restapi::{ClientConfig, RestClient};
    use crate::testing::MockInstanaServer;
    use serde_json::json;

    #[test]
    fn test_permission_table_is_unique() {
        let mut state_names: Vec<_> = PERMISSIONS.iter().map(|(s, _)| *s).collect();
        state_names.sort_unstable();
        state_names.dedup();
        assert_eq!(state_names.len(), PERMISSIONS.len());
        assert!(PERMISSIONS.contains(&("can_configure_llm", "canConfigureLLM")));
        assert!(PERMISSIONS.contains(&("limited_gen_ai_scope", "limitedGenAIScope")));
    }

    #[test]
    fn test_wire_to_state_defaults_missing_permissions() {
        let wire: ApiToken = serde_json::from_value(json!({
            "id": "srv1",
            "internalId": "int1",
            "accessGrantingToken": "secret",
            "name": "ci",
            "canConfigureUsers": true,
            "someFutureFlag": "ignored"
        }))
        .unwrap();
        let state = wire_to_state(None, &wire);
        assert_eq!(state["internal_id"], "int1");
        assert_eq!(state["can_configure_users"], true);
        assert_eq!(state["can_view_logs"], false);
        assert!(state.get("someFutureFlag").is_none());
    }

    #[test]
    fn test_prior_token_kept_when_omitted() {
        let wire: ApiToken =
            serde_json::from_value(json!({"internalId": "int1", "name": "ci"})).unwrap();
        let prior = json!({"access_granting_token": "secret"});
        let state = wire_to_state(Some(&prior), &wire);
        assert_eq!(state["access_granting_token"], "secret");
    }

    #[test]
    fn test_state_to_wire_sends_all_flags() {
        let wire = state_to_wire(&json!({
            "internal_id": "int1",
            "access_granting_token": "secret",
            "name": "ci",
            "can_configure_teams": true
        }))
        .unwrap();
        assert_eq!(wire.permissions.len(), PERMISSIONS.len());
        assert_eq!(wire.permissions["canConfigureTeams"], true);
        assert_eq!(wire.permissions["canViewAuditLog"], false);
        assert_eq!(wire.id(), Some("int1"));
    }

    #[tokio::test]
    async fn test_create_generates_identifiers() {
        let server = MockInstanaServer::start().await;
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        server.respond("POST", API_TOKENS_PATH, 200, Value::Null);

        let resource = ManagedResource::new(ApiTokenResource::new());
        let mut plan = json!({"name": "ci", "can_view_logs": true});
        resource.prepare_plan(None, &mut plan).unwrap();
        let internal_id = plan["internal_id"].as_str().unwrap().to_string();
        let token = plan["access_granting_token"].as_str().unwrap().to_string();
        assert_ne!(internal_id, token);

        let state = resource.create(&client, plan).await.unwrap();
        assert_eq!(state["internal_id"], internal_id.as_str());
        assert_eq!(state["access_granting_token"], token.as_str());
        assert_eq!(state["can_view_logs"], true);

        let sent = server.requests_to("POST", API_TOKENS_PATH)[0].json();
        assert_eq!(sent["internalId"], internal_id.as_str());
        assert_eq!(sent["canViewLogs"], true);
    }

    #[tokio::test]
    async fn test_update_puts_to_internal_id() {
        let server = MockInstanaServer::start().await;
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let path = format!("{}/int1", API_TOKENS_PATH);
        server.respond("PUT", &path, 200, Value::Null);

        let resource = ManagedResource::new(ApiTokenResource::new());
        let prior = json!({"id": "srv1", "internal_id": "int1", "access_granting_token": "s", "name": "a"});
        let planned = json!({"access_granting_token": "s", "name": "b"});
        let state = resource.update(&client, prior, planned).await.unwrap();
        assert_eq!(state["name"], "b");
        assert_eq!(state["internal_id"], "int1");
        assert_eq!(server.requests_to("PUT", &path).len(), 1);
    }
}
