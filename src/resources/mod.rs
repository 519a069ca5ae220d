//! Resource handles of every managed entity family.

pub mod alerting_channel;
pub mod alerting_config;
pub mod api_token;
pub mod application_alert_config;
pub mod application_config;
pub mod automation_action;
pub mod automation_policy;
pub mod custom_dashboard;
pub mod custom_event_specification;
pub mod group;
pub mod infra_alert_config;
pub mod log_alert_config;
pub mod maintenance_window_config;
pub mod mobile_alert_config;
pub mod role;
pub mod sli_config;
pub mod slo_alert_config;
pub mod slo_config;
pub mod slo_correction_config;
pub mod synthetic_alert_config;
pub mod synthetic_test;
pub mod team;
pub mod website_alert_config;
pub mod website_monitoring_config;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::resourcehandle::{ManagedResource, Resource};

pub use alerting_channel::AlertingChannelResource;
pub use alerting_config::AlertingConfigResource;
pub use api_token::ApiTokenResource;
pub use application_alert_config::ApplicationAlertConfigResource;
pub use application_config::ApplicationConfigResource;
pub use automation_action::AutomationActionResource;
pub use automation_policy::AutomationPolicyResource;
pub use custom_dashboard::CustomDashboardResource;
pub use custom_event_specification::CustomEventSpecificationResource;
pub use group::GroupResource;
pub use infra_alert_config::InfraAlertConfigResource;
pub use log_alert_config::LogAlertConfigResource;
pub use maintenance_window_config::MaintenanceWindowResource;
pub use mobile_alert_config::MobileAlertConfigResource;
pub use role::RoleResource;
pub use sli_config::SliConfigResource;
pub use slo_alert_config::SloAlertConfigResource;
pub use slo_config::SloConfigResource;
pub use slo_correction_config::SloCorrectionConfigResource;
pub use synthetic_alert_config::SyntheticAlertConfigResource;
pub use synthetic_test::SyntheticTestResource;
pub use team::TeamResource;
pub use website_alert_config::WebsiteAlertConfigResource;
pub use website_monitoring_config::WebsiteMonitoringConfigResource;

/// Every resource, keyed by resource name.
pub fn registry() -> BTreeMap<&'static str, Arc<dyn Resource>> {
    let resources: Vec<Arc<dyn Resource>> = vec![
        Arc::new(ManagedResource::new(AlertingChannelResource::new())),
        Arc::new(ManagedResource::new(AlertingConfigResource::new())),
        Arc::new(ManagedResource::new(ApiTokenResource::new())),
        Arc::new(ManagedResource::new(ApplicationAlertConfigResource::new())),
        Arc::new(ManagedResource::new(ApplicationAlertConfigResource::global())),
        Arc::new(ManagedResource::new(ApplicationConfigResource::new())),
        Arc::new(ManagedResource::new(AutomationActionResource::new())),
        Arc::new(ManagedResource::new(AutomationPolicyResource::new())),
        Arc::new(ManagedResource::new(CustomDashboardResource::new())),
        Arc::new(ManagedResource::new(CustomEventSpecificationResource::new())),
        Arc::new(ManagedResource::new(GroupResource::new())),
        Arc::new(ManagedResource::new(InfraAlertConfigResource::new())),
        Arc::new(ManagedResource::new(LogAlertConfigResource::new())),
        Arc::new(ManagedResource::new(MaintenanceWindowResource::new())),
        Arc::new(ManagedResource::new(MobileAlertConfigResource::new())),
        Arc::new(ManagedResource::new(RoleResource::new())),
        Arc::new(ManagedResource::new(SliConfigResource::new())),
        Arc::new(ManagedResource::new(SloAlertConfigResource::new())),
        Arc::new(ManagedResource::new(SloConfigResource::new())),
        Arc::new(ManagedResource::new(SloCorrectionConfigResource::new())),
        Arc::new(ManagedResource::new(SyntheticAlertConfigResource::new())),
        Arc::new(ManagedResource::new(SyntheticTestResource::new())),
        Arc::new(ManagedResource::new(TeamResource::new())),
        Arc::new(ManagedResource::new(WebsiteAlertConfigResource::new())),
        Arc::new(ManagedResource::new(WebsiteMonitoringConfigResource::new())),
    ];
    resources
        .into_iter()
        .map(|resource| (resource.metadata().name, resource))
        .collect()
}
