//! REST access to the Instana API.
//!
//! [`RestClient`] is the only component that performs I/O. Writes travel
//! through a bounded queue drained by a throttled dispatcher; reads go
//! straight to the transport. [`RestResource`] layers a typed CRUD view
//! over one resource path.

mod client;
mod resource;
pub mod user_agent;

use std::fmt;
use std::time::Duration;

pub use client::{QueryParams, RestClient};
pub(crate) use resource::{decode, decode_list};
pub use resource::{RestResource, WireModel, WriteMode};

use crate::config::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_WRITES_PER_SECOND,
};

/// Resource path of alerting channels.
pub const ALERTING_CHANNELS_PATH: &str = "/api/events/settings/alertingChannels";
/// Resource path of automation actions.
pub const AUTOMATION_ACTIONS_PATH: &str = "/api/automation/actions";
/// Resource path of built-in event specifications.
pub const BUILTIN_EVENT_SPECIFICATIONS_PATH: &str = "/api/events/settings/event-specifications/built-in";
/// Resource path of synthetic tests.
pub const SYNTHETIC_TESTS_PATH: &str = "/api/synthetics/settings/tests";
/// Resource path of synthetic locations.
pub const SYNTHETIC_LOCATIONS_PATH: &str = "/api/synthetics/settings/locations";
/// Resource path of SLO configurations.
pub const SLO_CONFIGS_PATH: &str = "/api/settings/slo";
/// Resource path of maintenance windows.
pub const MAINTENANCE_WINDOWS_PATH: &str = "/api/settings/v2/maintenance";
/// Resource path of infrastructure alert configurations.
pub const INFRA_ALERT_CONFIGS_PATH: &str = "/api/events/settings/infra-alert-configs";
/// Resource path of RBAC teams.
pub const TEAMS_PATH: &str = "/api/settings/rbac/teams";
/// Resource path of API tokens.
pub const API_TOKENS_PATH: &str = "/api/settings/api-tokens";
/// Resource path of users.
pub const USERS_PATH: &str = "/api/settings/users";
/// Resource path of the host agent listing.
pub const HOST_AGENTS_PATH: &str = "/api/host-agent";
/// Resource path of event based alerting configurations.
pub const ALERTING_CONFIGS_PATH: &str = "/api/events/settings/alerts";
/// Resource path of application alert configurations.
pub const APPLICATION_ALERT_CONFIGS_PATH: &str = "/api/events/settings/application-alert-configs";
/// Resource path of global application alert configurations.
pub const GLOBAL_APPLICATION_ALERT_CONFIGS_PATH: &str =
    "/api/events/settings/global-alert-configs/applications";
/// Resource path of website alert configurations.
pub const WEBSITE_ALERT_CONFIGS_PATH: &str = "/api/events/settings/website-alert-configs";
/// Resource path of mobile app alert configurations.
pub const MOBILE_ALERT_CONFIGS_PATH: &str = "/api/events/settings/mobile-app-alert-configs";
/// Resource path of synthetic alert configurations.
pub const SYNTHETIC_ALERT_CONFIGS_PATH: &str = "/api/events/settings/global-alert-configs/synthetics";
/// Resource path of log alert configurations.
pub const LOG_ALERT_CONFIGS_PATH: &str = "/api/events/settings/global-alert-configs/logs";
/// Resource path of SLO alert configurations.
pub const SLO_ALERT_CONFIGS_PATH: &str = "/api/events/settings/global-alert-configs/service-levels";
/// Resource path of custom event specifications.
pub const CUSTOM_EVENT_SPECIFICATIONS_PATH: &str = "/api/events/settings/event-specifications/custom";
/// Resource path of SLO correction windows.
pub const SLO_CORRECTION_CONFIGS_PATH: &str = "/api/settings/correction";
/// Resource path of RBAC groups.
pub const GROUPS_PATH: &str = "/api/settings/rbac/groups";
/// Resource path of RBAC roles.
pub const ROLES_PATH: &str = "/api/settings/rbac/roles";
/// Resource path of automation policies.
pub const AUTOMATION_POLICIES_PATH: &str = "/api/automation/policies";
/// Resource path of custom dashboards.
pub const CUSTOM_DASHBOARDS_PATH: &str = "/api/custom-dashboard";
/// Resource path of website monitoring configurations.
pub const WEBSITE_MONITORING_CONFIGS_PATH: &str = "/api/website-monitoring/config";
/// Resource path of application perspectives.
pub const APPLICATION_CONFIGS_PATH: &str = "/api/application-monitoring/settings/application";
/// Resource path of service level indicators.
pub const SLI_CONFIGS_PATH: &str = "/api/settings/v2/sli";

/// Immutable settings of a [`RestClient`].
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API token sent as `Authorization: apiToken <token>`.
    pub token: String,
    /// Host name, optionally carrying an `http://` or `https://` scheme.
    pub host: String,
    /// Disable TLS certificate verification.
    pub tls_insecure_skip_verify: bool,
    /// Write requests emitted per second.
    pub rate: u32,
    /// Capacity of the write queue.
    pub queue_capacity: usize,
    /// Deadline of a single throttled write.
    pub request_timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl ClientConfig {
    /// Create settings with the default throttle, capacity and timeout.
    pub fn new(token: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            host: host.into(),
            tls_insecure_skip_verify: false,
            rate: DEFAULT_WRITES_PER_SECOND,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            user_agent: user_agent::user_agent(),
        }
    }

    /// Disable or enable TLS certificate verification.
    pub fn with_tls_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.tls_insecure_skip_verify = skip;
        self
    }

    /// Set the number of write requests emitted per second.
    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    /// Set the capacity of the write queue.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the deadline of a single throttled write.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the `User-Agent` header value.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Base URL every resource path is appended to.
    ///
    /// A host that already names its scheme is used verbatim; otherwise
    /// `https://` is assumed.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("https://") || host.starts_with("http://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }

    /// Minimum spacing between two dispatched writes.
    pub fn write_interval(&self) -> Duration {
        Duration::from_secs(1) / self.rate.max(1)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("host", &self.host)
            .field("tls_insecure_skip_verify", &self.tls_insecure_skip_verify)
            .field("rate", &self.rate)
            .field("queue_capacity", &self.queue_capacity)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        assert_eq!(
            ClientConfig::new("t", "tenant.instana.io").base_url(),
            "https://tenant.instana.io"
        );
        assert_eq!(
            ClientConfig::new("t", "tenant.instana.io/").base_url(),
            "https://tenant.instana.io"
        );
        assert_eq!(
            ClientConfig::new("t", "http://127.0.0.1:8080").base_url(),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn test_write_interval() {
        assert_eq!(
            ClientConfig::new("t", "h").write_interval(),
            Duration::from_millis(200)
        );
        assert_eq!(
            ClientConfig::new("t", "h").with_rate(1).write_interval(),
            Duration::from_secs(1)
        );
        assert_eq!(
            ClientConfig::new("t", "h").with_rate(0).write_interval(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ClientConfig::new("super-secret", "tenant.instana.io");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
