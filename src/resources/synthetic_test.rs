//! Synthetic tests: scheduled HTTP, DNS, TLS and browser checks run from
//! points of presence.
//!
//! The wire `configuration` is one flat object discriminated by
//! `syntheticType`; each type reads its own subset of the optional fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, SYNTHETIC_TESTS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::{from_state, to_state};

/// Resource name of synthetic tests.
pub const RESOURCE_NAME: &str = "synthetic_test";

/// Configuration blocks in the order they are inspected on write.
pub const CONFIGURATION_BLOCKS: [&str; 7] = [
    "http_action",
    "http_script",
    "browser_script",
    "dns",
    "ssl_certificate",
    "webpage_action",
    "webpage_script",
];

/// Accepted playback modes.
pub const PLAYBACK_MODES: [&str; 2] = ["Simultaneous", "Staggered"];

/// Accepted HTTP operations of HTTP action tests.
pub const HTTP_OPERATIONS: [&str; 7] = ["GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT", "DELETE"];

/// Accepted browsers.
pub const BROWSERS: [&str; 2] = ["chrome", "firefox"];

const DEFAULT_PLAYBACK_MODE: &str = "Simultaneous";
const MAX_TEST_FREQUENCY: i64 = 120;

// ============================================================================
// Wire model
// ============================================================================

/// A synthetic test as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticTest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mobile_apps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub websites: Vec<String>,
    pub configuration: SyntheticTestConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub playback_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_frequency: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rbac_tags: Vec<RbacTag>,
}

impl WireModel for SyntheticTest {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Access control tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RbacTag {
    pub name: String,
    pub value: String,
}

/// Flat test configuration shared by every synthetic type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticTestConfig {
    pub synthetic_type: String,
    #[serde(default)]
    pub mark_synthetic_call: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_redirect: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_insecure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_match: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_exists: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_not_empty: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_json: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<MultipleScripts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_video: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(rename = "acceptCNAME", default, skip_serializing_if = "Option::is_none")]
    pub accept_cname: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_server_name: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursive_lookups: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_retries: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_time: Option<QueryTimeFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_values: Option<Vec<Condition>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining_check: Option<i64>,
    #[serde(
        rename = "acceptSelfSignedCertificate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub accept_self_signed_cert: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<Vec<Condition>>,
}

/// Bundled Jest scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleScripts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_file: Option<String>,
}

/// DNS query time filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTimeFilter {
    pub key: String,
    pub operator: String,
    pub value: i64,
}

/// A key/operator/value check on a DNS answer or a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    pub operator: String,
    pub value: String,
}

// ============================================================================
// State model
// ============================================================================

/// Settings every configuration block carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonSettings {
    #[serde(default)]
    pub mark_synthetic_call: Option<bool>,
    #[serde(default)]
    pub retries: Option<i64>,
    #[serde(default)]
    pub retry_interval: Option<i64>,
    #[serde(default)]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpActionConfig {
    #[serde(flatten)]
    pub common: CommonSettings,
    pub url: String,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub validation_string: Option<String>,
    #[serde(default)]
    pub follow_redirect: Option<bool>,
    #[serde(default)]
    pub allow_insecure: Option<bool>,
    #[serde(default)]
    pub expect_status: Option<i64>,
    #[serde(default)]
    pub expect_match: Option<String>,
    #[serde(default)]
    pub expect_exists: Option<Vec<String>>,
    #[serde(default)]
    pub expect_not_empty: Option<Vec<String>>,
    #[serde(default)]
    pub expect_json: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptsState {
    #[serde(default)]
    pub bundle: Option<String>,
    #[serde(default)]
    pub script_file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpScriptConfig {
    #[serde(flatten)]
    pub common: CommonSettings,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub script_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub scripts: Option<ScriptsState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserScriptConfig {
    #[serde(flatten)]
    pub common: CommonSettings,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub script_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub scripts: Option<ScriptsState>,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub record_video: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(flatten)]
    pub common: CommonSettings,
    pub lookup: String,
    pub server: String,
    #[serde(default)]
    pub query_type: Option<String>,
    #[serde(default)]
    pub port: Option<i64>,
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default)]
    pub accept_cname: Option<bool>,
    #[serde(default)]
    pub lookup_server_name: Option<bool>,
    #[serde(default)]
    pub recursive_lookups: Option<bool>,
    #[serde(default)]
    pub server_retries: Option<i64>,
    #[serde(default)]
    pub query_time: Option<QueryTimeFilter>,
    #[serde(default)]
    pub target_values: Option<Vec<Condition>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SslCertificateConfig {
    #[serde(flatten)]
    pub common: CommonSettings,
    pub hostname: String,
    #[serde(default)]
    pub days_remaining_check: Option<i64>,
    #[serde(default)]
    pub accept_self_signed_certificate: Option<bool>,
    #[serde(default)]
    pub port: Option<i64>,
    #[serde(default)]
    pub validation_rules: Option<Vec<Condition>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebpageActionConfig {
    #[serde(flatten)]
    pub common: CommonSettings,
    pub url: String,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub record_video: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebpageScriptConfig {
    #[serde(flatten)]
    pub common: CommonSettings,
    pub script: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub record_video: Option<bool>,
}

/// Host state of a synthetic test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntheticTestState {
    #[serde(default)]
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub applications: Option<Vec<String>>,
    #[serde(default)]
    pub mobile_apps: Option<Vec<String>>,
    #[serde(default)]
    pub websites: Option<Vec<String>>,
    #[serde(default)]
    pub custom_properties: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub playback_mode: Option<String>,
    #[serde(default)]
    pub test_frequency: Option<i64>,
    #[serde(default)]
    pub rbac_tags: Option<Vec<RbacTag>>,
    #[serde(default)]
    pub http_action: Option<HttpActionConfig>,
    #[serde(default)]
    pub http_script: Option<HttpScriptConfig>,
    #[serde(default)]
    pub browser_script: Option<BrowserScriptConfig>,
    #[serde(default)]
    pub dns: Option<DnsConfig>,
    #[serde(default)]
    pub ssl_certificate: Option<SslCertificateConfig>,
    #[serde(default)]
    pub webpage_action: Option<WebpageActionConfig>,
    #[serde(default)]
    pub webpage_script: Option<WebpageScriptConfig>,
}

/// The configured check, one constructor per synthetic type.
#[derive(Debug, Clone, PartialEq)]
pub enum TestConfiguration {
    HttpAction(HttpActionConfig),
    HttpScript(HttpScriptConfig),
    BrowserScript(BrowserScriptConfig),
    Dns(DnsConfig),
    SslCertificate(SslCertificateConfig),
    WebpageAction(WebpageActionConfig),
    WebpageScript(WebpageScriptConfig),
}

impl TestConfiguration {
    /// The wire discriminator.
    pub fn synthetic_type(&self) -> &'static str {
        match self {
            Self::HttpAction(_) => "HTTPAction",
            Self::HttpScript(_) => "HTTPScript",
            Self::BrowserScript(_) => "BrowserScript",
            Self::Dns(_) => "DNS",
            Self::SslCertificate(_) => "SSLCertificate",
            Self::WebpageAction(_) => "WebpageAction",
            Self::WebpageScript(_) => "WebpageScript",
        }
    }

    fn common(&self) -> &CommonSettings {
        match self {
            Self::HttpAction(c) => &c.common,
            Self::HttpScript(c) => &c.common,
            Self::BrowserScript(c) => &c.common,
            Self::Dns(c) => &c.common,
            Self::SslCertificate(c) => &c.common,
            Self::WebpageAction(c) => &c.common,
            Self::WebpageScript(c) => &c.common,
        }
    }

    fn to_wire(&self) -> Result<SyntheticTestConfig, ProviderError> {
        let common = self.common();
        let mut wire = SyntheticTestConfig {
            synthetic_type: self.synthetic_type().to_string(),
            mark_synthetic_call: common.mark_synthetic_call.unwrap_or(false),
            retries: common.retries,
            retry_interval: common.retry_interval,
            timeout: common.timeout.clone(),
            ..SyntheticTestConfig::default()
        };
        match self {
            Self::HttpAction(c) => {
                wire.url = Some(c.url.clone());
                wire.operation = c.operation.clone();
                wire.headers = c.headers.clone();
                wire.body = c.body.clone();
                wire.validation_string = c.validation_string.clone();
                wire.follow_redirect = c.follow_redirect;
                wire.allow_insecure = c.allow_insecure;
                wire.expect_status = c.expect_status;
                wire.expect_match = c.expect_match.clone();
                wire.expect_exists = c.expect_exists.clone();
                wire.expect_not_empty = c.expect_not_empty.clone();
                wire.expect_json = c
                    .expect_json
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()
                    .map_err(|e| ProviderError::InvalidConfig(format!("expect_json is not valid JSON: {}", e)))?;
            },
            Self::HttpScript(c) => {
                wire.script = c.script.clone();
                wire.script_type = c.script_type.clone();
                wire.file_name = c.file_name.clone();
                wire.scripts = c.scripts.as_ref().map(scripts_to_wire);
            },
            Self::BrowserScript(c) => {
                wire.script = c.script.clone();
                wire.script_type = c.script_type.clone();
                wire.file_name = c.file_name.clone();
                wire.scripts = c.scripts.as_ref().map(scripts_to_wire);
                wire.browser = c.browser.clone();
                wire.record_video = c.record_video;
            },
            Self::Dns(c) => {
                wire.lookup = Some(c.lookup.clone());
                wire.server = Some(c.server.clone());
                wire.query_type = c.query_type.clone();
                wire.port = c.port;
                wire.transport = c.transport.clone();
                wire.accept_cname = c.accept_cname;
                wire.lookup_server_name = c.lookup_server_name;
                wire.recursive_lookups = c.recursive_lookups;
                wire.server_retries = c.server_retries;
                wire.query_time = c.query_time.clone();
                wire.target_values = c.target_values.clone();
            },
            Self::SslCertificate(c) => {
                wire.hostname = Some(c.hostname.clone());
                wire.days_remaining_check = c.days_remaining_check;
                wire.accept_self_signed_cert = c.accept_self_signed_certificate;
                wire.port = c.port;
                wire.validation_rules = c.validation_rules.clone();
            },
            Self::WebpageAction(c) => {
                wire.url = Some(c.url.clone());
                wire.browser = c.browser.clone();
                wire.record_video = c.record_video;
            },
            Self::WebpageScript(c) => {
                wire.script = Some(c.script.clone());
                wire.file_name = c.file_name.clone();
                wire.browser = c.browser.clone();
                wire.record_video = c.record_video;
            },
        }
        Ok(wire)
    }

    fn from_wire(wire: &SyntheticTestConfig) -> Result<Self, ProviderError> {
        let common = CommonSettings {
            mark_synthetic_call: Some(wire.mark_synthetic_call),
            retries: wire.retries,
            retry_interval: wire.retry_interval,
            timeout: wire.timeout.clone(),
        };
        let config = match wire.synthetic_type.as_str() {
            "HTTPAction" => Self::HttpAction(HttpActionConfig {
                common,
                url: wire.url.clone().unwrap_or_default(),
                operation: wire.operation.clone(),
                headers: wire.headers.clone().filter(|h| !h.is_empty()),
                body: wire.body.clone(),
                validation_string: wire.validation_string.clone(),
                follow_redirect: wire.follow_redirect,
                allow_insecure: wire.allow_insecure,
                expect_status: wire.expect_status,
                expect_match: wire.expect_match.clone(),
                expect_exists: non_empty(&wire.expect_exists),
                expect_not_empty: non_empty(&wire.expect_not_empty),
                expect_json: wire
                    .expect_json
                    .as_ref()
                    .filter(|v| !v.is_null())
                    .map(Value::to_string),
            }),
            "HTTPScript" => Self::HttpScript(HttpScriptConfig {
                common,
                script: wire.script.clone(),
                script_type: wire.script_type.clone(),
                file_name: wire.file_name.clone(),
                scripts: wire.scripts.as_ref().map(scripts_to_state),
            }),
            "BrowserScript" => Self::BrowserScript(BrowserScriptConfig {
                common,
                script: wire.script.clone(),
                script_type: wire.script_type.clone(),
                file_name: wire.file_name.clone(),
                scripts: wire.scripts.as_ref().map(scripts_to_state),
                browser: wire.browser.clone(),
                record_video: wire.record_video,
            }),
            "DNS" => Self::Dns(DnsConfig {
                common,
                lookup: wire.lookup.clone().unwrap_or_default(),
                server: wire.server.clone().unwrap_or_default(),
                query_type: wire.query_type.clone(),
                port: wire.port,
                transport: wire.transport.clone(),
                accept_cname: wire.accept_cname,
                lookup_server_name: wire.lookup_server_name,
                recursive_lookups: wire.recursive_lookups,
                server_retries: wire.server_retries,
                query_time: wire.query_time.clone(),
                target_values: non_empty(&wire.target_values),
            }),
            "SSLCertificate" => Self::SslCertificate(SslCertificateConfig {
                common,
                hostname: wire.hostname.clone().unwrap_or_default(),
                days_remaining_check: wire.days_remaining_check,
                accept_self_signed_certificate: wire.accept_self_signed_cert,
                port: wire.port,
                validation_rules: non_empty(&wire.validation_rules),
            }),
            "WebpageAction" => Self::WebpageAction(WebpageActionConfig {
                common,
                url: wire.url.clone().unwrap_or_default(),
                browser: wire.browser.clone(),
                record_video: wire.record_video,
            }),
            "WebpageScript" => Self::WebpageScript(WebpageScriptConfig {
                common,
                script: wire.script.clone().unwrap_or_default(),
                file_name: wire.file_name.clone(),
                browser: wire.browser.clone(),
                record_video: wire.record_video,
            }),
            other => {
                return Err(ProviderError::Decode(format!(
                    "unsupported synthetic test type '{}'",
                    other
                )))
            },
        };
        Ok(config)
    }
}

fn non_empty<T: Clone>(items: &Option<Vec<T>>) -> Option<Vec<T>> {
    items.clone().filter(|items| !items.is_empty())
}

fn scripts_to_wire(scripts: &ScriptsState) -> MultipleScripts {
    MultipleScripts {
        bundle: scripts.bundle.clone(),
        script_file: scripts.script_file.clone(),
    }
}

fn scripts_to_state(scripts: &MultipleScripts) -> ScriptsState {
    ScriptsState {
        bundle: scripts.bundle.clone(),
        script_file: scripts.script_file.clone(),
    }
}

impl SyntheticTestState {
    /// The first populated configuration block, in [`CONFIGURATION_BLOCKS`] order.
    pub fn configuration(&self) -> Option<TestConfiguration> {
        [
            self.http_action.clone().map(TestConfiguration::HttpAction),
            self.http_script.clone().map(TestConfiguration::HttpScript),
            self.browser_script.clone().map(TestConfiguration::BrowserScript),
            self.dns.clone().map(TestConfiguration::Dns),
            self.ssl_certificate.clone().map(TestConfiguration::SslCertificate),
            self.webpage_action.clone().map(TestConfiguration::WebpageAction),
            self.webpage_script.clone().map(TestConfiguration::WebpageScript),
        ]
        .into_iter()
        .flatten()
        .next()
    }

    fn set_configuration(&mut self, configuration: TestConfiguration) {
        match configuration {
            TestConfiguration::HttpAction(c) => self.http_action = Some(c),
            TestConfiguration::HttpScript(c) => self.http_script = Some(c),
            TestConfiguration::BrowserScript(c) => self.browser_script = Some(c),
            TestConfiguration::Dns(c) => self.dns = Some(c),
            TestConfiguration::SslCertificate(c) => self.ssl_certificate = Some(c),
            TestConfiguration::WebpageAction(c) => self.webpage_action = Some(c),
            TestConfiguration::WebpageScript(c) => self.webpage_script = Some(c),
        }
    }
}

/// Encode state as the wire object.
pub fn state_to_wire(state: &SyntheticTestState) -> Result<SyntheticTest, ProviderError> {
    let configuration = state.configuration().ok_or_else(|| {
        ProviderError::InvalidConfig(format!(
            "Exactly one synthetic test configuration must be provided. Supported: {}",
            CONFIGURATION_BLOCKS.join(", ")
        ))
    })?;
    Ok(SyntheticTest {
        id: state.id.clone(),
        label: state.label.clone(),
        description: state.description.clone(),
        active: state.active.unwrap_or(true),
        application_id: state.application_id.clone(),
        applications: state.applications.clone().unwrap_or_default(),
        mobile_apps: state.mobile_apps.clone().unwrap_or_default(),
        websites: state.websites.clone().unwrap_or_default(),
        configuration: configuration.to_wire()?,
        custom_properties: state.custom_properties.clone().unwrap_or_default(),
        locations: state.locations.clone(),
        playback_mode: state
            .playback_mode
            .clone()
            .unwrap_or_else(|| DEFAULT_PLAYBACK_MODE.to_string()),
        test_frequency: state.test_frequency,
        rbac_tags: state.rbac_tags.clone().unwrap_or_default(),
    })
}

/// Decode the wire object.
pub fn wire_to_state(wire: &SyntheticTest) -> Result<SyntheticTestState, ProviderError> {
    let optional_list = |items: &Vec<String>| Some(items.clone()).filter(|items| !items.is_empty());
    let mut state = SyntheticTestState {
        id: wire.id.clone(),
        label: wire.label.clone(),
        description: wire.description.clone(),
        active: Some(wire.active),
        application_id: wire.application_id.clone(),
        applications: optional_list(&wire.applications),
        mobile_apps: optional_list(&wire.mobile_apps),
        websites: optional_list(&wire.websites),
        custom_properties: Some(wire.custom_properties.clone()).filter(|p| !p.is_empty()),
        locations: wire.locations.clone(),
        playback_mode: Some(wire.playback_mode.clone()).filter(|m| !m.is_empty()),
        test_frequency: wire.test_frequency,
        rbac_tags: Some(wire.rbac_tags.clone()).filter(|t| !t.is_empty()),
        ..SyntheticTestState::default()
    };
    state.set_configuration(TestConfiguration::from_wire(&wire.configuration)?);
    Ok(state)
}

// ============================================================================
// Schema
// ============================================================================

fn common_block(description: &str) -> Block {
    Block::new()
        .with_description(description)
        .with_attribute("mark_synthetic_call", Attribute::optional_bool())
        .with_attribute("retries", Attribute::optional_int64())
        .with_attribute("retry_interval", Attribute::optional_int64())
        .with_attribute("timeout", Attribute::optional_string())
}

fn condition_block() -> Block {
    Block::new()
        .with_attribute("key", Attribute::required_string())
        .with_attribute("operator", Attribute::required_string())
        .with_attribute("value", Attribute::required_string())
}

fn scripts_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("bundle", Attribute::optional_string())
            .with_attribute("script_file", Attribute::optional_string()),
    )
}

fn browser_attribute() -> Attribute {
    Attribute::optional_string().with_allowed_values(BROWSERS)
}

fn string_set() -> Attribute {
    Attribute::optional_string_set()
}

/// Add the seven configuration blocks to `schema`.
pub fn with_configuration_blocks(schema: Schema) -> Schema {
    schema
        .with_block(
            "http_action",
            NestedBlock::single(
                common_block("HTTP action test")
                    .with_attribute("url", Attribute::required_string())
                    .with_attribute(
                        "operation",
                        Attribute::optional_string().with_allowed_values(HTTP_OPERATIONS),
                    )
                    .with_attribute("headers", Attribute::optional_string_map())
                    .with_attribute("body", Attribute::optional_string())
                    .with_attribute("validation_string", Attribute::optional_string())
                    .with_attribute("follow_redirect", Attribute::optional_bool())
                    .with_attribute("allow_insecure", Attribute::optional_bool())
                    .with_attribute("expect_status", Attribute::optional_int64())
                    .with_attribute("expect_match", Attribute::optional_string())
                    .with_attribute("expect_exists", string_set())
                    .with_attribute("expect_not_empty", string_set())
                    .with_attribute("expect_json", Attribute::optional_string()),
            ),
        )
        .with_block(
            "http_script",
            NestedBlock::single(
                common_block("HTTP script test")
                    .with_attribute("script", Attribute::optional_string())
                    .with_attribute("script_type", Attribute::optional_string())
                    .with_attribute("file_name", Attribute::optional_string())
                    .with_block("scripts", scripts_block()),
            ),
        )
        .with_block(
            "browser_script",
            NestedBlock::single(
                common_block("Browser script test")
                    .with_attribute("script", Attribute::optional_string())
                    .with_attribute("script_type", Attribute::optional_string())
                    .with_attribute("file_name", Attribute::optional_string())
                    .with_attribute("browser", browser_attribute())
                    .with_attribute("record_video", Attribute::optional_bool())
                    .with_block("scripts", scripts_block()),
            ),
        )
        .with_block(
            "dns",
            NestedBlock::single(
                common_block("DNS test")
                    .with_attribute("lookup", Attribute::required_string())
                    .with_attribute("server", Attribute::required_string())
                    .with_attribute("query_type", Attribute::optional_string())
                    .with_attribute("port", Attribute::optional_int64())
                    .with_attribute(
                        "transport",
                        Attribute::optional_string().with_allowed_values(["TCP", "UDP"]),
                    )
                    .with_attribute("accept_cname", Attribute::optional_bool())
                    .with_attribute("lookup_server_name", Attribute::optional_bool())
                    .with_attribute("recursive_lookups", Attribute::optional_bool())
                    .with_attribute("server_retries", Attribute::optional_int64())
                    .with_block(
                        "query_time",
                        NestedBlock::single(
                            Block::new()
                                .with_attribute("key", Attribute::required_string())
                                .with_attribute("operator", Attribute::required_string())
                                .with_attribute("value", Attribute::required_int64()),
                        ),
                    )
                    .with_block("target_values", NestedBlock::set(condition_block())),
            ),
        )
        .with_block(
            "ssl_certificate",
            NestedBlock::single(
                common_block("TLS certificate test")
                    .with_attribute("hostname", Attribute::required_string())
                    .with_attribute("days_remaining_check", Attribute::optional_int64())
                    .with_attribute("accept_self_signed_certificate", Attribute::optional_bool())
                    .with_attribute("port", Attribute::optional_int64())
                    .with_block("validation_rules", NestedBlock::set(condition_block())),
            ),
        )
        .with_block(
            "webpage_action",
            NestedBlock::single(
                common_block("Webpage action test")
                    .with_attribute("url", Attribute::required_string())
                    .with_attribute("browser", browser_attribute())
                    .with_attribute("record_video", Attribute::optional_bool()),
            ),
        )
        .with_block(
            "webpage_script",
            NestedBlock::single(
                common_block("Webpage script test")
                    .with_attribute("script", Attribute::required_string())
                    .with_attribute("file_name", Attribute::optional_string())
                    .with_attribute("browser", browser_attribute())
                    .with_attribute("record_video", Attribute::optional_bool()),
            ),
        )
        .with_exactly_one_of(CONFIGURATION_BLOCKS)
}

fn resource_schema() -> Schema {
    with_configuration_blocks(
        Schema::v0()
            .with_description("Synthetic test")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("label", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "active",
                Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                    .with_default(Value::Bool(true)),
            )
            .with_attribute("application_id", Attribute::optional_string())
            .with_attribute("applications", string_set())
            .with_attribute("mobile_apps", string_set())
            .with_attribute("websites", string_set())
            .with_attribute("custom_properties", Attribute::optional_string_map())
            .with_attribute(
                "locations",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::required(),
                ),
            )
            .with_attribute(
                "playback_mode",
                Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                    .with_default(Value::String(DEFAULT_PLAYBACK_MODE.to_string()))
                    .with_allowed_values(PLAYBACK_MODES),
            )
            .with_attribute("test_frequency", Attribute::optional_int64()),
    )
    .with_block(
        "rbac_tags",
        NestedBlock::set(
            Block::new()
                .with_attribute("name", Attribute::required_string())
                .with_attribute("value", Attribute::required_string()),
        ),
    )
}

// ============================================================================
// Handle
// ============================================================================

/// Resource handle of synthetic tests.
pub struct SyntheticTestResource {
    metadata: ResourceMetadata,
}

impl SyntheticTestResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                SYNTHETIC_TESTS_PATH,
                WriteMode::PostPut,
            ),
        }
    }
}

impl Default for SyntheticTestResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for SyntheticTestResource {
    type Wire = SyntheticTest;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if let Some(frequency) = config.get("test_frequency").and_then(Value::as_i64) {
            if !(1..=MAX_TEST_FREQUENCY).contains(&frequency) {
                diagnostics.push(
                    Diagnostic::error("Invalid test frequency")
                        .with_detail(format!(
                            "test_frequency must be between 1 and {} minutes, got {}",
                            MAX_TEST_FREQUENCY, frequency
                        ))
                        .with_attribute("test_frequency"),
                );
            }
        }
        let locations = config.get("locations").and_then(Value::as_array);
        if locations.is_some_and(|l| l.is_empty()) {
            diagnostics.push(
                Diagnostic::error("At least one location is required")
                    .with_attribute("locations"),
            );
        }
        if let Some(json) = config
            .get("http_action")
            .and_then(|block| block.get("expect_json"))
            .and_then(Value::as_str)
        {
            if let Err(e) = serde_json::from_str::<Value>(json) {
                diagnostics.push(
                    Diagnostic::error("expect_json is not valid JSON")
                        .with_detail(e.to_string())
                        .with_attribute("http_action.expect_json"),
                );
            }
        }
        diagnostics
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<SyntheticTest, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &SyntheticTest,
    ) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resourcehandle::{ManagedResource, Resource};
    use crate::restapi::{ClientConfig, RestClient};
    use crate::testing::MockInstanaServer;
    use serde_json::json;

    fn handle() -> SyntheticTestResource {
        SyntheticTestResource::new()
    }

    #[tokio::test]
    async fn test_create_http_action() {
        let server = MockInstanaServer::start().await;
        server.respond(
            "POST",
            SYNTHETIC_TESTS_PATH,
            200,
            json!({
                "id": "st1",
                "label": "health",
                "active": true,
                "locations": ["loc1"],
                "playbackMode": "Simultaneous",
                "testFrequency": 5,
                "configuration": {
                    "syntheticType": "HTTPAction",
                    "markSyntheticCall": true,
                    "url": "https://example.com/health",
                    "operation": "GET",
                    "expectStatus": 200
                }
            }),
        );
        let client = RestClient::new(ClientConfig::new("token", server.url())).unwrap();
        let resource = ManagedResource::new(handle());

        let state = resource
            .create(
                &client,
                json!({
                    "label": "health",
                    "locations": ["loc1"],
                    "test_frequency": 5,
                    "http_action": {
                        "mark_synthetic_call": true,
                        "url": "https://example.com/health",
                        "operation": "GET",
                        "expect_status": 200
                    }
                }),
            )
            .await
            .unwrap();

        let sent = server.requests_to("POST", SYNTHETIC_TESTS_PATH)[0].json();
        assert_eq!(sent["configuration"]["syntheticType"], "HTTPAction");
        assert_eq!(sent["configuration"]["url"], "https://example.com/health");
        assert_eq!(sent["playbackMode"], "Simultaneous");
        assert_eq!(sent["active"], true);
        assert!(sent["configuration"].get("lookup").is_none());

        assert_eq!(state["id"], "st1");
        assert_eq!(state["http_action"]["expect_status"], 200);
        assert_eq!(state["dns"], Value::Null);
    }

    #[test]
    fn test_dns_shares_port_field() {
        let wire = handle()
            .map_state_to_wire(&json!({
                "label": "dns",
                "locations": ["loc1"],
                "dns": {
                    "lookup": "example.com",
                    "server": "8.8.8.8",
                    "port": 53,
                    "accept_cname": true,
                    "target_values": [{"key": "A", "operator": "CONTAINS", "value": "1.2.3.4"}]
                }
            }))
            .unwrap();
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["configuration"]["syntheticType"], "DNS");
        assert_eq!(value["configuration"]["port"], 53);
        assert_eq!(value["configuration"]["acceptCNAME"], true);
        assert_eq!(value["configuration"]["targetValues"][0]["operator"], "CONTAINS");

        let state = handle().map_wire_to_state(None, &wire).unwrap();
        assert_eq!(state["dns"]["port"], 53);
        assert_eq!(state["dns"]["server"], "8.8.8.8");
    }

    #[test]
    fn test_expect_json_round_trip() {
        let wire = handle()
            .map_state_to_wire(&json!({
                "label": "api",
                "locations": ["loc1"],
                "http_action": {"url": "https://a", "expect_json": "{\"ok\":true}"}
            }))
            .unwrap();
        assert_eq!(wire.configuration.expect_json, Some(json!({"ok": true})));

        let state = handle().map_wire_to_state(None, &wire).unwrap();
        assert_eq!(state["http_action"]["expect_json"], "{\"ok\":true}");
    }

    #[test]
    fn test_missing_configuration_is_invalid() {
        let err = handle()
            .map_state_to_wire(&json!({"label": "x", "locations": ["l"]}))
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_type_is_decode_error() {
        let wire: SyntheticTest = serde_json::from_value(json!({
            "id": "x",
            "label": "x",
            "configuration": {"syntheticType": "Carrier"}
        }))
        .unwrap();
        assert!(matches!(
            handle().map_wire_to_state(None, &wire),
            Err(ProviderError::Decode(_))
        ));
    }

    #[test]
    fn test_validate_frequency_and_locations() {
        let diagnostics = handle().validate(&json!({
            "label": "x",
            "locations": [],
            "test_frequency": 500
        }));
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("test_frequency"));
        assert_eq!(diagnostics[1].attribute.as_deref(), Some("locations"));
    }
}
