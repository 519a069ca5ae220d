//! Alerting channels: one notification target per channel, selected by kind.
//!
//! State carries one optional block per channel kind. Exactly one block is
//! populated after every read; on write the first populated block in
//! [`CHANNEL_BLOCKS`] order selects the kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{unwrap_single_blocks, ResourceHandle, ResourceMetadata, StateUpgrader};
use crate::restapi::{WireModel, WriteMode, ALERTING_CHANNELS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use crate::shared::tags::split_csv;
use crate::shared::{from_state, headers_from_list, headers_to_list, to_state};

/// Resource name of alerting channels.
pub const RESOURCE_NAME: &str = "alerting_channel";

/// Channel blocks in the order they are inspected on write.
pub const CHANNEL_BLOCKS: [&str; 16] = [
    "email",
    "ops_genie",
    "pager_duty",
    "slack",
    "splunk",
    "victor_ops",
    "webhook",
    "office_365",
    "google_chat",
    "service_now",
    "service_now_application",
    "prometheus_webhook",
    "webex_teams_webhook",
    "watson_aiops_webhook",
    "slack_app",
    "ms_teams_app",
];

/// Regions accepted by OpsGenie.
pub const OPS_GENIE_REGIONS: [&str; 2] = ["EU", "US"];

// ============================================================================
// Wire model
// ============================================================================

/// An alerting channel as exchanged with the API.
///
/// The field set is shared by every kind; `kind` says which fields apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertingChannel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Comma separated on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_integration_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_now_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_close_incidents: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instana_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_send_instana_notes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_send_service_now_activities: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_send_service_now_work_notes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manually_closed_incidents: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_of_incident: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snow_status_on_close_event: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji_rendering: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
}

impl WireModel for AlertingChannel {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

// ============================================================================
// State model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailChannel {
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpsGenieChannel {
    pub api_key: String,
    pub tags: Vec<String>,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagerDutyChannel {
    pub service_integration_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackChannel {
    pub webhook_url: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplunkChannel {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VictorOpsChannel {
    pub api_key: String,
    pub routing_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookChannel {
    pub webhook_urls: Vec<String>,
    /// Sent as `["Name: value", ...]`.
    #[serde(default)]
    pub http_headers: Option<BTreeMap<String, String>>,
}

/// Channels configured by a single webhook URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookUrlChannel {
    pub webhook_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNowChannel {
    pub service_now_url: String,
    pub username: String,
    /// Never returned by the API.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auto_close_incidents: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNowApplicationChannel {
    pub service_now_url: String,
    pub username: String,
    /// Never returned by the API.
    #[serde(default)]
    pub password: Option<String>,
    pub tenant: String,
    pub unit: String,
    #[serde(default)]
    pub auto_close_incidents: Option<bool>,
    #[serde(default)]
    pub instana_url: Option<String>,
    #[serde(default)]
    pub enable_send_instana_notes: Option<bool>,
    #[serde(default)]
    pub enable_send_service_now_activities: Option<bool>,
    #[serde(default)]
    pub enable_send_service_now_work_notes: Option<bool>,
    #[serde(default)]
    pub manually_closed_incidents: Option<bool>,
    #[serde(default)]
    pub resolution_of_incident: Option<bool>,
    #[serde(default)]
    pub snow_status_on_close_event: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrometheusWebhookChannel {
    pub webhook_url: String,
    #[serde(default)]
    pub receiver: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatsonAiopsWebhookChannel {
    pub webhook_url: String,
    /// Kept in the `"Name: value"` form the API uses.
    #[serde(default)]
    pub http_headers: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackAppChannel {
    pub app_id: String,
    pub team_id: String,
    pub team_name: String,
    pub channel_id: String,
    pub channel_name: String,
    #[serde(default)]
    pub emoji_rendering: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsTeamsAppChannel {
    pub api_token_id: String,
    pub team_id: String,
    pub team_name: String,
    pub channel_id: String,
    pub channel_name: String,
    pub instana_url: String,
    pub service_url: String,
    pub tenant_id: String,
    pub tenant_name: String,
}

/// Host state of an alerting channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertingChannelState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: Option<EmailChannel>,
    #[serde(default)]
    pub ops_genie: Option<OpsGenieChannel>,
    #[serde(default)]
    pub pager_duty: Option<PagerDutyChannel>,
    #[serde(default)]
    pub slack: Option<SlackChannel>,
    #[serde(default)]
    pub splunk: Option<SplunkChannel>,
    #[serde(default)]
    pub victor_ops: Option<VictorOpsChannel>,
    #[serde(default)]
    pub webhook: Option<WebhookChannel>,
    #[serde(default)]
    pub office_365: Option<WebhookUrlChannel>,
    #[serde(default)]
    pub google_chat: Option<WebhookUrlChannel>,
    #[serde(default)]
    pub service_now: Option<ServiceNowChannel>,
    #[serde(default)]
    pub service_now_application: Option<ServiceNowApplicationChannel>,
    #[serde(default)]
    pub prometheus_webhook: Option<PrometheusWebhookChannel>,
    #[serde(default)]
    pub webex_teams_webhook: Option<WebhookUrlChannel>,
    #[serde(default)]
    pub watson_aiops_webhook: Option<WatsonAiopsWebhookChannel>,
    #[serde(default)]
    pub slack_app: Option<SlackAppChannel>,
    #[serde(default)]
    pub ms_teams_app: Option<MsTeamsAppChannel>,
}

/// The configured channel, one constructor per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Channel {
    Email(EmailChannel),
    OpsGenie(OpsGenieChannel),
    PagerDuty(PagerDutyChannel),
    Slack(SlackChannel),
    Splunk(SplunkChannel),
    VictorOps(VictorOpsChannel),
    Webhook(WebhookChannel),
    Office365(WebhookUrlChannel),
    GoogleChat(WebhookUrlChannel),
    ServiceNow(ServiceNowChannel),
    ServiceNowApplication(ServiceNowApplicationChannel),
    PrometheusWebhook(PrometheusWebhookChannel),
    WebexTeamsWebhook(WebhookUrlChannel),
    WatsonAiopsWebhook(WatsonAiopsWebhookChannel),
    SlackApp(SlackAppChannel),
    MsTeamsApp(MsTeamsAppChannel),
}

impl Channel {
    /// The wire discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Email(_) => "EMAIL",
            Self::OpsGenie(_) => "OPS_GENIE",
            Self::PagerDuty(_) => "PAGER_DUTY",
            Self::Slack(_) => "SLACK",
            Self::Splunk(_) => "SPLUNK",
            Self::VictorOps(_) => "VICTOR_OPS",
            Self::Webhook(_) => "WEB_HOOK",
            Self::Office365(_) => "OFFICE_365",
            Self::GoogleChat(_) => "GOOGLE_CHAT",
            Self::ServiceNow(_) => "SERVICE_NOW_WEBHOOK",
            Self::ServiceNowApplication(_) => "SERVICE_NOW_APPLICATION",
            Self::PrometheusWebhook(_) => "PROMETHEUS_WEBHOOK",
            Self::WebexTeamsWebhook(_) => "WEBEX_TEAMS_WEBHOOK",
            Self::WatsonAiopsWebhook(_) => "WATSON_AIOPS_WEBHOOK",
            Self::SlackApp(_) => "BIDIRECTIONAL_SLACK",
            Self::MsTeamsApp(_) => "BIDIRECTIONAL_MS_TEAMS",
        }
    }

    /// Copy the channel's fields onto `wire` and set its kind.
    fn apply(self, wire: &mut AlertingChannel) {
        wire.kind = self.kind().to_string();
        match self {
            Self::Email(c) => wire.emails = Some(c.emails),
            Self::OpsGenie(c) => {
                wire.api_key = Some(c.api_key);
                wire.tags = Some(c.tags.join(","));
                wire.region = Some(c.region);
            },
            Self::PagerDuty(c) => wire.service_integration_key = Some(c.service_integration_key),
            Self::Slack(c) => {
                wire.webhook_url = Some(c.webhook_url);
                wire.icon_url = c.icon_url;
                wire.channel = c.channel;
            },
            Self::Splunk(c) => {
                wire.url = Some(c.url);
                wire.token = Some(c.token);
            },
            Self::VictorOps(c) => {
                wire.api_key = Some(c.api_key);
                wire.routing_key = Some(c.routing_key);
            },
            Self::Webhook(c) => {
                wire.webhook_urls = Some(c.webhook_urls);
                wire.headers = c.http_headers.as_ref().map(headers_to_list);
            },
            Self::Office365(c) | Self::GoogleChat(c) | Self::WebexTeamsWebhook(c) => {
                wire.webhook_url = Some(c.webhook_url);
            },
            Self::ServiceNow(c) => {
                wire.service_now_url = Some(c.service_now_url);
                wire.username = Some(c.username);
                wire.password = c.password;
                wire.auto_close_incidents = c.auto_close_incidents;
            },
            Self::ServiceNowApplication(c) => {
                wire.service_now_url = Some(c.service_now_url);
                wire.username = Some(c.username);
                wire.password = c.password;
                wire.tenant = Some(c.tenant);
                wire.unit = Some(c.unit);
                wire.auto_close_incidents = c.auto_close_incidents;
                wire.instana_url = c.instana_url;
                wire.enable_send_instana_notes = c.enable_send_instana_notes;
                wire.enable_send_service_now_activities = c.enable_send_service_now_activities;
                wire.enable_send_service_now_work_notes = c.enable_send_service_now_work_notes;
                wire.manually_closed_incidents = c.manually_closed_incidents;
                wire.resolution_of_incident = c.resolution_of_incident;
                wire.snow_status_on_close_event = c.snow_status_on_close_event;
            },
            Self::PrometheusWebhook(c) => {
                wire.webhook_url = Some(c.webhook_url);
                wire.receiver = c.receiver;
            },
            Self::WatsonAiopsWebhook(c) => {
                wire.webhook_url = Some(c.webhook_url);
                wire.headers = c.http_headers;
            },
            Self::SlackApp(c) => {
                wire.app_id = Some(c.app_id);
                wire.team_id = Some(c.team_id);
                wire.team_name = Some(c.team_name);
                wire.channel_id = Some(c.channel_id);
                wire.channel_name = Some(c.channel_name);
                wire.emoji_rendering = c.emoji_rendering;
            },
            Self::MsTeamsApp(c) => {
                wire.api_token_id = Some(c.api_token_id);
                wire.team_id = Some(c.team_id);
                wire.team_name = Some(c.team_name);
                wire.channel_id = Some(c.channel_id);
                wire.channel_name = Some(c.channel_name);
                wire.instana_url = Some(c.instana_url);
                wire.service_url = Some(c.service_url);
                wire.tenant_id = Some(c.tenant_id);
                wire.tenant_name = Some(c.tenant_name);
            },
        }
    }

    /// Decode the channel selected by `wire.kind`.
    fn from_wire(wire: &AlertingChannel) -> Result<Self, ProviderError> {
        let kind = wire.kind.as_str();
        let need = |value: &Option<String>, field: &str| required(value, kind, field);

        let channel = match kind {
            "EMAIL" => Self::Email(EmailChannel {
                emails: wire.emails.clone().unwrap_or_default(),
            }),
            "OPS_GENIE" => Self::OpsGenie(OpsGenieChannel {
                api_key: need(&wire.api_key, "apiKey")?,
                tags: wire.tags.as_deref().map(split_csv).unwrap_or_default(),
                region: need(&wire.region, "region")?,
            }),
            "PAGER_DUTY" => Self::PagerDuty(PagerDutyChannel {
                service_integration_key: need(&wire.service_integration_key, "serviceIntegrationKey")?,
            }),
            "SLACK" => Self::Slack(SlackChannel {
                webhook_url: need(&wire.webhook_url, "webhookUrl")?,
                icon_url: wire.icon_url.clone(),
                channel: wire.channel.clone(),
            }),
            "SPLUNK" => Self::Splunk(SplunkChannel {
                url: need(&wire.url, "url")?,
                token: need(&wire.token, "token")?,
            }),
            "VICTOR_OPS" => Self::VictorOps(VictorOpsChannel {
                api_key: need(&wire.api_key, "apiKey")?,
                routing_key: need(&wire.routing_key, "routingKey")?,
            }),
            "WEB_HOOK" => Self::Webhook(WebhookChannel {
                webhook_urls: wire.webhook_urls.clone().unwrap_or_default(),
                http_headers: wire
                    .headers
                    .as_deref()
                    .filter(|headers| !headers.is_empty())
                    .map(headers_from_list),
            }),
            "OFFICE_365" => Self::Office365(WebhookUrlChannel {
                webhook_url: need(&wire.webhook_url, "webhookUrl")?,
            }),
            "GOOGLE_CHAT" => Self::GoogleChat(WebhookUrlChannel {
                webhook_url: need(&wire.webhook_url, "webhookUrl")?,
            }),
            "SERVICE_NOW_WEBHOOK" => Self::ServiceNow(ServiceNowChannel {
                service_now_url: need(&wire.service_now_url, "serviceNowUrl")?,
                username: need(&wire.username, "username")?,
                password: wire.password.clone(),
                auto_close_incidents: wire.auto_close_incidents,
            }),
            "SERVICE_NOW_APPLICATION" => Self::ServiceNowApplication(ServiceNowApplicationChannel {
                service_now_url: need(&wire.service_now_url, "serviceNowUrl")?,
                username: need(&wire.username, "username")?,
                password: wire.password.clone(),
                tenant: need(&wire.tenant, "tenant")?,
                unit: need(&wire.unit, "unit")?,
                auto_close_incidents: wire.auto_close_incidents,
                instana_url: wire.instana_url.clone(),
                enable_send_instana_notes: wire.enable_send_instana_notes,
                enable_send_service_now_activities: wire.enable_send_service_now_activities,
                enable_send_service_now_work_notes: wire.enable_send_service_now_work_notes,
                manually_closed_incidents: wire.manually_closed_incidents,
                resolution_of_incident: wire.resolution_of_incident,
                snow_status_on_close_event: wire.snow_status_on_close_event,
            }),
            "PROMETHEUS_WEBHOOK" => Self::PrometheusWebhook(PrometheusWebhookChannel {
                webhook_url: need(&wire.webhook_url, "webhookUrl")?,
                receiver: wire.receiver.clone(),
            }),
            "WEBEX_TEAMS_WEBHOOK" => Self::WebexTeamsWebhook(WebhookUrlChannel {
                webhook_url: need(&wire.webhook_url, "webhookUrl")?,
            }),
            "WATSON_AIOPS_WEBHOOK" => Self::WatsonAiopsWebhook(WatsonAiopsWebhookChannel {
                webhook_url: need(&wire.webhook_url, "webhookUrl")?,
                http_headers: wire.headers.clone().filter(|headers| !headers.is_empty()),
            }),
            "BIDIRECTIONAL_SLACK" => Self::SlackApp(SlackAppChannel {
                app_id: need(&wire.app_id, "appId")?,
                team_id: need(&wire.team_id, "teamId")?,
                team_name: need(&wire.team_name, "teamName")?,
                channel_id: need(&wire.channel_id, "channelId")?,
                channel_name: need(&wire.channel_name, "channelName")?,
                emoji_rendering: wire.emoji_rendering,
            }),
            "BIDIRECTIONAL_MS_TEAMS" => Self::MsTeamsApp(MsTeamsAppChannel {
                api_token_id: need(&wire.api_token_id, "apiTokenId")?,
                team_id: need(&wire.team_id, "teamId")?,
                team_name: need(&wire.team_name, "teamName")?,
                channel_id: need(&wire.channel_id, "channelId")?,
                channel_name: need(&wire.channel_name, "channelName")?,
                instana_url: need(&wire.instana_url, "instanaUrl")?,
                service_url: need(&wire.service_url, "serviceUrl")?,
                tenant_id: need(&wire.tenant_id, "tenantId")?,
                tenant_name: need(&wire.tenant_name, "tenantName")?,
            }),
            other => {
                return Err(ProviderError::Decode(format!(
                    "unsupported alerting channel kind '{}'",
                    other
                )))
            },
        };
        Ok(channel)
    }
}

fn required(value: &Option<String>, kind: &str, field: &str) -> Result<String, ProviderError> {
    value.clone().ok_or_else(|| {
        ProviderError::Decode(format!("{} alerting channel is missing {}", kind, field))
    })
}

impl AlertingChannelState {
    /// The first populated channel block, in [`CHANNEL_BLOCKS`] order.
    pub fn channel(&self) -> Option<Channel> {
        let channels = [
            self.email.clone().map(Channel::Email),
            self.ops_genie.clone().map(Channel::OpsGenie),
            self.pager_duty.clone().map(Channel::PagerDuty),
            self.slack.clone().map(Channel::Slack),
            self.splunk.clone().map(Channel::Splunk),
            self.victor_ops.clone().map(Channel::VictorOps),
            self.webhook.clone().map(Channel::Webhook),
            self.office_365.clone().map(Channel::Office365),
            self.google_chat.clone().map(Channel::GoogleChat),
            self.service_now.clone().map(Channel::ServiceNow),
            self.service_now_application
                .clone()
                .map(Channel::ServiceNowApplication),
            self.prometheus_webhook.clone().map(Channel::PrometheusWebhook),
            self.webex_teams_webhook.clone().map(Channel::WebexTeamsWebhook),
            self.watson_aiops_webhook.clone().map(Channel::WatsonAiopsWebhook),
            self.slack_app.clone().map(Channel::SlackApp),
            self.ms_teams_app.clone().map(Channel::MsTeamsApp),
        ];
        channels.into_iter().flatten().next()
    }

    /// State holding only `channel`.
    pub fn with_channel(id: Option<String>, name: String, channel: Channel) -> Self {
        let mut state = Self {
            id,
            name,
            ..Self::default()
        };
        match channel {
            Channel::Email(c) => state.email = Some(c),
            Channel::OpsGenie(c) => state.ops_genie = Some(c),
            Channel::PagerDuty(c) => state.pager_duty = Some(c),
            Channel::Slack(c) => state.slack = Some(c),
            Channel::Splunk(c) => state.splunk = Some(c),
            Channel::VictorOps(c) => state.victor_ops = Some(c),
            Channel::Webhook(c) => state.webhook = Some(c),
            Channel::Office365(c) => state.office_365 = Some(c),
            Channel::GoogleChat(c) => state.google_chat = Some(c),
            Channel::ServiceNow(c) => state.service_now = Some(c),
            Channel::ServiceNowApplication(c) => state.service_now_application = Some(c),
            Channel::PrometheusWebhook(c) => state.prometheus_webhook = Some(c),
            Channel::WebexTeamsWebhook(c) => state.webex_teams_webhook = Some(c),
            Channel::WatsonAiopsWebhook(c) => state.watson_aiops_webhook = Some(c),
            Channel::SlackApp(c) => state.slack_app = Some(c),
            Channel::MsTeamsApp(c) => state.ms_teams_app = Some(c),
        }
        state
    }
}

/// Encode state as the wire object.
pub fn state_to_wire(state: &AlertingChannelState) -> Result<AlertingChannel, ProviderError> {
    let channel = state.channel().ok_or_else(|| {
        ProviderError::InvalidConfig(format!(
            "No valid alerting channel configuration found. Please configure exactly one channel type. Supported: {}",
            CHANNEL_BLOCKS.join(", ")
        ))
    })?;
    let mut wire = AlertingChannel {
        id: state.id.clone(),
        name: state.name.clone(),
        ..AlertingChannel::default()
    };
    channel.apply(&mut wire);
    Ok(wire)
}

/// Decode the wire object. Passwords are taken from `prior` because the API
/// never returns them.
pub fn wire_to_state(
    prior: Option<&AlertingChannelState>,
    wire: &AlertingChannel,
) -> Result<AlertingChannelState, ProviderError> {
    let mut channel = Channel::from_wire(wire)?;
    match &mut channel {
        Channel::ServiceNow(c) if c.password.is_none() => {
            c.password = prior
                .and_then(|p| p.service_now.as_ref())
                .and_then(|p| p.password.clone());
        },
        Channel::ServiceNowApplication(c) if c.password.is_none() => {
            c.password = prior
                .and_then(|p| p.service_now_application.as_ref())
                .and_then(|p| p.password.clone());
        },
        _ => {},
    }
    Ok(AlertingChannelState::with_channel(
        wire.id.clone(),
        wire.name.clone(),
        channel,
    ))
}

// ============================================================================
// Schema
// ============================================================================

fn string_set(flags: AttributeFlags) -> Attribute {
    Attribute::new(AttributeType::set(AttributeType::String), flags)
}

fn webhook_url_block(description: &str) -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_description(description)
            .with_attribute("webhook_url", Attribute::required_string()),
    )
}

fn service_now_attributes(block: Block) -> Block {
    block
        .with_attribute("service_now_url", Attribute::required_string())
        .with_attribute("username", Attribute::required_string())
        .with_attribute("password", Attribute::optional_string().sensitive())
        .with_attribute("auto_close_incidents", Attribute::optional_bool())
}

/// Add the channel blocks and their exactly-one-of constraint to `schema`.
pub fn with_channel_blocks(schema: Schema) -> Schema {
    schema
        .with_block(
            "email",
            NestedBlock::single(
                Block::new()
                    .with_description("Email channel")
                    .with_attribute("emails", string_set(AttributeFlags::required())),
            ),
        )
        .with_block(
            "ops_genie",
            NestedBlock::single(
                Block::new()
                    .with_description("OpsGenie channel")
                    .with_attribute("api_key", Attribute::required_string().sensitive())
                    .with_attribute(
                        "tags",
                        Attribute::new(
                            AttributeType::list(AttributeType::String),
                            AttributeFlags::required(),
                        ),
                    )
                    .with_attribute(
                        "region",
                        Attribute::required_string().with_allowed_values(OPS_GENIE_REGIONS),
                    ),
            ),
        )
        .with_block(
            "pager_duty",
            NestedBlock::single(
                Block::new().with_description("PagerDuty channel").with_attribute(
                    "service_integration_key",
                    Attribute::required_string().sensitive(),
                ),
            ),
        )
        .with_block(
            "slack",
            NestedBlock::single(
                Block::new()
                    .with_description("Slack webhook channel")
                    .with_attribute("webhook_url", Attribute::required_string())
                    .with_attribute("icon_url", Attribute::optional_string())
                    .with_attribute("channel", Attribute::optional_string()),
            ),
        )
        .with_block(
            "splunk",
            NestedBlock::single(
                Block::new()
                    .with_description("Splunk channel")
                    .with_attribute("url", Attribute::required_string())
                    .with_attribute("token", Attribute::required_string().sensitive()),
            ),
        )
        .with_block(
            "victor_ops",
            NestedBlock::single(
                Block::new()
                    .with_description("VictorOps channel")
                    .with_attribute("api_key", Attribute::required_string().sensitive())
                    .with_attribute("routing_key", Attribute::required_string()),
            ),
        )
        .with_block(
            "webhook",
            NestedBlock::single(
                Block::new()
                    .with_description("Generic webhook channel")
                    .with_attribute("webhook_urls", string_set(AttributeFlags::required()))
                    .with_attribute("http_headers", Attribute::optional_string_map()),
            ),
        )
        .with_block("office_365", webhook_url_block("Office 365 channel"))
        .with_block("google_chat", webhook_url_block("Google Chat channel"))
        .with_block(
            "service_now",
            NestedBlock::single(service_now_attributes(
                Block::new().with_description("ServiceNow webhook channel"),
            )),
        )
        .with_block(
            "service_now_application",
            NestedBlock::single(
                service_now_attributes(
                    Block::new().with_description("ServiceNow ITSM application channel"),
                )
                .with_attribute("tenant", Attribute::required_string())
                .with_attribute("unit", Attribute::required_string())
                .with_attribute("instana_url", Attribute::optional_string())
                .with_attribute("enable_send_instana_notes", Attribute::optional_bool())
                .with_attribute("enable_send_service_now_activities", Attribute::optional_bool())
                .with_attribute("enable_send_service_now_work_notes", Attribute::optional_bool())
                .with_attribute("manually_closed_incidents", Attribute::optional_bool())
                .with_attribute("resolution_of_incident", Attribute::optional_bool())
                .with_attribute("snow_status_on_close_event", Attribute::optional_int64()),
            ),
        )
        .with_block(
            "prometheus_webhook",
            NestedBlock::single(
                Block::new()
                    .with_description("Prometheus webhook channel")
                    .with_attribute("webhook_url", Attribute::required_string())
                    .with_attribute("receiver", Attribute::optional_string()),
            ),
        )
        .with_block("webex_teams_webhook", webhook_url_block("Webex Teams channel"))
        .with_block(
            "watson_aiops_webhook",
            NestedBlock::single(
                Block::new()
                    .with_description("Watson AIOps webhook channel")
                    .with_attribute("webhook_url", Attribute::required_string())
                    .with_attribute("http_headers", Attribute::optional_string_list()),
            ),
        )
        .with_block(
            "slack_app",
            NestedBlock::single(
                Block::new()
                    .with_description("Bidirectional Slack app channel")
                    .with_attribute("app_id", Attribute::required_string())
                    .with_attribute("team_id", Attribute::required_string())
                    .with_attribute("team_name", Attribute::required_string())
                    .with_attribute("channel_id", Attribute::required_string())
                    .with_attribute("channel_name", Attribute::required_string())
                    .with_attribute("emoji_rendering", Attribute::optional_bool()),
            ),
        )
        .with_block(
            "ms_teams_app",
            NestedBlock::single(
                Block::new()
                    .with_description("Bidirectional Microsoft Teams app channel")
                    .with_attribute("api_token_id", Attribute::required_string())
                    .with_attribute("team_id", Attribute::required_string())
                    .with_attribute("team_name", Attribute::required_string())
                    .with_attribute("channel_id", Attribute::required_string())
                    .with_attribute("channel_name", Attribute::required_string())
                    .with_attribute("instana_url", Attribute::required_string())
                    .with_attribute("service_url", Attribute::required_string())
                    .with_attribute("tenant_id", Attribute::required_string())
                    .with_attribute("tenant_name", Attribute::required_string()),
            ),
        )
        .with_exactly_one_of(CHANNEL_BLOCKS)
}

fn resource_schema() -> Schema {
    with_channel_blocks(
        Schema::new(1)
            .with_description("Alerting channel")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("The name of the alerting channel"),
            ),
    )
}

fn upgrade_v0(state: Value) -> Result<Value, ProviderError> {
    unwrap_single_blocks(state, &CHANNEL_BLOCKS)
}

// ============================================================================
// Handle
// ============================================================================

/// Resource handle of alerting channels.
pub struct AlertingChannelResource {
    metadata: ResourceMetadata,
}

impl AlertingChannelResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                ALERTING_CHANNELS_PATH,
                WriteMode::PostPut,
            ),
        }
    }
}

impl Default for AlertingChannelResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for AlertingChannelResource {
    type Wire = AlertingChannel;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let populated: Vec<&str> = CHANNEL_BLOCKS
            .iter()
            .copied()
            .filter(|block| config.get(*block).is_some_and(|v| !v.is_null()))
            .collect();
        if populated.len() > 1 {
            return vec![Diagnostic::error("Multiple alerting channel types configured")
                .with_detail(format!(
                    "only one channel type may be set, found {}",
                    populated.join(", ")
                ))];
        }
        Vec::new()
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<AlertingChannel, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        prior: Option<&Value>,
        wire: &AlertingChannel,
    ) -> Result<Value, ProviderError> {
        let prior: Option<AlertingChannelState> = prior.map(from_state).transpose()?;
        to_state(&wire_to_state(prior.as_ref(), wire)?)
    }

    fn state_upgraders(&self) -> Vec<StateUpgrader> {
        vec![StateUpgrader::new(0, upgrade_v0)]
    }
}
