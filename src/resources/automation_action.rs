//! Automation actions: scripts, HTTP calls, manual steps and ticketing hooks
//! that remediation policies run.
//!
//! On the wire an action is a `type` plus a flat list of named fields, each
//! carrying its own encoding. Script content travels base64 encoded; HTTP
//! authentication and headers travel as JSON documents inside a field value.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::resourcehandle::{ResourceHandle, ResourceMetadata};
use crate::restapi::{WireModel, WriteMode, AUTOMATION_ACTIONS_PATH};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::shared::tags::deserialize_tags;
use crate::shared::{from_state, to_state};

/// Resource name of automation actions.
pub const RESOURCE_NAME: &str = "automation_action";

/// Action blocks in the order they are inspected on write.
pub const ACTION_BLOCKS: [&str; 8] = [
    "script", "http", "manual", "jira", "github", "doc_link", "gitlab", "ansible",
];

/// Accepted HTTP methods of HTTP actions.
pub const HTTP_METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];

/// Accepted input parameter types.
pub const PARAMETER_TYPES: [&str; 3] = ["static", "dynamic", "vault"];

const ASCII: &str = "ascii";
const BASE64_ENCODING: &str = "base64";
const UTF8: &str = "UTF8";

// ============================================================================
// Wire model
// ============================================================================

/// An automation action as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(
        default,
        deserialize_with = "deserialize_tags",
        skip_serializing_if = "Option::is_none"
    )]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub fields: Vec<ActionField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_parameters: Option<Vec<InputParameter>>,
}

impl WireModel for AutomationAction {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl AutomationAction {
    /// Value of the field named `name`, treating blank values as absent.
    pub fn field(&self, name: &str) -> Option<&ActionField> {
        self.fields
            .iter()
            .find(|field| field.name == name && !field.value.is_empty())
    }

    fn text(&self, name: &str) -> Option<String> {
        self.field(name).map(|field| field.value.clone())
    }
}

/// One named value of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: String,
    pub encoding: String,
    #[serde(default)]
    pub secured: bool,
}

/// A parameter prompted for when the action runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputParameter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(rename = "type")]
    pub parameter_type: String,
    #[serde(default)]
    pub value: String,
}

/// Authentication of an HTTP action, carried as JSON text in the `authen` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
enum AuthDocument {
    #[serde(rename = "basicAuth")]
    Basic { username: String, password: String },
    #[serde(rename = "bearerToken")]
    Bearer {
        #[serde(rename = "bearerToken")]
        bearer_token: String,
    },
    #[serde(rename = "apiKey")]
    ApiKey {
        #[serde(rename = "apiKey")]
        key: String,
        #[serde(rename = "apiKeyValue")]
        value: String,
        #[serde(rename = "apiKeyAddTo")]
        key_location: String,
    },
    #[serde(rename = "noAuth")]
    None,
}

// ============================================================================
// State model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptAction {
    pub content: String,
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpAction {
    pub host: String,
    pub method: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub ignore_certificate_errors: Option<bool>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub auth: Option<HttpAuth>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpAuth {
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,
    #[serde(default)]
    pub token: Option<BearerToken>,
    #[serde(default)]
    pub api_key: Option<ApiKeyAuth>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BearerToken {
    pub bearer_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyAuth {
    pub key: String,
    pub value: String,
    pub key_location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualAction {
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JiraAction {
    pub project: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub labels: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitHubAction {
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub assignees: Option<String>,
    #[serde(default)]
    pub labels: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocLinkAction {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitLabAction {
    pub project_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub labels: Option<String>,
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnsibleAction {
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub playbook_id: Option<String>,
    #[serde(default)]
    pub playbook_file_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputParameterState {
    pub name: String,
    pub description: String,
    pub label: String,
    pub required: bool,
    pub hidden: bool,
    #[serde(rename = "type")]
    pub parameter_type: String,
    pub value: String,
}

/// Host state of an automation action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutomationActionState {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub script: Option<ScriptAction>,
    #[serde(default)]
    pub http: Option<HttpAction>,
    #[serde(default)]
    pub manual: Option<ManualAction>,
    #[serde(default)]
    pub jira: Option<JiraAction>,
    #[serde(default)]
    pub github: Option<GitHubAction>,
    #[serde(default)]
    pub doc_link: Option<DocLinkAction>,
    #[serde(default)]
    pub gitlab: Option<GitLabAction>,
    #[serde(default)]
    pub ansible: Option<AnsibleAction>,
    #[serde(default)]
    pub input_parameter: Option<Vec<InputParameterState>>,
}

/// The configured action, one constructor per type.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Script(ScriptAction),
    Http(HttpAction),
    Manual(ManualAction),
    Jira(JiraAction),
    GitHub(GitHubAction),
    DocLink(DocLinkAction),
    GitLab(GitLabAction),
    Ansible(AnsibleAction),
}

impl Action {
    /// The wire discriminator.
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Script(_) => "SCRIPT",
            Self::Http(_) => "HTTP",
            Self::Manual(_) => "MANUAL",
            Self::Jira(_) => "JIRA",
            Self::GitHub(_) => "GITHUB",
            Self::DocLink(_) => "DOC_LINK",
            Self::GitLab(_) => "GITLAB",
            Self::Ansible(_) => "ANSIBLE",
        }
    }

    fn to_fields(&self) -> Result<Vec<ActionField>, ProviderError> {
        let mut fields = FieldList::default();
        match self {
            Self::Script(script) => {
                fields.push("script", BASE64.encode(script.content.as_bytes()), BASE64_ENCODING);
                fields.push_opt("subtype", &script.interpreter);
                fields.push_opt("timeout", &script.timeout);
                fields.push_opt("source", &script.source);
            },
            Self::Http(http) => {
                fields.push("host", http.host.clone(), ASCII);
                fields.push("method", http.method.clone(), ASCII);
                fields.push_opt("body", &http.body);
                if let Some(ignore) = http.ignore_certificate_errors {
                    fields.push("ignoreCertErrors", ignore.to_string(), ASCII);
                }
                fields.push_opt("timeout", &http.timeout);
                fields.push_opt("language", &http.language);
                fields.push_opt("content_type", &http.content_type);
                let auth = auth_document(http.auth.as_ref());
                fields.push("authen", serde_json::to_string(&auth)?, ASCII);
                if let Some(headers) = &http.headers {
                    fields.push("headers", serde_json::to_string(headers)?, ASCII);
                }
            },
            Self::Manual(manual) => fields.push("content", manual.content.clone(), ASCII),
            Self::Jira(jira) => {
                fields.push_opt("project", &jira.project);
                fields.push_opt("ticketActionType", &jira.operation);
                fields.push_opt("issue_type", &jira.issue_type);
                fields.push_opt("body", &jira.description);
                fields.push_opt("assignee", &jira.assignee);
                fields.push_opt("summary", &jira.title);
                fields.push_opt("labels", &jira.labels);
                fields.push_opt("comment", &jira.comment);
            },
            Self::GitHub(github) => {
                fields.push_opt("owner", &github.owner);
                fields.push_opt("repo", &github.repo);
                fields.push_opt("title", &github.title);
                fields.push_opt("body", &github.body);
                fields.push_opt("ticketType", &github.operation);
                fields.push_opt("assignees", &github.assignees);
                fields.push_opt("labels", &github.labels);
                fields.push_opt("comment", &github.comment);
            },
            Self::DocLink(link) => fields.push("url", link.url.clone(), UTF8),
            Self::GitLab(gitlab) => {
                fields.push_opt("projectId", &gitlab.project_id);
                fields.push_opt("title", &gitlab.title);
                fields.push_opt("body", &gitlab.description);
                fields.push_opt("ticketActionType", &gitlab.operation);
                fields.push_opt("labels", &gitlab.labels);
                fields.push_opt("issue_type", &gitlab.issue_type);
                fields.push_opt("comment", &gitlab.comment);
            },
            Self::Ansible(ansible) => {
                fields.push_opt("workflowId", &ansible.workflow_id);
                fields.push_opt("ansibleUrl", &ansible.url);
                fields.push_opt("hostId", &ansible.host_id);
                fields.push_opt("playbookId", &ansible.playbook_id);
                fields.push_opt("playbookFileName", &ansible.playbook_file_name);
            },
        }
        Ok(fields.0)
    }

    fn from_wire(wire: &AutomationAction) -> Result<Self, ProviderError> {
        let action = match wire.action_type.to_uppercase().as_str() {
            "SCRIPT" => Self::Script(ScriptAction {
                content: script_content(wire)?,
                interpreter: wire.text("subtype"),
                timeout: wire.text("timeout"),
                source: wire.text("source"),
            }),
            "HTTP" => Self::Http(HttpAction {
                host: wire.text("host").unwrap_or_default(),
                method: wire.text("method").unwrap_or_default(),
                body: wire.text("body"),
                headers: headers(wire)?,
                ignore_certificate_errors: wire.text("ignoreCertErrors").map(|v| v == "true"),
                timeout: wire.text("timeout"),
                language: wire.text("language"),
                content_type: wire.text("content_type"),
                auth: auth(wire)?,
            }),
            "MANUAL" => Self::Manual(ManualAction {
                content: wire.text("content").unwrap_or_default(),
            }),
            "JIRA" => Self::Jira(JiraAction {
                project: wire.text("project"),
                operation: wire.text("ticketActionType"),
                issue_type: wire.text("issue_type"),
                description: wire.text("body"),
                assignee: wire.text("assignee"),
                title: wire.text("summary"),
                labels: wire.text("labels"),
                comment: wire.text("comment"),
            }),
            "GITHUB" => Self::GitHub(GitHubAction {
                owner: wire.text("owner"),
                repo: wire.text("repo"),
                title: wire.text("title"),
                body: wire.text("body"),
                operation: wire.text("ticketType"),
                assignees: wire.text("assignees"),
                labels: wire.text("labels"),
                comment: wire.text("comment"),
            }),
            "DOC_LINK" => Self::DocLink(DocLinkAction {
                url: wire.text("url").unwrap_or_default(),
            }),
            "GITLAB" => Self::GitLab(GitLabAction {
                project_id: wire.text("projectId"),
                title: wire.text("title"),
                description: wire.text("body"),
                operation: wire.text("ticketActionType"),
                labels: wire.text("labels"),
                issue_type: wire.text("issue_type"),
                comment: wire.text("comment"),
            }),
            "ANSIBLE" => Self::Ansible(AnsibleAction {
                workflow_id: wire.text("workflowId"),
                playbook_id: wire.text("playbookId"),
                playbook_file_name: wire.text("playbookFileName"),
                url: wire.text("ansibleUrl"),
                host_id: wire.text("hostId"),
            }),
            other => {
                return Err(ProviderError::Decode(format!(
                    "unsupported automation action type '{}'",
                    other
                )))
            },
        };
        Ok(action)
    }
}

#[derive(Default)]
struct FieldList(Vec<ActionField>);

impl FieldList {
    fn push(&mut self, name: &str, value: String, encoding: &str) {
        self.0.push(ActionField {
            name: name.to_string(),
            description: None,
            value,
            encoding: encoding.to_string(),
            secured: false,
        });
    }

    fn push_opt(&mut self, name: &str, value: &Option<String>) {
        if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
            self.push(name, value.clone(), ASCII);
        }
    }
}

fn script_content(wire: &AutomationAction) -> Result<String, ProviderError> {
    let Some(field) = wire.field("script") else {
        return Err(ProviderError::Decode(format!(
            "script action {} has no script field",
            wire.name
        )));
    };
    if field.encoding != BASE64_ENCODING {
        return Ok(field.value.clone());
    }
    let bytes = BASE64
        .decode(field.value.trim())
        .map_err(|e| ProviderError::Decode(format!("script of {} is not valid base64: {}", wire.name, e)))?;
    String::from_utf8(bytes)
        .map_err(|e| ProviderError::Decode(format!("script of {} is not UTF-8: {}", wire.name, e)))
}

fn headers(wire: &AutomationAction) -> Result<Option<BTreeMap<String, String>>, ProviderError> {
    let Some(raw) = wire.text("headers") else {
        return Ok(None);
    };
    let parsed: BTreeMap<String, Value> = serde_json::from_str(&raw)
        .map_err(|e| ProviderError::Decode(format!("invalid HTTP headers of {}: {}", wire.name, e)))?;
    if parsed.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        parsed
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(s) => (name, s),
                other => (name, other.to_string()),
            })
            .collect(),
    ))
}

fn auth(wire: &AutomationAction) -> Result<Option<HttpAuth>, ProviderError> {
    let Some(raw) = wire.text("authen") else {
        return Ok(None);
    };
    let document: AuthDocument = serde_json::from_str(&raw)
        .map_err(|e| ProviderError::Decode(format!("invalid authentication of {}: {}", wire.name, e)))?;
    let auth = match document {
        AuthDocument::Basic { username, password } => HttpAuth {
            basic_auth: Some(BasicAuth { username, password }),
            ..HttpAuth::default()
        },
        AuthDocument::Bearer { bearer_token } => HttpAuth {
            token: Some(BearerToken { bearer_token }),
            ..HttpAuth::default()
        },
        AuthDocument::ApiKey {
            key,
            value,
            key_location,
        } => HttpAuth {
            api_key: Some(ApiKeyAuth {
                key,
                value,
                key_location,
            }),
            ..HttpAuth::default()
        },
        AuthDocument::None => return Ok(None),
    };
    Ok(Some(auth))
}

fn auth_document(auth: Option<&HttpAuth>) -> AuthDocument {
    let Some(auth) = auth else {
        return AuthDocument::None;
    };
    if let Some(basic) = &auth.basic_auth {
        AuthDocument::Basic {
            username: basic.username.clone(),
            password: basic.password.clone(),
        }
    } else if let Some(token) = &auth.token {
        AuthDocument::Bearer {
            bearer_token: token.bearer_token.clone(),
        }
    } else if let Some(key) = &auth.api_key {
        AuthDocument::ApiKey {
            key: key.key.clone(),
            value: key.value.clone(),
            key_location: key.key_location.clone(),
        }
    } else {
        AuthDocument::None
    }
}

impl AutomationActionState {
    /// The first populated action block, in [`ACTION_BLOCKS`] order.
    pub fn action(&self) -> Option<Action> {
        let ansible = self.ansible.clone().filter(|a| {
            a.workflow_id.is_some()
                || a.playbook_id.is_some()
                || a.playbook_file_name.is_some()
                || a.url.is_some()
                || a.host_id.is_some()
        });
        [
            self.script.clone().map(Action::Script),
            self.http.clone().map(Action::Http),
            self.manual.clone().map(Action::Manual),
            self.jira.clone().filter(|j| j.project.is_some()).map(Action::Jira),
            self.github.clone().filter(|g| g.owner.is_some()).map(Action::GitHub),
            self.doc_link.clone().map(Action::DocLink),
            self.gitlab
                .clone()
                .filter(|g| g.project_id.is_some())
                .map(Action::GitLab),
            ansible.map(Action::Ansible),
        ]
        .into_iter()
        .flatten()
        .next()
    }

    fn set_action(&mut self, action: Action) {
        match action {
            Action::Script(a) => self.script = Some(a),
            Action::Http(a) => self.http = Some(a),
            Action::Manual(a) => self.manual = Some(a),
            Action::Jira(a) => self.jira = Some(a),
            Action::GitHub(a) => self.github = Some(a),
            Action::DocLink(a) => self.doc_link = Some(a),
            Action::GitLab(a) => self.gitlab = Some(a),
            Action::Ansible(a) => self.ansible = Some(a),
        }
    }
}

/// Encode state as the wire object.
pub fn state_to_wire(state: &AutomationActionState) -> Result<AutomationAction, ProviderError> {
    let action = state.action().ok_or_else(|| {
        ProviderError::InvalidConfig(
            "One of script, http, manual, jira, github, doclink, gitlab, or ansible configuration must be provided"
                .to_string(),
        )
    })?;
    let input_parameters = state.input_parameter.as_ref().map(|parameters| {
        parameters
            .iter()
            .map(|p| InputParameter {
                name: p.name.clone(),
                description: p.description.clone(),
                label: p.label.clone(),
                required: p.required,
                hidden: p.hidden,
                parameter_type: p.parameter_type.clone(),
                value: p.value.clone(),
            })
            .collect()
    });
    Ok(AutomationAction {
        id: state.id.clone(),
        name: state.name.clone(),
        description: state.description.clone(),
        action_type: action.action_type().to_string(),
        tags: state.tags.clone(),
        fields: action.to_fields()?,
        input_parameters,
    })
}

/// Decode the wire object.
pub fn wire_to_state(wire: &AutomationAction) -> Result<AutomationActionState, ProviderError> {
    let mut state = AutomationActionState {
        id: wire.id.clone(),
        name: wire.name.clone(),
        description: wire.description.clone().filter(|d| !d.is_empty()),
        tags: wire.tags.clone(),
        input_parameter: wire
            .input_parameters
            .as_ref()
            .filter(|parameters| !parameters.is_empty())
            .map(|parameters| {
                parameters
                    .iter()
                    .map(|p| InputParameterState {
                        name: p.name.clone(),
                        description: p.description.clone(),
                        label: p.label.clone(),
                        required: p.required,
                        hidden: p.hidden,
                        parameter_type: p.parameter_type.clone(),
                        value: p.value.clone(),
                    })
                    .collect()
            }),
        ..AutomationActionState::default()
    };
    state.set_action(Action::from_wire(wire)?);
    Ok(state)
}

// ============================================================================
// Schema
// ============================================================================

fn optional_strings(block: Block, names: &[&str]) -> Block {
    names
        .iter()
        .fold(block, |block, name| block.with_attribute(*name, Attribute::optional_string()))
}

/// Add the action blocks and the input parameter list to `schema`.
pub fn with_action_blocks(schema: Schema) -> Schema {
    let auth = Block::new()
        .with_block(
            "basic_auth",
            NestedBlock::single(
                Block::new()
                    .with_attribute("username", Attribute::required_string())
                    .with_attribute("password", Attribute::required_string().sensitive()),
            ),
        )
        .with_block(
            "token",
            NestedBlock::single(
                Block::new().with_attribute("bearer_token", Attribute::required_string().sensitive()),
            ),
        )
        .with_block(
            "api_key",
            NestedBlock::single(
                Block::new()
                    .with_attribute("key", Attribute::required_string())
                    .with_attribute("value", Attribute::required_string().sensitive())
                    .with_attribute("key_location", Attribute::required_string()),
            ),
        );

    schema
        .with_block(
            "script",
            NestedBlock::single(optional_strings(
                Block::new()
                    .with_description("Script configuration for the automation action")
                    .with_attribute("content", Attribute::required_string()),
                &["interpreter", "timeout", "source"],
            )),
        )
        .with_block(
            "http",
            NestedBlock::single(
                optional_strings(
                    Block::new()
                        .with_description("HTTP configuration for the automation action")
                        .with_attribute("host", Attribute::required_string())
                        .with_attribute(
                            "method",
                            Attribute::required_string().with_allowed_values(HTTP_METHODS),
                        ),
                    &["body", "timeout", "language", "content_type"],
                )
                .with_attribute("headers", Attribute::optional_string_map())
                .with_attribute("ignore_certificate_errors", Attribute::optional_bool())
                .with_block("auth", NestedBlock::single(auth)),
            ),
        )
        .with_block(
            "manual",
            NestedBlock::single(
                Block::new()
                    .with_description("Manual action configuration")
                    .with_attribute("content", Attribute::required_string()),
            ),
        )
        .with_block(
            "jira",
            NestedBlock::single(optional_strings(
                Block::new().with_description("Jira action configuration"),
                &[
                    "project",
                    "operation",
                    "issue_type",
                    "description",
                    "assignee",
                    "title",
                    "labels",
                    "comment",
                ],
            )),
        )
        .with_block(
            "github",
            NestedBlock::single(optional_strings(
                Block::new().with_description("GitHub action configuration"),
                &[
                    "owner",
                    "repo",
                    "title",
                    "body",
                    "operation",
                    "assignees",
                    "labels",
                    "comment",
                ],
            )),
        )
        .with_block(
            "doc_link",
            NestedBlock::single(
                Block::new()
                    .with_description("Documentation link action configuration")
                    .with_attribute("url", Attribute::required_string()),
            ),
        )
        .with_block(
            "gitlab",
            NestedBlock::single(optional_strings(
                Block::new().with_description("GitLab action configuration"),
                &[
                    "project_id",
                    "title",
                    "description",
                    "operation",
                    "labels",
                    "issue_type",
                    "comment",
                ],
            )),
        )
        .with_block(
            "ansible",
            NestedBlock::single(optional_strings(
                Block::new().with_description("Ansible action configuration"),
                &["workflow_id", "playbook_id", "playbook_file_name", "url", "host_id"],
            )),
        )
        .with_block(
            "input_parameter",
            NestedBlock::list(
                Block::new()
                    .with_description("Input parameters for the automation action")
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute("description", Attribute::required_string())
                    .with_attribute("label", Attribute::required_string())
                    .with_attribute("required", Attribute::required_bool())
                    .with_attribute("hidden", Attribute::required_bool())
                    .with_attribute(
                        "type",
                        Attribute::required_string().with_allowed_values(PARAMETER_TYPES),
                    )
                    .with_attribute("value", Attribute::required_string()),
            ),
        )
        .with_exactly_one_of(ACTION_BLOCKS)
}

fn resource_schema() -> Schema {
    with_action_blocks(
        Schema::v0()
            .with_description("Automation action")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "tags",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::optional(),
                ),
            ),
    )
}

// ============================================================================
// Handle
// ============================================================================

/// Resource handle of automation actions.
pub struct AutomationActionResource {
    metadata: ResourceMetadata,
}

impl AutomationActionResource {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(
                RESOURCE_NAME,
                resource_schema(),
                AUTOMATION_ACTIONS_PATH,
                WriteMode::PostPut,
            ),
        }
    }
}

impl Default for AutomationActionResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for AutomationActionResource {
    type Wire = AutomationAction;

    fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    fn map_state_to_wire(&self, state: &Value) -> Result<AutomationAction, ProviderError> {
        state_to_wire(&from_state(state)?)
    }

    fn map_wire_to_state(
        &self,
        _prior: Option<&Value>,
        wire: &AutomationAction,
    ) -> Result<Value, ProviderError> {
        to_state(&wire_to_state(wire)?)
    }
}
