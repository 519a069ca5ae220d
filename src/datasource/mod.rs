//! Read-only lookups by natural key.
//!
//! The platform exposes list-all and fetch-by-id but no search by name, so a
//! lookup lists every entity and keeps the first one whose natural key
//! matches, in server order. Natural keys are not unique; no match is a
//! terminal [`ProviderError::NotFound`].

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::ProviderError;
use crate::restapi::{RestClient, RestResource, WireModel, WriteMode};
use crate::schema::{Diagnostic, Schema};

/// Static description of a data source.
#[derive(Debug, Clone)]
pub struct DataSourceMetadata {
    /// Stable data source name used by the host.
    pub name: &'static str,
    /// Declarative schema of configuration and result.
    pub schema: Schema,
    /// REST resource path listed by the lookup.
    pub path: &'static str,
}

impl DataSourceMetadata {
    /// Describe a data source.
    pub fn new(name: &'static str, schema: Schema, path: &'static str) -> Self {
        Self { name, schema, path }
    }
}

/// How a key part is compared with the candidate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Byte-wise equality.
    Exact,
    /// Equality ignoring case.
    CaseInsensitive,
}

/// One named component of a natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPart {
    /// Attribute name of the part.
    pub name: &'static str,
    /// Requested value.
    pub value: String,
    /// Comparison applied to candidates.
    pub mode: MatchMode,
}

impl KeyPart {
    fn matches(&self, candidate: Option<&str>) -> bool {
        match (candidate, self.mode) {
            (Some(candidate), MatchMode::Exact) => candidate == self.value,
            (Some(candidate), MatchMode::CaseInsensitive) => {
                candidate.to_lowercase() == self.value.to_lowercase()
            },
            (None, _) => false,
        }
    }
}

/// A natural key: every part must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupKey {
    parts: Vec<KeyPart>,
}

impl LookupKey {
    /// An empty key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a part compared byte-wise.
    pub fn exact(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.parts.push(KeyPart {
            name,
            value: value.into(),
            mode: MatchMode::Exact,
        });
        self
    }

    /// Add a part compared ignoring case.
    pub fn case_insensitive(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.parts.push(KeyPart {
            name,
            value: value.into(),
            mode: MatchMode::CaseInsensitive,
        });
        self
    }

    /// The key parts in declaration order.
    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    /// True when every part matches the candidate value returned for it.
    pub fn matches<'a, F>(&self, candidate: F) -> bool
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        self.parts.iter().all(|part| part.matches(candidate(part.name)))
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "{} '{}'", part.name, part.value)?;
        }
        Ok(())
    }
}

/// Return the first item matching `key`, in the given order.
pub fn find_first<T, F>(
    entity: &str,
    items: Vec<T>,
    key: &LookupKey,
    candidate: F,
) -> Result<T, ProviderError>
where
    F: for<'a> Fn(&'a T, &str) -> Option<&'a str>,
{
    items
        .into_iter()
        .find(|item| key.matches(|part| candidate(item, part)))
        .ok_or_else(|| ProviderError::NotFound(format!("no {} found with {}", entity, key)))
}

/// Read a required string attribute of a data source configuration.
pub fn required_string(config: &Value, field: &str) -> Result<String, ProviderError> {
    config
        .get(field)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidConfig(format!("{} is required", field)))
}

/// Read an optional string attribute of a data source configuration.
pub fn optional_string(config: &Value, field: &str) -> Option<String> {
    config
        .get(field)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Object-safe view of a data source, as registered by the provider.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Static description.
    fn metadata(&self) -> &DataSourceMetadata;

    /// Checks beyond the schema.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Resolve the configuration into the result state.
    async fn read(&self, client: &RestClient, config: Value) -> Result<Value, ProviderError>;
}

/// Entity specific behavior of a find-first-over-list-all lookup.
pub trait LookupHandle: Send + Sync + 'static {
    /// Wire model of the listed entities.
    type Wire: WireModel;

    /// Name, schema and path.
    fn metadata(&self) -> &DataSourceMetadata;

    /// Read-only view of the listed path.
    fn rest_resource(&self, client: &RestClient) -> RestResource<Self::Wire> {
        RestResource::new(client.clone(), self.metadata().path, WriteMode::ReadOnly)
    }

    /// Build the natural key from configuration.
    fn lookup_key(&self, config: &Value) -> Result<LookupKey, ProviderError>;

    /// Value of the key part `part` on a listed entity.
    fn candidate<'a>(&self, wire: &'a Self::Wire, part: &str) -> Option<&'a str>;

    /// Produce the result state from configuration and the matched entity.
    fn map_wire_to_state(&self, config: &Value, wire: &Self::Wire) -> Result<Value, ProviderError>;
}

/// Generic find-first lookup over a [`LookupHandle`].
pub struct LookupDataSource<H> {
    handle: H,
}

impl<H: LookupHandle> LookupDataSource<H> {
    /// Wrap a handle.
    pub fn new(handle: H) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl<H: LookupHandle> DataSource for LookupDataSource<H> {
    fn metadata(&self) -> &DataSourceMetadata {
        self.handle.metadata()
    }

    #[instrument(skip_all, fields(data_source = self.handle.metadata().name))]
    async fn read(&self, client: &RestClient, config: Value) -> Result<Value, ProviderError> {
        let key = self.handle.lookup_key(&config)?;
        let items = self.handle.rest_resource(client).get_all().await?;
        debug!(
            data_source = self.handle.metadata().name,
            candidates = items.len(),
            key = %key,
            "Looking up entity"
        );
        let found = find_first(self.handle.metadata().name, items, &key, |item, part| {
            self.handle.candidate(item, part)
        })?;
        self.handle.map_wire_to_state(&config, &found)
    }
}

/// Merge `attributes` into the configuration object.
pub fn merge_into(config: &Value, attributes: Value) -> Value {
    let mut merged = match config {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    if let Value::Object(attributes) = attributes {
        merged.extend(attributes);
    }
    Value::Object(merged)
}
