//! Typed CRUD view over one resource path.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::client::{QueryParams, RestClient};
use crate::error::ProviderError;

/// A wire object exchanged with a resource path.
pub trait WireModel: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Identifier addressing the entity under its resource path, if known.
    fn id(&self) -> Option<&str>;
}

/// How an entity is created and updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create with POST to the path, update with PUT to `path/id`.
    PostPut,
    /// Create and update with PUT to `path/id`; the id is generated by the client.
    PutPut,
    /// Create with POST to the path, update with POST to `path/id`.
    PostPost,
    /// Create with POST; updates are not supported by the API.
    PostNoUpdate,
    /// Create with POST to the path, update with PUT to `path/id`; the
    /// scalar fields travel as query parameters and no body is sent.
    ByQuery,
    /// Lookups only.
    ReadOnly,
}

/// Typed CRUD facade bound to a resource path.
#[derive(Debug, Clone)]
pub struct RestResource<T> {
    client: RestClient,
    path: &'static str,
    mode: WriteMode,
    _model: PhantomData<fn() -> T>,
}

impl<T: WireModel> RestResource<T> {
    /// Bind `path` on `client` with the given write mode.
    pub fn new(client: RestClient, path: &'static str, mode: WriteMode) -> Self {
        Self {
            client,
            path,
            mode,
            _model: PhantomData,
        }
    }

    /// The resource path.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// The write mode.
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// List every entity, in server order.
    pub async fn get_all(&self) -> Result<Vec<T>, ProviderError> {
        let body = self.client.get(self.path).await?;
        decode_list(&body)
    }

    /// Fetch one entity by id.
    pub async fn get_one(&self, id: &str) -> Result<T, ProviderError> {
        let body = self.client.get_one(self.path, id).await?;
        decode(&body)
    }

    /// List the entities matching the query parameters.
    pub async fn get_by_query(&self, query: &QueryParams) -> Result<Vec<T>, ProviderError> {
        let body = self.client.get_by_query(self.path, query).await?;
        decode_list(&body)
    }

    /// Create the entity and return the server's representation.
    pub async fn create(&self, object: &T) -> Result<T, ProviderError> {
        let body = serde_json::to_value(object)?;
        let response = match self.mode {
            WriteMode::PostPut | WriteMode::PostPost | WriteMode::PostNoUpdate => {
                self.client.post(self.path, &body).await?
            },
            WriteMode::PutPut => {
                self.client
                    .put_at(self.path, self.path_id(object)?, &body)
                    .await?
            },
            WriteMode::ByQuery => self.client.post_by_query(self.path, &query_params(&body)).await?,
            WriteMode::ReadOnly => return Err(self.unsupported("create")),
        };
        decode_or_sent(&response, object)
    }

    /// Update the entity and return the server's representation.
    pub async fn update(&self, object: &T) -> Result<T, ProviderError> {
        let body = serde_json::to_value(object)?;
        let response = match self.mode {
            WriteMode::PostPut | WriteMode::PutPut => {
                self.client
                    .put_at(self.path, self.path_id(object)?, &body)
                    .await?
            },
            WriteMode::PostPost => {
                self.client
                    .post_at(self.path, self.path_id(object)?, &body)
                    .await?
            },
            WriteMode::ByQuery => {
                self.client
                    .put_by_query(self.path, self.path_id(object)?, &query_params(&body))
                    .await?
            },
            WriteMode::PostNoUpdate | WriteMode::ReadOnly => {
                return Err(self.unsupported("update"))
            },
        };
        decode_or_sent(&response, object)
    }

    /// Delete the entity.
    pub async fn delete(&self, object: &T) -> Result<(), ProviderError> {
        self.delete_by_id(self.path_id(object)?).await
    }

    /// Delete the entity with the given id.
    pub async fn delete_by_id(&self, id: &str) -> Result<(), ProviderError> {
        if self.mode == WriteMode::ReadOnly {
            return Err(self.unsupported("delete"));
        }
        self.client.delete(self.path, id).await
    }

    fn path_id<'a>(&self, object: &'a T) -> Result<&'a str, ProviderError> {
        object.id().filter(|id| !id.is_empty()).ok_or_else(|| {
            ProviderError::InvalidConfig(format!("an identifier is required to address {}", self.path))
        })
    }

    fn unsupported(&self, operation: &str) -> ProviderError {
        ProviderError::Unimplemented(format!(
            "{} is not supported for {}",
            operation, self.path
        ))
    }
}

/// Decode a single wire object.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProviderError> {
    serde_json::from_slice(body).map_err(|e| decode_error(e, body))
}

/// Decode a list returned either as a bare array or as `{"items": [...]}`.
pub(crate) fn decode_list<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, ProviderError> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| decode_error(e, body))?;
    let items = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) if map.get("items").is_some_and(|v| v.is_array()) => {
            map.remove("items").unwrap_or_default()
        },
        serde_json::Value::Null => return Ok(Vec::new()),
        other => {
            return Err(ProviderError::Decode(format!(
                "expected a list, got {}",
                clip(&other.to_string())
            )))
        },
    };
    serde_json::from_value(items).map_err(|e| decode_error(e, body))
}

/// Scalar fields of a serialized object, except the id.
fn query_params(body: &serde_json::Value) -> QueryParams {
    body.as_object()
        .into_iter()
        .flatten()
        .filter(|(key, _)| key.as_str() != "id")
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), value))
        })
        .collect()
}

fn decode_or_sent<T: WireModel>(response: &[u8], sent: &T) -> Result<T, ProviderError> {
    if response.iter().all(u8::is_ascii_whitespace) {
        return Ok(sent.clone());
    }
    decode(response)
}

fn decode_error(err: serde_json::Error, body: &[u8]) -> ProviderError {
    ProviderError::Decode(format!(
        "{} in {}",
        err,
        clip(&String::from_utf8_lossy(body))
    ))
}

const MAX_FRAGMENT: usize = 200;

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_FRAGMENT {
        text.to_string()
    } else {
        let clipped: String = text.chars().take(MAX_FRAGMENT).collect();
        format!("{}...", clipped)
    }
}
