//! Instana Provider
//!
//! This crate manages Instana monitoring configuration as code. A host
//! runtime drives it through [`ProviderService`]: it parses configuration,
//! stores state and decides the order of operations, while the provider maps
//! declarative entity state onto the Instana REST API and back.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Provider**: [`InstanaProvider`], the [`ProviderService`] registered with the host
//! - **Resources**: alerting channels, application/infrastructure/website/
//!   mobile/log/synthetic/SLO alert configurations, SLOs and SLIs, application
//!   perspectives, dashboards, event specifications, teams, groups, roles, API
//!   tokens, maintenance windows, synthetic tests and automation
//! - **Data sources**: natural key lookups of existing entities
//! - **REST client**: throttled writes over a bounded queue, direct reads
//! - **Tag filters**: parsing, canonical rendering and API conversion
//! - **Schema types**: declarative attribute and block descriptions
//! - **Logging**: integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use instana_provider::{InstanaProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     instana_provider::init_logging();
//!
//!     let provider = InstanaProvider::new();
//!     provider
//!         .configure(json!({"api_token": "secret", "host": "tenant.instana.io"}))
//!         .await?;
//!
//!     let plan = provider
//!         .plan("team", None, json!({"tag": "sre"}), json!({"tag": "sre"}))
//!         .await?;
//!     let state = provider.create("team", plan.planned_state).await?;
//!     println!("created team {}", state["id"]);
//!
//!     provider.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Provider Protocol
//!
//! - **Schema / Metadata**: provider configuration, resource and data source schemas
//! - **ValidateProviderConfig / Configure / Stop**: connection lifecycle
//! - **ValidateResourceConfig**: schema and entity-specific checks
//! - **UpgradeResourceState**: migrates state from older schema versions
//! - **Plan**: planned state and attribute changes
//! - **Create/Read/Update/Delete**: CRUD operations for resources
//! - **ImportResource**: adopts existing entities by identifier
//! - **ValidateDataSourceConfig / ReadDataSource**: lookups of existing entities

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod datasource;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resourcehandle;
pub mod restapi;
pub mod schema;
pub mod service;
pub mod shared;
pub mod tagfilter;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
pub mod datasources;

#[allow(missing_docs)]
pub mod resources;

// Re-export main types at crate root
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::InstanaProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
