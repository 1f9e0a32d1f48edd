//! Fastly Provider
//!
//! A declarative-infrastructure provider for Fastly edge services. The host
//! (Terraform or a compatible engine) hands the provider desired and prior
//! state as JSON; the provider computes plans and reconciles the remote
//! account through a [`FastlyClient`].
//!
//! # Overview
//!
//! - **Service resources**: `fastly_service_v1` (VCL) and
//!   `fastly_service_compute`, reconciled block by block onto a single
//!   mutable service version, then validated and activated
//! - **Versionless resources**: ACL entries, dictionary items, WAF
//!   configurations and TLS objects
//! - **Data sources**: the WAF rule catalogue and TLS inventories
//! - **Schema & validation**: builder-style schemas checked before any
//!   remote call
//! - **Testing**: [`testing::FakeFastly`], an in-memory account, and
//!   [`testing::ProviderTester`]
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use fastly_provider::testing::FakeFastly;
//! use fastly_provider::{FastlyProvider, ProviderService};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), fastly_provider::ProviderError> {
//! let provider = FastlyProvider::with_client(Arc::new(FakeFastly::new()));
//!
//! let plan = provider
//!     .plan("fastly_service_v1", None, json!({
//!         "name": "www",
//!         "domain": [{"name": "www.example.com"}],
//!         "backend": [{"name": "origin", "address": "origin.example.com"}]
//!     }))
//!     .await?;
//! let state = provider.create("fastly_service_v1", plan.planned_state).await?;
//! assert_eq!(state["active_version"], json!(1));
//! # Ok(())
//! # }
//! ```
//!
//! # Versions
//!
//! Fastly service configuration is versioned and active versions are
//! immutable. Every write resolves one mutable version up front, cloning
//! the latest version when it is locked, so all block changes of one apply
//! land together and activate together. Content of ACLs and dictionaries is
//! edited live and never creates a version.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod entries;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod provider;
pub mod resource;
pub mod resource_data;
pub mod schema;
pub mod service;
pub mod set;
pub mod testing;
pub mod tls;
pub mod types;
pub mod validation;
pub mod version;
pub mod waf_configuration;

// Re-export main types at crate root
pub use client::FastlyClient;
pub use config::Config;
pub use error::{ClientError, ErrorKind, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{Connector, FastlyProvider, ProviderService};
pub use resource::{DataSource, Resource};
pub use schema::ProviderSchema;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

pub use async_trait::async_trait;

pub use serde_json;
pub use tracing;
