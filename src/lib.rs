//! Instatus Provider
//!
//! Reconciliation core of an infrastructure-as-code provider for the
//! [Instatus](https://instatus.com) status-page service. A host (typically a
//! plugin server speaking the orchestrator's protocol) drives
//! [`InstatusProvider`] through the [`ProviderService`] trait with JSON
//! configuration and state documents.
//!
//! # Overview
//!
//! - **Configuration**: the API key comes from `api_key` or `INSTATUS_APIKEY`
//!   ([`config`])
//! - **Resources**: `instatus_template` ([`template`]) and `instatus_component`
//!   ([`component`]), both driven by the generic [`Reconciler`]
//! - **Data sources**: `instatus_user` ([`user`])
//! - **Remote client**: the [`InstatusApi`] trait and its HTTP implementation
//!   [`Client`]
//! - **Test tooling**: [`testing::StubInstatus`] and [`testing::ProviderTester`]
//!
//! # Quick Start
//!
//! ```ignore
//! use instatus_provider::{init_logging, InstatusProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = InstatusProvider::new();
//!     provider.configure(json!({"api_key": "..."})).await?;
//!
//!     let state = provider
//!         .create("instatus_component", json!({
//!             "page_id": "ckxyz",
//!             "name": "API",
//!             "status": "OPERATIONAL"
//!         }))
//!         .await?;
//!     println!("created {}", state["id"]);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod component;
pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod reconciler;
pub mod schema;
pub mod service;
pub mod template;
pub mod testing;
pub mod types;
pub mod user;
pub mod validation;

// Re-export main types at crate root
pub use client::{ApiError, Client, InstatusApi};
pub use config::{ConfiguredValue, ProviderConfig, API_KEY_ENV_VAR};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::InstatusProvider;
pub use reconciler::{ManagedResource, Reconciler};
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, Field, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
