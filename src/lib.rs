//! Spacelift Provider
//!
//! This crate implements the core of a Spacelift infrastructure provider:
//! contexts plus the environment variables and mounted files attached to
//! contexts, stacks and modules.
//!
//! # Overview
//!
//! - **Config elements**: composite `<owner kind>/<owner id>/<name>`
//!   identifiers and create/read/delete against a remote store
//! - **Checksum gate**: SHA-256 checksums that let write-only values stay
//!   out of state without showing up as drift
//! - **Resources and data sources**: `spacelift_context`,
//!   `spacelift_environment_variable` and `spacelift_mounted_file`, held in
//!   an immutable [`resources::Registry`]
//! - **ProviderService trait**: the plan/apply/refresh surface a host drives
//! - **Remote store**: a GraphQL client with bounded, cancellable retries,
//!   and an in-memory store for tests
//! - **Logging**: `tracing` with an `RUST_LOG` filter; values are never logged
//!
//! # Quick Start
//!
//! ```
//! use spacelift_provider::{MemoryStore, ProviderService, SpaceliftProvider};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let provider = SpaceliftProvider::new()
//!     .unwrap()
//!     .with_backend(MemoryStore::new());
//!
//! provider
//!     .create("spacelift_context", json!({"name": "ctx1"}))
//!     .await
//!     .unwrap();
//!
//! let state = provider
//!     .create(
//!         "spacelift_mounted_file",
//!         json!({"context_id": "ctx1", "relative_path": "bacon.txt", "content": "YmFjb24="}),
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(state["id"], "context/ctx1/bacon.txt");
//!
//! provider.delete("spacelift_mounted_file", state.clone()).await.unwrap();
//! assert!(provider.read("spacelift_mounted_file", state).await.unwrap().is_none());
//! # });
//! ```
//!
//! Against the real API, call [`ProviderService::configure`] with an
//! `api_key_endpoint` and `api_token` (or set `SPACELIFT_API_KEY_ENDPOINT`
//! and `SPACELIFT_API_TOKEN`) instead of installing a backend.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checksum;
pub mod config;
pub mod config_element;
pub mod error;
pub mod graphql;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod service;
pub mod store;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use config_element::{ConfigElementId, ElementKind, Owner, OwnerKind};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::SpaceliftProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use store::{GraphqlStore, MemoryStore};
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
