//! The remote store holding contexts and config elements.
//!
//! Resources never talk to the API directly. They go through the traits in
//! this module, which keeps the GraphQL mapping in [`graphql`] and lets tests
//! swap in the in-memory [`MemoryStore`].

pub mod graphql;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config_element::{ElementKind, Owner};
use crate::graphql::GraphqlError;

pub use self::graphql::GraphqlStore;
pub use self::memory::MemoryStore;

/// Failures reported by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The owning context, stack or module does not exist.
    #[error("{0} not found")]
    OwnerNotFound(String),

    /// The owner exists but has no element with that name.
    #[error("{0} not found")]
    ElementNotFound(String),

    /// A top-level entity (e.g. a context) does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The write clashes with existing remote state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The GraphQL API failed or rejected the request.
    #[error(transparent)]
    Graphql(#[from] GraphqlError),
}

impl StoreError {
    /// Whether the addressed owner or element is missing.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            Self::OwnerNotFound(_) | Self::ElementNotFound(_) | Self::NotFound(_)
        )
    }
}

/// Payload of a config element write.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInput {
    /// Element name (the API calls it `id`).
    #[serde(rename = "id")]
    pub name: String,
    /// Environment variable or mounted file.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// Plaintext value; base64 for mounted files.
    pub value: String,
    /// Hide the value from subsequent reads.
    pub write_only: bool,
    /// Optional free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl fmt::Debug for ConfigInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigInput")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value", &"<redacted>")
            .field("write_only", &self.write_only)
            .field("description", &self.description)
            .finish()
    }
}

/// A config element as returned by the store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    /// Element name.
    #[serde(rename = "id")]
    pub name: String,
    /// Hex SHA-256 of the element content.
    pub checksum: String,
    /// Environment variable or mounted file.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// The value; never present for write-only elements.
    #[serde(default)]
    pub value: Option<String>,
    /// Whether the value is hidden from reads.
    pub write_only: bool,
    /// Optional free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl fmt::Debug for ConfigRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigRecord")
            .field("name", &self.name)
            .field("checksum", &self.checksum)
            .field("kind", &self.kind)
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .field("write_only", &self.write_only)
            .field("description", &self.description)
            .finish()
    }
}

/// Payload of a context create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInput {
    /// Human-readable name; the ID is derived from it on create.
    pub name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Labels attached to the context.
    pub labels: Vec<String>,
    /// Space the context lives in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
}

/// A context as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRecord {
    /// Server-issued ID.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Labels attached to the context.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Space the context lives in.
    #[serde(default)]
    pub space: Option<String>,
}

/// Persistence of config elements scoped to an owner.
#[async_trait]
pub trait RemoteConfigStore: Send + Sync {
    /// Attach a new element to `owner`.
    async fn add_config(&self, owner: &Owner, input: &ConfigInput) -> Result<(), StoreError>;

    /// Look up the element called `name` under `owner`.
    ///
    /// Returns [`StoreError::OwnerNotFound`] or [`StoreError::ElementNotFound`]
    /// when either side is missing.
    async fn get_config(&self, owner: &Owner, name: &str) -> Result<ConfigRecord, StoreError>;

    /// Remove the element called `name` from `owner`.
    async fn delete_config(&self, owner: &Owner, name: &str) -> Result<(), StoreError>;
}

/// Persistence of contexts.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Create a context.
    async fn create_context(&self, input: &ContextInput) -> Result<ContextRecord, StoreError>;

    /// Fetch a context by ID, [`StoreError::NotFound`] if it does not exist.
    async fn get_context(&self, id: &str) -> Result<ContextRecord, StoreError>;

    /// Replace the mutable fields of a context.
    async fn update_context(
        &self,
        id: &str,
        input: &ContextInput,
    ) -> Result<ContextRecord, StoreError>;

    /// Delete a context and everything attached to it.
    async fn delete_context(&self, id: &str) -> Result<(), StoreError>;
}

/// Everything a configured provider needs from the remote side.
pub trait Backend: RemoteConfigStore + ContextStore {}

impl<T: RemoteConfigStore + ContextStore> Backend for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_input_wire_shape() {
        let input = ConfigInput {
            name: "BACON".to_string(),
            kind: ElementKind::EnvironmentVariable,
            value: "is tasty".to_string(),
            write_only: true,
            description: None,
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "id": "BACON",
                "type": "ENVIRONMENT_VARIABLE",
                "value": "is tasty",
                "writeOnly": true
            })
        );
    }

    #[test]
    fn test_config_record_from_wire() {
        let record: ConfigRecord = serde_json::from_value(json!({
            "id": "bacon.txt",
            "checksum": "abc",
            "type": "FILE_MOUNT",
            "value": null,
            "writeOnly": true
        }))
        .unwrap();
        assert_eq!(record.name, "bacon.txt");
        assert_eq!(record.kind, ElementKind::FileMount);
        assert!(record.value.is_none());
        assert!(record.description.is_none());
    }

    #[test]
    fn test_debug_never_prints_values() {
        let input = ConfigInput {
            name: "SECRET".to_string(),
            kind: ElementKind::EnvironmentVariable,
            value: "hunter2".to_string(),
            write_only: false,
            description: None,
        };
        assert!(!format!("{:?}", input).contains("hunter2"));

        let record = ConfigRecord {
            name: "SECRET".to_string(),
            checksum: "abc".to_string(),
            kind: ElementKind::EnvironmentVariable,
            value: Some("hunter2".to_string()),
            write_only: false,
            description: None,
        };
        assert!(!format!("{:?}", record).contains("hunter2"));
    }

    #[test]
    fn test_store_error_is_missing() {
        assert!(StoreError::OwnerNotFound("stack s".to_string()).is_missing());
        assert!(StoreError::NotFound("context c".to_string()).is_missing());
        assert!(!StoreError::Conflict("dup".to_string()).is_missing());
    }
}
