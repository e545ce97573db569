//! Environment variables and mounted files attached to an owner.
//!
//! A config element lives under exactly one context, stack or module and is
//! addressed by a composite identifier (see [`id`]). Elements are never
//! updated in place: changing any field replaces the element.
//!
//! Write-only elements keep their plaintext out of state. Only the checksum
//! computed at write time is kept, which is enough to detect drift without
//! ever reading the value back.

pub mod id;
pub mod owner;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::checksum::checksum_hex;
use crate::error::ProviderError;
use crate::store::{ConfigInput, ConfigRecord, RemoteConfigStore, StoreError};

pub use self::id::ConfigElementId;
pub use self::owner::{Owner, OwnerKind};

/// The two flavours of config element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementKind {
    /// Exposed to runs as an environment variable.
    EnvironmentVariable,
    /// Written to the run's workspace as a file; values travel base64-encoded.
    FileMount,
}

impl ElementKind {
    /// Human-readable name used in error messages.
    pub fn noun(self) -> &'static str {
        match self {
            ElementKind::EnvironmentVariable => "environment variable",
            ElementKind::FileMount => "mounted file",
        }
    }

    /// The raw bytes a value stands for.
    ///
    /// Mounted file values are base64 and are decoded; environment variables
    /// are taken as UTF-8.
    pub fn content(self, value: &str) -> Result<Vec<u8>, ProviderError> {
        match self {
            ElementKind::EnvironmentVariable => Ok(value.as_bytes().to_vec()),
            ElementKind::FileMount => base64::engine::general_purpose::STANDARD
                .decode(value)
                .map_err(|e| {
                    ProviderError::Validation(format!("mounted file content is not base64: {e}"))
                }),
        }
    }

    /// Hex SHA-256 of the content behind `value`.
    pub fn checksum(self, value: &str) -> Result<String, ProviderError> {
        Ok(checksum_hex(self.content(value)?))
    }
}

/// A config element as known to the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigElement {
    /// Composite identifier.
    pub id: ConfigElementId,
    /// Environment variable or mounted file.
    pub kind: ElementKind,
    /// The value, absent for write-only elements.
    pub value: Option<String>,
    /// Hex SHA-256 of the content.
    pub checksum: String,
    /// Whether reads hide the value.
    pub write_only: bool,
    /// Optional description.
    pub description: Option<String>,
}

impl ConfigElement {
    fn from_record(id: ConfigElementId, record: ConfigRecord) -> Self {
        let value = if record.write_only {
            None
        } else {
            record.value
        };
        Self {
            id,
            kind: record.kind,
            value,
            checksum: record.checksum,
            write_only: record.write_only,
            description: record.description,
        }
    }
}

impl std::fmt::Debug for ConfigElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigElement")
            .field("id", &self.id.to_string())
            .field("kind", &self.kind)
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .field("checksum", &self.checksum)
            .field("write_only", &self.write_only)
            .field("description", &self.description)
            .finish()
    }
}

/// Everything needed to write a new element.
#[derive(Clone)]
pub struct NewConfigElement {
    /// Owner to attach the element to.
    pub owner: Owner,
    /// Element name.
    pub name: String,
    /// Environment variable or mounted file.
    pub kind: ElementKind,
    /// Plaintext value; base64 for mounted files.
    pub value: String,
    /// Hide the value from subsequent reads.
    pub write_only: bool,
    /// Optional description.
    pub description: Option<String>,
}

/// Create, read and delete operations on config elements.
pub struct ConfigElements<'a, S: RemoteConfigStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RemoteConfigStore + ?Sized> ConfigElements<'a, S> {
    /// Operate on elements held by `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Write a new element and return it with its composite identifier.
    ///
    /// The returned value is cleared when the element is write-only.
    #[instrument(
        skip(self, element),
        fields(owner = %element.owner, name = %element.name, kind = element.kind.noun())
    )]
    pub async fn create(&self, element: NewConfigElement) -> Result<ConfigElement, ProviderError> {
        let NewConfigElement {
            owner,
            name,
            kind,
            value,
            write_only,
            description,
        } = element;

        let id = ConfigElementId::new(owner, name)?;
        let checksum = kind.checksum(&value)?;

        let input = ConfigInput {
            name: id.name().to_string(),
            kind,
            value,
            write_only,
            description,
        };
        self.store
            .add_config(id.owner(), &input)
            .await
            .map_err(|e| {
                ProviderError::remote_write(
                    format!("could not create {} {}", id.owner_kind(), kind.noun()),
                    e,
                )
            })?;

        info!(id = %id, write_only, "Config element created");

        let value = if write_only { None } else { Some(input.value) };
        Ok(ConfigElement {
            id,
            kind,
            value,
            checksum,
            write_only,
            description: input.description,
        })
    }

    /// Read an element back by its composite identifier.
    ///
    /// Returns `Ok(None)` when the owner or the element no longer exists, or
    /// when the name now refers to an element of a different kind.
    #[instrument(skip(self), fields(kind = kind.noun()))]
    pub async fn read(
        &self,
        id: &str,
        kind: ElementKind,
    ) -> Result<Option<ConfigElement>, ProviderError> {
        let id: ConfigElementId = id.parse()?;

        let result = self.store.get_config(id.owner(), id.name()).await;
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_missing() => {
                warn!(id = %id, reason = %e, "Config element is gone, dropping it from state");
                return Ok(None);
            },
            Err(e) => {
                return Err(ProviderError::remote_read(
                    format!("could not query for {} {}", id.owner_kind(), kind.noun()),
                    e,
                ))
            },
        };

        if record.kind != kind {
            warn!(
                id = %id,
                found = record.kind.noun(),
                "Config element changed kind, dropping it from state"
            );
            return Ok(None);
        }

        debug!(id = %id, write_only = record.write_only, "Config element read");
        Ok(Some(ConfigElement::from_record(id, record)))
    }

    /// Look up an element by owner and name, failing if it does not exist.
    #[instrument(skip(self), fields(owner = %owner, kind = kind.noun()))]
    pub async fn lookup(
        &self,
        owner: Owner,
        name: &str,
        kind: ElementKind,
    ) -> Result<ConfigElement, ProviderError> {
        let id = ConfigElementId::new(owner, name)?;
        let missing = || {
            ProviderError::ElementNotFound(format!("{} {} on {}", kind.noun(), name, id.owner()))
        };

        let result = self.store.get_config(id.owner(), id.name()).await;
        match result {
            Ok(record) if record.kind == kind => Ok(ConfigElement::from_record(id, record)),
            Ok(_) => Err(missing()),
            Err(StoreError::OwnerNotFound(_)) => {
                Err(ProviderError::OwnerNotFound(id.owner().to_string()))
            },
            Err(StoreError::ElementNotFound(_)) => Err(missing()),
            Err(e) => Err(ProviderError::remote_read(
                format!("could not query for {} {}", id.owner_kind(), kind.noun()),
                e,
            )),
        }
    }

    /// Delete an element by its composite identifier.
    #[instrument(skip(self), fields(kind = kind.noun()))]
    pub async fn delete(&self, id: &str, kind: ElementKind) -> Result<(), ProviderError> {
        let id: ConfigElementId = id.parse()?;

        self.store
            .delete_config(id.owner(), id.name())
            .await
            .map_err(|e| {
                ProviderError::remote_delete(
                    format!("could not delete {} {}", id.owner_kind(), kind.noun()),
                    e,
                )
            })?;

        info!(id = %id, "Config element deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum_hex;
    use crate::store::{ContextInput, ContextStore, MemoryStore};
    use tokio_test::{assert_err, assert_ok};

    fn env_var(owner: Owner, name: &str, value: &str, write_only: bool) -> NewConfigElement {
        NewConfigElement {
            owner,
            name: name.to_string(),
            kind: ElementKind::EnvironmentVariable,
            value: value.to_string(),
            write_only,
            description: None,
        }
    }

    async fn store_with_context(name: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_context(&ContextInput {
                name: name.to_string(),
                description: None,
                labels: vec![],
                space: None,
            })
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_element_kind_checksum() {
        let kind = ElementKind::EnvironmentVariable;
        assert_eq!(kind.checksum("is tasty").unwrap(), checksum_hex("is tasty"));

        // "YmFjb24=" is base64 for "bacon"
        let kind = ElementKind::FileMount;
        assert_eq!(kind.checksum("YmFjb24=").unwrap(), checksum_hex("bacon"));
        assert!(kind.checksum("not base64!").is_err());
    }

    #[tokio::test]
    async fn test_create_read_delete() {
        let store = store_with_context("ctx1").await;
        let elements = ConfigElements::new(&store);

        let created = elements
            .create(env_var(Owner::Context("ctx1".to_string()), "BACON", "is tasty", false))
            .await
            .unwrap();
        assert_eq!(created.id.to_string(), "context/ctx1/BACON");
        assert_eq!(created.value.as_deref(), Some("is tasty"));
        assert_eq!(created.checksum, checksum_hex("is tasty"));

        let read = elements
            .read("context/ctx1/BACON", ElementKind::EnvironmentVariable)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.value.as_deref(), Some("is tasty"));
        assert_eq!(read.checksum, checksum_hex("is tasty"));
        assert!(!read.write_only);

        assert_ok!(
            elements
                .delete("context/ctx1/BACON", ElementKind::EnvironmentVariable)
                .await
        );
        let gone = elements
            .read("context/ctx1/BACON", ElementKind::EnvironmentVariable)
            .await
            .unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_write_only_value_is_hidden() {
        let store = MemoryStore::new().with_stack("my-stack-id");
        let elements = ConfigElements::new(&store);

        let created = elements
            .create(env_var(Owner::Stack("my-stack-id".to_string()), "BACON", "is tasty", true))
            .await
            .unwrap();
        assert!(created.value.is_none());
        assert_eq!(
            created.checksum,
            "4d5d01ea427b10dd483e8fce5b5149fb5a9814e9ee614176b756ca4a65c8f154"
        );

        let read = elements
            .read(&created.id.to_string(), ElementKind::EnvironmentVariable)
            .await
            .unwrap()
            .unwrap();
        assert!(read.value.is_none());
        assert!(read.write_only);
        assert_eq!(read.checksum, created.checksum);
    }

    #[tokio::test]
    async fn test_read_missing_owner_is_absent() {
        let store = MemoryStore::new();
        let elements = ConfigElements::new(&store);

        let read = elements
            .read("stack/deleted-stack/BACON", ElementKind::EnvironmentVariable)
            .await
            .unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn test_read_rejects_bad_identifiers() {
        let store = MemoryStore::new();
        let elements = ConfigElements::new(&store);

        let err = assert_err!(
            elements
                .read("not-enough-parts", ElementKind::EnvironmentVariable)
                .await
        );
        assert!(matches!(err, ProviderError::MalformedIdentifier(_)));

        let err = assert_err!(elements.read("a/b/c/d", ElementKind::FileMount).await);
        assert!(matches!(err, ProviderError::MalformedIdentifier(_)));

        let err = assert_err!(
            elements
                .read("space/root/BACON", ElementKind::EnvironmentVariable)
                .await
        );
        assert!(matches!(err, ProviderError::UnsupportedOwnerKind(_)));
    }

    #[tokio::test]
    async fn test_read_kind_mismatch_is_absent() {
        let store = MemoryStore::new().with_module("vpc");
        let elements = ConfigElements::new(&store);
        elements
            .create(env_var(Owner::Module("vpc".to_string()), "bacon.txt", "x", false))
            .await
            .unwrap();

        let read = elements
            .read("module/vpc/bacon.txt", ElementKind::FileMount)
            .await
            .unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn test_create_on_missing_owner_fails_with_context() {
        let store = MemoryStore::new();
        let elements = ConfigElements::new(&store);

        let err = elements
            .create(env_var(Owner::Context("nope".to_string()), "BACON", "x", true))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RemoteWrite { .. }));
        assert_eq!(
            err.to_string(),
            "could not create context environment variable: context nope not found"
        );
    }

    #[tokio::test]
    async fn test_create_rejects_separator_in_name() {
        let store = MemoryStore::new().with_stack("s");
        let elements = ConfigElements::new(&store);

        let err = elements
            .create(env_var(Owner::Stack("s".to_string()), "A/B", "x", true))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_element_fails() {
        let store = MemoryStore::new().with_stack("s");
        let elements = ConfigElements::new(&store);

        let err = elements
            .delete("stack/s/BACON", ElementKind::EnvironmentVariable)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RemoteDelete { .. }));
        assert!(err.to_string().starts_with("could not delete stack environment variable"));
    }

    #[tokio::test]
    async fn test_recreate_after_replace() {
        let store = MemoryStore::new().with_stack("s");
        let elements = ConfigElements::new(&store);
        let owner = Owner::Stack("s".to_string());

        let first = elements
            .create(env_var(owner.clone(), "BACON", "v1", false))
            .await
            .unwrap();
        elements
            .delete(&first.id.to_string(), ElementKind::EnvironmentVariable)
            .await
            .unwrap();
        let second = elements
            .create(env_var(owner, "BACON", "v2", false))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.checksum, second.checksum);
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let store = MemoryStore::new().with_stack("s");
        let elements = ConfigElements::new(&store);

        let err = elements
            .lookup(Owner::Stack("missing".to_string()), "BACON", ElementKind::EnvironmentVariable)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::OwnerNotFound(_)));

        let err = elements
            .lookup(Owner::Stack("s".to_string()), "BACON", ElementKind::EnvironmentVariable)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ElementNotFound(_)));
        assert_eq!(err.to_string(), "environment variable BACON on stack s not found");
    }

    #[test]
    fn test_debug_redacts_value() {
        let element = ConfigElement {
            id: ConfigElementId::new(Owner::Stack("s".to_string()), "TOKEN").unwrap(),
            kind: ElementKind::EnvironmentVariable,
            value: Some("hunter2".to_string()),
            checksum: checksum_hex("hunter2"),
            write_only: false,
            description: None,
        };
        let debug = format!("{:?}", element);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("stack/s/TOKEN"));
    }
}
