//! Error types for the Spacelift provider.

use thiserror::Error;

use crate::schema::Diagnostic;
use crate::store::StoreError;

/// Errors surfaced to the host by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A composite identifier did not split into exactly three parts.
    #[error("malformed identifier {0:?}: expected <owner kind>/<owner id>/<name>")]
    MalformedIdentifier(String),

    /// The owner kind of an identifier is not context, stack or module.
    #[error("unsupported owner kind {0:?}: expected one of context, stack, module")]
    UnsupportedOwnerKind(String),

    /// The owning context, stack or module does not exist.
    #[error("{0} not found")]
    OwnerNotFound(String),

    /// The owner exists but holds no element with the requested name.
    #[error("{0} not found")]
    ElementNotFound(String),

    /// The remote store rejected a write.
    #[error("{context}: {source}")]
    RemoteWrite {
        /// Short description of the failed operation.
        context: String,
        /// The underlying store failure.
        #[source]
        source: StoreError,
    },

    /// The remote store failed to answer a read.
    #[error("{context}: {source}")]
    RemoteRead {
        /// Short description of the failed operation.
        context: String,
        /// The underlying store failure.
        #[source]
        source: StoreError,
    },

    /// The remote store rejected a delete.
    #[error("{context}: {source}")]
    RemoteDelete {
        /// Short description of the failed operation.
        context: String,
        /// The underlying store failure.
        #[source]
        source: StoreError,
    },

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A resource operation ran before `configure`.
    #[error("provider is not configured")]
    NotConfigured,

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation not supported by this resource type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Wrap a store failure raised while writing.
    pub fn remote_write(context: impl Into<String>, source: StoreError) -> Self {
        Self::RemoteWrite {
            context: context.into(),
            source,
        }
    }

    /// Wrap a store failure raised while reading.
    pub fn remote_read(context: impl Into<String>, source: StoreError) -> Self {
        Self::RemoteRead {
            context: context.into(),
            source,
        }
    }

    /// Wrap a store failure raised while deleting.
    pub fn remote_delete(context: impl Into<String>, source: StoreError) -> Self {
        Self::RemoteDelete {
            context: context.into(),
            source,
        }
    }

    /// Whether this error reports a missing owner or element.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::OwnerNotFound(_) | Self::ElementNotFound(_))
    }
}

impl From<&ProviderError> for Diagnostic {
    fn from(err: &ProviderError) -> Self {
        let diagnostic = Diagnostic::error(err.to_string());
        match err {
            ProviderError::MalformedIdentifier(_) | ProviderError::UnsupportedOwnerKind(_) => {
                diagnostic.with_attribute("id")
            },
            _ => diagnostic,
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        Diagnostic::from(&err)
    }
}
