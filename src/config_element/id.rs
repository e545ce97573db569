//! Composite identifiers for config elements.
//!
//! The platform issues no standalone ID for an environment variable or a
//! mounted file, so the provider stores `<owner kind>/<owner id>/<name>` in
//! state instead, e.g. `stack/my-stack-id/BACON` or `context/ctx-id/bacon.txt`.
//! The format is persisted in state files and must not change.

use std::fmt;
use std::str::FromStr;

use super::owner::{Owner, OwnerKind};
use crate::error::ProviderError;

/// Separator between identifier segments.
pub const SEPARATOR: char = '/';

/// Encode a composite identifier from its raw segments.
pub fn encode(owner_kind: &str, owner_id: &str, name: &str) -> String {
    format!("{owner_kind}{SEPARATOR}{owner_id}{SEPARATOR}{name}")
}

/// Split a composite identifier into owner kind, owner ID and name.
///
/// Only the shape is checked here; an unknown owner kind is reported when the
/// segments are turned into an [`Owner`].
pub fn decode(id: &str) -> Result<(&str, &str, &str), ProviderError> {
    let mut parts = id.split(SEPARATOR);
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(kind), Some(owner_id), Some(name), None) => Ok((kind, owner_id, name)),
        _ => Err(ProviderError::MalformedIdentifier(id.to_string())),
    }
}

/// Check that a value can be used as an identifier segment.
pub fn check_segment(what: &str, value: &str) -> Result<(), ProviderError> {
    if value.is_empty() {
        return Err(ProviderError::Validation(format!("{what} must not be empty")));
    }
    if value.contains(SEPARATOR) {
        return Err(ProviderError::Validation(format!(
            "{what} {value:?} must not contain '{SEPARATOR}'"
        )));
    }
    Ok(())
}

/// A decoded, dispatchable config element identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigElementId {
    owner: Owner,
    name: String,
}

impl ConfigElementId {
    /// Build an identifier, rejecting segments that would not round-trip.
    pub fn new(owner: Owner, name: impl Into<String>) -> Result<Self, ProviderError> {
        let name = name.into();
        check_segment(&format!("{} ID", owner.kind()), owner.id())?;
        check_segment("name", &name)?;
        Ok(Self { owner, name })
    }

    /// The owner this element is attached to.
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// The owner kind.
    pub fn owner_kind(&self) -> OwnerKind {
        self.owner.kind()
    }

    /// The element name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ConfigElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(
            self.owner.kind().as_str(),
            self.owner.id(),
            &self.name,
        ))
    }
}

impl FromStr for ConfigElementId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, owner_id, name) = decode(s)?;
        if owner_id.is_empty() || name.is_empty() {
            return Err(ProviderError::MalformedIdentifier(s.to_string()));
        }
        let owner = Owner::from_parts(kind, owner_id)?;
        Ok(Self {
            owner,
            name: name.to_string(),
        })
    }
}
