//! Owners of config elements.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// The kind of entity a config element is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    /// A shared context.
    Context,
    /// A stack.
    Stack,
    /// A module.
    Module,
}

impl OwnerKind {
    /// All owner kinds, in identifier order.
    pub const ALL: [OwnerKind; 3] = [OwnerKind::Context, OwnerKind::Stack, OwnerKind::Module];

    /// The identifier segment for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            OwnerKind::Context => "context",
            OwnerKind::Stack => "stack",
            OwnerKind::Module => "module",
        }
    }

    /// The attribute that carries an owner of this kind.
    pub fn id_attribute(self) -> &'static str {
        match self {
            OwnerKind::Context => "context_id",
            OwnerKind::Stack => "stack_id",
            OwnerKind::Module => "module_id",
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "context" => Ok(OwnerKind::Context),
            "stack" => Ok(OwnerKind::Stack),
            "module" => Ok(OwnerKind::Module),
            other => Err(ProviderError::UnsupportedOwnerKind(other.to_string())),
        }
    }
}

/// The entity a config element is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    /// A context, by ID.
    Context(String),
    /// A stack, by ID.
    Stack(String),
    /// A module, by ID.
    Module(String),
}

impl Owner {
    /// Build an owner from a kind and an ID.
    pub fn new(kind: OwnerKind, id: impl Into<String>) -> Self {
        let id = id.into();
        match kind {
            OwnerKind::Context => Owner::Context(id),
            OwnerKind::Stack => Owner::Stack(id),
            OwnerKind::Module => Owner::Module(id),
        }
    }

    /// Build an owner from the raw segments of a decoded identifier.
    ///
    /// Fails with [`ProviderError::UnsupportedOwnerKind`] for unknown kinds.
    pub fn from_parts(kind: &str, id: &str) -> Result<Self, ProviderError> {
        Ok(Owner::new(kind.parse()?, id))
    }

    /// Build an owner from the three mutually exclusive owner attributes.
    ///
    /// Exactly one of the arguments must be set.
    pub fn exactly_one(
        context_id: Option<String>,
        stack_id: Option<String>,
        module_id: Option<String>,
    ) -> Result<Self, ProviderError> {
        let candidates = [
            context_id.map(Owner::Context),
            stack_id.map(Owner::Stack),
            module_id.map(Owner::Module),
        ];
        let mut set = candidates.into_iter().flatten();

        match (set.next(), set.next()) {
            (Some(owner), None) => Ok(owner),
            (None, _) => Err(ProviderError::Validation(
                "exactly one of context_id, stack_id or module_id must be set".to_string(),
            )),
            (Some(_), Some(_)) => Err(ProviderError::Validation(
                "only one of context_id, stack_id or module_id may be set".to_string(),
            )),
        }
    }

    /// The kind of this owner.
    pub fn kind(&self) -> OwnerKind {
        match self {
            Owner::Context(_) => OwnerKind::Context,
            Owner::Stack(_) => OwnerKind::Stack,
            Owner::Module(_) => OwnerKind::Module,
        }
    }

    /// The owner's ID.
    pub fn id(&self) -> &str {
        match self {
            Owner::Context(id) | Owner::Stack(id) | Owner::Module(id) => id,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}
