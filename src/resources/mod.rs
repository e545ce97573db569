//! Resources and data sources.
//!
//! Each resource type implements [`Resource`], each data source
//! [`DataSource`]. Both receive untyped attribute bags from the host and
//! decode them into typed argument structs with [`decode`] before touching
//! the backend. [`Registry`] maps type names to implementations and is built
//! once when the provider starts.

mod context;
mod environment_variable;
mod mounted_file;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config_element::{Owner, OwnerKind};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::store::Backend;
use crate::validation;

pub use self::context::{ContextDataSource, ContextResource};
pub use self::environment_variable::{EnvironmentVariableDataSource, EnvironmentVariableResource};
pub use self::mounted_file::{MountedFileDataSource, MountedFileResource};

/// A managed resource type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// The type name, e.g. `spacelift_environment_variable`.
    fn type_name(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Create the resource and return its state.
    async fn create(&self, backend: &dyn Backend, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state; `None` when the resource is gone.
    async fn read(
        &self,
        backend: &dyn Backend,
        state: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Update the resource in place.
    ///
    /// Resources whose every attribute forces replacement never get here.
    async fn update(
        &self,
        backend: &dyn Backend,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (backend, prior, planned);
        Err(ProviderError::Unimplemented(format!(
            "{} cannot be updated in place",
            self.type_name()
        )))
    }

    /// Delete the resource.
    async fn delete(&self, backend: &dyn Backend, state: Value) -> Result<(), ProviderError>;

    /// Bring an existing object under management by its `id`.
    async fn import(&self, backend: &dyn Backend, id: &str) -> Result<Value, ProviderError> {
        let state = serde_json::json!({ "id": id });
        match self.read(backend, state).await? {
            Some(state) => Ok(state),
            None => Err(ProviderError::ElementNotFound(format!(
                "{} {}",
                self.type_name(),
                id
            ))),
        }
    }
}

/// A read-only data source type.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// The type name, e.g. `spacelift_context`.
    fn type_name(&self) -> &'static str;

    /// The data source schema.
    fn schema(&self) -> Schema;

    /// Look the object up; missing objects are errors.
    async fn read(&self, backend: &dyn Backend, config: Value) -> Result<Value, ProviderError>;
}

/// Immutable lookup table of resource and data source types.
pub struct Registry {
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
}

impl Registry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Every resource and data source this provider ships.
    pub fn standard() -> Result<Self, ProviderError> {
        Self::builder()
            .resource(ContextResource)
            .resource(EnvironmentVariableResource)
            .resource(MountedFileResource)
            .data_source(ContextDataSource)
            .data_source(EnvironmentVariableDataSource)
            .data_source(MountedFileDataSource)
            .build()
    }

    /// Look up a resource type.
    pub fn resource(&self, type_name: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    /// Look up a data source type.
    pub fn data_source(&self, type_name: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    /// All resource types, by name.
    pub fn resources(&self) -> impl Iterator<Item = &dyn Resource> {
        self.resources.values().map(|r| r.as_ref())
    }

    /// All data source types, by name.
    pub fn data_sources(&self) -> impl Iterator<Item = &dyn DataSource> {
        self.data_sources.values().map(|r| r.as_ref())
    }
}

/// Collects registrations; [`RegistryBuilder::build`] rejects duplicates.
#[derive(Default)]
pub struct RegistryBuilder {
    resources: Vec<Box<dyn Resource>>,
    data_sources: Vec<Box<dyn DataSource>>,
}

impl RegistryBuilder {
    /// Register a resource type.
    pub fn resource(mut self, resource: impl Resource + 'static) -> Self {
        self.resources.push(Box::new(resource));
        self
    }

    /// Register a data source type.
    pub fn data_source(mut self, data_source: impl DataSource + 'static) -> Self {
        self.data_sources.push(Box::new(data_source));
        self
    }

    /// Freeze the registrations.
    pub fn build(self) -> Result<Registry, ProviderError> {
        let mut resources = BTreeMap::new();
        for resource in self.resources {
            let name = resource.type_name();
            if resources.insert(name, resource).is_some() {
                return Err(ProviderError::Configuration(format!(
                    "resource {name} registered twice"
                )));
            }
        }

        let mut data_sources = BTreeMap::new();
        for data_source in self.data_sources {
            let name = data_source.type_name();
            if data_sources.insert(name, data_source).is_some() {
                return Err(ProviderError::Configuration(format!(
                    "data source {name} registered twice"
                )));
            }
        }

        Ok(Registry {
            resources,
            data_sources,
        })
    }
}

/// Validate `value` against `schema`, then decode it into `T`.
pub fn decode<T: DeserializeOwned>(schema: &Schema, value: &Value) -> Result<T, ProviderError> {
    if let Err(diagnostics) = validation::validate_result(schema, value) {
        let summaries: Vec<_> = diagnostics
            .into_iter()
            .map(|d| match d.detail {
                Some(detail) => format!("{}: {}", d.summary, detail),
                None => d.summary,
            })
            .collect();
        return Err(ProviderError::Validation(summaries.join("; ")));
    }
    Ok(serde_json::from_value(value.clone())?)
}

/// The identifier every resource keeps in state.
#[derive(Deserialize)]
struct StateId {
    id: String,
}

fn state_id(state: &Value) -> Result<String, ProviderError> {
    let StateId { id } = serde_json::from_value(state.clone())
        .map_err(|_| ProviderError::Validation("state has no id".to_string()))?;
    Ok(id)
}

/// The three mutually exclusive owner attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct OwnerArgs {
    #[serde(default)]
    context_id: Option<String>,
    #[serde(default)]
    module_id: Option<String>,
    #[serde(default)]
    stack_id: Option<String>,
}

impl OwnerArgs {
    fn into_owner(self) -> Result<Owner, ProviderError> {
        Owner::exactly_one(self.context_id, self.stack_id, self.module_id)
    }
}

impl From<&Owner> for OwnerArgs {
    fn from(owner: &Owner) -> Self {
        let id = Some(owner.id().to_string());
        match owner.kind() {
            OwnerKind::Context => Self {
                context_id: id,
                ..Self::default()
            },
            OwnerKind::Module => Self {
                module_id: id,
                ..Self::default()
            },
            OwnerKind::Stack => Self {
                stack_id: id,
                ..Self::default()
            },
        }
    }
}

/// Add the owner attributes to a config element schema.
fn with_owner_attributes(schema: Schema, force_new: bool) -> Schema {
    let schema = OwnerKind::ALL.iter().fold(schema, |schema, kind| {
        let mut attr = Attribute::optional_string()
            .id_segment()
            .with_description(format!("ID of the {kind} the element belongs to"));
        if force_new {
            attr = attr.with_force_new();
        }
        schema.with_attribute(kind.id_attribute(), attr)
    });
    schema.with_exactly_one_of(OwnerKind::ALL.iter().map(|kind| kind.id_attribute()))
}
