use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{decode, state_id, DataSource, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema, Validator};
use crate::store::{Backend, ContextInput, ContextRecord, StoreError};

const TYPE_NAME: &str = "spacelift_context";

#[derive(Deserialize)]
struct Args {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    labels: Option<Vec<String>>,
    #[serde(default)]
    space_id: Option<String>,
}

impl Args {
    fn into_input(self) -> ContextInput {
        let mut labels = self.labels.unwrap_or_default();
        labels.sort();
        ContextInput {
            name: self.name,
            description: self.description,
            labels,
            space: self.space_id,
        }
    }
}

#[derive(Deserialize)]
struct LookupArgs {
    context_id: String,
}

#[derive(Serialize)]
struct State {
    id: String,
    name: String,
    description: Option<String>,
    labels: Vec<String>,
    space_id: Option<String>,
}

impl From<ContextRecord> for State {
    fn from(record: ContextRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            labels: record.labels,
            space_id: record.space,
        }
    }
}

fn not_found(id: &str) -> ProviderError {
    ProviderError::OwnerNotFound(format!("context {id}"))
}

/// `spacelift_context`: a bundle of configuration shared between stacks
/// and modules.
pub struct ContextResource;

#[async_trait]
impl Resource for ContextResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Shared bundle of environment variables and mounted files")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(Validator::NonEmpty)
                    .with_description("Name of the context; its ID is derived from it"),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("labels", Attribute::optional_string_set())
            .with_attribute(
                "space_id",
                Attribute::optional_computed_string()
                    .with_description("ID of the space the context lives in"),
            )
            .with_attribute("id", Attribute::computed_string())
    }

    async fn create(&self, backend: &dyn Backend, planned: Value) -> Result<Value, ProviderError> {
        let args: Args = decode(&self.schema(), &planned)?;
        let record = backend
            .create_context(&args.into_input())
            .await
            .map_err(|e| ProviderError::remote_write("could not create context", e))?;

        info!(id = %record.id, "Context created");
        Ok(serde_json::to_value(State::from(record))?)
    }

    async fn read(
        &self,
        backend: &dyn Backend,
        state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let id = state_id(&state)?;
        let result = backend.get_context(&id).await;
        match result {
            Ok(record) => Ok(Some(serde_json::to_value(State::from(record))?)),
            Err(e) if e.is_missing() => {
                warn!(id = %id, "Context is gone, dropping it from state");
                Ok(None)
            },
            Err(e) => Err(ProviderError::remote_read("could not query for context", e)),
        }
    }

    async fn update(
        &self,
        backend: &dyn Backend,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let id = state_id(&prior)?;
        let args: Args = decode(&self.schema(), &planned)?;
        let record = backend
            .update_context(&id, &args.into_input())
            .await
            .map_err(|e| ProviderError::remote_write("could not update context", e))?;

        info!(id = %record.id, "Context updated");
        Ok(serde_json::to_value(State::from(record))?)
    }

    async fn delete(&self, backend: &dyn Backend, state: Value) -> Result<(), ProviderError> {
        let id = state_id(&state)?;
        backend
            .delete_context(&id)
            .await
            .map_err(|e| ProviderError::remote_delete("could not delete context", e))?;

        info!(id = %id, "Context deleted");
        Ok(())
    }

    async fn import(&self, backend: &dyn Backend, id: &str) -> Result<Value, ProviderError> {
        let state = serde_json::json!({ "id": id });
        self.read(backend, state).await?.ok_or_else(|| not_found(id))
    }
}

/// Data source `spacelift_context`.
pub struct ContextDataSource;

#[async_trait]
impl DataSource for ContextDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "context_id",
                Attribute::required_string().with_validator(Validator::NonEmpty),
            )
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute(
                "labels",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::computed(),
                ),
            )
            .with_attribute("space_id", Attribute::computed_string())
            .with_attribute("id", Attribute::computed_string())
    }

    async fn read(&self, backend: &dyn Backend, config: Value) -> Result<Value, ProviderError> {
        let LookupArgs { context_id } = decode(&self.schema(), &config)?;
        let result = backend.get_context(&context_id).await;
        let record = match result {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => return Err(not_found(&context_id)),
            Err(e) => return Err(ProviderError::remote_read("could not query for context", e)),
        };
        Ok(serde_json::to_value(State::from(record))?)
    }
}
