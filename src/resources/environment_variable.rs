use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{decode, state_id, with_owner_attributes, DataSource, OwnerArgs, Resource};
use crate::config_element::{ConfigElement, ConfigElements, ElementKind, NewConfigElement};
use crate::error::ProviderError;
use crate::schema::{Attribute, ContentEncoding, Schema};
use crate::store::Backend;

const TYPE_NAME: &str = "spacelift_environment_variable";
const KIND: ElementKind = ElementKind::EnvironmentVariable;

#[derive(Deserialize)]
struct Args {
    #[serde(flatten)]
    owner: OwnerArgs,
    name: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    write_only: Option<bool>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct LookupArgs {
    #[serde(flatten)]
    owner: OwnerArgs,
    name: String,
}

#[derive(Serialize)]
struct State {
    id: String,
    #[serde(flatten)]
    owner: OwnerArgs,
    name: String,
    value: Option<String>,
    write_only: bool,
    checksum: String,
    description: Option<String>,
}

impl From<ConfigElement> for State {
    fn from(element: ConfigElement) -> Self {
        Self {
            id: element.id.to_string(),
            owner: OwnerArgs::from(element.id.owner()),
            name: element.id.name().to_string(),
            value: element.value,
            write_only: element.write_only,
            checksum: element.checksum,
            description: element.description,
        }
    }
}

/// `spacelift_environment_variable`: a variable exposed to runs of a
/// context, stack or module.
pub struct EnvironmentVariableResource;

#[async_trait]
impl Resource for EnvironmentVariableResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        with_owner_attributes(Schema::v0(), true)
            .with_description("Environment variable attached to a context, stack or module")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .id_segment()
                    .with_force_new()
                    .with_description("Name of the environment variable"),
            )
            .with_attribute(
                "value",
                Attribute::optional_string()
                    .sensitive()
                    .with_force_new()
                    .with_default(json!(""))
                    .with_checksum_gate("checksum", ContentEncoding::Plain)
                    .with_description("Value of the environment variable"),
            )
            .with_attribute(
                "write_only",
                Attribute::optional_bool()
                    .with_force_new()
                    .with_default(json!(true))
                    .with_description("Hide the value from reads; only its checksum is kept"),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Free-form description"),
            )
            .with_attribute(
                "checksum",
                Attribute::computed_string().with_description("SHA-256 of the value"),
            )
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("<owner kind>/<owner id>/<name>"),
            )
    }

    async fn create(&self, backend: &dyn Backend, planned: Value) -> Result<Value, ProviderError> {
        let args: Args = decode(&self.schema(), &planned)?;
        let element = NewConfigElement {
            owner: args.owner.into_owner()?,
            name: args.name,
            kind: KIND,
            value: args.value.unwrap_or_default(),
            write_only: args.write_only.unwrap_or(true),
            description: args.description,
        };

        let created = ConfigElements::new(backend).create(element).await?;
        Ok(serde_json::to_value(State::from(created))?)
    }

    async fn read(
        &self,
        backend: &dyn Backend,
        state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let id = state_id(&state)?;
        match ConfigElements::new(backend).read(&id, KIND).await? {
            Some(element) => Ok(Some(serde_json::to_value(State::from(element))?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, backend: &dyn Backend, state: Value) -> Result<(), ProviderError> {
        let id = state_id(&state)?;
        ConfigElements::new(backend).delete(&id, KIND).await
    }
}

/// Data source `spacelift_environment_variable`: looks a variable up by
/// owner and name.
pub struct EnvironmentVariableDataSource;

#[async_trait]
impl DataSource for EnvironmentVariableDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        with_owner_attributes(Schema::v0(), false)
            .with_attribute("name", Attribute::required_string().id_segment())
            .with_attribute("value", Attribute::computed_string().sensitive())
            .with_attribute("write_only", Attribute::computed_bool())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("checksum", Attribute::computed_string())
            .with_attribute("id", Attribute::computed_string())
    }

    async fn read(&self, backend: &dyn Backend, config: Value) -> Result<Value, ProviderError> {
        let args: LookupArgs = decode(&self.schema(), &config)?;
        let owner = args.owner.into_owner()?;
        let element = ConfigElements::new(backend)
            .lookup(owner, &args.name, KIND)
            .await?;
        Ok(serde_json::to_value(State::from(element))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum_hex;
    use crate::store::{ConfigInput, MemoryStore, RemoteConfigStore};
    use crate::config_element::Owner;

    #[tokio::test]
    async fn test_create_read_delete() {
        let store = MemoryStore::new().with_stack("my-stack-id");
        let resource = EnvironmentVariableResource;

        let state = resource
            .create(
                &store,
                json!({
                    "stack_id": "my-stack-id",
                    "name": "BACON",
                    "value": "is tasty",
                    "write_only": false
                }),
            )
            .await
            .unwrap();
        assert_eq!(
            state,
            json!({
                "id": "stack/my-stack-id/BACON",
                "context_id": null,
                "module_id": null,
                "stack_id": "my-stack-id",
                "name": "BACON",
                "value": "is tasty",
                "write_only": false,
                "checksum": checksum_hex("is tasty"),
                "description": null
            })
        );

        let read = resource.read(&store, state.clone()).await.unwrap();
        assert_eq!(read, Some(state.clone()));

        resource.delete(&store, state.clone()).await.unwrap();
        assert_eq!(resource.read(&store, state).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_only_by_default() {
        let store = MemoryStore::new().with_module("vpc");
        let resource = EnvironmentVariableResource;

        let state = resource
            .create(&store, json!({"module_id": "vpc", "name": "TOKEN", "value": "hunter2"}))
            .await
            .unwrap();
        assert_eq!(state["write_only"], json!(true));
        assert!(state["value"].is_null());
        assert_eq!(state["checksum"], json!(checksum_hex("hunter2")));
        assert!(!state.to_string().contains("hunter2"));

        let read = resource.read(&store, state).await.unwrap().unwrap();
        assert!(read["value"].is_null());
    }

    #[tokio::test]
    async fn test_create_validates_owner() {
        let store = MemoryStore::new().with_stack("s");
        let resource = EnvironmentVariableResource;

        let err = resource
            .create(
                &store,
                json!({"stack_id": "s", "context_id": "c", "name": "BACON"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));

        let err = resource
            .create(&store, json!({"name": "BACON"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert_eq!(store.config_count().await, 0);
    }

    #[tokio::test]
    async fn test_import() {
        let store = MemoryStore::new().with_stack("s");
        let resource = EnvironmentVariableResource;
        resource
            .create(&store, json!({"stack_id": "s", "name": "BACON", "value": "x"}))
            .await
            .unwrap();

        let state = resource.import(&store, "stack/s/BACON").await.unwrap();
        assert_eq!(state["name"], json!("BACON"));
        assert_eq!(state["stack_id"], json!("s"));

        let err = resource.import(&store, "stack/s/EGGS").await.unwrap_err();
        assert!(matches!(err, ProviderError::ElementNotFound(_)));

        let err = resource.import(&store, "EGGS").await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedIdentifier(_)));
    }

    #[tokio::test]
    async fn test_data_source() {
        let store = MemoryStore::new().with_stack("s");
        store
            .add_config(
                &Owner::Stack("s".to_string()),
                &ConfigInput {
                    name: "BACON".to_string(),
                    kind: ElementKind::EnvironmentVariable,
                    value: "is tasty".to_string(),
                    write_only: false,
                    description: Some("breakfast".to_string()),
                },
            )
            .await
            .unwrap();

        let data = EnvironmentVariableDataSource
            .read(&store, json!({"stack_id": "s", "name": "BACON"}))
            .await
            .unwrap();
        assert_eq!(data["id"], json!("stack/s/BACON"));
        assert_eq!(data["value"], json!("is tasty"));
        assert_eq!(data["description"], json!("breakfast"));

        let err = EnvironmentVariableDataSource
            .read(&store, json!({"stack_id": "s", "name": "EGGS"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ElementNotFound(_)));
    }
}
