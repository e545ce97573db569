use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{decode, state_id, with_owner_attributes, DataSource, OwnerArgs, Resource};
use crate::config_element::{ConfigElement, ConfigElements, ElementKind, NewConfigElement};
use crate::error::ProviderError;
use crate::schema::{Attribute, ContentEncoding, Schema};
use crate::store::Backend;

const TYPE_NAME: &str = "spacelift_mounted_file";
const KIND: ElementKind = ElementKind::FileMount;

#[derive(Deserialize)]
struct Args {
    #[serde(flatten)]
    owner: OwnerArgs,
    relative_path: String,
    content: String,
    #[serde(default)]
    write_only: Option<bool>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct LookupArgs {
    #[serde(flatten)]
    owner: OwnerArgs,
    relative_path: String,
}

#[derive(Serialize)]
struct State {
    id: String,
    #[serde(flatten)]
    owner: OwnerArgs,
    relative_path: String,
    content: Option<String>,
    write_only: bool,
    checksum: String,
    description: Option<String>,
}

impl From<ConfigElement> for State {
    fn from(element: ConfigElement) -> Self {
        Self {
            id: element.id.to_string(),
            owner: OwnerArgs::from(element.id.owner()),
            relative_path: element.id.name().to_string(),
            content: element.value,
            write_only: element.write_only,
            checksum: element.checksum,
            description: element.description,
        }
    }
}

/// `spacelift_mounted_file`: a file written into the workspace of runs.
///
/// Content is base64; the checksum covers the decoded bytes.
pub struct MountedFileResource;

#[async_trait]
impl Resource for MountedFileResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        with_owner_attributes(Schema::v0(), true)
            .with_description("File mounted in the workspace of a context, stack or module")
            .with_attribute(
                "relative_path",
                Attribute::required_string()
                    .id_segment()
                    .with_force_new()
                    .with_description("Path of the file relative to /mnt/workspace"),
            )
            .with_attribute(
                "content",
                Attribute::required_string()
                    .sensitive()
                    .with_force_new()
                    .with_checksum_gate("checksum", ContentEncoding::Base64)
                    .with_description("Base64-encoded content of the file"),
            )
            .with_attribute(
                "write_only",
                Attribute::optional_bool()
                    .with_force_new()
                    .with_default(json!(true))
                    .with_description("Hide the content from reads; only its checksum is kept"),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_force_new(),
            )
            .with_attribute(
                "checksum",
                Attribute::computed_string().with_description("SHA-256 of the decoded content"),
            )
            .with_attribute("id", Attribute::computed_string())
    }

    async fn create(&self, backend: &dyn Backend, planned: Value) -> Result<Value, ProviderError> {
        let args: Args = decode(&self.schema(), &planned)?;
        let element = NewConfigElement {
            owner: args.owner.into_owner()?,
            name: args.relative_path,
            kind: KIND,
            value: args.content,
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

/// Data source `spacelift_mounted_file`.
pub struct MountedFileDataSource;

#[async_trait]
impl DataSource for MountedFileDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        with_owner_attributes(Schema::v0(), false)
            .with_attribute("relative_path", Attribute::required_string().id_segment())
            .with_attribute("content", Attribute::computed_string().sensitive())
            .with_attribute("write_only", Attribute::computed_bool())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("checksum", Attribute::computed_string())
            .with_attribute("id", Attribute::computed_string())
    }

    async fn read(&self, backend: &dyn Backend, config: Value) -> Result<Value, ProviderError> {
        let args: LookupArgs = decode(&self.schema(), &config)?;
        let element = ConfigElements::new(backend)
            .lookup(args.owner.into_owner()?, &args.relative_path, KIND)
            .await?;
        Ok(serde_json::to_value(State::from(element))?)
    }
}
