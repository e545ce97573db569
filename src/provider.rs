//! The Spacelift provider.
//!
//! [`SpaceliftProvider`] implements [`ProviderService`] by dispatching every
//! call through the [`Registry`] to the resource or data source it names.
//! Resource operations need a backend, which `configure` builds from the
//! `provider` block; tests install one up front with
//! [`SpaceliftProvider::with_backend`].

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{self, ProviderConfig};
use crate::error::ProviderError;
use crate::plan;
use crate::resources::Registry;
use crate::retry::CancelHandle;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::store::{Backend, GraphqlStore};
use crate::types::{ImportedResource, PlanResult};
use crate::validation;

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Provider managing Spacelift contexts and their configuration.
pub struct SpaceliftProvider {
    registry: Registry,
    backend: RwLock<Option<Arc<dyn Backend>>>,
    cancel: Mutex<CancelHandle>,
    env: EnvLookup,
}

impl SpaceliftProvider {
    /// Create an unconfigured provider with every standard resource type.
    pub fn new() -> Result<Self, ProviderError> {
        let (cancel, _) = CancelHandle::new();
        Ok(Self {
            registry: Registry::standard()?,
            backend: RwLock::new(None),
            cancel: Mutex::new(cancel),
            env: Box::new(|key| std::env::var(key).ok()),
        })
    }

    /// Use `backend` instead of the API; `configure` replaces it.
    pub fn with_backend(mut self, backend: impl Backend + 'static) -> Self {
        let backend: Arc<dyn Backend> = Arc::new(backend);
        self.backend = RwLock::new(Some(backend));
        self
    }

    /// Resolve environment fallbacks with `env` instead of the process
    /// environment.
    pub fn with_env(
        mut self,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Whether resource operations can run.
    pub async fn is_configured(&self) -> bool {
        self.backend.read().await.is_some()
    }

    /// The registry this provider dispatches through.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    async fn backend(&self) -> Result<Arc<dyn Backend>, ProviderError> {
        self.backend
            .read()
            .await
            .clone()
            .ok_or(ProviderError::NotConfigured)
    }
}

#[async_trait::async_trait]
impl ProviderService for SpaceliftProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = self
            .registry
            .resources()
            .fold(ProviderSchema::new(), |schema, resource| {
                schema.with_resource(resource.type_name(), resource.schema())
            });
        self.registry
            .data_sources()
            .fold(schema, |schema, data_source| {
                schema.with_data_source(data_source.type_name(), data_source.schema())
            })
            .with_provider_config(config::schema())
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        if config.is_null() {
            return Ok(vec![]);
        }
        Ok(validation::validate(&config::schema(), &config))
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        debug!("Configure called");
        let config = match ProviderConfig::from_value(&config, |key| (self.env)(key)) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Configure completed with errors");
                return Ok(vec![Diagnostic::from(e)]);
            },
        };

        // a stop before this configure must not cancel the new client
        let (cancel, signal) = CancelHandle::new();
        let client = config
            .client(signal)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        *self.cancel.lock().await = cancel;
        info!(
            endpoint = %client.url(),
            max_attempts = config.retry.max_attempts,
            "Configure completed successfully"
        );

        let backend: Arc<dyn Backend> = Arc::new(GraphqlStore::new(client));
        *self.backend.write().await = Some(backend);
        Ok(vec![])
    }

    #[instrument(skip(self), name = "provider.stop")]
    async fn stop(&self) -> Result<(), ProviderError> {
        info!("Stop called");
        self.cancel.lock().await.cancel();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.registry.resource(resource_type)?;
        Ok(validation::validate(&resource.schema(), &config))
    }

    #[instrument(skip(self, prior_state, proposed_state), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        debug!(resource_type = %resource_type, is_create = prior_state.is_none(), "Plan called");
        let resource = self.registry.resource(resource_type)?;
        let result = plan::plan(&resource.schema(), prior_state.as_ref(), &proposed_state)?;
        info!(
            resource_type = %resource_type,
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "Plan completed"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        info!(resource_type = %resource_type, "Create called");
        let resource = self.registry.resource(resource_type)?;
        let backend = self.backend().await?;

        match resource.create(backend.as_ref(), planned_state).await {
            Ok(state) => {
                info!(
                    resource_type = %resource_type,
                    id = %state["id"],
                    "Create completed successfully"
                );
                Ok(state)
            },
            Err(e) => {
                error!(resource_type = %resource_type, error = %e, "Create failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        debug!(resource_type = %resource_type, "Read called");
        let resource = self.registry.resource(resource_type)?;
        let backend = self.backend().await?;

        let state = resource.read(backend.as_ref(), current_state).await?;
        if state.is_none() {
            info!(resource_type = %resource_type, "Resource is gone");
        }
        Ok(state)
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        info!(resource_type = %resource_type, "Update called");
        let resource = self.registry.resource(resource_type)?;
        let backend = self.backend().await?;

        match resource.update(backend.as_ref(), prior_state, planned_state).await {
            Ok(state) => {
                info!(resource_type = %resource_type, "Update completed successfully");
                Ok(state)
            },
            Err(e) => {
                error!(resource_type = %resource_type, error = %e, "Update failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        info!(resource_type = %resource_type, id = %current_state["id"], "Delete called");
        let resource = self.registry.resource(resource_type)?;
        let backend = self.backend().await?;

        match resource.delete(backend.as_ref(), current_state).await {
            Ok(()) => {
                info!(resource_type = %resource_type, "Delete completed successfully");
                Ok(())
            },
            Err(e) => {
                error!(resource_type = %resource_type, error = %e, "Delete failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        info!(resource_type = %resource_type, id = %id, "ImportResource called");
        let resource = self.registry.resource(resource_type)?;
        let backend = self.backend().await?;

        let state = resource.import(backend.as_ref(), id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.registry.data_source(data_source_type)?;
        Ok(validation::validate(&data_source.schema(), &config))
    }

    #[instrument(skip(self, config), name = "provider.read_data_source")]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        debug!(data_source_type = %data_source_type, "ReadDataSource called");
        let data_source = self.registry.data_source(data_source_type)?;
        let backend = self.backend().await?;
        data_source.read(backend.as_ref(), config).await
    }
}
