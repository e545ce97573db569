//! In-memory store for tests and local experiments.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    ConfigInput, ConfigRecord, ContextInput, ContextRecord, ContextStore, RemoteConfigStore,
    StoreError,
};
use crate::config_element::Owner;

#[derive(Default)]
struct State {
    contexts: BTreeMap<String, ContextRecord>,
    stacks: BTreeSet<String>,
    modules: BTreeSet<String>,
    configs: HashMap<Owner, BTreeMap<String, ConfigRecord>>,
}

impl State {
    fn owner_exists(&self, owner: &Owner) -> bool {
        match owner {
            Owner::Context(id) => self.contexts.contains_key(id),
            Owner::Stack(id) => self.stacks.contains(id),
            Owner::Module(id) => self.modules.contains(id),
        }
    }

    fn require_owner(&self, owner: &Owner) -> Result<(), StoreError> {
        if self.owner_exists(owner) {
            Ok(())
        } else {
            Err(StoreError::OwnerNotFound(owner.to_string()))
        }
    }
}

/// A [`RemoteConfigStore`] and [`ContextStore`] kept in process memory.
///
/// Behaves like the API where it matters: writes to missing owners fail,
/// names are unique per owner, write-only values are never handed back and
/// deleting a context drops its config elements.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// An empty store with no owners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stack that config elements can be attached to.
    pub fn with_stack(mut self, id: impl Into<String>) -> Self {
        self.state.get_mut().stacks.insert(id.into());
        self
    }

    /// Register a module that config elements can be attached to.
    pub fn with_module(mut self, id: impl Into<String>) -> Self {
        self.state.get_mut().modules.insert(id.into());
        self
    }

    /// Number of config elements held across all owners.
    pub async fn config_count(&self) -> usize {
        self.state.lock().await.configs.values().map(BTreeMap::len).sum()
    }
}

/// Derive a context ID from its name, the way the API does.
fn slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

#[async_trait]
impl RemoteConfigStore for MemoryStore {
    async fn add_config(&self, owner: &Owner, input: &ConfigInput) -> Result<(), StoreError> {
        let checksum = input
            .kind
            .checksum(&input.value)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;

        let mut state = self.state.lock().await;
        state.require_owner(owner)?;

        let configs = state.configs.entry(owner.clone()).or_default();
        if configs.contains_key(&input.name) {
            return Err(StoreError::Conflict(format!(
                "{} already exists on {owner}",
                input.name
            )));
        }

        configs.insert(
            input.name.clone(),
            ConfigRecord {
                name: input.name.clone(),
                checksum,
                kind: input.kind,
                value: (!input.write_only).then(|| input.value.clone()),
                write_only: input.write_only,
                description: input.description.clone(),
            },
        );
        debug!(owner = %owner, name = %input.name, "Stored config element");
        Ok(())
    }

    async fn get_config(&self, owner: &Owner, name: &str) -> Result<ConfigRecord, StoreError> {
        let state = self.state.lock().await;
        state.require_owner(owner)?;

        state
            .configs
            .get(owner)
            .and_then(|configs| configs.get(name))
            .cloned()
            .ok_or_else(|| StoreError::ElementNotFound(format!("{name} on {owner}")))
    }

    async fn delete_config(&self, owner: &Owner, name: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.require_owner(owner)?;

        state
            .configs
            .get_mut(owner)
            .and_then(|configs| configs.remove(name))
            .map(|_| ())
            .ok_or_else(|| StoreError::ElementNotFound(format!("{name} on {owner}")))
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn create_context(&self, input: &ContextInput) -> Result<ContextRecord, StoreError> {
        let id = slug(&input.name);
        if id.is_empty() {
            return Err(StoreError::Conflict(format!(
                "context name {:?} has no usable characters",
                input.name
            )));
        }

        let mut state = self.state.lock().await;
        if state.contexts.contains_key(&id) {
            return Err(StoreError::Conflict(format!("context {id} already exists")));
        }

        let record = ContextRecord {
            id: id.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            labels: input.labels.clone(),
            space: input.space.clone(),
        };
        state.contexts.insert(id, record.clone());
        Ok(record)
    }

    async fn get_context(&self, id: &str) -> Result<ContextRecord, StoreError> {
        self.state
            .lock()
            .await
            .contexts
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("context {id}")))
    }

    async fn update_context(
        &self,
        id: &str,
        input: &ContextInput,
    ) -> Result<ContextRecord, StoreError> {
        let mut state = self.state.lock().await;
        let record = state
            .contexts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("context {id}")))?;

        record.name = input.name.clone();
        record.description = input.description.clone();
        record.labels = input.labels.clone();
        record.space = input.space.clone();
        Ok(record.clone())
    }

    async fn delete_context(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.contexts.remove(id).is_none() {
            return Err(StoreError::NotFound(format!("context {id}")));
        }
        state.configs.remove(&Owner::Context(id.to_string()));
        Ok(())
    }
}
