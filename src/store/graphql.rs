//! Store backed by the platform's GraphQL API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use super::{
    ConfigInput, ConfigRecord, ContextInput, ContextRecord, ContextStore, RemoteConfigStore,
    StoreError,
};
use crate::config_element::{Owner, OwnerKind};
use crate::graphql::{decode, GraphqlClient, Operation};
use crate::variables;

const CONTEXT_CONFIG: Operation = Operation {
    name: "ContextConfig",
    document: r#"query ContextConfig($owner: ID!, $name: ID!) {
  owner: context(id: $owner) {
    config(id: $name) { id checksum type value writeOnly description }
  }
}"#,
};

const STACK_CONFIG: Operation = Operation {
    name: "StackConfig",
    document: r#"query StackConfig($owner: ID!, $name: ID!) {
  owner: stack(id: $owner) {
    config(id: $name) { id checksum type value writeOnly description }
  }
}"#,
};

const MODULE_CONFIG: Operation = Operation {
    name: "ModuleConfig",
    document: r#"query ModuleConfig($owner: ID!, $name: ID!) {
  owner: module(id: $owner) {
    config(id: $name) { id checksum type value writeOnly description }
  }
}"#,
};

const CONTEXT_CONFIG_ADD: Operation = Operation {
    name: "ContextConfigAdd",
    document: r#"mutation ContextConfigAdd($owner: ID!, $config: ConfigInput!) {
  config: contextConfigAdd(context: $owner, config: $config) { id checksum type writeOnly }
}"#,
};

// Modules are stacks as far as config elements are concerned.
const STACK_CONFIG_ADD: Operation = Operation {
    name: "StackConfigAdd",
    document: r#"mutation StackConfigAdd($owner: ID!, $config: ConfigInput!) {
  config: stackConfigAdd(stack: $owner, config: $config) { id checksum type writeOnly }
}"#,
};

const CONTEXT_CONFIG_DELETE: Operation = Operation {
    name: "ContextConfigDelete",
    document: r#"mutation ContextConfigDelete($owner: ID!, $name: ID!) {
  config: contextConfigDelete(context: $owner, id: $name) { id }
}"#,
};

const STACK_CONFIG_DELETE: Operation = Operation {
    name: "StackConfigDelete",
    document: r#"mutation StackConfigDelete($owner: ID!, $name: ID!) {
  config: stackConfigDelete(stack: $owner, id: $name) { id }
}"#,
};

const CONTEXT: Operation = Operation {
    name: "Context",
    document: r#"query Context($id: ID!) {
  context(id: $id) { id name description labels space }
}"#,
};

const CONTEXT_CREATE: Operation = Operation {
    name: "ContextCreate",
    document: r#"mutation ContextCreate($input: ContextInput!) {
  context: contextCreateV2(input: $input) { id name description labels space }
}"#,
};

const CONTEXT_UPDATE: Operation = Operation {
    name: "ContextUpdate",
    document: r#"mutation ContextUpdate($id: ID!, $input: ContextInput!) {
  context: contextUpdateV2(id: $id, input: $input) { id name description labels space }
}"#,
};

const CONTEXT_DELETE: Operation = Operation {
    name: "ContextDelete",
    document: r#"mutation ContextDelete($id: ID!) {
  context: contextDelete(id: $id) { id }
}"#,
};

fn config_query(kind: OwnerKind) -> Operation {
    match kind {
        OwnerKind::Context => CONTEXT_CONFIG,
        OwnerKind::Stack => STACK_CONFIG,
        OwnerKind::Module => MODULE_CONFIG,
    }
}

fn config_add(kind: OwnerKind) -> Operation {
    match kind {
        OwnerKind::Context => CONTEXT_CONFIG_ADD,
        OwnerKind::Stack | OwnerKind::Module => STACK_CONFIG_ADD,
    }
}

fn config_delete(kind: OwnerKind) -> Operation {
    match kind {
        OwnerKind::Context => CONTEXT_CONFIG_DELETE,
        OwnerKind::Stack | OwnerKind::Module => STACK_CONFIG_DELETE,
    }
}

#[derive(Deserialize)]
struct OwnerConfigData {
    owner: Option<OwnerConfig>,
}

#[derive(Deserialize)]
struct OwnerConfig {
    config: Option<ConfigRecord>,
}

#[derive(Deserialize)]
struct DeletedConfigData {
    config: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ContextData {
    context: Option<ContextRecord>,
}

#[derive(Deserialize)]
struct DeletedContextData {
    context: Option<serde_json::Value>,
}

/// [`RemoteConfigStore`] and [`ContextStore`] over a [`GraphqlClient`].
pub struct GraphqlStore<C> {
    client: C,
}

impl<C: GraphqlClient> GraphqlStore<C> {
    /// Wrap a GraphQL client.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }
}

#[async_trait]
impl<C: GraphqlClient> RemoteConfigStore for GraphqlStore<C> {
    #[instrument(skip(self, input), fields(owner = %owner, name = %input.name))]
    async fn add_config(&self, owner: &Owner, input: &ConfigInput) -> Result<(), StoreError> {
        let variables = variables! {
            "owner" => owner.id(),
            "config" => input,
        };
        self.client
            .mutate(config_add(owner.kind()), variables)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn get_config(&self, owner: &Owner, name: &str) -> Result<ConfigRecord, StoreError> {
        let variables = variables! {
            "owner" => owner.id(),
            "name" => name,
        };
        let data = self
            .client
            .query(config_query(owner.kind()), variables)
            .await?;

        let data: OwnerConfigData = decode(data)?;
        data.owner
            .ok_or_else(|| StoreError::OwnerNotFound(owner.to_string()))?
            .config
            .ok_or_else(|| StoreError::ElementNotFound(format!("{name} on {owner}")))
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn delete_config(&self, owner: &Owner, name: &str) -> Result<(), StoreError> {
        let variables = variables! {
            "owner" => owner.id(),
            "name" => name,
        };
        let data = self
            .client
            .mutate(config_delete(owner.kind()), variables)
            .await?;

        let data: DeletedConfigData = decode(data)?;
        match data.config {
            Some(_) => Ok(()),
            None => Err(StoreError::ElementNotFound(format!("{name} on {owner}"))),
        }
    }
}

#[async_trait]
impl<C: GraphqlClient> ContextStore for GraphqlStore<C> {
    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_context(&self, input: &ContextInput) -> Result<ContextRecord, StoreError> {
        let data = self
            .client
            .mutate(CONTEXT_CREATE, variables! { "input" => input })
            .await?;
        let data: ContextData = decode(data)?;
        data.context
            .ok_or_else(|| StoreError::Conflict(format!("context {} was not created", input.name)))
    }

    #[instrument(skip(self))]
    async fn get_context(&self, id: &str) -> Result<ContextRecord, StoreError> {
        let data = self.client.query(CONTEXT, variables! { "id" => id }).await?;
        let data: ContextData = decode(data)?;
        data.context
            .ok_or_else(|| StoreError::NotFound(format!("context {id}")))
    }

    #[instrument(skip(self, input))]
    async fn update_context(
        &self,
        id: &str,
        input: &ContextInput,
    ) -> Result<ContextRecord, StoreError> {
        let variables = variables! {
            "id" => id,
            "input" => input,
        };
        let data = self.client.mutate(CONTEXT_UPDATE, variables).await?;
        let data: ContextData = decode(data)?;
        data.context
            .ok_or_else(|| StoreError::NotFound(format!("context {id}")))
    }

    #[instrument(skip(self))]
    async fn delete_context(&self, id: &str) -> Result<(), StoreError> {
        let data = self
            .client
            .mutate(CONTEXT_DELETE, variables! { "id" => id })
            .await?;
        let data: DeletedContextData = decode(data)?;
        match data.context {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("context {id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_element::ElementKind;
    use crate::graphql::{GraphqlError, Variables};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        kind: &'static str,
        operation: &'static str,
        variables: Value,
    }

    /// Replays canned responses and records what was sent.
    #[derive(Default)]
    struct RecordingClient {
        responses: Mutex<VecDeque<Result<Value, GraphqlError>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingClient {
        fn respond(self, data: Value) -> Self {
            self.responses.lock().unwrap().push_back(Ok(data));
            self
        }

        fn fail(self, err: GraphqlError) -> Self {
            self.responses.lock().unwrap().push_back(Err(err));
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn next(
            &self,
            kind: &'static str,
            operation: Operation,
            variables: Variables,
        ) -> Result<Value, GraphqlError> {
            self.calls.lock().unwrap().push(Call {
                kind,
                operation: operation.name,
                variables: Value::Object(variables),
            });
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("no canned response left")
        }
    }

    #[async_trait]
    impl GraphqlClient for RecordingClient {
        async fn query(
            &self,
            operation: Operation,
            variables: Variables,
        ) -> Result<Value, GraphqlError> {
            self.next("query", operation, variables)
        }

        async fn mutate(
            &self,
            operation: Operation,
            variables: Variables,
        ) -> Result<Value, GraphqlError> {
            self.next("mutation", operation, variables)
        }
    }

    fn input() -> ConfigInput {
        ConfigInput {
            name: "BACON".to_string(),
            kind: ElementKind::EnvironmentVariable,
            value: "is tasty".to_string(),
            write_only: false,
            description: Some("breakfast".to_string()),
        }
    }

    #[tokio::test]
    async fn test_add_config_per_owner_kind() {
        for (owner, operation) in [
            (Owner::Context("ctx1".to_string()), "ContextConfigAdd"),
            (Owner::Stack("my-stack".to_string()), "StackConfigAdd"),
            (Owner::Module("vpc".to_string()), "StackConfigAdd"),
        ] {
            let store = GraphqlStore::new(
                RecordingClient::default().respond(json!({"config": {"id": "BACON"}})),
            );
            store.add_config(&owner, &input()).await.unwrap();

            let calls = store.client().calls();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].kind, "mutation");
            assert_eq!(calls[0].operation, operation);
            assert_eq!(
                calls[0].variables,
                json!({
                    "owner": owner.id(),
                    "config": {
                        "id": "BACON",
                        "type": "ENVIRONMENT_VARIABLE",
                        "value": "is tasty",
                        "writeOnly": false,
                        "description": "breakfast"
                    }
                })
            );
        }
    }

    #[tokio::test]
    async fn test_get_config_found() {
        let store = GraphqlStore::new(RecordingClient::default().respond(json!({
            "owner": {"config": {
                "id": "BACON",
                "checksum": "4d5d01ea427b10dd483e8fce5b5149fb5a9814e9ee614176b756ca4a65c8f154",
                "type": "ENVIRONMENT_VARIABLE",
                "value": null,
                "writeOnly": true,
                "description": null
            }}
        })));

        let record = store
            .get_config(&Owner::Module("vpc".to_string()), "BACON")
            .await
            .unwrap();
        assert!(record.write_only);
        assert!(record.value.is_none());

        let calls = store.client().calls();
        assert_eq!(calls[0].kind, "query");
        assert_eq!(calls[0].operation, "ModuleConfig");
        assert_eq!(calls[0].variables, json!({"owner": "vpc", "name": "BACON"}));
    }

    #[tokio::test]
    async fn test_get_config_missing_owner_and_element() {
        let store = GraphqlStore::new(
            RecordingClient::default()
                .respond(json!({"owner": null}))
                .respond(json!({"owner": {"config": null}})),
        );
        let owner = Owner::Stack("s".to_string());

        let err = store.get_config(&owner, "BACON").await.unwrap_err();
        assert!(matches!(err, StoreError::OwnerNotFound(ref o) if o == "stack s"));

        let err = store.get_config(&owner, "BACON").await.unwrap_err();
        assert!(matches!(err, StoreError::ElementNotFound(_)));
    }

    #[tokio::test]
    async fn test_transport_errors_pass_through() {
        let store = GraphqlStore::new(RecordingClient::default().fail(GraphqlError::Response(
            vec![crate::graphql::ErrorMessage {
                message: "permission denied".to_string(),
            }],
        )));

        let err = store
            .delete_config(&Owner::Context("ctx1".to_string()), "BACON")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Graphql(_)));
        assert_eq!(err.to_string(), "permission denied");
    }

    #[tokio::test]
    async fn test_delete_config() {
        let store = GraphqlStore::new(
            RecordingClient::default()
                .respond(json!({"config": {"id": "BACON"}}))
                .respond(json!({"config": null})),
        );
        let owner = Owner::Context("ctx1".to_string());

        store.delete_config(&owner, "BACON").await.unwrap();
        assert_eq!(store.client().calls()[0].operation, "ContextConfigDelete");

        let err = store.delete_config(&owner, "BACON").await.unwrap_err();
        assert!(matches!(err, StoreError::ElementNotFound(_)));
    }

    #[tokio::test]
    async fn test_context_lifecycle_mapping() {
        let record = json!({
            "id": "ctx1",
            "name": "ctx1",
            "description": null,
            "labels": ["team:core"],
            "space": "root"
        });
        let store = GraphqlStore::new(
            RecordingClient::default()
                .respond(json!({"context": record.clone()}))
                .respond(json!({"context": null}))
                .respond(json!({"context": {"id": "ctx1"}})),
        );

        let input = ContextInput {
            name: "ctx1".to_string(),
            description: None,
            labels: vec!["team:core".to_string()],
            space: Some("root".to_string()),
        };
        let created = store.create_context(&input).await.unwrap();
        assert_eq!(created.id, "ctx1");
        assert_eq!(created.labels, vec!["team:core".to_string()]);

        let err = store.get_context("ctx1").await.unwrap_err();
        assert!(err.is_missing());

        store.delete_context("ctx1").await.unwrap();

        let calls = store.client().calls();
        let operations: Vec<_> = calls.iter().map(|c| c.operation).collect();
        assert_eq!(operations, ["ContextCreate", "Context", "ContextDelete"]);
        assert_eq!(
            calls[0].variables,
            json!({"input": {"name": "ctx1", "labels": ["team:core"], "space": "root"}})
        );
    }
}
