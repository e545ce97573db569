//! HTTPS transport for [`GraphqlClient`](super::GraphqlClient).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{parse_envelope, GraphqlClient, GraphqlError, Operation, Variables};
use crate::retry::{CancelSignal, RetryError, RetryPolicy};

/// GraphQL client speaking JSON over HTTPS with a bearer token.
///
/// Queries follow the configured [`RetryPolicy`]; mutations are sent once.
#[derive(Clone)]
pub struct HttpGraphqlClient {
    http: reqwest::Client,
    url: String,
    token: String,
    retry: RetryPolicy,
    cancel: CancelSignal,
}

impl std::fmt::Debug for HttpGraphqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGraphqlClient")
            .field("url", &self.url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl HttpGraphqlClient {
    /// Create a client for the API rooted at `endpoint`.
    ///
    /// Requests go to `<endpoint>/graphql`.
    pub fn new(
        endpoint: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GraphqlError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("spacelift-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            url: graphql_url(endpoint),
            token: token.into(),
            retry: RetryPolicy::none(),
            cancel: CancelSignal::never(),
        })
    }

    /// Retry failed queries under `policy`.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Stop retrying once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// The URL requests are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(
        &self,
        operation: Operation,
        variables: &Variables,
    ) -> Result<Value, GraphqlError> {
        let body = json!({
            "operationName": operation.name,
            "query": operation.document,
            "variables": variables,
        });

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(operation = operation.name, status = status.as_u16(), "GraphQL response");

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GraphqlError::Unauthorized(
                String::from_utf8_lossy(&bytes).into_owned(),
            ));
        }
        if !status.is_success() {
            return Err(GraphqlError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        parse_envelope(&bytes)
    }
}

#[async_trait]
impl GraphqlClient for HttpGraphqlClient {
    #[instrument(skip(self, variables), fields(operation = operation.name))]
    async fn query(
        &self,
        operation: Operation,
        variables: Variables,
    ) -> Result<Value, GraphqlError> {
        let result = self
            .retry
            .run(&self.cancel, GraphqlError::is_transient, |_| {
                self.send(operation, &variables)
            })
            .await;

        match result {
            Ok(data) => Ok(data),
            Err(RetryError::Failed(e)) | Err(RetryError::Cancelled(Some(e))) => Err(e),
            Err(RetryError::Cancelled(None)) => Err(GraphqlError::Cancelled),
        }
    }

    #[instrument(skip(self, variables), fields(operation = operation.name))]
    async fn mutate(
        &self,
        operation: Operation,
        variables: Variables,
    ) -> Result<Value, GraphqlError> {
        if self.cancel.is_cancelled() {
            return Err(GraphqlError::Cancelled);
        }
        self.send(operation, &variables).await
    }
}

fn graphql_url(endpoint: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    if base.ends_with("/graphql") {
        base.to_string()
    } else {
        format!("{base}/graphql")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::CancelHandle;

    #[test]
    fn test_graphql_url() {
        assert_eq!(
            graphql_url("https://demo.app.spacelift.io"),
            "https://demo.app.spacelift.io/graphql"
        );
        assert_eq!(
            graphql_url("https://demo.app.spacelift.io/"),
            "https://demo.app.spacelift.io/graphql"
        );
        assert_eq!(
            graphql_url("https://demo.app.spacelift.io/graphql"),
            "https://demo.app.spacelift.io/graphql"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let client = HttpGraphqlClient::new(
            "https://demo.app.spacelift.io",
            "super-secret-jwt",
            Duration::from_secs(5),
        )
        .unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret-jwt"));
        assert!(debug.contains("https://demo.app.spacelift.io/graphql"));
    }

    #[tokio::test]
    async fn test_cancelled_client_sends_nothing() {
        let (handle, signal) = CancelHandle::new();
        handle.cancel();

        let client = HttpGraphqlClient::new("http://127.0.0.1:9", "t", Duration::from_secs(1))
            .unwrap()
            .with_cancel(signal);
        let op = Operation {
            name: "Ping",
            document: "query Ping { __typename }",
        };

        let err = client.query(op, Variables::new()).await.unwrap_err();
        assert!(matches!(err, GraphqlError::Cancelled));

        let err = client.mutate(op, Variables::new()).await.unwrap_err();
        assert!(matches!(err, GraphqlError::Cancelled));
    }
}
