//! Minimal GraphQL client contract.
//!
//! The provider only needs two calls: run a query, run a mutation. Both take
//! a named [`Operation`] and a string-keyed map of variables and hand back the
//! `data` member of the response. How requests travel (HTTP, auth headers,
//! retries) is up to the implementation; see [`HttpGraphqlClient`].

mod http;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub use self::http::HttpGraphqlClient;

/// Variables passed alongside an operation.
pub type Variables = serde_json::Map<String, Value>;

/// A named GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// The operation name, also sent as `operationName`.
    pub name: &'static str,
    /// The full document text.
    pub document: &'static str,
}

/// Failures talking to the GraphQL API.
#[derive(Debug, Error)]
pub enum GraphqlError {
    /// The request never produced an HTTP response.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The API answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The API answered with GraphQL errors.
    #[error("{}", join_messages(.0))]
    Response(Vec<ErrorMessage>),

    /// The response carried neither data nor errors.
    #[error("response has no data")]
    MissingData,

    /// The response did not match the expected shape.
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The caller gave up before the request completed.
    #[error("request cancelled")]
    Cancelled,
}

impl GraphqlError {
    /// Whether the same request may succeed if sent again.
    pub fn is_transient(&self) -> bool {
        match self {
            GraphqlError::Http(e) => e.is_timeout() || e.is_connect(),
            GraphqlError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorMessage {
    /// Human-readable message.
    pub message: String,
}

fn join_messages(errors: &[ErrorMessage]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// The two calls the provider makes against the API.
#[async_trait]
pub trait GraphqlClient: Send + Sync {
    /// Run a query and return its `data`.
    async fn query(&self, operation: Operation, variables: Variables)
        -> Result<Value, GraphqlError>;

    /// Run a mutation and return its `data`.
    async fn mutate(
        &self,
        operation: Operation,
        variables: Variables,
    ) -> Result<Value, GraphqlError>;
}

/// Decode the `data` of a response into `T`.
pub fn decode<T: DeserializeOwned>(data: Value) -> Result<T, GraphqlError> {
    Ok(serde_json::from_value(data)?)
}

/// Split a response body into data or errors.
pub(crate) fn parse_envelope(body: &[u8]) -> Result<Value, GraphqlError> {
    #[derive(Deserialize)]
    struct Envelope {
        #[serde(default)]
        data: Option<Value>,
        #[serde(default)]
        errors: Vec<ErrorMessage>,
    }

    let envelope: Envelope = serde_json::from_slice(body)?;
    if !envelope.errors.is_empty() {
        return Err(GraphqlError::Response(envelope.errors));
    }
    match envelope.data {
        Some(Value::Null) | None => Err(GraphqlError::MissingData),
        Some(data) => Ok(data),
    }
}

/// Build a [`Variables`] map from `key => value` pairs.
#[macro_export]
macro_rules! variables {
    ($($key:literal => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::graphql::Variables::new();
        $(map.insert($key.to_string(), $crate::serde_json::json!($value));)*
        map
    }};
}
