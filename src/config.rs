//! Provider configuration.
//!
//! The `provider` block is validated against [`schema`], decoded into a
//! [`ProviderConfig`], and completed from the environment where attributes
//! are left unset.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::graphql::{GraphqlError, HttpGraphqlClient};
use crate::retry::{CancelSignal, RetryPolicy};
use crate::schema::{Attribute, Schema};
use crate::validation;

/// Environment variable consulted when `api_key_endpoint` is unset.
pub const ENDPOINT_ENV: &str = "SPACELIFT_API_KEY_ENDPOINT";

/// Environment variable consulted when `api_token` is unset.
pub const TOKEN_ENV: &str = "SPACELIFT_API_TOKEN";

/// Request timeout used when `request_timeout_secs` is unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Schema of the `provider` block.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Connection settings for the Spacelift API")
        .with_attribute(
            "api_key_endpoint",
            Attribute::optional_string()
                .with_description(format!(
                    "Root URL of the Spacelift account, e.g. https://demo.app.spacelift.io. \
                     Defaults to ${ENDPOINT_ENV}."
                )),
        )
        .with_attribute(
            "api_token",
            Attribute::optional_string()
                .sensitive()
                .with_description(format!("Bearer token for the API. Defaults to ${TOKEN_ENV}.")),
        )
        .with_attribute(
            "request_timeout_secs",
            Attribute::optional_int64()
                .with_default(json!(DEFAULT_TIMEOUT.as_secs()))
                .with_description("Timeout for a single API request, in seconds"),
        )
        .with_attribute(
            "max_attempts",
            Attribute::optional_int64()
                .with_default(json!(1))
                .with_description(
                    "Attempts per read query, including the first; 1 disables retries",
                ),
        )
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    api_key_endpoint: Option<String>,
    #[serde(default)]
    api_token: Option<String>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    max_attempts: Option<u32>,
}

/// Decoded provider configuration.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    /// Root URL of the API.
    pub endpoint: String,
    /// Bearer token.
    pub token: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy for read queries.
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ProviderConfig {
    /// Decode the `provider` block, looking up unset values with `env`.
    pub fn from_value(
        config: &Value,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ProviderError> {
        let config = match config {
            Value::Null => json!({}),
            other => other.clone(),
        };
        if let Err(diagnostics) = validation::validate_result(&schema(), &config) {
            let summaries: Vec<_> = diagnostics.into_iter().map(|d| d.summary).collect();
            return Err(ProviderError::Configuration(summaries.join("; ")));
        }
        let raw: RawConfig = serde_json::from_value(config)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        let endpoint = non_empty(raw.api_key_endpoint)
            .or_else(|| non_empty(env(ENDPOINT_ENV)))
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "api_key_endpoint is not set and ${ENDPOINT_ENV} is empty"
                ))
            })?;
        let token = non_empty(raw.api_token)
            .or_else(|| non_empty(env(TOKEN_ENV)))
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "api_token is not set and ${TOKEN_ENV} is empty"
                ))
            })?;

        let timeout = match raw.request_timeout_secs {
            Some(0) => {
                return Err(ProviderError::Configuration(
                    "request_timeout_secs must be positive".to_string(),
                ))
            },
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TIMEOUT,
        };
        let retry = match raw.max_attempts {
            Some(0) => {
                return Err(ProviderError::Configuration(
                    "max_attempts must be at least 1".to_string(),
                ))
            },
            Some(n) => RetryPolicy::none().with_max_attempts(n),
            None => RetryPolicy::none(),
        };

        Ok(Self {
            endpoint,
            token,
            timeout,
            retry,
        })
    }

    /// Build the HTTP client described by this configuration.
    pub fn client(&self, cancel: CancelSignal) -> Result<HttpGraphqlClient, GraphqlError> {
        Ok(
            HttpGraphqlClient::new(&self.endpoint, self.token.clone(), self.timeout)?
                .with_retry(self.retry)
                .with_cancel(cancel),
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
