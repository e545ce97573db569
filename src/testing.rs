//! Testing utilities for provider implementations.
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way the host would
//! (plan, then apply, then refresh) so tests can exercise whole lifecycles
//! against an in-memory backend.
//!
//! # Example
//!
//! ```
//! use spacelift_provider::testing::{assert_plan_no_changes, ProviderTester};
//! use spacelift_provider::{MemoryStore, SpaceliftProvider};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let provider = SpaceliftProvider::new()
//!     .unwrap()
//!     .with_backend(MemoryStore::new().with_stack("my-stack-id"));
//! let tester = ProviderTester::new(provider);
//!
//! let config = json!({"stack_id": "my-stack-id", "name": "BACON", "value": "is tasty"});
//! let state = tester
//!     .lifecycle_create("spacelift_environment_variable", config.clone())
//!     .await
//!     .unwrap();
//!
//! // the value is write-only, yet re-planning the same config is a no-op
//! let plan = tester
//!     .plan_update("spacelift_environment_variable", state, config)
//!     .await
//!     .unwrap();
//! assert_plan_no_changes(&plan);
//! # });
//! ```

use serde_json::Value;

use crate::error::ProviderError;
use crate::plan::SENSITIVE_PLACEHOLDER;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// A test harness for provider implementations.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration, failing on error diagnostics.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider, failing on error diagnostics.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration, failing on error diagnostics.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, config).await
    }

    /// Plan the move from `prior_state` to `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config)
            .await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a resource; `None` when it is gone.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source configuration, failing on error diagnostics.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read data from a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Plan, create, then read back. Returns the refreshed state.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, TestError> {
        self.validate_resource_config(resource_type, config.clone())
            .await?;
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.refresh(resource_type, created).await
    }

    /// Plan the change to `config` and apply it, replacing the resource when
    /// the plan says so. Returns the refreshed state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, TestError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config.clone())
            .await?;
        if !plan.has_changes() {
            return Ok(prior_state);
        }

        let applied = if plan.requires_replace {
            self.delete(resource_type, prior_state).await?;
            let plan = self.plan_create(resource_type, config).await?;
            self.create(resource_type, plan.planned_state).await?
        } else {
            self.update(resource_type, prior_state, plan.planned_state)
                .await?
        };
        self.refresh(resource_type, applied).await
    }

    /// Delete, then check that a refresh finds nothing.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), TestError> {
        self.delete(resource_type, current_state.clone()).await?;
        match self.read(resource_type, current_state).await? {
            None => Ok(()),
            Some(state) => Err(TestError::StillPresent(state)),
        }
    }

    /// Create, update, then delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, TestError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }

    async fn refresh(&self, resource_type: &str, state: Value) -> Result<Value, TestError> {
        self.read(resource_type, state)
            .await?
            .ok_or_else(|| TestError::Gone(resource_type.to_string()))
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
    /// A resource of this type vanished right after being written.
    Gone(String),
    /// A deleted resource still reads back with this state.
    StillPresent(Value),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
            TestError::Gone(resource_type) => {
                write!(f, "{} read back as absent right after it was written", resource_type)
            },
            TestError::StillPresent(state) => {
                write!(f, "resource {} still exists after delete", state["id"])
            },
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan creates something without replacing anything.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        plan.has_changes(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan result indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan changes something in place.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(plan.has_changes(), "Expected plan to have changes");
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan has a change for a specific attribute path.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let has_change = plan.changes.iter().any(|c| c.path == path);
    assert!(
        has_change,
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that the planned change to `path` shows no plaintext.
///
/// # Panics
///
/// Panics if `path` is unchanged or either side of its change is not masked.
pub fn assert_plan_masks_attribute(plan: &PlanResult, path: &str) {
    let Some(change) = plan.changes.iter().find(|c| c.path == path) else {
        panic!("Expected plan to change attribute '{}'", path);
    };
    for side in [&change.before, &change.after].into_iter().flatten() {
        assert_eq!(
            side.as_str(),
            Some(SENSITIVE_PLACEHOLDER),
            "Expected attribute '{}' to be masked in the plan",
            path
        );
    }
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SpaceliftProvider;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn tester() -> ProviderTester<SpaceliftProvider> {
        let provider = SpaceliftProvider::new()
            .unwrap()
            .with_env(|_| None)
            .with_backend(MemoryStore::new().with_stack("s"));
        ProviderTester::new(provider)
    }

    #[test]
    fn test_tester_types() {
        let tester = tester();
        assert!(tester
            .resource_types()
            .contains(&"spacelift_environment_variable".to_string()));
        assert!(tester
            .data_source_types()
            .contains(&"spacelift_context".to_string()));
        assert!(tester.schema().provider.attribute("api_key_endpoint").is_some());
    }

    #[tokio::test]
    async fn test_tester_configure_errors() {
        let tester = tester();
        let err = tester.configure(json!({})).await.unwrap_err();
        assert!(matches!(err, TestError::Diagnostics(_)));
        assert!(err.to_string().contains("api_key_endpoint"));

        let err = tester
            .validate_provider_config(json!({"max_attempts": "many"}))
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Diagnostics(_)));
    }

    #[tokio::test]
    async fn test_tester_plan_create_masks_value() {
        let tester = tester();
        let plan = tester
            .plan_create(
                "spacelift_environment_variable",
                json!({"stack_id": "s", "name": "BACON", "value": "is tasty"}),
            )
            .await
            .unwrap();

        assert_plan_creates(&plan);
        assert_plan_changes_attribute(&plan, "name");
        assert_plan_masks_attribute(&plan, "value");
        assert!(!serde_json::to_string(&plan.changes).unwrap().contains("is tasty"));
    }

    #[tokio::test]
    async fn test_tester_lifecycle_crud_replaces_config_elements() {
        let tester = tester();
        let updated = tester
            .lifecycle_crud(
                "spacelift_environment_variable",
                json!({"stack_id": "s", "name": "BACON", "value": "is tasty", "write_only": false}),
                json!({
                    "stack_id": "s",
                    "name": "BACON",
                    "value": "is crispy",
                    "write_only": false
                }),
            )
            .await
            .unwrap();

        assert_eq!(updated["value"], "is crispy");
        assert_eq!(updated["id"], "stack/s/BACON");
    }

    #[tokio::test]
    async fn test_tester_lifecycle_crud_updates_contexts_in_place() {
        let tester = tester();
        let created = tester
            .lifecycle_create("spacelift_context", json!({"name": "ctx1"}))
            .await
            .unwrap();

        let plan = tester
            .plan_update(
                "spacelift_context",
                created.clone(),
                json!({"name": "ctx1", "labels": ["team:core"]}),
            )
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "labels");

        let updated = tester
            .lifecycle_update(
                "spacelift_context",
                created,
                json!({"name": "ctx1", "labels": ["team:core"]}),
            )
            .await
            .unwrap();
        assert_eq!(updated["labels"], json!(["team:core"]));
        assert_eq!(updated["id"], "ctx1");

        tester
            .lifecycle_delete("spacelift_context", updated)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_tester_unchanged_mounted_file() {
        let tester = tester();
        let config = json!({"stack_id": "s", "relative_path": "bacon.txt", "content": "YmFjb24="});
        let state = tester
            .lifecycle_create("spacelift_mounted_file", config.clone())
            .await
            .unwrap();
        assert!(state["content"].is_null());

        let plan = tester
            .plan_update("spacelift_mounted_file", state.clone(), config)
            .await
            .unwrap();
        assert_plan_no_changes(&plan);

        let plan = tester
            .plan_update(
                "spacelift_mounted_file",
                state,
                json!({"stack_id": "s", "relative_path": "bacon.txt", "content": "ZWdncw=="}),
            )
            .await
            .unwrap();
        assert_plan_replaces(&plan);
        assert_plan_masks_attribute(&plan, "content");
    }

    #[tokio::test]
    async fn test_tester_validation_failure() {
        let tester = tester();
        let err = tester
            .lifecycle_create(
                "spacelift_environment_variable",
                json!({"stack_id": "s", "context_id": "c", "name": "BACON"}),
            )
            .await
            .unwrap_err();
        match err {
            TestError::Diagnostics(diagnostics) => {
                assert_error_contains(&diagnostics, "Only one of");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_assert_no_errors() {
        let diagnostics = vec![Diagnostic::warning("Just a warning")];
        assert_no_errors(&diagnostics);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        let diagnostics = vec![Diagnostic::error("An error")];
        assert_no_errors(&diagnostics);
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("First error").with_attribute("field1"),
            Diagnostic::error("Second error").with_detail("More info"),
        ]);

        let display = format!("{}", err);
        assert!(display.contains("First error"));
        assert!(display.contains("Second error"));
        assert!(display.contains("field1"));
        assert!(display.contains("More info"));

        let err = TestError::StillPresent(json!({"id": "stack/s/BACON"}));
        assert!(err.to_string().contains("stack/s/BACON"));
    }
}
