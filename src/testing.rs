//! Test harness for driving a [`ProviderService`] without a gRPC server.
//!
//! The tester mirrors what a host does in a run: validate, plan against the
//! prior state, then apply. Configuration values double as the proposed state,
//! so attributes left out of a config are "unconfigured" for the plan
//! modifiers.
//!
//! ```ignore
//! use msgraph_groups_provider::testing::ProviderTester;
//! use msgraph_groups_provider::GraphProvider;
//! use serde_json::json;
//!
//! let tester = ProviderTester::new(GraphProvider::new());
//! tester.configure(json!({"access_token": "token"})).await?;
//! let group = tester
//!     .apply_create("msgraph_group", json!({"display_name": "Ops", "mail_nickname": "ops"}))
//!     .await?;
//! ```

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Drives a provider through host-style operations.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names, sorted.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration; error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        check_diagnostics(self.provider.validate_provider_config(config).await?)
    }

    /// Configure the provider; error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        check_diagnostics(self.provider.configure(config).await?)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Validate a resource configuration; error diagnostics become `Err`.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        check_diagnostics(
            self.provider
                .validate_resource_config(resource_type, config)
                .await?,
        )
    }

    /// Plan creating a resource from `config`.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan moving `prior_state` to `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Plan destroying `prior_state`.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create from a planned state.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a state. `Null` means the object is gone.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update from a prior and planned state.
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

    /// Import an existing object by id.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Sources
    // =========================================================================

    /// Validate a data source configuration; error diagnostics become `Err`.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        check_diagnostics(
            self.provider
                .validate_data_source_config(data_source_type, config)
                .await?,
        )
    }

    /// Read a data source.
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
    // Apply helpers
    // =========================================================================

    /// Plan and create; returns the created state.
    pub async fn apply_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        self.create(resource_type, plan.planned_state).await
    }

    /// Plan against `prior_state` and update in place.
    ///
    /// Fails with `FailedPrecondition` when the plan requires replacement,
    /// since a host would destroy and recreate instead.
    pub async fn apply_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        if plan.requires_replace {
            return Err(ProviderError::FailedPrecondition(format!(
                "{} must be replaced, not updated",
                resource_type
            )));
        }
        if !plan.has_changes() {
            return Ok(prior_state);
        }
        self.update(resource_type, prior_state, plan.planned_state)
            .await
    }

    /// Plan the destroy and delete.
    pub async fn apply_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }
}

/// Failure of a tester operation that reports diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// Error diagnostics returned by the provider.
    Diagnostics(Vec<Diagnostic>),
    /// The provider call itself failed.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "{} error diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  {}", diag.summary)?;
                    if let Some(attr) = &diag.attribute {
                        write!(f, " [{}]", attr)?;
                    }
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
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
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| d.severity == DiagnosticSeverity::Error)
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertions
// =========================================================================

/// Assert the plan changes nothing.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, got {:?}",
        plan.changed_paths()
    );
}

/// Assert the plan replaces the resource.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(plan.requires_replace, "Expected the plan to require replacement");
}

/// Assert the plan updates in place and changes something.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(plan.has_changes(), "Expected the plan to have changes");
    assert!(
        !plan.requires_replace,
        "Expected an in-place update, but the plan requires replacement"
    );
}

/// Assert the plan changes `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected '{}' to change, changed: {:?}",
        path,
        plan.changed_paths()
    );
}

/// Assert the plan leaves `path` alone.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !plan.changes.iter().any(|c| c.path == path),
        "Expected '{}' not to change",
        path
    );
}

/// Assert some error diagnostic points at `attribute`.
pub fn assert_error_at(diagnostics: &[Diagnostic], attribute: &str) {
    assert!(
        diagnostics.iter().any(|d| {
            d.severity == DiagnosticSeverity::Error && d.attribute.as_deref() == Some(attribute)
        }),
        "Expected an error at '{}', got {:?}",
        attribute,
        diagnostics
            .iter()
            .map(|d| (&d.summary, &d.attribute))
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan_resource;
    use crate::schema::{Attribute, Schema};
    use serde_json::json;

    struct NotesProvider;

    fn note_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("title", Attribute::required_string())
            .with_attribute(
                "visibility",
                Attribute::optional_computed_string()
                    .use_state_for_unconfigured()
                    .with_force_new(),
            )
            .with_attribute(
                "description",
                Attribute::optional_computed_string().use_state_for_unconfigured(),
            )
    }

    #[async_trait::async_trait]
    impl ProviderService for NotesProvider {
        fn schema(&self) -> ProviderSchema {
            ProviderSchema::new().with_resource("note", note_schema())
        }

        async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
            if config.get("token").is_some() {
                Ok(vec![])
            } else {
                Ok(vec![Diagnostic::error("token is required").with_attribute("token")])
            }
        }

        async fn plan(
            &self,
            _resource_type: &str,
            prior_state: Option<Value>,
            proposed_state: Value,
            config: Value,
        ) -> Result<PlanResult, ProviderError> {
            Ok(plan_resource(&note_schema(), prior_state, proposed_state, &config))
        }

        async fn create(&self, _resource_type: &str, planned: Value) -> Result<Value, ProviderError> {
            let mut state = planned;
            state["id"] = json!("n-1");
            if state["visibility"].is_null() {
                state["visibility"] = json!("Private");
            }
            Ok(state)
        }

        async fn read(&self, _resource_type: &str, current: Value) -> Result<Value, ProviderError> {
            Ok(current)
        }

        async fn update(
            &self,
            _resource_type: &str,
            _prior: Value,
            planned: Value,
        ) -> Result<Value, ProviderError> {
            Ok(planned)
        }

        async fn delete(&self, _resource_type: &str, _current: Value) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_configure_reports_diagnostics() {
        let tester = ProviderTester::new(NotesProvider);
        assert!(tester.configure(json!({"token": "t"})).await.is_ok());

        let err = tester.configure(json!({})).await.unwrap_err();
        match err {
            TestError::Diagnostics(diags) => assert_error_at(&diags, "token"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_metadata_is_sorted() {
        let tester = ProviderTester::new(NotesProvider);
        assert_eq!(tester.resource_types(), vec!["note"]);
        assert!(tester.data_source_types().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_attributes_keep_state() {
        let tester = ProviderTester::new(NotesProvider);
        let created = tester
            .apply_create("note", json!({"title": "Weekly", "description": "minutes"}))
            .await
            .unwrap();
        assert_eq!(created["visibility"], "Private");

        let plan = tester
            .plan_update("note", created.clone(), json!({"title": "Weekly"}))
            .await
            .unwrap();
        assert_plan_no_changes(&plan);
        assert_eq!(plan.planned_state["description"], "minutes");
    }

    #[tokio::test]
    async fn test_apply_update_in_place() {
        let tester = ProviderTester::new(NotesProvider);
        let created = tester
            .apply_create("note", json!({"title": "Weekly"}))
            .await
            .unwrap();

        let plan = tester
            .plan_update("note", created.clone(), json!({"title": "Monthly"}))
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "title");
        assert_plan_does_not_change_attribute(&plan, "visibility");

        let updated = tester
            .apply_update("note", created, json!({"title": "Monthly"}))
            .await
            .unwrap();
        assert_eq!(updated["title"], "Monthly");
        assert_eq!(updated["id"], "n-1");
    }

    #[tokio::test]
    async fn test_apply_update_refuses_replacement() {
        let tester = ProviderTester::new(NotesProvider);
        let created = tester
            .apply_create("note", json!({"title": "Weekly"}))
            .await
            .unwrap();

        let config = json!({"title": "Weekly", "visibility": "Public"});
        let plan = tester
            .plan_update("note", created.clone(), config.clone())
            .await
            .unwrap();
        assert_plan_replaces(&plan);

        let err = tester.apply_update("note", created, config).await.unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_apply_delete() {
        let tester = ProviderTester::new(NotesProvider);
        let created = tester
            .apply_create("note", json!({"title": "Weekly"}))
            .await
            .unwrap();

        let plan = tester.plan_delete("note", created.clone()).await.unwrap();
        assert!(plan.planned_state.is_null());
        assert_plan_changes_attribute(&plan, "id");

        tester.apply_delete("note", created).await.unwrap();
    }

    #[test]
    fn test_error_display() {
        let err = TestError::Diagnostics(vec![Diagnostic::error("Invalid value")
            .with_attribute("visibility")
            .with_detail("expected one of Public, Private")]);
        let text = err.to_string();
        assert!(text.starts_with("1 error diagnostic(s):"));
        assert!(text.contains("Invalid value [visibility]: expected one of Public, Private"));
    }

    #[test]
    #[should_panic(expected = "Expected an error at 'title'")]
    fn test_assert_error_at_fails() {
        assert_error_at(&[Diagnostic::warning("deprecated").with_attribute("title")], "title");
    }
}
