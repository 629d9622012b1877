//! Test doubles and a lifecycle harness for the provider.
//!
//! [`StubInstatus`] is an in-memory [`InstatusApi`] that records every call;
//! [`ProviderTester`] drives a [`ProviderService`] the way a host would,
//! without any transport in between.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use instatus_provider::testing::{ProviderTester, StubInstatus};
//! use instatus_provider::InstatusProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_component() {
//!     let stub = Arc::new(StubInstatus::new());
//!     let tester = ProviderTester::new(InstatusProvider::with_client(stub.clone()));
//!
//!     let state = tester
//!         .lifecycle_create("instatus_component", json!({
//!             "page_id": "page-1",
//!             "name": "API",
//!             "status": "OPERATIONAL"
//!         }))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(state["id"], "cmp-1");
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::client::{
    ApiError, InstatusApi, RemoteComponent, RemoteTemplate, RemoteTemplateComponent, RemoteUser,
};
use crate::error::ProviderError;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::types::PlanResult;

// =========================================================================
// Stub Client
// =========================================================================

/// A call received by [`StubInstatus`], with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    /// `create_template`
    CreateTemplate {
        /// Page argument.
        page_id: String,
        /// Request body.
        body: RemoteTemplate,
    },
    /// `get_template`
    GetTemplate {
        /// Page argument.
        page_id: String,
        /// Template argument.
        id: String,
    },
    /// `update_template`
    UpdateTemplate {
        /// Page argument.
        page_id: String,
        /// Template argument.
        id: String,
        /// Request body.
        body: RemoteTemplate,
    },
    /// `delete_template`
    DeleteTemplate {
        /// Page argument.
        page_id: String,
        /// Template argument.
        id: String,
    },
    /// `create_component`
    CreateComponent {
        /// Page argument.
        page_id: String,
        /// Request body.
        body: RemoteComponent,
    },
    /// `get_component`
    GetComponent {
        /// Page argument.
        page_id: String,
        /// Component argument.
        id: String,
    },
    /// `update_component`
    UpdateComponent {
        /// Page argument.
        page_id: String,
        /// Component argument.
        id: String,
        /// Request body.
        body: RemoteComponent,
    },
    /// `delete_component`
    DeleteComponent {
        /// Page argument.
        page_id: String,
        /// Component argument.
        id: String,
    },
    /// `get_user`
    GetUser,
}

#[derive(Default)]
struct StubState {
    templates: HashMap<(String, String), RemoteTemplate>,
    components: HashMap<(String, String), RemoteComponent>,
    user: Option<RemoteUser>,
    calls: Vec<RecordedCall>,
    next_id: u64,
    failure: Option<(u16, String)>,
}

impl StubState {
    /// Record `call`, then fail if a failure has been armed.
    fn record(&mut self, call: RecordedCall) -> Result<(), ApiError> {
        self.calls.push(call);
        match &self.failure {
            Some((status, body)) => Err(ApiError::Status {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(()),
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// In-memory [`InstatusApi`] keyed by `(page_id, id)`.
///
/// Objects are stored in the shape the API returns them: template components
/// come back under `componentId`. Missing objects produce
/// [`ApiError::NotFound`] with the path the HTTP client would have used.
#[derive(Default)]
pub struct StubInstatus {
    state: Mutex<StubState>,
}

impl StubInstatus {
    /// Create an empty stub with no user.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `user` from `get_user`.
    pub fn with_user(self, user: RemoteUser) -> Self {
        self.lock().user = Some(user);
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Make every subsequent call fail with the given status. Calls are still recorded.
    pub fn fail_with_status(&self, status: u16, body: &str) {
        self.lock().failure = Some((status, body.to_string()));
    }

    /// Store a template directly, bypassing the call log.
    pub fn insert_template(&self, page_id: &str, id: &str, template: RemoteTemplate) {
        self.lock()
            .templates
            .insert((page_id.to_string(), id.to_string()), template);
    }

    /// Store a component directly, bypassing the call log.
    pub fn insert_component(&self, page_id: &str, id: &str, component: RemoteComponent) {
        self.lock()
            .components
            .insert((page_id.to_string(), id.to_string()), component);
    }

    /// The stored template, if any.
    pub fn template(&self, page_id: &str, id: &str) -> Option<RemoteTemplate> {
        self.lock()
            .templates
            .get(&(page_id.to_string(), id.to_string()))
            .cloned()
    }

    /// The stored component, if any.
    pub fn component(&self, page_id: &str, id: &str) -> Option<RemoteComponent> {
        self.lock()
            .components
            .get(&(page_id.to_string(), id.to_string()))
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn template_not_found(page_id: &str, id: &str) -> ApiError {
    ApiError::NotFound {
        path: format!("/v1/{}/templates/{}", page_id, id),
    }
}

fn component_not_found(page_id: &str, id: &str) -> ApiError {
    ApiError::NotFound {
        path: format!("/v1/{}/components/{}", page_id, id),
    }
}

/// The template as the API would store and return it.
fn stored_template(id: &str, body: &RemoteTemplate) -> RemoteTemplate {
    RemoteTemplate {
        id: Some(id.to_string()),
        components: body
            .components
            .iter()
            .map(|c| RemoteTemplateComponent {
                id: None,
                component_id: c.component().map(str::to_owned),
                status: c.status,
            })
            .collect(),
        ..body.clone()
    }
}

#[async_trait]
impl InstatusApi for StubInstatus {
    async fn create_template(
        &self,
        page_id: &str,
        template: &RemoteTemplate,
    ) -> Result<RemoteTemplate, ApiError> {
        let mut state = self.lock();
        state.record(RecordedCall::CreateTemplate {
            page_id: page_id.to_string(),
            body: template.clone(),
        })?;
        let id = state.next_id("tpl");
        let stored = stored_template(&id, template);
        state
            .templates
            .insert((page_id.to_string(), id), stored.clone());
        Ok(stored)
    }

    async fn get_template(
        &self,
        page_id: &str,
        template_id: &str,
    ) -> Result<RemoteTemplate, ApiError> {
        let mut state = self.lock();
        state.record(RecordedCall::GetTemplate {
            page_id: page_id.to_string(),
            id: template_id.to_string(),
        })?;
        state
            .templates
            .get(&(page_id.to_string(), template_id.to_string()))
            .cloned()
            .ok_or_else(|| template_not_found(page_id, template_id))
    }

    async fn update_template(
        &self,
        page_id: &str,
        template_id: &str,
        template: &RemoteTemplate,
    ) -> Result<RemoteTemplate, ApiError> {
        let mut state = self.lock();
        state.record(RecordedCall::UpdateTemplate {
            page_id: page_id.to_string(),
            id: template_id.to_string(),
            body: template.clone(),
        })?;
        let stored = state
            .templates
            .get_mut(&(page_id.to_string(), template_id.to_string()))
            .ok_or_else(|| template_not_found(page_id, template_id))?;
        *stored = stored_template(template_id, template);
        Ok(stored.clone())
    }

    async fn delete_template(&self, page_id: &str, template_id: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.record(RecordedCall::DeleteTemplate {
            page_id: page_id.to_string(),
            id: template_id.to_string(),
        })?;
        state
            .templates
            .remove(&(page_id.to_string(), template_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| template_not_found(page_id, template_id))
    }

    async fn create_component(
        &self,
        page_id: &str,
        component: &RemoteComponent,
    ) -> Result<RemoteComponent, ApiError> {
        let mut state = self.lock();
        state.record(RecordedCall::CreateComponent {
            page_id: page_id.to_string(),
            body: component.clone(),
        })?;
        let id = state.next_id("cmp");
        let stored = RemoteComponent {
            id: Some(id.clone()),
            ..component.clone()
        };
        state
            .components
            .insert((page_id.to_string(), id), stored.clone());
        Ok(stored)
    }

    async fn get_component(
        &self,
        page_id: &str,
        component_id: &str,
    ) -> Result<RemoteComponent, ApiError> {
        let mut state = self.lock();
        state.record(RecordedCall::GetComponent {
            page_id: page_id.to_string(),
            id: component_id.to_string(),
        })?;
        state
            .components
            .get(&(page_id.to_string(), component_id.to_string()))
            .cloned()
            .ok_or_else(|| component_not_found(page_id, component_id))
    }

    async fn update_component(
        &self,
        page_id: &str,
        component_id: &str,
        component: &RemoteComponent,
    ) -> Result<RemoteComponent, ApiError> {
        let mut state = self.lock();
        state.record(RecordedCall::UpdateComponent {
            page_id: page_id.to_string(),
            id: component_id.to_string(),
            body: component.clone(),
        })?;
        let stored = state
            .components
            .get_mut(&(page_id.to_string(), component_id.to_string()))
            .ok_or_else(|| component_not_found(page_id, component_id))?;
        *stored = RemoteComponent {
            id: Some(component_id.to_string()),
            ..component.clone()
        };
        Ok(stored.clone())
    }

    async fn delete_component(&self, page_id: &str, component_id: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.record(RecordedCall::DeleteComponent {
            page_id: page_id.to_string(),
            id: component_id.to_string(),
        })?;
        state
            .components
            .remove(&(page_id.to_string(), component_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| component_not_found(page_id, component_id))
    }

    async fn get_user(&self) -> Result<RemoteUser, ApiError> {
        let mut state = self.lock();
        state.record(RecordedCall::GetUser)?;
        state.user.clone().ok_or_else(|| ApiError::NotFound {
            path: "/v1/user".to_string(),
        })
    }
}

// =========================================================================
// Provider Tester
// =========================================================================

/// Drives a [`ProviderService`] through the same call sequences a host uses.
///
/// Plans pass the proposed state as the configuration too, which is what a
/// host does when no attribute is unknown.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
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

    /// Validate a resource configuration.
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
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
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

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
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

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run plan → create → read and return the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self.plan_create(resource_type, config).await?;
        let created_state = self
            .create(resource_type, plan_result.planned_state)
            .await?;
        self.read(resource_type, created_state).await
    }

    /// Run plan → update → read and return the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated_state = self
            .update(resource_type, prior_state, plan_result.planned_state)
            .await?;
        self.read(resource_type, updated_state).await
    }

    /// Run plan → delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let _ = self
            .plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Run create → update → delete.
    ///
    /// Returns the state after the update (before delete).
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created_state = self.lifecycle_create(resource_type, initial_config).await?;
        let updated_state = self
            .lifecycle_update(resource_type, created_state, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated_state.clone())
            .await?;
        Ok(updated_state)
    }
}

/// Failure of a tester call that reports diagnostics.
#[derive(Debug, Error)]
pub enum TestError {
    /// The provider returned error diagnostics.
    #[error("Operation failed with {} diagnostic(s):\n{}", .0.len(), render_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// The provider call itself failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| match &d.attribute {
            Some(attr) => format!("  [{:?}] {} (at {})", d.severity, d, attr),
            None => format!("  [{:?}] {}", d.severity, d),
        })
        .collect::<Vec<_>>()
        .join("\n")
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

/// Assert that a plan creates the resource in place.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to create, not replace"
    );
}

/// Assert that a plan result indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan updates in place and changes `path`.
///
/// # Panics
///
/// Panics if the plan requires replacement or leaves `path` untouched.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
    let has_change = plan.changes.iter().any(|c| c.path == path);
    assert!(
        has_change,
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
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
        .any(|d| d.is_error() && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InstatusProvider;
    use serde_json::json;
    use std::sync::Arc;

    fn component() -> Value {
        json!({
            "page_id": "page-1",
            "name": "API",
            "status": "OPERATIONAL"
        })
    }

    fn tester(stub: &Arc<StubInstatus>) -> ProviderTester<InstatusProvider> {
        ProviderTester::new(InstatusProvider::with_client(stub.clone()))
    }

    #[tokio::test]
    async fn test_stub_assigns_ids_and_records_calls() {
        let stub = StubInstatus::new();
        let body = RemoteComponent {
            name: Some("API".to_string()),
            ..Default::default()
        };
        let first = stub.create_component("page-1", &body).await.unwrap();
        let second = stub.create_component("page-1", &body).await.unwrap();
        assert_eq!(first.id.as_deref(), Some("cmp-1"));
        assert_eq!(second.id.as_deref(), Some("cmp-2"));
        assert_eq!(stub.calls().len(), 2);
        assert!(stub.component("page-1", "cmp-1").is_some());
        assert!(stub.component("page-2", "cmp-1").is_none());
    }

    #[tokio::test]
    async fn test_stub_returns_template_components_under_response_key() {
        let stub = StubInstatus::new();
        let body = RemoteTemplate {
            components: vec![RemoteTemplateComponent {
                id: Some("c1".to_string()),
                component_id: None,
                status: None,
            }],
            ..Default::default()
        };
        let created = stub.create_template("page-1", &body).await.unwrap();
        assert_eq!(created.components[0].id, None);
        assert_eq!(created.components[0].component_id.as_deref(), Some("c1"));
        assert_eq!(
            stub.template("page-1", "tpl-1").map(|t| t.components.len()),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_stub_failure_is_recorded() {
        let stub = StubInstatus::new();
        stub.fail_with_status(503, "unavailable");
        let err = stub.get_user().await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 503, .. }));
        assert_eq!(stub.calls(), vec![RecordedCall::GetUser]);
    }

    #[tokio::test]
    async fn test_stub_missing_user_is_not_found() {
        let err = StubInstatus::new().get_user().await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { ref path } if path == "/v1/user"));
    }

    #[tokio::test]
    async fn test_tester_types() {
        let tester = tester(&Arc::new(StubInstatus::new()));
        assert_eq!(
            tester.resource_types(),
            vec!["instatus_component", "instatus_template"]
        );
        assert_eq!(tester.data_source_types(), vec!["instatus_user"]);
        assert!(tester.schema().provider.block.attributes["api_key"].sensitive);
    }

    #[tokio::test]
    async fn test_tester_plan_create() {
        let tester = tester(&Arc::new(StubInstatus::new()));
        let plan = tester
            .plan_create("instatus_component", component())
            .await
            .unwrap();

        assert_plan_creates(&plan);
        assert_plan_changes_attribute(&plan, "name");
        assert!(plan.planned_state.get("id").is_none());
    }

    #[tokio::test]
    async fn test_tester_lifecycle_crud() {
        let stub = Arc::new(StubInstatus::new());
        let tester = tester(&stub);

        let mut updated = component();
        updated["status"] = json!("MAJOROUTAGE");
        let final_state = tester
            .lifecycle_crud("instatus_component", component(), updated)
            .await
            .unwrap();

        assert_eq!(final_state["id"], "cmp-1");
        assert_eq!(final_state["status"], "MAJOROUTAGE");
        assert!(stub.component("page-1", "cmp-1").is_none());
        assert!(matches!(
            stub.calls().last(),
            Some(RecordedCall::DeleteComponent { id, .. }) if id == "cmp-1"
        ));
    }

    #[tokio::test]
    async fn test_tester_validate_resource_config() {
        let tester = tester(&Arc::new(StubInstatus::new()));
        assert!(tester
            .validate_resource_config("instatus_component", component())
            .await
            .is_ok());

        let mut bogus = component();
        bogus["status"] = json!("BOGUS");
        match tester
            .validate_resource_config("instatus_component", bogus)
            .await
        {
            Err(TestError::Diagnostics(diags)) => assert_error_contains(&diags, "Invalid value"),
            other => panic!("expected diagnostics, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tester_plan_without_changes() {
        let tester = tester(&Arc::new(StubInstatus::new()));
        let created = tester
            .lifecycle_create("instatus_component", component())
            .await
            .unwrap();
        let plan = tester
            .plan_update("instatus_component", created.clone(), created.clone())
            .await
            .unwrap();

        assert_plan_no_changes(&plan);
        assert_eq!(plan.planned_state, created);
    }

    #[test]
    #[should_panic(expected = "Expected an error containing")]
    fn test_assert_error_contains_fails() {
        let diagnostics = vec![Diagnostic::warning("Invalid but only a warning")];
        assert_error_contains(&diagnostics, "Invalid");
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("First error").with_attribute("status"),
            Diagnostic::error("Second error").with_detail("More info"),
        ]);

        let display = format!("{}", err);
        assert!(display.contains("First error"));
        assert!(display.contains("Second error"));
        assert!(display.contains("status"));
        assert!(display.contains("More info"));
    }
}
