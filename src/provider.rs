//! The Instatus provider: dispatches host calls to the reconcilers.
//!
//! State documents cross this boundary as JSON. Each call validates the
//! document against the resource schema and decodes it into the typed state
//! before any remote call, so enum violations never reach the API.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::client::{Client, InstatusApi};
use crate::component::{ComponentResource, COMPONENT_TYPE_NAME};
use crate::config::{resolve_api_key_from_env, ProviderConfig, API_KEY_ENV_VAR};
use crate::error::ProviderError;
use crate::reconciler::{ManagedResource, Reconciler};
use crate::schema::{Attribute, Diagnostic, ProviderSchema, Schema};
use crate::service::ProviderService;
use crate::template::{TemplateResource, TEMPLATE_TYPE_NAME};
use crate::types::{AttributeChange, ImportedResource, PlanResult};
use crate::user::{UserProjector, USER_TYPE_NAME};
use crate::validation::validate;

/// Provider for Instatus status pages.
///
/// The API client is shared by every reconciler and is installed either by
/// [`ProviderService::configure`] or up front with [`InstatusProvider::with_client`].
#[derive(Default)]
pub struct InstatusProvider {
    client: RwLock<Option<Arc<dyn InstatusApi>>>,
}

impl InstatusProvider {
    /// Create an unconfigured provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider that uses `client` without going through `configure`.
    pub fn with_client(client: Arc<dyn InstatusApi>) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    /// The configured API client.
    pub async fn client(&self) -> Result<Arc<dyn InstatusApi>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "Instatus API client is not configured; configure the provider first".to_string(),
            )
        })
    }

    fn provider_config_schema() -> Schema {
        Schema::new().with_attribute(
            "api_key",
            Attribute::optional_string().sensitive().with_description(format!(
                "API key for Instatus. May also be provided via {} environment variable.",
                API_KEY_ENV_VAR
            )),
        )
    }

    fn resource_schema(&self, resource_type: &str) -> Result<Schema, ProviderError> {
        match resource_type {
            TEMPLATE_TYPE_NAME => Ok(TemplateResource.schema()),
            COMPONENT_TYPE_NAME => Ok(ComponentResource.schema()),
            other => Err(unknown_resource(other)),
        }
    }

    async fn reconciler<R: ManagedResource>(&self) -> Result<Reconciler<R>, ProviderError> {
        Ok(Reconciler::new(self.client().await?))
    }

    async fn create_with<R: ManagedResource>(
        &self,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let desired = decode::<R>(planned)?;
        let state = self.reconciler::<R>().await?.create(desired).await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn read_with<R: ManagedResource>(
        &self,
        current: Value,
    ) -> Result<Value, ProviderError> {
        let persisted = decode::<R>(current)?;
        let state = self.reconciler::<R>().await?.read(persisted).await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn update_with<R: ManagedResource>(
        &self,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior = decode::<R>(prior)?;
        let desired = decode::<R>(planned)?;
        let state = self
            .reconciler::<R>()
            .await?
            .update(desired, &prior)
            .await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn delete_with<R: ManagedResource>(&self, current: Value) -> Result<(), ProviderError> {
        let persisted = decode::<R>(current)?;
        self.reconciler::<R>().await?.delete(&persisted).await
    }
}

fn unknown_resource(resource_type: &str) -> ProviderError {
    ProviderError::UnknownResource(format!("Unknown resource type: {}", resource_type))
}

/// Validate `value` against the resource schema, then decode it.
fn decode<R: ManagedResource>(mut value: Value) -> Result<R::State, ProviderError> {
    let schema = R::default().schema();
    schema.normalize(&mut value);
    let diagnostics = validate(&schema, &value);
    if let Some(error) = diagnostics.iter().find(|d| d.is_error()) {
        return Err(ProviderError::Validation(error.to_string()));
    }

    serde_json::from_value(value).map_err(|e| {
        ProviderError::Validation(format!("Invalid {} state: {}", R::TYPE_NAME, e))
    })
}

/// Attribute-level differences between two state documents.
///
/// Computed-only attributes are ignored; a missing key and `null` compare equal.
fn diff(schema: &Schema, before: &Value, after: &Value) -> Vec<AttributeChange> {
    let mut changes: Vec<AttributeChange> = schema
        .configurable_names()
        .filter_map(|name| {
            let b = before.get(name).filter(|v| !v.is_null());
            let a = after.get(name).filter(|v| !v.is_null());
            match (b, a) {
                (None, Some(a)) => Some(AttributeChange::added(name, a.clone())),
                (Some(b), None) => Some(AttributeChange::removed(name, b.clone())),
                (Some(b), Some(a)) if b != a => {
                    Some(AttributeChange::modified(name, b.clone(), a.clone()))
                },
                _ => None,
            }
        })
        .collect();
    changes.sort_by(|x, y| x.path.cmp(&y.path));
    changes
}

/// Split an import identifier into the state it seeds.
///
/// `<page_id>/<id>` yields both; a bare id is passed through on its own.
fn parse_import_id(id: &str) -> Result<Value, ProviderError> {
    match id.split_once('/') {
        None if !id.is_empty() => Ok(json!({ "id": id })),
        Some((page_id, object_id))
            if !page_id.is_empty() && !object_id.is_empty() && !object_id.contains('/') =>
        {
            Ok(json!({ "page_id": page_id, "id": object_id }))
        },
        _ => Err(ProviderError::InvalidRequest(format!(
            "Unexpected import identifier '{}': expected <page_id>/<id>",
            id
        ))),
    }
}

#[async_trait::async_trait]
impl ProviderService for InstatusProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(Self::provider_config_schema())
            .with_resource(TEMPLATE_TYPE_NAME, TemplateResource.schema())
            .with_resource(COMPONENT_TYPE_NAME, ComponentResource.schema())
            .with_data_source(USER_TYPE_NAME, UserProjector::schema())
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&Self::provider_config_schema(), &config))
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = ProviderConfig::from_json(&config)?;
        let api_key = resolve_api_key_from_env(config.api_key)?;
        let client = Client::new(api_key);
        info!(base_url = client.base_url(), "Configured Instatus client");

        *self.client.write().await = Some(Arc::new(client));
        Ok(vec![])
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.resource_schema(resource_type)?;
        Ok(validate(&schema, &config))
    }

    #[instrument(skip(self, prior_state, proposed_state, _config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.resource_schema(resource_type)?;
        let mut prior = prior_state.unwrap_or(Value::Null);
        let mut proposed_state = proposed_state;
        schema.normalize(&mut prior);
        schema.normalize(&mut proposed_state);

        if proposed_state.is_null() {
            let changes = diff(&schema, &prior, &Value::Null);
            debug!(changes = changes.len(), "Planned delete");
            return Ok(PlanResult::with_changes(Value::Null, changes, false));
        }

        let changes = diff(&schema, &prior, &proposed_state);
        let mut planned = proposed_state;
        if let (Value::Object(prior), Value::Object(planned)) = (&prior, &mut planned) {
            if let Some(id) = prior.get("id").filter(|v| !v.is_null()) {
                planned.insert("id".to_string(), id.clone());
            }
            match prior.get("last_updated").filter(|v| !v.is_null()) {
                Some(timestamp) if changes.is_empty() => {
                    planned.insert("last_updated".to_string(), timestamp.clone());
                },
                _ => {
                    planned.remove("last_updated");
                },
            }
        }

        debug!(changes = changes.len(), "Planned");
        if changes.is_empty() {
            Ok(PlanResult::no_change(planned))
        } else {
            Ok(PlanResult::with_changes(planned, changes, false))
        }
    }

    #[instrument(skip(self, planned_state))]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        match resource_type {
            TEMPLATE_TYPE_NAME => self.create_with::<TemplateResource>(planned_state).await,
            COMPONENT_TYPE_NAME => self.create_with::<ComponentResource>(planned_state).await,
            other => Err(unknown_resource(other)),
        }
    }

    #[instrument(skip(self, current_state))]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        match resource_type {
            TEMPLATE_TYPE_NAME => self.read_with::<TemplateResource>(current_state).await,
            COMPONENT_TYPE_NAME => self.read_with::<ComponentResource>(current_state).await,
            other => Err(unknown_resource(other)),
        }
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        match resource_type {
            TEMPLATE_TYPE_NAME => {
                self.update_with::<TemplateResource>(prior_state, planned_state)
                    .await
            },
            COMPONENT_TYPE_NAME => {
                self.update_with::<ComponentResource>(prior_state, planned_state)
                    .await
            },
            other => Err(unknown_resource(other)),
        }
    }

    #[instrument(skip(self, current_state))]
    async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        match resource_type {
            TEMPLATE_TYPE_NAME => self.delete_with::<TemplateResource>(current_state).await,
            COMPONENT_TYPE_NAME => self.delete_with::<ComponentResource>(current_state).await,
            other => Err(unknown_resource(other)),
        }
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.resource_schema(resource_type)?;
        let state = parse_import_id(id)?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        match data_source_type {
            USER_TYPE_NAME => Ok(validate(&UserProjector::schema(), &config)),
            other => Err(ProviderError::UnknownResource(format!(
                "Unknown data source type: {}",
                other
            ))),
        }
    }

    #[instrument(skip(self, _config))]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        match data_source_type {
            USER_TYPE_NAME => {
                let user = UserProjector::new(self.client().await?).fetch().await?;
                Ok(serde_json::to_value(user)?)
            },
            other => Err(ProviderError::UnknownResource(format!(
                "Unknown data source type: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiError, RemoteUser};
    use crate::testing::{RecordedCall, StubInstatus};
    use temp_env::{with_var, with_var_unset};
    use tokio_test::{assert_err, assert_ok, block_on};

    fn template() -> Value {
        json!({
            "page_id": "page-1",
            "subdomain": "status",
            "name": "Scheduled upgrade",
            "type": "MAINTENANCE",
            "message": "Database upgrade in progress.",
            "status": "NOTSTARTEDYET",
            "notify": true,
            "components": [{"id": "c1", "status": "UNDERMAINTENANCE"}]
        })
    }

    fn component() -> Value {
        json!({
            "page_id": "page-1",
            "name": "API",
            "status": "OPERATIONAL"
        })
    }

    fn configured() -> (Arc<StubInstatus>, InstatusProvider) {
        let stub = Arc::new(StubInstatus::new());
        let provider = InstatusProvider::with_client(stub.clone());
        (stub, provider)
    }

    #[tokio::test]
    async fn test_unknown_enum_rejected_without_remote_call() {
        let (stub, provider) = configured();
        let mut doc = template();
        doc["status"] = json!("BOGUS");

        let err = assert_err!(provider.create(TEMPLATE_TYPE_NAME, doc).await);
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.message().contains("BOGUS"));

        let mut doc = template();
        doc["components"][0]["status"] = json!("BOGUS");
        let err = assert_err!(provider.create(TEMPLATE_TYPE_NAME, doc).await);
        assert!(matches!(err, ProviderError::Validation(_)));

        let mut doc = component();
        doc["status"] = json!("BOGUS");
        let err = assert_err!(provider.create(COMPONENT_TYPE_NAME, doc).await);
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.message().contains("BOGUS"));

        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_enum_on_update_makes_no_remote_call() {
        let (stub, provider) = configured();

        let mut prior = template();
        prior["id"] = json!("tpl-1");
        let mut planned = prior.clone();
        planned["status"] = json!("BOGUS");
        let err = assert_err!(provider.update(TEMPLATE_TYPE_NAME, prior, planned).await);
        assert!(matches!(err, ProviderError::Validation(_)));

        let mut prior = component();
        prior["id"] = json!("cmp-1");
        let mut planned = prior.clone();
        planned["status"] = json!("BOGUS");
        let err = assert_err!(provider.update(COMPONENT_TYPE_NAME, prior, planned).await);
        assert!(matches!(err, ProviderError::Validation(_)));

        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_integral_float_order_is_an_integer() {
        let (stub, provider) = configured();
        let mut doc = component();
        doc["order"] = json!(2.0);

        let created = assert_ok!(provider.create(COMPONENT_TYPE_NAME, doc.clone()).await);
        assert_eq!(created["order"], json!(2));
        assert_eq!(stub.component("page-1", "cmp-1").unwrap().order, Some(2));

        let plan = assert_ok!(
            provider
                .plan(COMPONENT_TYPE_NAME, Some(created.clone()), doc, Value::Null)
                .await
        );
        assert!(plan.changes.is_empty());
        assert_eq!(plan.planned_state["order"], json!(2));
        assert_eq!(plan.planned_state["last_updated"], created["last_updated"]);

        let mut doc = component();
        doc["order"] = json!(2.5);
        let err = assert_err!(provider.create(COMPONENT_TYPE_NAME, doc).await);
        assert!(matches!(err, ProviderError::Validation(_)));
        assert_eq!(stub.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_configuration_error() {
        let provider = InstatusProvider::new();
        let err = assert_err!(provider.create(TEMPLATE_TYPE_NAME, template()).await);
        assert!(err.is_configuration());

        let err = assert_err!(provider.read_data_source(USER_TYPE_NAME, json!({})).await);
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_configure_resolves_key() {
        let provider = InstatusProvider::new();
        let diagnostics = assert_ok!(provider.configure(json!({"api_key": "abc"})).await);
        assert!(diagnostics.is_empty());
        assert_ok!(provider.client().await);
    }

    #[test]
    fn test_configure_fails_on_unknown_or_missing_key() {
        with_var(API_KEY_ENV_VAR, Some("from-env"), || {
            let provider = InstatusProvider::new();
            let err = assert_err!(block_on(
                provider.configure(json!({"api_key": crate::config::UNKNOWN_VALUE}))
            ));
            assert!(err.message().starts_with("Unknown Instatus API Key"));
            assert!(block_on(provider.client()).is_err());
        });

        with_var_unset(API_KEY_ENV_VAR, || {
            let provider = InstatusProvider::new();
            let err = assert_err!(block_on(provider.configure(json!({}))));
            assert!(err.message().starts_with("Missing Instatus API Key"));
        });
    }

    #[test]
    fn test_configure_falls_back_to_env() {
        with_var(API_KEY_ENV_VAR, Some("from-env"), || {
            let provider = InstatusProvider::new();
            assert_ok!(block_on(provider.configure(json!({"api_key": null}))));
            assert!(block_on(provider.client()).is_ok());
        });
    }

    #[tokio::test]
    async fn test_template_lifecycle_through_host_calls() {
        let (stub, provider) = configured();

        let created = assert_ok!(provider.create(TEMPLATE_TYPE_NAME, template()).await);
        assert_eq!(created["id"], "tpl-1");
        assert!(created["last_updated"].as_str().is_some_and(|s| s.ends_with(" UTC")));

        let read = assert_ok!(provider.read(TEMPLATE_TYPE_NAME, created.clone()).await);
        assert_eq!(read, created);

        let mut proposed = template();
        proposed.as_object_mut().unwrap().remove("notify");
        let plan = assert_ok!(
            provider
                .plan(
                    TEMPLATE_TYPE_NAME,
                    Some(created.clone()),
                    proposed,
                    Value::Null
                )
                .await
        );
        assert_eq!(plan.planned_state["id"], "tpl-1");
        assert!(plan.planned_state.get("last_updated").is_none());
        assert_eq!(plan.changes, vec![AttributeChange::removed("notify", json!(true))]);
        assert!(!plan.requires_replace);

        let updated = assert_ok!(
            provider
                .update(TEMPLATE_TYPE_NAME, created.clone(), plan.planned_state)
                .await
        );
        assert_eq!(updated["id"], "tpl-1");
        assert!(updated.get("notify").is_none());
        assert_eq!(stub.template("page-1", "tpl-1").unwrap().notify, None);

        assert_ok!(provider.delete(TEMPLATE_TYPE_NAME, updated).await);
        assert!(matches!(
            stub.calls().last(),
            Some(RecordedCall::DeleteTemplate { id, .. }) if id == "tpl-1"
        ));
    }

    #[tokio::test]
    async fn test_plan_create_lists_added_attributes() {
        let (_, provider) = configured();
        let plan = assert_ok!(
            provider
                .plan(
                    COMPONENT_TYPE_NAME,
                    None,
                    json!({"page_id": "p", "name": "API", "status": "OPERATIONAL"}),
                    Value::Null
                )
                .await
        );
        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "page_id", "status"]);
    }

    #[tokio::test]
    async fn test_plan_delete_lists_removed_attributes() {
        let (_, provider) = configured();
        let prior = json!({
            "id": "cmp-1",
            "page_id": "p",
            "name": "API",
            "status": "OPERATIONAL"
        });
        let plan = assert_ok!(
            provider
                .plan(COMPONENT_TYPE_NAME, Some(prior), Value::Null, Value::Null)
                .await
        );
        assert!(plan.planned_state.is_null());
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
        assert_eq!(plan.changes.len(), 3);
    }

    #[tokio::test]
    async fn test_import_identifier_forms() {
        let (_, provider) = configured();

        let imported = assert_ok!(
            provider
                .import_resource(COMPONENT_TYPE_NAME, "page-1/cmp-7")
                .await
        );
        assert_eq!(imported[0].resource_type, COMPONENT_TYPE_NAME);
        assert_eq!(imported[0].state, json!({"page_id": "page-1", "id": "cmp-7"}));

        let imported = assert_ok!(provider.import_resource(TEMPLATE_TYPE_NAME, "tpl-3").await);
        assert_eq!(imported[0].state, json!({"id": "tpl-3"}));

        for bad in ["", "/x", "page/", "a/b/c"] {
            let err = assert_err!(provider.import_resource(TEMPLATE_TYPE_NAME, bad).await);
            assert!(matches!(err, ProviderError::InvalidRequest(_)), "{}", bad);
        }

        let err = assert_err!(provider.import_resource("instatus_page", "x").await);
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_read_user_data_source() {
        let user = RemoteUser {
            id: Some("u1".to_string()),
            email: Some("ops@example.com".to_string()),
            ..Default::default()
        };
        let stub = Arc::new(StubInstatus::new().with_user(user));
        let provider = InstatusProvider::with_client(stub.clone());

        let state = assert_ok!(provider.read_data_source(USER_TYPE_NAME, json!({})).await);
        assert_eq!(state["id"], "u1");
        assert_eq!(state["email"], "ops@example.com");
        assert!(state["avatar"].is_null());

        let err = assert_err!(provider.read_data_source("instatus_page", json!({})).await);
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_remote_error_passes_through() {
        let (stub, provider) = configured();
        let state = json!({
            "id": "gone",
            "page_id": "page-1",
            "name": "API",
            "status": "OPERATIONAL"
        });
        let err = assert_err!(provider.read(COMPONENT_TYPE_NAME, state).await);
        assert_eq!(err.message(), "Could not read Instatus component ID gone");
        assert!(matches!(
            err.remote_source(),
            Some(ApiError::NotFound { path }) if path == "/v1/page-1/components/gone"
        ));
        assert_eq!(stub.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_validate_provider_config() {
        let (_, provider) = configured();
        let diagnostics = assert_ok!(
            provider
                .validate_provider_config(json!({"api_key": 42}))
                .await
        );
        assert!(diagnostics.iter().any(|d| d.is_error()));
        let diagnostics = assert_ok!(provider.validate_provider_config(json!({})).await);
        assert!(diagnostics.is_empty());
    }
}
