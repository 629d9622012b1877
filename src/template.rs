//! The `instatus_template` resource.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::{
    ApiError, ComponentStatus, InstatusApi, RemoteTemplate, RemoteTemplateComponent,
    TemplateStatus, TemplateType,
};
use crate::reconciler::ManagedResource;
use crate::schema::{Attribute, Block, ListBlock, Schema};
use crate::types::Field;

/// Resource type name of templates.
pub const TEMPLATE_TYPE_NAME: &str = "instatus_template";

/// State document of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateState {
    /// Remote-assigned identifier.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub id: Field<String>,
    /// Page owning the template.
    pub page_id: String,
    /// Subdomain of the page.
    pub subdomain: String,
    /// Name of the template.
    pub name: String,
    /// Incident or maintenance.
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    /// Message posted with the template.
    pub message: String,
    /// Status posted with the template.
    pub status: TemplateStatus,
    /// Whether subscribers are notified.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub notify: Field<bool>,
    /// Affected components, in order. Duplicates are kept.
    pub components: Vec<TemplateComponentState>,
    /// When the template was last created or updated by this provider.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub last_updated: Field<String>,
}

/// A component affected by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateComponentState {
    /// Identifier of the component.
    pub id: String,
    /// Status applied to the component.
    pub status: ComponentStatus,
}

/// Template resource definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResource;

#[async_trait]
impl ManagedResource for TemplateResource {
    type State = TemplateState;
    type Remote = RemoteTemplate;

    const TYPE_NAME: &'static str = TEMPLATE_TYPE_NAME;
    const KIND: &'static str = "template";

    fn schema(&self) -> Schema {
        let component = Block::new()
            .with_attribute(
                "id",
                Attribute::required_string().with_description("String Identifier of the component."),
            )
            .with_attribute(
                "status",
                Attribute::required_string()
                    .with_description("Status of the component.")
                    .with_one_of(ComponentStatus::ALL.map(ComponentStatus::as_str)),
            );

        Schema::new()
            .with_description("Manages a template.")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("String Identifier of the template."),
            )
            .with_attribute(
                "page_id",
                Attribute::required_string()
                    .with_description("String Identifier of the page of the template."),
            )
            .with_attribute(
                "subdomain",
                Attribute::required_string().with_description("Subdomain of the page of the template."),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the template."),
            )
            .with_attribute(
                "type",
                Attribute::required_string()
                    .with_description("Type of the template.")
                    .with_one_of(TemplateType::ALL.map(TemplateType::as_str)),
            )
            .with_attribute(
                "message",
                Attribute::required_string().with_description("Message of the template."),
            )
            .with_attribute(
                "status",
                Attribute::required_string()
                    .with_description("Status of the template.")
                    .with_one_of(TemplateStatus::ALL.map(TemplateStatus::as_str)),
            )
            .with_attribute(
                "notify",
                Attribute::optional_bool()
                    .with_description("Whether notify is enabled for the template."),
            )
            .with_attribute(
                "last_updated",
                Attribute::computed_string()
                    .with_description("Timestamp of the last update of the template."),
            )
            .with_block(
                "components",
                ListBlock::new(
                    component.with_description("List of components in the template with their status."),
                )
                .required(),
            )
    }

    fn page_id<'a>(&self, state: &'a TemplateState) -> &'a str {
        &state.page_id
    }

    fn remote_id<'a>(&self, state: &'a TemplateState) -> Option<&'a str> {
        state.id.as_option().map(String::as_str)
    }

    fn set_remote_id(&self, state: &mut TemplateState, id: String) {
        state.id = Field::Value(id);
    }

    fn set_last_updated(&self, state: &mut TemplateState, timestamp: String) {
        state.last_updated = Field::Value(timestamp);
    }

    fn to_remote(&self, state: &TemplateState) -> RemoteTemplate {
        RemoteTemplate {
            id: None,
            name: Some(state.name.clone()),
            template_type: Some(state.template_type),
            subdomain: Some(state.subdomain.clone()),
            message: Some(state.message.clone()),
            status: Some(state.status),
            notify: state.notify.cloned(),
            components: state
                .components
                .iter()
                .map(|c| RemoteTemplateComponent {
                    id: Some(c.id.clone()),
                    component_id: None,
                    status: Some(c.status),
                })
                .collect(),
        }
    }

    fn remote_object_id<'a>(&self, remote: &'a RemoteTemplate) -> Option<&'a str> {
        remote.id.as_deref()
    }

    fn refresh(
        &self,
        state: &mut TemplateState,
        remote: RemoteTemplate,
    ) -> Result<(), ApiError> {
        state.name = remote.name.ok_or(ApiError::MissingField("name"))?;
        state.template_type = remote.template_type.ok_or(ApiError::MissingField("type"))?;
        state.message = remote.message.ok_or(ApiError::MissingField("message"))?;
        state.status = remote.status.ok_or(ApiError::MissingField("status"))?;
        state.notify.overwrite(remote.notify);
        state.components = remote
            .components
            .into_iter()
            .filter_map(|c| match (c.component(), c.status) {
                (Some(id), Some(status)) => Some(TemplateComponentState {
                    id: id.to_owned(),
                    status,
                }),
                _ => {
                    warn!(?c, "Skipping template component without id or status");
                    None
                },
            })
            .collect();
        Ok(())
    }

    async fn create_remote(
        &self,
        api: &dyn InstatusApi,
        page_id: &str,
        body: &RemoteTemplate,
    ) -> Result<RemoteTemplate, ApiError> {
        api.create_template(page_id, body).await
    }

    async fn get_remote(
        &self,
        api: &dyn InstatusApi,
        page_id: &str,
        id: &str,
    ) -> Result<RemoteTemplate, ApiError> {
        api.get_template(page_id, id).await
    }

    async fn update_remote(
        &self,
        api: &dyn InstatusApi,
        page_id: &str,
        id: &str,
        body: &RemoteTemplate,
    ) -> Result<RemoteTemplate, ApiError> {
        api.update_template(page_id, id, body).await
    }

    async fn delete_remote(
        &self,
        api: &dyn InstatusApi,
        page_id: &str,
        id: &str,
    ) -> Result<(), ApiError> {
        api.delete_template(page_id, id).await
    }
}
