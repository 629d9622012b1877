//! The `instatus_component` resource.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::{ApiError, ComponentStatus, InstatusApi, RemoteComponent};
use crate::reconciler::ManagedResource;
use crate::schema::{Attribute, Schema};
use crate::types::Field;

/// Resource type name of components.
pub const COMPONENT_TYPE_NAME: &str = "instatus_component";

/// State document of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentState {
    /// Remote-assigned identifier.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub id: Field<String>,
    /// Page owning the component.
    pub page_id: String,
    /// Display name.
    pub name: String,
    /// Current status.
    pub status: ComponentStatus,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub description: Field<String>,
    /// Position on the page.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub order: Field<i64>,
    /// Whether uptime is displayed.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub show_uptime: Field<bool>,
    /// Whether the component is part of a group.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub grouped: Field<bool>,
    /// Name of the group the component belongs to.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub group: Field<String>,
    /// When the component was last created or updated by this provider.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub last_updated: Field<String>,
}

/// Component resource definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentResource;

#[async_trait]
impl ManagedResource for ComponentResource {
    type State = ComponentState;
    type Remote = RemoteComponent;

    const TYPE_NAME: &'static str = COMPONENT_TYPE_NAME;
    const KIND: &'static str = "component";

    fn schema(&self) -> Schema {
        Schema::new()
            .with_description("Manages a status page component.")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("String Identifier of the component."),
            )
            .with_attribute(
                "page_id",
                Attribute::required_string()
                    .with_description("String Identifier of the page of the component."),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the component."),
            )
            .with_attribute(
                "status",
                Attribute::required_string()
                    .with_description("Status of the component.")
                    .with_one_of(ComponentStatus::ALL.map(ComponentStatus::as_str)),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("Description of the component."),
            )
            .with_attribute(
                "order",
                Attribute::optional_int64().with_description("Position of the component on the page."),
            )
            .with_attribute(
                "show_uptime",
                Attribute::optional_bool().with_description("Whether uptime is shown for the component."),
            )
            .with_attribute(
                "grouped",
                Attribute::optional_bool().with_description("Whether the component is in a group."),
            )
            .with_attribute(
                "group",
                Attribute::optional_string().with_description("Name of the group of the component."),
            )
            .with_attribute(
                "last_updated",
                Attribute::computed_string()
                    .with_description("Timestamp of the last update of the component."),
            )
    }

    fn page_id<'a>(&self, state: &'a ComponentState) -> &'a str {
        &state.page_id
    }

    fn remote_id<'a>(&self, state: &'a ComponentState) -> Option<&'a str> {
        state.id.as_option().map(String::as_str)
    }

    fn set_remote_id(&self, state: &mut ComponentState, id: String) {
        state.id = Field::Value(id);
    }

    fn set_last_updated(&self, state: &mut ComponentState, timestamp: String) {
        state.last_updated = Field::Value(timestamp);
    }

    fn to_remote(&self, state: &ComponentState) -> RemoteComponent {
        RemoteComponent {
            id: None,
            name: Some(state.name.clone()),
            description: state.description.cloned(),
            status: Some(state.status),
            order: state.order.cloned(),
            show_uptime: state.show_uptime.cloned(),
            grouped: state.grouped.cloned(),
            group: state.group.cloned(),
        }
    }

    fn remote_object_id<'a>(&self, remote: &'a RemoteComponent) -> Option<&'a str> {
        remote.id.as_deref()
    }

    fn refresh(
        &self,
        state: &mut ComponentState,
        remote: RemoteComponent,
    ) -> Result<(), ApiError> {
        state.name = remote.name.ok_or(ApiError::MissingField("name"))?;
        state.status = remote.status.ok_or(ApiError::MissingField("status"))?;
        state.description.overwrite(remote.description);
        state.order.overwrite(remote.order);
        state.show_uptime.overwrite(remote.show_uptime);
        state.grouped.overwrite(remote.grouped);
        state.group.overwrite(remote.group);
        Ok(())
    }

    async fn create_remote(
        &self,
        api: &dyn InstatusApi,
        page_id: &str,
        body: &RemoteComponent,
    ) -> Result<RemoteComponent, ApiError> {
        api.create_component(page_id, body).await
    }

    async fn get_remote(
        &self,
        api: &dyn InstatusApi,
        page_id: &str,
        id: &str,
    ) -> Result<RemoteComponent, ApiError> {
        api.get_component(page_id, id).await
    }

    async fn update_remote(
        &self,
        api: &dyn InstatusApi,
        page_id: &str,
        id: &str,
        body: &RemoteComponent,
    ) -> Result<RemoteComponent, ApiError> {
        api.update_component(page_id, id, body).await
    }

    async fn delete_remote(
        &self,
        api: &dyn InstatusApi,
        page_id: &str,
        id: &str,
    ) -> Result<(), ApiError> {
        api.delete_component(page_id, id).await
    }
}
