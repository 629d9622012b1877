//! Generic create/read/update/delete reconciliation.
//!
//! A [`ManagedResource`] describes how one resource type translates between
//! its state document and the remote representation, and which remote calls
//! manage it. [`Reconciler`] drives those calls for each lifecycle event.
//!
//! Every operation performs at most one remote call, fails fast, and never
//! returns partially updated state. The host serializes lifecycle events for
//! a given object; nothing here locks or retries.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::client::{ApiError, InstatusApi};
use crate::error::ProviderError;
use crate::schema::Schema;

/// A resource type managed through the Instatus API.
#[async_trait]
pub trait ManagedResource: Default + Send + Sync + 'static {
    /// State document stored by the host (desired plus computed fields).
    type State: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync;
    /// Request/response body exchanged with the API.
    type Remote: fmt::Debug + Send + Sync;

    /// Resource type name, e.g. `instatus_template`.
    const TYPE_NAME: &'static str;
    /// Lowercase noun used in error messages, e.g. `template`.
    const KIND: &'static str;

    /// Schema of the state document.
    fn schema(&self) -> Schema;

    /// Identifier of the page owning the object.
    fn page_id<'a>(&self, state: &'a Self::State) -> &'a str;

    /// Remote-assigned identifier, if the object has been created.
    fn remote_id<'a>(&self, state: &'a Self::State) -> Option<&'a str>;

    /// Record the remote-assigned identifier.
    fn set_remote_id(&self, state: &mut Self::State, id: String);

    /// Record when the object was last reconciled.
    fn set_last_updated(&self, state: &mut Self::State, timestamp: String);

    /// Build a full request body from a desired state.
    fn to_remote(&self, state: &Self::State) -> Self::Remote;

    /// Identifier carried by a remote response.
    fn remote_object_id<'a>(&self, remote: &'a Self::Remote) -> Option<&'a str>;

    /// Overwrite the mutable fields of `state` with what the API returned.
    ///
    /// A null optional field clears the attribute; a missing required field
    /// is an error. Attributes the API does not model (the identifier, the
    /// page, `last_updated`) are kept.
    fn refresh(&self, state: &mut Self::State, remote: Self::Remote) -> Result<(), ApiError>;

    /// Create the object remotely.
    async fn create_remote(
        &self,
        api: &dyn InstatusApi,
        page_id: &str,
        body: &Self::Remote,
    ) -> Result<Self::Remote, ApiError>;

    /// Fetch the object.
    async fn get_remote(
        &self,
        api: &dyn InstatusApi,
        page_id: &str,
        id: &str,
    ) -> Result<Self::Remote, ApiError>;

    /// Replace the object.
    async fn update_remote(
        &self,
        api: &dyn InstatusApi,
        page_id: &str,
        id: &str,
        body: &Self::Remote,
    ) -> Result<Self::Remote, ApiError>;

    /// Delete the object.
    async fn delete_remote(
        &self,
        api: &dyn InstatusApi,
        page_id: &str,
        id: &str,
    ) -> Result<(), ApiError>;
}

/// Drives the lifecycle of one resource type against an injected client.
pub struct Reconciler<R: ManagedResource> {
    resource: R,
    api: Arc<dyn InstatusApi>,
}

impl<R: ManagedResource> Reconciler<R> {
    /// Create a reconciler that issues calls through `api`.
    pub fn new(api: Arc<dyn InstatusApi>) -> Self {
        Self {
            resource: R::default(),
            api,
        }
    }

    /// The resource definition this reconciler drives.
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Create the object and return its first persisted state.
    pub async fn create(&self, desired: R::State) -> Result<R::State, ProviderError> {
        let page_id = self.resource.page_id(&desired);
        debug!(resource = R::TYPE_NAME, page_id, "Creating");

        let body = self.resource.to_remote(&desired);
        let operation = || format!("Could not create Instatus {}", R::KIND);
        let created = self
            .resource
            .create_remote(self.api.as_ref(), page_id, &body)
            .await
            .map_err(|e| ProviderError::remote(operation(), e))?;
        let id = self
            .resource
            .remote_object_id(&created)
            .map(str::to_owned)
            .ok_or_else(|| ProviderError::remote(operation(), ApiError::MissingField("id")))?;

        let mut state = desired;
        self.resource.set_remote_id(&mut state, id.clone());
        self.resource.set_last_updated(&mut state, timestamp_now()?);
        info!(resource = R::TYPE_NAME, id = %id, "Created");
        Ok(state)
    }

    /// Refresh a persisted state from the API.
    pub async fn read(&self, persisted: R::State) -> Result<R::State, ProviderError> {
        let id = self.require_id(&persisted, "read")?;
        let page_id = self.resource.page_id(&persisted);
        debug!(resource = R::TYPE_NAME, page_id, id = %id, "Reading");

        let operation = || format!("Could not read Instatus {} ID {}", R::KIND, id);
        let remote = self
            .resource
            .get_remote(self.api.as_ref(), page_id, &id)
            .await
            .map_err(|e| ProviderError::remote(operation(), e))?;

        let mut refreshed = persisted;
        self.resource
            .refresh(&mut refreshed, remote)
            .map_err(|e| ProviderError::remote(operation(), e))?;
        Ok(refreshed)
    }

    /// Replace the remote object with `desired`.
    ///
    /// The whole desired document is sent; attributes it omits are cleared
    /// remotely. The identifier is carried over from `prior` and the response
    /// body is not read back, so server-side changes surface on the next read.
    pub async fn update(
        &self,
        desired: R::State,
        prior: &R::State,
    ) -> Result<R::State, ProviderError> {
        let id = match self.resource.remote_id(prior) {
            Some(id) => id.to_owned(),
            None => self.require_id(&desired, "update")?,
        };
        let page_id = self.resource.page_id(&desired);
        debug!(resource = R::TYPE_NAME, page_id, id = %id, "Updating");

        let body = self.resource.to_remote(&desired);
        self.resource
            .update_remote(self.api.as_ref(), page_id, &id, &body)
            .await
            .map_err(|e| {
                ProviderError::remote(format!("Could not update Instatus {} ID {}", R::KIND, id), e)
            })?;

        let mut state = desired;
        self.resource.set_remote_id(&mut state, id.clone());
        self.resource.set_last_updated(&mut state, timestamp_now()?);
        info!(resource = R::TYPE_NAME, id = %id, "Updated");
        Ok(state)
    }

    /// Delete the remote object.
    pub async fn delete(&self, persisted: &R::State) -> Result<(), ProviderError> {
        let id = self.require_id(persisted, "delete")?;
        let page_id = self.resource.page_id(persisted);
        debug!(resource = R::TYPE_NAME, page_id, id = %id, "Deleting");

        self.resource
            .delete_remote(self.api.as_ref(), page_id, &id)
            .await
            .map_err(|e| {
                ProviderError::remote(format!("Could not delete Instatus {} ID {}", R::KIND, id), e)
            })?;

        info!(resource = R::TYPE_NAME, id = %id, "Deleted");
        Ok(())
    }

    fn require_id(&self, state: &R::State, action: &str) -> Result<String, ProviderError> {
        self.resource
            .remote_id(state)
            .map(str::to_owned)
            .ok_or_else(|| {
                ProviderError::InvalidRequest(format!(
                    "Cannot {} Instatus {} without an id",
                    action,
                    R::KIND
                ))
            })
    }
}

/// Current time in the `last_updated` format, e.g. `Monday, 02-Jan-06 15:04:05 UTC`.
pub fn timestamp_now() -> Result<String, ProviderError> {
    format_timestamp(OffsetDateTime::now_utc())
}

fn format_timestamp(at: OffsetDateTime) -> Result<String, ProviderError> {
    let format = format_description!(
        "[weekday], [day]-[month repr:short]-[year repr:last_two] [hour]:[minute]:[second] UTC"
    );
    at.format(format)
        .map_err(|e| ProviderError::Sdk(format!("Could not format timestamp: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_timestamp_format() {
        let at = datetime!(2006-01-02 15:04:05 UTC);
        assert_eq!(
            format_timestamp(at).unwrap(),
            "Monday, 02-Jan-06 15:04:05 UTC"
        );
    }

    #[test]
    fn test_timestamp_now_is_formatted() {
        let now = timestamp_now().unwrap();
        assert!(now.ends_with(" UTC"));
        assert!(now.contains(", "));
    }
}
