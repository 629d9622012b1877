//! The `instatus_user` data source.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{InstatusApi, RemoteUser};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Data source type name of the user profile.
pub const USER_TYPE_NAME: &str = "instatus_user";

/// Projection of the user owning the API key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserState {
    /// Unique identifier of the user.
    pub id: Option<String>,
    /// Name of the user.
    pub name: Option<String>,
    /// Email of the user.
    pub email: Option<String>,
    /// Slug of the user.
    pub slug: Option<String>,
    /// Avatar URL of the user.
    pub avatar: Option<String>,
}

impl From<RemoteUser> for UserState {
    fn from(user: RemoteUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            slug: user.slug,
            avatar: user.avatar,
        }
    }
}

/// Read-only view of the user profile.
pub struct UserProjector {
    api: Arc<dyn InstatusApi>,
}

impl UserProjector {
    /// Create a projector that reads through `api`.
    pub fn new(api: Arc<dyn InstatusApi>) -> Self {
        Self { api }
    }

    /// Schema of the projection; every attribute is computed.
    pub fn schema() -> Schema {
        Schema::new()
            .with_description("Retrieves user profile.")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Unique identifier of the user."),
            )
            .with_attribute(
                "name",
                Attribute::computed_string().with_description("Name of the user."),
            )
            .with_attribute(
                "email",
                Attribute::computed_string().with_description("Email of the user."),
            )
            .with_attribute(
                "slug",
                Attribute::computed_string().with_description("Slug of the user."),
            )
            .with_attribute(
                "avatar",
                Attribute::computed_string().with_description("Avatar url of the user."),
            )
    }

    /// Fetch the user and project it verbatim.
    pub async fn fetch(&self) -> Result<UserState, ProviderError> {
        debug!("Reading Instatus user");
        let user = self
            .api
            .get_user()
            .await
            .map_err(|e| ProviderError::remote("Unable to read Instatus user", e))?;
        Ok(user.into())
    }
}
