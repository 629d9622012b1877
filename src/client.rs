//! Remote client boundary for the Instatus API.
//!
//! The reconcilers only see the [`InstatusApi`] trait. [`Client`] is the
//! production implementation over `reqwest`; tests substitute
//! [`crate::testing::StubInstatus`].
//!
//! Each call performs exactly one HTTP round trip. Nothing here retries.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default Instatus API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.instatus.com";

/// Errors returned by the remote client.
///
/// These are never classified further by the reconcilers; they are wrapped
/// with the attempted operation and handed to the host as-is.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the response could not be read.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered 404 for the given path.
    #[error("Not found: {path}")]
    NotFound {
        /// Request path that was not found.
        path: String,
    },

    /// The API answered with a non-success status.
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The response body was not the expected JSON shape.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The response lacked a field this layer depends on.
    #[error("Response is missing field '{0}'")]
    MissingField(&'static str),
}

/// Status of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComponentStatus {
    /// Operational.
    Operational,
    /// Under maintenance.
    UnderMaintenance,
    /// Degraded performance.
    DegradedPerformance,
    /// Partial outage.
    PartialOutage,
    /// Major outage.
    MajorOutage,
}

impl ComponentStatus {
    /// Every accepted value, in display order.
    pub const ALL: [Self; 5] = [
        Self::Operational,
        Self::UnderMaintenance,
        Self::DegradedPerformance,
        Self::PartialOutage,
        Self::MajorOutage,
    ];

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Operational => "OPERATIONAL",
            Self::UnderMaintenance => "UNDERMAINTENANCE",
            Self::DegradedPerformance => "DEGRADEDPERFORMANCE",
            Self::PartialOutage => "PARTIALOUTAGE",
            Self::MajorOutage => "MAJOROUTAGE",
        }
    }
}

/// Kind of template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TemplateType {
    /// Maintenance notice.
    Maintenance,
    /// Incident report.
    Incident,
}

impl TemplateType {
    /// Every accepted value, in display order.
    pub const ALL: [Self; 2] = [Self::Maintenance, Self::Incident];

    /// Wire name of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Maintenance => "MAINTENANCE",
            Self::Incident => "INCIDENT",
        }
    }
}

/// Status of an incident or maintenance template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TemplateStatus {
    /// Incident: investigating.
    Investigating,
    /// Incident: identified.
    Identified,
    /// Incident: monitoring.
    Monitoring,
    /// Incident: resolved.
    Resolved,
    /// Maintenance: not started yet.
    NotStartedYet,
    /// Maintenance: in progress.
    InProgress,
    /// Maintenance: completed.
    Completed,
}

impl TemplateStatus {
    /// Every accepted value, in display order.
    pub const ALL: [Self; 7] = [
        Self::Investigating,
        Self::Identified,
        Self::Monitoring,
        Self::Resolved,
        Self::NotStartedYet,
        Self::InProgress,
        Self::Completed,
    ];

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Investigating => "INVESTIGATING",
            Self::Identified => "IDENTIFIED",
            Self::Monitoring => "MONITORING",
            Self::Resolved => "RESOLVED",
            Self::NotStartedYet => "NOTSTARTEDYET",
            Self::InProgress => "INPROGRESS",
            Self::Completed => "COMPLETED",
        }
    }
}

/// A component status entry inside a template.
///
/// Requests identify the component with `id`; responses use `componentId`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTemplateComponent {
    /// Component identifier, as sent in requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Component identifier, as returned in responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    /// Status the template applies to the component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ComponentStatus>,
}

impl RemoteTemplateComponent {
    /// The component this entry refers to, whichever key the API used.
    pub fn component(&self) -> Option<&str> {
        self.component_id.as_deref().or(self.id.as_deref())
    }
}

/// A template as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTemplate {
    /// Remote-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name of the template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Incident or maintenance.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub template_type: Option<TemplateType>,
    /// Subdomain of the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    /// Message posted with the template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Status posted with the template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TemplateStatus>,
    /// Whether subscribers are notified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<bool>,
    /// Affected components; always sent in full.
    #[serde(default)]
    pub components: Vec<RemoteTemplateComponent>,
}

/// A status page component as exchanged with the API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteComponent {
    /// Remote-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ComponentStatus>,
    /// Position on the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Whether uptime is displayed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_uptime: Option<bool>,
    /// Whether the component is part of a group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouped: Option<bool>,
    /// Name of the group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// The profile of the user owning the API key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteUser {
    /// User identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// URL slug.
    #[serde(default)]
    pub slug: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Calls the reconcilers need from the Instatus API.
///
/// Implementations must be shareable across the provider's reconcilers; the
/// provider hands one instance to all of them.
#[async_trait]
pub trait InstatusApi: Send + Sync {
    /// Create a template on a page.
    async fn create_template(
        &self,
        page_id: &str,
        template: &RemoteTemplate,
    ) -> Result<RemoteTemplate, ApiError>;

    /// Fetch a template.
    async fn get_template(
        &self,
        page_id: &str,
        template_id: &str,
    ) -> Result<RemoteTemplate, ApiError>;

    /// Replace a template.
    async fn update_template(
        &self,
        page_id: &str,
        template_id: &str,
        template: &RemoteTemplate,
    ) -> Result<RemoteTemplate, ApiError>;

    /// Delete a template.
    async fn delete_template(&self, page_id: &str, template_id: &str) -> Result<(), ApiError>;

    /// Create a component on a page.
    async fn create_component(
        &self,
        page_id: &str,
        component: &RemoteComponent,
    ) -> Result<RemoteComponent, ApiError>;

    /// Fetch a component.
    async fn get_component(
        &self,
        page_id: &str,
        component_id: &str,
    ) -> Result<RemoteComponent, ApiError>;

    /// Replace a component.
    async fn update_component(
        &self,
        page_id: &str,
        component_id: &str,
        component: &RemoteComponent,
    ) -> Result<RemoteComponent, ApiError>;

    /// Delete a component.
    async fn delete_component(&self, page_id: &str, component_id: &str) -> Result<(), ApiError>;

    /// Fetch the user owning the API key.
    async fn get_user(&self) -> Result<RemoteUser, ApiError>;
}

/// HTTP implementation of [`InstatusApi`].
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl Client {
    /// Create a client for the public Instatus API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Point the client at a different API endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The endpoint this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    async fn execute(&self, request: RequestBuilder, path: &str) -> Result<Vec<u8>, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(path, status = status.as_u16(), "Instatus API responded");

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(path, status = status.as_u16(), "Instatus API request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<T, ApiError> {
        let body = self.execute(request, path).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

fn templates_path(page_id: &str) -> String {
    format!("/v1/{}/templates", page_id)
}

fn components_path(page_id: &str) -> String {
    format!("/v1/{}/components", page_id)
}

#[async_trait]
impl InstatusApi for Client {
    async fn create_template(
        &self,
        page_id: &str,
        template: &RemoteTemplate,
    ) -> Result<RemoteTemplate, ApiError> {
        let path = templates_path(page_id);
        let request = self.request(Method::POST, &path).json(template);
        self.send_json(request, &path).await
    }

    async fn get_template(
        &self,
        page_id: &str,
        template_id: &str,
    ) -> Result<RemoteTemplate, ApiError> {
        let path = format!("{}/{}", templates_path(page_id), template_id);
        let request = self.request(Method::GET, &path);
        self.send_json(request, &path).await
    }

    async fn update_template(
        &self,
        page_id: &str,
        template_id: &str,
        template: &RemoteTemplate,
    ) -> Result<RemoteTemplate, ApiError> {
        let path = format!("{}/{}", templates_path(page_id), template_id);
        let request = self.request(Method::PUT, &path).json(template);
        self.send_json(request, &path).await
    }

    async fn delete_template(&self, page_id: &str, template_id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}", templates_path(page_id), template_id);
        let request = self.request(Method::DELETE, &path);
        self.execute(request, &path).await.map(|_| ())
    }

    async fn create_component(
        &self,
        page_id: &str,
        component: &RemoteComponent,
    ) -> Result<RemoteComponent, ApiError> {
        let path = components_path(page_id);
        let request = self.request(Method::POST, &path).json(component);
        self.send_json(request, &path).await
    }

    async fn get_component(
        &self,
        page_id: &str,
        component_id: &str,
    ) -> Result<RemoteComponent, ApiError> {
        let path = format!("{}/{}", components_path(page_id), component_id);
        let request = self.request(Method::GET, &path);
        self.send_json(request, &path).await
    }

    async fn update_component(
        &self,
        page_id: &str,
        component_id: &str,
        component: &RemoteComponent,
    ) -> Result<RemoteComponent, ApiError> {
        let path = format!("{}/{}", components_path(page_id), component_id);
        let request = self.request(Method::PUT, &path).json(component);
        self.send_json(request, &path).await
    }

    async fn delete_component(&self, page_id: &str, component_id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}", components_path(page_id), component_id);
        let request = self.request(Method::DELETE, &path);
        self.execute(request, &path).await.map(|_| ())
    }

    async fn get_user(&self) -> Result<RemoteUser, ApiError> {
        let path = "/v1/user";
        let request = self.request(Method::GET, path);
        self.send_json(request, path).await
    }
}
