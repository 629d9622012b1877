//! Provider configuration and API key resolution.
//!
//! The API key comes from the provider's `api_key` attribute, falling back to
//! the `INSTATUS_APIKEY` environment variable. Resolution has exactly three
//! outcomes: a key, an unknown-value error, or a missing-key error.

use serde_json::Value;
use tracing::debug;

use crate::error::ProviderError;

/// Environment variable consulted when `api_key` is not configured.
pub const API_KEY_ENV_VAR: &str = "INSTATUS_APIKEY";

/// Placeholder a host writes for values not yet known at plan time.
pub const UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// A provider configuration attribute as handed over by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfiguredValue {
    /// Not set (missing or null).
    Unset,
    /// Set, but its value is not yet determined.
    Unknown,
    /// Set to a concrete value.
    Known(String),
}

impl ConfiguredValue {
    /// Interpret a JSON attribute value.
    pub fn from_json(value: Option<&Value>) -> Result<Self, ProviderError> {
        match value {
            None | Some(Value::Null) => Ok(Self::Unset),
            Some(Value::String(s)) if s == UNKNOWN_VALUE => Ok(Self::Unknown),
            Some(Value::String(s)) => Ok(Self::Known(s.clone())),
            Some(other) => Err(ProviderError::Validation(format!(
                "api_key must be a string, got {}",
                other
            ))),
        }
    }
}

/// Provider-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// The configured API key.
    pub api_key: ConfiguredValue,
}

impl ProviderConfig {
    /// Extract the provider configuration from the host's JSON document.
    pub fn from_json(config: &Value) -> Result<Self, ProviderError> {
        Ok(Self {
            api_key: ConfiguredValue::from_json(config.get("api_key"))?,
        })
    }
}

/// Resolve the API key from configuration, falling back to `env`.
///
/// An unknown configured value fails regardless of `env`: the key configures
/// the client used by every later call and cannot be deferred. A configured
/// empty string counts as unset.
pub fn resolve_api_key(
    configured: ConfiguredValue,
    env: Option<String>,
) -> Result<String, ProviderError> {
    let api_key = match configured {
        ConfiguredValue::Unknown => {
            return Err(ProviderError::Configuration(format!(
                "Unknown Instatus API Key: the provider cannot create the Instatus API client \
                 as there is an unknown configuration value for the Instatus API Key. Either \
                 apply the source of the value first, set the value statically in the \
                 configuration, or use the {} environment variable.",
                API_KEY_ENV_VAR
            )));
        },
        ConfiguredValue::Known(value) if !value.is_empty() => {
            debug!("Using API key from provider configuration");
            value
        },
        ConfiguredValue::Known(_) | ConfiguredValue::Unset => {
            debug!(env = API_KEY_ENV_VAR, "Falling back to environment for API key");
            env.unwrap_or_default()
        },
    };

    if api_key.is_empty() {
        return Err(ProviderError::Configuration(format!(
            "Missing Instatus API Key: the provider cannot create the Instatus API client as \
             there is a missing or empty value for the Instatus API Key. Set the api_key value \
             in the configuration or use the {} environment variable. If either is already \
             set, ensure the value is not empty.",
            API_KEY_ENV_VAR
        )));
    }

    Ok(api_key)
}

/// Resolve the API key, reading the fallback from [`API_KEY_ENV_VAR`].
pub fn resolve_api_key_from_env(configured: ConfiguredValue) -> Result<String, ProviderError> {
    resolve_api_key(configured, std::env::var(API_KEY_ENV_VAR).ok())
}
