//! Client configuration.
//!
//! # Design
//! Values come from an optional TOML file (`PRODUCTS_CONFIG`, default
//! `products.toml`) overlaid by `PRODUCTS_*` environment variables, so the
//! environment always wins. Only `api_uri` is required; a blank
//! `api_auth_uri` means "no authentication". Without `request_timeout_secs`
//! the HTTP client keeps its own default.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ClientError;

const DEFAULT_CONFIG_FILE: &str = "products.toml";

/// Settings for `ProductService`, read from an optional TOML file overlaid by
/// `PRODUCTS_*` environment variables (`PRODUCTS_API_URI`,
/// `PRODUCTS_API_AUTH_URI`, ...).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base address of the product API. Required.
    pub api_uri: Option<String>,
    /// Resource URI of the API's app registration. Enables authentication.
    pub api_auth_uri: Option<String>,
    /// Selects a user-assigned managed identity.
    pub managed_identity_client_id: Option<String>,
    /// Overrides the IMDS token endpoint.
    pub identity_endpoint: Option<String>,
    /// Per-request timeout. Must be positive when set.
    pub request_timeout_secs: Option<u64>,
}

impl ClientConfig {
    pub fn new(api_uri: impl Into<String>) -> Self {
        Self {
            api_uri: Some(api_uri.into()),
            ..Self::default()
        }
    }

    pub fn with_auth_uri(mut self, api_auth_uri: impl Into<String>) -> Self {
        self.api_auth_uri = Some(api_auth_uri.into());
        self
    }

    pub fn with_identity_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.identity_endpoint = Some(endpoint.into());
        self
    }

    /// Load configuration from disk and environment.
    pub fn load() -> Result<Self, ClientError> {
        let config_path =
            env::var("PRODUCTS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = config::Config::builder();
        if Path::new(&config_path).exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(&config_path)));
        }
        builder = builder.add_source(config::Environment::with_prefix("PRODUCTS").try_parsing(true));

        let settings = builder
            .build()
            .map_err(|e| ClientError::InvalidConfiguration(e.to_string()))?;
        Self::from_settings(settings)
    }

    pub fn from_settings(settings: config::Config) -> Result<Self, ClientError> {
        let config: Self = settings
            .try_deserialize()
            .map_err(|e| ClientError::InvalidConfiguration(e.to_string()))?;
        config.request_timeout()?;
        Ok(config)
    }

    /// The validated base address.
    pub fn base_url(&self) -> Result<Url, ClientError> {
        let raw = non_blank(self.api_uri.as_deref()).ok_or(ClientError::ConfigurationMissing("api_uri"))?;
        let url = Url::parse(raw)
            .map_err(|e| ClientError::InvalidConfiguration(format!("api_uri `{raw}`: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidConfiguration(format!(
                "api_uri `{raw}` must use http or https"
            )));
        }
        Ok(url)
    }

    /// The auth resource URI, with blank values treated as absent.
    pub fn auth_resource(&self) -> Option<&str> {
        non_blank(self.api_auth_uri.as_deref())
    }

    /// `None` leaves the transport default in place.
    pub fn request_timeout(&self) -> Result<Option<Duration>, ClientError> {
        match self.request_timeout_secs {
            Some(0) => Err(ClientError::InvalidConfiguration(
                "request_timeout_secs must be greater than zero".to_string(),
            )),
            secs => Ok(secs.map(Duration::from_secs)),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
