//! Bearer-token acquisition through the host's managed identity.
//!
//! `TokenProvider` is the seam: `ProductService` only needs "a token for this
//! scope", and how that is resolved belongs to the deployment environment.
//! `ManagedIdentityCredential` covers the two ambient identity endpoints:
//!
//! - App Service style, advertised through `IDENTITY_ENDPOINT` and
//!   `IDENTITY_HEADER`;
//! - the instance metadata service (IMDS) at a fixed link-local address.
//!
//! Both speak the resource-based token protocol, so a scope such as
//! `api://products/.default` is sent as `resource=api://products`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const DEFAULT_SCOPE_SUFFIX: &str = "/.default";
const IDENTITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("resource uri must not be empty")]
    EmptyResource,

    #[error("invalid identity endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("identity endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("identity endpoint denied the request with status {status}: {body}")]
    Denied { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

/// An issued access token. `Debug` never prints the token itself.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// Expiry as Unix seconds, when the endpoint reports it.
    pub expires_on: Option<u64>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[redacted]")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, AuthError>;
}

/// `{resource}/.default`, without doubling an existing suffix.
pub fn default_scope(resource: &str) -> String {
    let resource = resource.trim_end_matches('/');
    if resource.ends_with(DEFAULT_SCOPE_SUFFIX) {
        resource.to_string()
    } else {
        format!("{resource}{DEFAULT_SCOPE_SUFFIX}")
    }
}

fn resource_from_scope(scope: &str) -> &str {
    scope.strip_suffix(DEFAULT_SCOPE_SUFFIX).unwrap_or(scope)
}

/// Acquire a token for `resource`, scoped to `{resource}/.default`.
pub async fn acquire_token(
    provider: &dyn TokenProvider,
    resource: &str,
) -> Result<AccessToken, AuthError> {
    let resource = resource.trim();
    if resource.is_empty() {
        return Err(AuthError::EmptyResource);
    }
    provider.get_token(&default_scope(resource)).await
}

#[derive(Clone)]
pub enum IdentityEndpoint {
    Imds(Url),
    AppService { endpoint: Url, secret: String },
}

impl IdentityEndpoint {
    /// App Service variables when both are present, IMDS otherwise.
    pub fn from_env() -> Result<Self, AuthError> {
        match (
            std::env::var("IDENTITY_ENDPOINT"),
            std::env::var("IDENTITY_HEADER"),
        ) {
            (Ok(endpoint), Ok(secret)) => Ok(IdentityEndpoint::AppService {
                endpoint: parse_endpoint(&endpoint)?,
                secret,
            }),
            _ => Self::imds(IMDS_ENDPOINT),
        }
    }

    pub fn imds(url: &str) -> Result<Self, AuthError> {
        Ok(IdentityEndpoint::Imds(parse_endpoint(url)?))
    }

    fn kind(&self) -> &'static str {
        match self {
            IdentityEndpoint::Imds(_) => "imds",
            IdentityEndpoint::AppService { .. } => "app_service",
        }
    }
}

impl fmt::Debug for IdentityEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityEndpoint::Imds(url) => f.debug_tuple("Imds").field(&url.as_str()).finish(),
            IdentityEndpoint::AppService { endpoint, .. } => f
                .debug_struct("AppService")
                .field("endpoint", &endpoint.as_str())
                .field("secret", &"[redacted]")
                .finish(),
        }
    }
}

fn parse_endpoint(url: &str) -> Result<Url, AuthError> {
    Url::parse(url).map_err(|e| AuthError::InvalidEndpoint(format!("{url}: {e}")))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: Option<ExpiresOn>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresOn {
    Seconds(u64),
    Text(String),
}

impl ExpiresOn {
    fn seconds(&self) -> Option<u64> {
        match self {
            ExpiresOn::Seconds(s) => Some(*s),
            ExpiresOn::Text(s) => s.parse().ok(),
        }
    }
}

/// Managed identity credential, system-assigned unless `client_id` selects a
/// user-assigned identity.
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    endpoint: IdentityEndpoint,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn new(endpoint: IdentityEndpoint, client_id: Option<String>) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(IDENTITY_TIMEOUT)
            .build()
            .map_err(|e| AuthError::InvalidEndpoint(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            endpoint,
            client_id,
        })
    }

    pub fn from_env(client_id: Option<String>) -> Result<Self, AuthError> {
        Self::new(IdentityEndpoint::from_env()?, client_id)
    }

    fn request(&self, resource: &str) -> reqwest::RequestBuilder {
        let (mut url, api_version) = match &self.endpoint {
            IdentityEndpoint::Imds(url) => (url.clone(), IMDS_API_VERSION),
            IdentityEndpoint::AppService { endpoint, .. } => {
                (endpoint.clone(), APP_SERVICE_API_VERSION)
            }
        };
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api-version", api_version);
            query.append_pair("resource", resource);
            if let Some(client_id) = &self.client_id {
                query.append_pair("client_id", client_id);
            }
        }

        let request = self.http.get(url);
        match &self.endpoint {
            IdentityEndpoint::Imds(_) => request.header("Metadata", "true"),
            IdentityEndpoint::AppService { secret, .. } => {
                request.header("X-IDENTITY-HEADER", secret.as_str())
            }
        }
    }
}

#[async_trait]
impl TokenProvider for ManagedIdentityCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, AuthError> {
        let resource = resource_from_scope(scope);
        tracing::debug!(endpoint = self.endpoint.kind(), %resource, "requesting managed identity token");

        let response = self
            .request(resource)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Denied {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        if parsed.access_token.is_empty() {
            return Err(AuthError::InvalidResponse("empty access_token".to_string()));
        }
        Ok(AccessToken {
            expires_on: parsed.expires_on.as_ref().and_then(ExpiresOn::seconds),
            token: parsed.access_token,
        })
    }
}
