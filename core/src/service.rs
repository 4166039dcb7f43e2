//! Async product API service.
//!
//! # Design
//! Construction is two-phase: `ClientConfig` is validated first, then
//! `connect` resolves a token (if an auth resource is configured) and freezes
//! everything into an immutable `reqwest::Client` with a default
//! `Authorization` header. Token failures are logged and the service carries
//! on unauthenticated.
//!
//! Every operation runs through `dispatch`, which turns transport, status and
//! parse failures into a failed `OperationResult`. Callers never see an `Err`
//! or a panic from an operation.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use url::Url;

use crate::auth::{
    acquire_token, AccessToken, AuthError, IdentityEndpoint, ManagedIdentityCredential,
    TokenProvider,
};
use crate::client::ProductClient;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::{HttpRequest, HttpResponse};
use crate::result::OperationResult;
use crate::types::Product;

#[derive(Debug, Clone)]
pub struct ProductService {
    client: ProductClient,
    http: reqwest::Client,
    authenticated: bool,
}

impl ProductService {
    /// Build the service using the managed identity of the host.
    pub async fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        match managed_identity(config) {
            Ok(credential) => Self::connect(config, &credential).await,
            Err(err) => Self::connect(config, &Unavailable(err.to_string())).await,
        }
    }

    /// Build the service, asking `tokens` for a bearer token when
    /// `api_auth_uri` is configured.
    ///
    /// Fails only on missing or malformed `api_uri`, a zero timeout, or if
    /// the HTTP client cannot be built. Authentication problems never fail construction.
    pub async fn connect(
        config: &ClientConfig,
        tokens: &dyn TokenProvider,
    ) -> Result<Self, ClientError> {
        let base_url = config.base_url()?;
        let timeout = config.request_timeout()?;
        let auth_resource = config.auth_resource();
        tracing::info!(
            api_uri = %base_url,
            api_auth_uri = auth_resource.unwrap_or_default(),
            "configuring product api client"
        );

        let token = match auth_resource {
            Some(resource) => match acquire_token(tokens, resource).await {
                Ok(token) => {
                    tracing::info!(expires_on = ?token.expires_on, "obtained access token");
                    Some(token)
                }
                Err(err) => {
                    let err = ClientError::from(err);
                    tracing::error!(error = %err, "failed to obtain access token, proceeding without authentication");
                    None
                }
            },
            None => {
                tracing::info!("no api auth uri configured, proceeding without authentication");
                None
            }
        };

        Self::build(&base_url, token.as_ref(), timeout)
    }

    fn build(
        base_url: &Url,
        token: Option<&AccessToken>,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            match HeaderValue::from_str(&format!("Bearer {}", token.token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                    tracing::info!("added bearer token to http client headers");
                }
                Err(_) => tracing::warn!(
                    "access token is not a valid header value, proceeding without authentication"
                ),
            }
        }
        let authenticated = headers.contains_key(AUTHORIZATION);

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            client: ProductClient::new(base_url.as_str()),
            http,
            authenticated,
        })
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Whether requests carry a bearer token.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub async fn list_products(&self) -> OperationResult<Vec<Product>> {
        tracing::info!("attempting to get products from api");
        let result = self
            .dispatch("list_products", Ok(self.client.build_list_products()), |response| {
                self.client.parse_list_products(response)
            })
            .await;
        if let Some(products) = &result.payload {
            tracing::info!(count = products.len(), "retrieved products");
        }
        result
    }

    pub async fn get_product(&self, id: i32) -> OperationResult<Product> {
        self.dispatch("get_product", Ok(self.client.build_get_product(id)), |response| {
            self.client.parse_get_product(response)
        })
        .await
    }

    /// The returned product carries the id assigned by the server.
    pub async fn create_product(&self, product: &Product) -> OperationResult<Product> {
        self.dispatch("create_product", self.client.build_create_product(product), |response| {
            self.client.parse_create_product(response)
        })
        .await
    }

    /// On success the payload is `product` itself; nothing is re-fetched.
    pub async fn update_product(&self, product: &Product) -> OperationResult<Product> {
        self.dispatch("update_product", self.client.build_update_product(product), |response| {
            self.client.parse_update_product(response, product)
        })
        .await
    }

    async fn dispatch<T>(
        &self,
        operation: &'static str,
        request: Result<HttpRequest, ClientError>,
        parse: impl FnOnce(HttpResponse) -> Result<T, ClientError>,
    ) -> OperationResult<T> {
        let outcome = match request {
            Ok(request) => self.execute(request).await.and_then(parse),
            Err(err) => Err(err),
        };
        if let Err(err) = &outcome {
            tracing::error!(operation, error = %err, "product api call failed");
        }
        outcome.into()
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let HttpRequest {
            method,
            path,
            headers,
            body,
        } = request;
        tracing::debug!(%method, %path, "sending request");

        let mut builder = self.http.request(method.into(), &path);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "received response");

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

fn managed_identity(config: &ClientConfig) -> Result<ManagedIdentityCredential, AuthError> {
    let client_id = config.managed_identity_client_id.clone();
    match config.identity_endpoint.as_deref() {
        Some(url) => ManagedIdentityCredential::new(IdentityEndpoint::imds(url)?, client_id),
        None => ManagedIdentityCredential::from_env(client_id),
    }
}

/// Stands in for a credential that could not be set up, so the failure is
/// reported through the normal token path.
struct Unavailable(String);

#[async_trait::async_trait]
impl TokenProvider for Unavailable {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken, AuthError> {
        Err(AuthError::InvalidEndpoint(self.0.clone()))
    }
}
