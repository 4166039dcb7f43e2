use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub use axum::http::StatusCode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A canned response returned for every `/api` request instead of the real
/// handler.
#[derive(Clone, Debug)]
pub struct Failure {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    pub failure: Option<Failure>,
    /// Token issued by the identity endpoint. `None` makes it refuse.
    pub token: Option<String>,
    /// Reject `/api` requests that do not carry `Bearer {token}`.
    pub require_auth: bool,
    /// Accept App Service style token requests carrying this value in
    /// `X-IDENTITY-HEADER`, in addition to IMDS `Metadata: true`.
    pub identity_secret: Option<String>,
}

#[derive(Clone, Default)]
pub struct MockState {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    config: MockConfig,
    products: RwLock<BTreeMap<i32, Product>>,
    next_id: AtomicI32,
    authorizations: RwLock<Vec<Option<String>>>,
    token_requests: RwLock<Vec<String>>,
    token_api_versions: RwLock<Vec<Option<String>>>,
}

impl MockState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                ..Inner::default()
            }),
        }
    }

    /// Insert products with server-assigned ids, returning the stored copies.
    pub async fn seed(&self, products: impl IntoIterator<Item = Product>) -> Vec<Product> {
        let mut store = self.inner.products.write().await;
        products
            .into_iter()
            .map(|mut product| {
                product.id = self.assign_id();
                store.insert(product.id, product.clone());
                product
            })
            .collect()
    }

    /// `Authorization` header of every `/api` request, in arrival order.
    pub async fn authorizations(&self) -> Vec<Option<String>> {
        self.inner.authorizations.read().await.clone()
    }

    /// `resource` query parameter of every token request, in arrival order.
    pub async fn token_requests(&self) -> Vec<String> {
        self.inner.token_requests.read().await.clone()
    }

    /// `api-version` query parameter of every token request, in arrival order.
    pub async fn token_api_versions(&self) -> Vec<Option<String>> {
        self.inner.token_api_versions.read().await.clone()
    }

    pub async fn products(&self) -> Vec<Product> {
        self.inner.products.read().await.values().cloned().collect()
    }

    fn assign_id(&self) -> i32 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

pub fn app() -> Router {
    router(MockState::default())
}

pub fn router(state: MockState) -> Router {
    Router::new()
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/{id}", get(get_product).put(update_product))
        .route_layer(middleware::from_fn_with_state(state.clone(), observe))
        .route("/metadata/identity/oauth2/token", get(issue_token))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}

async fn observe(State(state): State<MockState>, request: Request, next: Next) -> Response {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    tracing::debug!(
        method = %request.method(),
        uri = %request.uri(),
        authorized = authorization.is_some(),
        "api request"
    );
    state
        .inner
        .authorizations
        .write()
        .await
        .push(authorization.clone());

    let config = &state.inner.config;
    if config.require_auth {
        let expected = config.token.as_ref().map(|token| format!("Bearer {token}"));
        if expected.is_none() || authorization != expected {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    if let Some(failure) = &config.failure {
        return (failure.status, failure.body.clone()).into_response();
    }
    next.run(request).await
}

async fn list_products(State(state): State<MockState>) -> Json<Vec<Product>> {
    Json(state.products().await)
}

async fn create_product(
    State(state): State<MockState>,
    Json(mut input): Json<Product>,
) -> (StatusCode, Json<Product>) {
    input.id = state.assign_id();
    state
        .inner
        .products
        .write()
        .await
        .insert(input.id, input.clone());
    (StatusCode::CREATED, Json(input))
}

async fn get_product(
    State(state): State<MockState>,
    Path(id): Path<i32>,
) -> Result<Json<Product>, StatusCode> {
    let products = state.inner.products.read().await;
    products.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_product(
    State(state): State<MockState>,
    Path(id): Path<i32>,
    Json(mut input): Json<Product>,
) -> StatusCode {
    let mut products = state.inner.products.write().await;
    match products.get_mut(&id) {
        Some(stored) => {
            input.id = id;
            *stored = input;
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    resource: String,
    #[serde(rename = "api-version")]
    api_version: Option<String>,
}

async fn issue_token(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let imds = header("metadata") == Some("true");
    let app_service = state
        .inner
        .config
        .identity_secret
        .as_deref()
        .is_some_and(|secret| header("x-identity-header") == Some(secret));
    if !imds && !app_service {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_request",
                "error_description": "Required metadata header not specified",
            })),
        )
            .into_response();
    }
    state
        .inner
        .token_requests
        .write()
        .await
        .push(query.resource.clone());
    state
        .inner
        .token_api_versions
        .write()
        .await
        .push(query.api_version.clone());

    let Some(token) = state.inner.config.token.clone() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_request",
                "error_description": "Identity not found",
            })),
        )
            .into_response();
    };

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    tracing::debug!(resource = %query.resource, api_version = ?query.api_version, "token issued");
    Json(json!({
        "access_token": token,
        "expires_on": (now + 3600).to_string(),
        "resource": query.resource,
        "token_type": "Bearer",
    }))
    .into_response()
}
