use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, router, Failure, MockConfig, MockState, Product};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn token_request(resource: &str) -> Request<String> {
    Request::builder()
        .uri(format!(
            "/metadata/identity/oauth2/token?api-version=2018-02-01&resource={resource}"
        ))
        .header("Metadata", "true")
        .body(String::new())
        .unwrap()
}

// --- list ---

#[tokio::test]
async fn list_products_empty() {
    let resp = app().oneshot(get("/api/products")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let products: Vec<Product> = body_json(resp).await;
    assert!(products.is_empty());
}

// --- create ---

#[tokio::test]
async fn create_product_returns_201_with_assigned_id() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/api/products",
            r#"{"id":99,"name":"Widget","price":4.25}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let product: Product = body_json(resp).await;
    assert_eq!(product.id, 1);
    assert_eq!(product.name, "Widget");
    assert_eq!(product.price, 4.25);
}

#[tokio::test]
async fn create_product_malformed_json_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/api/products", r#"{"not_name":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- get ---

#[tokio::test]
async fn get_product_not_found() {
    let resp = app().oneshot(get("/api/products/42")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_product_bad_id_returns_400() {
    let resp = app().oneshot(get("/api/products/not-a-number")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- update ---

#[tokio::test]
async fn update_product_not_found() {
    let resp = app()
        .oneshot(json_request("PUT", "/api/products/42", r#"{"name":"Nope"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- fault injection ---

#[tokio::test]
async fn failure_overrides_api_routes() {
    let state = MockState::new(MockConfig {
        failure: Some(Failure {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "internal error".to_string(),
        }),
        ..MockConfig::default()
    });
    let resp = router(state).oneshot(get("/api/products")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_bytes(resp).await.as_ref(), b"internal error");
}

#[tokio::test]
async fn require_auth_rejects_missing_bearer() {
    let state = MockState::new(MockConfig {
        token: Some("secret".to_string()),
        require_auth: true,
        ..MockConfig::default()
    });
    let app = router(state.clone());

    let resp = app.clone().oneshot(get("/api/products")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/products")
                .header(http::header::AUTHORIZATION, "Bearer secret")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        state.authorizations().await,
        vec![None, Some("Bearer secret".to_string())]
    );
}

// --- identity endpoint ---

#[tokio::test]
async fn token_endpoint_issues_configured_token() {
    let state = MockState::new(MockConfig {
        token: Some("abc".to_string()),
        ..MockConfig::default()
    });
    let resp = router(state.clone())
        .oneshot(token_request("api://products"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["access_token"], "abc");
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["expires_on"].as_str().unwrap().parse::<u64>().is_ok());
    assert_eq!(state.token_requests().await, vec!["api://products".to_string()]);
}

#[tokio::test]
async fn token_endpoint_refuses_without_identity() {
    let resp = app().oneshot(token_request("api://products")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn token_endpoint_requires_metadata_header() {
    let state = MockState::new(MockConfig {
        token: Some("abc".to_string()),
        ..MockConfig::default()
    });
    let resp = router(state.clone())
        .oneshot(get(
            "/metadata/identity/oauth2/token?api-version=2018-02-01&resource=api://products",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(state.token_requests().await.is_empty());
}

#[tokio::test]
async fn token_endpoint_accepts_identity_header() {
    let state = MockState::new(MockConfig {
        token: Some("abc".to_string()),
        identity_secret: Some("s3cret".to_string()),
        ..MockConfig::default()
    });
    let request = |secret: &str| {
        Request::builder()
            .uri("/metadata/identity/oauth2/token?api-version=2019-08-01&resource=api://products")
            .header("X-IDENTITY-HEADER", secret)
            .body(String::new())
            .unwrap()
    };

    let resp = router(state.clone()).oneshot(request("wrong")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = router(state.clone()).oneshot(request("s3cret")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["access_token"], "abc");
    assert_eq!(
        state.token_api_versions().await,
        vec![Some("2019-08-01".to_string())]
    );
}

// --- full CRUD lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/api/products",
            r#"{"name":"Lamp","price":20.0,"colour":"red"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Product = body_json(resp).await;
    assert_eq!(created.name, "Lamp");
    assert_eq!(created.extra["colour"], "red");
    let id = created.id;

    // list
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/api/products"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let products: Vec<Product> = body_json(resp).await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, id);

    // update replaces the stored product
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "PUT",
            &format!("/api/products/{id}"),
            r#"{"name":"Desk lamp","price":25.0}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // get reflects the update
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get(&format!("/api/products/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Product = body_json(resp).await;
    assert_eq!(fetched.id, id);
    assert_eq!(fetched.name, "Desk lamp");
    assert_eq!(fetched.price, 25.0);
    assert!(fetched.extra.get("colour").is_none());
}
