//! Stateless request builder and response parser for the product API.
//!
//! # Design
//! `ProductClient` holds only a `base_url`. Each operation is split into a
//! `build_*` method producing an `HttpRequest` and a `parse_*` method
//! consuming an `HttpResponse`. Any 2xx status counts as success; anything
//! else becomes `ClientError::Api` carrying the reason phrase and body.

use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::Product;

const PRODUCTS_PATH: &str = "/api/products";

#[derive(Debug, Clone)]
pub struct ProductClient {
    base_url: String,
}

impl ProductClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_list_products(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}{PRODUCTS_PATH}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_get_product(&self, id: i32) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}{PRODUCTS_PATH}/{id}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_create_product(&self, product: &Product) -> Result<HttpRequest, ClientError> {
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}{PRODUCTS_PATH}", self.base_url),
            headers: json_headers(),
            body: Some(to_body(product)?),
        })
    }

    pub fn build_update_product(&self, product: &Product) -> Result<HttpRequest, ClientError> {
        Ok(HttpRequest {
            method: HttpMethod::Put,
            path: format!("{}{PRODUCTS_PATH}/{}", self.base_url, product.id),
            headers: json_headers(),
            body: Some(to_body(product)?),
        })
    }

    /// A `null` or empty body yields an empty list.
    pub fn parse_list_products(&self, response: HttpResponse) -> Result<Vec<Product>, ClientError> {
        check_status(&response)?;
        if response.body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let products: Option<Vec<Product>> = from_body(&response.body)?;
        Ok(products.unwrap_or_default())
    }

    pub fn parse_get_product(&self, response: HttpResponse) -> Result<Product, ClientError> {
        check_status(&response)?;
        from_body(&response.body)
    }

    pub fn parse_create_product(&self, response: HttpResponse) -> Result<Product, ClientError> {
        check_status(&response)?;
        from_body(&response.body)
    }

    /// The body is ignored; on success the product that was sent is returned.
    pub fn parse_update_product(
        &self,
        response: HttpResponse,
        sent: &Product,
    ) -> Result<Product, ClientError> {
        check_status(&response)?;
        Ok(sent.clone())
    }
}

fn json_headers() -> Vec<(String, String)> {
    vec![("content-type".to_string(), "application/json".to_string())]
}

fn to_body(product: &Product) -> Result<String, ClientError> {
    serde_json::to_string(product).map_err(|e| ClientError::Serialization(e.to_string()))
}

fn from_body<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|e| ClientError::Deserialization(e.to_string()))
}

/// Map non-2xx status codes to `ClientError::Api`.
fn check_status(response: &HttpResponse) -> Result<(), ClientError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ClientError::Api {
        status: response.status,
        reason: response.reason.clone(),
        body: response.body.clone(),
    })
}
