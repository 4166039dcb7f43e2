//! State behind the products list view.

use crate::result::OperationResult;
use crate::service::ProductService;
use crate::types::Product;

/// What the products view shows: the products, or an explanation of why
/// there are none. Rendering is left to the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductsPage {
    pub products: Vec<Product>,
    pub error_message: Option<String>,
}

impl ProductsPage {
    pub async fn load(service: &ProductService) -> Self {
        Self::from_result(service.list_products().await)
    }

    pub fn from_result(result: OperationResult<Vec<Product>>) -> Self {
        if result.success {
            let products = result.payload.unwrap_or_default();
            tracing::info!(count = products.len(), "successfully retrieved products");
            return Self {
                products,
                error_message: None,
            };
        }

        let message = format!(
            "Failed to retrieve products: {}",
            result.error_message.unwrap_or_default()
        );
        tracing::error!("{message}");
        Self {
            products: Vec::new(),
            error_message: Some(message),
        }
    }
}
