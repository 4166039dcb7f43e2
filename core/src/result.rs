//! Uniform outcome type returned by every `ProductService` operation.

use serde::Serialize;

use crate::error::ClientError;

/// Outcome of one call against the product API.
///
/// `payload` is only ever set when `success` is true and `error_message` only
/// when it is false. Construct through [`OperationResult::ok`] and
/// [`OperationResult::failed`] to keep that invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult<T> {
    pub success: bool,
    pub error_message: Option<String>,
    pub payload: Option<T>,
}

impl<T> OperationResult<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            error_message: None,
            payload: Some(payload),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            payload: None,
        }
    }
}

impl<T> From<Result<T, ClientError>> for OperationResult<T> {
    fn from(result: Result<T, ClientError>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(err) => Self::failed(err.to_string()),
        }
    }
}
