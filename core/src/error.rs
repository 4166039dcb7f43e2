//! Error types for the product API client.
//!
//! # Design
//! `ClientError` is internal currency: request builders, response parsers
//! and construction return it, and `ProductService` flattens every operation
//! failure into an `OperationResult` message at its boundary. Only
//! construction (`ConfigurationMissing`, `InvalidConfiguration`) ever reaches
//! a caller as an `Err`.

use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// A required configuration value is absent or blank.
    #[error("missing required configuration value `{0}`")]
    ConfigurationMissing(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Token acquisition failed. Recovered during construction.
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// The request never produced a response (DNS, refused, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered outside the 2xx range.
    #[error("{reason}: {body}")]
    Api {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status: 404, .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
