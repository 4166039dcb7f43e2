//! Async client for the product REST API.
//!
//! # Overview
//! `ProductService` lists, fetches, creates and updates products at
//! `/api/products`, optionally authenticating with a bearer token obtained
//! through the host's managed identity. Every operation returns an
//! `OperationResult` instead of an error.
//!
//! # Design
//! - `ProductClient` builds `HttpRequest` values and parses `HttpResponse`
//!   values without I/O; `ProductService` executes the round trip between
//!   the two.
//! - `TokenProvider` is the seam for credentials; `ManagedIdentityCredential`
//!   is the production implementation.
//! - `ProductsPage` derives the list view state from a list call.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod page;
pub mod result;
pub mod service;
pub mod types;

pub use auth::{AccessToken, AuthError, ManagedIdentityCredential, TokenProvider};
pub use client::ProductClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use page::ProductsPage;
pub use result::OperationResult;
pub use service::ProductService;
pub use types::Product;
