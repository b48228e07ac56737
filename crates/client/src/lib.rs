//! Asynchronous client for the DCT REST API.
//!
//! [`ApiClient`] owns the base URL, API key, SSL policy and retry budget.
//! The wire itself sits behind the [`Transport`] trait so callers can swap in
//! a fake when exercising retry behavior.

pub mod client;
pub mod error;
pub mod retry;
pub mod transport;

pub use client::{ApiCall, ApiClient, ClientConfig, API_PREFIX};
pub use error::ApiError;
pub use retry::RetryPolicy;
pub use transport::{
    ApiRequest, HttpMethod, RawResponse, ReqwestTransport, Transport, TransportError,
};
