#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP client used by busybee to talk to Okapi
//!
//! A hyper client wrapped in a small tower stack:
//! - per-attempt timeouts
//! - retries driven by an explicit [`RetryConfig`] (trigger set, method set, backoff)
//! - User-Agent injection
//! - rustls TLS, with plain HTTP allowed via [`TransportSecurity::AllowInsecureHttp`]
//! - response body size limits
//!
//! ```ignore
//! use busybee_http::HttpClientBuilder;
//!
//! let client = HttpClientBuilder::new().allow_insecure_http().build()?;
//! let resp = client
//!     .get("http://localhost:9130/_/proxy/modules")
//!     .header("x-okapi-tenant", "supertenant")
//!     .send()
//!     .await?;
//! if resp.status() == http::StatusCode::NOT_FOUND { /* ... */ }
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;
mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{ExponentialBackoff, RetryConfig, RetryTrigger, TransportSecurity};
pub use error::{HttpError, InvalidUriKind};
pub use layers::{RETRY_ATTEMPT_HEADER, calculate_backoff};
pub use request::RequestBuilder;
pub use response::HttpResponse;

// Re-exported so callers can name methods and statuses without a direct `http` dependency
pub use http::{Method, StatusCode};
