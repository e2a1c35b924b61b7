//! Tower layers composed by [`crate::HttpClientBuilder`]
//!
//! - [`UserAgentLayer`] - adds a default User-Agent header
//! - [`RetryLayer`] - retries by policy with exponential backoff and jitter

mod retry;
mod user_agent;

pub(crate) use retry::RetryLayer;
pub use retry::{RETRY_ATTEMPT_HEADER, calculate_backoff};
pub(crate) use user_agent::UserAgentLayer;
