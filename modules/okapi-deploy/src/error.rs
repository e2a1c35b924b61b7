use busybee_http::{HttpError, StatusCode};
use thiserror::Error;

/// Errors raised while registering or enabling modules.
///
/// Every variant aborts the current operation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DeployError {
    /// The module has no descriptor, so Okapi does not know it.
    #[error("module is probably not registered: {module}")]
    NotRegistered { module: String },

    /// `POST /_/discovery/modules` did not answer 201.
    #[error("could not set deployment location (HTTP {status}): {body}")]
    Deployment { status: StatusCode, body: String },

    /// The enable request failed with something other than a missing launch descriptor.
    #[error("could not enable module({module_id}) for tenant({tenant_id}) (HTTP {status}): {body}")]
    Enable {
        module_id: String,
        tenant_id: String,
        status: StatusCode,
        body: String,
    },

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("invalid Okapi URL '{url}': {reason}")]
    InvalidServiceUrl { url: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Invalid deployer configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("okapi.{field} must not be empty")]
    Empty { field: &'static str },

    #[error("okapi.request_timeout must be greater than zero")]
    ZeroTimeout,

    #[error("invalid HTTP method in retry policy: {method}")]
    InvalidRetryMethod { method: String },

    #[error("invalid HTTP status in retry policy: {status}")]
    InvalidRetryStatus { status: u16 },

    #[error("invalid retry backoff: {reason}")]
    InvalidBackoff { reason: String },

    #[error("unknown enable strategy '{0}' (expected check-then-create or unconditional-install)")]
    UnknownStrategy(String),
}
