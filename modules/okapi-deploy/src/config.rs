//! Typed configuration for talking to Okapi.
//!
//! Deserialized from the `okapi` section of the application config; durations
//! are humantime strings such as `"10s"` or `"250ms"`.

use busybee_http::{ExponentialBackoff, Method, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OkapiConfig {
    /// Okapi base URL
    pub url: String,
    /// Tenant sent in `X-Okapi-Tenant` on every call
    pub supertenant: String,
    /// Per-attempt timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Host Okapi should use to reach deployed modules
    pub deploy_host: String,
    pub enable: EnableConfig,
}

impl Default for OkapiConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9130".to_owned(),
            supertenant: "supertenant".to_owned(),
            request_timeout: Duration::from_secs(10),
            deploy_host: "localhost".to_owned(),
            enable: EnableConfig::default(),
        }
    }
}

impl OkapiConfig {
    /// Check everything except the URL, which the client validates when built.
    ///
    /// # Errors
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Empty { field: "url" });
        }
        if self.supertenant.is_empty() {
            return Err(ConfigError::Empty {
                field: "supertenant",
            });
        }
        if self.deploy_host.is_empty() {
            return Err(ConfigError::Empty {
                field: "deploy_host",
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.enable.retry.to_retry_config().map(drop)
    }
}

/// How modules are enabled for a tenant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnableStrategy {
    /// Look the module up first and POST it only when Okapi answers 404.
    /// The POST goes through the retry policy.
    #[default]
    CheckThenCreate,
    /// POST every module to the tenant's install endpoint once, without
    /// checking and without retries.
    UnconditionalInstall,
}

impl EnableStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckThenCreate => "check-then-create",
            Self::UnconditionalInstall => "unconditional-install",
        }
    }
}

impl fmt::Display for EnableStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnableStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check-then-create" => Ok(Self::CheckThenCreate),
            "unconditional-install" => Ok(Self::UnconditionalInstall),
            other => Err(ConfigError::UnknownStrategy(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnableConfig {
    pub strategy: EnableStrategy,
    /// `loadReference` tenant parameter
    pub load_reference: bool,
    /// `loadSample` tenant parameter
    pub load_sample: bool,
    /// Policy for the check-then-create enable POST
    pub retry: RetryPolicyConfig,
}

impl Default for EnableConfig {
    fn default() -> Self {
        Self {
            strategy: EnableStrategy::default(),
            load_reference: true,
            load_sample: true,
            retry: RetryPolicyConfig::default(),
        }
    }
}

impl EnableConfig {
    /// Value of the `tenantParameters` query parameter (unencoded)
    #[must_use]
    pub fn tenant_parameters(&self) -> String {
        format!(
            "loadReference={},loadSample={}",
            self.load_reference, self.load_sample
        )
    }
}

/// Retry policy as written in configuration
///
/// Delay before retry `n` (0-based) is `initial_backoff * backoff_factor^n`,
/// capped at `max_backoff`. With `immediate_first_retry` the first retry is
/// sent at once, so the defaults wait 0, 4, 8, 16 and 32 seconds. A
/// `Retry-After` from Okapi replaces the computed delay but is capped at
/// `max_backoff` too.
///
/// A request is retried only if its method is in `methods` and either the
/// response status is in `statuses` or, with `retry_connection_failures`,
/// the connection failed or the attempt timed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicyConfig {
    pub max_retries: usize,
    pub backoff_factor: f64,
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    pub immediate_first_retry: bool,
    pub jitter: bool,
    pub statuses: Vec<u16>,
    pub methods: Vec<String>,
    pub retry_connection_failures: bool,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: 2.0,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(120),
            immediate_first_retry: true,
            jitter: false,
            statuses: vec![400, 500, 502, 503, 504],
            methods: ["HEAD", "GET", "POST", "PUT", "DELETE", "OPTIONS", "TRACE"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            retry_connection_failures: true,
        }
    }
}

impl RetryPolicyConfig {
    /// Convert into the HTTP client's retry policy.
    ///
    /// # Errors
    /// Returns `ConfigError` for unknown methods, statuses outside 100..=599,
    /// or a backoff that is not finite and positive.
    pub fn to_retry_config(&self) -> Result<RetryConfig, ConfigError> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidBackoff {
                reason: format!("backoff_factor must be >= 1, got {}", self.backoff_factor),
            });
        }
        if self.max_backoff < self.initial_backoff {
            return Err(ConfigError::InvalidBackoff {
                reason: "max_backoff is smaller than initial_backoff".to_owned(),
            });
        }

        if let Some(&status) = self.statuses.iter().find(|s| !(100..=599).contains(*s)) {
            return Err(ConfigError::InvalidRetryStatus { status });
        }

        let methods = self
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|_| {
                    ConfigError::InvalidRetryMethod { method: m.clone() }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let backoff = ExponentialBackoff {
            initial: self.initial_backoff,
            max: self.max_backoff,
            multiplier: self.backoff_factor,
            jitter: self.jitter,
            immediate_first_retry: self.immediate_first_retry,
        };

        let policy = RetryConfig::on_statuses(
            self.max_retries,
            backoff,
            self.statuses.iter().copied(),
            methods,
        );
        Ok(if self.retry_connection_failures {
            policy.with_connection_failures()
        } else {
            policy
        })
    }
}
