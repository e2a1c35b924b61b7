use std::collections::HashSet;
use std::time::Duration;

/// Sent when the caller does not set a User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("busybee-http/", env!("CARGO_PKG_VERSION"));

/// How much of a retried response is read off the wire so the connection can be pooled again
pub const DEFAULT_RETRY_RESPONSE_DRAIN_LIMIT: usize = 64 * 1024;

/// What went wrong with an attempt, as seen by the retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RetryTrigger {
    /// Connection could not be made or was lost
    TransportError,
    Timeout,
    /// Response arrived with this status
    Status(u16),
    /// Never retried, whatever the policy says
    NonRetryable,
}

impl RetryTrigger {
    pub const BAD_REQUEST: Self = Self::Status(400);
    pub const REQUEST_TIMEOUT: Self = Self::Status(408);
    pub const TOO_MANY_REQUESTS: Self = Self::Status(429);
    pub const INTERNAL_SERVER_ERROR: Self = Self::Status(500);
    pub const BAD_GATEWAY: Self = Self::Status(502);
    pub const SERVICE_UNAVAILABLE: Self = Self::Status(503);
    pub const GATEWAY_TIMEOUT: Self = Self::Status(504);
}

/// RFC 9110 idempotent methods
fn idempotent_methods() -> HashSet<http::Method> {
    HashSet::from([
        http::Method::GET,
        http::Method::HEAD,
        http::Method::PUT,
        http::Method::DELETE,
        http::Method::OPTIONS,
        http::Method::TRACE,
    ])
}

/// Delay before retry `n` (0-based) is `initial * multiplier^n`, capped at `max`.
///
/// With `immediate_first_retry` the first retry goes out without waiting and
/// the schedule continues from `n = 1`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    /// Stretch each delay by a random 0-25%
    pub jitter: bool,
    pub immediate_first_retry: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
            immediate_first_retry: false,
        }
    }
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            ..Default::default()
        }
    }

    /// Millisecond delays, no jitter; for tests against local mocks
    #[must_use]
    pub fn fast() -> Self {
        Self {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(100),
            multiplier: 2.0,
            jitter: false,
            immediate_first_retry: false,
        }
    }
}

/// Retry policy value object
///
/// A failed attempt is retried when its trigger is in `triggers` AND the
/// request method is in `methods`. Total attempts = 1 + `max_retries`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 sends once
    pub max_retries: usize,
    pub backoff: ExponentialBackoff,
    pub triggers: HashSet<RetryTrigger>,
    pub methods: HashSet<http::Method>,
    /// Use the backoff even when the server sends `Retry-After`.
    /// An honoured `Retry-After` is still capped at `backoff.max`.
    pub ignore_retry_after: bool,
    pub retry_response_drain_limit: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: ExponentialBackoff::default(),
            triggers: HashSet::from([
                RetryTrigger::TransportError,
                RetryTrigger::Timeout,
                RetryTrigger::REQUEST_TIMEOUT,
                RetryTrigger::TOO_MANY_REQUESTS,
                RetryTrigger::INTERNAL_SERVER_ERROR,
                RetryTrigger::BAD_GATEWAY,
                RetryTrigger::SERVICE_UNAVAILABLE,
                RetryTrigger::GATEWAY_TIMEOUT,
            ]),
            methods: idempotent_methods(),
            ignore_retry_after: false,
            retry_response_drain_limit: DEFAULT_RETRY_RESPONSE_DRAIN_LIMIT,
        }
    }
}

impl RetryConfig {
    /// Policy that reacts to the listed statuses and nothing else.
    ///
    /// Chain [`RetryConfig::with_connection_failures`] to also retry lost
    /// connections and attempt timeouts.
    #[must_use]
    pub fn on_statuses(
        max_retries: usize,
        backoff: ExponentialBackoff,
        statuses: impl IntoIterator<Item = u16>,
        methods: impl IntoIterator<Item = http::Method>,
    ) -> Self {
        Self {
            max_retries,
            backoff,
            triggers: statuses.into_iter().map(RetryTrigger::Status).collect(),
            methods: methods.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Also retry attempts that failed below HTTP or timed out
    #[must_use]
    pub fn with_connection_failures(mut self) -> Self {
        self.triggers
            .extend([RetryTrigger::TransportError, RetryTrigger::Timeout]);
        self
    }

    #[must_use]
    pub fn should_retry(&self, trigger: RetryTrigger, method: &http::Method) -> bool {
        self.triggers.contains(&trigger) && self.methods.contains(method)
    }
}

/// Whether plain `http://` URLs may be used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// `https://` only
    #[default]
    TlsOnly,
    AllowInsecureHttp,
}

/// Settings collected by [`crate::HttpClientBuilder`]
#[derive(Debug, Clone)]
pub(crate) struct HttpClientConfig {
    /// Per attempt
    pub request_timeout: Duration,
    pub max_body_size: usize,
    pub user_agent: String,
    /// `None` leaves the retry layer out of the stack
    pub retry: Option<RetryConfig>,
    pub transport: TransportSecurity,
    pub buffer_capacity: usize,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            retry: Some(RetryConfig::default()),
            transport: TransportSecurity::TlsOnly,
            buffer_capacity: 64,
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 8,
        }
    }
}
