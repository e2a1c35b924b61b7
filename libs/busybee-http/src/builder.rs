use crate::config::{HttpClientConfig, RetryConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::{RetryLayer, UserAgentLayer};
use crate::response::ResponseBody;
use crate::tls;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::time::Duration;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::{ServiceBuilder, ServiceExt};

/// Builder for an [`HttpClient`](crate::HttpClient)
///
/// ```ignore
/// let client = HttpClientBuilder::new()
///     .allow_insecure_http()
///     .timeout(Duration::from_secs(10))
///     .retry(Some(RetryConfig::on_statuses(5, backoff, [400, 503], [Method::POST])))
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-attempt timeout; every retry gets a fresh one
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the retry policy; `None` removes the retry layer
    #[must_use]
    pub fn retry(mut self, retry: Option<RetryConfig>) -> Self {
        self.config.retry = retry;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Shorthand for `transport(TransportSecurity::AllowInsecureHttp)`
    #[must_use]
    pub fn allow_insecure_http(self) -> Self {
        self.transport(TransportSecurity::AllowInsecureHttp)
    }

    /// Build the client
    ///
    /// Layers, outer to inner: `Buffer → Retry? → Timeout → UserAgent → hyper`.
    /// `send()` yields `Ok` for every HTTP status; only transport, timeout
    /// and TLS failures are `Err`.
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails or the User-Agent is invalid.
    pub fn build(self) -> Result<crate::HttpClient, HttpError> {
        let config = self.config;
        if config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::debug!("plain HTTP allowed for this client");
        }

        let https = build_https_connector(config.transport)?;

        // pool_idle_timeout has no effect without a pool timer
        let hyper_client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build::<_, Full<Bytes>>(https);

        let timeout = config.request_timeout;
        let mut service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(UserAgentLayer::try_new(&config.user_agent)?)
            .service(hyper_client)
            .map_response(box_response_body)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout))
            .boxed_clone();

        if let Some(retry) = config.retry {
            service = ServiceBuilder::new()
                .layer(RetryLayer::new(retry))
                .service(service)
                .boxed_clone();
        }

        Ok(crate::HttpClient {
            service: Buffer::new(service, config.buffer_capacity.max(1)),
            max_body_size: config.max_body_size,
            transport: config.transport,
        })
    }
}

/// Turn a `tower::BoxError` back into an `HttpError`, keeping typed errors intact
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }
    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(other),
    }
}

fn box_response_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    response.map(|body| body.map_err(Into::into).boxed())
}

/// Build the HTTPS connector over the bundled Mozilla roots, optionally
/// accepting plain `http://` URIs.
///
/// # Errors
/// Returns `HttpError::Tls` if the crypto provider rejects the TLS setup.
fn build_https_connector(
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let tls_ready = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(tls::get_crypto_provider())
        .map_err(|e| HttpError::Tls(Box::new(e)))?;

    let connector = match transport {
        TransportSecurity::AllowInsecureHttp => {
            tls_ready.https_or_http().enable_all_versions().build()
        }
        TransportSecurity::TlsOnly => tls_ready.https_only().enable_all_versions().build(),
    };
    Ok(connector)
}
