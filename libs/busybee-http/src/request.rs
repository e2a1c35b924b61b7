use crate::client::{BufferedService, map_buffer_error};
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::HttpResponse;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::Request;
use http_body_util::Full;
use serde::Serialize;
use tower::{Service, ServiceExt};

#[derive(Clone, Debug)]
enum BodyKind {
    Empty,
    Json(Bytes),
}

/// HTTP request builder with fluent API
///
/// Created by [`HttpClient::get`](crate::HttpClient::get),
/// [`HttpClient::post`](crate::HttpClient::post), etc. Header errors are
/// deferred and reported by [`send()`](RequestBuilder::send).
///
/// ```ignore
/// let resp = client
///     .post("http://localhost:9130/_/proxy/tenants/diku/modules")
///     .header("x-okapi-tenant", "supertenant")
///     .query("tenantParameters", "loadReference=true,loadSample=true")
///     .json(&serde_json::json!({ "id": "mod-users-1.0.0" }))?
///     .send()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: BufferedService,
    max_body_size: usize,
    method: http::Method,
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: BodyKind,
    error: Option<HttpError>,
    transport: TransportSecurity,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: BufferedService,
        max_body_size: usize,
        method: http::Method,
        url: String,
        transport: TransportSecurity,
    ) -> Self {
        Self {
            service,
            max_body_size,
            method,
            url,
            query: Vec::new(),
            headers: Vec::new(),
            body: BodyKind::Empty,
            error: None,
            transport,
        }
    }

    /// Add a single header to the request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.error = Some(HttpError::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(HttpError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Append a query parameter
    ///
    /// Pairs are form-urlencoded exactly once when the request is sent, after
    /// any query already present in the URL.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set request body as JSON
    ///
    /// Sets `Content-Type: application/json` unless the caller supplied one.
    ///
    /// # Errors
    /// Returns the deferred builder error, or `HttpError::Json` if serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        self.body = BodyKind::Json(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Final request URI: query pairs merged in, absolute, and with a scheme
    /// the transport security mode accepts.
    fn resolve_uri(&self) -> Result<http::Uri, HttpError> {
        let invalid = |kind, reason: String| HttpError::InvalidUri {
            url: self.url.clone(),
            kind,
            reason,
        };

        let full_url = if self.query.is_empty() {
            self.url.clone()
        } else {
            let mut url = url::Url::parse(&self.url)
                .map_err(|e| invalid(InvalidUriKind::ParseError, e.to_string()))?;
            url.query_pairs_mut().extend_pairs(&self.query);
            String::from(url)
        };

        let uri: http::Uri = full_url
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(InvalidUriKind::ParseError, e.to_string()))?;

        if uri.authority().is_none() {
            return Err(invalid(
                InvalidUriKind::MissingAuthority,
                "missing host/authority".to_owned(),
            ));
        }

        match (uri.scheme_str(), self.transport) {
            (Some("https"), _) | (Some("http"), TransportSecurity::AllowInsecureHttp) => Ok(uri),
            (Some("http"), TransportSecurity::TlsOnly) => Err(HttpError::InvalidScheme {
                scheme: "http".to_owned(),
                reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
            }),
            (Some(scheme), _) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            (None, _) => Err(invalid(
                InvalidUriKind::MissingScheme,
                "missing scheme".to_owned(),
            )),
        }
    }

    /// Send the request
    ///
    /// Any HTTP status is returned as `Ok`; check [`HttpResponse::status`].
    ///
    /// # Errors
    /// Returns `HttpError` for deferred builder errors, invalid URLs,
    /// transport failures and timeouts.
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let uri = self.resolve_uri()?;
        let mut builder = Request::builder().method(self.method).uri(uri);

        let has_content_type = self
            .headers
            .iter()
            .any(|(name, _)| name == http::header::CONTENT_TYPE);
        if !has_content_type && matches!(self.body, BodyKind::Json(_)) {
            builder = builder.header(http::header::CONTENT_TYPE, "application/json");
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        let body = match self.body {
            BodyKind::Empty => Bytes::new(),
            BodyKind::Json(b) => b,
        };
        let request = builder.body(Full::new(body))?;

        let inner = self
            .service
            .ready()
            .await
            .map_err(map_buffer_error)?
            .call(request)
            .await
            .map_err(map_buffer_error)?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}
