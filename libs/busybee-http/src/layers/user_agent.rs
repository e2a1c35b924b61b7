use crate::error::HttpError;
use http::{HeaderValue, Request};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that stamps a default User-Agent on outgoing requests
#[derive(Clone)]
pub struct UserAgentLayer {
    value: HeaderValue,
}

impl UserAgentLayer {
    /// # Errors
    /// Returns `HttpError::InvalidHeaderValue` if `user_agent` is not a valid header value
    pub fn try_new(user_agent: impl AsRef<str>) -> Result<Self, HttpError> {
        Ok(Self {
            value: HeaderValue::from_str(user_agent.as_ref())?,
        })
    }
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = UserAgentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAgentService {
            inner,
            value: self.value.clone(),
        }
    }
}

#[derive(Clone)]
pub struct UserAgentService<S> {
    inner: S,
    value: HeaderValue,
}

impl<S, B> Service<Request<B>> for UserAgentService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // An explicit per-request User-Agent wins
        req.headers_mut()
            .entry(http::header::USER_AGENT)
            .or_insert_with(|| self.value.clone());
        self.inner.call(req)
    }
}
