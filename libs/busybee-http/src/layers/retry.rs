use crate::config::{ExponentialBackoff, RetryConfig, RetryTrigger};
use crate::error::HttpError;
use crate::response::{ResponseBody, parse_retry_after};
use bytes::Bytes;
use http::{HeaderValue, Request, Response};
use http_body_util::{BodyExt, Full};
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};

/// Header carrying the retry attempt number (1-indexed) on retried requests.
pub const RETRY_ATTEMPT_HEADER: &str = "X-Retry-Attempt";

/// Tower layer that retries requests according to a [`RetryConfig`]
#[derive(Clone)]
pub struct RetryLayer {
    config: RetryConfig,
}

impl RetryLayer {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Service that re-issues a request with exponential backoff
///
/// A response whose status is a configured trigger is retried just like a
/// transport error; its body is drained first so the connection can be
/// pooled again. Once retries are exhausted the last response is returned
/// as `Ok`, whatever its status. `Err` is returned only for transport and
/// timeout failures.
#[derive(Clone)]
pub struct RetryService<S> {
    inner: S,
    config: RetryConfig,
}

/// Decision taken after one attempt.
enum Outcome {
    Done(Result<Response<ResponseBody>, HttpError>),
    Retry {
        trigger: RetryTrigger,
        delay: Duration,
    },
}

impl<S> Service<Request<Full<Bytes>>> for RetryService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResponseBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        // Consume the instance that was poll_ready'd, keep a fresh clone
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let config = self.config.clone();

        let (parts, body) = req.into_parts();
        let version = parts.version;
        let extensions = parts.extensions.clone();
        let parts = Arc::new(parts);

        Box::pin(async move {
            let method = parts.method.clone();
            let host = parts
                .uri
                .authority()
                .map_or_else(|| "unknown".to_owned(), ToString::to_string);

            let mut attempt = 0usize;
            loop {
                let mut req = Request::from_parts((*parts).clone(), body.clone());
                *req.version_mut() = version;
                *req.extensions_mut() = extensions.clone();
                if attempt > 0
                    && let Ok(value) = HeaderValue::try_from(attempt.to_string())
                {
                    req.headers_mut().insert(RETRY_ATTEMPT_HEADER, value);
                }

                let mut svc = inner.clone();
                svc.ready().await?;
                let result = svc.call(req).await;

                let exhausted = attempt >= config.max_retries;
                let outcome = match result {
                    Ok(resp) => {
                        let trigger = RetryTrigger::Status(resp.status().as_u16());
                        if exhausted || !config.should_retry(trigger, &method) {
                            Outcome::Done(Ok(resp))
                        } else {
                            let retry_after = if config.ignore_retry_after {
                                None
                            } else {
                                parse_retry_after(resp.headers())
                            };
                            drain_before_retry(resp, config.retry_response_drain_limit).await;
                            Outcome::Retry {
                                trigger,
                                delay: retry_delay(&config.backoff, attempt, retry_after),
                            }
                        }
                    }
                    Err(err) => {
                        let trigger = get_retry_trigger(&err);
                        if exhausted || !config.should_retry(trigger, &method) {
                            Outcome::Done(Err(err))
                        } else {
                            tracing::debug!(error = %err, "attempt failed");
                            Outcome::Retry {
                                trigger,
                                delay: calculate_backoff(&config.backoff, attempt),
                            }
                        }
                    }
                };

                match outcome {
                    Outcome::Done(result) => return result,
                    Outcome::Retry { trigger, delay } => {
                        tracing::debug!(
                            retry = attempt + 1,
                            max_retries = config.max_retries,
                            trigger = ?trigger,
                            method = %method,
                            host = %host,
                            backoff_ms = delay.as_millis(),
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        })
    }
}

/// Server-requested delay when present, never longer than `backoff.max`
fn retry_delay(
    backoff: &ExponentialBackoff,
    attempt: usize,
    retry_after: Option<Duration>,
) -> Duration {
    match retry_after {
        Some(delay) => delay.min(backoff.max),
        None => calculate_backoff(backoff, attempt),
    }
}

/// Read and discard up to `limit` body bytes so the connection can be reused.
///
/// Bodies announcing a larger `Content-Length` are dropped unread.
async fn drain_before_retry(response: Response<ResponseBody>, limit: usize) {
    let declared = response
        .headers()
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        tracing::trace!(content_length = ?declared, limit, "skipping drain");
        return;
    }

    let mut body = std::pin::pin!(response.into_body());
    let mut drained = 0usize;
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Some(chunk) = frame.data_ref() {
                    drained += chunk.len();
                    if drained >= limit {
                        break;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "failed to drain response body before retry");
                break;
            }
        }
    }
}

fn get_retry_trigger(err: &HttpError) -> RetryTrigger {
    match err {
        HttpError::Transport(_) => RetryTrigger::TransportError,
        HttpError::Timeout(_) => RetryTrigger::Timeout,
        _ => RetryTrigger::NonRetryable,
    }
}

/// Calculate backoff duration for a given attempt (0-indexed)
///
/// Non-finite or negative inputs are sanitized instead of panicking.
#[must_use]
pub fn calculate_backoff(backoff: &ExponentialBackoff, attempt: usize) -> Duration {
    const MAX_BACKOFF_SECS: f64 = 86400.0;

    if backoff.immediate_first_retry && attempt == 0 {
        return Duration::ZERO;
    }

    fn sane(value: f64, fallback: f64) -> f64 {
        if value.is_finite() && value >= 0.0 {
            value
        } else {
            fallback
        }
    }

    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let multiplier = sane(backoff.multiplier, 1.0);
    let initial = sane(backoff.initial.as_secs_f64(), 0.0);
    let max = sane(backoff.max.as_secs_f64(), MAX_BACKOFF_SECS).min(MAX_BACKOFF_SECS);

    let raw = initial * multiplier.powi(exponent);
    let base = if raw.is_finite() { raw.clamp(0.0, max) } else { max };
    let duration = Duration::from_secs_f64(base);

    let duration = if backoff.jitter {
        let factor = rand::rng().random_range(0.0..=0.25);
        duration + duration.mul_f64(factor)
    } else {
        duration
    };

    duration.min(Duration::from_secs_f64(max))
}
