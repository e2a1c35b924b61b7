use crate::error::HttpError;
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use std::time::{Duration, SystemTime};

/// `Retry-After` as a delay from now.
///
/// Accepts delay-seconds and HTTP-date; `None` when absent, malformed,
/// negative or already past.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?.trim();

    match raw.parse::<i64>() {
        Ok(secs) if secs >= 0 => Some(Duration::from_secs(secs.cast_unsigned())),
        Ok(_) => None,
        Err(_) => httpdate::parse_http_date(raw)
            .ok()?
            .duration_since(SystemTime::now())
            .ok(),
    }
}

pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// A response whose body has not been read yet.
///
/// Any status is a successful `send()`; callers branch on [`HttpResponse::status`]
/// and read the body whatever it is. Every read stops at `max_body_size`.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// # Errors
    /// [`HttpError::BodyTooLarge`] past the size limit, [`HttpError::Transport`]
    /// if the connection breaks mid-body.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        collect_limited(self.inner, self.max_body_size).await
    }

    /// Body as text, bad UTF-8 replaced with U+FFFD.
    ///
    /// # Errors
    /// Same as [`HttpResponse::bytes`].
    pub async fn text(self) -> Result<String, HttpError> {
        let body = self.bytes().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

async fn collect_limited(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<Bytes, HttpError> {
    let mut body = std::pin::pin!(response.into_body());
    let mut buf = Vec::new();

    while let Some(frame) = body.frame().await {
        let Some(chunk) = frame.map_err(HttpError::Transport)?.into_data().ok() else {
            continue;
        };
        let total = buf.len() + chunk.len();
        if total > limit {
            return Err(HttpError::BodyTooLarge {
                limit,
                actual: total,
            });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buf))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http_body_util::Full;

    fn response(status: StatusCode, body: &'static [u8]) -> HttpResponse {
        let body: ResponseBody = Full::new(Bytes::from_static(body))
            .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })
            .boxed();
        HttpResponse {
            inner: Response::builder().status(status).body(body).unwrap(),
            max_body_size: 64,
        }
    }

    #[test]
    fn retry_after_in_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::RETRY_AFTER, "  120 ".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(120)));
    }

    #[test]
    fn retry_after_negative_or_garbage_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::RETRY_AFTER, "-5".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(http::header::RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn retry_after_date_in_past_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::RETRY_AFTER,
            "Sun, 06 Nov 1994 08:49:37 GMT".parse().unwrap(),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[tokio::test]
    async fn text_ignores_status() {
        let resp = response(StatusCode::BAD_REQUEST, b"module has no launchDescriptor");
        assert_eq!(resp.text().await.unwrap(), "module has no launchDescriptor");
    }

    #[tokio::test]
    async fn body_limit_enforced() {
        let resp = response(StatusCode::OK, &[b'x'; 128]);
        assert!(matches!(
            resp.bytes().await,
            Err(HttpError::BodyTooLarge { limit: 64, .. })
        ));
    }
}
