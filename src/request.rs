use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Method, StatusCode,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{RequestOptions, Result};

/// Per-call request description passed to [`crate::RequestExecutor::execute`].
///
/// The body is kept as [`Bytes`] so every attempt resends the same payload.
#[derive(Clone, Debug)]
pub struct RequestConfig {
    pub(crate) method: Method,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) is_ok: fn(StatusCode) -> bool,
    pub(crate) options: Option<RequestOptions>,
    pub(crate) sequence: Option<u64>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            cancel: None,
            is_ok: |status| status.is_success(),
            options: None,
            sequence: None,
        }
    }
}

impl RequestConfig {
    /// A `GET` with no headers or body.
    pub fn new() -> Self {
        Self::default()
    }

    /// A request with the given method.
    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Adds a header, replacing any previous value for `name`.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces all headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body and sets `content-type`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    /// Attaches a caller cancellation token.
    ///
    /// The token is raced together with the per-attempt timeout; whichever
    /// fires first ends the attempt.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Overrides which statuses count as success. Defaults to 2xx.
    pub fn ok_when(mut self, is_ok: fn(StatusCode) -> bool) -> Self {
        self.is_ok = is_ok;
        self
    }

    /// Overrides the executor's default options for this call only.
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Sends `seq=<sequence>` as a query parameter on every attempt.
    pub fn sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_to_plain_get() {
        let config = RequestConfig::new();
        assert_eq!(config.method, Method::GET);
        assert!(config.headers.is_empty());
        assert!(config.body.is_none());
        assert!((config.is_ok)(StatusCode::OK));
        assert!(!(config.is_ok)(StatusCode::NOT_FOUND));
    }

    #[test]
    fn json_body_sets_content_type() {
        let config = RequestConfig::method(Method::POST)
            .json(&json!({"title": "morning show"}))
            .expect("json must encode");

        assert_eq!(
            config.headers.get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );
        assert_eq!(
            config.body.as_deref(),
            Some(br#"{"title":"morning show"}"#.as_slice())
        );
    }

    #[test]
    fn custom_ok_predicate() {
        let config = RequestConfig::new().ok_when(|status| status == StatusCode::CREATED);
        assert!((config.is_ok)(StatusCode::CREATED));
        assert!(!(config.is_ok)(StatusCode::OK));
    }
}
