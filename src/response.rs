//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Build a [`Response`] in your kernel or middleware and return it. Frames
//! that shape the response on the way out take it by value, change it, and
//! return it again.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::Full;

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use strata::{HeaderValue, Response, StatusCode};
/// use strata::header::LOCATION;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header(LOCATION, HeaderValue::from_static("/users/42"))
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// `200 OK` — `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK` — `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { status: code, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { status: StatusCode::OK, headers: HeaderMap::new() }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Replaces the body, keeping status and headers.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`. Terminated by a
/// typed body method.
#[derive(Debug)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish(HeaderValue::from_static("application/json"), body.into())
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        let body: String = body.into();
        self.finish(HeaderValue::from_static("text/plain; charset=utf-8"), Bytes::from(body))
    }

    /// Terminate with an arbitrary content type (XML, HTML, binary, SSE, ...).
    ///
    /// ```rust
    /// use strata::{HeaderValue, Response};
    ///
    /// let res = Response::builder()
    ///     .bytes(HeaderValue::from_static("text/html; charset=utf-8"), "<h1>hi</h1>");
    /// assert_eq!(res.headers()["content-type"], "text/html; charset=utf-8");
    /// ```
    pub fn bytes(self, content_type: HeaderValue, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, body.into())
    }

    pub fn no_body(self) -> Response {
        Response { status: self.status, headers: self.headers, body: Bytes::new() }
    }

    fn finish(mut self, content_type: HeaderValue, body: Bytes) -> Response {
        self.headers.insert(CONTENT_TYPE, content_type);
        Response { status: self.status, headers: self.headers, body }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from kernels and
/// callables.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a bare status from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::LOCATION;

    #[test]
    fn builder_sets_status_headers_and_content_type() {
        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header(LOCATION, HeaderValue::from_static("/users/99"))
            .json(r#"{"id":"99"}"#);

        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.headers()[LOCATION], "/users/99");
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(res.body(), r#"{"id":"99"}"#);
    }

    #[test]
    fn with_body_keeps_status_and_headers() {
        let res = Response::text("K").with_body("K-A");
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(res.body(), "K-A");
    }

    #[test]
    fn bytes_takes_a_checked_content_type() {
        let content_type = HeaderValue::from_str("application/xml").unwrap();
        let res = Response::builder().bytes(content_type, "<ok/>");
        assert_eq!(res.headers()[CONTENT_TYPE], "application/xml");
        assert_eq!(res.body(), "<ok/>");

        assert!(HeaderValue::from_str("text/plain\n").is_err());
    }

    #[test]
    fn into_http_carries_everything() {
        let res = Response::status(StatusCode::NO_CONTENT).into_http();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.headers().is_empty());
    }
}
