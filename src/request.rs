//! Incoming HTTP request type.

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri};

/// An incoming HTTP request.
///
/// The same value is moved through every frame of the chain. A middleware
/// that wants to rewrite it mutates it in place (or builds a new one) before
/// handing it to [`Next::run`](crate::Next::run).
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    extensions: Extensions,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            extensions: Extensions::new(),
        }
    }

    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            extensions: parts.extensions,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: http::header::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Typed per-request values attached by middleware (a request id, an
    /// authenticated principal, ...).
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Header lookup. Non-UTF-8 values are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http::header::AUTHORIZATION;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = Request::new(Method::GET, Uri::from_static("/users/42"))
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer t"));

        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.header("Authorization"), Some("Bearer t"));
        assert_eq!(req.header("x-missing"), None);
    }

    #[test]
    fn extensions_carry_typed_values() {
        #[derive(Clone, Debug, PartialEq)]
        struct User(&'static str);

        let mut req = Request::new(Method::POST, Uri::from_static("/"));
        req.extensions_mut().insert(User("alice"));
        assert_eq!(req.extensions().get::<User>(), Some(&User("alice")));
    }
}
