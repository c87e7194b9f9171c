use http::StatusCode;
use http::header::{AUTHORIZATION, HeaderName};
use tracing::debug;

use crate::handler::{BoxFuture, Next};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;

/// Short-circuits requests that lack a header.
///
/// Header inspection only: the proxy or an inner frame validates the value.
#[derive(Clone, Debug)]
pub struct RequireHeader {
    name: HeaderName,
    status: StatusCode,
}

impl RequireHeader {
    /// Rejects with `401 Unauthorized` when `name` is missing or empty.
    pub fn new(name: HeaderName) -> Self {
        Self { name, status: StatusCode::UNAUTHORIZED }
    }

    /// `RequireHeader::new(AUTHORIZATION)`.
    pub fn authorization() -> Self {
        Self::new(AUTHORIZATION)
    }

    /// Overrides the rejection status.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl Middleware for RequireHeader {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_> {
        let present = req
            .headers()
            .get(&self.name)
            .is_some_and(|v| !v.is_empty());

        if present {
            return Box::pin(next.run(req));
        }

        debug!(header = %self.name, path = req.path(), "rejecting request without required header");
        let status = self.status;
        Box::pin(async move { Ok(Response::status(status)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use http::{HeaderValue, Method, Uri};

    fn ok() -> Next {
        Next::new((|_req: Request| async { "inner" }).into_boxed_handler())
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let req = Request::new(Method::GET, Uri::from_static("/admin"));
        let res = RequireHeader::authorization().process(req, ok()).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert!(res.body().is_empty());
    }

    #[tokio::test]
    async fn forwards_when_present() {
        let req = Request::new(Method::GET, Uri::from_static("/admin"))
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        let res = RequireHeader::authorization().process(req, ok()).await.unwrap();
        assert_eq!(res.body(), "inner");
    }

    #[tokio::test]
    async fn custom_status() {
        let req = Request::new(Method::GET, Uri::from_static("/"));
        let res = RequireHeader::new(HeaderName::from_static("x-api-key"))
            .status(StatusCode::FORBIDDEN)
            .process(req, ok())
            .await
            .unwrap();
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    }
}
