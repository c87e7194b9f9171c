use std::sync::atomic::{AtomicU64, Ordering};

use http::HeaderValue;
use http::header::HeaderName;

use crate::handler::{BoxFuture, Next};
use crate::middleware::Middleware;
use crate::request::Request;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The id assigned to the current request, readable from
/// [`Request::extensions`] by every inner frame and the kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestIdValue(pub String);

/// Propagates `x-request-id`.
///
/// An inbound header is kept as is. Otherwise an id is minted from a
/// per-instance counter, prefixed so ids from different processes behind
/// the same proxy stay distinguishable. Either way the id is stored in the
/// request extensions and echoed on the response.
///
/// The counter lives on the instance, so every traversal must reach the
/// same one. Behind a [`Registry`](crate::Registry), register it with
/// [`instance`](crate::Registry::instance); a factory would hand each
/// request a fresh counter and every id would repeat.
#[derive(Debug)]
pub struct RequestId {
    prefix: String,
    counter: AtomicU64,
}

impl RequestId {
    pub fn new() -> Self {
        Self::with_prefix(format!("{:x}", std::process::id()))
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), counter: AtomicU64::new(1) }
    }

    fn mint(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n:08x}", self.prefix)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for RequestId {
    fn process(&self, mut req: Request, next: Next) -> BoxFuture<'_> {
        let id = match req.header(X_REQUEST_ID.as_str()) {
            Some(id) => id.to_owned(),
            None => self.mint(),
        };

        Box::pin(async move {
            // An id that is not a valid header value is still visible to
            // inner frames, it is just not echoed.
            let header = HeaderValue::from_str(&id).ok();
            if let Some(value) = &header {
                req.headers_mut().insert(X_REQUEST_ID, value.clone());
            }
            req.extensions_mut().insert(RequestIdValue(id));

            let mut res = next.run(req).await?;
            if let Some(value) = header {
                res.headers_mut().insert(X_REQUEST_ID, value);
            }
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::response::Response;
    use http::{Method, Uri};

    fn echo_id() -> Next {
        Next::new(
            (|req: Request| async move {
                let id = req.extensions().get::<RequestIdValue>().cloned();
                Response::text(id.map(|v| v.0).unwrap_or_default())
            })
            .into_boxed_handler(),
        )
    }

    #[tokio::test]
    async fn mints_sequential_ids() {
        let mw = RequestId::with_prefix("test");
        let get = || Request::new(Method::GET, Uri::from_static("/"));

        let first = mw.process(get(), echo_id()).await.unwrap();
        let second = mw.process(get(), echo_id()).await.unwrap();

        assert_eq!(first.body(), "test-00000001");
        assert_eq!(second.body(), "test-00000002");
        assert_eq!(second.headers()["x-request-id"], "test-00000002");
    }

    #[tokio::test]
    async fn keeps_inbound_id() {
        let req = Request::new(Method::GET, Uri::from_static("/"))
            .with_header(X_REQUEST_ID, HeaderValue::from_static("from-proxy"));

        let res = RequestId::with_prefix("test").process(req, echo_id()).await.unwrap();
        assert_eq!(res.body(), "from-proxy");
        assert_eq!(res.headers()["x-request-id"], "from-proxy");
    }
}
