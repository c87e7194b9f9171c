//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, request-id injection, error
//! translation and authentication-header inspection.
//!
//! A unit sees the request first, decides whether to hand it to the rest of
//! the chain through [`Next`], and sees the response (or error) on the way
//! back out:
//!
//! ```rust
//! use strata::{BoxFuture, Middleware, Next, Request};
//!
//! struct Suffix(&'static str);
//!
//! impl Middleware for Suffix {
//!     fn process(&self, req: Request, next: Next) -> BoxFuture<'_> {
//!         Box::pin(async move {
//!             let res = next.run(req).await?;
//!             let mut body = res.body().to_vec();
//!             body.extend_from_slice(self.0.as_bytes());
//!             Ok(res.with_body(body))
//!         })
//!     }
//! }
//! ```
//!
//! Built-in units:
//! - [`Trace`]: per-request span with method, path, status, latency
//! - [`RequestId`]: `x-request-id` propagation
//! - [`Recover`]: turns errors from the inner chain into responses
//! - [`RequireHeader`]: rejects requests missing a header

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, IntoResult, Next};
use crate::request::Request;

mod recover;
mod request_id;
mod require_header;
mod trace;

pub use recover::Recover;
pub use request_id::{RequestId, RequestIdValue};
pub use require_header::RequireHeader;
pub use trace::Trace;

/// A unit that wraps the remainder of the chain.
///
/// `process` may forward the request with `next.run(req)`, answer it itself
/// without ever touching `next`, and rewrite whatever comes back.
pub trait Middleware: Send + Sync + 'static {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_>;
}

/// A shared, type-erased middleware unit.
pub type BoxedMiddleware = Arc<dyn Middleware>;

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_> {
        (**self).process(req, next)
    }
}

/// A plain `(request, next)` function registered as middleware.
pub type Callable = Arc<dyn Fn(Request, Next) -> BoxFuture<'static> + Send + Sync>;

/// Erases an async `(request, next)` function into a [`Callable`].
///
/// ```rust
/// use strata::{Next, Request, middleware};
///
/// let stamp = middleware::callable(|req: Request, next: Next| async move {
///     let mut res = next.run(req).await?;
///     res.headers_mut().insert("x-served-by", "strata".parse().unwrap());
///     Ok::<_, strata::Error>(res)
/// });
/// ```
pub fn callable<F, Fut, R>(f: F) -> Callable
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResult + Send + 'static,
{
    Arc::new(move |req: Request, next: Next| -> BoxFuture<'static> {
        let fut = f(req, next);
        Box::pin(async move { fut.await.into_result() })
    })
}

/// Erases a concrete unit into a [`BoxedMiddleware`], the form
/// [`Layer::from_any`](crate::Layer::from_any) recognises.
pub fn boxed(unit: impl Middleware) -> BoxedMiddleware {
    Arc::new(unit)
}
