//! Request-handler contract and type erasure.
//!
//! # How handlers are stored
//!
//! Every frame of a chain, and the kernel at its end, is stored behind the
//! same object-safe trait, [`RequestHandler`]. A chain is then a linked list
//! of `Arc<dyn RequestHandler>` values, each node holding the one it wraps.
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! async fn kernel(req: Request) -> Response { … }   ← user writes this
//!        ↓ Dispatcher::new(kernel, resolver)
//! kernel.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(kernel))                       ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn RequestHandler>
//! handler.handle(req)  at request time              ← one vtable dispatch
//!        ↓
//! Box::pin(async { kernel(req).await.into_result() })  ← BoxFuture
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// What every frame produces: a response, or an error propagating outward.
pub type HandlerResult = Result<Response, Error>;

/// A heap-allocated, type-erased future resolving to a [`HandlerResult`].
///
/// `Send` lets tokio move an in-flight traversal across worker threads.
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'a>>;

// ── RequestHandler ────────────────────────────────────────────────────────────

/// The unifying contract: one request in, one response (or error) out.
///
/// Chain nodes, the kernel and [`Dispatcher`](crate::Dispatcher) itself all
/// implement it. Implement it directly when a kernel needs its own state.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, req: Request) -> BoxFuture<'_>;
}

/// A shared, type-erased request handler.
pub type BoxedHandler = Arc<dyn RequestHandler>;

/// Erases a concrete [`RequestHandler`] so it can be used as a kernel.
///
/// ```rust
/// use strata::{BoxFuture, Dispatcher, Registry, Request, RequestHandler, Response};
///
/// struct Version(&'static str);
///
/// impl RequestHandler for Version {
///     fn handle(&self, _req: Request) -> BoxFuture<'_> {
///         Box::pin(async move { Ok(Response::text(self.0)) })
///     }
/// }
///
/// let app = Dispatcher::new(strata::boxed(Version("1.4.2")), Registry::new());
/// ```
pub fn boxed(handler: impl RequestHandler) -> BoxedHandler {
    Arc::new(handler)
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The remainder of the chain, as seen by one middleware frame.
///
/// `Next` is not `Clone` and [`run`](Next::run) consumes it, so a frame can
/// forward a request at most once. Dropping it without calling `run`
/// short-circuits the chain.
pub struct Next {
    inner: BoxedHandler,
}

impl Next {
    pub(crate) fn new(inner: BoxedHandler) -> Self {
        Self { inner }
    }

    /// Hands `req` to the rest of the chain and waits for its outcome.
    pub async fn run(self, req: Request) -> HandlerResult {
        self.inner.handle(req).await
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

// ── IntoResult ────────────────────────────────────────────────────────────────

/// What kernels and callable middleware may return.
///
/// Plain values become `Ok` responses. `Result<T, E>` lets a kernel fail:
/// the error is converted into [`Error`] and propagates untouched through
/// every enclosing frame.
pub trait IntoResult {
    fn into_result(self) -> HandlerResult;
}

impl IntoResult for Response {
    fn into_result(self) -> HandlerResult { Ok(self) }
}

impl IntoResult for &'static str {
    fn into_result(self) -> HandlerResult { Ok(self.into_response()) }
}

impl IntoResult for String {
    fn into_result(self) -> HandlerResult { Ok(self.into_response()) }
}

impl IntoResult for http::StatusCode {
    fn into_result(self) -> HandlerResult { Ok(self.into_response()) }
}

impl<T, E> IntoResult for Result<T, E>
where
    T: IntoResponse,
    E: Into<Error>,
{
    fn into_result(self) -> HandlerResult {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every value that can terminate a chain.
///
/// You never implement this yourself. It is satisfied by:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResult
/// ```
///
/// by an already erased [`BoxedHandler`], and by a whole
/// [`Dispatcher`](crate::Dispatcher), so chains can be nested.
///
/// The trait is **sealed** (via the private `Sealed` supertrait).
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

pub(crate) mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResult + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResult + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

impl private::Sealed for BoxedHandler {}

impl Handler for BoxedHandler {
    fn into_boxed_handler(self) -> BoxedHandler {
        self
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a plain `async fn` kernel to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> RequestHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResult + Send + 'static,
{
    fn handle(&self, req: Request) -> BoxFuture<'_> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_result() })
    }
}
