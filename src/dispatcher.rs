//! The middleware dispatch chain.
//!
//! A [`Dispatcher`] holds the tip of a singly linked chain of frames that
//! ends in the kernel. Every registration wraps the current tip in a new
//! frame, so the unit registered last is the first to see a request and the
//! last to see its response:
//!
//! ```text
//! add(A); add(B); add(C)
//!
//!   handle(req) ─▶ C ─▶ B ─▶ A ─▶ kernel
//!   response    ◀─ C ◀─ B ◀─ A ◀─┘
//! ```
//!
//! There is no separate build step. The chain can be run after every
//! registration; registering takes `&mut self` and running takes `&self`,
//! so a dispatcher shared behind an `Arc` can no longer change.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler, IntoResult, Next, RequestHandler, private};
use crate::middleware::{self, BoxedMiddleware, Callable, Middleware};
use crate::request::Request;
use crate::resolver::Resolver;

// ── Layer ─────────────────────────────────────────────────────────────────────

/// A registration value, tagged by shape.
pub enum Layer {
    /// A ready unit.
    Middleware(BoxedMiddleware),
    /// A reference resolved lazily, when a request first reaches the frame.
    Deferred(String),
    /// A plain `(request, next)` function.
    Callable(Callable),
}

impl Layer {
    pub fn middleware(unit: impl Middleware) -> Self {
        Self::Middleware(Arc::new(unit))
    }

    pub fn deferred(reference: impl Into<String>) -> Self {
        Self::Deferred(reference.into())
    }

    pub fn callable<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResult + Send + 'static,
    {
        Self::Callable(middleware::callable(f))
    }

    /// Classifies a type-erased value.
    ///
    /// Shapes are tried in order: a [`BoxedMiddleware`], then a reference
    /// (`String` or `&'static str`), then a [`Callable`]. A value that is a
    /// formal middleware is never treated as anything else.
    ///
    /// `Any` cannot see trait impls, so only an already erased
    /// [`BoxedMiddleware`] counts as the middleware shape here. A concrete
    /// unit boxed as `Any` is rejected; erase it with
    /// [`middleware::boxed`] first, or pass it to [`Dispatcher::add`]
    /// directly.
    ///
    /// ```rust
    /// use std::any::Any;
    /// use strata::middleware::{self, Trace};
    /// use strata::{Error, Layer};
    ///
    /// let erased: Box<dyn Any + Send + Sync> = Box::new(middleware::boxed(Trace::new()));
    /// assert!(matches!(Layer::from_any(erased), Ok(Layer::Middleware(_))));
    ///
    /// let concrete: Box<dyn Any + Send + Sync> = Box::new(Trace::new());
    /// assert!(matches!(Layer::from_any(concrete), Err(Error::InvalidMiddlewareKind)));
    /// ```
    pub fn from_any(value: Box<dyn Any + Send + Sync>) -> Result<Self, Error> {
        let value = match value.downcast::<BoxedMiddleware>() {
            Ok(unit) => return Ok(Self::Middleware(*unit)),
            Err(value) => value,
        };
        let value = match value.downcast::<String>() {
            Ok(reference) => return Ok(Self::Deferred(*reference)),
            Err(value) => value,
        };
        let value = match value.downcast::<&'static str>() {
            Ok(reference) => return Ok(Self::Deferred((*reference).to_owned())),
            Err(value) => value,
        };
        match value.downcast::<Callable>() {
            Ok(f) => Ok(Self::Callable(*f)),
            Err(_) => Err(Error::InvalidMiddlewareKind),
        }
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Middleware(_) => f.write_str("Middleware"),
            Self::Deferred(reference) => f.debug_tuple("Deferred").field(reference).finish(),
            Self::Callable(_) => f.write_str("Callable"),
        }
    }
}

/// Values accepted by [`Dispatcher::add`].
pub trait IntoLayer {
    fn into_layer(self) -> Result<Layer, Error>;
}

impl IntoLayer for Layer {
    fn into_layer(self) -> Result<Layer, Error> { Ok(self) }
}

/// Any unit, concrete or already erased as a [`BoxedMiddleware`].
impl<M: Middleware> IntoLayer for M {
    fn into_layer(self) -> Result<Layer, Error> { Ok(Layer::middleware(self)) }
}

impl IntoLayer for Callable {
    fn into_layer(self) -> Result<Layer, Error> { Ok(Layer::Callable(self)) }
}

impl IntoLayer for &str {
    fn into_layer(self) -> Result<Layer, Error> { Ok(Layer::Deferred(self.to_owned())) }
}

impl IntoLayer for String {
    fn into_layer(self) -> Result<Layer, Error> { Ok(Layer::Deferred(self)) }
}

impl IntoLayer for Box<dyn Any + Send + Sync> {
    fn into_layer(self) -> Result<Layer, Error> { Layer::from_any(self) }
}

// ── Chain node ────────────────────────────────────────────────────────────────

enum Frame {
    Middleware(BoxedMiddleware),
    Deferred { reference: String, resolver: Arc<dyn Resolver> },
    Callable(Callable),
}

/// One wrapped frame. Immutable once built; owns the handler it wraps.
struct Node {
    frame: Frame,
    next: BoxedHandler,
}

impl RequestHandler for Node {
    fn handle(&self, req: Request) -> BoxFuture<'_> {
        let next = Next::new(Arc::clone(&self.next));

        match &self.frame {
            Frame::Middleware(unit) => unit.process(req, next),
            Frame::Callable(f) => f(req, next),
            Frame::Deferred { reference, resolver } => Box::pin(async move {
                trace!(%reference, "resolving deferred middleware");
                let unit = resolver.resolve(reference).map_err(|source| {
                    debug!(%reference, "deferred middleware could not be resolved: {source}");
                    Error::UnresolvableMiddleware { reference: reference.clone(), source }
                })?;
                unit.process(req, next).await
            }),
        }
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Composes middleware around a kernel and runs requests through the result.
///
/// `S` is an optional shared context handed to callables registered with
/// [`add_with_state`](Dispatcher::add_with_state).
///
/// ```rust
/// use strata::{Dispatcher, Next, Registry, Request, Response};
///
/// # async fn demo() -> Result<(), strata::Error> {
/// async fn kernel(_req: Request) -> Response {
///     Response::text("K")
/// }
///
/// let mut app = Dispatcher::new(kernel, Registry::new());
/// app.add_callable(|req: Request, next: Next| async move {
///     let res = next.run(req).await?;
///     let mut body = res.body().to_vec();
///     body.extend_from_slice(b"-A");
///     Ok::<_, strata::Error>(res.with_body(body))
/// });
///
/// let res = app.handle(Request::new(strata::Method::GET, "/".parse().unwrap())).await?;
/// assert_eq!(res.body(), "K-A");
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher<S = ()> {
    tip: BoxedHandler,
    resolver: Arc<dyn Resolver>,
    state: S,
    depth: usize,
}

impl Dispatcher<()> {
    /// A chain consisting of `kernel` alone.
    pub fn new(kernel: impl Handler, resolver: impl Resolver) -> Self {
        Self::with_state(kernel, resolver, ())
    }
}

impl<S> Dispatcher<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Like [`new`](Dispatcher::new), with a context bound into every
    /// callable registered through [`add_with_state`](Dispatcher::add_with_state).
    pub fn with_state(kernel: impl Handler, resolver: impl Resolver, state: S) -> Self {
        Self {
            tip: kernel.into_boxed_handler(),
            resolver: Arc::new(resolver),
            state,
            depth: 0,
        }
    }

    /// Registers a value of any accepted shape.
    ///
    /// Fails with [`Error::InvalidMiddlewareKind`] when the value matches no
    /// shape; the chain is left exactly as it was.
    pub fn add(&mut self, value: impl IntoLayer) -> Result<&mut Self, Error> {
        let layer = value.into_layer()?;
        Ok(self.add_layer(layer))
    }

    /// Registers an already classified value.
    pub fn add_layer(&mut self, layer: Layer) -> &mut Self {
        match layer {
            Layer::Middleware(unit) => self.push(Frame::Middleware(unit), "middleware"),
            Layer::Deferred(reference) => self.add_deferred(reference),
            Layer::Callable(f) => self.push(Frame::Callable(f), "callable"),
        }
    }

    /// Wraps the chain in a ready unit.
    pub fn add_middleware(&mut self, unit: impl Middleware) -> &mut Self {
        self.push(Frame::Middleware(Arc::new(unit)), "middleware")
    }

    /// Wraps the chain in a frame resolved by name at dispatch time.
    ///
    /// The resolver is not consulted here. It runs each time a request
    /// reaches the frame, and a failure surfaces from [`handle`](Dispatcher::handle)
    /// as [`Error::UnresolvableMiddleware`].
    pub fn add_deferred(&mut self, reference: impl Into<String>) -> &mut Self {
        let reference = reference.into();
        debug!(%reference, depth = self.depth + 1, "deferred middleware registered");
        let frame = Frame::Deferred { reference, resolver: Arc::clone(&self.resolver) };
        self.wrap(frame)
    }

    /// Wraps the chain in a plain `(request, next)` function.
    pub fn add_callable<F, Fut, R>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResult + Send + 'static,
    {
        self.push(Frame::Callable(middleware::callable(f)), "callable")
    }

    /// Wraps the chain in a `(state, request, next)` function; the
    /// dispatcher's context is cloned into every call.
    pub fn add_with_state<F, Fut, R>(&mut self, f: F) -> &mut Self
    where
        F: Fn(S, Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResult + Send + 'static,
    {
        let state = self.state.clone();
        let f = middleware::callable(move |req, next| f(state.clone(), req, next));
        self.push(Frame::Callable(f), "callable")
    }

    pub fn state(&self) -> &S {
        &self.state
    }
}

impl<S> Dispatcher<S> {
    /// Runs `req` through the whole chain, starting at the tip.
    ///
    /// Each call is an independent traversal; nothing but the units' own
    /// state is shared between calls.
    pub fn handle(&self, req: Request) -> BoxFuture<'_> {
        self.tip.handle(req)
    }

    /// Number of frames wrapped around the kernel.
    pub fn len(&self) -> usize {
        self.depth
    }

    /// True while only the kernel is present.
    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    fn push(&mut self, frame: Frame, kind: &'static str) -> &mut Self {
        debug!(kind, depth = self.depth + 1, "middleware registered");
        self.wrap(frame)
    }

    fn wrap(&mut self, frame: Frame) -> &mut Self {
        let next = Arc::clone(&self.tip);
        self.tip = Arc::new(Node { frame, next });
        self.depth += 1;
        self
    }
}

impl<S> std::fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("depth", &self.depth).finish_non_exhaustive()
    }
}

impl<S: Send + Sync + 'static> RequestHandler for Dispatcher<S> {
    fn handle(&self, req: Request) -> BoxFuture<'_> {
        Dispatcher::handle(self, req)
    }
}

impl<S: Send + Sync + 'static> private::Sealed for Dispatcher<S> {}

impl<S: Send + Sync + 'static> Handler for Dispatcher<S> {
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(self)
    }
}
