//! # strata
//!
//! Onion-style middleware dispatch for HTTP services behind a reverse proxy.
//!
//! ## The contract
//!
//! A [`Dispatcher`] wraps a *kernel* (your application handler) in frames of
//! middleware. Each frame sees the request on the way in, may answer it
//! itself, and sees the response on the way out. The frame registered last
//! runs first.
//!
//! A frame can be registered three ways, all with the same runtime contract:
//!
//! - a ready [`Middleware`] unit — [`Dispatcher::add_middleware`]
//! - a name resolved lazily through a [`Resolver`] — [`Dispatcher::add_deferred`]
//! - a plain `(request, next)` async function — [`Dispatcher::add_callable`]
//!
//! [`Dispatcher::add`] accepts any of the three and rejects anything else
//! with [`Error::InvalidMiddlewareKind`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use strata::middleware::{Recover, Trace};
//! use strata::{Dispatcher, Registry, Request, Response, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), strata::Error> {
//!     let mut registry = Registry::new();
//!     registry.register("trace", Trace::new);
//!
//!     let mut app = Dispatcher::new(kernel, registry);
//!     app.add_middleware(Recover::new());
//!     app.add("trace")?;
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn kernel(req: Request) -> Response {
//!     Response::text(format!("hello from {}", req.path()))
//! }
//! ```

mod dispatcher;
mod error;
mod handler;
mod request;
mod resolver;
mod response;
mod server;

pub mod middleware;

pub use dispatcher::{Dispatcher, IntoLayer, Layer};
pub use error::{BoxError, Error, ResolveError};
pub use handler::{BoxFuture, BoxedHandler, Handler, HandlerResult, IntoResult, Next, RequestHandler, boxed};
pub use middleware::{BoxedMiddleware, Callable, Middleware};
pub use request::Request;
pub use resolver::{Registry, Resolver};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use server::{DEFAULT_BODY_LIMIT, Server};

pub use http::{HeaderValue, Method, StatusCode, Uri, header};
