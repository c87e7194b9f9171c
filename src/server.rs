//! HTTP server and graceful shutdown.
//!
//! The server is the serve phase of an application: it takes a fully built
//! chain (usually a [`Dispatcher`](crate::Dispatcher)), shares it across
//! connection tasks behind an `Arc`, and runs one independent traversal per
//! request.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` before sending SIGKILL. [`Server::serve`]
//! stops accepting on the first signal, lets every in-flight connection run
//! to completion, then returns.
//!
//! # Request bodies
//!
//! Bodies are buffered before the chain runs, up to
//! [`DEFAULT_BODY_LIMIT`] bytes unless [`Server::body_limit`] says otherwise.
//! A larger body is answered with `413` and never reaches the chain.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler, RequestHandler};
use crate::request::Request;
use crate::response::Response;

/// Largest request body buffered by default: 2 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Where the server accepts connections from.
enum Bind {
    Addr(SocketAddr),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
    body_limit: usize,
}

impl Server {
    /// Configures the server to bind to `addr` when it starts serving.
    ///
    /// ```rust,no_run
    /// use strata::Server;
    /// # fn main() -> Result<(), strata::Error> {
    /// let server = Server::bind("0.0.0.0:3000")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        Ok(Self::with_bind(Bind::Addr(addr.parse()?)))
    }

    /// Serves on an already bound listener (e.g. `127.0.0.1:0` in tests).
    pub fn from_listener(listener: TcpListener) -> Self {
        Self::with_bind(Bind::Listener(listener))
    }

    /// Caps the buffered request body at `bytes`.
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    fn with_bind(bind: Bind) -> Self {
        Self { bind, body_limit: DEFAULT_BODY_LIMIT }
    }

    /// Serves `app` until SIGTERM or Ctrl-C, then drains in-flight requests.
    pub async fn serve(self, app: impl Handler) -> Result<(), Error> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Serves `app` until `signal` resolves, then drains in-flight requests.
    pub async fn serve_with_shutdown<F>(self, app: impl Handler, signal: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr).await?,
            Bind::Listener(listener) => listener,
        };
        let app: BoxedHandler = app.into_boxed_handler();
        let body_limit = self.body_limit;

        info!(addr = %listener.local_addr()?, body_limit, "strata listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown is checked first so a signal stops accepting at
                // once, even with connections still queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = BoxedHandler::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let app = BoxedHandler::clone(&app);
                            async move { dispatch(app, req, remote_addr, body_limit).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("strata stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Runs one request through `app`.
///
/// The chain itself never translates errors. Whatever escapes it is logged
/// here and answered with `500`, so hyper never sees an error.
async fn dispatch(
    app: BoxedHandler,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
    body_limit: usize,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, body_limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(peer = %remote_addr, body_limit, "request body too large");
            return Ok(Response::status(StatusCode::PAYLOAD_TOO_LARGE).into_http());
        }
        Err(e) => {
            warn!(peer = %remote_addr, "{}", Error::Body(e));
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_http());
        }
    };

    let response = match app.handle(Request::from_parts(parts, body)).await {
        Ok(res) => res,
        Err(e) => {
            error!(peer = %remote_addr, config = e.is_config(), "unhandled error: {e}");
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    Ok(response.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C only on Windows).
///
/// A signal that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
