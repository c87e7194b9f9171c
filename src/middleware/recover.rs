use std::sync::Arc;

use http::StatusCode;
use tracing::{error, warn};

use crate::error::Error;
use crate::handler::{BoxFuture, Next};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;

type Mapper = Arc<dyn Fn(&Error) -> Response + Send + Sync>;

/// Error translation.
///
/// Anything the inner chain raises becomes a response here instead of
/// reaching the server. Register it early so it wraps as much of the chain
/// as possible: being registered first, it runs last on the way in and
/// sees every inner error on the way out.
#[derive(Clone)]
pub struct Recover {
    mapper: Mapper,
}

impl Recover {
    /// Answers every error with a bare `500 Internal Server Error`.
    pub fn new() -> Self {
        Self::with(|_| Response::status(StatusCode::INTERNAL_SERVER_ERROR))
    }

    /// Answers errors with whatever `mapper` builds.
    pub fn with<F>(mapper: F) -> Self
    where
        F: Fn(&Error) -> Response + Send + Sync + 'static,
    {
        Self { mapper: Arc::new(mapper) }
    }
}

impl Default for Recover {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Recover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recover").finish_non_exhaustive()
    }
}

impl Middleware for Recover {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_> {
        Box::pin(async move {
            match next.run(req).await {
                Ok(res) => Ok(res),
                Err(e) => {
                    if e.is_config() {
                        error!("middleware chain misconfigured: {e}");
                    } else {
                        warn!("recovered from handler error: {e}");
                    }
                    Ok((self.mapper)(&e))
                }
            }
        })
    }
}
