use std::time::Instant;

use tracing::{Instrument, error, info, info_span};

use crate::handler::{BoxFuture, Next};
use crate::middleware::Middleware;
use crate::request::Request;

/// Opens one `request` span per traversal and logs how it ended.
///
/// Errors are logged and then re-raised unchanged; translating them is
/// [`Recover`](super::Recover)'s job.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Trace {
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for Trace {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_> {
        let span = info_span!("request", method = %req.method(), path = %req.path());

        Box::pin(
            async move {
                let started = Instant::now();
                let result = next.run(req).await;
                let latency_ms = started.elapsed().as_millis() as u64;

                match &result {
                    Ok(res) => info!(status = res.status_code().as_u16(), latency_ms, "request finished"),
                    Err(e) => error!(latency_ms, "request failed: {e}"),
                }
                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::handler::Handler;
    use http::{Method, StatusCode, Uri};

    fn req() -> Request {
        Request::new(Method::GET, Uri::from_static("/trace"))
    }

    #[tokio::test]
    async fn passes_response_through() {
        let next = Next::new((|_req: Request| async { StatusCode::IM_A_TEAPOT }).into_boxed_handler());
        let res = Trace::new().process(req(), next).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn re_raises_errors() {
        let next = Next::new(
            (|_req: Request| async { Err::<&'static str, _>(Error::handler("boom")) })
                .into_boxed_handler(),
        );
        let err = Trace::new().process(req(), next).await.unwrap_err();
        assert_eq!(err.to_string(), "handler: boom");
    }
}
