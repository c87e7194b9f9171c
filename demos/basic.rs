//! Minimal strata example: a kernel wrapped in built-in and custom middleware.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i -H 'authorization: Bearer t' http://localhost:3000/users/42
//!   curl -i -H 'authorization: Bearer t' http://localhost:3000/fail

use strata::middleware::{Recover, RequestId, RequireHeader, Trace};
use strata::{Dispatcher, Error, HeaderValue, Next, Registry, Request, Response, Server};

#[derive(Clone)]
struct AppState {
    name: &'static str,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    // Named units are resolved when a request reaches them. `RequestId`
    // counts requests, so every resolution must return the same instance.
    let mut registry = Registry::new();
    registry
        .instance("request-id", RequestId::new())
        .register("trace", Trace::new);

    let mut app = Dispatcher::with_state(kernel, registry, AppState { name: "strata-demo" });

    // Registered first, so it runs last on the way in and wraps the kernel.
    app.add_middleware(RequireHeader::authorization())
        .add_with_state(served_by)
        .add_middleware(Recover::new());
    app.add("request-id")?.add("trace")?;

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

// Callable middleware with the shared context bound in.
async fn served_by(state: AppState, req: Request, next: Next) -> Result<Response, Error> {
    let mut res = next.run(req).await?;
    res.headers_mut().insert("x-served-by", HeaderValue::from_static(state.name));
    Ok(res)
}

async fn kernel(req: Request) -> Result<Response, Error> {
    if req.path() == "/fail" {
        return Err(Error::handler("the kernel gave up"));
    }
    Ok(Response::json(format!(r#"{{"path":"{}"}}"#, req.path())))
}
