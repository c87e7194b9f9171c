//! End-to-end: a built dispatcher served over a real socket.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use strata::middleware::{Recover, RequestId, RequireHeader};
use strata::{Dispatcher, Error, Registry, Request, Response, Server};

async fn kernel(req: Request) -> Result<Response, Error> {
    match req.path() {
        "/boom" => Err(Error::handler("kernel failed")),
        path => Ok(Response::text(format!("{} {path} {}", req.method(), req.body().len()))),
    }
}

async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

async fn spawn(app: Dispatcher) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    spawn_with(app, |server| server).await
}

async fn spawn_with(
    app: Dispatcher,
    configure: impl FnOnce(Server) -> Server,
) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    let server = configure(Server::from_listener(listener));

    let handle = tokio::spawn(async move {
        server
            .serve_with_shutdown(app, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    (addr, tx, handle)
}

#[tokio::test]
async fn serves_requests_through_the_chain() {
    let mut registry = Registry::new();
    registry.instance("request-id", RequestId::with_prefix("e2e"));

    let mut app = Dispatcher::new(kernel, registry);
    app.add_middleware(RequireHeader::authorization())
        .add_deferred("request-id");

    let (addr, shutdown, server) = spawn(app).await;

    let ok = roundtrip(
        addr,
        "POST /users HTTP/1.1\r\nhost: test\r\nauthorization: Bearer t\r\n\
         content-length: 5\r\nconnection: close\r\n\r\nhello",
    )
    .await;
    assert!(ok.starts_with("HTTP/1.1 200 OK"), "{ok}");
    assert!(ok.contains("x-request-id: e2e-00000001"), "{ok}");
    assert!(ok.ends_with("POST /users 5"), "{ok}");

    // The shared unit keeps counting across requests.
    let again = roundtrip(
        addr,
        "GET /users HTTP/1.1\r\nhost: test\r\nauthorization: Bearer t\r\nconnection: close\r\n\r\n",
    )
    .await;
    assert!(again.starts_with("HTTP/1.1 200 OK"), "{again}");
    assert!(again.contains("x-request-id: e2e-00000002"), "{again}");

    let denied = roundtrip(addr, "GET /users HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n").await;
    assert!(denied.starts_with("HTTP/1.1 401 Unauthorized"), "{denied}");

    shutdown.send(()).unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn unhandled_errors_become_500() {
    let app = Dispatcher::new(kernel, Registry::new());
    let (addr, shutdown, server) = spawn(app).await;

    let res = roundtrip(addr, "GET /boom HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 500 Internal Server Error"), "{res}");

    shutdown.send(()).unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn recover_answers_for_misconfigured_frames() {
    let mut app = Dispatcher::new(kernel, Registry::new());
    app.add_deferred("Missing\\Class")
        .add_middleware(Recover::with(|e| {
            Response::builder()
                .status(strata::StatusCode::SERVICE_UNAVAILABLE)
                .text(e.to_string())
        }));

    let (addr, shutdown, server) = spawn(app).await;

    let res = roundtrip(addr, "GET / HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 503 Service Unavailable"), "{res}");
    assert!(res.ends_with("unresolvable middleware `Missing\\Class`"), "{res}");

    shutdown.send(()).unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn oversized_bodies_are_rejected_before_the_chain() {
    let mut app = Dispatcher::new(kernel, Registry::new());
    app.add_middleware(RequireHeader::authorization());

    let (addr, shutdown, server) = spawn_with(app, |server| server.body_limit(4)).await;

    let res = roundtrip(
        addr,
        "POST /users HTTP/1.1\r\nhost: test\r\n\
         content-length: 10\r\nconnection: close\r\n\r\n0123456789",
    )
    .await;
    // 413 rather than the 401 the chain would have answered.
    assert!(res.starts_with("HTTP/1.1 413"), "{res}");

    let small = roundtrip(
        addr,
        "POST /users HTTP/1.1\r\nhost: test\r\nauthorization: Bearer t\r\n\
         content-length: 4\r\nconnection: close\r\n\r\nabcd",
    )
    .await;
    assert!(small.ends_with("POST /users 4"), "{small}");

    shutdown.send(()).unwrap();
    server.await.unwrap();
}
