//! Integration tests for the HTTP server over real sockets.
//!
//! Each test binds `127.0.0.1:0`, waits for readiness and talks raw
//! HTTP/1.1 through a std `TcpStream`.

use std::io::Write;

use brrtweb::config::AppConfig;
use brrtweb::server::ServerHandle;
use brrtweb::App;

mod common;
use common::http::{connect, read_head, read_response, send_request, status_of};
use common::test_server::setup_may_runtime;

/// Running server stopped on drop.
struct TestServer {
    handle: Option<ServerHandle>,
}

impl TestServer {
    fn start(app: &App) -> Self {
        setup_may_runtime();
        let handle = app.start("127.0.0.1:0").unwrap();
        handle.wait_ready().unwrap();
        Self {
            handle: Some(handle),
        }
    }

    fn addr(&self) -> std::net::SocketAddr {
        self.handle.as_ref().unwrap().local_addr()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

fn demo_app(config: AppConfig) -> App {
    let mut app = App::with_config(config);
    app.get("/hello/{name}", |ctx| {
        let name = ctx.param("name");
        ctx.text(&format!("hello {name}"));
        Ok(())
    })
    .post("/echo", |ctx| {
        let body = ctx.request().body.clone();
        ctx.binary(body, "application/octet-stream");
        Ok(())
    });
    app
}

#[test]
fn test_basic_get() {
    let server = TestServer::start(&demo_app(AppConfig::default()));
    let (head, body) = send_request(
        server.addr(),
        "GET /hello/world HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    assert_eq!(status_of(&head), 200);
    assert!(head.contains("Server: brrtweb") || head.contains("server: brrtweb"));
    assert!(head.contains("Content-Type: text/plain;charset=utf-8"));
    assert!(head.contains("Connection: close"));
    assert_eq!(body, "hello world");
}

#[test]
fn test_not_found() {
    let server = TestServer::start(&demo_app(AppConfig::default()));
    let (head, body) = send_request(
        server.addr(),
        "GET /nowhere HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    assert_eq!(status_of(&head), 404);
    assert_eq!(body, "404 page not found");
}

#[test]
fn test_keep_alive_serves_multiple_requests() {
    let server = TestServer::start(&demo_app(AppConfig::default()));
    let mut stream = connect(server.addr());

    for name in ["a", "b", "c"] {
        let req = format!("GET /hello/{name} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        stream.write_all(req.as_bytes()).unwrap();
        let (head, body) = read_response(&mut stream);
        assert_eq!(status_of(&head), 200);
        assert!(head.contains("Connection: keep-alive"));
        assert_eq!(body, format!("hello {name}"));
    }
}

#[test]
fn test_pipelined_requests() {
    let server = TestServer::start(&demo_app(AppConfig::default()));
    let mut stream = connect(server.addr());
    stream
        .write_all(
            b"GET /hello/x HTTP/1.1\r\nHost: a\r\n\r\nGET /hello/y HTTP/1.1\r\nHost: a\r\n\r\n",
        )
        .unwrap();
    assert_eq!(read_response(&mut stream).1, "hello x");
    assert_eq!(read_response(&mut stream).1, "hello y");
}

#[test]
fn test_post_body_round_trip() {
    let server = TestServer::start(&demo_app(AppConfig::default()));
    let payload = "some bytes to echo";
    let req = format!(
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    let (head, body) = send_request(server.addr(), &req);
    assert_eq!(status_of(&head), 200);
    assert!(head.contains("Content-Type: application/octet-stream"));
    assert_eq!(body, payload);
}

#[test]
fn test_body_over_limit_is_rejected() {
    let mut config = AppConfig::default();
    config.server.max_body_size = 8;
    let server = TestServer::start(&demo_app(config));
    let (head, _) = send_request(
        server.addr(),
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 100\r\n\r\n",
    );
    assert_eq!(status_of(&head), 413);
}

#[test]
fn test_malformed_request_is_rejected() {
    let server = TestServer::start(&demo_app(AppConfig::default()));
    let (head, _) = send_request(server.addr(), "NOT A REQUEST\r\n\r\n");
    assert_eq!(status_of(&head), 400);
}

#[test]
fn test_chunked_is_not_implemented() {
    let server = TestServer::start(&demo_app(AppConfig::default()));
    let (head, _) = send_request(
        server.addr(),
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n",
    );
    assert_eq!(status_of(&head), 501);
}

#[test]
fn test_head_has_length_but_no_body() {
    let mut app = demo_app(AppConfig::default());
    app.head("/hello/{name}", |ctx| {
        ctx.text("twelve bytes");
        Ok(())
    });
    let server = TestServer::start(&app);
    let mut stream = connect(server.addr());
    stream
        .write_all(b"HEAD /hello/x HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .unwrap();
    let head = read_head(&mut stream);
    assert_eq!(status_of(&head), 200);
    assert!(head.contains("Content-Length: 12"));

    // the connection stays usable: the next response starts right away
    stream
        .write_all(b"GET /hello/z HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .unwrap();
    let (head, body) = read_response(&mut stream);
    assert_eq!(status_of(&head), 200);
    assert_eq!(body, "hello z");
}

#[test]
fn test_handler_error_without_recovery_is_500() {
    let mut app = demo_app(AppConfig::default());
    app.get("/boom", |_ctx| Err(brrtweb::Error::custom("boom")));
    let server = TestServer::start(&app);
    let (head, body) = send_request(
        server.addr(),
        "GET /boom HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    assert_eq!(status_of(&head), 500);
    assert_eq!(body, "500 internal server error");
}
