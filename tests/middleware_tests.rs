//! Built-in middlewares exercised through a dispatcher: recovery, CORS,
//! header, logger and sessions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use brrtweb::middleware::{CorsMiddleware, HeaderMiddleware};
use brrtweb::server::Request;
use brrtweb::session::{
    self, MemoryProvider, Provider, Session, SessionConfig, SessionListener, MEMORY_COOKIE_NAME,
};
use brrtweb::{App, Error};
use http::Method;
use serde_json::{json, Value};

mod common;
use common::logs;

fn get(path: &str) -> Request {
    Request::new(Method::GET, path)
}

#[test]
fn test_recovery_turns_error_into_json_500() {
    let mut app = App::new();
    app.use_recovery()
        .get("/fail", |_ctx| Err(Error::custom("database down")));
    let res = app.build().serve(get("/fail")).unwrap();

    assert_eq!(res.status, 500);
    assert_eq!(res.content_type, brrtweb::mime::JSON);
    assert_eq!(res.body_str(), r#"{"code":500,"message":"database down"}"#);
}

#[test]
fn test_recovery_catches_panics() {
    let mut app = App::new();
    app.use_recovery().get("/panic", |_ctx| panic!("kaboom"));
    let d = app.build();

    let res = d.serve(get("/panic")).unwrap();
    assert_eq!(res.status, 500);
    let body: Value = serde_json::from_str(&res.body_str()).unwrap();
    assert_eq!(body["message"], "kaboom");

    // the context went back to the pool and keeps serving
    let res = d.serve(get("/missing")).unwrap();
    assert_eq!(res.status, 404);
}

#[test]
fn test_recovery_config_renames_fields() {
    let mut app = App::new();
    app.recovery_config("status", 9001, "error")
        .get("/fail", |_ctx| Err(Error::custom("x")));
    let res = app.build().serve(get("/fail")).unwrap();
    assert_eq!(res.body_str(), r#"{"status":9001,"error":"x"}"#);
}

#[test]
fn test_recovery_custom_handler() {
    let mut app = App::new();
    app.recovery_handler(|ctx, msg| {
        ctx.status(503).text(&format!("sorry: {msg}"));
        Ok(())
    })
    .get("/fail", |_ctx| Err(Error::custom("overloaded")));
    let res = app.build().serve(get("/fail")).unwrap();
    assert_eq!(res.status, 503);
    assert_eq!(res.body_str(), "sorry: overloaded");
}

#[test]
fn test_cors_preflight_short_circuits() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);

    let mut app = App::new();
    app.use_cors(CorsMiddleware::new().allow_headers(&["Content-Type"]))
        .any("/data", move |ctx| {
            h.fetch_add(1, Ordering::SeqCst);
            ctx.text("data");
            Ok(())
        });
    let d = app.build();

    let res = d.serve(Request::new(Method::OPTIONS, "/data")).unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body_len(), 0);
    assert_eq!(res.header("access-control-allow-origin"), Some("*"));
    assert_eq!(
        res.header("access-control-allow-methods"),
        Some("GET, POST, DELETE, PUT, PATCH, HEAD, OPTIONS")
    );
    assert_eq!(res.header("allow"), Some("GET, POST, DELETE, PUT, PATCH, HEAD, OPTIONS"));
    assert_eq!(res.header("access-control-allow-headers"), Some("Content-Type"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let res = d.serve(get("/data")).unwrap();
    assert_eq!(res.body_str(), "data");
    assert_eq!(res.header("access-control-allow-origin"), Some("*"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cors_custom_origin_and_extra_headers() {
    let mut app = App::new();
    app.use_cors(
        CorsMiddleware::new()
            .origin("https://example.com")
            .methods(&["GET", "POST"])
            .header("Access-Control-Max-Age", "600"),
    )
    .get("/", |_ctx| Ok(()));
    let res = app.build().serve(get("/")).unwrap();

    assert_eq!(
        res.header("access-control-allow-origin"),
        Some("https://example.com")
    );
    let methods: Vec<&str> = res
        .headers
        .get_all("access-control-allow-methods")
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(methods, vec!["GET", "POST"]);
    assert_eq!(res.header("access-control-max-age"), Some("600"));
}

#[test]
fn test_header_middleware_custom_headers() {
    let mut app = App::new();
    app.header(false)
        .use_middleware(
            HeaderMiddleware::new()
                .with("Server", "custom")
                .with("X-Frame-Options", "DENY"),
        )
        .get("/", |_ctx| Ok(()));
    let res = app.build().serve(get("/")).unwrap();
    assert_eq!(res.header("server"), Some("custom"));
    assert_eq!(res.header("x-frame-options"), Some("DENY"));
}

#[test]
fn test_logger_records_completed_request() {
    let (sink, _guard) = logs::capture();

    let mut app = App::new();
    app.use_logger().get("/logged", |ctx| {
        ctx.status(202).text("ok");
        Ok(())
    });
    let req = get("/logged?x=1").with_header("user-agent", "tests/1.0");
    app.build().serve(req).unwrap();

    let out = sink.contents();
    let line = out
        .lines()
        .find(|l| l.contains("Request completed"))
        .expect("logger event");
    let event: Value = serde_json::from_str(line).unwrap();
    let fields = &event["fields"];
    assert_eq!(fields["status"], 202);
    assert_eq!(fields["method"], "GET");
    assert_eq!(fields["uri"], "/logged?x=1");
    assert_eq!(fields["user_agent"], "tests/1.0");
    assert_eq!(fields["bytes"], 2);
}

fn session_cookie(res: &brrtweb::Response) -> String {
    res.cookies
        .iter()
        .find(|c| c.to_string().starts_with(MEMORY_COOKIE_NAME))
        .map(|c| c.to_string())
        .expect("session cookie")
}

fn cookie_value(set_cookie: &str) -> String {
    let pair = set_cookie.split(';').next().unwrap();
    pair.split_once('=').unwrap().1.to_string()
}

#[test]
fn test_session_cookie_and_persistence() {
    let provider = Arc::new(MemoryProvider::new());
    let created = Arc::new(AtomicUsize::new(0));
    let refreshed = Arc::new(AtomicUsize::new(0));
    let (c, r) = (Arc::clone(&created), Arc::clone(&refreshed));

    let mut app = App::new();
    app.use_session(
        Arc::clone(&provider) as Arc<dyn Provider>,
        SessionConfig::default(),
        SessionListener::new()
            .on_created(move |_: &dyn Session| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .on_refreshed(move |_: &dyn Session| {
                r.fetch_add(1, Ordering::SeqCst);
            }),
    )
    .get("/count", |ctx| {
        let session = session::current(ctx).ok_or_else(|| Error::custom("no session"))?;
        let n = session.get("n").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
        session.set("n", json!(n));
        ctx.text(&n.to_string());
        Ok(())
    });
    let d = app.build();

    let first = d.serve(get("/count")).unwrap();
    assert_eq!(first.body_str(), "1");
    let set_cookie = session_cookie(&first);
    assert!(set_cookie.contains("; Path=/"));
    assert!(set_cookie.contains("; Expires="));
    let id = cookie_value(&set_cookie);
    assert!(provider.exists(&id));

    let cookie = format!("{MEMORY_COOKIE_NAME}={id}");
    let second = d
        .serve(get("/count").with_header("cookie", &cookie))
        .unwrap();
    assert_eq!(second.body_str(), "2");
    assert_eq!(cookie_value(&session_cookie(&second)), id);

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(refreshed.load(Ordering::SeqCst), 1);
    assert_eq!(provider.len(), 1);
}

#[test]
fn test_unknown_session_id_gets_new_session() {
    let provider = Arc::new(MemoryProvider::new());
    let mut app = App::new();
    app.use_session(
        Arc::clone(&provider) as Arc<dyn Provider>,
        SessionConfig::default(),
        SessionListener::new(),
    )
    .get("/", |_ctx| Ok(()));
    let d = app.build();

    let cookie = format!("{MEMORY_COOKIE_NAME}=stale");
    let res = d.serve(get("/").with_header("cookie", &cookie)).unwrap();
    assert_ne!(cookie_value(&session_cookie(&res)), "stale");
    assert_eq!(provider.len(), 1);
}

#[test]
fn test_expired_sessions_are_cleaned_in_background() {
    let provider = Arc::new(MemoryProvider::new());
    let destroyed = Arc::new(AtomicUsize::new(0));
    let x = Arc::clone(&destroyed);
    let config = SessionConfig {
        valid: Duration::from_millis(20),
        clean_interval: Duration::from_millis(10),
    };

    let mut app = App::new();
    app.use_session(
        Arc::clone(&provider) as Arc<dyn Provider>,
        config,
        SessionListener::new().on_destroyed(move |_: &dyn Session| {
            x.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .get("/", |_ctx| Ok(()));
    let d = app.build();
    d.serve(get("/")).unwrap();
    assert_eq!(provider.len(), 1);

    let mut waited = Duration::ZERO;
    while destroyed.load(Ordering::SeqCst) == 0 && waited < Duration::from_secs(2) {
        std::thread::sleep(Duration::from_millis(10));
        waited += Duration::from_millis(10);
    }
    assert!(provider.is_empty());
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}
