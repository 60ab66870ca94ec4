use std::sync::Arc;

use http::Method;

use super::route::compile_placeholders;
use super::{Group, RouteError, RouteTable, Router};
use crate::context::Handler;

fn noop() -> Handler {
    Arc::new(|_ctx| Ok(()))
}

#[test]
fn test_compile_placeholders() {
    let (body, params) = compile_placeholders("/a/{b}/c/{d}");
    assert_eq!(body, r"/a/([\w.-]+)/c/([\w.-]+)");
    assert_eq!(params, vec![Arc::from("b"), Arc::from("d")]);
}

#[test]
fn test_compile_placeholders_escapes_literals() {
    let (body, params) = compile_placeholders("/files/{name}.txt");
    assert_eq!(body, r"/files/([\w.-]+)\.txt");
    assert_eq!(params.len(), 1);
}

#[test]
fn test_exact_and_dynamic_split() {
    let mut r = Router::new();
    r.get("/a", |_| Ok(())).get("/a/{id}", |_| Ok(()));
    assert_eq!(r.exact_routes().len(), 1);
    assert_eq!(r.dynamic_routes().len(), 1);
    assert_eq!(r.exact_routes()[0].path, "/a");
}

#[test]
fn test_wildcard_expands_to_every_method() {
    let mut r = Router::new();
    r.any("/all", |_| Ok(()));
    assert_eq!(r.exact_routes().len(), 7);
    let methods: Vec<_> = r.exact_routes().iter().map(|e| e.method.clone()).collect();
    assert!(methods.contains(&Method::PATCH));
    assert!(methods.contains(&Method::OPTIONS));
}

#[test]
fn test_unsupported_method_is_an_error() {
    let mut r = Router::new();
    let err = r.try_route("TRACE", "/x", noop()).unwrap_err();
    assert_eq!(err, RouteError::UnsupportedMethod("TRACE".to_string()));
    assert_eq!(err.to_string(), "method not supported : TRACE");
    assert!(r.is_empty());
}

#[test]
#[should_panic(expected = "method not supported : get")]
fn test_unsupported_method_panics() {
    let mut r = Router::new();
    r.route("get", "/x", |_| Ok(()));
}

#[test]
fn test_patterns_are_cleaned() {
    let mut r = Router::new();
    r.get(" //us ers//list/ ", |_| Ok(()));
    assert_eq!(r.exact_routes()[0].path, "/users/list");
}

#[test]
fn test_group_prefixing() {
    let mut r = Router::new();
    r.get("/users", |_| Ok(())).get("/users/{id}", |_| Ok(()));
    let table = RouteTable::build(&[], &[Group::new("/api/", vec![r])]);

    assert!(table.resolve(&Method::GET, "/api/users").is_some());
    assert!(table.resolve(&Method::GET, "/users").is_none());
    let m = table.resolve(&Method::GET, "/api/users/7").unwrap();
    assert_eq!(m.param("id"), Some("7"));
    assert_eq!(&*m.pattern, r"^/api/users/([\w.-]+)$");
}

#[test]
fn test_group_root_route_maps_to_prefix() {
    let mut r = Router::new();
    r.get("/", |_| Ok(()));
    let table = RouteTable::build(&[], &[Group::new("/api", vec![r])]);
    assert!(table.resolve(&Method::GET, "/api").is_some());
    assert!(table.resolve(&Method::GET, "/api/").is_some());
}

#[test]
fn test_empty_prefix_group_is_top_level() {
    let mut r = Router::new();
    r.get("/x", |_| Ok(()));
    let g = Group::new("/", vec![r]);
    assert_eq!(g.prefix(), "");
    let table = RouteTable::build(&[], &[g]);
    assert!(table.resolve(&Method::GET, "/x").is_some());
}
