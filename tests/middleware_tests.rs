//! Shipped middleware wired into a real engine.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::{Method, Request, StatusCode};
use std::sync::Arc;
use whisk::middleware::{
    basic_auth, error_logger, logger, recovery, request_id, Accounts, Metrics, RequestId,
    AUTH_USER_KEY, REQUEST_ID_KEY,
};
use whisk::{handlers, Context, Engine, EngineConfig};

mod common;
use common::log_capture::LogCapture;
use common::{body_str, get, header, request};

fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

fn admin_engine() -> Engine {
    let accounts: Accounts = [
        ("foo".to_string(), "bar".to_string()),
        ("admin".to_string(), "s3cret".to_string()),
    ]
    .into_iter()
    .collect();

    let mut engine = Engine::new(EngineConfig::default());
    engine.get("/public", handlers![|c: &mut Context| c.string(200, "hi")]);
    let mut admin = engine.group("/admin", handlers![basic_auth(accounts)]);
    admin.get(
        "/whoami",
        handlers![|c: &mut Context| {
            let user = c.get_as::<String>(AUTH_USER_KEY).cloned().unwrap_or_default();
            c.string(200, user);
        }],
    );
    engine
}

#[test]
fn test_basic_auth_only_guards_its_group() {
    let engine = admin_engine();

    assert_eq!(get(&engine, "/public").status(), StatusCode::OK);

    let res = get(&engine, "/admin/whoami");
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        header(&res, "www-authenticate"),
        Some("Basic realm=\"Authorization Required\"")
    );

    for (user, password, expected) in [("admin", "s3cret", "admin"), ("foo", "bar", "foo")] {
        let req = Request::get("/admin/whoami")
            .header("authorization", basic(user, password))
            .body(Vec::new())
            .unwrap();
        let res = engine.serve(req);
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_str(&res), expected);
    }

    let req = Request::get("/admin/whoami")
        .header("authorization", basic("admin", "wrong"))
        .body(Vec::new())
        .unwrap();
    assert_eq!(engine.serve(req).status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn test_request_id_round_trip() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.use_middleware(handlers![request_id()]);
    engine.get(
        "/id",
        handlers![|c: &mut Context| {
            let id = c
                .get_as::<RequestId>(REQUEST_ID_KEY)
                .map(ToString::to_string)
                .unwrap_or_default();
            c.string(200, id);
        }],
    );

    let res = get(&engine, "/id");
    let generated = header(&res, "x-request-id").unwrap().to_owned();
    assert_eq!(generated.len(), 26);
    assert_eq!(body_str(&res), generated);

    let req = Request::get("/id")
        .header("x-request-id", "upstream-7")
        .body(Vec::new())
        .unwrap();
    let res = engine.serve(req);
    assert_eq!(header(&res, "x-request-id"), Some("upstream-7"));

    // fallbacks run the global middleware too
    let res = get(&engine, "/missing");
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(header(&res, "x-request-id").is_some());
}

#[test]
fn test_logger_emits_one_event_per_request() {
    let capture = LogCapture::start();

    let mut engine = Engine::new(EngineConfig::default());
    engine.use_middleware(handlers![request_id(), logger()]);
    engine.get("/users/:id", handlers![|c: &mut Context| c.string(200, "user")]);
    engine.get(
        "/broken",
        handlers![|c: &mut Context| c.fail(503, "backend down")],
    );

    let req = Request::get("/users/5?full=1")
        .header("x-request-id", "req-1")
        .header("x-real-ip", "10.1.2.3")
        .body(Vec::new())
        .unwrap();
    engine.serve(req);
    get(&engine, "/broken");
    get(&engine, "/nowhere");

    let events = capture.events("Request handled");
    assert_eq!(events.len(), 3);

    let ok = &events[0];
    assert_eq!(ok["level"], "INFO");
    assert_eq!(ok["fields"]["method"], "GET");
    assert_eq!(ok["fields"]["path"], "/users/5?full=1");
    assert_eq!(ok["fields"]["route"], "/users/:id");
    assert_eq!(ok["fields"]["status"], 200);
    assert_eq!(ok["fields"]["client_ip"], "10.1.2.3");
    assert_eq!(ok["fields"]["request_id"], "req-1");
    assert_eq!(ok["fields"]["bytes"], 4);

    let failed = &events[1];
    assert_eq!(failed["level"], "ERROR");
    assert_eq!(failed["fields"]["status"], 503);
    assert_eq!(failed["fields"]["errors"], "backend down");

    let missing = &events[2];
    assert_eq!(missing["level"], "WARN");
    assert_eq!(missing["fields"]["status"], 404);
    assert_eq!(missing["fields"]["route"], "");
}

#[test]
fn test_recovery_logs_panic() {
    let capture = LogCapture::start();

    let mut engine = Engine::new(EngineConfig::default());
    engine.use_middleware(handlers![recovery()]);
    engine.post("/explode", handlers![|_: &mut Context| panic!("kaboom")]);

    let res = engine.serve(request(Method::POST, "/explode"));
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let errors: Vec<_> = capture
        .lines()
        .into_iter()
        .filter(|line| line["level"] == "ERROR")
        .collect();
    assert!(!errors.is_empty());
    assert!(errors[0].to_string().contains("kaboom"));
    // captured even when RUST_BACKTRACE is unset
    let backtrace = errors[0]["fields"]["backtrace"].as_str().unwrap();
    assert_ne!(backtrace, "disabled backtrace");
}

#[test]
fn test_error_logger_reports_recorded_errors() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.use_middleware(handlers![error_logger()]);
    engine.post(
        "/items",
        handlers![|c: &mut Context| {
            c.error("name is required", Some(serde_json::json!({ "field": "name" })));
            c.abort(400);
        }],
    );

    let res = engine.serve(request(Method::POST, "/items"));
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let errors: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(
        errors,
        serde_json::json!([{ "err": "name is required", "meta": { "field": "name" } }])
    );
}

#[test]
fn test_metrics_count_routes_statuses_and_panics() {
    let metrics = Arc::new(Metrics::new());
    let mut engine = Engine::new(EngineConfig::default());
    engine.use_middleware(vec![metrics.handler(), recovery()]);
    engine.get("/users/:id", handlers![|c: &mut Context| c.string(200, "u")]);
    engine.get("/panic", handlers![|_: &mut Context| panic!("counted")]);
    engine.get("/metrics", vec![metrics.endpoint()]);

    for id in 0..3 {
        get(&engine, &format!("/users/{id}"));
    }
    get(&engine, "/nope");
    get(&engine, "/panic");

    let snap = metrics.snapshot();
    assert_eq!(snap.request_count, 5);
    assert_eq!(snap.in_flight, 0);
    assert_eq!(snap.status_classes, [0, 3, 0, 1, 1]);
    assert_eq!(snap.panics, 1);
    assert_eq!(metrics.route_count("/users/:id"), 3);
    assert_eq!(metrics.route_count("<unmatched>"), 1);

    let res = get(&engine, "/metrics");
    assert_eq!(res.status(), StatusCode::OK);
    let text = body_str(&res);
    assert!(text.contains("whisk_requests_total 5"));
    assert!(text.contains("whisk_route_requests_total{route=\"/users/:id\"} 3"));
    assert!(text.contains("whisk_panics_total 1"));
}
