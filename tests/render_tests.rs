//! Rendering through the engine: templates, static files, XML, event
//! streams and request binding.

use http::{Method, Request, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::thread;
use whisk::render::sse::{self, SseEvent};
use whisk::{handlers, Context, Engine, EngineConfig, Mode};

mod common;
use common::{body_str, get, header, request};

fn greet(c: &mut Context) {
    let name = c.param("name").unwrap_or_default().to_owned();
    c.html(200, "hello.html", &serde_json::json!({ "name": name }));
}

#[test]
fn test_html_templates_from_glob() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hello.html"), "<p>Hello {{ name }}!</p>").unwrap();
    fs::create_dir(dir.path().join("partials")).unwrap();
    fs::write(dir.path().join("partials/footer.html"), "<footer/>").unwrap();

    let mut engine = Engine::new(EngineConfig::default());
    engine
        .load_html_glob(&format!("{}/**/*.html", dir.path().display()))
        .unwrap();
    engine.get("/hello/:name", handlers![greet]);
    engine.get(
        "/missing",
        handlers![|c: &mut Context| c.html(200, "nope.html", &())],
    );

    let res = get(&engine, "/hello/gopher");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(body_str(&res), "<p>Hello gopher!</p>");

    let res = get(&engine, "/missing");
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_debug_mode_reloads_templates() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("hello.html");
    fs::write(&file, "v1 {{ name }}").unwrap();

    let mut debug = Engine::new(EngineConfig::default());
    debug.load_html_files(&[&file]).unwrap();
    debug.get("/hello/:name", handlers![greet]);

    let mut release = Engine::new(EngineConfig {
        mode: Mode::Release,
        ..EngineConfig::default()
    });
    release.load_html_files(&[&file]).unwrap();
    release.get("/hello/:name", handlers![greet]);

    assert_eq!(body_str(&get(&debug, "/hello/a")), "v1 a");
    assert_eq!(body_str(&get(&release, "/hello/a")), "v1 a");

    fs::write(&file, "v2 {{ name }}").unwrap();
    assert_eq!(body_str(&get(&debug, "/hello/b")), "v2 b");
    assert_eq!(body_str(&get(&release, "/hello/b")), "v1 b");
}

#[test]
fn test_html_without_templates_is_server_error() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.get("/hello/:name", handlers![greet]);
    assert_eq!(
        get(&engine, "/hello/x").status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_static_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.css"), "body{}").unwrap();
    fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs/readme.txt"), "read me").unwrap();
    fs::write(dir.path().join("blob"), [0_u8, 159, 146, 150]).unwrap();

    let mut engine = Engine::new(EngineConfig::default());
    engine.static_dir("/assets", dir.path());

    let res = get(&engine, "/assets/app.css");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "content-type"), Some("text/css; charset=utf-8"));
    assert_eq!(body_str(&res), "body{}");

    let res = get(&engine, "/assets/docs/readme.txt");
    assert_eq!(header(&res, "content-type"), Some("text/plain; charset=utf-8"));
    assert_eq!(body_str(&res), "read me");

    let res = get(&engine, "/assets/");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_str(&res), "<h1>home</h1>");

    let res = get(&engine, "/assets/blob");
    assert_eq!(header(&res, "content-type"), Some("application/octet-stream"));

    let res = engine.serve(request(Method::HEAD, "/assets/app.css"));
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(get(&engine, "/assets/nope.css").status(), StatusCode::NOT_FOUND);
    assert_eq!(
        get(&engine, "/assets/../Cargo.toml").status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        engine.serve(request(Method::POST, "/assets/app.css")).status(),
        StatusCode::METHOD_NOT_ALLOWED
    );
}

#[test]
#[should_panic(expected = "URL parameters can not be used when serving a static folder")]
fn test_static_dir_rejects_wildcards() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.static_dir("/assets/:version", ".");
}

#[derive(Serialize)]
struct Pet {
    name: String,
    age: u32,
}

#[test]
fn test_json_and_xml_helpers() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.get(
        "/pet.json",
        handlers![|c: &mut Context| {
            c.json(200, &Pet { name: "Rex".into(), age: 3 });
        }],
    );
    engine.get(
        "/pet.xml",
        handlers![|c: &mut Context| {
            let mut map = BTreeMap::new();
            map.insert("name", "Rex");
            c.xml(200, &map);
        }],
    );

    let res = get(&engine, "/pet.json");
    assert_eq!(header(&res, "content-type"), Some("application/json"));
    assert_eq!(body_str(&res), "{\"name\":\"Rex\",\"age\":3}\n");

    let res = get(&engine, "/pet.xml");
    assert_eq!(header(&res, "content-type"), Some("application/xml"));
    assert_eq!(body_str(&res), "<map><name>Rex</name></map>");
}

#[test]
fn test_event_stream_from_channel() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.get(
        "/events",
        handlers![|c: &mut Context| {
            let (tx, rx) = sse::channel();
            let producer = thread::spawn(move || {
                for i in 1..=3 {
                    tx.send(SseEvent::new("tick", i.to_string()).with_id(i.to_string()));
                }
            });
            c.stream_events(&rx);
            producer.join().unwrap();
        }],
    );

    let res = get(&engine, "/events");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "content-type"), Some("text/event-stream"));
    assert_eq!(header(&res, "cache-control"), Some("no-cache"));
    assert_eq!(
        body_str(&res),
        "id: 1\nevent: tick\ndata: 1\n\nid: 2\nevent: tick\ndata: 2\n\nid: 3\nevent: tick\ndata: 3\n\n"
    );
}

#[derive(Debug, Deserialize, PartialEq)]
struct Login {
    user: String,
    remember: Option<bool>,
}

#[test]
fn test_bind_json_through_engine() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.post(
        "/login",
        handlers![|c: &mut Context| match c.bind_json::<Login>() {
            Ok(login) => c.string(200, format!("{}:{:?}", login.user, login.remember)),
            Err(e) => c.fail(400, e),
        }],
    );

    let req = Request::post("/login")
        .header("content-type", "application/json")
        .body(br#"{"user":"ann","remember":true}"#.to_vec())
        .unwrap();
    let res = engine.serve(req);
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_str(&res), "ann:Some(true)");

    let req = Request::post("/login").body(b"{not json".to_vec()).unwrap();
    assert_eq!(engine.serve(req).status(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_form_value_prefers_body_over_query() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.post(
        "/search",
        handlers![|c: &mut Context| {
            let q = c.form_value("q").unwrap_or_default();
            let page = c.query("page").unwrap_or_default();
            c.string(200, format!("{q}|{page}"));
        }],
    );

    let req = Request::post("/search?q=query&page=2")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(b"q=from+body".to_vec())
        .unwrap();
    assert_eq!(body_str(&engine.serve(req)), "from body|2");
}
