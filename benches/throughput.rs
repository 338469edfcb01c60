use criterion::{criterion_group, criterion_main, Criterion};
use http::{Method, Request};
use std::hint::black_box;
use whisk::router::Tree;
use whisk::{handlers, Context, Engine, EngineConfig};

const ROUTES: &[&str] = &[
    "/",
    "/zoo/animals",
    "/zoo/animals/:id",
    "/zoo/animals/:id/toys/:toy_id",
    "/zoo/:category/animals/:id/habitats/:habitat_id/sections/:section_id",
    "/inventory/:warehouse_id/feeds/:feed_id/items/:item_id/batches/:batch_id",
    "/complex/:a/:b/:c/:d/:e/:f/:g/:h/:i",
    "/zoo/health",
    "/static/*filepath",
];

const PATHS: &[&str] = &[
    "/zoo/animals/123",
    "/zoo/animals/123/toys/456",
    "/zoo/cats/animals/123/habitats/88/sections/5",
    "/inventory/1/feeds/2/items/3/batches/4",
    "/complex/1/2/3/4/5/6/7/8/9",
    "/static/css/site.css",
];

fn bench_tree_lookup(c: &mut Criterion) {
    let mut tree = Tree::new();
    for (i, route) in ROUTES.iter().enumerate() {
        tree.add_route(route, i).unwrap();
    }
    c.bench_function("tree_lookup", |b| {
        b.iter(|| {
            for path in PATHS {
                black_box(tree.get_value(black_box(path)));
            }
        })
    });
}

fn bench_engine_serve(c: &mut Criterion) {
    let mut engine = Engine::new(EngineConfig::default());
    for route in ROUTES {
        engine.get(route, handlers![|c: &mut Context| c.string(200, "ok")]);
    }
    c.bench_function("engine_serve", |b| {
        b.iter(|| {
            for path in PATHS {
                let req = Request::builder()
                    .method(Method::GET)
                    .uri(*path)
                    .body(Vec::new())
                    .unwrap();
                black_box(engine.serve(req));
            }
        })
    });
}

criterion_group!(benches, bench_tree_lookup, bench_engine_serve);
criterion_main!(benches);
