use dashmap::DashMap;
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::context::{Context, Halt};
use crate::handler::HandlerFunc;

const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Request counters shared by every worker.
///
/// ```rust
/// use std::sync::Arc;
/// use whisk::middleware::Metrics;
/// use whisk::Engine;
///
/// let metrics = Arc::new(Metrics::new());
/// let mut engine = Engine::default();
/// engine.use_middleware(vec![metrics.handler()]);
/// engine.get("/metrics", vec![metrics.endpoint()]);
/// ```
#[derive(Debug, Default)]
pub struct Metrics {
    request_count: AtomicUsize,
    in_flight: AtomicUsize,
    total_latency_ns: AtomicU64,
    /// 1xx through 5xx
    status_classes: [AtomicUsize; 5],
    panics: AtomicUsize,
    routes: DashMap<Arc<str>, AtomicUsize>,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub request_count: usize,
    pub in_flight: usize,
    pub average_latency_us: u64,
    pub status_classes: [usize; 5],
    pub panics: usize,
    /// `(route pattern, requests)`, sorted by pattern
    pub routes: Vec<(String, usize)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Requests answered with a status in `class * 100 ..= class * 100 + 99`.
    pub fn status_class(&self, class: u16) -> usize {
        match class {
            1..=5 => self.status_classes[usize::from(class - 1)].load(Ordering::Relaxed),
            _ => 0,
        }
    }

    pub fn panics(&self) -> usize {
        self.panics.load(Ordering::Relaxed)
    }

    /// Requests served by the route registered as `pattern`.
    pub fn route_count(&self, pattern: &str) -> usize {
        self.routes
            .get(pattern)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }

    fn record(&self, route: Option<&str>, status: u16, latency: Duration, panicked: bool) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        if let 1..=5 = status / 100 {
            self.status_classes[usize::from(status / 100 - 1)].fetch_add(1, Ordering::Relaxed);
        }
        if panicked {
            self.panics.fetch_add(1, Ordering::Relaxed);
        }
        let route = route.unwrap_or(UNMATCHED_ROUTE);
        match self.routes.get(route) {
            Some(count) => {
                count.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.routes
                    .entry(Arc::from(route))
                    .or_default()
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut routes: Vec<(String, usize)> = self
            .routes
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().load(Ordering::Relaxed)))
            .collect();
        routes.sort();
        MetricsSnapshot {
            request_count: self.request_count(),
            in_flight: self.in_flight(),
            average_latency_us: self.average_latency().as_micros() as u64,
            status_classes: std::array::from_fn(|i| self.status_classes[i].load(Ordering::Relaxed)),
            panics: self.panics(),
            routes,
        }
    }

    /// Prometheus text exposition of the current counters.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        if let Err(e) = self.write_prometheus(&mut out) {
            warn!(error = %e, "Failed to format metrics");
        }
        out
    }

    fn write_prometheus(&self, out: &mut String) -> fmt::Result {
        let snap = self.snapshot();
        writeln!(out, "# HELP whisk_requests_total Requests handled")?;
        writeln!(out, "# TYPE whisk_requests_total counter")?;
        writeln!(out, "whisk_requests_total {}", snap.request_count)?;
        writeln!(out, "# HELP whisk_requests_in_flight Requests being handled")?;
        writeln!(out, "# TYPE whisk_requests_in_flight gauge")?;
        writeln!(out, "whisk_requests_in_flight {}", snap.in_flight)?;
        writeln!(out, "# HELP whisk_responses_total Responses by status class")?;
        writeln!(out, "# TYPE whisk_responses_total counter")?;
        for (i, count) in snap.status_classes.iter().enumerate() {
            writeln!(out, "whisk_responses_total{{class=\"{}xx\"}} {count}", i + 1)?;
        }
        writeln!(out, "# HELP whisk_panics_total Handler panics")?;
        writeln!(out, "# TYPE whisk_panics_total counter")?;
        writeln!(out, "whisk_panics_total {}", snap.panics)?;
        writeln!(out, "# HELP whisk_request_latency_average_us Average request latency")?;
        writeln!(out, "# TYPE whisk_request_latency_average_us gauge")?;
        writeln!(out, "whisk_request_latency_average_us {}", snap.average_latency_us)?;
        writeln!(out, "# HELP whisk_route_requests_total Requests by route pattern")?;
        writeln!(out, "# TYPE whisk_route_requests_total counter")?;
        for (route, count) in &snap.routes {
            let route = route.replace('\\', "\\\\").replace('"', "\\\"");
            writeln!(out, "whisk_route_requests_total{{route=\"{route}\"}} {count}")?;
        }
        Ok(())
    }

    /// Middleware recording every request that passes through it.
    ///
    /// Panics are only counted when this runs ahead of
    /// [`recovery`](crate::middleware::recovery).
    pub fn handler(self: &Arc<Self>) -> HandlerFunc {
        let metrics = Arc::clone(self);
        HandlerFunc::new(move |c: &mut Context| {
            let start = Instant::now();
            metrics.in_flight.fetch_add(1, Ordering::Relaxed);
            c.next();
            metrics.in_flight.fetch_sub(1, Ordering::Relaxed);
            let panicked = c.halt() == Some(Halt::Panicked);
            metrics.record(c.full_path(), c.writer().status().as_u16(), start.elapsed(), panicked);
        })
    }

    /// Handler answering with [`Metrics::render_prometheus`].
    pub fn endpoint(self: &Arc<Self>) -> HandlerFunc {
        let metrics = Arc::clone(self);
        HandlerFunc::new(move |c: &mut Context| {
            let body = metrics.render_prometheus();
            c.data(200, "text/plain; version=0.0.4", body.as_bytes());
        })
    }
}
