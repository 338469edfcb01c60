use std::time::Instant;
use tracing::{event, Level};

use super::request_id::{RequestId, REQUEST_ID_KEY};
use crate::context::Context;
use crate::handler::HandlerFunc;
use crate::render::Json;

/// Log every request once it has been handled.
///
/// 5xx responses are logged at `ERROR`, 4xx at `WARN`, everything else at
/// `INFO`. Fields: `method`, `path`, `route`, `status`, `latency_us`,
/// `client_ip`, `request_id` (with [`request_id`](super::request_id) in
/// front of it), `bytes` and `errors`.
pub fn logger() -> HandlerFunc {
    HandlerFunc::new(|c: &mut Context| {
        let start = Instant::now();
        let method = c.method().clone();
        let path = match c.request().uri().query() {
            Some(q) => format!("{}?{q}", c.path()),
            None => c.path().to_owned(),
        };

        c.next();

        let latency_us = start.elapsed().as_micros() as u64;
        let status = c.writer().status().as_u16();
        let route = c.full_path().unwrap_or("").to_owned();
        let client_ip = c.client_ip().unwrap_or_default();
        let request_id = c
            .get_as::<RequestId>(REQUEST_ID_KEY)
            .map(ToString::to_string)
            .unwrap_or_default();
        let bytes = c.writer().size();
        let errors = c
            .errors()
            .iter()
            .map(|e| e.err.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        macro_rules! log_at {
            ($level:expr) => {
                event!(
                    $level,
                    method = %method,
                    path = %path,
                    route = %route,
                    status,
                    latency_us,
                    client_ip = %client_ip,
                    request_id = %request_id,
                    bytes,
                    errors = %errors,
                    "Request handled"
                )
            };
        }
        match status {
            500.. => log_at!(Level::ERROR),
            400..=499 => log_at!(Level::WARN),
            _ => log_at!(Level::INFO),
        }
    })
}

/// After the chain, write the recorded errors as a JSON array if there are
/// any and the response body is still empty. The status is left as it is,
/// so an aborted chain keeps its code.
pub fn error_logger() -> HandlerFunc {
    HandlerFunc::new(|c: &mut Context| {
        c.next();
        if c.errors().is_empty() || c.writer().size() > 0 {
            return;
        }
        let errors = c.errors().to_vec();
        c.render(None, &Json(&errors));
    })
}
