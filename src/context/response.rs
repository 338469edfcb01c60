//! Response helpers on [`Context`].
//!
//! Each helper renders into the response writer. A render that fails is
//! recorded with [`Context::error`] and, when nothing has been written yet,
//! answered with a bare 500.

use http::StatusCode;
use serde::Serialize;
use std::path::Path;
use tracing::{error, warn};

use super::{status_code, Context};
use crate::error::RenderError;
use crate::render::{self, Render, SseEvent};

impl Context {
    /// Render `r` with status `code` (or the current status for `None`).
    pub fn render(&mut self, code: Option<u16>, r: &dyn Render) {
        let code = code.map(status_code);
        if let Err(e) = r.render(&mut self.writer, code) {
            self.render_failed(e);
        }
    }

    fn render_failed(&mut self, e: RenderError) {
        error!(error = %e, path = %self.request.uri().path(), "Render failed");
        self.error(&e, None);
        if !self.writer.written() {
            self.writer.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            self.writer.write_header_now();
        }
    }

    /// Serialize `value` as JSON.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: u16, value: &T) {
        self.render(Some(code), &render::Json(value));
    }

    /// Serialize `value` as XML.
    pub fn xml<T: Serialize + ?Sized>(&mut self, code: u16, value: &T) {
        self.render(Some(code), &render::Xml(value));
    }

    /// Render the engine template `name` with `data`.
    pub fn html<T: Serialize + ?Sized>(&mut self, code: u16, name: &str, data: &T) {
        let Some(templates) = self.templates.clone() else {
            self.render_failed(RenderError::Template(format!(
                "no templates loaded, cannot render '{name}'"
            )));
            return;
        };
        self.render(
            Some(code),
            &render::Html {
                templates: &templates,
                name,
                data,
            },
        );
    }

    /// Plain text body.
    pub fn string(&mut self, code: u16, text: impl AsRef<str>) {
        self.render(Some(code), &render::Text(text.as_ref()));
    }

    /// Raw bytes with an explicit content type.
    pub fn data(&mut self, code: u16, content_type: &str, data: &[u8]) {
        self.render(Some(code), &render::Data { content_type, data });
    }

    /// Serve a file from disk. A missing file is a 404.
    pub fn file(&mut self, path: impl AsRef<Path>) {
        match render::File(path.as_ref()).render(&mut self.writer, Some(StatusCode::OK)) {
            Ok(()) => {}
            Err(RenderError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                self.writer.write_header(StatusCode::NOT_FOUND);
                self.writer.write_header_now();
            }
            Err(e) => self.render_failed(e),
        }
    }

    /// Redirect to `location` with a 3xx (or 201) status.
    pub fn redirect(&mut self, code: u16, location: &str) {
        let method = self.request.method().clone();
        self.render(
            None,
            &render::Redirect {
                code: status_code(code),
                location,
                method: &method,
            },
        );
    }

    /// Append one server-sent event to the response.
    pub fn sse_event(&mut self, event: &str, data: impl Into<String>) {
        self.render(None, &SseEvent::new(event, data));
    }

    /// Call `step` until it returns `false`; every call may write to the
    /// response. Returns `true` if the loop ended because the chain was
    /// aborted.
    pub fn stream<F>(&mut self, mut step: F) -> bool
    where
        F: FnMut(&mut Context) -> bool,
    {
        loop {
            if self.is_aborted() {
                return true;
            }
            if !step(self) {
                return false;
            }
        }
    }

    /// Write every event from `rx` until all senders are gone.
    pub fn stream_events(&mut self, rx: &render::sse::SseReceiver) {
        let mut frames = 0_usize;
        while let Some(event) = rx.recv() {
            self.render(None, &event);
            frames += 1;
        }
        if frames == 0 {
            warn!(path = %self.request.uri().path(), "Event stream closed without any events");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Request};
    use serde_json::json;

    #[test]
    fn test_json_and_string_helpers() {
        let mut c = Context::new();
        c.json(201, &json!({"ok": true}));
        assert_eq!(c.writer().status(), StatusCode::CREATED);
        assert_eq!(c.writer().body(), b"{\"ok\":true}\n");

        let mut c = Context::new();
        c.string(200, format!("hello {}", "world"));
        assert_eq!(c.writer().headers()["content-type"], "text/plain");
        assert_eq!(c.writer().body(), b"hello world");
    }

    #[test]
    fn test_html_without_templates_is_500() {
        let mut c = Context::new();
        c.html(200, "index.tmpl", &json!({}));
        assert_eq!(c.writer().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(c.writer().written());
        assert_eq!(c.errors().len(), 1);
    }

    #[test]
    fn test_file_missing_is_404() {
        let mut c = Context::new();
        c.file("no/such/file.txt");
        assert_eq!(c.writer().status(), StatusCode::NOT_FOUND);
        assert!(c.errors().is_empty());
    }

    #[test]
    fn test_redirect_uses_request_method() {
        let mut c = Context::new();
        c.request = Request::builder()
            .method(Method::POST)
            .uri("/old")
            .body(Vec::new())
            .unwrap();
        c.redirect(307, "/new");
        assert_eq!(c.writer().status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(c.writer().headers()["location"], "/new");
        assert!(c.writer().body().is_empty());
    }

    #[test]
    fn test_bad_redirect_records_error() {
        let mut c = Context::new();
        c.redirect(200, "/new");
        assert_eq!(c.writer().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            c.last_error().map(|e| e.err.as_str()),
            Some("cannot redirect with status code 200")
        );
    }

    #[test]
    fn test_stream_until_false() {
        let mut c = Context::new();
        let mut n = 0;
        let aborted = c.stream(|c| {
            n += 1;
            c.sse_event("tick", n.to_string());
            n < 3
        });
        assert!(!aborted);
        assert_eq!(
            std::str::from_utf8(c.writer().body()).unwrap(),
            "event: tick\ndata: 1\n\nevent: tick\ndata: 2\n\nevent: tick\ndata: 3\n\n"
        );
    }

    #[test]
    fn test_stream_stops_on_abort() {
        let mut c = Context::new();
        let aborted = c.stream(|c| {
            c.abort(499);
            true
        });
        assert!(aborted);
    }

    #[test]
    fn test_stream_events_drains_channel() {
        let (tx, rx) = render::sse::channel();
        std::thread::spawn(move || {
            tx.send(SseEvent::data("one"));
            tx.send(SseEvent::new("done", "two"));
        })
        .join()
        .unwrap();
        let mut c = Context::new();
        c.stream_events(&rx);
        assert_eq!(c.writer().headers()["content-type"], "text/event-stream");
        assert_eq!(c.writer().body(), b"data: one\n\nevent: done\ndata: two\n\n");
    }
}
