//! Server-Sent Events framing.
//!
//! Responses are buffered, so an event stream is written in one go once the
//! handler finishes. That suits finite feeds (progress reports, replaying a
//! backlog); a producer thread can push events through [`channel`] and the
//! handler drains them with
//! [`Context::stream_events`](crate::Context::stream_events).
//!
//! ```text
//! event: message
//! data: first line
//! data: second line
//!
//! ```

use http::header::{HeaderValue, CACHE_CONTROL};
use http::StatusCode;
use std::sync::mpsc;

use super::{write_header, Render, MIME_EVENT_STREAM};
use crate::context::ResponseWriter;
use crate::error::RenderError;

/// One `text/event-stream` frame. Rendering appends to the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            id: None,
            data: data.into(),
        }
    }

    /// Frame without an event name (delivered as `message`).
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Wire encoding; multi-line data becomes one `data:` line per line.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.data.len() + 32);
        if let Some(id) = &self.id {
            out.push_str("id: ");
            out.push_str(id);
            out.push('\n');
        }
        if let Some(event) = &self.event {
            out.push_str("event: ");
            out.push_str(event);
            out.push('\n');
        }
        for line in self.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

impl Render for SseEvent {
    fn render(&self, w: &mut ResponseWriter, code: Option<StatusCode>) -> Result<(), RenderError> {
        let frame = self.encode();
        write_header(w, code, HeaderValue::from_static(MIME_EVENT_STREAM));
        w.set_header(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        w.write_bytes(frame.as_bytes());
        Ok(())
    }
}

/// Sender side of an SSE channel. Clone it to produce from several threads.
#[derive(Clone)]
pub struct SseSender {
    tx: mpsc::Sender<SseEvent>,
}

impl SseSender {
    /// Queue an event. Returns `false` once the receiving side is gone.
    pub fn send(&self, event: SseEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Receiver side, drained by the handler.
pub struct SseReceiver {
    rx: mpsc::Receiver<SseEvent>,
}

impl SseReceiver {
    /// Block for the next event; `None` once every sender is dropped.
    pub fn recv(&self) -> Option<SseEvent> {
        self.rx.recv().ok()
    }
}

/// Create a connected sender/receiver pair.
pub fn channel() -> (SseSender, SseReceiver) {
    let (tx, rx) = mpsc::channel();
    (SseSender { tx }, SseReceiver { rx })
}
