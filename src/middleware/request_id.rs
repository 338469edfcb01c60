use http::header::{HeaderName, HeaderValue};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::handler::HandlerFunc;

/// Request and response header carrying the id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Context key the [`RequestId`] is stored under.
pub const REQUEST_ID_KEY: &str = "whisk.request_id";

const MAX_INCOMING_LEN: usize = 128;

/// Identifier of one request: the caller's `X-Request-Id` when it looks
/// sane, a fresh ULID otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    pub fn generate() -> Self {
        Self(Arc::from(ulid::Ulid::new().to_string()))
    }

    /// Reuse an incoming id of printable ASCII up to 128 bytes, otherwise
    /// generate one.
    pub fn from_header_or_new(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() && v.len() <= MAX_INCOMING_LEN && v.bytes().all(|b| b.is_ascii_graphic()) => {
                Self(Arc::from(v))
            }
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Assign a [`RequestId`], store it under [`REQUEST_ID_KEY`] and echo it in
/// the `X-Request-Id` response header.
pub fn request_id() -> HandlerFunc {
    HandlerFunc::new(|c: &mut Context| {
        let id = RequestId::from_header_or_new(c.header(REQUEST_ID_HEADER));
        if let Ok(value) = HeaderValue::from_str(id.as_str()) {
            c.writer_mut()
                .set_header(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        c.set(REQUEST_ID_KEY, id);
        c.next();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers;
    use http::Request;

    fn run(request: Request<Vec<u8>>) -> Context {
        let mut c = Context::with_handlers(
            request,
            handlers![request_id(), |c: &mut Context| {
                let id = c.get_as::<RequestId>(REQUEST_ID_KEY).unwrap().to_string();
                c.string(200, id);
            }],
        );
        c.next();
        c
    }

    #[test]
    fn test_generates_ulid() {
        let c = run(Request::default());
        let header = c.writer().headers()[REQUEST_ID_HEADER].to_str().unwrap().to_owned();
        assert_eq!(header.len(), 26);
        assert!(header.parse::<ulid::Ulid>().is_ok());
        assert_eq!(c.writer().body(), header.as_bytes());
    }

    #[test]
    fn test_honours_incoming_id() {
        let c = run(Request::get("/").header("X-Request-Id", "trace-abc-123").body(Vec::new()).unwrap());
        assert_eq!(c.writer().headers()[REQUEST_ID_HEADER], "trace-abc-123");
    }

    #[test]
    fn test_rejects_unusable_incoming_id() {
        assert_ne!(RequestId::from_header_or_new(Some("has space")).as_str(), "has space");
        assert_eq!(RequestId::from_header_or_new(Some("")).as_str().len(), 26);
        let long = "x".repeat(200);
        assert_eq!(RequestId::from_header_or_new(Some(&long)).as_str().len(), 26);
    }
}
