use http::{Method, Request, Uri};
use std::fmt;
use std::io::Read;

use crate::context::{DecodedPath, RemoteAddr};

/// Why a request never reached the service.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RejectReason {
    BadRequest(String),
    PayloadTooLarge { limit: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::BadRequest(reason) => write!(f, "bad request: {reason}"),
            RejectReason::PayloadTooLarge { limit } => {
                write!(f, "request body exceeds {limit} bytes")
            }
        }
    }
}

/// Percent-decoded form of `path`, if decoding changes it and yields
/// valid UTF-8.
pub(crate) fn decode_path(path: &str) -> Option<String> {
    if !path.contains('%') {
        return None;
    }
    match urlencoding::decode(path) {
        Ok(decoded) if decoded != path => Some(decoded.into_owned()),
        _ => None,
    }
}

/// Convert a `tiny_http` request, reading at most `max_body` body bytes.
pub(crate) fn into_http_request(req: &mut tiny_http::Request, max_body: usize) -> Result<Request<Vec<u8>>, RejectReason> {
    if req.body_length().is_some_and(|len| len > max_body) {
        return Err(RejectReason::PayloadTooLarge { limit: max_body });
    }

    let method = Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|e| RejectReason::BadRequest(e.to_string()))?;
    let uri: Uri = req
        .url()
        .parse()
        .map_err(|e| RejectReason::BadRequest(format!("invalid request target '{}': {e}", req.url())))?;
    let decoded = decode_path(uri.path());

    let mut builder = Request::builder().method(method).uri(uri);
    for header in req.headers() {
        builder = builder.header(header.field.as_str().as_str(), header.value.as_str());
    }

    let mut body = Vec::new();
    let limit = u64::try_from(max_body).unwrap_or(u64::MAX).saturating_add(1);
    req.as_reader()
        .take(limit)
        .read_to_end(&mut body)
        .map_err(|e| RejectReason::BadRequest(format!("failed to read body: {e}")))?;
    if body.len() > max_body {
        return Err(RejectReason::PayloadTooLarge { limit: max_body });
    }

    let mut request = builder
        .body(body)
        .map_err(|e| RejectReason::BadRequest(e.to_string()))?;
    if let Some(addr) = req.remote_addr() {
        request.extensions_mut().insert(RemoteAddr(*addr));
    }
    if let Some(path) = decoded {
        request.extensions_mut().insert(DecodedPath(path));
    }
    Ok(request)
}
