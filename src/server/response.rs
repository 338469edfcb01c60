use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use std::io::Cursor;
use tracing::warn;

use super::request::RejectReason;

pub(crate) type TinyResponse = tiny_http::Response<Cursor<Vec<u8>>>;

/// Convert a finished response for `tiny_http`, which computes
/// `Content-Length` itself.
pub(crate) fn into_tiny_response(response: Response<Vec<u8>>) -> TinyResponse {
    let (parts, body) = response.into_parts();
    let mut tiny = tiny_http::Response::from_data(body).with_status_code(parts.status.as_u16());
    for (name, value) in &parts.headers {
        match tiny_http::Header::from_bytes(name.as_str().as_bytes(), value.as_bytes()) {
            Ok(header) => tiny.add_header(header),
            Err(()) => warn!(header = %name, "Dropping header tiny_http cannot encode"),
        }
    }
    tiny
}

/// Plain-text answer for a request rejected before dispatch.
pub(crate) fn reject_response(reason: &RejectReason) -> Response<Vec<u8>> {
    let status = match reason {
        RejectReason::BadRequest(_) => StatusCode::BAD_REQUEST,
        RejectReason::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
    };
    let mut response = Response::new(reason.to_string().into_bytes());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}
