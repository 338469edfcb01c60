use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Response, StatusCode};
use std::io;
use tracing::warn;

/// Buffered response under construction.
///
/// The status can be changed freely until the header is committed, either
/// explicitly with [`ResponseWriter::write_header_now`] or implicitly by the
/// first body write. After that, attempts to change the status are logged
/// and ignored.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    written: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            written: false,
        }
    }
}

impl ResponseWriter {
    /// Current status; `200 OK` unless something set it.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Whether the header has been committed.
    pub fn written(&self) -> bool {
        self.written
    }

    /// Number of body bytes written so far.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header, replacing existing values.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Record `code` as the response status unless the header is already
    /// committed.
    pub fn write_header(&mut self, code: StatusCode) {
        if self.written {
            if code != self.status {
                warn!(
                    current = self.status.as_u16(),
                    attempted = code.as_u16(),
                    "Headers were already written, status change ignored"
                );
            }
            return;
        }
        self.status = code;
    }

    /// Commit the header with the current status.
    pub fn write_header_now(&mut self) {
        self.written = true;
    }

    /// Append body bytes, committing the header first.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.write_header_now();
        self.body.extend_from_slice(data);
    }

    pub(crate) fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.written = false;
    }

    /// Move the finished response out, leaving the writer empty.
    pub(crate) fn take_response(&mut self) -> Response<Vec<u8>> {
        self.write_header_now();
        let mut response = Response::new(std::mem::take(&mut self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        response
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
