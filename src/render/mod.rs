//! # Render Module
//!
//! Response body producers. Every renderer implements [`Render`]: it sets the
//! content type, optionally records a status and appends the body to a
//! [`ResponseWriter`]. Bodies are serialized before anything touches the
//! writer, so a failed render leaves the response untouched.
//!
//! Handlers normally go through the helpers on [`Context`](crate::Context)
//! (`json`, `xml`, `html`, `string`, `data`, `file`, `redirect`,
//! `sse_event`) rather than using these types directly.

mod file;
mod html;
pub mod sse;

pub use file::{content_type_for, map_path, File};
pub use html::{Html, HtmlTemplates};
pub use sse::SseEvent;

use http::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use http::{Method, StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::context::ResponseWriter;
use crate::error::RenderError;

pub const MIME_JSON: &str = "application/json";
pub const MIME_XML: &str = "application/xml";
pub const MIME_HTML: &str = "text/html";
pub const MIME_PLAIN: &str = "text/plain";
pub const MIME_EVENT_STREAM: &str = "text/event-stream";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

/// Something that can write itself into a response.
pub trait Render {
    /// Write into `w`. With `code == None` the current status is left alone.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if the body cannot be produced; `w` is not
    /// modified in that case.
    fn render(&self, w: &mut ResponseWriter, code: Option<StatusCode>) -> Result<(), RenderError>;
}

fn write_header(w: &mut ResponseWriter, code: Option<StatusCode>, content_type: HeaderValue) {
    w.set_header(CONTENT_TYPE, content_type);
    if let Some(code) = code {
        w.write_header(code);
    }
}

/// Serialize as JSON followed by a newline.
pub struct Json<'a, T: ?Sized>(pub &'a T);

impl<T: Serialize + ?Sized> Render for Json<'_, T> {
    fn render(&self, w: &mut ResponseWriter, code: Option<StatusCode>) -> Result<(), RenderError> {
        let mut body = serde_json::to_vec(self.0)?;
        body.push(b'\n');
        write_header(w, code, HeaderValue::from_static(MIME_JSON));
        w.write_bytes(&body);
        Ok(())
    }
}

/// Serialize as XML.
///
/// Structs use their type name as the root element; maps and other values
/// without a natural name are wrapped in `<map>`.
pub struct Xml<'a, T: ?Sized>(pub &'a T);

impl<T: Serialize + ?Sized> Render for Xml<'_, T> {
    fn render(&self, w: &mut ResponseWriter, code: Option<StatusCode>) -> Result<(), RenderError> {
        let body = quick_xml::se::to_string(self.0)
            .or_else(|_| quick_xml::se::to_string_with_root("map", self.0))
            .map_err(|e| RenderError::Xml(e.to_string()))?;
        write_header(w, code, HeaderValue::from_static(MIME_XML));
        w.write_bytes(body.as_bytes());
        Ok(())
    }
}

/// Plain text.
pub struct Text<'a>(pub &'a str);

impl Render for Text<'_> {
    fn render(&self, w: &mut ResponseWriter, code: Option<StatusCode>) -> Result<(), RenderError> {
        write_header(w, code, HeaderValue::from_static(MIME_PLAIN));
        w.write_bytes(self.0.as_bytes());
        Ok(())
    }
}

/// Raw bytes with a caller-chosen content type.
pub struct Data<'a> {
    pub content_type: &'a str,
    pub data: &'a [u8],
}

impl Render for Data<'_> {
    fn render(&self, w: &mut ResponseWriter, code: Option<StatusCode>) -> Result<(), RenderError> {
        let content_type = HeaderValue::from_str(self.content_type).unwrap_or_else(|_| {
            warn!(content_type = %self.content_type, "Invalid content type, sending octet-stream");
            HeaderValue::from_static(MIME_OCTET_STREAM)
        });
        write_header(w, code, content_type);
        w.write_bytes(self.data);
        Ok(())
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// HTTP redirect to `location`.
///
/// Accepts 3xx codes and 201 Created. GET requests also get a short HTML
/// body linking to the target.
pub struct Redirect<'a> {
    pub code: StatusCode,
    pub location: &'a str,
    pub method: &'a Method,
}

impl Render for Redirect<'_> {
    fn render(&self, w: &mut ResponseWriter, _code: Option<StatusCode>) -> Result<(), RenderError> {
        if !(self.code.is_redirection() || self.code == StatusCode::CREATED) {
            return Err(RenderError::InvalidRedirect {
                status: self.code.as_u16(),
            });
        }
        let location = HeaderValue::from_str(self.location).map_err(|_| RenderError::InvalidHeader {
            name: "Location",
            value: self.location.to_owned(),
        })?;

        w.set_header(LOCATION, location);
        if *self.method == Method::GET || *self.method == Method::HEAD {
            w.set_header(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        }
        w.write_header(self.code);
        if *self.method == Method::GET {
            let reason = self.code.canonical_reason().unwrap_or("Redirect");
            let body = format!("<a href=\"{}\">{}</a>.\n\n", html_escape(self.location), reason);
            w.write_bytes(body.as_bytes());
        } else {
            w.write_header_now();
        }
        Ok(())
    }
}
