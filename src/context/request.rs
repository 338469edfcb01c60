//! Request-side helpers on [`Context`].

use http::header::{CONTENT_TYPE, HeaderName};
use http::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::net::SocketAddr;

use super::Context;
use crate::error::ContextError;

/// Peer address of the connection, stored in the request extensions by the
/// transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// Percent-decoded request path, stored by the transport when it differs
/// from the raw one. Routing and [`Context::path`] use it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPath(pub String);

const MIME_FORM: &str = "application/x-www-form-urlencoded";
const MIME_JSON: &str = "application/json";

fn first_value(mut pairs: url::form_urlencoded::Parse<'_>, key: &str) -> Option<String> {
    pairs.find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
}

/// Collect urlencoded pairs into a JSON object. Repeated keys become arrays.
fn form_to_json(body: &[u8]) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(map)
}

impl Context {
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Percent-decoded request path, without the query string.
    pub fn path(&self) -> &str {
        match self.request.extensions().get::<DecodedPath>() {
            Some(decoded) => &decoded.0,
            None => self.request.uri().path(),
        }
    }

    /// Raw request body.
    pub fn body(&self) -> &[u8] {
        self.request.body()
    }

    /// First value of request header `name`, if present and valid UTF-8.
    pub fn header<K>(&self, name: K) -> Option<&str>
    where
        K: TryInto<HeaderName>,
    {
        let name = name.try_into().ok()?;
        self.request.headers().get(name)?.to_str().ok()
    }

    /// Media type of the request body, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }

    /// First value of query parameter `key`.
    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.request.uri().query()?;
        first_value(url::form_urlencoded::parse(query.as_bytes()), key)
    }

    /// First value of `key` in an urlencoded POST, PUT or PATCH body.
    pub fn post_form_value(&self, key: &str) -> Option<String> {
        if !matches!(*self.request.method(), Method::POST | Method::PUT | Method::PATCH) {
            return None;
        }
        if self.content_type() != Some(MIME_FORM) {
            return None;
        }
        first_value(url::form_urlencoded::parse(self.request.body()), key)
    }

    /// First value of `key` from the urlencoded body or, failing that, the
    /// query string.
    pub fn form_value(&self, key: &str) -> Option<String> {
        self.post_form_value(key).or_else(|| self.query(key))
    }

    /// Best guess at the originating client address.
    ///
    /// Checks `X-Real-IP`, then the first `X-Forwarded-For` entry, then the
    /// connection's peer address.
    pub fn client_ip(&self) -> Option<String> {
        if let Some(ip) = self.header("x-real-ip").map(str::trim).filter(|ip| !ip.is_empty()) {
            return Some(ip.to_owned());
        }
        if let Some(forwarded) = self.header("x-forwarded-for") {
            let first = forwarded.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return Some(first.to_owned());
            }
        }
        self.request
            .extensions()
            .get::<RemoteAddr>()
            .map(|addr| addr.0.ip().to_string())
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// [`ContextError::Bind`] when the body is not valid JSON for `T`.
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, ContextError> {
        serde_json::from_slice(self.request.body()).map_err(|e| ContextError::Bind {
            message: e.to_string(),
        })
    }

    /// Decode an urlencoded body into `T`.
    ///
    /// Values are strings; a key given more than once becomes a list.
    ///
    /// # Errors
    ///
    /// [`ContextError::Bind`] when the fields do not fit `T`.
    pub fn bind_form<T: DeserializeOwned>(&self) -> Result<T, ContextError> {
        serde_json::from_value(form_to_json(self.request.body())).map_err(|e| ContextError::Bind {
            message: e.to_string(),
        })
    }

    /// Decode the body according to its content type (JSON or urlencoded
    /// form). On failure the chain is failed with 400 and `None` returned.
    pub fn bind<T: DeserializeOwned>(&mut self) -> Option<T> {
        let result = match self.content_type() {
            Some(MIME_FORM) => self.bind_form(),
            Some(MIME_JSON) | None => self.bind_json(),
            Some(other) => Err(ContextError::Bind {
                message: format!("unsupported content type '{other}'"),
            }),
        };
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.fail(400, e);
                None
            }
        }
    }
}
