//! Plain request and response values.
//!
//! The dispatcher is transport-agnostic: whatever server front-end receives
//! the bytes builds a [`Request`], and the [`Response`] it gets back is
//! ready to serialize onto any HTTP stack.

use std::collections::BTreeMap;

use portico_router::Method;
use url::Url;

use crate::error::{DispatchError, DispatchResult};

/// An incoming request, reduced to what dispatch needs.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method.
    pub method: Method,
    /// The Host header value, port included.
    pub host: String,
    /// The request path, query string excluded.
    pub path: String,
    /// Remaining headers, lowercased names.
    pub headers: BTreeMap<String, String>,
}

impl Request {
    /// Create a request from its parts.
    pub fn new(method: Method, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            host: host.into(),
            path: path.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Create a GET request from an absolute URL.
    pub fn get(url: &str) -> DispatchResult<Self> {
        let parsed = Url::parse(url)
            .map_err(|err| DispatchError::InvalidRequest(format!("bad request url: {err}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| DispatchError::InvalidRequest("request url has no host".to_string()))?;
        let host = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Self::new(Method::Get, host, parsed.path()))
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Look a header up by its lowercased name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// The dispatcher's answer to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: String,
}

impl Response {
    /// A 200 response with a body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// A 302 redirect to `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        let location = location.into();
        let mut headers = BTreeMap::new();
        headers.insert("location".to_string(), location.clone());
        Self {
            status: 302,
            headers,
            body: format!("redirecting to {location}"),
        }
    }

    /// A 200 OPTIONS answer advertising `allowed` in the Allow header.
    pub fn options(allowed: &[Method]) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "allow".to_string(),
            allowed
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        );
        Self {
            status: 200,
            headers,
            body: String::new(),
        }
    }

    /// Set the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Look a header up by its lowercased name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}
