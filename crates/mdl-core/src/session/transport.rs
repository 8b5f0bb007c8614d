//! The HTTP seam: what the session sends and what it gets back.

use std::io::Read;
use std::time::Duration;

/// One request as it goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    /// Header name/value pairs, already merged with caller overrides.
    pub headers: Vec<(String, String)>,
    /// `Cookie` header value built from the caller's cookie map.
    pub cookies: Option<String>,
    /// Connect timeout, and the longest the body may stall.
    pub timeout: Duration,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and the headers the engine consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u32,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    /// True if the server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
}

/// A response whose body has not been read yet.
pub struct HttpResponse {
    pub head: ResponseHead,
    /// Raw body bytes (content encoding not undone). Read errors mean the
    /// connection failed mid-body.
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Timeout, reset, DNS failure: the network may be gone.
    #[error("connection failed: {0}")]
    Connectivity(String),
    /// The request itself cannot succeed (bad URL, unsupported protocol).
    #[error("request failed: {0}")]
    Fatal(String),
}

/// Sends one request and returns once the response headers are in.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}
