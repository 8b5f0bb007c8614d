//! One logical download as the caller describes it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable description of a download. Built once, read by every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub url: String,
    /// HTTP method; `GET` unless overridden.
    pub method: String,
    /// Header overrides, merged over the engine's defaults (case-insensitive).
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    /// Do nothing if the final artifact already exists.
    pub skip_existing: bool,
    /// Base request timeout; the config default applies when `None`.
    pub timeout: Option<Duration>,
    /// File path or existing directory. `None` means the current directory.
    pub destination: Option<PathBuf>,
    /// Expected SHA-256 (hex) of the final, decoded artifact.
    pub expected_sha256: Option<String>,
}

impl TransferRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            skip_existing: false,
            timeout: None,
            destination: None,
            expected_sha256: None,
        }
    }

    pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn expected_sha256(mut self, digest: impl Into<String>) -> Self {
        self.expected_sha256 = Some(digest.into());
        self
    }

    /// `Cookie` header value (`a=1; b=2`), or `None` without cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_plain_get() {
        let r = TransferRequest::new("http://example.com/a.iso");
        assert_eq!(r.method, "GET");
        assert!(!r.skip_existing);
        assert!(r.cookie_header().is_none());
    }

    #[test]
    fn cookie_header_joins_pairs_in_order() {
        let r = TransferRequest::new("http://x/")
            .cookie("session", "abc")
            .cookie("lang", "en");
        assert_eq!(r.cookie_header().as_deref(), Some("lang=en; session=abc"));
    }
}
