//! Byte ranges: the resume offset we request and what the server confirms.

/// Request-time range: resume from `offset` to the end of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRangeSpec {
    pub offset: u64,
}

impl ByteRangeSpec {
    pub fn from_offset(offset: u64) -> Self {
        Self { offset }
    }

    /// HTTP `Range` header value (`bytes=<offset>-`), or `None` at offset 0
    /// where a plain GET asks for the same thing.
    pub fn header_value(&self) -> Option<String> {
        if self.offset == 0 {
            None
        } else {
            Some(format!("bytes={}-", self.offset))
        }
    }
}

/// Parsed `Content-Range` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRange {
    /// `bytes <start>-<end>/<total>`; `total` is `None` for `*`.
    Satisfied {
        start: u64,
        end: u64,
        total: Option<u64>,
    },
    /// `bytes */<total>`: the requested range cannot be served.
    Unsatisfiable { total: Option<u64> },
}

/// Parses a `Content-Range` value. Returns `None` when malformed.
///
/// # Examples
///
/// - `bytes 100-199/200` → `Satisfied { start: 100, end: 199, total: Some(200) }`
/// - `bytes 0-99/*` → `Satisfied { .., total: None }`
/// - `bytes */200` → `Unsatisfiable { total: Some(200) }`
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let value = value.trim();
    let (unit, rest) = value.split_once(' ')?;
    if !unit.eq_ignore_ascii_case("bytes") {
        return None;
    }
    let (range, total) = rest.trim().split_once('/')?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse::<u64>().ok()?),
    };
    let range = range.trim();
    if range == "*" {
        return Some(ContentRange::Unsatisfiable { total });
    }
    let (start, end) = range.split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = end.trim().parse::<u64>().ok()?;
    if end < start {
        return None;
    }
    Some(ContentRange::Satisfied { start, end, total })
}

/// Outcome of a successful negotiation: where the body starts and how big the
/// resource is, plus the response metadata finalization needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedRange {
    /// Bytes already held locally when the request was made.
    pub requested_offset: u64,
    /// Server-reported start of the returned body (0 for full content).
    pub confirmed_offset: u64,
    /// Total resource size, if the server told us.
    pub total_size: Option<u64>,
    /// Server sent `Accept-Ranges: bytes`.
    pub accepts_ranges: bool,
    /// Raw `Content-Encoding` value; reversed at finalization.
    pub content_encoding: Option<String>,
    /// `Content-Disposition` value, used for filename derivation.
    pub content_disposition: Option<String>,
}

impl NegotiatedRange {
    /// True when the body continues an existing sidecar rather than replacing it.
    pub fn is_resume(&self) -> bool {
        self.confirmed_offset > 0
    }

    /// Bytes the body should still deliver, when the total is known.
    pub fn remaining(&self) -> Option<u64> {
        self.total_size
            .map(|total| total.saturating_sub(self.confirmed_offset))
    }
}
