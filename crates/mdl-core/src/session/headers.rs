//! Parse a response header block into `ResponseHead`.

use super::transport::ResponseHead;

/// Status code from a status line such as `HTTP/1.1 206 Partial Content` or `HTTP/2 200`.
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    let mut parts = line.split_whitespace();
    let proto = parts.next()?;
    if !proto.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

/// Parse the lines of the final response block (status line first).
pub(crate) fn parse_head(lines: &[String]) -> ResponseHead {
    let mut head = ResponseHead::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(status) = parse_status_line(line) {
            head.status = status;
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            head.content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("content-range") {
            head.content_range = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-disposition") {
            head.content_disposition = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-encoding") {
            // Repeated headers are one comma-separated list.
            head.content_encoding = Some(match head.content_encoding.take() {
                Some(prev) => format!("{}, {}", prev, value),
                None => value.to_string(),
            });
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            head.accept_ranges = value.eq_ignore_ascii_case("bytes");
        }
    }

    head
}
