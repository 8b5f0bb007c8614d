//! Local filename for a download: from the server's `Content-Disposition`,
//! else the URL path, cleaned up for a Linux filesystem.

/// Used when neither the response nor the URL yields a usable name.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// Linux `NAME_MAX`.
const MAX_NAME_BYTES: usize = 255;

/// Parsed `Content-Disposition` value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Disposition {
    /// Disposition type is `attachment`.
    pub attachment: bool,
    /// `filename*` (RFC 5987) if present and decodable, else `filename`.
    pub filename: Option<String>,
}

impl Disposition {
    pub fn parse(value: &str) -> Self {
        let mut params = value.split(';');
        let attachment = params
            .next()
            .map(|t| t.trim().eq_ignore_ascii_case("attachment"))
            .unwrap_or(false);

        let mut plain = None;
        let mut extended = None;
        for param in params {
            let Some((name, raw)) = param.split_once('=') else {
                continue;
            };
            let name = name.trim();
            let raw = raw.trim();
            if name.eq_ignore_ascii_case("filename*") {
                extended = decode_ext_value(raw);
            } else if name.eq_ignore_ascii_case("filename") {
                plain = Some(unquote(raw));
            }
        }

        Self {
            attachment,
            filename: extended.or(plain).filter(|f| !f.is_empty()),
        }
    }
}

/// Filename offered by an `attachment` disposition; inline dispositions are ignored.
pub fn attachment_filename(content_disposition: &str) -> Option<String> {
    let d = Disposition::parse(content_disposition);
    if d.attachment {
        d.filename
    } else {
        None
    }
}

/// Last non-empty path segment of `url`, percent-decoded, without query or fragment.
pub fn url_filename(url: &str) -> Option<String> {
    let segment = match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .last()
            .map(str::to_string)?,
        // Not absolute: split by hand.
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or_default();
            path.rsplit('/').find(|s| !s.is_empty())?.to_string()
        }
    };
    Some(percent_decode(&segment))
}

/// Make `name` safe as a single path component on Linux. Returns an empty
/// string when nothing usable is left.
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    truncate_to_bytes(trimmed, MAX_NAME_BYTES).to_string()
}

/// Filename for a download: attachment filename first, then the URL path,
/// then `download.bin`.
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    content_disposition
        .and_then(attachment_filename)
        .map(|n| sanitize(&n))
        .filter(|n| !n.is_empty())
        .or_else(|| url_filename(url).map(|n| sanitize(&n)).filter(|n| !n.is_empty()))
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for c in inner.chars() {
        if escaped || c != '\\' {
            out.push(c);
            escaped = false;
        } else {
            escaped = true;
        }
    }
    out
}

/// `charset'lang'pct-encoded`; only UTF-8 (and its ASCII subset) is accepted.
fn decode_ext_value(raw: &str) -> Option<String> {
    let mut parts = raw.splitn(3, '\'');
    let charset = parts.next()?;
    let _lang = parts.next()?;
    let encoded = parts.next()?;
    if !(charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("us-ascii")) {
        return None;
    }
    Some(percent_decode(encoded))
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_forms() {
        let d = Disposition::parse("attachment; filename=\"report.pdf\"");
        assert!(d.attachment);
        assert_eq!(d.filename.as_deref(), Some("report.pdf"));

        let d = Disposition::parse("Attachment; filename=plain.bin");
        assert_eq!(d.filename.as_deref(), Some("plain.bin"));

        let d = Disposition::parse("attachment; filename=\"a \\\"quoted\\\" name.txt\"");
        assert_eq!(d.filename.as_deref(), Some("a \"quoted\" name.txt"));
    }

    #[test]
    fn extended_filename_wins() {
        let d = Disposition::parse(
            "attachment; filename=\"fallback.bin\"; filename*=UTF-8''caf%C3%A9%20menu.txt",
        );
        assert_eq!(d.filename.as_deref(), Some("café menu.txt"));

        // Unknown charset falls back to the plain parameter.
        let d = Disposition::parse("attachment; filename=ok.bin; filename*=koi8-r''%F0");
        assert_eq!(d.filename.as_deref(), Some("ok.bin"));
    }

    #[test]
    fn inline_disposition_is_not_a_filename() {
        assert_eq!(attachment_filename("inline; filename=\"x.html\""), None);
        assert_eq!(
            attachment_filename("attachment; filename=x.html").as_deref(),
            Some("x.html")
        );
    }

    #[test]
    fn url_segments() {
        assert_eq!(url_filename("https://example.com/a/b/debian-12.iso").as_deref(), Some("debian-12.iso"));
        assert_eq!(url_filename("https://example.com/f.zip?token=1#top").as_deref(), Some("f.zip"));
        assert_eq!(url_filename("https://example.com/dir/").as_deref(), Some("dir"));
        assert_eq!(url_filename("https://example.com/my%20file.txt").as_deref(), Some("my file.txt"));
        assert_eq!(url_filename("https://example.com/"), None);
        assert_eq!(url_filename("relative/path/x.bin?q").as_deref(), Some("x.bin"));
    }

    #[test]
    fn sanitize_for_linux() {
        assert_eq!(sanitize("a/b\\c"), "a_b_c");
        assert_eq!(sanitize("tab\there\0"), "tab_here_");
        assert_eq!(sanitize("  ..hidden.. "), "hidden");
        assert_eq!(sanitize(".."), "");
        let long = "é".repeat(200);
        let s = sanitize(&long);
        assert!(s.len() <= MAX_NAME_BYTES);
        assert!(s.chars().all(|c| c == 'é'));
    }

    #[test]
    fn derive_prefers_attachment_then_url_then_default() {
        assert_eq!(
            derive_filename("https://example.com/archive.zip", Some("attachment; filename=\"real.tar.gz\"")),
            "real.tar.gz"
        );
        assert_eq!(
            derive_filename("https://example.com/archive.zip", Some("inline")),
            "archive.zip"
        );
        assert_eq!(derive_filename("https://example.com/", None), DEFAULT_FILENAME);
        assert_eq!(derive_filename("https://example.com/..", None), DEFAULT_FILENAME);
        assert_eq!(
            derive_filename("https://example.com/x", Some("attachment; filename=\"..\"")),
            "x"
        );
    }
}
