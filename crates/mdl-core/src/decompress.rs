//! Content-Encoding reversal.
//!
//! `Content-Encoding` lists codings in the order they were applied, so they
//! are undone from last to first. Only the codings in [`ContentCoding`] are
//! understood; anything else is a typed error raised before a byte is read.

use std::io::{self, Read};

#[derive(Debug, thiserror::Error)]
pub enum DecompressError {
    #[error("unsupported content encoding: {0}")]
    Unsupported(String),
    #[error("decoding failed: {0}")]
    Io(#[from] io::Error),
}

/// A single reversible content coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Identity,
    Gzip,
    /// HTTP `deflate`: zlib-wrapped DEFLATE.
    Deflate,
    Brotli,
}

impl ContentCoding {
    /// Everything we can reverse, in `Accept-Encoding` preference order.
    pub const SUPPORTED: [ContentCoding; 4] = [
        ContentCoding::Gzip,
        ContentCoding::Deflate,
        ContentCoding::Brotli,
        ContentCoding::Identity,
    ];

    pub fn token(self) -> &'static str {
        match self {
            ContentCoding::Identity => "identity",
            ContentCoding::Gzip => "gzip",
            ContentCoding::Deflate => "deflate",
            ContentCoding::Brotli => "br",
        }
    }

    pub fn from_token(token: &str) -> Result<Self, DecompressError> {
        let t = token.trim();
        if t.eq_ignore_ascii_case("identity") {
            Ok(ContentCoding::Identity)
        } else if t.eq_ignore_ascii_case("gzip") || t.eq_ignore_ascii_case("x-gzip") {
            Ok(ContentCoding::Gzip)
        } else if t.eq_ignore_ascii_case("deflate") {
            Ok(ContentCoding::Deflate)
        } else if t.eq_ignore_ascii_case("br") {
            Ok(ContentCoding::Brotli)
        } else {
            Err(DecompressError::Unsupported(t.to_string()))
        }
    }

    fn wrap<'a>(self, reader: Box<dyn Read + 'a>) -> Box<dyn Read + 'a> {
        match self {
            ContentCoding::Identity => reader,
            ContentCoding::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
            ContentCoding::Deflate => Box::new(flate2::read::ZlibDecoder::new(reader)),
            ContentCoding::Brotli => Box::new(brotli::Decompressor::new(reader, 64 * 1024)),
        }
    }
}

/// `Accept-Encoding` value advertising every coding we can reverse.
pub fn accept_encoding_header() -> String {
    ContentCoding::SUPPORTED
        .iter()
        .map(|c| c.token())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ordered list of codings, as declared by the server (application order).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodingChain(Vec<ContentCoding>);

impl EncodingChain {
    /// Parse a raw `Content-Encoding` header. `None` or blank means no coding.
    pub fn parse(header: Option<&str>) -> Result<Self, DecompressError> {
        let mut codings = Vec::new();
        if let Some(value) = header {
            for token in value.split(',') {
                if token.trim().is_empty() {
                    continue;
                }
                codings.push(ContentCoding::from_token(token)?);
            }
        }
        Ok(Self(codings))
    }

    pub fn codings(&self) -> &[ContentCoding] {
        &self.0
    }

    /// True when reversing the chain would not change any byte.
    pub fn is_identity(&self) -> bool {
        self.0.iter().all(|c| *c == ContentCoding::Identity)
    }

    /// Wrap `reader` so that reading from the result yields decoded bytes.
    pub fn decoding_reader<'a, R: Read + 'a>(&self, reader: R) -> Box<dyn Read + 'a> {
        let mut out: Box<dyn Read + 'a> = Box::new(reader);
        for coding in self.0.iter().rev() {
            out = coding.wrap(out);
        }
        out
    }
}

/// Reverse `chain` over an in-memory buffer.
pub fn reverse(bytes: &[u8], chain: &EncodingChain) -> Result<Vec<u8>, DecompressError> {
    if chain.is_identity() {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::with_capacity(bytes.len() * 2);
    chain.decoding_reader(bytes).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn brotli(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut w = brotli::CompressorWriter::new(&mut out, 4096, 5, 22);
            w.write_all(data).unwrap();
        }
        out
    }

    fn sample() -> Vec<u8> {
        b"the quick brown fox jumps over the lazy dog\n".repeat(200)
    }

    #[test]
    fn accept_encoding_lists_all_supported() {
        assert_eq!(accept_encoding_header(), "gzip, deflate, br, identity");
    }

    #[test]
    fn parse_chain_in_order() {
        let chain = EncodingChain::parse(Some("gzip, br")).unwrap();
        assert_eq!(chain.codings(), &[ContentCoding::Gzip, ContentCoding::Brotli]);
        assert!(EncodingChain::parse(None).unwrap().codings().is_empty());
        assert!(EncodingChain::parse(Some(" ")).unwrap().is_identity());
    }

    #[test]
    fn unknown_coding_is_rejected() {
        let err = EncodingChain::parse(Some("gzip, compress")).unwrap_err();
        assert!(matches!(err, DecompressError::Unsupported(ref t) if t == "compress"));
    }

    #[test]
    fn identity_is_passthrough() {
        let chain = EncodingChain::parse(Some("identity")).unwrap();
        assert_eq!(reverse(b"raw bytes", &chain).unwrap(), b"raw bytes");
    }

    #[test]
    fn gzip_roundtrip() {
        let chain = EncodingChain::parse(Some("x-gzip")).unwrap();
        assert_eq!(reverse(&gzip(&sample()), &chain).unwrap(), sample());
    }

    #[test]
    fn deflate_roundtrip() {
        let chain = EncodingChain::parse(Some("deflate")).unwrap();
        assert_eq!(reverse(&zlib(&sample()), &chain).unwrap(), sample());
    }

    #[test]
    fn brotli_roundtrip() {
        let chain = EncodingChain::parse(Some("br")).unwrap();
        assert_eq!(reverse(&brotli(&sample()), &chain).unwrap(), sample());
    }

    #[test]
    fn chain_is_reversed_last_first() {
        // Applied gzip first, then br: the body is br(gzip(data)).
        let body = brotli(&gzip(&sample()));
        let chain = EncodingChain::parse(Some("gzip, br")).unwrap();
        assert_eq!(reverse(&body, &chain).unwrap(), sample());
    }

    #[test]
    fn corrupt_body_is_an_error() {
        let chain = EncodingChain::parse(Some("gzip")).unwrap();
        assert!(matches!(
            reverse(b"definitely not gzip", &chain),
            Err(DecompressError::Io(_))
        ));
    }
}
