//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves one static body for any path. HEAD answers 200 (so the server can
//! double as the reachability probe target); GET honors `Range: bytes=N-`
//! unless disabled, and can be told to misbehave: fail with a status a number
//! of times, cut the first body short, or gzip the payload.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RangeServerOptions {
    /// If true, GET ignores Range and always returns 200 with the full body.
    pub ignore_ranges: bool,
    /// Answer the first `n` GETs with this status and an empty body.
    pub fail_first: Option<(u16, u32)>,
    /// Close the connection after this many body bytes on the first GET.
    pub truncate_first: Option<usize>,
    /// Serve the gzip-encoded body with `Content-Encoding: gzip`.
    pub gzip: bool,
    pub content_disposition: Option<String>,
    /// Sent as `Set-Cookie` on every GET response.
    pub set_cookie: Option<String>,
}

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub range: Option<String>,
    /// Raw header block, for asserting on arbitrary headers.
    pub raw: String,
}

pub struct RangeServer {
    base: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl RangeServer {
    /// URL for `path` on this server (`path` without leading slash).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// GET requests only; probe HEADs are left out.
    pub fn gets(&self) -> Vec<SeenRequest> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == "GET")
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

struct Shared {
    wire: Vec<u8>,
    opts: RangeServerOptions,
    gets: AtomicU32,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let wire = if opts.gzip { gzip(&body) } else { body };
    let seen = Arc::new(Mutex::new(Vec::new()));
    let shared = Arc::new(Shared {
        wire,
        opts,
        gets: AtomicU32::new(0),
        seen: Arc::clone(&seen),
    });
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let shared = Arc::clone(&shared);
            thread::spawn(move || handle(stream, &shared));
        }
    });
    RangeServer {
        base: format!("http://127.0.0.1:{}/", port),
        seen,
    }
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8(buf).ok()
}

fn handle(mut stream: TcpStream, shared: &Shared) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(raw) = read_head(&mut stream) else {
        return;
    };
    let method = raw.split_whitespace().next().unwrap_or("").to_string();
    let range = header(&raw, "range");
    shared.seen.lock().unwrap().push(SeenRequest {
        method: method.clone(),
        range: range.clone(),
        raw: raw.clone(),
    });

    if method == "HEAD" {
        let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }
    if method != "GET" {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }

    let nth = shared.gets.fetch_add(1, Ordering::SeqCst);
    let opts = &shared.opts;
    if let Some((status, times)) = opts.fail_first {
        if nth < times {
            let response = format!(
                "HTTP/1.1 {} Failing\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status
            );
            let _ = stream.write_all(response.as_bytes());
            return;
        }
    }

    let body = &shared.wire;
    let total = body.len() as u64;
    let start = range
        .filter(|_| !opts.ignore_ranges)
        .and_then(|r| r.strip_prefix("bytes=").map(str::to_string))
        .and_then(|r| r.trim_end_matches('-').parse::<u64>().ok());

    let mut extra = String::new();
    if opts.gzip {
        extra.push_str("Content-Encoding: gzip\r\n");
    }
    if let Some(cd) = &opts.content_disposition {
        extra.push_str(&format!("Content-Disposition: {}\r\n", cd));
    }
    if let Some(cookie) = &opts.set_cookie {
        extra.push_str(&format!("Set-Cookie: {}\r\n", cookie));
    }
    if !opts.ignore_ranges {
        extra.push_str("Accept-Ranges: bytes\r\n");
    }

    let (status, slice) = match start {
        Some(s) if s >= total => {
            extra.push_str(&format!("Content-Range: bytes */{}\r\n", total));
            ("416 Range Not Satisfiable", &body[0..0])
        }
        Some(s) => {
            extra.push_str(&format!("Content-Range: bytes {}-{}/{}\r\n", s, total - 1, total));
            ("206 Partial Content", &body[s as usize..])
        }
        None => ("200 OK", &body[..]),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        status,
        slice.len(),
        extra
    );
    let _ = stream.write_all(response.as_bytes());

    let cut = match opts.truncate_first {
        Some(n) if nth == 0 => n.min(slice.len()),
        _ => slice.len(),
    };
    let _ = stream.write_all(&slice[..cut]);
    let _ = stream.flush();
}

fn header(raw: &str, name: &str) -> Option<String> {
    raw.lines().skip(1).find_map(|line| {
        let (n, v) = line.split_once(':')?;
        n.trim().eq_ignore_ascii_case(name).then(|| v.trim().to_string())
    })
}
