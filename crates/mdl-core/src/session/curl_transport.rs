//! libcurl transport.
//!
//! curl drives a transfer through callbacks, but the engine wants to look at
//! the headers first and then pull the body at its own pace. Each request runs
//! on a helper thread that forwards the header block and body chunks over a
//! bounded channel; `send` returns once the headers have arrived and hands back
//! the rest as a blocking `Read`. Dropping the body aborts the transfer and
//! waits for the handle to go back to the pool, so the next request reuses
//! its connection and cookies.

use std::cell::{Cell, RefCell};
use std::io::{self, Read};
use std::str;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use curl::easy::{Easy, List};

use super::headers::parse_head;
use super::transport::{HttpRequest, HttpResponse, ResponseHead, Transport, TransportError};
use crate::retry::{classify_curl_error, ErrorKind};

/// Body chunks buffered between the curl thread and the reader.
const CHANNEL_DEPTH: usize = 64;
const BUFFER_SIZE: usize = 256 * 1024;
const MAX_REDIRECTS: u32 = 10;

enum Event {
    Head(ResponseHead),
    Data(Vec<u8>),
    Failed(curl::Error),
    End,
}

/// Transport backed by one reusable curl handle.
///
/// The handle is returned to the pool after each transfer, so consecutive
/// requests to the same host share the connection and curl's in-memory cookie
/// store.
#[derive(Clone, Default)]
pub struct CurlTransport {
    idle: Arc<Mutex<Option<Easy>>>,
}

impl CurlTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn checkout(&self) -> Easy {
        self.idle
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or_else(Easy::new)
    }
}

impl Transport for CurlTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let easy = self.checkout();
        let (tx, rx) = mpsc::sync_channel::<Event>(CHANNEL_DEPTH);
        let idle = Arc::clone(&self.idle);
        let req = request.clone();

        let worker = std::thread::Builder::new()
            .name("mdl-curl".into())
            .spawn(move || {
                let easy = run_transfer(easy, &req, &tx);
                if let Ok(mut slot) = idle.lock() {
                    *slot = Some(easy);
                }
            })
            .map_err(|e| TransportError::Fatal(format!("spawn transfer thread: {}", e)))?;

        match rx.recv() {
            Ok(Event::Head(head)) => {
                tracing::debug!(
                    url = %request.url,
                    status = head.status,
                    content_range = ?head.content_range,
                    content_length = ?head.content_length,
                    "response headers received"
                );
                Ok(HttpResponse {
                    head,
                    body: Box::new(CurlBody {
                        rx,
                        chunk: Vec::new(),
                        pos: 0,
                        finished: false,
                        worker: Some(worker),
                    }),
                })
            }
            other => {
                drop(rx);
                join_worker(worker);
                match other {
                    Ok(Event::Failed(e)) => Err(transport_error(&e)),
                    _ => Err(TransportError::Fatal("transfer ended without a response".into())),
                }
            }
        }
    }
}

fn join_worker(worker: JoinHandle<()>) {
    if worker.join().is_err() {
        tracing::warn!("curl transfer thread panicked; handle not returned to the pool");
    }
}

pub(crate) fn transport_error(e: &curl::Error) -> TransportError {
    match classify_curl_error(e) {
        ErrorKind::Connectivity => TransportError::Connectivity(e.to_string()),
        _ => TransportError::Fatal(e.to_string()),
    }
}

fn configure(easy: &mut Easy, req: &HttpRequest) -> Result<(), curl::Error> {
    easy.url(&req.url)?;
    match req.method.to_ascii_uppercase().as_str() {
        "GET" => easy.get(true)?,
        "HEAD" => easy.nobody(true)?,
        other => easy.custom_request(other)?,
    }
    easy.follow_location(true)?;
    easy.max_redirections(MAX_REDIRECTS)?;
    easy.buffer_size(BUFFER_SIZE)?;
    easy.connect_timeout(req.timeout)?;
    // A body that stalls for a whole timeout counts as a lost connection.
    easy.low_speed_limit(1)?;
    easy.low_speed_time(req.timeout)?;
    // Empty path: enable the in-memory cookie engine without reading a file.
    easy.cookie_file("")?;
    if let Some(cookies) = &req.cookies {
        easy.cookie(cookies)?;
    }

    let mut list = List::new();
    for (k, v) in &req.headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    easy.http_headers(list)?;
    Ok(())
}

/// Runs one request to completion, streaming events to `tx`. Returns the
/// handle for reuse.
fn run_transfer(mut easy: Easy, req: &HttpRequest, tx: &SyncSender<Event>) -> Easy {
    easy.reset();
    if let Err(e) = configure(&mut easy, req) {
        let _ = tx.send(Event::Failed(e));
        return easy;
    }

    let lines: RefCell<Vec<String>> = RefCell::new(Vec::new());
    let head_sent = Cell::new(false);
    let result = perform(&mut easy, &lines, &head_sent, tx);

    match result {
        Ok(()) => {
            if !head_sent.get() {
                // No body at all (HEAD, 204, bodiless 416).
                let _ = tx.send(Event::Head(parse_head(&lines.borrow())));
            }
            let _ = tx.send(Event::End);
        }
        Err(e) => {
            if !e.is_write_error() {
                tracing::debug!(url = %req.url, "curl transfer failed: {}", e);
            }
            let _ = tx.send(Event::Failed(e));
        }
    }
    easy
}

fn perform(
    easy: &mut Easy,
    lines: &RefCell<Vec<String>>,
    head_sent: &Cell<bool>,
    tx: &SyncSender<Event>,
) -> Result<(), curl::Error> {
    let mut transfer = easy.transfer();
    transfer.header_function(|data| {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            let mut lines = lines.borrow_mut();
            // Each redirect or interim response starts a new block.
            if line.starts_with("HTTP/") {
                lines.clear();
            }
            lines.push(line.to_string());
        }
        true
    })?;
    transfer.write_function(|data| {
        if !head_sent.get() {
            head_sent.set(true);
            if tx.send(Event::Head(parse_head(&lines.borrow()))).is_err() {
                return Ok(0);
            }
        }
        // A closed channel means the reader dropped the body: abort.
        match tx.send(Event::Data(data.to_vec())) {
            Ok(()) => Ok(data.len()),
            Err(_) => Ok(0),
        }
    })?;
    transfer.perform()
}

/// Blocking reader over the body chunks coming from the curl thread.
struct CurlBody {
    rx: Receiver<Event>,
    chunk: Vec<u8>,
    pos: usize,
    finished: bool,
    /// Returns the curl handle to the pool when it exits.
    worker: Option<JoinHandle<()>>,
}

impl Drop for CurlBody {
    fn drop(&mut self) {
        // Close our end first so a blocked write callback aborts the transfer.
        let (_, closed) = mpsc::sync_channel(0);
        drop(std::mem::replace(&mut self.rx, closed));
        if let Some(worker) = self.worker.take() {
            join_worker(worker);
        }
    }
}

impl Read for CurlBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.chunk.len() {
            if self.finished {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Event::Data(data)) => {
                    self.chunk = data;
                    self.pos = 0;
                }
                Ok(Event::End) => self.finished = true,
                Ok(Event::Head(_)) => {}
                Ok(Event::Failed(e)) => {
                    self.finished = true;
                    let kind = if e.is_operation_timedout() {
                        io::ErrorKind::TimedOut
                    } else {
                        io::ErrorKind::ConnectionAborted
                    };
                    return Err(io::Error::new(kind, e));
                }
                Err(_) => {
                    self.finished = true;
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "transfer thread exited without finishing the body",
                    ));
                }
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
