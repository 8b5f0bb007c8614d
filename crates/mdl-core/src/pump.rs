//! The transfer loop: response body → sidecar, one bounded chunk at a time.

use std::io::{self, Read};
use std::time::{Duration, Instant};

use crate::control::{CancelToken, JobAborted};
use crate::progress::{RateMeter, TransferObserver, TransferProgress};
use crate::storage::SidecarWriter;

const MIN_CHUNK: usize = 16 * 1024;
const LARGE_TRANSFER: u64 = 1024 * 1024 * 1024;

/// Destination of pumped bytes.
pub trait ChunkSink {
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()>;
    /// Absolute offset of the next byte (bytes already held, including earlier runs).
    fn position(&self) -> u64;
}

impl ChunkSink for SidecarWriter {
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        SidecarWriter::write_chunk(self, data)
    }

    fn position(&self) -> u64 {
        SidecarWriter::position(self)
    }
}

/// How the body ended when it ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// All promised bytes arrived (or the size was unknown).
    Complete,
    /// The connection closed cleanly before the promised total.
    Truncated { expected: u64, received: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpOutcome {
    /// Bytes moved by this pump call.
    pub bytes_moved: u64,
    pub status: PumpStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum PumpError {
    /// Timeout or protocol error mid-body; treated as connectivity loss.
    #[error("reading response body failed after {bytes_moved} bytes: {source}")]
    Read {
        bytes_moved: u64,
        #[source]
        source: io::Error,
    },
    /// Disk write failed (disk full, permission). Not retried.
    #[error("writing sidecar failed: {0}")]
    Write(#[source] io::Error),
    #[error(transparent)]
    Aborted(#[from] JobAborted),
}

/// Chunk size for a transfer: the base size, shrunk for small known totals
/// and grown for very large ones.
pub fn chunk_size_for(base: usize, known_total: Option<u64>) -> usize {
    let base = base.max(MIN_CHUNK);
    match known_total {
        Some(total) if total < base as u64 => (total as usize).max(MIN_CHUNK),
        Some(total) if total >= LARGE_TRANSFER => base.saturating_mul(4),
        _ => base,
    }
}

pub struct StreamPump {
    chunk_size: usize,
    rate_window: Duration,
    cancel: CancelToken,
}

impl StreamPump {
    pub fn new(chunk_size: usize, rate_window: Duration, cancel: CancelToken) -> Self {
        Self {
            chunk_size,
            rate_window,
            cancel,
        }
    }

    /// Move the whole body into `sink`, reporting progress after every chunk.
    ///
    /// `known_total` is the size of the whole resource; the sink's starting
    /// position already counts bytes held from earlier runs.
    pub fn pump<R, S>(
        &self,
        body: &mut R,
        sink: &mut S,
        known_total: Option<u64>,
        observer: &mut dyn TransferObserver,
    ) -> Result<PumpOutcome, PumpError>
    where
        R: Read + ?Sized,
        S: ChunkSink + ?Sized,
    {
        let mut buf = vec![0u8; chunk_size_for(self.chunk_size, known_total)];
        let mut meter = RateMeter::new(self.rate_window);
        let mut bytes_moved = 0u64;

        loop {
            let (n, read_err) = read_chunk(body, &mut buf);
            if n > 0 {
                sink.write_chunk(&buf[..n]).map_err(PumpError::Write)?;
                bytes_moved += n as u64;
                let rate = meter.record(n as u64, Instant::now());
                observer.on_progress(&TransferProgress {
                    bytes_done: sink.position(),
                    total_bytes: known_total,
                    bytes_per_sec: rate,
                });
                self.cancel.check()?;
            }
            if let Some(source) = read_err {
                return Err(PumpError::Read {
                    bytes_moved,
                    source,
                });
            }
            if n == 0 {
                break;
            }
        }

        let received = sink.position();
        let status = match known_total {
            Some(expected) if received < expected => PumpStatus::Truncated { expected, received },
            _ => PumpStatus::Complete,
        };
        Ok(PumpOutcome {
            bytes_moved,
            status,
        })
    }
}

/// Fill `buf` until it is full, the body ends, or a read fails. Bytes read
/// before a failure are still returned so they can be kept.
fn read_chunk<R: Read + ?Sized>(body: &mut R, buf: &mut [u8]) -> (usize, Option<io::Error>) {
    let mut filled = 0;
    while filled < buf.len() {
        match body.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return (filled, Some(e)),
        }
    }
    (filled, None)
}
