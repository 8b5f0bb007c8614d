//! Single-line progress display on stderr.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use mdl_core::progress::RestartReason;
use mdl_core::{TransferObserver, TransferProgress};

const REDRAW_EVERY: Duration = Duration::from_millis(200);
const MIB: f64 = 1024.0 * 1024.0;

pub struct ProgressLine {
    last_draw: Option<Instant>,
    dirty: bool,
}

impl ProgressLine {
    pub fn new() -> Self {
        Self {
            last_draw: None,
            dirty: false,
        }
    }

    /// End the current line so later output starts clean.
    pub fn finish(&mut self) {
        if self.dirty {
            eprintln!();
            self.dirty = false;
        }
    }

    fn draw(&mut self, text: &str) {
        let mut err = io::stderr().lock();
        let _ = write!(err, "\r\x1b[2K{}", text);
        let _ = err.flush();
        self.dirty = true;
    }

    fn message(&mut self, text: &str) {
        self.finish();
        eprintln!("{}", text);
        self.last_draw = None;
    }
}

impl TransferObserver for ProgressLine {
    fn on_progress(&mut self, p: &TransferProgress) {
        let now = Instant::now();
        let finished = p.total_bytes.is_some_and(|t| p.bytes_done >= t);
        if !finished && self.last_draw.is_some_and(|t| now.duration_since(t) < REDRAW_EVERY) {
            return;
        }
        self.last_draw = Some(now);
        self.draw(&format_progress(p));
    }

    fn on_retry_countdown(&mut self, status: u16, attempt: u32, max_attempts: u32, remaining: Duration) {
        self.draw(&format!(
            "HTTP {}; retrying in {}s (attempt {}/{})",
            status,
            remaining.as_secs(),
            attempt + 1,
            max_attempts
        ));
    }

    fn on_restart(&mut self, reason: &RestartReason) {
        let text = match reason {
            RestartReason::ConnectivityLost => "connection lost; resuming".to_string(),
            RestartReason::Truncated { expected, received } => {
                format!("transfer ended at {} of {} bytes; resuming", received, expected)
            }
            RestartReason::RangeUnsatisfiable => "server cannot resume this file; starting over".to_string(),
        };
        self.message(&text);
    }

    fn on_offline(&mut self, failed_probes: u32) {
        self.draw(&format!("network unreachable; waiting (probe {})", failed_probes));
    }
}

pub fn format_progress(p: &TransferProgress) -> String {
    let done = p.bytes_done as f64 / MIB;
    let rate = p.bytes_per_sec / MIB;
    match (p.total_bytes, p.fraction()) {
        (Some(total), Some(frac)) => format!(
            "{:.1}/{:.1} MiB {:5.1}% {:.2} MiB/s ETA {}",
            done,
            total as f64 / MIB,
            frac * 100.0,
            rate,
            format_eta(p.eta())
        ),
        _ => format!("{:.1} MiB {:.2} MiB/s", done, rate),
    }
}

pub fn format_eta(eta: Option<Duration>) -> String {
    let Some(eta) = eta else {
        return "--:--".to_string();
    };
    let secs = eta.as_secs();
    if secs >= 3600 {
        format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
    } else {
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}
