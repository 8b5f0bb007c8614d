//! Progress reporting for a transfer (bytes done, rate, ETA).
//!
//! The engine never renders anything; it hands `TransferProgress` snapshots
//! and retry/restart notifications to a caller-provided `TransferObserver`.

use std::time::{Duration, Instant};

/// ETAs beyond this are reported as unknown (roughly 100 days).
const MAX_ETA_SECS: f64 = 100.0 * 24.0 * 3600.0;

/// Snapshot of download progress for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    /// Bytes in the sidecar so far, including those from earlier runs.
    pub bytes_done: u64,
    /// Total resource size, if the server told us.
    pub total_bytes: Option<u64>,
    /// Smoothed throughput in bytes per second (0 until the first window closes).
    pub bytes_per_sec: f64,
}

impl TransferProgress {
    /// Estimated time remaining; `None` when unknown.
    pub fn eta(&self) -> Option<Duration> {
        let total = self.total_bytes?;
        if self.bytes_done >= total {
            return Some(Duration::ZERO);
        }
        if self.bytes_per_sec <= 0.0 {
            return None;
        }
        let secs = (total - self.bytes_done) as f64 / self.bytes_per_sec;
        if !secs.is_finite() || secs > MAX_ETA_SECS {
            return None;
        }
        Some(Duration::from_secs_f64(secs))
    }

    /// Fraction complete in [0.0, 1.0], only when the total is known.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.total_bytes?;
        if total == 0 {
            return Some(1.0);
        }
        Some((self.bytes_done as f64 / total as f64).min(1.0))
    }
}

/// Why the orchestrator went back to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartReason {
    /// Network call failed; connectivity has since been confirmed.
    ConnectivityLost,
    /// Body ended cleanly before the promised size.
    Truncated { expected: u64, received: u64 },
    /// Server could not serve the requested offset; starting from zero.
    RangeUnsatisfiable,
}

/// Receives engine notifications. Every method has a no-op default.
pub trait TransferObserver {
    /// Called after every chunk written to the sidecar.
    fn on_progress(&mut self, _progress: &TransferProgress) {}

    /// Called once per second while counting down to a status retry.
    fn on_retry_countdown(&mut self, _status: u16, _attempt: u32, _max_attempts: u32, _remaining: Duration) {}

    /// Called whenever the job restarts from `Idle`.
    fn on_restart(&mut self, _reason: &RestartReason) {}

    /// Called after each failed reachability probe.
    fn on_offline(&mut self, _failed_probes: u32) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl TransferObserver for NoProgress {}

/// Any `FnMut(&TransferProgress)` can observe progress only.
impl<F> TransferObserver for F
where
    F: FnMut(&TransferProgress),
{
    fn on_progress(&mut self, progress: &TransferProgress) {
        self(progress)
    }
}

/// Throughput averaged over a minimum window, so chunks that arrive faster
/// than the clock resolution do not produce nonsensical rates.
#[derive(Debug, Clone)]
pub struct RateMeter {
    window: Duration,
    window_start: Instant,
    window_bytes: u64,
    rate: f64,
}

impl RateMeter {
    pub fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: Duration, now: Instant) -> Self {
        Self {
            window,
            window_start: now,
            window_bytes: 0,
            rate: 0.0,
        }
    }

    /// Account `bytes` received at `now`; recomputes the rate once the window has elapsed.
    pub fn record(&mut self, bytes: u64, now: Instant) -> f64 {
        self.window_bytes += bytes;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= self.window && !elapsed.is_zero() {
            self.rate = self.window_bytes as f64 / elapsed.as_secs_f64();
            self.window_start = now;
            self.window_bytes = 0;
        }
        self.rate
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}
