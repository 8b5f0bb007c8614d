//! Cooperative cancellation for a running job.
//!
//! The engine checks the token only at its suspension boundaries: after each
//! chunk write, during retry countdowns, and while waiting for connectivity.
//! A request therefore takes effect once the current chunk is on disk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Error returned when a download is stopped by the caller.
#[derive(Debug)]
pub struct JobAborted;

impl std::fmt::Display for JobAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job aborted by user")
    }
}

impl std::error::Error for JobAborted {}

/// Shared abort flag. Clone it, hand one copy to the `Downloader`, and call
/// `cancel` from anywhere (signal handler, another thread).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// `Err(JobAborted)` once cancellation was requested.
    pub fn check(&self) -> Result<(), JobAborted> {
        if self.is_cancelled() {
            Err(JobAborted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `total`, waking in short slices to notice cancellation.
    pub fn sleep(&self, total: Duration) -> Result<(), JobAborted> {
        const SLICE: Duration = Duration::from_millis(100);
        let deadline = Instant::now() + total;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(a.check().is_ok());
        b.cancel();
        assert!(a.is_cancelled());
        assert!(a.check().is_err());
    }

    #[test]
    fn sleep_returns_early_when_cancelled() {
        let t = CancelToken::new();
        t.cancel();
        let start = Instant::now();
        assert!(t.sleep(Duration::from_secs(5)).is_err());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn sleep_zero_is_immediate() {
        let t = CancelToken::new();
        assert!(t.sleep(Duration::ZERO).is_ok());
    }
}
