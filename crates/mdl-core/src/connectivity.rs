//! Reachability gate run before every negotiation and every recovery.

use std::time::Duration;

use crate::config::ConnectivityConfig;
use crate::control::{CancelToken, JobAborted};
use crate::progress::TransferObserver;

/// Answers "is the network up right now?".
pub trait Probe {
    fn is_reachable(&self) -> bool;
}

/// HEAD request against a well-known URL. Any HTTP answer counts as online.
#[derive(Debug, Clone)]
pub struct CurlProbe {
    url: String,
    timeout: Duration,
}

impl CurlProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &ConnectivityConfig) -> Self {
        Self::new(cfg.probe_url.clone(), Duration::from_secs(cfg.probe_timeout_secs))
    }

    fn head(&self) -> Result<(), curl::Error> {
        let mut easy = curl::easy::Easy::new();
        easy.url(&self.url)?;
        easy.nobody(true)?;
        easy.connect_timeout(self.timeout)?;
        easy.timeout(self.timeout)?;
        easy.perform()
    }
}

impl Probe for CurlProbe {
    fn is_reachable(&self) -> bool {
        match self.head() {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(url = %self.url, "reachability probe failed: {}", e);
                false
            }
        }
    }
}

/// Probe that always succeeds. For callers that do their own gating.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOnline;

impl Probe for AssumeOnline {
    fn is_reachable(&self) -> bool {
        true
    }
}

/// What to do while the network stays unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineDecision {
    KeepWaiting,
    GiveUp,
}

/// Decides, after each failed probe, whether to keep waiting.
pub trait OfflinePolicy {
    fn on_offline(&mut self, failed_probes: u32) -> OfflineDecision;
}

/// Wait for the network indefinitely.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitForever;

impl OfflinePolicy for WaitForever {
    fn on_offline(&mut self, _failed_probes: u32) -> OfflineDecision {
        OfflineDecision::KeepWaiting
    }
}

/// Give up once `n` probes in a row have failed.
#[derive(Debug, Clone, Copy)]
pub struct GiveUpAfter(pub u32);

impl OfflinePolicy for GiveUpAfter {
    fn on_offline(&mut self, failed_probes: u32) -> OfflineDecision {
        if failed_probes >= self.0 {
            OfflineDecision::GiveUp
        } else {
            OfflineDecision::KeepWaiting
        }
    }
}

impl<F> OfflinePolicy for F
where
    F: FnMut(u32) -> OfflineDecision,
{
    fn on_offline(&mut self, failed_probes: u32) -> OfflineDecision {
        self(failed_probes)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("network unreachable and waiting was declined")]
    Abandoned,
    #[error(transparent)]
    Aborted(#[from] JobAborted),
}

/// Probe + policy + poll interval: blocks until the network answers.
pub struct ConnectivityGate {
    probe: Box<dyn Probe + Send>,
    policy: Box<dyn OfflinePolicy + Send>,
    poll_interval: Duration,
    cancel: CancelToken,
}

impl ConnectivityGate {
    pub fn new(
        probe: Box<dyn Probe + Send>,
        policy: Box<dyn OfflinePolicy + Send>,
        poll_interval: Duration,
        cancel: CancelToken,
    ) -> Self {
        Self {
            probe,
            policy,
            poll_interval,
            cancel,
        }
    }

    pub(crate) fn set_probe(&mut self, probe: Box<dyn Probe + Send>) {
        self.probe = probe;
    }

    pub(crate) fn set_policy(&mut self, policy: Box<dyn OfflinePolicy + Send>) {
        self.policy = policy;
    }

    pub(crate) fn set_cancel(&mut self, cancel: CancelToken) {
        self.cancel = cancel;
    }

    /// Returns once a probe succeeds. Fails if the policy gives up or the job
    /// is cancelled while waiting.
    pub fn wait_until_online(&mut self, observer: &mut dyn TransferObserver) -> Result<(), GateError> {
        let mut failures = 0u32;
        loop {
            self.cancel.check()?;
            if self.probe.is_reachable() {
                if failures > 0 {
                    tracing::info!(failed_probes = failures, "connectivity restored");
                }
                return Ok(());
            }
            failures += 1;
            tracing::warn!(failed_probes = failures, "no internet connection");
            observer.on_offline(failures);
            match self.policy.on_offline(failures) {
                OfflineDecision::GiveUp => return Err(GateError::Abandoned),
                OfflineDecision::KeepWaiting => self.cancel.sleep(self.poll_interval)?,
            }
        }
    }
}

impl std::fmt::Debug for ConnectivityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityGate")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
