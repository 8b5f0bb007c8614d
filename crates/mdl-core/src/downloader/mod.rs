//! The job orchestrator: an explicit state machine over negotiation, transfer
//! and finalization.
//!
//! Every restart (connectivity loss, truncated body, unsatisfiable range) goes
//! back to `Idle` and re-reads the sidecar length, so the sidecar on disk is
//! the only progress record carried between attempts.

mod outcome;


use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::EngineConfig;
use crate::connectivity::{ConnectivityGate, CurlProbe, OfflinePolicy, Probe, WaitForever};
use crate::control::CancelToken;
use crate::destination::Destination;
use crate::progress::{RestartReason, TransferObserver};
use crate::pump::{PumpError, PumpOutcome, PumpStatus, StreamPump};
use crate::request::TransferRequest;
use crate::retry::{RetryPolicy, TimeoutEscalation};
use crate::session::{CurlTransport, NegotiateError, Negotiated, Transport, TransferSession};
use crate::storage::{FinalizeSpec, ResumeStore, StoreError};

pub use outcome::{FailureReason, JobOutcome, JobState};

/// Runs download jobs one at a time against a transport.
pub struct Downloader<T: Transport = CurlTransport> {
    config: EngineConfig,
    transport: T,
    gate: ConnectivityGate,
    cancel: CancelToken,
}

impl Downloader<CurlTransport> {
    /// curl transport, HEAD probe from the config, wait forever while offline.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_transport(config, CurlTransport::new())
    }
}

impl<T: Transport> Downloader<T> {
    pub fn with_transport(config: EngineConfig, transport: T) -> Self {
        let cancel = CancelToken::new();
        let gate = ConnectivityGate::new(
            Box::new(CurlProbe::from_config(&config.connectivity)),
            Box::new(WaitForever),
            config.poll_interval(),
            cancel.clone(),
        );
        Self {
            config,
            transport,
            gate,
            cancel,
        }
    }

    pub fn probe(mut self, probe: impl Probe + Send + 'static) -> Self {
        self.gate.set_probe(Box::new(probe));
        self
    }

    pub fn offline_policy(mut self, policy: impl OfflinePolicy + Send + 'static) -> Self {
        self.gate.set_policy(Box::new(policy));
        self
    }

    /// Use an existing token, e.g. one shared with a signal handler.
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.gate.set_cancel(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Handle for cancelling jobs run by this downloader.
    pub fn canceller(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one job to a terminal state.
    pub fn run(&mut self, request: &TransferRequest, observer: &mut dyn TransferObserver) -> JobOutcome {
        tracing::info!(url = %request.url, method = %request.method, "job started");
        let outcome = self.drive(request, observer);
        match &outcome {
            JobOutcome::Done { path, bytes } => {
                tracing::info!(path = %path.display(), bytes, "job done")
            }
            JobOutcome::Skipped { path } => {
                tracing::info!(path = %path.display(), "job skipped: file exists")
            }
            JobOutcome::Failed { reason, partial } => tracing::warn!(
                partial = ?partial,
                "job failed: {}",
                reason
            ),
        }
        outcome
    }

    fn drive(&mut self, request: &TransferRequest, observer: &mut dyn TransferObserver) -> JobOutcome {
        let mut state = JobState::Idle;

        let mut dest = match Destination::resolve(&request.url, request.destination.as_deref()) {
            Ok(d) => d,
            Err(e) => return failed(e.into(), None),
        };
        if request.skip_existing && dest.final_path().exists() {
            return JobOutcome::Skipped {
                path: dest.final_path(),
            };
        }

        let policy = RetryPolicy::from_config(&self.config.retry);
        let mut timeouts = match request.timeout {
            Some(base) => {
                let t = &self.config.timeouts;
                TimeoutEscalation::new(
                    base,
                    Duration::from_secs(t.step_secs),
                    Duration::from_secs(t.max_secs),
                )
            }
            None => TimeoutEscalation::from_config(&self.config.timeouts),
        };
        let mut from_zero = false;

        loop {
            enter(&mut state, JobState::Idle);
            let mut store = ResumeStore::new(&dest.final_path());
            let offset = if from_zero {
                0
            } else {
                match store.current_length() {
                    Ok(n) => n,
                    Err(e) => return failed(e.into(), None),
                }
            };
            from_zero = false;

            enter(&mut state, JobState::Negotiating);
            let session = TransferSession::new(&self.transport, request, policy, self.cancel.clone());
            let Negotiated { range, mut body } =
                match session.negotiate(offset, timeouts.current(), &mut self.gate, observer) {
                    Ok(n) => n,
                    Err(NegotiateError::Unsatisfiable { offset, total }) => {
                        tracing::warn!(offset, total = ?total, "range not satisfiable; restarting from byte 0");
                        observer.on_restart(&RestartReason::RangeUnsatisfiable);
                        from_zero = true;
                        continue;
                    }
                    Err(NegotiateError::Connectivity(msg)) => {
                        tracing::warn!("negotiation lost the connection: {}", msg);
                        match self.recover(&mut state, &mut timeouts, RestartReason::ConnectivityLost, observer) {
                            Ok(()) => continue,
                            Err(reason) => return failed(reason, existing(store.partial_path())),
                        }
                    }
                    Err(NegotiateError::RetriesExhausted { status, attempts }) => {
                        return failed(
                            FailureReason::RetriesExhausted { status, attempts },
                            existing(store.partial_path()),
                        );
                    }
                    Err(NegotiateError::Fatal(msg)) => {
                        return failed(FailureReason::Transport(msg), existing(store.partial_path()));
                    }
                    Err(NegotiateError::Gate(e)) => return failed(e.into(), existing(store.partial_path())),
                };

            if let Some(renamed) = dest.adopt_server_filename(range.content_disposition.as_deref()) {
                if request.skip_existing && renamed.exists() {
                    return JobOutcome::Skipped { path: renamed };
                }
                store = ResumeStore::new(&renamed);
                let held = match store.current_length() {
                    Ok(n) => n,
                    Err(e) => return failed(e.into(), None),
                };
                if held != range.requested_offset {
                    // The body was negotiated for another sidecar's length.
                    tracing::debug!(held, offset = range.requested_offset, "renegotiating for server-provided filename");
                    continue;
                }
            }

            enter(&mut state, JobState::Transferring);
            let mut writer = match store.open_for(&range) {
                Ok(w) => w,
                Err(StoreError::Gap { local, confirmed }) => {
                    tracing::warn!(local, confirmed, "server resumed past local data; restarting from byte 0");
                    observer.on_restart(&RestartReason::RangeUnsatisfiable);
                    from_zero = true;
                    continue;
                }
                Err(e) => return failed(e.into(), existing(store.partial_path())),
            };
            let pump = StreamPump::new(self.config.chunk_size, self.config.rate_window(), self.cancel.clone());
            let pumped = pump.pump(&mut body, &mut writer, range.total_size, observer);
            if let Err(e) = writer.sync() {
                tracing::warn!(path = %writer.path().display(), "sidecar sync failed: {}", e);
            }
            drop(writer);
            drop(body);

            match pumped {
                Ok(PumpOutcome {
                    status: PumpStatus::Complete,
                    bytes_moved,
                }) => {
                    tracing::debug!(bytes_moved, "body complete");
                }
                Ok(PumpOutcome {
                    status: PumpStatus::Truncated { expected, received },
                    ..
                }) => {
                    tracing::warn!(expected, received, "body ended early");
                    let reason = RestartReason::Truncated { expected, received };
                    if let Err(reason) = self.recover(&mut state, &mut timeouts, reason, observer) {
                        return failed(reason, existing(store.partial_path()));
                    }
                    continue;
                }
                Err(PumpError::Read { bytes_moved, source }) => {
                    tracing::warn!(bytes_moved, "connection lost mid-body: {}", source);
                    if let Err(reason) =
                        self.recover(&mut state, &mut timeouts, RestartReason::ConnectivityLost, observer)
                    {
                        return failed(reason, existing(store.partial_path()));
                    }
                    continue;
                }
                Err(PumpError::Write(e)) => {
                    return failed(FailureReason::Write(e), existing(store.partial_path()));
                }
                Err(PumpError::Aborted(_)) => {
                    return failed(FailureReason::Cancelled, existing(store.partial_path()));
                }
            }

            enter(&mut state, JobState::Finalizing);
            let spec = FinalizeSpec {
                expected_size: range.total_size,
                content_encoding: range.content_encoding.as_deref(),
                expected_sha256: request.expected_sha256.as_deref(),
            };
            return match store.finalize(spec) {
                Ok(bytes) => JobOutcome::Done {
                    path: dest.final_path(),
                    bytes,
                },
                Err(e) => failed(e.into(), existing(store.partial_path())),
            };
        }
    }

    /// AwaitingConnectivity: escalate the timeout, block on the gate, then
    /// hand control back to `Idle`.
    fn recover(
        &mut self,
        state: &mut JobState,
        timeouts: &mut TimeoutEscalation,
        reason: RestartReason,
        observer: &mut dyn TransferObserver,
    ) -> Result<(), FailureReason> {
        enter(state, JobState::AwaitingConnectivity);
        let timeout = timeouts.escalate();
        tracing::warn!(
            timeout_secs = timeout.as_secs(),
            losses = timeouts.losses(),
            "waiting for connectivity before restarting"
        );
        self.gate.wait_until_online(observer)?;
        observer.on_restart(&reason);
        Ok(())
    }
}

fn enter(state: &mut JobState, next: JobState) {
    if *state != next {
        tracing::info!(from = ?*state, to = ?next, "state transition");
    }
    *state = next;
}

fn failed(reason: FailureReason, partial: Option<PathBuf>) -> JobOutcome {
    JobOutcome::Failed { reason, partial }
}

fn existing(path: &Path) -> Option<PathBuf> {
    path.exists().then(|| path.to_path_buf())
}
