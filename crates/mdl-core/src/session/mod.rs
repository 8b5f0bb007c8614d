//! Range negotiation: one request (plus bounded status retries) that turns a
//! resume offset into a `NegotiatedRange` and a live response body.

mod curl_transport;
mod headers;
mod transport;

use std::io::Read;
use std::time::Duration;

use crate::connectivity::{ConnectivityGate, GateError};
use crate::control::{CancelToken, JobAborted};
use crate::decompress::accept_encoding_header;
use crate::progress::TransferObserver;
use crate::range::{parse_content_range, ByteRangeSpec, ContentRange, NegotiatedRange};
use crate::request::TransferRequest;
use crate::retry::{classify_http_status, RetryDecision, RetryPolicy, RetryState};

pub use curl_transport::CurlTransport;
pub use transport::{HttpRequest, HttpResponse, ResponseHead, Transport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum NegotiateError {
    /// Server cannot serve the requested offset; restart from zero.
    #[error("range starting at byte {offset} not satisfiable (server total {total:?})")]
    Unsatisfiable { offset: u64, total: Option<u64> },
    #[error("HTTP {status} after {attempts} attempts")]
    RetriesExhausted { status: u16, attempts: u32 },
    #[error("connection failed: {0}")]
    Connectivity(String),
    #[error("request failed: {0}")]
    Fatal(String),
    #[error(transparent)]
    Gate(#[from] GateError),
}

impl From<JobAborted> for NegotiateError {
    fn from(e: JobAborted) -> Self {
        NegotiateError::Gate(GateError::Aborted(e))
    }
}

/// Result of a successful negotiation.
pub struct Negotiated {
    pub range: NegotiatedRange,
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for Negotiated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Negotiated")
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

/// How a response head answers the request we made.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Accept(NegotiatedRange),
    /// 200 for a non-zero offset: ranges unsupported, ask again from zero.
    RangeIgnored,
    Unsatisfiable { total: Option<u64> },
    Failed(u32),
}

fn judge(offset: u64, head: &ResponseHead) -> Verdict {
    let accept = |confirmed_offset: u64, total_size: Option<u64>| {
        Verdict::Accept(NegotiatedRange {
            requested_offset: offset,
            confirmed_offset,
            total_size,
            accepts_ranges: head.accept_ranges,
            content_encoding: head.content_encoding.clone(),
            content_disposition: head.content_disposition.clone(),
        })
    };
    let content_range = head.content_range.as_deref().and_then(parse_content_range);

    match head.status {
        206 => match content_range {
            Some(ContentRange::Satisfied { start, total, .. }) => accept(start, total),
            Some(ContentRange::Unsatisfiable { total }) if offset > 0 => {
                Verdict::Unsatisfiable { total }
            }
            _ => Verdict::Failed(206),
        },
        416 if offset > 0 => Verdict::Unsatisfiable {
            total: match content_range {
                Some(ContentRange::Unsatisfiable { total }) => total,
                _ => None,
            },
        },
        200 if offset != 0 => Verdict::RangeIgnored,
        200 => accept(0, head.content_length),
        other => Verdict::Failed(other),
    }
}

/// Issues requests for one job. Holds no state between negotiations except
/// what the transport keeps (connection, cookies).
pub struct TransferSession<'a, T: Transport + ?Sized> {
    transport: &'a T,
    request: &'a TransferRequest,
    policy: RetryPolicy,
    cancel: CancelToken,
}

impl<'a, T: Transport + ?Sized> TransferSession<'a, T> {
    pub fn new(
        transport: &'a T,
        request: &'a TransferRequest,
        policy: RetryPolicy,
        cancel: CancelToken,
    ) -> Self {
        Self {
            transport,
            request,
            policy,
            cancel,
        }
    }

    /// Wire request for `offset`: engine defaults first, caller overrides on top.
    pub fn build_request(&self, offset: u64, timeout: Duration) -> HttpRequest {
        let mut headers = vec![("Accept-Encoding".to_string(), accept_encoding_header())];
        if let Some(range) = ByteRangeSpec::from_offset(offset).header_value() {
            headers.push(("Range".to_string(), range));
        }
        for (name, value) in &self.request.headers {
            headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }
        HttpRequest {
            url: self.request.url.clone(),
            method: self.request.method.clone(),
            headers,
            cookies: self.request.cookie_header(),
            timeout,
        }
    }

    /// Negotiate a body starting at `offset`.
    ///
    /// Unusable statuses are retried after a countdown up to the policy bound.
    /// A 200 for a non-zero offset is re-asked at zero without counting as an
    /// attempt. Connectivity failures return immediately; the caller owns
    /// recovery.
    pub fn negotiate(
        &self,
        offset: u64,
        timeout: Duration,
        gate: &mut ConnectivityGate,
        observer: &mut dyn TransferObserver,
    ) -> Result<Negotiated, NegotiateError> {
        let mut offset = offset;
        let mut retry = RetryState::default();

        loop {
            self.cancel.check()?;
            gate.wait_until_online(observer)?;

            let request = self.build_request(offset, timeout);
            tracing::debug!(
                url = %request.url,
                method = %request.method,
                offset,
                timeout_secs = timeout.as_secs(),
                "negotiating"
            );
            let response = self.transport.send(&request).map_err(|e| match e {
                TransportError::Connectivity(msg) => NegotiateError::Connectivity(msg),
                TransportError::Fatal(msg) => NegotiateError::Fatal(msg),
            })?;

            match judge(offset, &response.head) {
                Verdict::Accept(range) => {
                    tracing::debug!(
                        status = response.head.status,
                        confirmed_offset = range.confirmed_offset,
                        total = ?range.total_size,
                        encoding = ?range.content_encoding,
                        "negotiated"
                    );
                    return Ok(Negotiated {
                        range,
                        body: response.body,
                    });
                }
                Verdict::RangeIgnored => {
                    tracing::info!(offset, "server ignored the range request; restarting from byte 0");
                    offset = 0;
                }
                Verdict::Unsatisfiable { total } => {
                    return Err(NegotiateError::Unsatisfiable { offset, total });
                }
                Verdict::Failed(status) => {
                    let kind = classify_http_status(status);
                    let attempt = retry.record(kind);
                    let status = u16::try_from(status).unwrap_or(u16::MAX);
                    match self.policy.decide(attempt, kind) {
                        RetryDecision::GiveUp => {
                            tracing::warn!(status, attempts = attempt, "giving up");
                            return Err(NegotiateError::RetriesExhausted {
                                status,
                                attempts: attempt,
                            });
                        }
                        RetryDecision::RetryAfter(delay) => {
                            tracing::warn!(
                                status,
                                attempt,
                                max_attempts = self.policy.max_attempts,
                                "unusable response; retrying in {}s",
                                delay.as_secs()
                            );
                            self.countdown(delay, status, attempt, observer)?;
                        }
                    }
                }
            }
        }
    }

    /// Sleep `delay`, reporting the remaining time once per second.
    fn countdown(
        &self,
        delay: Duration,
        status: u16,
        attempt: u32,
        observer: &mut dyn TransferObserver,
    ) -> Result<(), JobAborted> {
        let mut remaining = delay;
        while !remaining.is_zero() {
            observer.on_retry_countdown(status, attempt, self.policy.max_attempts, remaining);
            let tick = remaining.min(Duration::from_secs(1));
            self.cancel.sleep(tick)?;
            remaining -= tick;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{AssumeOnline, WaitForever};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Replays canned heads and records every request.
    struct Scripted {
        heads: Mutex<Vec<ResponseHead>>,
        sent: Mutex<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn new(mut heads: Vec<ResponseHead>) -> Self {
            heads.reverse();
            Self {
                heads: Mutex::new(heads),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<HttpRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for Scripted {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.sent.lock().unwrap().push(request.clone());
            let head = self
                .heads
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| TransportError::Connectivity("script exhausted".into()))?;
            Ok(HttpResponse {
                head,
                body: Box::new(Cursor::new(Vec::new())),
            })
        }
    }

    fn head(status: u32) -> ResponseHead {
        ResponseHead {
            status,
            ..Default::default()
        }
    }

    fn partial(range: &str) -> ResponseHead {
        ResponseHead {
            status: 206,
            content_range: Some(range.to_string()),
            accept_ranges: true,
            ..Default::default()
        }
    }

    fn gate() -> ConnectivityGate {
        ConnectivityGate::new(
            Box::new(AssumeOnline),
            Box::new(WaitForever),
            Duration::from_millis(1),
            CancelToken::new(),
        )
    }

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            countdown: Duration::ZERO,
        }
    }

    #[derive(Default)]
    struct Ticks(Vec<(u16, u32, Duration)>);

    impl TransferObserver for Ticks {
        fn on_retry_countdown(&mut self, status: u16, attempt: u32, _max: u32, remaining: Duration) {
            self.0.push((status, attempt, remaining));
        }
    }

    #[test]
    fn judge_status_table() {
        assert!(matches!(
            judge(100, &partial("bytes 100-199/200")),
            Verdict::Accept(NegotiatedRange { confirmed_offset: 100, total_size: Some(200), .. })
        ));
        assert!(matches!(
            judge(100, &partial("bytes 100-199/*")),
            Verdict::Accept(NegotiatedRange { total_size: None, .. })
        ));
        assert_eq!(
            judge(300, &partial("bytes */200")),
            Verdict::Unsatisfiable { total: Some(200) }
        );
        assert_eq!(
            judge(300, &ResponseHead {
                status: 416,
                content_range: Some("bytes */200".into()),
                ..Default::default()
            }),
            Verdict::Unsatisfiable { total: Some(200) }
        );
        assert_eq!(judge(100, &head(200)), Verdict::RangeIgnored);
        assert!(matches!(
            judge(0, &ResponseHead {
                status: 200,
                content_length: Some(42),
                ..Default::default()
            }),
            Verdict::Accept(NegotiatedRange { confirmed_offset: 0, total_size: Some(42), .. })
        ));
        assert_eq!(judge(0, &partial("garbage")), Verdict::Failed(206));
        assert_eq!(judge(0, &head(416)), Verdict::Failed(416));
        assert_eq!(judge(0, &head(503)), Verdict::Failed(503));
    }

    #[test]
    fn request_headers_and_overrides() {
        let req = TransferRequest::new("http://h/f")
            .header("accept-encoding", "identity")
            .header("X-Token", "t")
            .cookie("a", "1");
        let t = Scripted::new(vec![]);
        let s = TransferSession::new(&t, &req, RetryPolicy::default(), CancelToken::new());

        let r = s.build_request(0, Duration::from_secs(10));
        assert_eq!(r.header("Range"), None);
        assert_eq!(r.header("Accept-Encoding"), Some("identity"));
        assert_eq!(r.headers.iter().filter(|(n, _)| n.eq_ignore_ascii_case("accept-encoding")).count(), 1);
        assert_eq!(r.header("x-token"), Some("t"));
        assert_eq!(r.cookies.as_deref(), Some("a=1"));

        let r = s.build_request(512, Duration::from_secs(10));
        assert_eq!(r.header("Range"), Some("bytes=512-"));
    }

    #[test]
    fn default_accept_encoding_lists_supported_codings() {
        let req = TransferRequest::new("http://h/f");
        let t = Scripted::new(vec![]);
        let s = TransferSession::new(&t, &req, RetryPolicy::default(), CancelToken::new());
        let r = s.build_request(0, Duration::from_secs(1));
        let ae = r.header("Accept-Encoding").unwrap();
        for coding in ["gzip", "deflate", "br", "identity"] {
            assert!(ae.contains(coding), "{} missing from {}", coding, ae);
        }
    }

    #[test]
    fn ignored_range_renegotiates_at_zero_without_counting() {
        let req = TransferRequest::new("http://h/f");
        let t = Scripted::new(vec![
            head(200),
            ResponseHead {
                status: 200,
                content_length: Some(10),
                ..Default::default()
            },
        ]);
        let s = TransferSession::new(&t, &req, quick_policy(1), CancelToken::new());
        let n = s.negotiate(5, Duration::from_secs(1), &mut gate(), &mut Ticks::default()).unwrap();
        assert_eq!(n.range.confirmed_offset, 0);
        assert_eq!(n.range.total_size, Some(10));

        let sent = t.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].header("Range"), Some("bytes=5-"));
        assert_eq!(sent[1].header("Range"), None);
    }

    #[test]
    fn status_failures_stop_after_exactly_max_attempts() {
        let req = TransferRequest::new("http://h/f");
        let t = Scripted::new(vec![head(503); 10]);
        let s = TransferSession::new(&t, &req, quick_policy(3), CancelToken::new());
        let err = s
            .negotiate(0, Duration::from_secs(1), &mut gate(), &mut Ticks::default())
            .unwrap_err();
        assert!(matches!(err, NegotiateError::RetriesExhausted { status: 503, attempts: 3 }));
        assert_eq!(t.sent().len(), 3);
    }

    #[test]
    fn retry_succeeds_within_bound() {
        let req = TransferRequest::new("http://h/f");
        let t = Scripted::new(vec![head(500), partial("bytes 10-19/20")]);
        let s = TransferSession::new(&t, &req, quick_policy(5), CancelToken::new());
        let n = s.negotiate(10, Duration::from_secs(1), &mut gate(), &mut Ticks::default()).unwrap();
        assert_eq!(n.range.confirmed_offset, 10);
        // Retries keep the same offset.
        assert!(t.sent().iter().all(|r| r.header("Range") == Some("bytes=10-")));
    }

    #[test]
    fn countdown_ticks_once_per_second() {
        let req = TransferRequest::new("http://h/f");
        let t = Scripted::new(vec![]);
        let s = TransferSession::new(&t, &req, RetryPolicy::default(), CancelToken::new());
        let mut ticks = Ticks::default();
        s.countdown(Duration::from_millis(1200), 502, 1, &mut ticks).unwrap();
        let remaining: Vec<_> = ticks.0.iter().map(|t| t.2).collect();
        assert_eq!(
            remaining,
            vec![Duration::from_millis(1200), Duration::from_millis(200)]
        );
        assert!(ticks.0.iter().all(|t| t.0 == 502 && t.1 == 1));
    }

    #[test]
    fn transport_errors_are_classified() {
        let req = TransferRequest::new("http://h/f");
        let t = Scripted::new(vec![]);
        let s = TransferSession::new(&t, &req, quick_policy(5), CancelToken::new());
        let err = s
            .negotiate(0, Duration::from_secs(1), &mut gate(), &mut Ticks::default())
            .unwrap_err();
        assert!(matches!(err, NegotiateError::Connectivity(_)));
    }

    #[test]
    fn cancelled_session_sends_nothing() {
        let req = TransferRequest::new("http://h/f");
        let t = Scripted::new(vec![head(200)]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let s = TransferSession::new(&t, &req, quick_policy(5), cancel);
        let err = s
            .negotiate(0, Duration::from_secs(1), &mut gate(), &mut Ticks::default())
            .unwrap_err();
        assert!(matches!(err, NegotiateError::Gate(GateError::Aborted(_))));
        assert!(t.sent().is_empty());
    }
}
