use std::time::{Duration, Instant};

use raspio_codec::{decode, encode, Ack, EncodeError, Request};
use raspio_transport::{FrameTransport, TransportError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{CallError, Result};

/// A request already validated and serialized, ready to go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    handle: String,
    text: String,
}

impl EncodedRequest {
    pub fn encode<R: Request + ?Sized>(request: &R) -> std::result::Result<Self, EncodeError> {
        Ok(Self {
            handle: request.handle().to_string(),
            text: encode(request)?,
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Give up earlier than the session timeout. Expiry yields
    /// [`CallError::Cancelled`] rather than [`CallError::Timeout`].
    pub deadline: Option<Duration>,
    /// Cancel the call from elsewhere.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// True when the call must not be sent at all: the token is already
    /// cancelled or the deadline leaves no time to wait.
    fn expired_before_send(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
            || self.deadline.is_some_and(|limit| limit.is_zero())
    }
}

/// Whether replies can still be matched to requests on this connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    /// Every request sent so far has been matched to its reply.
    Synced,
    /// A call gave up waiting. A late reply could be taken for the answer
    /// to the next request, so no further calls are accepted.
    Stale(String),
    /// The connection is gone.
    Lost(String),
}

/// The in-flight record of one call.
///
/// Created when the request is issued and consumed by [`PendingCall::resolve`],
/// so it can be resolved at most once.
#[derive(Debug)]
pub struct PendingCall {
    seq: u64,
    handle: String,
    request: String,
    issued_at: Instant,
    deadline: Instant,
    cancel_at: Option<Instant>,
}

impl PendingCall {
    fn new(seq: u64, request: &EncodedRequest, timeout: Duration, options: &CallOptions) -> Self {
        let issued_at = Instant::now();
        let deadline = issued_at + timeout;
        let cancel_at = options
            .deadline
            .map(|limit| issued_at + limit)
            .filter(|at| *at < deadline);
        Self {
            seq,
            handle: request.handle().to_string(),
            request: request.text().to_string(),
            issued_at,
            deadline,
            cancel_at,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// The serialized request as sent.
    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    fn resolve(self, outcome: Result<Ack>) -> Result<Ack> {
        let elapsed = self.issued_at.elapsed();
        match &outcome {
            Ok(ack) => debug!(seq = self.seq, handle = %self.handle, ack = ack.ack, ?elapsed, "call resolved"),
            Err(err) => debug!(seq = self.seq, handle = %self.handle, error = %err, ?elapsed, "call failed"),
        }
        outcome
    }
}

/// Matches each request to exactly one reply over an ordered transport.
///
/// At most one call is outstanding at a time. `&mut self` on [`call`](Self::call)
/// enforces that within one owner; [`Session`](crate::Session) adds the
/// cross-thread guard.
pub struct Correlator<T> {
    transport: T,
    timeout: Duration,
    poll_interval: Duration,
    next_seq: u64,
    health: Health,
}

impl<T: FrameTransport> Correlator<T> {
    pub fn new(transport: T, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            transport,
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            next_seq: 1,
            health: Health::Synced,
        }
    }

    /// Send `request` and wait for its reply, the timeout, or connection loss.
    ///
    /// Fails locally without I/O unless the correlator is [`Health::Synced`].
    /// A call cancelled before it is sent also fails locally and leaves the
    /// correlator synced.
    pub fn call(&mut self, request: &EncodedRequest, options: &CallOptions) -> Result<Ack> {
        match &self.health {
            Health::Synced => {}
            Health::Stale(reason) => return Err(CallError::Stale(reason.clone())),
            Health::Lost(reason) => return Err(CallError::ConnectionLost(reason.clone())),
        }
        if options.expired_before_send() {
            debug!(handle = request.handle(), "call cancelled before send");
            return Err(CallError::Cancelled(Duration::ZERO));
        }

        let pending = PendingCall::new(self.next_seq, request, self.timeout, options);
        self.next_seq += 1;
        trace!(seq = pending.seq, payload = pending.request(), "issuing request");

        let outcome = match self.transport.send_text(request.text()) {
            Ok(()) => self.await_reply(&pending, options.cancel.as_ref()),
            Err(err @ TransportError::MessageTooLarge { .. }) => Err(CallError::Transport(err)),
            Err(err) => Err(CallError::ConnectionLost(lost_reason(err))),
        };

        self.observe(&pending, &outcome);
        pending.resolve(outcome)
    }

    /// Send without waiting for a reply. Only used for best-effort close.
    pub fn send_only(&mut self, request: &EncodedRequest) -> Result<()> {
        if let Health::Lost(reason) = &self.health {
            return Err(CallError::ConnectionLost(reason.clone()));
        }
        self.next_seq += 1;
        self.transport
            .send_text(request.text())
            .map_err(|err| CallError::ConnectionLost(lost_reason(err)))
    }

    fn await_reply(
        &mut self,
        pending: &PendingCall,
        cancel: Option<&CancellationToken>,
    ) -> Result<Ack> {
        let limit = pending.cancel_at.unwrap_or(pending.deadline);
        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(CallError::Cancelled(pending.issued_at.elapsed()));
            }

            let now = Instant::now();
            if now >= limit {
                return Err(match pending.cancel_at {
                    Some(_) => CallError::Cancelled(pending.issued_at.elapsed()),
                    None => CallError::Timeout(self.timeout),
                });
            }

            let wait = (limit - now).min(self.poll_interval);
            match self.transport.recv_frame(wait) {
                // Whatever arrives next is this call's reply, even if it
                // does not decode; it cannot be matched to anything else.
                Ok(Some(frame)) => return decode(&frame).map_err(CallError::Decode),
                Ok(None) => continue,
                Err(err) => return Err(CallError::ConnectionLost(lost_reason(err))),
            }
        }
    }

    fn observe(&mut self, pending: &PendingCall, outcome: &Result<Ack>) {
        match outcome {
            Err(CallError::Timeout(_)) | Err(CallError::Cancelled(_)) => {
                let reason = format!("call #{} '{}' abandoned", pending.seq, pending.handle);
                warn!(seq = pending.seq, handle = %pending.handle, "reply abandoned; correlator is stale");
                self.health = Health::Stale(reason);
            }
            Err(CallError::ConnectionLost(reason)) => {
                self.health = Health::Lost(reason.clone());
                self.transport.close();
            }
            _ => {}
        }
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    /// Number of requests put on the wire so far.
    pub fn issued(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport.
    pub fn shutdown(&mut self) {
        self.transport.close();
        if self.health == Health::Synced {
            self.health = Health::Lost("connection closed locally".to_string());
        }
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

fn lost_reason(err: TransportError) -> String {
    match err {
        TransportError::ConnectionLost(reason) => reason,
        other => other.to_string(),
    }
}
