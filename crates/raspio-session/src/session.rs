use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use raspio_codec::{Ack, Request};
use raspio_transport::{
    resolve_endpoint, ConnectionConfig, Endpoint, EndpointResolver, FrameTransport,
    ResourceTarget, WsConnection,
};
use tracing::{debug, info, warn};

use crate::correlator::{CallOptions, Correlator, EncodedRequest, Health};
use crate::error::{CallError, OpenError, Result};

/// Session-level configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a call waits for its reply. Default: 1 s.
    pub timeout: Duration,
    /// Granularity at which cancellation is observed while waiting. Default: 50 ms.
    pub poll_interval: Duration,
    pub connection: ConnectionConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(50),
            connection: ConnectionConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A handle bound to one remote resource.
///
/// Construction sends the open request and only succeeds on a positive
/// acknowledgment, so a `Session` is never half-open. The close request is
/// sent at most once, by [`close`](Self::close) or on drop.
///
/// `Session` is `Sync`: it can be shared between threads, but only one call
/// is outstanding at a time. A concurrent call fails with
/// [`CallError::InProgress`] without touching the wire.
pub struct Session<T: FrameTransport = WsConnection> {
    endpoint: Endpoint,
    config: SessionConfig,
    open_request: EncodedRequest,
    close_request: EncodedRequest,
    // `None` once closed.
    inner: Mutex<Option<Correlator<T>>>,
}

impl Session<WsConnection> {
    /// Resolve `target`, connect, and send `open`.
    pub fn open<R, O, C>(
        resolver: &R,
        target: &ResourceTarget,
        open: &O,
        close: &C,
        config: SessionConfig,
    ) -> std::result::Result<Self, OpenError>
    where
        R: EndpointResolver + ?Sized,
        O: Request + ?Sized,
        C: Request + ?Sized,
    {
        let open_request = EncodedRequest::encode(open).map_err(CallError::from)?;
        let close_request = EncodedRequest::encode(close).map_err(CallError::from)?;
        let endpoint = resolve_endpoint(resolver, target).map_err(OpenError::Resolve)?;
        let transport = WsConnection::connect(endpoint.clone(), config.connection.clone())
            .map_err(OpenError::Connect)?;
        Self::establish(endpoint, transport, open_request, close_request, config)
    }

    /// Reconnect to the same endpoint and re-send the open request.
    ///
    /// This is the only way out of a stale or lost session. It is never done
    /// implicitly: the caller decides whether an interrupted operation is safe
    /// to repeat.
    pub fn reset(&self) -> std::result::Result<(), OpenError> {
        let mut guard = self.try_guard()?;
        if guard.is_none() {
            return Err(CallError::Closed.into());
        }
        let transport =
            WsConnection::connect(self.endpoint.clone(), self.config.connection.clone())
                .map_err(OpenError::Connect)?;
        self.replace(&mut guard, transport)
    }
}

impl<T: FrameTransport> Session<T> {
    /// Open a session over an already connected transport.
    pub fn with_transport<O, C>(
        endpoint: Endpoint,
        transport: T,
        open: &O,
        close: &C,
        config: SessionConfig,
    ) -> std::result::Result<Self, OpenError>
    where
        O: Request + ?Sized,
        C: Request + ?Sized,
    {
        let open_request = EncodedRequest::encode(open).map_err(CallError::from)?;
        let close_request = EncodedRequest::encode(close).map_err(CallError::from)?;
        Self::establish(endpoint, transport, open_request, close_request, config)
    }

    fn establish(
        endpoint: Endpoint,
        transport: T,
        open_request: EncodedRequest,
        close_request: EncodedRequest,
        config: SessionConfig,
    ) -> std::result::Result<Self, OpenError> {
        let correlator = open_correlator(transport, &open_request, &config)?;
        info!(endpoint = %endpoint, "session opened");
        Ok(Self {
            endpoint,
            config,
            open_request,
            close_request,
            inner: Mutex::new(Some(correlator)),
        })
    }

    /// Like [`reset`](Session::reset), over a caller-supplied transport.
    pub fn reset_with(&self, transport: T) -> std::result::Result<(), OpenError> {
        let mut guard = self.try_guard()?;
        if guard.is_none() {
            return Err(CallError::Closed.into());
        }
        self.replace(&mut guard, transport)
    }

    fn replace(
        &self,
        guard: &mut MutexGuard<'_, Option<Correlator<T>>>,
        transport: T,
    ) -> std::result::Result<(), OpenError> {
        if let Some(old) = guard.as_mut() {
            self.release(old);
        }
        let correlator = open_correlator(transport, &self.open_request, &self.config)?;
        **guard = Some(correlator);
        info!(endpoint = %self.endpoint, "session reset");
        Ok(())
    }

    /// Send `request` and wait for its acknowledgment.
    ///
    /// A negative acknowledgment is still `Ok`; interpreting it is up to the
    /// caller.
    pub fn call<R: Request + ?Sized>(&self, request: &R) -> Result<Ack> {
        self.call_with(request, &CallOptions::default())
    }

    pub fn call_with<R: Request + ?Sized>(&self, request: &R, options: &CallOptions) -> Result<Ack> {
        let mut guard = self.try_guard()?;
        let correlator = guard.as_mut().ok_or(CallError::Closed)?;
        let encoded = EncodedRequest::encode(request)?;
        correlator.call(&encoded, options)
    }

    /// Send the close request (best effort) and release the connection.
    ///
    /// Never fails. Waits for a call in progress on another thread to finish.
    /// Calling it again has no effect.
    pub fn close(&self) {
        let taken = match self.inner.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(mut correlator) = taken else {
            return;
        };
        self.release(&mut correlator);
        info!(endpoint = %self.endpoint, "session closed");
    }

    /// Send the close request as far as the connection's health allows,
    /// then shut the connection down.
    fn release(&self, correlator: &mut Correlator<T>) {
        match correlator.health().clone() {
            Health::Synced => match correlator.call(&self.close_request, &CallOptions::default()) {
                Ok(ack) if ack.ack => {}
                Ok(ack) => warn!(endpoint = %self.endpoint, reason = %ack.reason(), "close request refused"),
                Err(err) => warn!(endpoint = %self.endpoint, error = %err, "close request failed"),
            },
            Health::Stale(_) => {
                if let Err(err) = correlator.send_only(&self.close_request) {
                    warn!(endpoint = %self.endpoint, error = %err, "close request failed");
                }
            }
            Health::Lost(reason) => {
                debug!(endpoint = %self.endpoint, %reason, "connection already lost; skipping close request");
            }
        }
        correlator.shutdown();
    }

    /// `false` once closed or once the connection is lost. A lost session
    /// can still be brought back with `reset`. A call in progress counts as
    /// open.
    pub fn is_open(&self) -> bool {
        let usable = |inner: &Option<Correlator<T>>| {
            inner
                .as_ref()
                .is_some_and(|c| !matches!(c.health(), Health::Lost(_)))
        };
        match self.inner.try_lock() {
            Ok(guard) => usable(&*guard),
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(poisoned)) => usable(&*poisoned.into_inner()),
        }
    }

    /// Current correlation health, or `None` if closed or busy.
    pub fn health(&self) -> Option<Health> {
        match self.inner.try_lock() {
            Ok(guard) => guard.as_ref().map(|c| c.health().clone()),
            Err(_) => None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn try_guard(&self) -> Result<MutexGuard<'_, Option<Correlator<T>>>> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(CallError::InProgress),
            // A panic mid-call leaves the correlator in a consistent state:
            // the pending call was never resolved, so it is treated as lost.
            Err(TryLockError::Poisoned(poisoned)) => {
                let mut guard = poisoned.into_inner();
                if let Some(correlator) = guard.as_mut() {
                    if *correlator.health() == Health::Synced {
                        correlator.shutdown();
                    }
                }
                self.inner.clear_poison();
                Ok(guard)
            }
        }
    }
}

impl<T: FrameTransport> Drop for Session<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: FrameTransport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("open", &self.is_open())
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

fn open_correlator<T: FrameTransport>(
    transport: T,
    open_request: &EncodedRequest,
    config: &SessionConfig,
) -> std::result::Result<Correlator<T>, OpenError> {
    let mut correlator = Correlator::new(transport, config.timeout, config.poll_interval);
    match correlator.call(open_request, &CallOptions::default()) {
        Ok(ack) if ack.ack => Ok(correlator),
        Ok(ack) => {
            correlator.shutdown();
            Err(OpenError::Rejected(ack.reason()))
        }
        Err(err) => {
            correlator.shutdown();
            Err(OpenError::Call(err))
        }
    }
}
