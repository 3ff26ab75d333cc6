//! Cancellation plumbing shared by every operator.
//!
//! A [CancelSignal] is the external, caller-owned source of cancellation. Every operator
//! invocation creates its own [CancellationScope], which owns a fresh [CancellationToken] and at
//! most one listener registered on the caller's signal. The listener is an explicit resource: it
//! is registered when the scope is created and removed when the scope is torn down, so a
//! long-lived signal never accumulates listeners from finished invocations.
//!
//! Scope tokens are also what transforms observe through [Context], so tearing a scope down
//! cancels any transform invocation still in flight.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use crate::error::{Error, Result};

/// External cancellation source. Clones share state; cancelling any clone cancels all of them.
#[derive(Clone, Default)]
pub struct CancelSignal {
    inner: Arc<SignalInner>,
}

#[derive(Default)]
struct SignalInner {
    token: CancellationToken,
    reason: Mutex<Option<String>>,
    listeners: Mutex<HashMap<u64, CancellationToken>>,
    next_listener_id: AtomicU64,
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.fire(None);
    }

    /// Cancels the signal, recording why. Only the first cancellation's reason is kept.
    pub fn cancel_with_reason(&self, reason: impl Into<String>) {
        self.fire(Some(reason.into()));
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }

    /// Completes once the signal is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.token.cancelled()
    }

    /// Number of scopes currently listening on this signal.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    pub(crate) fn abort_error(&self) -> Error {
        Error::Aborted {
            reason: self.reason(),
        }
    }

    fn fire(&self, reason: Option<String>) {
        {
            let mut current = self.inner.reason.lock();
            if self.inner.token.is_cancelled() {
                return;
            }
            *current = reason;
            self.inner.token.cancel();
        }

        let listeners: Vec<CancellationToken> =
            self.inner.listeners.lock().values().cloned().collect();
        debug!(listeners = listeners.len(), "cancel signal fired");
        for listener in listeners {
            listener.cancel();
        }
    }

    /// Registers `target` to be cancelled when this signal fires. If the signal has already
    /// fired, `target` is cancelled right away. The returned guard deregisters on drop.
    fn register(&self, target: CancellationToken) -> SignalListener {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().insert(id, target.clone());
        if self.is_cancelled() {
            target.cancel();
        }
        SignalListener {
            signal: self.clone(),
            id,
        }
    }
}

/// Registration of a scope on a [CancelSignal]. Dropping it removes the registration.
struct SignalListener {
    signal: CancelSignal,
    id: u64,
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        self.signal.inner.listeners.lock().remove(&self.id);
    }
}

/// Lifecycle of a [CancellationScope].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Active,
    CancelRequested,
    TornDown,
}

/// Per-invocation cancellation scope. Triggered by the external signal, or by [Self::teardown]
/// when the invocation ends, including when it ends on an internal failure. Work that only has to
/// stop pulling on a failure hangs off a child of [Self::token]. Teardown happens exactly once;
/// dropping the scope tears it down if nobody did so before.
pub struct CancellationScope {
    token: CancellationToken,
    signal: Option<CancelSignal>,
    listener: Option<SignalListener>,
    torn_down: bool,
}

impl fmt::Debug for CancellationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationScope")
            .field("state", &self.state())
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl CancellationScope {
    pub fn new(signal: Option<&CancelSignal>) -> Self {
        let token = CancellationToken::new();
        let listener = signal.map(|signal| signal.register(token.clone()));
        Self {
            token,
            signal: signal.cloned(),
            listener,
            torn_down: false,
        }
    }

    /// Context handed to user functions running under this scope.
    pub fn context(&self) -> Context {
        Context::new(self.token.clone())
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn state(&self) -> ScopeState {
        if self.torn_down {
            ScopeState::TornDown
        } else if self.token.is_cancelled() {
            ScopeState::CancelRequested
        } else {
            ScopeState::Active
        }
    }

    /// The error reported when this scope is cancelled, carrying the signal's reason if any.
    pub fn abort_error(&self) -> Error {
        match &self.signal {
            Some(signal) => signal.abort_error(),
            None => Error::Aborted { reason: None },
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(self.abort_error());
        }
        Ok(())
    }

    /// Runs `fut` until it completes or the scope is cancelled, whichever is first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(self.abort_error()),
            output = fut => Ok(output),
        }
    }

    /// Cancels the token, removes the signal listener and settles the scope. Returns false if the
    /// scope was already torn down.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        self.token.cancel();
        self.listener.take();
        debug!("cancellation scope torn down");
        true
    }
}

impl Drop for CancellationScope {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Passed to every user supplied function so it can observe cancellation of the invocation it
/// runs under.
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
}

impl Context {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
