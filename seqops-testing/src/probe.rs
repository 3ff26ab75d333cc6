use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Records how a source was consumed. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    inner: Arc<ProbeInner>,
}

#[derive(Debug, Default)]
struct ProbeInner {
    pulled: AtomicUsize,
    closed: AtomicBool,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pulls that produced an item or a failure.
    pub fn pulled(&self) -> usize {
        self.inner.pulled.load(Ordering::SeqCst)
    }

    /// True once the source has been dropped.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Records a pull and returns its zero based index.
    pub(crate) fn record_pull(&self) -> usize {
        self.inner.pulled.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn mark_closed(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

/// Tracks how many transform invocations run at once. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an invocation as running until the returned guard is dropped.
    pub fn enter(&self) -> InFlight {
        let current = self.inner.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(current, Ordering::SeqCst);
        InFlight {
            tracker: Arc::clone(&self.inner),
        }
    }

    pub fn current(&self) -> usize {
        self.inner.current.load(Ordering::SeqCst)
    }

    /// Highest number of invocations that ever ran at once.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}

/// Guard returned by [ConcurrencyTracker::enter].
#[derive(Debug)]
pub struct InFlight {
    tracker: Arc<TrackerInner>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.tracker.current.fetch_sub(1, Ordering::SeqCst);
    }
}
