//! Failure and latency injection for scripted sources.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;

const NEVER: usize = usize::MAX;

/// Controller for injecting failures and latency into a [crate::ScriptedSource].
///
/// Shared with the source through an `Arc`, so a test can change behavior while the source is
/// being pulled.
#[derive(Debug)]
pub struct FaultInjector {
    /// Fail the pull with this zero based index.
    fail_at: AtomicUsize,
    /// Fail the next N pulls.
    fail_next_pulls: AtomicUsize,
    /// Artificial latency before every pull in milliseconds.
    pull_latency_ms: AtomicU64,
    /// Upper bound of a random extra latency in milliseconds.
    pull_jitter_ms: AtomicU64,
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self {
            fail_at: AtomicUsize::new(NEVER),
            fail_next_pulls: AtomicUsize::new(0),
            pull_latency_ms: AtomicU64::new(0),
            pull_jitter_ms: AtomicU64::new(0),
        }
    }
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the pull with the given zero based index.
    pub fn fail_at(&self, index: usize) {
        self.fail_at.store(index, Ordering::Relaxed);
    }

    /// Fail the next N pulls.
    pub fn fail_pulls(&self, count: usize) {
        self.fail_next_pulls.store(count, Ordering::Relaxed);
    }

    pub fn set_pull_latency(&self, ms: u64) {
        self.pull_latency_ms.store(ms, Ordering::Relaxed);
    }

    /// Adds a random latency of up to `ms` to every pull.
    pub fn set_pull_jitter(&self, ms: u64) {
        self.pull_jitter_ms.store(ms, Ordering::Relaxed);
    }

    pub(crate) fn should_fail_pull(&self, index: usize) -> bool {
        if self.fail_at.load(Ordering::Relaxed) == index {
            return true;
        }
        self.fail_next_pulls
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| c.checked_sub(1))
            .is_ok()
    }

    /// Latency to apply before the next pull, if any.
    pub(crate) fn pull_delay(&self) -> Option<Duration> {
        let base = self.pull_latency_ms.load(Ordering::Relaxed);
        let jitter = match self.pull_jitter_ms.load(Ordering::Relaxed) {
            0 => 0,
            max => rand::rng().random_range(0..=max),
        };
        match base.saturating_add(jitter) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
