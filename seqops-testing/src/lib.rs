//! Test utilities for seqops.

use std::time::Duration;

use rand::Rng;

/// Error injector for scripted sources.
mod fault_injector;
/// Pull and concurrency probes.
mod probe;
/// Scripted sources.
mod source;

pub use fault_injector::FaultInjector;
pub use probe::{ConcurrencyTracker, InFlight, Probe};
pub use source::{ScriptedSource, counting, scripted};

/// Random delay in `[0, max]`, for transforms that should finish out of order.
pub fn random_delay(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}
