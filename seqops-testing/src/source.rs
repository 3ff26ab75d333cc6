//! Scripted sources that record how they are consumed.
//!
//! # Example
//! ```ignore
//! use seqops_testing::{counting, FaultInjector};
//!
//! let source = counting();
//! let probe = source.probe();
//! source.injector().fail_at(3);
//! ```

use std::future::Future;
use std::ops::RangeFrom;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures::Stream;
use pin_project::{pin_project, pinned_drop};
use seqops::{Error, Result};
use tokio::time::Sleep;

use crate::fault_injector::FaultInjector;
use crate::probe::Probe;

/// Source over an iterator, with a [Probe] recording pulls and closure and a [FaultInjector]
/// for failures and latency.
#[pin_project(PinnedDrop)]
pub struct ScriptedSource<I> {
    items: I,
    probe: Probe,
    injector: Arc<FaultInjector>,
    #[pin]
    delay: Option<Sleep>,
}

/// Finite source over `items`.
pub fn scripted<I: IntoIterator>(items: I) -> ScriptedSource<I::IntoIter> {
    ScriptedSource::new(items.into_iter())
}

/// Infinite source of 0, 1, 2, ...
pub fn counting() -> ScriptedSource<RangeFrom<u64>> {
    ScriptedSource::new(0..)
}

impl<I> ScriptedSource<I> {
    pub fn new(items: I) -> Self {
        Self {
            items,
            probe: Probe::new(),
            injector: Arc::new(FaultInjector::new()),
            delay: None,
        }
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }

    pub fn injector(&self) -> Arc<FaultInjector> {
        Arc::clone(&self.injector)
    }
}

impl<I: Iterator> Stream for ScriptedSource<I> {
    type Item = Result<I::Item>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if this.delay.is_none() {
            if let Some(latency) = this.injector.pull_delay() {
                this.delay.set(Some(tokio::time::sleep(latency)));
            }
        }
        if let Some(delay) = this.delay.as_mut().as_pin_mut() {
            ready!(delay.poll(cx));
            this.delay.set(None);
        }

        let Some(item) = this.items.next() else {
            return Poll::Ready(None);
        };
        let index = this.probe.record_pull();
        if this.injector.should_fail_pull(index) {
            return Poll::Ready(Some(Err(Error::Source(format!(
                "injected failure at pull {index}"
            )))));
        }
        Poll::Ready(Some(Ok(item)))
    }
}

#[pinned_drop]
impl<I> PinnedDrop for ScriptedSource<I> {
    fn drop(self: Pin<&mut Self>) {
        self.probe.mark_closed();
    }
}
