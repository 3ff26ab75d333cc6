//! Bounded concurrent mapper, the engine underneath map, filter, flat_map and for_each.
//!
//! A mapper invocation is split in two halves connected by an ordered queue of slots:
//!
//! ```text
//!   source --> [producer task] --slot--> mpsc queue --slot--> [Mapped (consumer)] --> caller
//!                   |    ^                                          |
//!                   |    +---------- permit released ---------------+
//!                   +-- spawn pending transform invocations
//! ```
//!
//! - The producer pulls the source, invokes the transform and enqueues one slot per invocation,
//!   in source order. Results that are known on the first poll are stored directly in the slot,
//!   everything else runs in its own task.
//! - Every slot produced by the transform holds a permit of the concurrency gate (a semaphore
//!   with `concurrency` permits), so at most `concurrency` slots are outstanding at once. Skip
//!   markers known on the first poll are discarded by the producer and never take a slot.
//! - The consumer always waits for the head slot before moving on, so output order matches
//!   source order no matter which invocation finishes first.
//!
//! The two wake-ups of the handshake are the channel send (data available) and the permit
//! release (room available), and each fires once per transition.
//!
//! Error handling: a failing invocation stops the producer from pulling more items, but slots
//! enqueued before it still drain to the caller in order, then the failure is returned and the
//! stream ends. A source failure is the last slot. External cancellation is raised as
//! [Error::Aborted] the next time the consumer looks, and the stream ends. Whenever the stream
//! ends or is dropped, its [CancellationScope] is torn down, the producer task and any pending
//! invocation are aborted, and the source is closed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::Stream;
use futures::future::BoxFuture;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::WaitForCancellationFutureOwned;
use tracing::{debug, warn};

use crate::cancel::{CancellationScope, Context};
use crate::config::Options;
use crate::error::{Error, Result};

mod producer;
mod slot;

use producer::Producer;
use slot::{Settled, Slot};

/// Result of one transform invocation. [Step::Skip] produces nothing for the input item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<U> {
    Yield(U),
    Skip,
}

/// Maps `source` through `transform`, running up to `options.concurrency()` invocations at once
/// and yielding results in source order. Items for which the transform returns [Step::Skip] are
/// left out.
///
/// Nothing is pulled from the source until the returned stream is polled.
pub fn map<S, T, U, F, Fut>(source: S, transform: F, options: Options) -> Result<Mapped<U>>
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T, Context) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Step<U>>> + Send + 'static,
{
    options.validate()?;

    let concurrency = options.effective_concurrency();
    let scope = CancellationScope::new(options.signal());
    let gate = Arc::new(Semaphore::new(concurrency));
    // one extra entry for the end marker or the source failure, which hold no permit
    let (queue_tx, queue_rx) = mpsc::channel(concurrency + 1);

    let producer = Producer {
        source,
        transform,
        gate: Arc::clone(&gate),
        queue: queue_tx,
        scope_token: scope.token().clone(),
        halt: scope.token().child_token(),
    };

    Ok(Mapped {
        queue: queue_rx,
        head: None,
        delivered: None,
        producer: ProducerState::Idle(Box::pin(producer.run())),
        gate,
        concurrency,
        cancelled: Box::pin(scope.token().clone().cancelled_owned()),
        scope,
        finished: false,
    })
}

enum ProducerState {
    Idle(BoxFuture<'static, ()>),
    Running(JoinHandle<()>),
    Stopped,
}

/// Consumer half of a mapper invocation; the ordered output sequence.
pub struct Mapped<U> {
    queue: mpsc::Receiver<Slot<U>>,
    /// Oldest undelivered slot.
    head: Option<Slot<U>>,
    /// Slot of the value handed out last. It keeps its permit until the next pull so that a
    /// caller that stops after this value never lets the producer pull another item.
    delivered: Option<Slot<U>>,
    producer: ProducerState,
    gate: Arc<Semaphore>,
    concurrency: usize,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    scope: CancellationScope,
    finished: bool,
}

// U is never pinned structurally, every slot is moved around freely.
impl<U> Unpin for Mapped<U> {}

impl<U> Mapped<U> {
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Number of slots currently holding a permit of the concurrency gate.
    pub fn outstanding(&self) -> usize {
        self.concurrency - self.gate.available_permits()
    }

    fn start(&mut self) {
        if let ProducerState::Idle(_) = self.producer {
            let ProducerState::Idle(fut) =
                std::mem::replace(&mut self.producer, ProducerState::Stopped)
            else {
                return;
            };
            self.producer = ProducerState::Running(tokio::spawn(fut));
        }
    }

    /// Ends the invocation: settles the scope, aborts the producer and every pending invocation.
    fn shutdown(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.scope.teardown();
        if let ProducerState::Running(handle) =
            std::mem::replace(&mut self.producer, ProducerState::Stopped)
        {
            handle.abort();
        }
        // permits go back only once the producer can no longer use them
        self.head = None;
        self.delivered = None;
        self.queue.close();
        while self.queue.try_recv().is_ok() {}
        debug!("map invocation finished");
    }

    fn finish(&mut self, last: Option<Result<U>>) -> Poll<Option<Result<U>>> {
        self.shutdown();
        Poll::Ready(last)
    }

    fn abort(&mut self) -> Poll<Option<Result<U>>> {
        let error = self.scope.abort_error();
        debug!(?error, "map invocation cancelled");
        self.finish(Some(Err(error)))
    }

    /// Called while waiting; returns the cancellation error if the scope got cancelled meanwhile.
    fn poll_cancelled(&mut self, cx: &mut TaskContext<'_>) -> Poll<Option<Result<U>>> {
        if self.cancelled.as_mut().poll(cx).is_ready() {
            return self.abort();
        }
        Poll::Pending
    }

    /// The queue is closed and empty: the producer stopped without an end marker, either because
    /// it was cancelled or because it died.
    fn poll_closed(&mut self, cx: &mut TaskContext<'_>) -> Poll<Option<Result<U>>> {
        if self.scope.is_cancelled() {
            return self.abort();
        }
        match &mut self.producer {
            ProducerState::Running(handle) => match Pin::new(handle).poll(cx) {
                Poll::Ready(Err(e)) => {
                    warn!(error = ?e, "map producer failed");
                    self.finish(Some(Err(Error::from(e))))
                }
                Poll::Ready(Ok(())) => self.finish(None),
                Poll::Pending => self.poll_cancelled(cx),
            },
            ProducerState::Idle(_) | ProducerState::Stopped => self.finish(None),
        }
    }
}

impl<U> Stream for Mapped<U> {
    type Item = Result<U>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        // the caller is back for more, the previous value's slot can go
        this.delivered = None;
        this.start();

        loop {
            let settled = match this.head.as_mut() {
                Some(head) => match head.poll_settled(cx) {
                    Poll::Ready(settled) => settled,
                    Poll::Pending => return this.poll_cancelled(cx),
                },
                None => match this.queue.poll_recv(cx) {
                    Poll::Ready(Some(slot)) => {
                        this.head = Some(slot);
                        continue;
                    }
                    Poll::Ready(None) => return this.poll_closed(cx),
                    Poll::Pending => return this.poll_cancelled(cx),
                },
            };

            match settled {
                Settled::End => return this.finish(None),
                _ if this.scope.is_cancelled() => return this.abort(),
                Settled::Failed(e) => {
                    warn!(error = ?e, "map invocation failed");
                    return this.finish(Some(Err(e)));
                }
                Settled::Skip => {
                    this.head = None;
                }
                Settled::Value(value) => {
                    this.delivered = this.head.take();
                    return Poll::Ready(Some(Ok(value)));
                }
            }
        }
    }
}

impl<U> Drop for Mapped<U> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
