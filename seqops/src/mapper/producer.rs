use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::Arc;
use std::task::Poll;

use futures::future::{self, BoxFuture};
use futures::{FutureExt, Stream, StreamExt};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cancel::Context;
use crate::error::{Error, Result};
use crate::mapper::Step;
use crate::mapper::slot::Slot;
use crate::source::Cursor;

/// Outcome of invoking the transform once.
enum Invocation<U> {
    /// Settled on the first poll to the skip marker, costs no slot.
    Skipped,
    Settled(Result<U>),
    Pending(BoxFuture<'static, Result<Step<U>>>),
}

/// Producer half of the mapper. Pulls the source, invokes the transform and enqueues one slot
/// per invocation in source order.
///
/// Before every pull the producer takes a permit from the gate, so it never has more than
/// `concurrency` slots outstanding; it suspends there until the consumer releases a slot. The
/// `halt` token stops pulling. It is a child of the scope token, and it is also cancelled as soon
/// as any invocation fails, so no new work starts while earlier results drain.
pub(super) struct Producer<S, F, U> {
    pub(super) source: S,
    pub(super) transform: F,
    pub(super) gate: Arc<Semaphore>,
    pub(super) queue: mpsc::Sender<Slot<U>>,
    pub(super) scope_token: CancellationToken,
    pub(super) halt: CancellationToken,
}

impl<S, F, T, U, Fut> Producer<S, F, U>
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T, Context) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Step<U>>> + Send + 'static,
{
    pub(super) async fn run(self) {
        let Producer {
            source,
            transform,
            gate,
            queue,
            scope_token,
            halt,
        } = self;

        let mut source = pin!(Cursor::new(source));
        debug!("map producer started");

        loop {
            let permit = tokio::select! {
                biased;
                _ = halt.cancelled() => break,
                permit = Arc::clone(&gate).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        warn!(?e, "concurrency gate closed, stopping map producer");
                        break;
                    }
                },
            };

            let next = tokio::select! {
                biased;
                _ = halt.cancelled() => break,
                next = source.next() => next,
            };

            let slot = match next {
                None => {
                    debug!("source exhausted");
                    Slot::end()
                }
                Some(Err(e)) => {
                    warn!(error = ?e, "source failed");
                    Slot::source_failed(e)
                }
                Some(Ok(item)) => {
                    let invocation = invoke(&transform, item, Context::new(scope_token.clone()));
                    match poll_once(invocation).await {
                        Invocation::Skipped => {
                            // long runs of skips never suspend on their own
                            tokio::task::consume_budget().await;
                            continue;
                        }
                        Invocation::Settled(outcome) => {
                            if outcome.is_err() {
                                halt.cancel();
                            }
                            Slot::ready(outcome, permit)
                        }
                        Invocation::Pending(fut) => {
                            let halt = halt.clone();
                            let handle = tokio::spawn(async move {
                                let outcome = fut.await;
                                if outcome.is_err() {
                                    halt.cancel();
                                }
                                outcome
                            });
                            Slot::pending(handle, permit)
                        }
                    }
                }
            };

            let terminal = slot.is_terminal();
            if queue.send(slot).await.is_err() {
                debug!("map consumer is gone, stopping producer");
                break;
            }
            if terminal {
                break;
            }
        }

        source.close();
        debug!("map producer stopped");
    }
}

/// Invokes the transform. Panics while building or polling the returned future become
/// [Error::Task] outcomes.
fn invoke<F, T, U, Fut>(
    transform: &F,
    item: T,
    ctx: Context,
) -> BoxFuture<'static, Result<Step<U>>>
where
    F: Fn(T, Context) -> Fut,
    U: Send + 'static,
    Fut: Future<Output = Result<Step<U>>> + Send + 'static,
{
    match std::panic::catch_unwind(AssertUnwindSafe(|| transform(item, ctx))) {
        Ok(fut) => AssertUnwindSafe(fut)
            .catch_unwind()
            .map(|outcome| outcome.unwrap_or_else(|panic| Err(panic_error(panic))))
            .boxed(),
        Err(panic) => future::ready(Err(panic_error(panic))).boxed(),
    }
}

/// Polls an invocation once, so results that are already known (most importantly the skip
/// marker) never need a task.
async fn poll_once<U>(mut fut: BoxFuture<'static, Result<Step<U>>>) -> Invocation<U> {
    match futures::poll!(&mut fut) {
        Poll::Ready(Ok(Step::Skip)) => Invocation::Skipped,
        Poll::Ready(Ok(Step::Yield(value))) => Invocation::Settled(Ok(value)),
        Poll::Ready(Err(e)) => Invocation::Settled(Err(e)),
        Poll::Pending => Invocation::Pending(fut),
    }
}

fn panic_error(panic: Box<dyn Any + Send>) -> Error {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    Error::Task(format!("transform panicked: {message}"))
}
