use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::mapper::Step;

/// What the consumer finds once the head of the queue settles.
#[derive(Debug)]
pub(super) enum Settled<U> {
    Value(U),
    Skip,
    Failed(Error),
    End,
}

enum SlotKind<U> {
    /// The transform settled on its first poll.
    Ready(Result<U>),
    /// The transform is still running in its own task.
    Pending(JoinHandle<Result<Step<U>>>),
    /// The source itself failed; always the last slot.
    SourceFailed(Error),
    End,
    /// Already handed to the consumer.
    Taken,
}

/// One entry of the ordered result queue. Slots produced by a transform hold a permit of the
/// concurrency gate, which goes back to the gate when the slot is dropped.
pub(super) struct Slot<U> {
    kind: SlotKind<U>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl<U> Slot<U> {
    pub(super) fn ready(outcome: Result<U>, permit: OwnedSemaphorePermit) -> Self {
        Self {
            kind: SlotKind::Ready(outcome),
            _permit: Some(permit),
        }
    }

    pub(super) fn pending(
        handle: JoinHandle<Result<Step<U>>>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            kind: SlotKind::Pending(handle),
            _permit: Some(permit),
        }
    }

    pub(super) fn source_failed(error: Error) -> Self {
        Self {
            kind: SlotKind::SourceFailed(error),
            _permit: None,
        }
    }

    pub(super) fn end() -> Self {
        Self {
            kind: SlotKind::End,
            _permit: None,
        }
    }

    /// End and source failure are the last slots a producer ever enqueues.
    pub(super) fn is_terminal(&self) -> bool {
        matches!(self.kind, SlotKind::End | SlotKind::SourceFailed(_))
    }

    /// Waits for the slot to settle and takes its outcome out. The permit stays with the slot.
    pub(super) fn poll_settled(&mut self, cx: &mut Context<'_>) -> Poll<Settled<U>> {
        if let SlotKind::Pending(handle) = &mut self.kind {
            let joined = ready!(Pin::new(handle).poll(cx));
            self.kind = SlotKind::Taken;
            return Poll::Ready(match joined {
                Ok(Ok(Step::Yield(value))) => Settled::Value(value),
                Ok(Ok(Step::Skip)) => Settled::Skip,
                Ok(Err(e)) => Settled::Failed(e),
                Err(e) => Settled::Failed(Error::from(e)),
            });
        }

        Poll::Ready(match std::mem::replace(&mut self.kind, SlotKind::Taken) {
            SlotKind::Ready(Ok(value)) => Settled::Value(value),
            SlotKind::Ready(Err(e)) | SlotKind::SourceFailed(e) => Settled::Failed(e),
            SlotKind::End => {
                self.kind = SlotKind::End;
                Settled::End
            }
            SlotKind::Pending(_) | SlotKind::Taken => Settled::Skip,
        })
    }
}

impl<U> Drop for Slot<U> {
    fn drop(&mut self) {
        // a slot dropped before it settled belongs to an abandoned invocation
        if let SlotKind::Pending(handle) = &self.kind {
            handle.abort();
        }
    }
}
