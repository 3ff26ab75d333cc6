use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll, ready};

use futures::Stream;
use pin_project::pin_project;

use crate::cancel::Context;
use crate::config::Options;
use crate::error::Result;
use crate::mapper::{Mapped, Step, map};

/// Maps every item to a sub-sequence and splices the sub-sequences, in source order, into one
/// sequence. Up to `options.concurrency()` sub-sequences are being produced at once, but each is
/// drained completely before the next one is started.
pub fn flat_map<S, T, Sub, V, F, Fut>(
    source: S,
    transform: F,
    options: Options,
) -> Result<FlatMapped<Sub>>
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
    Sub: Stream<Item = Result<V>> + Send + 'static,
    F: Fn(T, Context) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Sub>> + Send + 'static,
{
    let outer = map(
        source,
        move |value, ctx| {
            let sub = transform(value, ctx);
            async move { sub.await.map(Step::Yield) }
        },
        options,
    )?;
    Ok(FlatMapped {
        outer: Some(outer),
        current: None,
    })
}

/// Stream returned by [flat_map].
#[pin_project]
pub struct FlatMapped<Sub> {
    outer: Option<Mapped<Sub>>,
    #[pin]
    current: Option<Sub>,
}

impl<Sub, V> Stream for FlatMapped<Sub>
where
    Sub: Stream<Item = Result<V>>,
{
    type Item = Result<V>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(sub) = this.current.as_mut().as_pin_mut() {
                match ready!(sub.poll_next(cx)) {
                    Some(Ok(item)) => return Poll::Ready(Some(Ok(item))),
                    Some(Err(e)) => {
                        // a failing sub-sequence ends everything, including the mapper
                        this.current.set(None);
                        *this.outer = None;
                        return Poll::Ready(Some(Err(e)));
                    }
                    None => this.current.set(None),
                }
            }

            let Some(outer) = this.outer.as_mut() else {
                return Poll::Ready(None);
            };
            match ready!(Pin::new(outer).poll_next(cx)) {
                Some(Ok(sub)) => this.current.set(Some(sub)),
                Some(Err(e)) => {
                    *this.outer = None;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    *this.outer = None;
                    return Poll::Ready(None);
                }
            }
        }
    }
}
