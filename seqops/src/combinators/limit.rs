use std::pin::Pin;
use std::task::{Context as TaskContext, Poll, ready};

use futures::Stream;
use pin_project::pin_project;
use tracing::trace;

use crate::cancel::CancelSignal;
use crate::combinators::signal_error;
use crate::config::Options;
use crate::count::{IntoCount, UNBOUNDED};
use crate::error::Result;
use crate::source::Cursor;

/// Yields the first `count` items, then closes the source without pulling any further.
///
/// `count` is coerced with [IntoCount]; a negative count is rejected before anything is pulled.
pub fn take_n<S, T>(source: S, count: impl IntoCount, options: Options) -> Result<TakeN<S>>
where
    S: Stream<Item = Result<T>>,
{
    Ok(TakeN {
        source: Cursor::new(source),
        remaining: count.into_count()?,
        signal: options.signal().cloned(),
    })
}

/// Skips the first `count` items and yields the rest.
///
/// `count` is coerced with [IntoCount]; a negative count is rejected before anything is pulled.
pub fn drop_n<S, T>(source: S, count: impl IntoCount, options: Options) -> Result<DropN<S>>
where
    S: Stream<Item = Result<T>>,
{
    Ok(DropN {
        source: Cursor::new(source),
        remaining: count.into_count()?,
        signal: options.signal().cloned(),
    })
}

/// Stream returned by [take_n].
#[pin_project]
pub struct TakeN<S> {
    #[pin]
    source: Cursor<S>,
    remaining: u64,
    signal: Option<CancelSignal>,
}

impl<S, T> Stream for TakeN<S>
where
    S: Stream<Item = Result<T>>,
{
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if this.source.is_closed() {
            return Poll::Ready(None);
        }
        if let Some(e) = signal_error(this.signal.as_ref()) {
            this.source.as_mut().close();
            return Poll::Ready(Some(Err(e)));
        }
        if *this.remaining == 0 {
            this.source.as_mut().close();
            return Poll::Ready(None);
        }

        let item = ready!(this.source.as_mut().poll_next(cx));
        if let Some(e) = signal_error(this.signal.as_ref()) {
            this.source.as_mut().close();
            return Poll::Ready(Some(Err(e)));
        }
        match item {
            Some(Ok(value)) => {
                if *this.remaining != UNBOUNDED {
                    *this.remaining -= 1;
                }
                if *this.remaining == 0 {
                    trace!("take count reached, closing source");
                    this.source.as_mut().close();
                }
                Poll::Ready(Some(Ok(value)))
            }
            Some(Err(e)) => {
                this.source.as_mut().close();
                Poll::Ready(Some(Err(e)))
            }
            None => Poll::Ready(None),
        }
    }
}

/// Stream returned by [drop_n].
#[pin_project]
pub struct DropN<S> {
    #[pin]
    source: Cursor<S>,
    remaining: u64,
    signal: Option<CancelSignal>,
}

impl<S, T> Stream for DropN<S>
where
    S: Stream<Item = Result<T>>,
{
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if this.source.is_closed() {
                return Poll::Ready(None);
            }
            if let Some(e) = signal_error(this.signal.as_ref()) {
                this.source.as_mut().close();
                return Poll::Ready(Some(Err(e)));
            }

            match ready!(this.source.as_mut().poll_next(cx)) {
                Some(Ok(_)) if *this.remaining > 0 => {
                    *this.remaining -= 1;
                }
                Some(Ok(value)) => return Poll::Ready(Some(Ok(value))),
                Some(Err(e)) => {
                    this.source.as_mut().close();
                    return Poll::Ready(Some(Err(e)));
                }
                None => return Poll::Ready(None),
            }
        }
    }
}
