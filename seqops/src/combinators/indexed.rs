use std::pin::Pin;
use std::task::{Context as TaskContext, Poll, ready};

use futures::Stream;
use pin_project::pin_project;

use crate::cancel::CancelSignal;
use crate::combinators::signal_error;
use crate::config::Options;
use crate::error::Result;
use crate::source::Cursor;

/// Pairs every item with its zero-based position in the source.
pub fn indexed_pairs<S, T>(source: S, options: Options) -> IndexedPairs<S>
where
    S: Stream<Item = Result<T>>,
{
    IndexedPairs {
        source: Cursor::new(source),
        index: 0,
        signal: options.signal().cloned(),
    }
}

/// Stream returned by [indexed_pairs].
#[pin_project]
pub struct IndexedPairs<S> {
    #[pin]
    source: Cursor<S>,
    index: usize,
    signal: Option<CancelSignal>,
}

impl<S, T> Stream for IndexedPairs<S>
where
    S: Stream<Item = Result<T>>,
{
    type Item = Result<(usize, T)>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if this.source.is_closed() {
            return Poll::Ready(None);
        }
        let item = ready!(this.source.as_mut().poll_next(cx));
        if let Some(e) = signal_error(this.signal.as_ref()) {
            this.source.as_mut().close();
            return Poll::Ready(Some(Err(e)));
        }
        match item {
            Some(Ok(value)) => {
                let index = *this.index;
                *this.index += 1;
                Poll::Ready(Some(Ok((index, value))))
            }
            Some(Err(e)) => {
                this.source.as_mut().close();
                Poll::Ready(Some(Err(e)))
            }
            None => Poll::Ready(None),
        }
    }
}
