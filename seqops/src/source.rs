//! Sources are plain [Stream]s of [Result]s; an `Err` item is a source failure. [Cursor] adds the
//! early-close contract on top: closing drops the underlying stream so whatever it holds is
//! released, and it can be done any number of times, including between two pulls.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project::pin_project;
use tracing::trace;

use crate::error::Result;

/// Lifts an iterator into an infallible source.
pub fn from_iter<I>(iter: I) -> impl Stream<Item = Result<I::Item>> + Send
where
    I: IntoIterator,
    I::IntoIter: Send,
{
    futures::stream::iter(iter.into_iter().map(Ok))
}

/// Pull cursor over a source. Once closed, or once the source reports its end, the cursor keeps
/// returning `None` and the source has been dropped.
#[pin_project]
pub struct Cursor<S> {
    #[pin]
    stream: Option<S>,
}

impl<S> Cursor<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Closes the source. Returns false if it was already closed.
    pub fn close(self: Pin<&mut Self>) -> bool {
        let mut this = self.project();
        if this.stream.is_none() {
            return false;
        }
        this.stream.set(None);
        trace!("source cursor closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl<S: Stream> Stream for Cursor<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
        let Some(stream) = self.as_mut().project().stream.as_pin_mut() else {
            return Poll::Ready(None);
        };
        match stream.poll_next(cx) {
            Poll::Ready(None) => {
                self.close();
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.stream {
            Some(stream) => stream.size_hint(),
            None => (0, Some(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use futures::StreamExt;

    use super::*;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_cursor_pulls_until_end() {
        let mut cursor = pin!(Cursor::new(from_iter(vec![1, 2])));
        assert_eq!(cursor.next().await, Some(Ok(1)));
        assert_eq!(cursor.next().await, Some(Ok(2)));
        assert_eq!(cursor.next().await, None);
        assert!(cursor.is_closed());
        assert_eq!(cursor.next().await, None);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_drops_source() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(Arc::clone(&dropped));
        let source = from_iter(0..).map(move |item| {
            let _ = &flag;
            item
        });

        let mut cursor = pin!(Cursor::new(source));
        assert_eq!(cursor.next().await, Some(Ok(0)));
        assert!(!dropped.load(Ordering::SeqCst));

        assert!(cursor.as_mut().close());
        assert!(dropped.load(Ordering::SeqCst));
        assert!(!cursor.as_mut().close());
        assert_eq!(cursor.next().await, None);
    }
}
