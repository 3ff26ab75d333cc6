use std::future::Future;

use futures::{Stream, StreamExt};

use crate::cancel::Context;
use crate::combinators::filter;
use crate::config::Options;
use crate::error::Result;

/// Returns the first item the predicate accepts, or `None` if the source ends first. Pulling
/// stops at the first match.
pub async fn find<S, T, P, Fut>(source: S, predicate: P, options: Options) -> Result<Option<T>>
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
    P: Fn(&T, Context) -> Fut + Send + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    let mut matches = filter(source, predicate, options)?;
    matches.next().await.transpose()
}

/// True if the predicate accepts any item. Pulling stops at the first match.
pub async fn any<S, T, P, Fut>(source: S, predicate: P, options: Options) -> Result<bool>
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
    P: Fn(&T, Context) -> Fut + Send + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    Ok(find(source, predicate, options).await?.is_some())
}

/// True if the predicate accepts every item, vacuously so for an empty source. Pulling stops at
/// the first rejected item.
pub async fn all<S, T, P, Fut>(source: S, predicate: P, options: Options) -> Result<bool>
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
    P: Fn(&T, Context) -> Fut + Send + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    let rejects = move |value: &T, ctx: Context| {
        let verdict = predicate(value, ctx);
        async move { verdict.await.map(|accepted| !accepted) }
    };
    Ok(!any(source, rejects, options).await?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future;

    use super::*;
    use crate::cancel::CancelSignal;
    use crate::error::Error;
    use crate::source::from_iter;

    fn even(v: &u32, _: Context) -> future::Ready<Result<bool>> {
        future::ready(Ok(v % 2 == 0))
    }

    #[tokio::test]
    async fn test_find() {
        assert_eq!(
            find(from_iter(vec![1u32, 3, 4, 6]), even, Options::default()).await,
            Ok(Some(4))
        );
        assert_eq!(
            find(from_iter(vec![1u32, 3]), even, Options::default()).await,
            Ok(None)
        );
    }

    #[tokio::test]
    async fn test_any_and_all() {
        assert_eq!(any(from_iter(vec![1u32, 2, 3]), even, Options::default()).await, Ok(true));
        assert_eq!(any(from_iter(vec![1u32, 3]), even, Options::default()).await, Ok(false));
        assert_eq!(any(from_iter(Vec::<u32>::new()), even, Options::default()).await, Ok(false));

        assert_eq!(all(from_iter(vec![2u32, 4]), even, Options::default()).await, Ok(true));
        assert_eq!(all(from_iter(vec![2u32, 3, 4]), even, Options::default()).await, Ok(false));
        assert_eq!(all(from_iter(Vec::<u32>::new()), even, Options::default()).await, Ok(true));
    }

    #[tokio::test]
    async fn test_any_stops_at_first_match() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let source = from_iter(vec![1u32, 2, 3]).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(any(source, even, Options::default()).await, Ok(true));
        assert!(pulled.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_all_with_async_predicate() {
        let result = all(
            from_iter(1..=20u32),
            |v: &u32, _| {
                let v = *v;
                async move {
                    tokio::time::sleep(Duration::from_millis(u64::from(20 - v))).await;
                    Ok(v > 0)
                }
            },
            Options::new().with_concurrency(4),
        )
        .await;
        assert_eq!(result, Ok(true));
    }

    #[tokio::test]
    async fn test_predicate_failure_propagates() {
        let result = any(
            from_iter(vec![1u32, 2]),
            |_: &u32, _| future::ready(Err(Error::Transform("bad predicate".to_string()))),
            Options::default(),
        )
        .await;
        assert_eq!(result, Err(Error::Transform("bad predicate".to_string())));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let signal = CancelSignal::new();
        signal.cancel_with_reason("nope");
        let result = all(
            from_iter(vec![1u32]),
            even,
            Options::new().with_signal(signal.clone()),
        )
        .await;
        assert!(result.is_err_and(|e| e.is_aborted()));
        assert_eq!(signal.listener_count(), 0);
    }
}
