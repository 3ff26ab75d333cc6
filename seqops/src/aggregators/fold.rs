use std::future::Future;
use std::pin::pin;

use futures::future::{self, Either};
use futures::{Stream, StreamExt, TryFutureExt};
use tracing::debug;

use crate::cancel::{CancellationScope, Context};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::source::Cursor;

/// Combines every item into `init` with `combine`, one item at a time.
///
/// If the signal has already fired, the source is closed and the fold fails without pulling
/// anything. If it fires while folding, the fold unwinds at the next pull or while the combiner
/// is still running, and the combiner's [Context] is cancelled.
pub async fn fold<S, T, A, F, Fut>(
    source: S,
    init: A,
    mut combine: F,
    options: Options,
) -> Result<A>
where
    S: Stream<Item = Result<T>>,
    F: FnMut(A, T, Context) -> Fut,
    Fut: Future<Output = Result<A>>,
{
    let mut source = pin!(Cursor::new(source));
    if let Err(e) = options.check_signal() {
        source.as_mut().close();
        debug!("fold cancelled before start");
        return Err(e);
    }

    let scope = CancellationScope::new(options.signal());
    let mut acc = init;
    while let Some(item) = scope.run(source.next()).await? {
        acc = scope.run(combine(acc, item?, scope.context())).await??;
    }
    Ok(acc)
}

/// Like [fold], seeded with the first item instead of an initial value. The combiner is not
/// invoked for the seed, and an empty source fails with [Error::MissingArgs].
pub async fn reduce<S, T, F, Fut>(source: S, mut combine: F, options: Options) -> Result<T>
where
    S: Stream<Item = Result<T>>,
    F: FnMut(T, T, Context) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let reduced = fold(
        source,
        None,
        |acc, value, ctx| match acc {
            None => Either::Left(future::ready(Ok(Some(value)))),
            Some(acc) => Either::Right(combine(acc, value, ctx).map_ok(Some)),
        },
        options,
    )
    .await?;

    reduced.ok_or_else(|| {
        Error::MissingArgs("reduce of an empty sequence requires an initial value".to_string())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::cancel::CancelSignal;
    use crate::source::from_iter;

    #[tokio::test]
    async fn test_fold_with_async_combiner() {
        let sum = fold(
            from_iter(1..=4u32),
            100u32,
            |acc, v, _| async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok(acc + v)
            },
            Options::default(),
        )
        .await;
        assert_eq!(sum, Ok(110));
    }

    #[tokio::test]
    async fn test_fold_changes_type() {
        let joined = fold(
            from_iter(vec!["a", "b", "c"]),
            String::new(),
            |mut acc, v, _| {
                acc.push_str(v);
                future::ready(Ok(acc))
            },
            Options::default(),
        )
        .await;
        assert_eq!(joined, Ok("abc".to_string()));
    }

    #[tokio::test]
    async fn test_reduce_empty_is_missing_args() {
        let result = reduce(
            from_iter(Vec::<u32>::new()),
            |a, b, _| future::ready(Ok(a + b)),
            Options::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::MissingArgs(_))));
    }

    #[tokio::test]
    async fn test_reduce_single_item_skips_combiner() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = reduce(
            from_iter(vec![5u32]),
            move |a, b, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                future::ready(Ok(a + b))
            },
            Options::default(),
        )
        .await;
        assert_eq!(result, Ok(5));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fold_propagates_failures() {
        let source = futures::stream::iter(vec![Ok(1u32), Err(Error::Source("gone".to_string()))]);
        let result = fold(
            source,
            0u32,
            |a, b, _| future::ready(Ok(a + b)),
            Options::default(),
        )
        .await;
        assert_eq!(result, Err(Error::Source("gone".to_string())));

        let result = fold(
            from_iter(0..3u32),
            0u32,
            |_, _, _| future::ready(Err(Error::Transform("overflow".to_string()))),
            Options::default(),
        )
        .await;
        assert_eq!(result, Err(Error::Transform("overflow".to_string())));
    }

    #[tokio::test]
    async fn test_fold_precancelled_pulls_nothing() {
        let signal = CancelSignal::new();
        signal.cancel_with_reason("before start");
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let source = from_iter(0..10u32).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let result = fold(
            source,
            0u32,
            |a, b, _| future::ready(Ok(a + b)),
            Options::new().with_signal(signal.clone()),
        )
        .await;
        assert_eq!(
            result,
            Err(Error::Aborted {
                reason: Some("before start".to_string())
            })
        );
        assert_eq!(pulled.load(Ordering::SeqCst), 0);
        assert_eq!(signal.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_fold_unwinds_mid_combine() {
        let signal = CancelSignal::new();
        let cancel = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            fold(
                from_iter(0..10u32),
                0u32,
                |acc, v, _| async move {
                    if v == 2 {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                    Ok(acc + v)
                },
                Options::new().with_signal(signal.clone()),
            ),
        )
        .await
        .expect("fold must unwind promptly");
        assert_eq!(result, Err(Error::Aborted { reason: None }));
        assert_eq!(signal.listener_count(), 0);
    }
}
