use std::future::Future;

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::cancel::Context;
use crate::config::Options;
use crate::error::Result;
use crate::mapper::{Step, map};

/// Runs `action` on every item for its side effect, with up to `options.concurrency()` actions in
/// flight. Resolves once the source is exhausted and every action has completed, or with the
/// first failure.
pub async fn for_each<S, T, F, Fut>(source: S, action: F, options: Options) -> Result<()>
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
    F: Fn(T, Context) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut mapped = map(
        source,
        move |value, ctx| {
            let done = action(value, ctx);
            async move {
                done.await?;
                Ok(Step::<()>::Skip)
            }
        },
        options,
    )?;

    // every invocation resolves to the skip marker, so only failures ever come out
    while let Some(outcome) = mapped.next().await {
        outcome?;
    }
    debug!("for_each completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::cancel::CancelSignal;
    use crate::error::Error;
    use crate::source::from_iter;

    #[tokio::test]
    async fn test_for_each_visits_every_item() {
        let seen = Arc::new(Mutex::new(vec![]));
        let sink = Arc::clone(&seen);
        for_each(
            from_iter(0..50u32),
            move |v, _| {
                let sink = Arc::clone(&sink);
                async move {
                    tokio::time::sleep(Duration::from_millis(u64::from(v % 3))).await;
                    sink.lock().push(v);
                    Ok(())
                }
            },
            Options::new().with_concurrency(8),
        )
        .await
        .unwrap();

        let mut seen = seen.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_for_each_reports_failure() {
        let result = for_each(
            from_iter(0..10u32),
            |v, _| async move {
                if v == 4 {
                    return Err(Error::Transform("side effect failed".to_string()));
                }
                Ok(())
            },
            Options::default(),
        )
        .await;
        assert_eq!(
            result,
            Err(Error::Transform("side effect failed".to_string()))
        );
    }

    #[tokio::test]
    async fn test_for_each_cancelled() {
        let signal = CancelSignal::new();
        let cancel = signal.clone();
        let result = for_each(
            from_iter(0..u32::MAX),
            move |v, _| {
                if v == 3 {
                    cancel.cancel_with_reason("enough");
                }
                async { Ok(()) }
            },
            Options::new().with_signal(signal.clone()),
        )
        .await;
        assert_eq!(
            result,
            Err(Error::Aborted {
                reason: Some("enough".to_string())
            })
        );
        assert_eq!(signal.listener_count(), 0);
    }
}
