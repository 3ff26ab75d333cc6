use std::future::Future;

use futures::Stream;

use crate::cancel::Context;
use crate::config::Options;
use crate::error::Result;
use crate::mapper::{Mapped, Step, map};

/// Keeps the items for which `predicate` resolves to true. The predicate looks at the item by
/// reference and returns a future of its verdict; up to `options.concurrency()` verdicts are
/// awaited at once and kept items come out in source order.
///
/// Rejected items never hold a slot of the concurrency gate when the verdict is known on the
/// first poll, so long runs of rejected items do not stall the producer.
pub fn filter<S, T, P, Fut>(source: S, predicate: P, options: Options) -> Result<Mapped<T>>
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
    P: Fn(&T, Context) -> Fut + Send + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    map(
        source,
        move |value: T, ctx| {
            let verdict = predicate(&value, ctx);
            async move {
                if verdict.await? {
                    Ok(Step::Yield(value))
                } else {
                    Ok(Step::Skip)
                }
            }
        },
        options,
    )
}
