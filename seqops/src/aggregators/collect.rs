use std::pin::pin;

use futures::{Stream, StreamExt};

use crate::cancel::CancellationScope;
use crate::config::Options;
use crate::error::Result;
use crate::source::Cursor;

/// Pulls every item into a vector.
///
/// Cancellation is checked before each item is accepted, so a signal that has already fired
/// yields no items at all.
pub async fn to_vec<S, T>(source: S, options: Options) -> Result<Vec<T>>
where
    S: Stream<Item = Result<T>>,
{
    let mut source = pin!(Cursor::new(source));
    let scope = CancellationScope::new(options.signal());
    let mut items = Vec::new();

    while let Some(item) = scope.run(source.next()).await? {
        scope.check()?;
        items.push(item?);
    }
    Ok(items)
}
