//! Terminal aggregators consuming a sequence down to a single result.
//!
//! [fold()], [reduce()] and [to_vec()] pull sequentially under their own [CancellationScope]
//! and stop as soon as the scope is cancelled. [any()], [all()] and [find()] run on top of
//! [crate::combinators::filter()] and stop pulling at the first decisive item.
//!
//! [CancellationScope]: crate::cancel::CancellationScope

mod collect;
mod fold;
mod matching;

pub use collect::to_vec;
pub use fold::{fold, reduce};
pub use matching::{all, any, find};
