//! Asynchronous sequence operators.
//!
//! A source is any [futures::Stream] of [Result]s. The building block is [map()], a bounded,
//! order-preserving concurrent mapper: it runs at most `concurrency` transform invocations at a
//! time, yields results in source order, and stops pulling the source as soon as the consumer
//! stops, something fails, or the caller's [CancelSignal] fires. The other operators are
//! compositions over it or plain sequential pulls:
//!
//! - combinators: [filter()], [flat_map()], [for_each()], [indexed_pairs()], [take_n()] and
//!   [drop_n()].
//! - aggregators: [fold()], [reduce()], [to_vec()], [find()], [any()] and [all()].
//!
//! Every invocation runs under its own [CancellationScope], which is torn down when the
//! invocation ends however it ends, so a long-lived signal never accumulates listeners.
//!
//! ```ignore
//! use futures::{StreamExt, future};
//! use seqops::{Options, Step, from_iter, map};
//!
//! let doubled: Vec<_> = map(
//!     from_iter(1..=3),
//!     |v, _| future::ready(Ok(Step::Yield(v * 2))),
//!     Options::new().with_concurrency(2),
//! )?
//! .collect()
//! .await;
//! ```

mod error;
pub use crate::error::{Error, Result};

mod config;
pub use crate::config::Options;

mod cancel;
pub use crate::cancel::{CancelSignal, CancellationScope, Context, ScopeState};

mod count;
pub use crate::count::{IntoCount, UNBOUNDED};

mod source;
pub use crate::source::{Cursor, from_iter};

mod mapper;
pub use crate::mapper::{Mapped, Step, map};

mod combinators;
pub use crate::combinators::{
    DropN, FlatMapped, IndexedPairs, TakeN, drop_n, filter, flat_map, for_each, indexed_pairs,
    take_n,
};

mod aggregators;
pub use crate::aggregators::{all, any, find, fold, reduce, to_vec};
