//! Sequence combinators derived from the mapper or from plain sequential pulling.
//!
//! [filter()], [flat_map()] and [for_each()] are thin policies over [crate::mapper::map] and
//! share its ordering, concurrency and cancellation behaviour. [indexed_pairs()], [take_n()] and
//! [drop_n()] pull their source one item at a time and only look at the signal of their options.

use crate::cancel::CancelSignal;
use crate::error::Error;

mod filter;
mod flat_map;
mod for_each;
mod indexed;
mod limit;

pub use filter::filter;
pub use flat_map::{FlatMapped, flat_map};
pub use for_each::for_each;
pub use indexed::{IndexedPairs, indexed_pairs};
pub use limit::{DropN, TakeN, drop_n, take_n};

/// Error to raise if the signal has fired.
fn signal_error(signal: Option<&CancelSignal>) -> Option<Error> {
    signal
        .filter(|signal| signal.is_cancelled())
        .map(CancelSignal::abort_error)
}
