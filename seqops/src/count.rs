//! Coercion of take/drop arguments into a non-negative count.
//!
//! Integers pass through, negative values are out of range, NaN and missing values count as zero
//! and positive infinity never runs out. Text is parsed as a number; anything that is not a
//! number counts as zero.

use crate::error::{Error, Result};

/// A count that never runs out.
pub const UNBOUNDED: u64 = u64::MAX;

pub trait IntoCount {
    fn into_count(self) -> Result<u64>;
}

fn out_of_range(value: impl std::fmt::Display) -> Error {
    Error::OutOfRange(format!("count must be >= 0, received {value}"))
}

macro_rules! unsigned_count {
    ($($t:ty),*) => {
        $(impl IntoCount for $t {
            fn into_count(self) -> Result<u64> {
                Ok(u64::try_from(self).unwrap_or(UNBOUNDED))
            }
        })*
    };
}

macro_rules! signed_count {
    ($($t:ty),*) => {
        $(impl IntoCount for $t {
            fn into_count(self) -> Result<u64> {
                u64::try_from(self).map_err(|_| out_of_range(self))
            }
        })*
    };
}

unsigned_count!(u8, u16, u32, u64, usize);
signed_count!(i8, i16, i32, i64, isize);

impl IntoCount for f64 {
    fn into_count(self) -> Result<u64> {
        if self.is_nan() {
            return Ok(0);
        }
        if self < 0.0 {
            return Err(out_of_range(self));
        }
        if self >= UNBOUNDED as f64 {
            return Ok(UNBOUNDED);
        }
        Ok(self.trunc() as u64)
    }
}

impl IntoCount for f32 {
    fn into_count(self) -> Result<u64> {
        f64::from(self).into_count()
    }
}

impl IntoCount for &str {
    fn into_count(self) -> Result<u64> {
        let text = self.trim();
        if text.is_empty() {
            return Ok(0);
        }
        text.parse::<f64>().unwrap_or(f64::NAN).into_count()
    }
}

impl<T: IntoCount> IntoCount for Option<T> {
    fn into_count(self) -> Result<u64> {
        match self {
            Some(count) => count.into_count(),
            None => Ok(0),
        }
    }
}
