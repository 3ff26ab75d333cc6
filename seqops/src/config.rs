use tokio::sync::Semaphore;

use crate::cancel::CancelSignal;
use crate::error::{Error, Result};

const DEFAULT_CONCURRENCY: usize = 1;

/// Largest concurrency gate the mapper builds. The result queue holds one more entry than the
/// gate, and both are bounded by the semaphore permit limit.
const MAX_CONCURRENCY: usize = Semaphore::MAX_PERMITS - 1;

/// Options recognized by every operator. `concurrency` only matters for the operators built on the
/// mapper (map, filter, flat_map, for_each and the matching aggregators), the rest only look at the
/// signal.
#[derive(Debug, Clone)]
pub struct Options {
    concurrency: usize,
    signal: Option<CancelSignal>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            concurrency: DEFAULT_CONCURRENCY,
            signal: None,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of outstanding transform invocations.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// External cancellation signal observed by the operator.
    pub fn with_signal(mut self, signal: CancelSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn signal(&self) -> Option<&CancelSignal> {
        self.signal.as_ref()
    }

    /// Returns the aborted error if the signal has already fired.
    pub(crate) fn check_signal(&self) -> Result<()> {
        match &self.signal {
            Some(signal) if signal.is_cancelled() => Err(signal.abort_error()),
            _ => Ok(()),
        }
    }

    /// Concurrency the mapper actually uses. Values above what a gate can hold are capped, since
    /// no more invocations than that could ever be in flight anyway.
    pub(crate) fn effective_concurrency(&self) -> usize {
        self.concurrency.min(MAX_CONCURRENCY)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.concurrency < 1 {
            return Err(Error::InvalidArgument(format!(
                "concurrency must be >= 1, received {}",
                self.concurrency
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert_eq!(opts.concurrency(), 1);
        assert!(opts.signal().is_none());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let err = Options::new().with_concurrency(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_oversized_concurrency_is_capped() {
        let opts = Options::new().with_concurrency(usize::MAX);
        assert!(opts.validate().is_ok());
        assert_eq!(opts.concurrency(), usize::MAX);
        assert_eq!(opts.effective_concurrency(), Semaphore::MAX_PERMITS - 1);

        let opts = Options::new().with_concurrency(1 << 62);
        assert_eq!(opts.effective_concurrency(), MAX_CONCURRENCY);

        let opts = Options::new().with_concurrency(16);
        assert_eq!(opts.effective_concurrency(), 16);
    }

    #[test]
    fn test_check_signal() {
        let signal = CancelSignal::new();
        let opts = Options::new().with_signal(signal.clone());
        assert!(opts.check_signal().is_ok());

        signal.cancel_with_reason("stop");
        assert_eq!(
            opts.check_signal(),
            Err(Error::Aborted {
                reason: Some("stop".to_string())
            })
        );
    }
}
