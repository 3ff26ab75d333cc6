use std::collections::HashMap;
use std::time::Duration;

use crate::error::Error;

const ENV_SEQOPS_CONCURRENCY: &str = "SEQOPS_CONCURRENCY";
const ENV_SEQOPS_LIMIT: &str = "SEQOPS_LIMIT";
const ENV_SEQOPS_DELAY_PER_WORD_MS: &str = "SEQOPS_DELAY_PER_WORD_MS";

const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_LIMIT: &str = "Infinity";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Settings {
    /// Lines processed at once.
    pub(crate) concurrency: usize,
    /// How many non-empty lines to print, coerced the way take counts are.
    pub(crate) limit: String,
    /// Simulated work per word of a line.
    pub(crate) delay_per_word: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            limit: DEFAULT_LIMIT.to_owned(),
            delay_per_word: Duration::ZERO,
        }
    }
}

/// This implementation is to load settings from env variables
impl TryFrom<HashMap<String, String>> for Settings {
    type Error = Error;
    fn try_from(env_vars: HashMap<String, String>) -> std::result::Result<Self, Self::Error> {
        let mut settings = Settings::default();

        if let Some(concurrency) = env_vars.get(ENV_SEQOPS_CONCURRENCY) {
            settings.concurrency = concurrency.parse().map_err(|e| {
                Error::ParseConfig(format!(
                    "Parsing {ENV_SEQOPS_CONCURRENCY}(set to '{concurrency}'): {e:?}"
                ))
            })?;
        }

        if let Some(limit) = env_vars.get(ENV_SEQOPS_LIMIT) {
            settings.limit = limit.to_owned();
        }

        if let Some(delay) = env_vars.get(ENV_SEQOPS_DELAY_PER_WORD_MS) {
            let delay_ms: u64 = delay.parse().map_err(|e| {
                Error::ParseConfig(format!("parsing {ENV_SEQOPS_DELAY_PER_WORD_MS}: {e:?}"))
            })?;
            settings.delay_per_word = Duration::from_millis(delay_ms);
        }

        Ok(settings)
    }
}
