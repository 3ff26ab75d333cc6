//! Reads lines from stdin, summarizes them concurrently and prints the summaries in input order.
//!
//! ```text
//! SEQOPS_CONCURRENCY=8 SEQOPS_LIMIT=3 seqops-demo < notes.txt
//! ```

use std::collections::HashMap;
use std::env;
use std::fmt;

use futures::{TryStreamExt, future};
use seqops::{CancelSignal, Context, Options, Step, fold, indexed_pairs, map, take_n};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::Result;

mod config;
mod error;
mod setup_tracing;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e.into());
    }
    info!("Exiting...");

    Ok(())
}

/// Word and character counts of one input line.
#[derive(Debug, Clone, PartialEq)]
struct LineSummary {
    words: usize,
    chars: usize,
    shouted: String,
}

impl LineSummary {
    fn of(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(Self {
            words: line.split_whitespace().count(),
            chars: line.chars().count(),
            shouted: line.to_uppercase(),
        })
    }
}

impl fmt::Display for LineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} words, {} chars: {}", self.words, self.chars, self.shouted)
    }
}

async fn run() -> Result<()> {
    let vars: HashMap<String, String> = env::vars().collect();
    let settings: Settings = vars.try_into()?;
    info!(?settings, "Starting line pipeline");

    let signal = CancelSignal::new();
    let shutdown_handle = tokio::spawn(shutdown_signal(signal.clone()));
    let opts = Options::new().with_signal(signal);

    let lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines())
        .map_err(|e| seqops::Error::Source(format!("reading stdin: {e}")));

    let delay_per_word = settings.delay_per_word;
    let summaries = map(
        lines,
        move |line: String, ctx: Context| async move {
            let Some(summary) = LineSummary::of(&line) else {
                return Ok(Step::Skip);
            };
            let words = u32::try_from(summary.words).unwrap_or(u32::MAX);
            let work = delay_per_word.saturating_mul(words);
            if !work.is_zero() {
                tokio::select! {
                    _ = ctx.cancelled() => return Ok(Step::Skip),
                    _ = tokio::time::sleep(work) => {}
                }
            }
            Ok(Step::Yield(summary))
        },
        opts.clone().with_concurrency(settings.concurrency),
    )?;

    let limited = take_n(summaries, settings.limit.as_str(), opts.clone())?;
    let numbered = indexed_pairs(limited, opts.clone());

    let outcome = fold(
        numbered,
        0usize,
        |total, (index, summary), _| {
            println!("{:>5}  {summary}", index + 1);
            future::ready(Ok(total + summary.words))
        },
        opts,
    )
    .await;

    if !shutdown_handle.is_finished() {
        shutdown_handle.abort();
    }

    match outcome {
        Ok(total_words) => {
            info!(total_words, "Finished reading input");
            Ok(())
        }
        Err(e) if e.is_aborted() => {
            warn!(error = %e, "Pipeline cancelled");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn shutdown_signal(cancel: CancelSignal) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => {
                warn!(?e, "Failed to install Ctrl+C handler");
                future::pending::<()>().await;
            }
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal");
            }
            Err(e) => {
                warn!(?e, "Failed to install terminate handler");
                future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    debug!("cancelling pipeline");
    cancel.cancel_with_reason("received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_summary() {
        assert_eq!(LineSummary::of("   "), None);
        let summary = LineSummary::of("  hello async world ").unwrap();
        assert_eq!(summary.words, 3);
        assert_eq!(summary.chars, 17);
        assert_eq!(summary.to_string(), "3 words, 17 chars: HELLO ASYNC WORLD");
    }

    #[tokio::test]
    async fn test_pipeline_over_in_memory_lines() {
        let lines = seqops::from_iter(vec![
            "one two".to_string(),
            String::new(),
            "three".to_string(),
        ]);
        let summaries = map(
            lines,
            |line: String, _| async move {
                Ok(match LineSummary::of(&line) {
                    Some(summary) => Step::Yield(summary),
                    None => Step::Skip,
                })
            },
            Options::new().with_concurrency(2),
        )
        .unwrap();
        let total = fold(
            indexed_pairs(summaries, Options::default()),
            0usize,
            |total, (_, summary), _| future::ready(Ok(total + summary.words)),
            Options::default(),
        )
        .await;
        assert_eq!(total, Ok(3));
    }
}
