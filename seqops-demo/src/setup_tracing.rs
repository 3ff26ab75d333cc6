use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::PanicHookInfo;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, filter::EnvFilter, fmt};

/// Panic hook to send panic info to `tracing` instead of stderr.
/// Without this, a panic inside the pipeline is printed to stderr as:
/// ```text
/// {"level":"INFO","message":"Starting line pipeline"}
///
/// thread 'main' panicked at seqops-demo/src/main.rs:97:13:
/// called `Result::unwrap()` on an `Err` value: ParseConfig("...")
/// ```
///
/// With the panic hook, the same becomes one more JSON log line:
/// ```text
/// {"level":"ERROR","message":"seqops-demo/src/main.rs:97:13: called `Result::unwrap()` ..."}
/// ```
fn report_panic(panic_info: &PanicHookInfo<'_>) {
    // noop if the RUST_BACKTRACE or RUST_LIB_BACKTRACE backtrace variables are both not set
    let backtrace = Backtrace::capture();
    let backtrace_captured = backtrace.status() == BacktraceStatus::Captured;
    let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        Some(*s)
    } else {
        panic_info
            .payload()
            .downcast_ref::<String>()
            .map(|s| s.as_str())
    };

    // https://doc.rust-lang.org/std/panic/struct.PanicHookInfo.html#method.location
    // This method will currently always return Some, but this may change in future versions.
    match (panic_info.location(), payload, backtrace_captured) {
        (Some(location), Some(payload), false) => {
            // Same as tracing::error!("{}", panic_info), except that all the info is on one line,
            // which keeps a JSON log stream one event per line
            tracing::error!(
                "{}:{}:{}: {}",
                location.file(),
                location.line(),
                location.column(),
                payload,
            );
        }
        _ => {
            // default formatting, with the captured backtrace
            tracing::error!("{}\n{}", panic_info, backtrace);
        }
    };
}

/// Logs go to stderr, stdout carries the pipeline output. RUST_LOG overrides the level, and
/// SEQOPS_DEBUG=true switches to debug level text logs instead of JSON.
pub(crate) fn register() {
    let debug_mode = std::env::var("SEQOPS_DEBUG").is_ok_and(|v| v.eq_ignore_ascii_case("true"));
    let default_log_level = if debug_mode { "debug" } else { "info" };

    let filter = EnvFilter::builder()
        .with_default_directive(default_log_level.parse().unwrap_or(Level::INFO.into()))
        .from_env_lossy();

    let layer = if debug_mode {
        fmt::layer().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .flatten_event(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .init();

    std::panic::set_hook(Box::new(report_panic));
}
