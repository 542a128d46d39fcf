//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set. Otherwise the filter is `journal=info`
//! (`debug` with `--verbose`). Output goes to stderr as text or JSON, and
//! optionally to a daily rolling file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Default)]
pub struct LogOptions<'a> {
    pub verbose: bool,
    pub json: bool,
    /// Directory for `journal.log.<date>` files.
    pub file_dir: Option<&'a Path>,
}

pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "journal=debug,journal_autosave=debug,tower_http=debug"
    } else {
        "journal=info,journal_autosave=info"
    }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process so buffered file output is flushed.
pub fn init(opts: &LogOptions<'_>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(opts.verbose)));

    let stderr_layer = if opts.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = match opts.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "journal.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let result = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init();
    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }

    guard
}
