//! Global tracing subscriber setup.
//!
//! Every dispatched call is wrapped in a `dispatch` span carrying its kind
//! and selector; enabling `new` and `close` span events in
//! `logging.span_events` makes per-call timing visible.
//!
//! `RUST_LOG`, when set, replaces the configured base level. Entries in
//! `logging.filters` are added on top either way.

use std::ffi::OsStr;
use std::path::Path;

use tracing::warn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "plugin.log";

/// Installs the global subscriber described by `config`.
///
/// A no-op if a subscriber is already installed, so tests and embedders can
/// set up their own first.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = try_init_from_config(config);
}

/// Like [`init_from_config`], reporting whether a subscriber was already set.
pub fn try_init_from_config(config: &LoggingConfig) -> Result<(), TryInitError> {
    let missing_file = config.output == LogOutput::File && config.file_path.is_none();

    let base = fmt::layer()
        .with_writer(make_writer(config))
        .with_span_events(span_events(&config.span_events))
        .with_thread_ids(config.thread_ids)
        .with_file(config.file_location)
        .with_line_number(config.file_location);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Full => base.boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        #[cfg(feature = "json-log")]
        LogFormat::Json => base.json().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(build_filter(config))
        .try_init()?;

    if missing_file {
        warn!("File output requested but no file path configured, logging to stdout");
    }
    Ok(())
}

fn make_writer(config: &LoggingConfig) -> BoxMakeWriter {
    match (config.output, &config.file_path) {
        (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
        (LogOutput::File, Some(path)) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path.file_name().unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));
            BoxMakeWriter::new(tracing_appender::rolling::never(dir, name))
        }
        (LogOutput::Stdout | LogOutput::File, _) => BoxMakeWriter::new(std::io::stdout),
    }
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    for (module, level) in &config.filters {
        let directive = format!("{module}={level}");
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Ignoring invalid log filter {directive:?}: {e}"),
        }
    }
    filter
}

fn span_events(config: &SpanEventConfig) -> FmtSpan {
    [
        (config.new, FmtSpan::NEW),
        (config.enter, FmtSpan::ENTER),
        (config.exit, FmtSpan::EXIT),
        (config.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
}
