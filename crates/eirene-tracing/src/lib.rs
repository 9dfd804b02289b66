//! Structured logging setup for `eirenewatch`, built on `tracing` +
//! `tracing-subscriber` with a fluent builder and a local-time formatter.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod builder;
mod fmt;

pub use builder::TracingBuilder;
pub use fmt::LogFormat;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse environment filter: {0}")]
    EnvFilterParse(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to parse environment filter from env: {0}")]
    EnvFilterFromEnv(#[from] tracing_subscriber::filter::FromEnvError),

    #[error("failed to set global default subscriber: {0}")]
    TryInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Initializes the global subscriber with the given format, filtering via
/// `RUST_LOG` with a fallback to this crate's default filter.
pub fn init(format: LogFormat) -> Result<(), Error> {
    TracingBuilder::with_format(format).with_env_filter_or_default()?.try_init()
}
