use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::fmt::LocalTime;
use crate::{Error, LogFormat};

const DEFAULT_LOG_FILTER: &str =
    "eirene_supervisor=debug,eirene_pool=debug,eirene_tasks=debug,eirene_watch=info,spawn=info,info";

/// Fluent builder for the process's global `tracing` subscriber.
pub struct TracingBuilder {
    log_format: LogFormat,
    filter: Option<EnvFilter>,
}

impl TracingBuilder {
    pub fn new() -> Self {
        Self { log_format: LogFormat::Full, filter: None }
    }

    pub fn with_format(format: LogFormat) -> Self {
        Self::new().with_log_format(format)
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    pub fn with_filter(mut self, filter: &str) -> Result<Self, Error> {
        self.filter = Some(EnvFilter::try_new(filter)?);
        Ok(self)
    }

    /// Filter from `RUST_LOG`, falling back to the crate's default filter if unset.
    pub fn with_env_filter_or_default(mut self) -> Result<Self, Error> {
        let default_filter = EnvFilter::try_new(DEFAULT_LOG_FILTER);
        self.filter = Some(EnvFilter::try_from_default_env().or(default_filter)?);
        Ok(self)
    }

    /// Installs the subscriber as the process's global default.
    pub fn try_init(self) -> Result<(), Error> {
        let filter = self.filter.unwrap_or_else(|| {
            EnvFilter::try_new(DEFAULT_LOG_FILTER).expect("default filter should be valid")
        });

        let fmt = match self.log_format {
            LogFormat::Full => tracing_subscriber::fmt::layer().with_timer(LocalTime::new()).boxed(),
            LogFormat::Json => {
                tracing_subscriber::fmt::layer().json().with_timer(LocalTime::new()).boxed()
            }
        };

        tracing_subscriber::registry().with(filter).with(fmt).try_init()?;
        Ok(())
    }
}

impl Default for TracingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_is_fluent() {
        let _builder = TracingBuilder::new().with_log_format(LogFormat::Json);
    }
}
