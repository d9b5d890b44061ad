use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

use super::{RegistryError, RegistryResult};

/// Where an audit process sends its events.
#[derive(Debug, Clone, Copy)]
pub enum LogSink<'a> {
    /// NDJSON appended to a run's `logs.ndjson`, `info` and above.
    RunFile(&'a Path),
    /// Human-readable lines on stderr, `warn` and above; stdout stays free
    /// for the worker protocol.
    Stderr,
}

impl LogSink<'_> {
    fn default_level(self) -> &'static str {
        match self {
            LogSink::RunFile(_) => "info",
            LogSink::Stderr => "warn",
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the sink's default
/// level.
pub fn init_logging(sink: LogSink<'_>) -> RegistryResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(sink.default_level()));

    let layer = match sink {
        LogSink::RunFile(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt::layer()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_writer(Mutex::new(file))
                .with_filter(filter)
                .boxed()
        }
        LogSink::Stderr => tracing_subscriber::fmt::layer()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|err| RegistryError::Logging(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sinks_have_distinct_default_levels() {
        assert_eq!(LogSink::RunFile(Path::new("logs.ndjson")).default_level(), "info");
        assert_eq!(LogSink::Stderr.default_level(), "warn");
    }
}
