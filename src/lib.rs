pub use crate::error::{NchanError, Result};
pub use crate::nchan::channels::{
    ChannelAggregate, ChannelMessage, ChannelSummary, DEFAULT_RANKED_LIMIT, ReconcilerConfig,
};
pub use crate::nchan::{Nchan, NchanConfig};
pub use crate::nostr_manager::{NostrManager, NostrManagerError};

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt::Layer, prelude::*, registry::Registry};

use std::path::Path;
use std::sync::Mutex;

mod error;
pub mod nchan;
mod nostr_manager;
mod types;

static TRACING_GUARDS: OnceCell<Mutex<Vec<WorkerGuard>>> = OnceCell::new();
static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Installs the global tracing subscriber: stdout always, plus a daily rolling
/// file in `logs_dir` when one is given. Only the first call has any effect.
pub fn init_tracing(logs_dir: Option<&Path>) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let mut guards = Vec::with_capacity(2);

        let file_layer = match logs_dir {
            Some(logs_dir) => {
                let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
                    .rotation(tracing_appender::rolling::Rotation::DAILY)
                    .filename_prefix("nchan")
                    .filename_suffix("log")
                    .build(logs_dir)
                    .map_err(|e| NchanError::LoggingSetup(e.to_string()))?;
                let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
                guards.push(file_guard);

                Some(
                    Layer::new()
                        .with_writer(non_blocking_file)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            None => None,
        };

        let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(stdout_guard);

        let stdout_layer = Layer::new()
            .with_writer(non_blocking_stdout)
            .with_ansi(true)
            .with_target(true);

        Registry::default()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(stdout_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| NchanError::LoggingSetup(e.to_string()))?;

        TRACING_GUARDS.set(Mutex::new(guards)).ok();
        Ok::<(), NchanError>(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_writes_to_logs_dir() {
        let logs_dir = tempfile::TempDir::new().unwrap();

        init_tracing(Some(logs_dir.path())).unwrap();
        // Later calls are no-ops, with or without a directory
        init_tracing(None).unwrap();
        init_tracing(Some(logs_dir.path())).unwrap();

        assert!(TRACING_GUARDS.get().is_some());
    }
}
