use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Where the daily log files go, relative to the working directory
pub const LOG_DIR: &str = "./logs";
const LOG_PREFIX: &str = "proposal";
const MAX_LOG_FILES: usize = 8;

/// Daily rotating `proposal.<date>.log` files, oldest pruned past eight
fn file_appender(dir: &Path) -> anyhow::Result<RollingFileAppender> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)?;
    Ok(appender)
}

/// Installs the global subscriber writing to stdout and to the log directory
///
/// `RUST_LOG` wins over the config's debug switch when set. The returned
/// guard flushes the file writer on drop, so keep it alive until exit.
pub fn init(debug: bool, dir: &Path) -> anyhow::Result<WorkerGuard> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender(dir)?);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(debug).with_writer(std::io::stdout))
        .with(
            fmt::layer()
                .with_target(debug)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()?;

    Ok(guard)
}
