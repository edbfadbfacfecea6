//! Logging bootstrap
//!
//! Sets up a tracing subscriber that writes to stderr and mirrors every
//! record into the configured log file.

use std::path::Path;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "cluster_worker=info,cluster_client=info";

/// Initializes logging
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for the lifetime of the process. When the log file cannot be opened the
/// worker keeps logging to stderr only.
pub fn init(log_file: &Path) -> Option<WorkerGuard> {
    let (file_layer, guard, file_error) = match file_appender(log_file) {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(fmt::layer())
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!(
            "Could not open log file {}, logging to stderr only: {:#}",
            log_file.display(),
            e
        );
    }

    guard
}

fn file_appender(log_file: &Path) -> anyhow::Result<RollingFileAppender> {
    let directory = log_file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log_file has no file name"))?;

    std::fs::create_dir_all(directory)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy().into_owned())
        .build(directory)?;

    Ok(appender)
}
