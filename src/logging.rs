//! Logging setup
//!
//! Optional file logging for embedders that want the provider's tracing
//! output without wiring their own subscriber. Callers hold on to the
//! returned guard for the process lifetime.

use std::path::PathBuf;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Log verbosity, `Off` disables the subscriber entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Install a non-blocking file subscriber at the given level.
///
/// Returns `None` (and installs nothing) for `LogLevel::Off`. Must be
/// called at most once per process; a second subscriber would be refused
/// by tracing anyway.
pub fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok()?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("docmirror logging at {:?}, file {:?}", level, log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("docmirror").join("docmirror.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".docmirror").join("docmirror.log");
    }
    PathBuf::from("docmirror.log")
}
