use std::fs;
use std::io;
use std::path::Path;

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::Subscriber;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "launcher.log";

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Sends logs to a daily rolling file in `log_dir`, or to stderr when that
/// directory can't be created.
pub fn init(log_dir: &Path) {
    match fs::create_dir_all(log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);

            let subscriber = Subscriber::builder()
                .with_env_filter(filter())
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .finish();
            if tracing::subscriber::set_global_default(subscriber).is_err() {
                eprintln!("logging already initialised");
            }
        }
        Err(e) => init_stderr(e),
    }
}

fn init_stderr(reason: io::Error) {
    let subscriber = Subscriber::builder()
        .with_env_filter(filter())
        .with_writer(io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        tracing::warn!("log directory unavailable ({}), logging to stderr", reason);
    }
}
