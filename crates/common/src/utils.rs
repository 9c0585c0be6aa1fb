use std::time::{SystemTime, UNIX_EPOCH};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::LoggingConfig;

pub fn utcnow_sec() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// Everything at info, minus the chattiest HTTP internals. RUST_LOG replaces
/// the whole filter when set.
const DEFAULT_LOG_DIRECTIVES: &str = "info,hyper=warn,reqwest=warn";

/// Console or daily-rotated file logging. The returned guard must stay alive
/// for the life of the process when file logging is on, or buffered lines
/// are lost on exit.
pub fn init_tracing_log(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

    match config {
        LoggingConfig::Console => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
        LoggingConfig::File { dir_path, file_name } => {
            let appender = tracing_appender::rolling::daily(dir_path, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).init();
            Some(guard)
        }
    }
}
