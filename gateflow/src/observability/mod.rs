//! Observability utilities.

mod logging;
mod timer;

pub use logging::{init_logging, LogConfig, LogFormat, DEFAULT_LOG_BACKUPS, LOG_FILE_PREFIX};
pub use timer::SpanTimer;
