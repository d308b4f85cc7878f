//! Logging infrastructure.
//!
//! Library code logs through `tracing`. Assembly jobs additionally get a
//! [`JobLogger`] that writes a per-job file and keeps a tail of engine
//! output for failure diagnosis.
//!
//! # Example
//!
//! ```no_run
//! use nva_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("promo", "/tmp/nva-logs", LogConfig::default(), None).unwrap();
//! logger.phase("Merge");
//! logger.command("ffmpeg", &["-f".into(), "concat".into()]);
//! logger.success("Merged 12 clips");
//! ```

mod job_logger;
mod types;

pub use job_logger::JobLogger;
pub(crate) use job_logger::sanitize_filename;
pub use types::{LineCallback, LogConfig, LogLevel, MessagePrefix};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_level` when set. Output goes to stderr.
/// Call once at startup.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
