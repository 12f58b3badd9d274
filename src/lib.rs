// thmon Library - Public API

// Re-export error types
pub mod error;
pub use error::{Result, ThmonError};

// Module declarations
pub mod commands;
pub mod core;
pub mod platform;

// Re-export commonly used types
pub use core::threads_monitor::{Metric, MonitorConfig, Report, ThreadsMonitor};

// Initialize logging
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
