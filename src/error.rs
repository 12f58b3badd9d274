use std::io;
use thiserror::Error;

/// Custom error type for thmon
#[derive(Error, Debug)]
pub enum ThmonError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported platform: {0}")]
    Unsupported(String),

    #[error("Monitor is already stopped")]
    AlreadyStopped,

    #[error("Sampling thread panicked")]
    SamplerPanicked,

    #[error("Platform error: {0}")]
    Platform(String),
}

/// Result type alias for thmon
pub type Result<T> = std::result::Result<T, ThmonError>;

impl ThmonError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        ThmonError::Config(msg.into())
    }

    /// Create an unsupported platform error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        ThmonError::Unsupported(msg.into())
    }

    pub fn platform<S: Into<String>>(msg: S) -> Self {
        ThmonError::Platform(msg.into())
    }
}
