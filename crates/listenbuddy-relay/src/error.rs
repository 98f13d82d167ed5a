//! Error types for the relay crate.

use std::io;

use listenbuddy_config::ConfigError;
use listenbuddy_core::{
    ERROR_ACCEPT, ERROR_BIND, ERROR_CONFIG, ERROR_DIAL, ERROR_IO, ERROR_RESOLVE, ERROR_TIMEOUT,
};
use thiserror::Error;

/// Errors that can occur in the relay engine.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot resolve {addr}: {reason}")]
    Resolve { addr: String, reason: String },

    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("accept: {0}")]
    Accept(#[source] io::Error),

    #[error("dial {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("connect timeout to {0}")]
    ConnectTimeout(String),
}

impl RelayError {
    /// Get the error type string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            RelayError::Io(_) => ERROR_IO,
            RelayError::Config(_) => ERROR_CONFIG,
            RelayError::Resolve { .. } => ERROR_RESOLVE,
            RelayError::Bind { .. } => ERROR_BIND,
            RelayError::Accept(_) => ERROR_ACCEPT,
            RelayError::Dial { .. } => ERROR_DIAL,
            RelayError::ConnectTimeout(_) => ERROR_TIMEOUT,
        }
    }
}
