//! Error type constants for logging.
//!
//! These constants provide consistent error classification across all crates.

/// I/O error.
pub const ERROR_IO: &str = "io";
/// Listen address resolution error.
pub const ERROR_RESOLVE: &str = "resolve";
/// Listener bind error.
pub const ERROR_BIND: &str = "bind";
/// Accept loop error.
pub const ERROR_ACCEPT: &str = "accept";
/// Outbound dial error.
pub const ERROR_DIAL: &str = "dial";
/// Timeout error.
pub const ERROR_TIMEOUT: &str = "timeout";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
/// Destination accepted fewer bytes than offered.
pub const ERROR_SHORT_WRITE: &str = "short_write";
