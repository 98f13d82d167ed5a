//! Configuration type definitions for the relay, TCP sockets, and logging.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Forwarding endpoints and relay behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Address to accept connections on (`host:port`, or `:port` for all interfaces).
    #[serde(default)]
    pub listen: String,
    /// Address every accepted connection is forwarded to (`host:port`).
    #[serde(default, alias = "target")]
    pub speak: String,
    /// How a relay is torn down once one direction stops.
    #[serde(default)]
    pub close_mode: CloseMode,
    /// Copy buffer size per direction (bytes).
    #[serde(default = "default_relay_buffer_size")]
    pub buffer_size: usize,
    /// Timeout for dialing the target (seconds).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Report recoverable copy errors at operator-visible level.
    #[serde(default)]
    pub verbose: bool,
}

impl RelayConfig {
    /// Both endpoints are present.
    pub fn has_endpoints(&self) -> bool {
        !self.listen.trim().is_empty() && !self.speak.trim().is_empty()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: String::new(),
            speak: String::new(),
            close_mode: CloseMode::default(),
            buffer_size: default_relay_buffer_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
            verbose: false,
        }
    }
}

/// Teardown strategy for a relay pair.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CloseMode {
    /// Close both connections as soon as either direction stops.
    #[default]
    Full,
    /// Propagate end-of-stream as a write shutdown and let the other
    /// direction drain; errors still close both connections.
    Half,
}

impl fmt::Display for CloseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseMode::Full => f.write_str("full"),
            CloseMode::Half => f.write_str("half"),
        }
    }
}

/// TCP socket options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Set TCP_NODELAY on both sides of every relay.
    #[serde(default = "default_tcp_no_delay")]
    pub no_delay: bool,
    /// Listener backlog (pending connections queue size).
    #[serde(default = "default_connection_backlog")]
    pub backlog: u32,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            no_delay: default_tcp_no_delay(),
            backlog: default_connection_backlog(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"listenbuddy_relay": "debug"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}
