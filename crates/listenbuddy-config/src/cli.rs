//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;
use crate::types::CloseMode;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Port (and optionally address) to listen on, e.g. :8000
    #[arg(long)]
    pub listen: Option<String>,
    /// Address and port to connect to, e.g. localhost:80
    #[arg(long, alias = "target")]
    pub speak: Option<String>,
    /// Log recoverable copy errors and raise the default log level to debug
    #[arg(short, long)]
    pub verbose: bool,
    /// Teardown strategy once one direction of a relay stops
    #[arg(long, value_enum)]
    pub close_mode: Option<CloseMode>,
    /// Copy buffer size per direction (bytes)
    #[arg(long)]
    pub buffer_size: Option<usize>,
    /// Timeout for dialing the target (seconds)
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,
    /// Set TCP_NODELAY on relayed sockets
    #[arg(long)]
    pub no_delay: Option<bool>,
    /// TCP listener backlog size
    #[arg(long)]
    pub backlog: Option<u32>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Override log format (pretty/compact/json)
    #[arg(long)]
    pub log_format: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.listen {
        config.relay.listen = v.clone();
    }
    if let Some(v) = &overrides.speak {
        config.relay.speak = v.clone();
    }
    if overrides.verbose {
        config.relay.verbose = true;
    }
    if let Some(v) = overrides.close_mode {
        config.relay.close_mode = v;
    }
    if let Some(v) = overrides.buffer_size {
        config.relay.buffer_size = v;
    }
    if let Some(v) = overrides.connect_timeout_secs {
        config.relay.connect_timeout_secs = v;
    }
    if let Some(v) = overrides.no_delay {
        config.tcp.no_delay = v;
    }
    if let Some(v) = overrides.backlog {
        config.tcp.backlog = v;
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
    if let Some(v) = &overrides.log_format {
        config.logging.format = Some(v.clone());
    }
}
