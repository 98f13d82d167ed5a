//! Configuration validation logic.

use crate::Config;
use crate::defaults::{max_relay_buffer_size, min_relay_buffer_size};
use crate::loader::ConfigError;

const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];
const LOG_OUTPUTS: [&str; 2] = ["stderr", "stdout"];

/// Split `host:port` into its parts. The host may be empty (`:8000`).
pub fn split_host_port(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.trim().rsplit_once(':')?;
    let port = port.parse().ok()?;
    Some((host, port))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.relay.listen.trim().is_empty() {
        return Err(ConfigError::Validation("relay.listen is empty".into()));
    }
    if config.relay.speak.trim().is_empty() {
        return Err(ConfigError::Validation("relay.speak is empty".into()));
    }
    if split_host_port(&config.relay.listen).is_none() {
        return Err(ConfigError::Validation(format!(
            "relay.listen must be [host]:port, got {:?}",
            config.relay.listen
        )));
    }
    match split_host_port(&config.relay.speak) {
        Some((host, _)) if !host.is_empty() => {}
        _ => {
            return Err(ConfigError::Validation(format!(
                "relay.speak must be host:port, got {:?}",
                config.relay.speak
            )));
        }
    }
    if config.relay.buffer_size < min_relay_buffer_size() {
        return Err(ConfigError::Validation(format!(
            "relay.buffer_size must be >= {}",
            min_relay_buffer_size()
        )));
    }
    if config.relay.buffer_size > max_relay_buffer_size() {
        return Err(ConfigError::Validation(
            "relay.buffer_size must be <= 1MB".into(),
        ));
    }
    if config.relay.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "relay.connect_timeout_secs must be > 0".into(),
        ));
    }
    if config.tcp.backlog == 0 {
        return Err(ConfigError::Validation("tcp.backlog must be > 0".into()));
    }
    if let Some(format) = config.logging.format.as_deref()
        && !LOG_FORMATS.contains(&format)
    {
        return Err(ConfigError::Validation(format!(
            "logging.format must be one of: {:?}",
            LOG_FORMATS
        )));
    }
    if let Some(output) = config.logging.output.as_deref()
        && !LOG_OUTPUTS.contains(&output)
    {
        return Err(ConfigError::Validation(format!(
            "logging.output must be one of: {:?}",
            LOG_OUTPUTS
        )));
    }
    Ok(())
}
