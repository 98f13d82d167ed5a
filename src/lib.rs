//! # listenbuddy
//!
//! A TCP port forwarder. Every connection accepted on the listen address is
//! paired with a fresh connection to the target, and bytes are relayed both
//! ways until either side closes.
//!
//! ## Crates
//!
//! - [`listenbuddy_core`] - Defaults, error labels and the byte-copy primitive
//! - [`listenbuddy_config`] - Configuration loading, validation and CLI overrides
//! - [`listenbuddy_relay`] - Connection registry, relay pairs, listener and signals

pub use listenbuddy_config as config;
pub use listenbuddy_core as core;
pub use listenbuddy_relay as relay;
