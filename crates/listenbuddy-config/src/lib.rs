//! Configuration loading, validation, and CLI overrides.
//!
//! Configuration may come from a file (TOML, JSON or YAML, chosen by
//! extension), from command-line flags, or both; flags win.

mod cli;
mod defaults;
mod loader;
mod types;
mod validate;

pub use cli::{CliOverrides, apply_overrides};
pub use loader::{ConfigError, load_config};
pub use types::*;
pub use validate::{split_host_port, validate_config};
