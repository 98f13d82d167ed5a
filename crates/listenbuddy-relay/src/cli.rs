//! CLI module for the forwarder.
//!
//! Used by the `listenbuddy` binary; kept in the library so the argument
//! struct can be embedded elsewhere.

use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use listenbuddy_config::{
    CliOverrides, Config, LoggingConfig, apply_overrides, load_config, validate_config,
};
use listenbuddy_core::defaults::{
    DEFAULT_LOG_FORMAT, DEFAULT_LOG_LEVEL, DEFAULT_LOG_OUTPUT, VERBOSE_LOG_LEVEL,
};
use listenbuddy_core::{PROJECT_NAME, VERSION};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::RelayError;
use crate::signal::shutdown_signal;

const ABOUT_EXAMPLE: &str = "
Forwards all connections from a given port to a different address and port.
Example:
	listenbuddy --listen :8000 --speak localhost:80
";

/// Forwarder CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "listenbuddy",
    version,
    about = "Forwards all connections from a given port to a different address and port"
)]
pub struct ForwarderArgs {
    /// Optional config file (json/yaml/toml); flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Build the effective config from the optional file plus flag overrides.
pub fn resolve_config(args: &ForwarderArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    apply_overrides(&mut config, &args.overrides);
    Ok(config)
}

/// Run the forwarder with the given arguments.
///
/// Missing listen or target address prints usage and returns `Ok`.
pub async fn run(args: ForwarderArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&args)?;
    if !config.relay.has_endpoints() {
        print_usage()?;
        return Ok(());
    }
    validate_config(&config)?;

    init_tracing(&config.logging, config.relay.verbose);
    info!(version = VERSION, "{PROJECT_NAME} starting");

    let shutdown = CancellationToken::new();
    let shutdown_signal_token = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        shutdown_signal_token.cancel();
    });

    serve(config, shutdown).await?;
    Ok(())
}

/// Run the forwarder, reporting a fatal error to the log before returning it.
async fn serve(config: Config, shutdown: CancellationToken) -> Result<(), RelayError> {
    crate::forwarder::run(config, shutdown)
        .await
        .inspect_err(|e| error!(error = %e, error_type = e.error_type(), "forwarder stopped"))
}

fn print_usage() -> io::Result<()> {
    println!("{ABOUT_EXAMPLE}");
    ForwarderArgs::command().print_help()
}

/// Build the `EnvFilter` directive string: base level plus per-module filters.
fn filter_directives(config: &LoggingConfig, verbose: bool) -> String {
    let fallback = if verbose {
        VERBOSE_LOG_LEVEL
    } else {
        DEFAULT_LOG_LEVEL
    };
    let mut filter_str = config.level.as_deref().unwrap_or(fallback).to_string();

    let mut filters: Vec<_> = config.filters.iter().collect();
    filters.sort();
    for (module, level) in filters {
        filter_str.push(',');
        filter_str.push_str(module);
        filter_str.push('=');
        filter_str.push_str(level);
    }
    filter_str
}

fn init_tracing(config: &LoggingConfig, verbose: bool) {
    let filter = EnvFilter::try_new(filter_directives(config, verbose))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let format = config.format.as_deref().unwrap_or(DEFAULT_LOG_FORMAT);
    let output = config.output.as_deref().unwrap_or(DEFAULT_LOG_OUTPUT);

    match (format, output) {
        ("json", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stdout))
                .init();
        }
        ("json", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        ("compact", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stdout))
                .init();
        }
        ("compact", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
        (_, "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stdout))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use listenbuddy_config::CloseMode;
    use tracing::instrument::WithSubscriber;

    use crate::test_util::CapturedLogs;

    #[test]
    fn parses_flags() {
        let args = ForwarderArgs::try_parse_from([
            "listenbuddy",
            "--listen",
            ":8000",
            "--speak",
            "localhost:80",
            "-v",
        ])
        .unwrap();
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.relay.listen, ":8000");
        assert_eq!(config.relay.speak, "localhost:80");
        assert!(config.relay.verbose);
        assert_eq!(config.relay.close_mode, CloseMode::Full);
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[relay]\nlisten = \":9000\"\nspeak = \"example.com:80\"\nclose_mode = \"half\""
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let args = ForwarderArgs::try_parse_from([
            "listenbuddy",
            "--config",
            path.as_str(),
            "--speak",
            "localhost:8080",
        ])
        .unwrap();
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.relay.listen, ":9000");
        assert_eq!(config.relay.speak, "localhost:8080");
        assert_eq!(config.relay.close_mode, CloseMode::Half);
    }

    #[tokio::test]
    async fn missing_endpoints_is_not_an_error() {
        let args = ForwarderArgs::try_parse_from(["listenbuddy", "--listen", ":8000"]).unwrap();
        assert!(run(args).await.is_ok());
    }

    #[tokio::test]
    async fn invalid_config_is_an_error() {
        let args = ForwarderArgs::try_parse_from([
            "listenbuddy",
            "--listen",
            ":8000",
            "--speak",
            "localhost:80",
            "--buffer-size",
            "1",
        ])
        .unwrap();
        assert!(run(args).await.is_err());
    }

    #[test]
    fn verbose_raises_default_level() {
        let mut logging = LoggingConfig::default();
        assert_eq!(filter_directives(&logging, false), "info");
        assert_eq!(filter_directives(&logging, true), "debug");

        logging.level = Some("warn".into());
        logging
            .filters
            .insert("listenbuddy_relay".into(), "trace".into());
        assert_eq!(
            filter_directives(&logging, true),
            "warn,listenbuddy_relay=trace"
        );
    }

    #[tokio::test]
    async fn bind_failure_is_logged() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let mut config = Config::default();
        config.relay.listen = addr.clone();
        config.relay.speak = addr;

        let logs = CapturedLogs::default();
        let err = serve(config, CancellationToken::new())
            .with_subscriber(logs.subscriber())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Bind { .. }));

        let output = logs.contents();
        assert!(output.contains("ERROR"), "{output}");
        assert!(output.contains("forwarder stopped"), "{output}");
        assert!(output.contains("error_type=bind"), "{output}");
    }
}
