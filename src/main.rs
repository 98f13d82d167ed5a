//! listenbuddy: forwards all connections from a given port to a different
//! address and port.
//!
//! ```text
//! listenbuddy --listen :8000 --speak localhost:80
//! ```
//!
//! Send SIGUSR1 to close every relayed connection without stopping the
//! forwarder.

use std::process::ExitCode;

use clap::Parser;
use listenbuddy_relay::ForwarderArgs;

#[tokio::main]
async fn main() -> ExitCode {
    let args = ForwarderArgs::parse();

    match listenbuddy_relay::cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
