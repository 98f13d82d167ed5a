//! Connection-relay engine for the listenbuddy TCP forwarder.
//!
//! # Architecture
//!
//! - **Connection registry**: shared set of live connection handles with a
//!   bulk close-all.
//! - **Relay pair**: one accepted connection plus its dialed counterpart,
//!   copied in both directions by two tracked tasks.
//! - **Listener**: accept loop spawning one relay pair per connection.
//! - **Signal handler**: SIGUSR1 triggers close-all on the registry without
//!   stopping the process.

pub mod cli;
mod error;
pub mod forwarder;
mod handle;
pub mod listener;
pub mod pair;
mod registry;
pub mod signal;
pub mod transport;
mod util;

#[cfg(test)]
mod test_util;

pub use cli::ForwarderArgs;
pub use error::RelayError;
pub use forwarder::{Forwarder, run};
pub use handle::{Closable, ConnHandle, ConnId, Side};
pub use listener::Listener;
pub use pair::{
    Direction, DirectionEnd, DirectionReport, RelayPair, RelayReport, RelaySettings,
    serve_connection,
};
pub use registry::ConnectionRegistry;
pub use signal::{CloseAllTrigger, drive_close_all, spawn_user_signal_handler};
pub use tokio_util::sync::CancellationToken;
pub use transport::{Dialer, RelayStream, TcpDialer};
pub use util::normalize_listen_addr;
