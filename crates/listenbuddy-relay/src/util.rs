//! Listener socket helpers.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use listenbuddy_core::defaults::DEFAULT_LISTEN_HOST;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tracing::debug;

use crate::error::RelayError;

/// Fill in the wildcard host for port-only listen addresses (`:8000`).
pub fn normalize_listen_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with(':') {
        format!("{DEFAULT_LISTEN_HOST}{addr}")
    } else {
        addr.to_string()
    }
}

/// Resolve a listen address to the first socket address it names.
pub async fn resolve_listen_addr(addr: &str) -> Result<SocketAddr, RelayError> {
    let normalized = normalize_listen_addr(addr);
    let mut addrs = tokio::net::lookup_host(normalized.as_str())
        .await
        .map_err(|e| RelayError::Resolve {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
    addrs.next().ok_or_else(|| RelayError::Resolve {
        addr: addr.to_string(),
        reason: "no addresses found".into(),
    })
}

/// Create a TCP listener with custom backlog.
///
/// The IPv6 wildcard (`[::]`) is opened dual-stack. If the host has no
/// usable IPv6 the listener falls back to `0.0.0.0` on the same port.
pub fn create_listener(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    if addr.ip() != IpAddr::V6(Ipv6Addr::UNSPECIFIED) {
        return bind_socket(addr, backlog, false);
    }
    match bind_socket(addr, backlog, true) {
        Ok(listener) => Ok(listener),
        Err(e) => {
            debug!(error = %e, "dual-stack listen failed, falling back to IPv4");
            bind_socket(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), addr.port()),
                backlog,
                false,
            )
        }
    }
}

fn bind_socket(addr: SocketAddr, backlog: u32, dual_stack: bool) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    if dual_stack {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;
    TcpListener::from_std(std::net::TcpListener::from(socket))
}
