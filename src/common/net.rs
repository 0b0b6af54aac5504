//! Network utility functions
//!
//! Socket setup shared by the accept loop and the destination connector.

use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use log::debug;
use socket2::{Domain, Protocol, SockRef, Socket, TcpKeepalive, Type};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use super::error::{ProxyError, Result};

/// Backlog for the listening socket
const LISTEN_BACKLOG: i32 = 128;

/// Parse a socket address
///
/// Tries direct parsing first, then falls back to name resolution.
///
/// # Arguments
///
/// * `addr` - The address string to parse (`host:port`)
pub fn parse_socket_addr(addr: &str) -> Result<SocketAddr> {
    if let Ok(socket_addr) = SocketAddr::from_str(addr) {
        return Ok(socket_addr);
    }

    match addr.to_socket_addrs() {
        Ok(mut addrs) => addrs
            .next()
            .ok_or_else(|| ProxyError::Config(format!("Failed to parse address: {}", addr))),
        Err(e) => Err(ProxyError::Config(format!("Failed to parse address {}: {}", addr, e))),
    }
}

/// Bind the listening socket
///
/// `SO_REUSEADDR` is set so a restarted relay can rebind while old
/// connections linger in `TIME_WAIT`.
pub fn bind_listener(host: &str, port: u16) -> Result<TcpListener> {
    let display = format!("{}:{}", host, port);
    let bind_err = |source: std::io::Error| ProxyError::Bind {
        addr: display.clone(),
        source,
    };

    let addr = parse_socket_addr(&display).map_err(|e| {
        bind_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
    })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

    TcpListener::from_std(socket.into()).map_err(bind_err)
}

/// Connect to `host:port` within `connect_timeout`
pub async fn connect_with_timeout(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<TcpStream> {
    let addr = format!("{}:{}", host, port);

    let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| ProxyError::Connect {
            addr: addr.clone(),
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "Connection timed out"),
        })?
        .map_err(|source| ProxyError::Connect { addr, source })?;

    configure_stream(&stream);
    Ok(stream)
}

/// Apply `TCP_NODELAY` and keepalive to a connected stream
///
/// Frames are small and latency-sensitive; failures here are not fatal.
pub fn configure_stream(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY: {}", e);
    }

    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(60))
        .with_interval(Duration::from_secs(20));

    if let Err(e) = SockRef::from(stream).set_tcp_keepalive(&keepalive) {
        debug!("Failed to set TCP keepalive: {}", e);
    }
}
