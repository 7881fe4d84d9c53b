//! Network utilities
//!
//! Blocking TCP connection setup with connect, read and write timeouts.

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Result type for network operations
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("No addresses found for {0}")]
    NoAddress(String),

    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Connection to {0} timed out")]
    Timeout(SocketAddr),

    #[error("Socket option error: {0}")]
    SocketOption(#[source] io::Error),
}

/// Resolve `host:port` into socket addresses
pub fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| Error::Resolve {
            host: host.to_string(),
            port,
            source,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(Error::NoAddress(format!("{}:{}", host, port)));
    }

    Ok(addrs)
}

/// Connect to a single address with a timeout
///
/// The returned stream has the same timeout applied to reads and writes,
/// so a TLS handshake on top of it cannot block forever.
pub fn connect_addr(addr: SocketAddr, timeout: Duration) -> Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(Error::SocketOption)?;

    socket
        .connect_timeout(&SockAddr::from(addr), timeout)
        .map_err(|source| {
            if source.kind() == io::ErrorKind::TimedOut {
                Error::Timeout(addr)
            } else {
                Error::Connect { addr, source }
            }
        })?;

    socket.set_nodelay(true).map_err(Error::SocketOption)?;
    socket
        .set_read_timeout(Some(timeout))
        .map_err(Error::SocketOption)?;
    socket
        .set_write_timeout(Some(timeout))
        .map_err(Error::SocketOption)?;

    Ok(socket.into())
}

/// Connect to `host:port`, trying every resolved address in order
pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let mut last_err = None;

    for addr in resolve(host, port)? {
        match connect_addr(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::NoAddress(format!("{}:{}", host, port))))
}
