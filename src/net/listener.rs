//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Resolve and bind the configured host/port
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Surface bind failures as a distinct error

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Host could not be turned into a socket address.
    #[error("Failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    /// Failed to bind to address (in use, permission denied, ...).
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// Bound socket could not report its address.
    #[error("Failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

impl ListenerError {
    /// The underlying IO error kind, e.g. `AddrInUse` for a taken port.
    pub fn io_kind(&self) -> std::io::ErrorKind {
        match self {
            ListenerError::Resolve { source, .. }
            | ListenerError::Bind { source, .. }
            | ListenerError::LocalAddr(source)
            | ListenerError::Accept(source) => source.kind(),
        }
    }

    /// Whether this failure happened while binding (as opposed to accepting).
    pub fn is_bind_failure(&self) -> bool {
        !matches!(self, ListenerError::Accept(_))
    }
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
#[derive(Debug)]
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
}

impl Listener {
    /// Resolve `host` and bind the first address that works.
    pub async fn bind(host: &str, port: u16, max_connections: usize) -> Result<Self, ListenerError> {
        let host_trimmed = host.trim_start_matches('[').trim_end_matches(']');
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host_trimmed, port))
            .await
            .map_err(|source| ListenerError::Resolve {
                host: host.to_string(),
                port,
                source,
            })?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            match TcpListener::bind(addr).await {
                Ok(listener) => return Self::from_tcp(listener, max_connections),
                Err(source) => {
                    tracing::debug!(address = %addr, error = %source, "Bind attempt failed");
                    last_err = Some(ListenerError::Bind { addr, source });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ListenerError::Resolve {
            host: host.to_string(),
            port,
            source: std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "host resolved to no addresses",
            ),
        }))
    }

    /// Wrap an already-bound listener.
    pub fn from_tcp(listener: TcpListener, max_connections: usize) -> Result<Self, ListenerError> {
        let local_addr = listener.local_addr().map_err(ListenerError::LocalAddr)?;

        tracing::info!(
            address = %local_addr,
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached.
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // The semaphore is owned here and never closed.
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| {
                ListenerError::Accept(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "connection limiter closed",
                ))
            })?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool,
/// even if the connection task panics or is aborted.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// `ENFILE`: system-wide file table full.
#[cfg(target_os = "linux")]
const ENFILE: i32 = 23;
/// `EMFILE`: per-process descriptor limit reached.
#[cfg(target_os = "linux")]
const EMFILE: i32 = 24;

/// Descriptor exhaustion. Only mapped on Linux, where the errno values are known.
fn is_fd_exhaustion(err: &std::io::Error) -> bool {
    #[cfg(target_os = "linux")]
    {
        matches!(err.raw_os_error(), Some(ENFILE) | Some(EMFILE))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = err;
        false
    }
}

/// Whether an accept error only affects one connection.
///
/// Resource exhaustion (`EMFILE`/`ENFILE`) and aborted handshakes should not
/// take the listener down.
pub fn is_transient_accept_error(err: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        err.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionRefused
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
    ) || is_fd_exhaustion(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let listener = Listener::bind("127.0.0.1", 0, 4).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
        assert_eq!(listener.available_permits(), 4);
        assert_eq!(listener.max_connections(), 4);
    }

    #[tokio::test]
    async fn second_bind_reports_addr_in_use() {
        let first = Listener::bind("127.0.0.1", 0, 1).await.unwrap();
        let port = first.local_addr().unwrap().port();

        let err = Listener::bind("127.0.0.1", port, 1).await.unwrap_err();
        assert!(err.is_bind_failure());
        assert_eq!(err.io_kind(), ErrorKind::AddrInUse);
    }

    #[tokio::test]
    async fn permits_are_held_per_connection() {
        let listener = Listener::bind("127.0.0.1", 0, 2).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _peer, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 1);

        drop(permit);
        assert_eq!(listener.available_permits(), 2);
    }

    #[test]
    fn transient_errors() {
        assert!(is_transient_accept_error(&std::io::Error::from(ErrorKind::ConnectionAborted)));
        assert!(!is_transient_accept_error(&std::io::Error::from(ErrorKind::InvalidInput)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn descriptor_exhaustion_is_transient() {
        assert!(is_transient_accept_error(&std::io::Error::from_raw_os_error(EMFILE)));
        assert!(is_transient_accept_error(&std::io::Error::from_raw_os_error(ENFILE)));
    }
}
