//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Parse listen prefixes into bindable addresses
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Graceful handling of accept errors

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Listen prefix could not be parsed.
    #[error("Invalid prefix: {0}")]
    Prefix(#[from] PrefixError),
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(std::io::Error),
}

/// Reasons a listen prefix is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrefixError {
    #[error("unsupported scheme {0:?}")]
    Scheme(String),
    #[error("missing host")]
    MissingHost,
    #[error("invalid port {0:?}")]
    Port(String),
    #[error("path {0:?} is not supported, prefixes must end at the root")]
    Path(String),
}

/// A parsed listen prefix.
///
/// Accepts `host:port` and URL-style `http://host:port/` forms. The wildcard
/// hosts `+` and `*` bind every interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenPrefix {
    host: String,
    port: u16,
}

impl ListenPrefix {
    pub fn parse(raw: &str) -> Result<Self, PrefixError> {
        let raw = raw.trim();
        let (authority, default_port) = match raw.split_once("://") {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("http") => {
                let (authority, path) = match rest.find('/') {
                    Some(idx) => rest.split_at(idx),
                    None => (rest, ""),
                };
                if !path.is_empty() && path != "/" {
                    return Err(PrefixError::Path(path.to_string()));
                }
                (authority, Some(80))
            }
            Some((scheme, _)) => return Err(PrefixError::Scheme(scheme.to_string())),
            None => (raw, None),
        };

        let (host, port) = match authority.rsplit_once(':') {
            // A bare IPv6 literal has no port.
            Some((host, port)) if !port.ends_with(']') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| PrefixError::Port(port.to_string()))?;
                (host, port)
            }
            _ => match default_port {
                Some(port) => (authority, port),
                None => return Err(PrefixError::Port(String::new())),
            },
        };

        if host.is_empty() {
            return Err(PrefixError::MissingHost);
        }
        let host = match host {
            "+" | "*" => "0.0.0.0".to_string(),
            other => other.to_string(),
        };

        Ok(Self { host, port })
    }

    /// Address string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ListenPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}/", self.host, self.port)
    }
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Address resolved at bind time (ephemeral ports filled in).
    local_addr: SocketAddr,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
}

impl Listener {
    /// Bind to the given prefix with connection limits.
    pub async fn bind(prefix: &ListenPrefix, max_connections: usize) -> Result<Self, ListenerError> {
        let address = prefix.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ListenerError::Bind {
                address: address.clone(),
                source,
            })?;

        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind { address, source })?;

        tracing::info!(
            address = %local_addr,
            prefix = %prefix,
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            local_addr,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached.
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure). The semaphore is never closed.
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Accept(std::io::ErrorKind::BrokenPipe.into()))?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This ensures backpressure is maintained even if the connection handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
