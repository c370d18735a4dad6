use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::BridgeStream;

/// Wildcard host: listen on every interface.
pub const ANY_HOST: &str = "0.0.0.0";

/// Well-known port the host application expects by default.
pub const DEFAULT_PORT: u16 = 8000;

/// TCP listener for the reply endpoint.
///
/// Binds the host and port it is given; there is no hidden default address.
pub struct TcpSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpSocket {
    /// Bind and listen on `host:port`.
    ///
    /// `*` is accepted as an alias for [`ANY_HOST`]. Port `0` asks the OS for
    /// an ephemeral port; see [`TcpSocket::local_addr`].
    pub fn bind(host: &str, port: u16) -> Result<Self> {
        let host = normalize_host(host);
        let addr = format!("{host}:{port}");

        let listener = TcpListener::bind((host, port)).map_err(|e| TransportError::Bind {
            addr: addr.clone(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.clone(),
            source: e,
        })?;

        info!(%local_addr, "listening on tcp endpoint");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<BridgeStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        let stream = BridgeStream::from_tcp(stream);
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Connect to a listening endpoint (blocking).
    pub fn connect(host: &str, port: u16) -> Result<BridgeStream> {
        let host = match normalize_host(host) {
            ANY_HOST => "127.0.0.1",
            other => other,
        };
        let stream = TcpStream::connect((host, port)).map_err(|e| TransportError::Connect {
            addr: format!("{host}:{port}"),
            source: e,
        })?;
        debug!(host, port, "connected to tcp endpoint");
        let stream = BridgeStream::from_tcp(stream);
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// The address this socket is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl std::fmt::Debug for TcpSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSocket")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

fn normalize_host(host: &str) -> &str {
    match host {
        "*" | "" => ANY_HOST,
        other => other,
    }
}
