use std::net::SocketAddr;

use mtbridge_exchange::{BridgeState, IndicatorHandle, Target};
use mtbridge_frame::{FrameError, SocketType};
use mtbridge_transport::TcpSocket;
use tracing::{debug, info, warn};

use crate::config::EndpointConfig;
use crate::error::{EndpointError, Result};
use crate::wire::Wire;

/// What one call to [`Endpoint::receive`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// A zero-length probe; it has already been answered.
    NoData,
    /// The global buffer was replaced.
    Global,
    /// The buffer of this indicator was replaced.
    Indicator(IndicatorHandle),
}

impl From<Target> for Received {
    fn from(target: Target) -> Self {
        match target {
            Target::Global => Received::Global,
            Target::Indicator(handle) => Received::Indicator(handle),
        }
    }
}

struct Connection {
    id: u64,
    peer: Option<SocketAddr>,
    wire: Wire,
}

/// A bound reply endpoint and the bridge state it serves.
///
/// Serves one peer connection at a time and enforces strict alternation:
/// every request that reached the caller must be answered with
/// [`Endpoint::send_reply`] before the next [`Endpoint::receive`].
pub struct Endpoint {
    socket: TcpSocket,
    config: EndpointConfig,
    conn: Option<Connection>,
    state: BridgeState,
    pending: bool,
    next_conn_id: u64,
}

impl Endpoint {
    /// Listen on every interface at `port`.
    pub fn open(port: u16) -> Result<Self> {
        Self::open_with_config(EndpointConfig::new(port))
    }

    pub fn open_with_config(config: EndpointConfig) -> Result<Self> {
        let socket = TcpSocket::bind(&config.host, config.port)?;
        Ok(Self {
            socket,
            config,
            conn: None,
            state: BridgeState::new(),
            pending: false,
            next_conn_id: 1,
        })
    }

    /// Block until the next request arrives and commit it.
    ///
    /// A probe is answered with an empty reply right away and reported as
    /// [`Received::NoData`]. When the current peer disconnects, the next
    /// connection is accepted and the wait continues.
    ///
    /// After an error, [`Endpoint::is_pending`] tells whether a reply is
    /// owed: a request that fails to decode or route still has to be
    /// answered, while [`EndpointError::ConnectionDropped`] means the
    /// connection was closed and nothing is owed.
    pub fn receive(&mut self) -> Result<Received> {
        if self.pending {
            return Err(EndpointError::OutOfSequence(
                "a reply is owed for the previous request",
            ));
        }

        loop {
            if self.conn.is_none() {
                match self.accept_connection() {
                    Ok(()) => {}
                    Err(EndpointError::Frame(err)) if err.is_disconnect() => {
                        debug!(error = %err, "peer left during handshake");
                        continue;
                    }
                    Err(EndpointError::Frame(err)) => {
                        warn!(error = %err, "rejecting connection");
                        return Err(EndpointError::ConnectionDropped(err));
                    }
                    Err(err) => return Err(err),
                }
            }
            let Some(conn) = self.conn.as_mut() else {
                continue;
            };

            let payload = match conn.wire.recv() {
                Ok(payload) => payload,
                Err(err) if err.is_disconnect() => {
                    info!(conn = conn.id, "peer disconnected, waiting for next connection");
                    self.conn = None;
                    continue;
                }
                Err(err) => {
                    // The stream can no longer be resynchronized.
                    warn!(conn = conn.id, error = %err, "dropping connection after frame error");
                    conn.wire.shutdown();
                    self.conn = None;
                    return Err(EndpointError::ConnectionDropped(err));
                }
            };

            if payload.is_empty() {
                debug!(conn = conn.id, "probe received");
                if let Err(err) = conn.wire.send(&[]) {
                    warn!(conn = conn.id, error = %err, "probe reply dropped");
                    self.conn = None;
                }
                return Ok(Received::NoData);
            }

            debug!(conn = conn.id, bytes = payload.len(), "request received");
            self.pending = true;
            let target = self.state.receive_message(&payload)?;
            return Ok(target.into());
        }
    }

    /// Answer the pending request with the buffer designated by `target`.
    ///
    /// An unknown target or an oversized reply leaves the request pending.
    pub fn send_reply(&mut self, target: Target) -> Result<()> {
        if !self.pending {
            return Err(EndpointError::OutOfSequence("no request is awaiting a reply"));
        }

        let reply = self.state.encode_reply(target)?;

        let Some(conn) = self.conn.as_mut() else {
            self.pending = false;
            return Err(EndpointError::TransportClosed(
                "peer disconnected before the reply".to_string(),
            ));
        };

        match conn.wire.send(&reply) {
            Ok(()) => {
                debug!(conn = conn.id, %target, bytes = reply.len(), "reply sent");
                self.pending = false;
                Ok(())
            }
            Err(err @ FrameError::PayloadTooLarge { .. }) => Err(err.into()),
            Err(err) => {
                warn!(conn = conn.id, peer = ?conn.peer, error = %err, "reply dropped");
                self.conn = None;
                self.pending = false;
                if err.is_disconnect() {
                    Err(EndpointError::TransportClosed(err.to_string()))
                } else {
                    Err(EndpointError::ConnectionDropped(err))
                }
            }
        }
    }

    /// True while a received request is waiting for its reply.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut BridgeState {
        &mut self.state
    }

    /// The address the endpoint is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Release the socket, the peer connection and the bridge state.
    pub fn close(mut self) {
        if let Some(conn) = self.conn.take() {
            conn.wire.shutdown();
        }
        info!(local_addr = %self.socket.local_addr(), "endpoint closed");
    }

    fn accept_connection(&mut self) -> Result<()> {
        let stream = self.socket.accept()?;
        let wire = Wire::establish(stream, &self.config.frame, SocketType::Rep)?;
        let peer = wire.peer_addr();
        let id = self.next_conn_id;
        self.next_conn_id += 1;
        info!(conn = id, peer = ?peer, protocol = ?self.config.frame.protocol, "peer connected");

        self.conn = Some(Connection { id, peer, wire });
        Ok(())
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("local_addr", &self.socket.local_addr())
            .field("connected", &self.conn.is_some())
            .field("pending", &self.pending)
            .finish()
    }
}
