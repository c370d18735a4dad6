use std::net::SocketAddr;

use bytes::Bytes;
use mtbridge_exchange::{decode_message, encode_message, ExchangeBuffer, ExchangeError};
use mtbridge_frame::{FrameConfig, SocketType};
use mtbridge_transport::TcpSocket;
use tracing::debug;

use crate::error::{EndpointError, Result};
use crate::wire::Wire;

/// Client side of the request/reply channel, a `REQ` socket under ZMTP.
///
/// Each [`RequestSocket::request`] sends one message and blocks for the reply.
pub struct RequestSocket {
    peer: Option<SocketAddr>,
    wire: Wire,
}

impl RequestSocket {
    /// Connect to an endpoint with default framing.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_config(host, port, FrameConfig::default())
    }

    pub fn connect_with_config(host: &str, port: u16, config: FrameConfig) -> Result<Self> {
        let stream = TcpSocket::connect(host, port)?;
        let wire = Wire::establish(stream, &config, SocketType::Req)?;
        Ok(Self {
            peer: wire.peer_addr(),
            wire,
        })
    }

    /// Send raw payload bytes and wait for the raw reply.
    pub fn request(&mut self, payload: &[u8]) -> Result<Bytes> {
        self.wire.send(payload)?;
        match self.wire.recv() {
            Ok(reply) => {
                debug!(sent = payload.len(), received = reply.len(), "exchange complete");
                Ok(reply)
            }
            Err(err) if err.is_disconnect() => Err(EndpointError::TransportClosed(format!(
                "endpoint {:?} closed before replying",
                self.peer
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// Encode `buffer`, send it and decode the reply.
    pub fn exchange(&mut self, buffer: &ExchangeBuffer) -> Result<ExchangeBuffer> {
        let payload = encode_message(buffer)?;
        let reply = self.request(&payload)?;
        Ok(decode_message(&reply)?)
    }

    /// Send the empty probe message; the endpoint must answer with an empty reply.
    pub fn probe(&mut self) -> Result<()> {
        let reply = self.request(&[])?;
        if reply.is_empty() {
            Ok(())
        } else {
            Err(ExchangeError::MalformedPayload(format!(
                "probe answered with {} bytes",
                reply.len()
            ))
            .into())
        }
    }

    /// Address of the connected endpoint.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}
