//! Request/reply endpoint for mtbridge.
//!
//! An [`Endpoint`] is a ZeroMQ-compatible `REP` socket: it binds a TCP port,
//! waits for one request at a time, commits it into the [`BridgeState`] it
//! owns and sends back the buffer the caller selects. [`RequestSocket`] is
//! the matching `REQ` side. Both can speak the native framing instead; see
//! [`WireProtocol`].

pub mod config;
pub mod connector;
pub mod endpoint;
pub mod error;
mod wire;

pub use config::EndpointConfig;
pub use connector::RequestSocket;
pub use endpoint::{Endpoint, Received};
pub use error::{EndpointError, Result};
pub use mtbridge_exchange::{BridgeState, ExchangeBuffer, IndicatorHandle, Target};
pub use mtbridge_frame::WireProtocol;
