//! TCP transport for the mtbridge reply endpoint.
//!
//! This is the lowest layer of mtbridge: a bound listener that hands out
//! connected [`BridgeStream`]s, and the matching client-side connect.
//! Everything else builds on top of these two types.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{TcpSocket, ANY_HOST, DEFAULT_PORT};
pub use traits::BridgeStream;
