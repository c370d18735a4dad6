//! Whole-message framing for the mtbridge request/reply channel.
//!
//! Two wire formats are supported:
//! - [`zmtp`]: the ZeroMQ transport protocol, so stock `REQ` sockets can
//!   talk to the endpoint (the default)
//! - the native format, a 2-byte magic number ("MB") and a 4-byte
//!   little-endian payload length in front of each message
//!
//! Readers always hand out complete messages. A zero-length payload is a
//! valid message (the endpoint's probe).

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;
pub mod zmtp;

pub use codec::{
    decode_frame, encode_frame, FrameConfig, WireProtocol, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
pub use zmtp::SocketType;
