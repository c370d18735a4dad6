//! Request/reply data bridge between a trading terminal and external processes.
//!
//! mtbridge exchanges integer, real and text arrays over a blocking
//! request/reply channel, either through a global buffer or through named
//! indicators, each with its own buffer.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listener and stream
//! - [`frame`]: whole-message framing
//! - [`exchange`]: exchange buffers, msgpack codec, routing and indicator registry
//! - [`endpoint`]: the reply endpoint and its client (behind `endpoint` feature)
//!
//! The C ABI lives in the `mtbridge-ffi` crate.

/// Re-export transport types.
pub mod transport {
    pub use mtbridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mtbridge_frame::*;
}

/// Re-export exchange types.
pub mod exchange {
    pub use mtbridge_exchange::*;
}

/// Re-export endpoint types (requires `endpoint` feature).
#[cfg(feature = "endpoint")]
pub mod endpoint {
    pub use mtbridge_endpoint::*;
}
