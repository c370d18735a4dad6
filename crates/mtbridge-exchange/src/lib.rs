//! Exchange protocol core for mtbridge.
//!
//! One exchange moves one [`ExchangeBuffer`] (ints, reals, texts) in each
//! direction. Inbound messages are routed either to the global buffer or to
//! a named indicator held in the [`IndicatorRegistry`]; [`BridgeState`]
//! owns both and is the only place where a decoded message is committed.
//!
//! # Wire format
//!
//! A message is a msgpack array of up to three arrays, `[ints, reals, texts]`.
//! Empty members are left out when encoding. A message whose first integer is
//! above [`ADDRESSED_MARKER_THRESHOLD`] carries an indicator handle as its
//! second integer and is routed to that indicator.

pub mod buffer;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod marshal;
pub mod registry;
pub mod state;

pub use buffer::{BufferSizes, ExchangeBuffer};
pub use codec::{decode_message, encode_message, MAX_DECODE_DEPTH};
pub use envelope::{Envelope, Target, ADDRESSED_MARKER_THRESHOLD};
pub use error::{ExchangeError, Result};
pub use marshal::{copy_into, copy_texts_into, text_from_bytes, TextSlot};
pub use registry::{Indicator, IndicatorHandle, IndicatorInfo, IndicatorRegistry, MAX_INDICATORS};
pub use state::BridgeState;
