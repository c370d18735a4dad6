use std::fmt;

use crate::buffer::ExchangeBuffer;
use crate::codec::decode_message;
use crate::error::{ExchangeError, Result};
use crate::registry::IndicatorHandle;

/// First integers above this value mark a message addressed to an indicator.
///
/// Existing peers address indicators this way, so the rule is kept on the
/// wire even though routing is explicit everywhere else.
pub const ADDRESSED_MARKER_THRESHOLD: i64 = 500;

/// Which exchange buffer an operation reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Target {
    #[default]
    Global,
    Indicator(IndicatorHandle),
}

impl Target {
    /// Map a raw boundary value to a target: `0` is the global buffer.
    pub fn from_raw(raw: u32) -> Self {
        match IndicatorHandle::from_raw(raw) {
            Some(handle) => Target::Indicator(handle),
            None => Target::Global,
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Target::Global => 0,
            Target::Indicator(handle) => handle.raw(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Global => f.write_str("global"),
            Target::Indicator(handle) => write!(f, "indicator {handle}"),
        }
    }
}

/// A decoded message together with its explicit destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub target: Target,
    pub buffer: ExchangeBuffer,
}

impl Envelope {
    pub fn new(target: Target, buffer: ExchangeBuffer) -> Self {
        Self { target, buffer }
    }

    /// Decode wire bytes and resolve their destination.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_wire(decode_message(bytes)?)
    }

    /// Resolve the destination of a decoded wire buffer.
    ///
    /// When `ints[0]` exceeds [`ADDRESSED_MARKER_THRESHOLD`], `ints[1]` must be
    /// an indicator handle; the marker entries stay in the buffer.
    pub fn from_wire(buffer: ExchangeBuffer) -> Result<Self> {
        let ints = buffer.ints();
        let addressed = ints
            .first()
            .is_some_and(|marker| *marker > ADDRESSED_MARKER_THRESHOLD);
        if !addressed {
            return Ok(Self::new(Target::Global, buffer));
        }

        let raw = ints.get(1).copied().unwrap_or(0);
        let handle = IndicatorHandle::from_wire(raw).ok_or(ExchangeError::InvalidHandle(raw))?;
        Ok(Self::new(Target::Indicator(handle), buffer))
    }
}
