use tracing::{debug, warn};

use crate::buffer::ExchangeBuffer;
use crate::codec::encode_message;
use crate::envelope::{Envelope, Target};
use crate::error::{ExchangeError, Result};
use crate::registry::IndicatorRegistry;

/// All data one bridge instance exchanges: the global buffer and the
/// indicator registry.
#[derive(Debug, Default)]
pub struct BridgeState {
    global: ExchangeBuffer,
    registry: IndicatorRegistry,
}

impl BridgeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self) -> &ExchangeBuffer {
        &self.global
    }

    pub fn registry(&self) -> &IndicatorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut IndicatorRegistry {
        &mut self.registry
    }

    /// Decode one incoming message and store it in its destination buffer.
    ///
    /// Nothing is modified when decoding or routing fails.
    pub fn receive_message(&mut self, bytes: &[u8]) -> Result<Target> {
        let envelope = Envelope::decode(bytes)?;
        self.apply(envelope)
    }

    /// Replace the destination buffer of `envelope` with its contents.
    pub fn apply(&mut self, envelope: Envelope) -> Result<Target> {
        let Envelope { target, buffer } = envelope;
        let sizes = buffer.sizes();
        match self.buffer_mut(target) {
            Ok(dest) => dest.replace(buffer),
            Err(err) => {
                warn!(%target, "message addressed to unknown indicator dropped");
                return Err(err);
            }
        }
        debug!(
            %target,
            ints = sizes.ints,
            reals = sizes.reals,
            texts = sizes.texts,
            "message stored"
        );
        Ok(target)
    }

    /// The buffer designated by `target`.
    pub fn buffer(&self, target: Target) -> Result<&ExchangeBuffer> {
        match target {
            Target::Global => Ok(&self.global),
            Target::Indicator(handle) => self
                .registry
                .get(handle)
                .map(|indicator| indicator.buffer())
                .ok_or(ExchangeError::InvalidHandle(i64::from(handle.raw()))),
        }
    }

    pub fn buffer_mut(&mut self, target: Target) -> Result<&mut ExchangeBuffer> {
        match target {
            Target::Global => Ok(&mut self.global),
            Target::Indicator(handle) => self
                .registry
                .get_mut(handle)
                .map(|indicator| indicator.buffer_mut())
                .ok_or(ExchangeError::InvalidHandle(i64::from(handle.raw()))),
        }
    }

    /// Encode the buffer designated by `target` as a reply message.
    pub fn encode_reply(&self, target: Target) -> Result<Vec<u8>> {
        encode_message(self.buffer(target)?)
    }
}
