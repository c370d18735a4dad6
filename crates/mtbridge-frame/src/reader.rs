use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{decode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::zmtp;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete messages from any `Read` stream.
///
/// Handles partial reads internally; callers always get whole messages.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete native message payload (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(payload) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(payload);
            }
            self.fill()?;
        }
    }

    /// Read the next complete ZMTP message as its list of parts (blocking).
    ///
    /// Commands between messages (heartbeats) are skipped. The combined size
    /// of all parts is held to `max_payload_size`.
    pub fn read_parts(&mut self) -> Result<Vec<Bytes>> {
        let max = self.config.max_payload_size;
        let mut parts = Vec::new();
        let mut total = 0usize;
        loop {
            let Some(part) = zmtp::decode_part(&mut self.buf, max)? else {
                self.fill()?;
                continue;
            };
            if part.command {
                trace!(bytes = part.body.len(), "skipping zmtp command");
                continue;
            }

            total += part.body.len();
            if total > max {
                return Err(FrameError::PayloadTooLarge { size: total, max });
            }
            let more = part.more;
            parts.push(part.body);
            if !more {
                return Ok(parts);
            }
        }
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
            return Ok(());
        }
    }

    /// Bytes received but not yet returned as a message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
