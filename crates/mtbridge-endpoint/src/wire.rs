use std::net::SocketAddr;

use bytes::Bytes;
use mtbridge_frame::{
    zmtp, FrameConfig, FrameError, FrameReader, FrameWriter, SocketType, WireProtocol,
};
use mtbridge_transport::BridgeStream;

use crate::error::Result;

/// One established connection, speaking the configured wire protocol as
/// either side of the request/reply pattern.
pub(crate) struct Wire {
    protocol: WireProtocol,
    role: SocketType,
    reader: FrameReader<BridgeStream>,
    writer: FrameWriter<BridgeStream>,
    /// Routing parts of the request being answered, delimiter included.
    envelope: Vec<Bytes>,
}

impl Wire {
    /// Apply timeouts and, for ZMTP, run the handshake as `role`.
    pub(crate) fn establish(
        mut stream: BridgeStream,
        config: &FrameConfig,
        role: SocketType,
    ) -> Result<Self> {
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        if config.protocol == WireProtocol::Zmtp {
            zmtp::handshake(&mut stream, role)?;
        }

        let reader_stream = stream.try_clone()?;
        Ok(Self {
            protocol: config.protocol,
            role,
            reader: FrameReader::with_config(reader_stream, config.clone()),
            writer: FrameWriter::with_config(stream, config.clone()),
            envelope: Vec::new(),
        })
    }

    /// Next message body. A zero-length body is the probe.
    pub(crate) fn recv(&mut self) -> std::result::Result<Bytes, FrameError> {
        if self.protocol == WireProtocol::Native {
            return self.reader.read_frame();
        }

        let mut parts = self.reader.read_parts()?;
        let delimiter = parts.iter().position(|part| part.is_empty());
        let body_start = match (self.role, delimiter) {
            (SocketType::Rep, Some(index)) => index + 1,
            (SocketType::Req, Some(0)) => 1,
            _ => {
                return Err(FrameError::Protocol(
                    "message without envelope delimiter".to_string(),
                ))
            }
        };

        let mut body = parts.split_off(body_start);
        let payload = match body.pop() {
            Some(payload) if body.is_empty() => payload,
            _ => {
                return Err(FrameError::Protocol(format!(
                    "expected one body part, got {}",
                    body.len() + 1
                )))
            }
        };
        if self.role == SocketType::Rep {
            self.envelope = parts;
        }
        Ok(payload)
    }

    /// Send one message body; a reply goes out behind the request's envelope.
    pub(crate) fn send(&mut self, payload: &[u8]) -> std::result::Result<(), FrameError> {
        if self.protocol == WireProtocol::Native {
            return self.writer.send(payload);
        }

        let mut parts: Vec<&[u8]> = match self.role {
            SocketType::Rep => self.envelope.iter().map(|part| part.as_ref()).collect(),
            SocketType::Req => vec![&[][..]],
        };
        parts.push(payload);
        self.writer.send_parts(&parts)
    }

    pub(crate) fn peer_addr(&self) -> Option<SocketAddr> {
        self.writer.get_ref().peer_addr()
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.writer.get_ref().shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::thread;

    use bytes::BytesMut;
    use mtbridge_transport::TcpSocket;

    use super::*;

    #[test]
    fn reply_echoes_routing_envelope() {
        let listener = TcpSocket::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();

        let server = thread::spawn(move || {
            let stream = listener.accept().unwrap();
            let mut wire = Wire::establish(stream, &FrameConfig::default(), SocketType::Rep).unwrap();
            let payload = wire.recv().unwrap();
            wire.send(&payload).unwrap();
        });

        // A broker in between adds an identity part in front of the delimiter.
        let mut client = TcpSocket::connect("127.0.0.1", port).unwrap();
        zmtp::handshake(&mut client, SocketType::Req).unwrap();
        let mut request = BytesMut::new();
        zmtp::encode_part(b"peer-7", zmtp::FLAG_MORE, &mut request);
        zmtp::encode_part(b"", zmtp::FLAG_MORE, &mut request);
        zmtp::encode_part(b"\x90", 0, &mut request);
        client.write_all(&request).unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).ok();
        server.join().unwrap();
        assert_eq!(reply, request.to_vec());
    }

    #[test]
    fn request_without_delimiter_is_a_protocol_error() {
        let listener = TcpSocket::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();

        let server = thread::spawn(move || {
            let stream = listener.accept().unwrap();
            let mut wire = Wire::establish(stream, &FrameConfig::default(), SocketType::Rep).unwrap();
            wire.recv()
        });

        let mut client = TcpSocket::connect("127.0.0.1", port).unwrap();
        zmtp::handshake(&mut client, SocketType::Req).unwrap();
        let mut request = BytesMut::new();
        zmtp::encode_part(b"\x90", 0, &mut request);
        client.write_all(&request).unwrap();

        let result = server.join().unwrap();
        assert!(matches!(result, Err(FrameError::Protocol(_))));
    }
}
