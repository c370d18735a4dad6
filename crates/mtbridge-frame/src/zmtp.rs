//! ZMTP 3.0 framing with the NULL security mechanism.
//!
//! This is the wire spoken by ZeroMQ `REQ`/`REP` sockets (libzmq, pyzmq and
//! the terminal-side bindings). A connection starts with a fixed 64-byte
//! greeting in each direction, then one `READY` command each way carrying the
//! socket type. After that the stream is a sequence of frames:
//!
//! ```text
//! ┌───────────┬───────────────────────┬──────────────┐
//! │ Flags (1B)│ Size (1B, or 8B BE    │ Body         │
//! │ MORE=0x01 │ when LONG=0x02 is set)│ (Size bytes) │
//! │ LONG=0x02 │                       │              │
//! │ CMD =0x04 │                       │              │
//! └───────────┴───────────────────────┴──────────────┘
//! ```
//!
//! A message is a run of frames whose last one has `MORE` clear. `REQ`
//! prefixes every request with an empty delimiter frame and `REP` echoes the
//! routing frames up to and including it in front of the reply.

use std::fmt;
use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::{FrameError, Result};

/// Size of the greeting each side sends first.
pub const GREETING_SIZE: usize = 64;

/// Protocol version advertised in the greeting.
pub const VERSION: (u8, u8) = (3, 0);

pub const FLAG_MORE: u8 = 0x01;
pub const FLAG_LONG: u8 = 0x02;
pub const FLAG_COMMAND: u8 = 0x04;

const MECHANISM_NULL: &[u8] = b"NULL";
const MECHANISM_OFFSET: usize = 12;
const MECHANISM_LEN: usize = 20;
const MAX_COMMAND_SIZE: usize = 64 * 1024;

/// ZeroMQ socket types this crate can play or talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketType {
    Req,
    Rep,
}

impl SocketType {
    pub fn as_str(self) -> &'static str {
        match self {
            SocketType::Req => "REQ",
            SocketType::Rep => "REP",
        }
    }

    /// Whether a peer announcing `peer` may talk to this socket type.
    pub fn accepts(self, peer: &str) -> bool {
        match self {
            SocketType::Req => matches!(peer, "REP" | "ROUTER"),
            SocketType::Rep => matches!(peer, "REQ" | "DEALER"),
        }
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded ZMTP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub more: bool,
    pub command: bool,
    pub body: Bytes,
}

/// The greeting this side sends: NULL mechanism, never `as-server`.
pub fn greeting() -> [u8; GREETING_SIZE] {
    let mut out = [0u8; GREETING_SIZE];
    out[0] = 0xFF;
    out[9] = 0x7F;
    out[10] = VERSION.0;
    out[11] = VERSION.1;
    out[MECHANISM_OFFSET..MECHANISM_OFFSET + MECHANISM_NULL.len()].copy_from_slice(MECHANISM_NULL);
    out
}

/// Validate the greeting received from the peer.
pub fn check_greeting(greeting: &[u8]) -> Result<()> {
    if greeting.len() < GREETING_SIZE {
        return Err(FrameError::Handshake(format!(
            "greeting truncated to {} bytes",
            greeting.len()
        )));
    }
    if greeting[0] != 0xFF || greeting[9] != 0x7F {
        return Err(FrameError::Handshake("peer is not speaking ZMTP".to_string()));
    }
    if greeting[10] < VERSION.0 {
        return Err(FrameError::Handshake(format!(
            "unsupported ZMTP version {}.{}",
            greeting[10], greeting[11]
        )));
    }

    let mechanism = &greeting[MECHANISM_OFFSET..MECHANISM_OFFSET + MECHANISM_LEN];
    let name_len = mechanism
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(MECHANISM_LEN);
    if &mechanism[..name_len] != MECHANISM_NULL {
        return Err(FrameError::Handshake(format!(
            "unsupported security mechanism {:?}",
            String::from_utf8_lossy(&mechanism[..name_len])
        )));
    }
    Ok(())
}

/// Append one frame to `dst`, choosing the short or long size form.
pub fn encode_part(body: &[u8], flags: u8, dst: &mut BytesMut) {
    if body.len() <= u8::MAX as usize {
        dst.reserve(2 + body.len());
        dst.put_u8(flags & !FLAG_LONG);
        dst.put_u8(body.len() as u8);
    } else {
        dst.reserve(9 + body.len());
        dst.put_u8(flags | FLAG_LONG);
        dst.put_u64(body.len() as u64);
    }
    dst.put_slice(body);
}

/// Append a `READY` command announcing `socket_type`.
pub fn encode_ready(socket_type: SocketType, dst: &mut BytesMut) {
    let mut body = BytesMut::new();
    put_short_str(&mut body, "READY");
    put_short_str(&mut body, "Socket-Type");
    body.put_u32(socket_type.as_str().len() as u32);
    body.put_slice(socket_type.as_str().as_bytes());
    encode_part(&body, FLAG_COMMAND, dst);
}

/// Decode one frame from a buffer.
///
/// Returns `Ok(None)` until a complete frame is buffered; consumes it on success.
pub fn decode_part(src: &mut BytesMut, max_payload: usize) -> Result<Option<Part>> {
    let Some(&flags) = src.first() else {
        return Ok(None);
    };
    if flags & !(FLAG_MORE | FLAG_LONG | FLAG_COMMAND) != 0 {
        return Err(FrameError::Protocol(format!(
            "reserved frame flags set: {flags:#04x}"
        )));
    }

    let (header, size) = if flags & FLAG_LONG != 0 {
        if src.len() < 9 {
            return Ok(None);
        }
        let mut size = [0u8; 8];
        size.copy_from_slice(&src[1..9]);
        (9, u64::from_be_bytes(size))
    } else {
        if src.len() < 2 {
            return Ok(None);
        }
        (2, u64::from(src[1]))
    };

    let size = checked_size(size, max_payload)?;
    let total = header + size;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(header);
    Ok(Some(Part {
        more: flags & FLAG_MORE != 0,
        command: flags & FLAG_COMMAND != 0,
        body: src.split_to(size).freeze(),
    }))
}

/// Split a command body into its name and data.
pub fn parse_command(body: &[u8]) -> Result<(&str, &[u8])> {
    let (&len, rest) = body
        .split_first()
        .ok_or_else(|| FrameError::Protocol("empty command".to_string()))?;
    let len = usize::from(len);
    if rest.len() < len {
        return Err(FrameError::Protocol("command name truncated".to_string()));
    }
    let name = std::str::from_utf8(&rest[..len])
        .map_err(|_| FrameError::Protocol("command name is not ASCII".to_string()))?;
    Ok((name, &rest[len..]))
}

/// Look up a property in `READY` command data. Names compare case-insensitively.
pub fn ready_property<'a>(mut data: &'a [u8], wanted: &str) -> Result<Option<&'a [u8]>> {
    while let Some((&name_len, rest)) = data.split_first() {
        let name_len = usize::from(name_len);
        if rest.len() < name_len + 4 {
            return Err(FrameError::Protocol("READY property truncated".to_string()));
        }
        let (name, rest) = rest.split_at(name_len);
        let (value_len, rest) = rest.split_at(4);
        let value_len = u32::from_be_bytes([value_len[0], value_len[1], value_len[2], value_len[3]]);
        let value_len = usize::try_from(value_len)
            .map_err(|_| FrameError::Protocol("READY property too large".to_string()))?;
        if rest.len() < value_len {
            return Err(FrameError::Protocol("READY property truncated".to_string()));
        }
        let (value, rest) = rest.split_at(value_len);
        if name.eq_ignore_ascii_case(wanted.as_bytes()) {
            return Ok(Some(value));
        }
        data = rest;
    }
    Ok(None)
}

/// Run the greeting and `READY` exchange as `local` on a fresh stream.
///
/// Reads exactly the handshake bytes, so the stream can be handed to a
/// [`FrameReader`](crate::FrameReader) afterwards without losing data.
pub fn handshake<S: Read + Write>(stream: &mut S, local: SocketType) -> Result<()> {
    write_all(stream, &greeting())?;

    let mut peer_greeting = [0u8; GREETING_SIZE];
    read_exact(stream, &mut peer_greeting)?;
    check_greeting(&peer_greeting)?;

    let mut ready = BytesMut::new();
    encode_ready(local, &mut ready);
    write_all(stream, &ready)?;

    let part = read_part(stream)?;
    if !part.command {
        return Err(FrameError::Handshake(
            "expected READY, got a message frame".to_string(),
        ));
    }
    let (name, data) = parse_command(&part.body)?;
    match name {
        "READY" => {}
        "ERROR" => {
            let reason = data.split_first().map_or(&[][..], |(_, reason)| reason);
            return Err(FrameError::Handshake(format!(
                "peer refused: {}",
                String::from_utf8_lossy(reason)
            )));
        }
        other => {
            return Err(FrameError::Handshake(format!(
                "expected READY, got {other}"
            )));
        }
    }

    let peer = ready_property(data, "Socket-Type")?
        .map(String::from_utf8_lossy)
        .unwrap_or_default();
    if !local.accepts(&peer) {
        return Err(FrameError::Handshake(format!(
            "{local} socket cannot talk to {peer:?}"
        )));
    }

    debug!(%local, peer = %peer, "zmtp handshake complete");
    Ok(())
}

fn read_part<R: Read>(stream: &mut R) -> Result<Part> {
    let mut flags = [0u8; 1];
    read_exact(stream, &mut flags)?;
    let flags = flags[0];

    let size = if flags & FLAG_LONG != 0 {
        let mut size = [0u8; 8];
        read_exact(stream, &mut size)?;
        u64::from_be_bytes(size)
    } else {
        let mut size = [0u8; 1];
        read_exact(stream, &mut size)?;
        u64::from(size[0])
    };
    let size = checked_size(size, MAX_COMMAND_SIZE)?;

    let mut body = vec![0u8; size];
    read_exact(stream, &mut body)?;
    Ok(Part {
        more: flags & FLAG_MORE != 0,
        command: flags & FLAG_COMMAND != 0,
        body: Bytes::from(body),
    })
}

fn checked_size(size: u64, max: usize) -> Result<usize> {
    match usize::try_from(size) {
        Ok(size) if size <= max => Ok(size),
        Ok(size) => Err(FrameError::PayloadTooLarge { size, max }),
        Err(_) => Err(FrameError::PayloadTooLarge {
            size: usize::MAX,
            max,
        }),
    }
}

fn put_short_str(dst: &mut BytesMut, value: &str) {
    dst.put_u8(value.len() as u8);
    dst.put_slice(value.as_bytes());
}

fn read_exact<R: Read>(stream: &mut R, buf: &mut [u8]) -> Result<()> {
    stream.read_exact(buf).map_err(|err| match err.kind() {
        ErrorKind::UnexpectedEof => FrameError::ConnectionClosed,
        _ => FrameError::Io(err),
    })
}

fn write_all<W: Write>(stream: &mut W, buf: &[u8]) -> Result<()> {
    stream.write_all(buf)?;
    stream.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::thread;

    use mtbridge_transport::TcpSocket;

    use super::*;

    #[test]
    fn greeting_is_accepted_by_its_own_check() {
        let ours = greeting();
        assert_eq!(ours.len(), GREETING_SIZE);
        assert_eq!(&ours[12..16], b"NULL");
        check_greeting(&ours).unwrap();
    }

    #[test]
    fn newer_minor_version_is_accepted() {
        let mut peer = greeting();
        peer[11] = 1;
        check_greeting(&peer).unwrap();
    }

    #[test]
    fn foreign_greetings_are_rejected() {
        let err = check_greeting(&[0x4D; GREETING_SIZE]).unwrap_err();
        assert!(matches!(err, FrameError::Handshake(_)));
        assert!(!err.is_disconnect());

        let mut old = greeting();
        old[10] = 2;
        assert!(check_greeting(&old).is_err());

        let mut curve = greeting();
        curve[12..17].copy_from_slice(b"CURVE");
        assert!(check_greeting(&curve).is_err());
    }

    #[test]
    fn short_and_long_frames() {
        let mut buf = BytesMut::new();
        encode_part(b"", FLAG_MORE, &mut buf);
        encode_part(&[7u8; 300], 0, &mut buf);
        assert_eq!(&buf[..2], [FLAG_MORE, 0]);
        assert_eq!(buf[2], FLAG_LONG);

        let delimiter = decode_part(&mut buf, 1024).unwrap().unwrap();
        assert!(delimiter.more && delimiter.body.is_empty());
        let body = decode_part(&mut buf, 1024).unwrap().unwrap();
        assert!(!body.more && !body.command);
        assert_eq!(body.body.len(), 300);
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_frames_wait_for_more_bytes() {
        let mut buf = BytesMut::from(&[FLAG_LONG, 0, 0][..]);
        assert!(decode_part(&mut buf, 1024).unwrap().is_none());

        let mut buf = BytesMut::from(&[0x00, 4, b'a'][..]);
        assert!(decode_part(&mut buf, 1024).unwrap().is_none());
    }

    #[test]
    fn reserved_flags_and_oversize_are_errors() {
        let mut buf = BytesMut::from(&[0x80, 0][..]);
        assert!(matches!(
            decode_part(&mut buf, 1024),
            Err(FrameError::Protocol(_))
        ));

        let mut buf = BytesMut::new();
        encode_part(&[0u8; 64], 0, &mut buf);
        assert!(matches!(
            decode_part(&mut buf, 16),
            Err(FrameError::PayloadTooLarge { size: 64, max: 16 })
        ));
    }

    #[test]
    fn ready_carries_socket_type() {
        let mut buf = BytesMut::new();
        encode_ready(SocketType::Rep, &mut buf);
        let part = decode_part(&mut buf, 1024).unwrap().unwrap();
        assert!(part.command);

        let (name, data) = parse_command(&part.body).unwrap();
        assert_eq!(name, "READY");
        assert_eq!(ready_property(data, "socket-type").unwrap(), Some(&b"REP"[..]));
        assert_eq!(ready_property(data, "Identity").unwrap(), None);
    }

    #[test]
    fn req_and_rep_complete_handshake() {
        let listener = TcpSocket::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();

        let server = thread::spawn(move || {
            let mut stream = listener.accept().unwrap();
            handshake(&mut stream, SocketType::Rep)
        });

        let mut client = TcpSocket::connect("127.0.0.1", port).unwrap();
        handshake(&mut client, SocketType::Req).unwrap();
        server.join().unwrap().unwrap();
    }

    #[test]
    fn mismatched_socket_types_fail_handshake() {
        let listener = TcpSocket::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();

        let server = thread::spawn(move || {
            let mut stream = listener.accept().unwrap();
            handshake(&mut stream, SocketType::Rep)
        });

        let mut client = TcpSocket::connect("127.0.0.1", port).unwrap();
        let client_result = handshake(&mut client, SocketType::Rep);
        let server_result = server.join().unwrap();

        assert!(matches!(client_result, Err(FrameError::Handshake(_))));
        assert!(matches!(server_result, Err(FrameError::Handshake(_))));
    }
}
