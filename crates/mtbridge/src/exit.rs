use std::fmt;
use std::io;

use mtbridge_endpoint::EndpointError;
use mtbridge_exchange::ExchangeError;
use mtbridge_frame::FrameError;
use mtbridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrInUse => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::InvalidMagic => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::Handshake(_) | FrameError::Protocol(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn exchange_error(context: &str, err: ExchangeError) -> CliError {
    let code = match err {
        ExchangeError::MalformedPayload(_) => DATA_INVALID,
        ExchangeError::InvalidHandle(_) | ExchangeError::BufferTooSmall { .. } => USAGE,
        ExchangeError::ResourceExhausted(_) | ExchangeError::Internal(_) => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn endpoint_error(context: &str, err: EndpointError) -> CliError {
    match err {
        EndpointError::Transport(err) => transport_error(context, err),
        EndpointError::Frame(err) | EndpointError::ConnectionDropped(err) => {
            frame_error(context, err)
        }
        EndpointError::Exchange(err) => exchange_error(context, err),
        EndpointError::TransportClosed(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        EndpointError::OutOfSequence(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
