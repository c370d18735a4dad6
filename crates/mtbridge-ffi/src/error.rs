use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use mtbridge_endpoint::EndpointError;
use mtbridge_exchange::ExchangeError;
use mtbridge_frame::FrameError;

use crate::types::MtbStatus;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::default();
    });
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let sanitized = message.into().replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

/// Record `message` and return the status code for it.
pub(crate) fn fail(status: MtbStatus, message: impl Into<String>) -> i32 {
    set_error_message(message);
    status.code()
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> i32 {
    fail(MtbStatus::InvalidArgument, message)
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

pub(crate) fn map_exchange_error(err: &ExchangeError) -> i32 {
    let status = match err {
        ExchangeError::MalformedPayload(_) => MtbStatus::MalformedPayload,
        ExchangeError::ResourceExhausted(_) => MtbStatus::ResourceExhausted,
        ExchangeError::InvalidHandle(_) => MtbStatus::InvalidHandle,
        ExchangeError::BufferTooSmall { .. } => MtbStatus::BufferTooSmall,
        ExchangeError::Internal(_) => MtbStatus::Internal,
    };
    fail(status, err.to_string())
}

pub(crate) fn map_endpoint_error(err: &EndpointError) -> i32 {
    let status = match err {
        EndpointError::Exchange(inner) => return map_exchange_error(inner),
        EndpointError::Transport(_) | EndpointError::TransportClosed(_) => {
            MtbStatus::TransportClosed
        }
        EndpointError::ConnectionDropped(_) => MtbStatus::ConnectionDropped,
        EndpointError::Frame(frame) if frame.is_disconnect() => MtbStatus::TransportClosed,
        EndpointError::Frame(FrameError::PayloadTooLarge { .. }) => MtbStatus::ResourceExhausted,
        EndpointError::Frame(_) => MtbStatus::Internal,
        EndpointError::OutOfSequence(_) => MtbStatus::OutOfSequence,
    };
    fail(status, err.to_string())
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}
