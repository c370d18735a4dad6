use std::ffi::c_void;
use std::os::raw::c_char;

use mtbridge_endpoint::Endpoint;

/// Status codes returned across the C boundary.
///
/// Non-negative values are successful outcomes; counts and handles are
/// returned in their place by the functions that produce them.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtbStatus {
    Global = 0,
    Indicator = 1,
    NoData = -1,
    ResourceExhausted = -2,
    MalformedPayload = -3,
    Internal = -4,
    TransportClosed = -5,
    InvalidHandle = -6,
    BufferTooSmall = -7,
    InvalidArgument = -8,
    OutOfSequence = -9,
    ConnectionDropped = -10,
}

impl MtbStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Success for calls that return no count.
pub const MTB_OK: i32 = 0;

/// Target value selecting the global buffer.
pub const MTB_TARGET_GLOBAL: u32 = 0;

/// Caller-owned character buffer.
///
/// As output, `len` is the capacity of `data` on entry and the written
/// length (trailing NUL included) on return. As input, `data` is read up to
/// `len` bytes or the first NUL.
#[repr(C)]
#[derive(Debug)]
pub struct MtbString {
    pub len: usize,
    pub data: *mut c_char,
}

/// One match reported by `mtb_find_indicator`.
#[repr(C)]
#[derive(Debug)]
pub struct MtbIndicatorInfo {
    pub handle: u32,
    pub period: i32,
    pub symbol: MtbString,
}

pub type MtbEndpointHandle = *mut c_void;

pub(crate) struct EndpointHandle {
    pub(crate) endpoint: Endpoint,
}
